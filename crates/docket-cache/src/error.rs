/// Errors produced by cache persistence. Loads never fail (corruption
/// degrades to a shorter cache); only writes surface errors.
#[derive(Debug, thiserror::Error)]
pub enum CacheError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}
