/// Errors produced by the record store and document lookup.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("store file length {len} is not a multiple of the {record}-byte record size")]
    Misaligned { len: u64, record: usize },

    #[error("no live record with key {key}")]
    NotFound { key: u32 },

    #[error("record key space exhausted")]
    KeySpaceExhausted,

    #[error("document has an empty body path")]
    EmptyDocumentPath,
}
