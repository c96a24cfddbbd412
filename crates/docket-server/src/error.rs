use docket_cache::CacheError;
use docket_proto::ProtoError;
use docket_store::StoreError;

/// Errors surfaced by dispatch and the serving loop.
#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Proto(#[from] ProtoError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Cache(#[from] CacheError),

    #[error("{flag} expects at least {expected} arguments, got {got}")]
    MissingArgument {
        flag: &'static str,
        expected: usize,
        got: usize,
    },

    #[error("no handler for opcode {0:#x}")]
    UnknownOpcode(u8),

    #[error("{flag} argument {position} has wire type {got}, expected {expected}")]
    ArgumentType {
        flag: &'static str,
        position: usize,
        expected: u8,
        got: u8,
    },
}
