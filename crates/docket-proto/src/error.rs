/// Errors produced by frame building, parsing, and the FIFO transport.
#[derive(Debug, thiserror::Error)]
pub enum ProtoError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("declared frame length {len} is outside {min}..={max}")]
    FrameLength { len: usize, min: usize, max: usize },

    #[error("frame declares {declared} bytes but carries {actual}")]
    LengthMismatch { declared: usize, actual: usize },

    #[error("frame shorter than its {expected}-byte header ({actual} bytes)")]
    TruncatedHeader { expected: usize, actual: usize },

    #[error("truncated tlv header: {remaining} bytes remain in the payload")]
    TruncatedTlv { remaining: usize },

    #[error("tlv declares {declared} value bytes but only {remaining} remain")]
    TlvOverrun { declared: usize, remaining: usize },

    #[error("appending {needed} bytes would exceed the {capacity}-byte frame capacity")]
    FrameOverflow { needed: usize, capacity: usize },

    #[error("tlv value of {0} bytes does not fit a u16 length")]
    ValueTooLong(usize),

    #[error("unknown wire type {0}")]
    UnknownWireType(u8),

    #[error("unknown status byte {0}")]
    UnknownStatus(u8),

    #[error("u32 argument must be 4 bytes, got {0}")]
    BadU32Length(usize),

    #[error("invalid u32 token {token:?}")]
    BadU32Token { token: String },

    #[error("expected a string argument")]
    ExpectedStr,

    #[error("empty string argument")]
    EmptyStr,

    #[error("string argument of {len} bytes exceeds capacity {max}")]
    StrTooLong { len: usize, max: usize },

    #[error("missing argument")]
    MissingArgument,
}
