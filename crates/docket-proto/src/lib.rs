//! Wire protocol for the Docket index server.
//!
//! Everything on the wire is little-endian and packed: a fixed header
//! followed by TLV-encoded arguments. The same command table drives both the
//! client (flag → request) and the server (request → typed arguments), so
//! the two binaries cannot drift apart.

pub mod args;
pub mod command;
mod error;
pub mod frame;
pub mod status;
pub mod transport;

pub use args::{decode_arg, encode_arg, ArgValue, WireType};
pub use command::{opcode, CommandSpec, COMMANDS};
pub use error::ProtoError;
pub use frame::{
    error_response, first_str, simple_response, Request, RequestBuilder, Response,
    ResponseBuilder, Tlv, TlvCursor,
};
pub use status::Status;

/// Hard upper bound for a whole frame, header included. The length field is
/// a `u16`, so nothing larger can even be described on the wire.
pub const MAX_FRAME_BYTES: usize = u16::MAX as usize;

/// Request header: `len: u16`, `opcode: u8`, `pid: i32`.
pub const REQUEST_HEADER_BYTES: usize = 7;

/// Response header: `len: u16`, `opcode: u8`, `status: u8`.
pub const RESPONSE_HEADER_BYTES: usize = 4;

/// TLV header: `type: u8`, `len: u16`.
pub const TLV_HEADER_BYTES: usize = 3;
