//! Client-side request building and reply handling.
//!
//! One invocation sends one request: build the frame from the flag and its
//! tokens, create the private reply FIFO, write to the server's endpoint,
//! read the single reply, clean up.

use std::borrow::Cow;
use std::fmt;
use std::path::Path;

use docket_proto::transport::{self, Endpoints};
use docket_proto::{
    command, decode_arg, encode_arg, ArgValue, CommandSpec, ProtoError, RequestBuilder, Response,
    Status, TlvCursor,
};

/// Errors reported by the client before, during, or after the exchange.
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    #[error("unknown flag {0:?}")]
    UnknownFlag(String),

    #[error("{flag} takes {min}..={max} arguments, got {got}")]
    Arity {
        flag: &'static str,
        min: usize,
        max: usize,
        got: usize,
    },

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Proto(#[from] ProtoError),
}

/// A decoded reply: the response status plus its TLVs in order.
#[derive(Debug)]
pub struct Reply {
    pub status: Status,
    pub values: Vec<ReplyValue>,
}

#[derive(Debug, PartialEq, Eq)]
pub enum ReplyValue {
    Text(String),
    Number(u32),
}

impl fmt::Display for ReplyValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReplyValue::Text(text) => f.write_str(text),
            ReplyValue::Number(value) => write!(f, "{value}"),
        }
    }
}

/// Resolve a flag and validate the token count against its arity.
pub fn resolve_command(flag: &str, tokens: &[String]) -> Result<&'static CommandSpec, ClientError> {
    let spec = command::by_flag(flag).ok_or_else(|| ClientError::UnknownFlag(flag.to_string()))?;
    if tokens.len() < spec.min_args || tokens.len() > spec.max_args() {
        return Err(ClientError::Arity {
            flag: spec.flag,
            min: spec.min_args,
            max: spec.max_args(),
            got: tokens.len(),
        });
    }
    Ok(spec)
}

/// Build the request frame for a resolved command.
pub fn request_frame(
    spec: &CommandSpec,
    tokens: &[String],
    pid: i32,
) -> Result<Vec<u8>, ClientError> {
    let mut req = RequestBuilder::new(spec.opcode, pid);
    for (wire_type, token) in spec.arg_types.iter().zip(tokens) {
        let bytes = encode_arg(*wire_type, token)?;
        req.push(*wire_type, &bytes)?;
    }
    Ok(req.finish())
}

/// Decode a response frame into printable values.
pub fn parse_reply(frame: &[u8]) -> Result<Reply, ClientError> {
    let parsed = Response::parse(frame)?;
    let mut cursor = TlvCursor::new(parsed.payload);
    let mut values = Vec::new();
    while let Some(tlv) = cursor.next()? {
        values.push(match decode_arg(&tlv)? {
            ArgValue::U32(value) => ReplyValue::Number(value),
            ArgValue::Str(bytes) => ReplyValue::Text(lossy_text(bytes).into_owned()),
        });
    }
    Ok(Reply {
        status: parsed.status,
        values,
    })
}

fn lossy_text(bytes: &[u8]) -> Cow<'_, str> {
    String::from_utf8_lossy(bytes)
}

/// Run one command against a server: one request, one reply.
pub fn run_command(
    endpoints: &Endpoints,
    flag: &str,
    tokens: &[String],
) -> Result<Reply, ClientError> {
    let spec = resolve_command(flag, tokens)?;
    let pid = std::process::id() as i32;
    let request = request_frame(spec, tokens, pid)?;
    tracing::debug!(
        target = "docket.client",
        flag = spec.flag,
        pid,
        bytes = request.len(),
        "sending request"
    );

    let reply_path = endpoints.reply_path(pid);
    transport::create_fifo(&reply_path)?;
    let result = exchange(endpoints, &reply_path, &request);
    transport::remove_endpoint(&reply_path);
    result
}

fn exchange(
    endpoints: &Endpoints,
    reply_path: &Path,
    request: &[u8],
) -> Result<Reply, ClientError> {
    // Hold our read end open before the request goes out, so the server's
    // write-only open cannot block on us.
    let mut reply_fifo = transport::open_owned(reply_path)?;

    let mut request_fifo = transport::open_reply(&endpoints.request_path())?;
    transport::write_frame(&mut request_fifo, request)?;
    drop(request_fifo);

    let frame = transport::read_response_frame(&mut reply_fifo)?;
    parse_reply(&frame)
}
