//! Argument decoding against the command table, then handler invocation.

use docket_proto::{decode_arg, ArgValue, CommandSpec, TlvCursor};

use crate::error::ServerError;
use crate::handlers::{self, Outcome, ServerContext};

/// Decode a request payload into typed arguments per the command row.
///
/// The cursor is walked for at most `max_args` positions. Running out of
/// TLVs is fine once the minimum arity is met; a type mismatch or decode
/// failure at any position rejects the request.
pub fn decode_args<'a>(
    spec: &CommandSpec,
    payload: &'a [u8],
) -> Result<Vec<ArgValue<'a>>, ServerError> {
    let mut cursor = TlvCursor::new(payload);
    let mut args = Vec::with_capacity(spec.max_args());

    for (position, expected) in spec.arg_types.iter().enumerate() {
        let Some(tlv) = cursor.next()? else {
            if position >= spec.min_args {
                break;
            }
            return Err(ServerError::MissingArgument {
                flag: spec.flag,
                expected: spec.min_args,
                got: position,
            });
        };
        if tlv.wire_type != expected.as_wire() {
            return Err(ServerError::ArgumentType {
                flag: spec.flag,
                position,
                expected: expected.as_wire(),
                got: tlv.wire_type,
            });
        }
        args.push(decode_arg(&tlv)?);
    }

    Ok(args)
}

/// Decode the payload and run the handler for `spec.opcode`.
pub fn dispatch(
    ctx: &ServerContext,
    spec: &CommandSpec,
    payload: &[u8],
) -> Result<Outcome, ServerError> {
    let args = decode_args(spec, payload)?;
    handlers::handle(ctx, spec, &args)
}
