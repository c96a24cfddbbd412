//! The six opcode handlers.
//!
//! Handlers build complete response frames. "Soft" failures the client
//! should read about (unknown key, tombstoned record) become `Ok` responses
//! carrying a descriptive string; real faults propagate as errors and the
//! worker turns them into the `ERR` fallback frame.

use std::fs::File;
use std::path::PathBuf;
use std::sync::Arc;

use docket_proto::{
    opcode, simple_response, ArgValue, CommandSpec, ResponseBuilder, Status, WireType,
};
use docket_store::{count_matching_lines, document_path, Document, RecordStore, StoreError};

use crate::error::ServerError;
use crate::search;

/// Shared read side handed to workers. The loop is the only writer of the
/// store and the only owner of the cache; workers see the store read-only.
#[derive(Debug, Clone)]
pub struct ServerContext {
    pub store: Arc<RecordStore>,
    pub docroot: PathBuf,
}

/// What the loop should do with a handler's response frame.
#[derive(Debug)]
pub enum Outcome {
    Reply(Vec<u8>),
    /// Reply, then leave the serving loop.
    Shutdown(Vec<u8>),
}

pub fn handle(
    ctx: &ServerContext,
    spec: &CommandSpec,
    args: &[ArgValue<'_>],
) -> Result<Outcome, ServerError> {
    match spec.opcode {
        opcode::ADD => add(ctx, spec, args),
        opcode::CONSULT => consult(ctx, spec, args),
        opcode::DELETE => delete(ctx, spec, args),
        opcode::LIST_COUNT => list_count(ctx, spec, args),
        opcode::SEARCH => search(ctx, spec, args),
        opcode::FLUSH => flush(spec),
        // The loop filters unknown opcodes before dispatch.
        other => Err(ServerError::UnknownOpcode(other)),
    }
}

fn add(
    ctx: &ServerContext,
    spec: &CommandSpec,
    args: &[ArgValue<'_>],
) -> Result<Outcome, ServerError> {
    // Field bytes go into the record exactly as they arrived on the wire.
    let doc = Document {
        title: bytes_arg(spec, args, 0)?.to_vec(),
        authors: bytes_arg(spec, args, 1)?.to_vec(),
        year: u32_arg(spec, args, 2)?,
        path: bytes_arg(spec, args, 3)?.to_vec(),
    };
    let key = ctx.store.append(&doc)?;
    tracing::debug!(target = "docket.server", key, "indexed document");
    let frame = simple_response(spec.opcode, Status::Ok, &format!("Document {key} indexed"))?;
    Ok(Outcome::Reply(frame))
}

fn consult(
    ctx: &ServerContext,
    spec: &CommandSpec,
    args: &[ArgValue<'_>],
) -> Result<Outcome, ServerError> {
    let key = u32_arg(spec, args, 0)?;
    let doc = match ctx.store.get(key) {
        Ok(doc) => doc,
        Err(StoreError::NotFound { .. }) => {
            let frame = simple_response(spec.opcode, Status::Ok, "Document not found")?;
            return Ok(Outcome::Reply(frame));
        }
        Err(err) => return Err(err.into()),
    };

    let mut rsp = ResponseBuilder::new(spec.opcode, Status::Ok);
    rsp.push(WireType::Str, &field_line("Title: ", &doc.title))?;
    rsp.push(WireType::Str, &field_line("Authors: ", &doc.authors))?;
    rsp.push(WireType::Str, format!("Year: {}", doc.year).as_bytes())?;
    rsp.push(WireType::Str, &field_line("Path: ", &doc.path))?;
    Ok(Outcome::Reply(rsp.finish()))
}

fn delete(
    ctx: &ServerContext,
    spec: &CommandSpec,
    args: &[ArgValue<'_>],
) -> Result<Outcome, ServerError> {
    let key = u32_arg(spec, args, 0)?;
    let text = match ctx.store.delete(key) {
        Ok(()) => format!("Index entry {key} deleted"),
        Err(StoreError::NotFound { .. }) => format!("Index entry {key} not found"),
        Err(err) => return Err(err.into()),
    };
    let frame = simple_response(spec.opcode, Status::Ok, &text)?;
    Ok(Outcome::Reply(frame))
}

fn list_count(
    ctx: &ServerContext,
    spec: &CommandSpec,
    args: &[ArgValue<'_>],
) -> Result<Outcome, ServerError> {
    let key = u32_arg(spec, args, 0)?;
    let keyword = bytes_arg(spec, args, 1)?;

    let doc = ctx.store.get(key)?;
    let path = document_path(&ctx.docroot, &doc)?;
    let mut body = File::open(&path)?;
    let count = count_matching_lines(&mut body, keyword, false)?;

    let mut rsp = ResponseBuilder::new(spec.opcode, Status::Ok);
    rsp.push(WireType::U32, &count.to_le_bytes())?;
    Ok(Outcome::Reply(rsp.finish()))
}

fn search(
    ctx: &ServerContext,
    spec: &CommandSpec,
    args: &[ArgValue<'_>],
) -> Result<Outcome, ServerError> {
    let keyword = bytes_arg(spec, args, 0)?;
    let requested = match args.get(1) {
        Some(ArgValue::U32(n)) => *n,
        _ => 1,
    };

    let keys = search::parallel_search(ctx, keyword, requested)?;
    let text = if keys.is_empty() {
        "No documents match".to_string()
    } else {
        keys.iter()
            .map(|k| k.to_string())
            .collect::<Vec<_>>()
            .join(",")
    };
    let frame = simple_response(spec.opcode, Status::Ok, &text)?;
    Ok(Outcome::Reply(frame))
}

fn flush(spec: &CommandSpec) -> Result<Outcome, ServerError> {
    let frame = simple_response(spec.opcode, Status::Shutdown, "Server is shutting down")?;
    Ok(Outcome::Shutdown(frame))
}

fn u32_arg(spec: &CommandSpec, args: &[ArgValue<'_>], position: usize) -> Result<u32, ServerError> {
    match args.get(position) {
        Some(ArgValue::U32(value)) => Ok(*value),
        _ => Err(arg_mismatch(spec, args, position, WireType::U32)),
    }
}

/// Reply line `<label><field bytes>`, the field carried verbatim.
fn field_line(label: &str, value: &[u8]) -> Vec<u8> {
    let mut line = label.as_bytes().to_vec();
    line.extend_from_slice(value);
    line
}

fn bytes_arg<'a>(
    spec: &CommandSpec,
    args: &'a [ArgValue<'_>],
    position: usize,
) -> Result<&'a [u8], ServerError> {
    match args.get(position) {
        Some(ArgValue::Str(bytes)) => Ok(bytes),
        _ => Err(arg_mismatch(spec, args, position, WireType::Str)),
    }
}

fn arg_mismatch(
    spec: &CommandSpec,
    args: &[ArgValue<'_>],
    position: usize,
    expected: WireType,
) -> ServerError {
    match args.get(position) {
        Some(other) => ServerError::ArgumentType {
            flag: spec.flag,
            position,
            expected: expected.as_wire(),
            got: match other {
                ArgValue::U32(_) => WireType::U32.as_wire(),
                ArgValue::Str(_) => WireType::Str.as_wire(),
            },
        },
        None => ServerError::MissingArgument {
            flag: spec.flag,
            expected: spec.min_args,
            got: args.len(),
        },
    }
}
