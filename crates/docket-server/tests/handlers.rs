//! Handler contract tests, driven through the dispatcher with real store
//! and document fixtures but no transport.

use docket_proto::{
    command, first_str, ArgValue, Request, RequestBuilder, Response, Status, TlvCursor, WireType,
    REQUEST_HEADER_BYTES,
};
use docket_server::dispatch::dispatch;
use docket_server::{Outcome, ServerContext};
use docket_store::{RecordStore, RECORD_BYTES};
use std::sync::Arc;

struct Fixture {
    _dir: tempfile::TempDir,
    ctx: ServerContext,
    store_path: std::path::PathBuf,
}

fn fixture() -> Fixture {
    let dir = tempfile::tempdir().unwrap();
    let docroot = dir.path().join("docs");
    std::fs::create_dir_all(&docroot).unwrap();
    let store_path = dir.path().join("index.bin");
    let store = RecordStore::open(&store_path).unwrap();
    Fixture {
        ctx: ServerContext {
            store: Arc::new(store),
            docroot,
        },
        store_path,
        _dir: dir,
    }
}

fn run(ctx: &ServerContext, flag: &str, args: &[(WireType, &str)]) -> Vec<u8> {
    let spec = command::by_flag(flag).unwrap();
    let mut req = RequestBuilder::new(spec.opcode, 1);
    for (ty, token) in args {
        let bytes = docket_proto::encode_arg(*ty, token).unwrap();
        req.push(*ty, &bytes).unwrap();
    }
    let frame = req.finish();
    let payload = Request::parse(&frame).unwrap().payload.to_vec();

    match dispatch(ctx, spec, &payload).unwrap() {
        Outcome::Reply(rsp) | Outcome::Shutdown(rsp) => rsp,
    }
}

fn reply_text(frame: &[u8]) -> String {
    let parsed = Response::parse(frame).unwrap();
    String::from_utf8(first_str(parsed.payload, 65535).unwrap().to_vec()).unwrap()
}

fn str_lines(frame: &[u8]) -> Vec<String> {
    let parsed = Response::parse(frame).unwrap();
    let mut cursor = TlvCursor::new(parsed.payload);
    let mut lines = Vec::new();
    while let Some(tlv) = cursor.next().unwrap() {
        lines.push(String::from_utf8(tlv.value.to_vec()).unwrap());
    }
    lines
}

#[test]
fn add_replies_with_the_assigned_key_and_grows_the_store() {
    let fx = fixture();
    let rsp = run(
        &fx.ctx,
        "-a",
        &[
            (WireType::Str, "T"),
            (WireType::Str, "A"),
            (WireType::U32, "2020"),
            (WireType::Str, "p.txt"),
        ],
    );
    assert_eq!(reply_text(&rsp), "Document 0 indexed");
    assert_eq!(
        std::fs::metadata(&fx.store_path).unwrap().len(),
        RECORD_BYTES as u64
    );
}

#[test]
fn consult_emits_the_four_field_lines_in_order() {
    let fx = fixture();
    run(
        &fx.ctx,
        "-a",
        &[
            (WireType::Str, "T"),
            (WireType::Str, "A"),
            (WireType::U32, "2020"),
            (WireType::Str, "p.txt"),
        ],
    );
    let rsp = run(&fx.ctx, "-c", &[(WireType::U32, "0")]);
    assert_eq!(
        str_lines(&rsp),
        ["Title: T", "Authors: A", "Year: 2020", "Path: p.txt"]
    );
}

#[test]
fn delete_then_consult_then_delete_again() {
    let fx = fixture();
    run(
        &fx.ctx,
        "-a",
        &[
            (WireType::Str, "T"),
            (WireType::Str, "A"),
            (WireType::U32, "2020"),
            (WireType::Str, "p.txt"),
        ],
    );

    let rsp = run(&fx.ctx, "-d", &[(WireType::U32, "0")]);
    assert_eq!(reply_text(&rsp), "Index entry 0 deleted");

    let rsp = run(&fx.ctx, "-c", &[(WireType::U32, "0")]);
    let parsed = Response::parse(&rsp).unwrap();
    assert_eq!(parsed.status, Status::Ok);
    assert_eq!(reply_text(&rsp), "Document not found");

    let rsp = run(&fx.ctx, "-d", &[(WireType::U32, "0")]);
    assert_eq!(reply_text(&rsp), "Index entry 0 not found");
}

#[test]
fn list_count_replies_with_one_u32_tlv() {
    let fx = fixture();
    std::fs::write(fx.ctx.docroot.join("p.txt"), "foo\nfoo bar\nbaz\n").unwrap();
    run(
        &fx.ctx,
        "-a",
        &[
            (WireType::Str, "T"),
            (WireType::Str, "A"),
            (WireType::U32, "2020"),
            (WireType::Str, "p.txt"),
        ],
    );

    let rsp = run(&fx.ctx, "-l", &[(WireType::U32, "0"), (WireType::Str, "foo")]);
    let parsed = Response::parse(&rsp).unwrap();
    let mut cursor = TlvCursor::new(parsed.payload);
    let tlv = cursor.next().unwrap().unwrap();
    assert_eq!(
        docket_proto::decode_arg(&tlv).unwrap(),
        ArgValue::U32(2)
    );
    assert!(cursor.next().unwrap().is_none());
}

#[test]
fn list_count_on_a_missing_record_is_a_hard_error() {
    let fx = fixture();
    let spec = command::by_flag("-l").unwrap();
    let mut req = RequestBuilder::new(spec.opcode, 1);
    req.push(WireType::U32, &9u32.to_le_bytes()).unwrap();
    req.push(WireType::Str, b"kw").unwrap();
    let frame = req.finish();

    assert!(dispatch(&fx.ctx, spec, &frame[REQUEST_HEADER_BYTES..]).is_err());
}

#[test]
fn search_formats_matches_as_a_comma_separated_key_list() {
    let fx = fixture();
    for (name, body) in [("a.txt", "needle\n"), ("b.txt", "hay\n"), ("c.txt", "needle\n")] {
        std::fs::write(fx.ctx.docroot.join(name), body).unwrap();
        run(
            &fx.ctx,
            "-a",
            &[
                (WireType::Str, name),
                (WireType::Str, "A"),
                (WireType::U32, "2020"),
                (WireType::Str, name),
            ],
        );
    }

    let rsp = run(&fx.ctx, "-s", &[(WireType::Str, "needle"), (WireType::U32, "4")]);
    assert_eq!(reply_text(&rsp), "0,2");

    let rsp = run(&fx.ctx, "-s", &[(WireType::Str, "absent")]);
    assert_eq!(reply_text(&rsp), "No documents match");
}

#[test]
fn flush_requests_shutdown_with_its_reply() {
    let fx = fixture();
    let spec = command::by_flag("-f").unwrap();
    let outcome = dispatch(&fx.ctx, spec, &[]).unwrap();
    let Outcome::Shutdown(rsp) = outcome else {
        panic!("flush must request shutdown");
    };
    let parsed = Response::parse(&rsp).unwrap();
    assert_eq!(parsed.status, Status::Shutdown);
    assert_eq!(reply_text(&rsp), "Server is shutting down");
}
