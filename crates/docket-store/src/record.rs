//! On-disk record layout.
//!
//! A record is 472 packed bytes: `key: i32` (LE), three NUL-terminated
//! fixed-width text fields, `year: u32` (LE). A tombstone is an all-zero
//! record whose key is `-1`.

use byteorder::{ByteOrder, LittleEndian};

pub const TITLE_BYTES: usize = 200;
pub const AUTHORS_BYTES: usize = 200;
pub const PATH_BYTES: usize = 64;

/// key + title + authors + path + year.
pub const RECORD_BYTES: usize = 4 + TITLE_BYTES + AUTHORS_BYTES + PATH_BYTES + 4;

/// Key value marking a dead slot.
pub const TOMBSTONE_KEY: i32 = -1;

const TITLE_OFFSET: usize = 4;
const AUTHORS_OFFSET: usize = TITLE_OFFSET + TITLE_BYTES;
const PATH_OFFSET: usize = AUTHORS_OFFSET + AUTHORS_BYTES;
const YEAR_OFFSET: usize = PATH_OFFSET + PATH_BYTES;

/// Document metadata as handled in memory. Text fields carry the raw bytes
/// received on the wire — the record is a byte-faithful copy of the
/// request, and decoding to text happens only where a reply is formatted.
/// The key is not part of the value: it is assigned by the store on append
/// and equals the record index.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Document {
    pub title: Vec<u8>,
    pub authors: Vec<u8>,
    pub path: Vec<u8>,
    pub year: u32,
}

/// Serialise a record. Text fields are truncated to their field width minus
/// the terminating NUL; the remainder of each field is zero-filled.
pub(crate) fn encode_record(key: i32, doc: &Document) -> [u8; RECORD_BYTES] {
    let mut buf = [0u8; RECORD_BYTES];
    LittleEndian::write_i32(&mut buf[0..4], key);
    copy_field(&mut buf[TITLE_OFFSET..AUTHORS_OFFSET], &doc.title);
    copy_field(&mut buf[AUTHORS_OFFSET..PATH_OFFSET], &doc.authors);
    copy_field(&mut buf[PATH_OFFSET..YEAR_OFFSET], &doc.path);
    LittleEndian::write_u32(&mut buf[YEAR_OFFSET..], doc.year);
    buf
}

pub(crate) fn decode_record(buf: &[u8; RECORD_BYTES]) -> (i32, Document) {
    let key = LittleEndian::read_i32(&buf[0..4]);
    let doc = Document {
        title: field_bytes(&buf[TITLE_OFFSET..AUTHORS_OFFSET]),
        authors: field_bytes(&buf[AUTHORS_OFFSET..PATH_OFFSET]),
        path: field_bytes(&buf[PATH_OFFSET..YEAR_OFFSET]),
        year: LittleEndian::read_u32(&buf[YEAR_OFFSET..]),
    };
    (key, doc)
}

pub(crate) fn tombstone_record() -> [u8; RECORD_BYTES] {
    let mut buf = [0u8; RECORD_BYTES];
    LittleEndian::write_i32(&mut buf[0..4], TOMBSTONE_KEY);
    buf
}

fn copy_field(field: &mut [u8], bytes: &[u8]) {
    let take = bytes.len().min(field.len() - 1);
    field[..take].copy_from_slice(&bytes[..take]);
}

fn field_bytes(field: &[u8]) -> Vec<u8> {
    let end = field.iter().position(|&b| b == 0).unwrap_or(field.len());
    field[..end].to_vec()
}
