//! Document body lookup and the byte-wise keyword scanner.

use std::ffi::OsStr;
use std::io::{self, Read};
use std::os::unix::ffi::OsStrExt;
use std::path::{Path, PathBuf};

use crate::error::StoreError;
use crate::record::Document;

/// Bodies are streamed in chunks of this size.
pub const SCAN_CHUNK_BYTES: usize = 8192;

/// Resolve a document's body file under the document root. The stored path
/// bytes are used as-is; they need not be valid UTF-8.
pub fn document_path(docroot: &Path, doc: &Document) -> Result<PathBuf, StoreError> {
    if doc.path.is_empty() {
        return Err(StoreError::EmptyDocumentPath);
    }
    Ok(docroot.join(OsStr::from_bytes(&doc.path)))
}

/// Count lines containing at least one occurrence of `keyword`.
///
/// The scanner is strictly byte-wise: no escapes, no Unicode awareness. A
/// line without a trailing newline at EOF still counts if it matched. An
/// empty keyword matches nothing. With `stop_at_first`, the scan
/// short-circuits on the first full match and reports 1.
///
/// Matching is a two-variable automaton: `match_pos` bytes of the keyword
/// matched so far (reset on mismatch, restarted at 1 when the mismatching
/// byte is the keyword's first), and a per-line hit flag.
pub fn count_matching_lines(
    reader: &mut impl Read,
    keyword: &[u8],
    stop_at_first: bool,
) -> io::Result<u32> {
    if keyword.is_empty() {
        return Ok(0);
    }

    let mut buf = [0u8; SCAN_CHUNK_BYTES];
    let mut match_pos = 0usize;
    let mut line_hit = false;
    let mut count = 0u32;

    loop {
        let n = match reader.read(&mut buf) {
            Ok(0) => break,
            Ok(n) => n,
            Err(err) if err.kind() == io::ErrorKind::Interrupted => continue,
            Err(err) => return Err(err),
        };

        for &byte in &buf[..n] {
            if byte == keyword[match_pos] {
                match_pos += 1;
                if match_pos == keyword.len() {
                    if stop_at_first {
                        return Ok(1);
                    }
                    line_hit = true;
                    match_pos = 0;
                }
            } else if byte == keyword[0] {
                match_pos = 1;
            } else {
                match_pos = 0;
            }

            if byte == b'\n' && line_hit {
                count += 1;
                line_hit = false;
            }
        }
    }

    if line_hit {
        count += 1;
    }
    Ok(count)
}
