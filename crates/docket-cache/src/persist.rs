//! On-disk image: `count: u32`, then `count` records of
//! `{key_len: u16, key, rsp_len: u16, rsp}`, little-endian, MRU→LRU.
//!
//! Exactly `rsp_len` bytes of response are written per record. The loader
//! stops at the first truncated or invalid record and keeps what it has.

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use std::fs::File;
use std::io::{self, BufReader, BufWriter, Read, Write};
use std::path::Path;

use crate::{CacheError, ResponseCache, MAX_KEYWORD_BYTES};

pub(crate) fn save(cache: &ResponseCache, path: &Path) -> Result<(), CacheError> {
    let mut out = BufWriter::new(File::create(path)?);
    out.write_u32::<LittleEndian>(cache.len() as u32)?;
    for (key, response) in cache.iter_recency() {
        out.write_u16::<LittleEndian>(key.len() as u16)?;
        out.write_all(key)?;
        out.write_u16::<LittleEndian>(response.len() as u16)?;
        out.write_all(response)?;
    }
    out.flush()?;
    Ok(())
}

pub(crate) fn load_into(cache: &mut ResponseCache, path: &Path) {
    let file = match File::open(path) {
        Ok(file) => file,
        Err(err) if err.kind() == io::ErrorKind::NotFound => return,
        Err(err) => {
            tracing::warn!(
                target = "docket.cache",
                path = %path.display(),
                error = %err,
                "failed to open cache image; starting cold"
            );
            return;
        }
    };
    let mut reader = BufReader::new(file);

    let Ok(count) = reader.read_u32::<LittleEndian>() else {
        return;
    };

    for _ in 0..count {
        let Some((key, response)) = read_entry(&mut reader) else {
            tracing::debug!(
                target = "docket.cache",
                loaded = cache.len(),
                "cache image ends early; keeping entries read so far"
            );
            break;
        };
        if cache.len() >= cache.capacity() {
            // The image may come from a run with a larger cache.
            break;
        }
        if cache.contains(&key) {
            continue;
        }
        cache.push_back_entry(key, response);
    }
}

fn read_entry(reader: &mut impl Read) -> Option<(Vec<u8>, Vec<u8>)> {
    let key_len = reader.read_u16::<LittleEndian>().ok()? as usize;
    if key_len == 0 || key_len > MAX_KEYWORD_BYTES {
        return None;
    }
    let mut key = vec![0u8; key_len];
    reader.read_exact(&mut key).ok()?;

    let rsp_len = reader.read_u16::<LittleEndian>().ok()? as usize;
    if rsp_len == 0 {
        return None;
    }
    let mut response = vec![0u8; rsp_len];
    reader.read_exact(&mut response).ok()?;

    Some((key, response))
}
