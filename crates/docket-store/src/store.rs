//! The record store proper.
//!
//! One file, one writer (the server loop), any number of concurrent
//! readers. All I/O is positioned (`read_at`/`write_at`) against a shared
//! descriptor, and every operation moves a whole record, so readers can
//! observe stale records but never torn ones.

use std::fs::OpenOptions;
use std::os::unix::fs::{FileExt, OpenOptionsExt};
use std::path::{Path, PathBuf};

use crate::error::StoreError;
use crate::record::{decode_record, encode_record, tombstone_record, Document, RECORD_BYTES};

#[derive(Debug)]
pub struct RecordStore {
    file: std::fs::File,
    path: PathBuf,
}

impl RecordStore {
    /// Open the store file read/write, creating it (mode 0600) if absent.
    ///
    /// An existing file must hold a whole number of records.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let path = path.as_ref().to_path_buf();
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .mode(0o600)
            .open(&path)?;
        let len = file.metadata()?.len();
        if len % RECORD_BYTES as u64 != 0 {
            return Err(StoreError::Misaligned {
                len,
                record: RECORD_BYTES,
            });
        }
        Ok(Self { file, path })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append a document, assigning it the next record index as its key.
    pub fn append(&self, doc: &Document) -> Result<u32, StoreError> {
        let len = self.file.metadata()?.len();
        let key = len / RECORD_BYTES as u64;
        if key > i32::MAX as u64 {
            return Err(StoreError::KeySpaceExhausted);
        }
        let record = encode_record(key as i32, doc);
        self.file.write_all_at(&record, len)?;
        Ok(key as u32)
    }

    /// Read the live record with key `key`. Tombstoned and out-of-range keys
    /// are both reported as not found.
    pub fn get(&self, key: u32) -> Result<Document, StoreError> {
        let record = self.read_record(key)?;
        let (stored_key, doc) = decode_record(&record);
        if stored_key != key as i32 {
            return Err(StoreError::NotFound { key });
        }
        Ok(doc)
    }

    /// Tombstone the record with key `key`. Fails without touching the file
    /// when the slot is not live, so a second delete of the same key errors.
    pub fn delete(&self, key: u32) -> Result<(), StoreError> {
        let record = self.read_record(key)?;
        let (stored_key, _) = decode_record(&record);
        if stored_key != key as i32 {
            return Err(StoreError::NotFound { key });
        }
        self.file
            .write_all_at(&tombstone_record(), key as u64 * RECORD_BYTES as u64)?;
        Ok(())
    }

    /// Number of record slots, live and tombstoned alike.
    pub fn total(&self) -> Result<u32, StoreError> {
        let len = self.file.metadata()?.len();
        Ok((len / RECORD_BYTES as u64) as u32)
    }

    fn read_record(&self, key: u32) -> Result<[u8; RECORD_BYTES], StoreError> {
        let offset = key as u64 * RECORD_BYTES as u64;
        let len = self.file.metadata()?.len();
        if offset + RECORD_BYTES as u64 > len {
            return Err(StoreError::NotFound { key });
        }
        let mut record = [0u8; RECORD_BYTES];
        self.file.read_exact_at(&mut record, offset)?;
        Ok(record)
    }
}
