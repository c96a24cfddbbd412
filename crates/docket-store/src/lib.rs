//! Persistent document index: a flat file of fixed-size records plus the
//! body-file keyword scanner.
//!
//! Records are never relocated; a document's key is its record index for the
//! lifetime of the file. Deletion tombstones the slot in place and the space
//! is never reclaimed.

mod error;
pub mod record;
pub mod scan;
mod store;

pub use error::StoreError;
pub use record::{Document, RECORD_BYTES, TOMBSTONE_KEY};
pub use scan::{count_matching_lines, document_path, SCAN_CHUNK_BYTES};
pub use store::RecordStore;
