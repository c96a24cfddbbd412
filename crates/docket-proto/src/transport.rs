//! FIFO transport contract.
//!
//! Requests arrive on a well-known named pipe; each client owns a private
//! reply pipe named after its process id. This module only knows how to
//! create, open, and frame-read/-write those endpoints; who opens what and
//! when is the server loop's business.
//!
//! Owners open their own endpoint read+write so the descriptor stays usable
//! across peers connecting and disconnecting (a read-only FIFO descriptor
//! would see EOF every time the last writer closed).

use byteorder::{ByteOrder, LittleEndian};
use std::ffi::CString;
use std::fs::{File, OpenOptions};
use std::io::{self, Read, Write};
use std::os::unix::ffi::OsStrExt;
use std::path::{Path, PathBuf};

use crate::error::ProtoError;
use crate::{MAX_FRAME_BYTES, REQUEST_HEADER_BYTES, RESPONSE_HEADER_BYTES};

/// Well-known endpoint names inside the runtime directory.
pub const REQUEST_FIFO: &str = "server.fifo";

/// Resolves endpoint paths under a runtime directory (`/tmp` by default).
#[derive(Debug, Clone)]
pub struct Endpoints {
    dir: PathBuf,
}

impl Endpoints {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn request_path(&self) -> PathBuf {
        self.dir.join(REQUEST_FIFO)
    }

    pub fn reply_path(&self, pid: i32) -> PathBuf {
        self.dir.join(format!("client_{pid}.fifo"))
    }
}

impl Default for Endpoints {
    fn default() -> Self {
        Self::new("/tmp")
    }
}

/// Create a FIFO at `path` with permissions 0600, replacing any stale file
/// left behind by a previous run.
pub fn create_fifo(path: &Path) -> Result<(), ProtoError> {
    match std::fs::remove_file(path) {
        Ok(()) => {}
        Err(err) if err.kind() == io::ErrorKind::NotFound => {}
        Err(err) => return Err(err.into()),
    }
    let cpath = CString::new(path.as_os_str().as_bytes())
        .map_err(|_| io::Error::from(io::ErrorKind::InvalidInput))?;
    let rc = unsafe { libc::mkfifo(cpath.as_ptr(), 0o600) };
    if rc != 0 {
        return Err(io::Error::last_os_error().into());
    }
    Ok(())
}

/// Open an endpoint this process owns. Read+write, so the descriptor is
/// immune to peer disconnects and the open itself never blocks.
pub fn open_owned(path: &Path) -> io::Result<File> {
    OpenOptions::new().read(true).write(true).open(path)
}

/// Open a peer's reply endpoint write-only. Blocks until the owner has its
/// read end open; owners open read+write before requesting, so in practice
/// this returns immediately.
pub fn open_reply(path: &Path) -> io::Result<File> {
    OpenOptions::new().write(true).open(path)
}

/// Remove an endpoint at shutdown. Missing files are fine.
pub fn remove_endpoint(path: &Path) {
    match std::fs::remove_file(path) {
        Ok(()) => {}
        Err(err) if err.kind() == io::ErrorKind::NotFound => {}
        Err(err) => {
            tracing::debug!(
                target = "docket.transport",
                path = %path.display(),
                error = %err,
                "failed to remove fifo endpoint"
            );
        }
    }
}

fn read_frame(reader: &mut impl Read, header_bytes: usize) -> Result<Vec<u8>, ProtoError> {
    let mut frame = vec![0u8; header_bytes];
    reader.read_exact(&mut frame)?;
    let declared = LittleEndian::read_u16(&frame[0..2]) as usize;
    if declared < header_bytes || declared > MAX_FRAME_BYTES {
        return Err(ProtoError::FrameLength {
            len: declared,
            min: header_bytes,
            max: MAX_FRAME_BYTES,
        });
    }
    frame.resize(declared, 0);
    reader.read_exact(&mut frame[header_bytes..])?;
    Ok(frame)
}

/// Header-first read of one request frame.
pub fn read_request_frame(reader: &mut impl Read) -> Result<Vec<u8>, ProtoError> {
    read_frame(reader, REQUEST_HEADER_BYTES)
}

/// Header-first read of one response frame.
pub fn read_response_frame(reader: &mut impl Read) -> Result<Vec<u8>, ProtoError> {
    read_frame(reader, RESPONSE_HEADER_BYTES)
}

/// Write one finished frame. `write_all` already retries on EINTR; every
/// other error surfaces to the caller.
pub fn write_frame(writer: &mut impl Write, frame: &[u8]) -> io::Result<()> {
    writer.write_all(frame)?;
    writer.flush()
}
