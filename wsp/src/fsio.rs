//! File-open helpers shared by the archive and file layers.
//!
//! Every logical operation reopens the backing file, so open/seek error
//! mapping is centralized here. Locking is advisory and exclusive, scoped
//! to the lifetime of the handle that took it.

use std::fs::{File, OpenOptions};
use std::io;
use std::path::Path;

use crate::error::{Result, WhisperError};

/// Wraps an `io::Error` with the path it occurred on.
pub(crate) fn io_error(path: &Path, source: io::Error) -> WhisperError {
    WhisperError::Io {
        path: path.display().to_string(),
        source,
    }
}

fn map_open_error(path: &Path, source: io::Error) -> WhisperError {
    if source.kind() == io::ErrorKind::NotFound {
        WhisperError::FileNotFound {
            path: path.display().to_string(),
        }
    } else {
        io_error(path, source)
    }
}

/// Opens an existing file read-only.
pub(crate) fn open_read(path: &Path) -> Result<File> {
    File::open(path).map_err(|e| map_open_error(path, e))
}

/// Creates or truncates a file and opens it for read + write.
pub(crate) fn open_create(path: &Path) -> Result<File> {
    OpenOptions::new()
        .read(true)
        .write(true)
        .create(true)
        .truncate(true)
        .open(path)
        .map_err(|e| map_open_error(path, e))
}

/// Opens an existing file for in-place update (read + write, no truncate).
pub(crate) fn open_update(path: &Path) -> Result<File> {
    OpenOptions::new()
        .read(true)
        .write(true)
        .open(path)
        .map_err(|e| map_open_error(path, e))
}

/// Takes an advisory exclusive lock on the handle, blocking until granted.
///
/// The lock is released when the handle is closed.
pub(crate) fn lock_exclusive(path: &Path, file: &File) -> Result<()> {
    file.lock().map_err(|e| io_error(path, e))
}
