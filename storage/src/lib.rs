//! Atomic single-file JSON and append-only JSONL with corruption quarantine.
//!
//! The substrate the router and executor depend on. Three guarantees:
//! a reader never observes partial content, an appender never truncates,
//! and corrupt lines never crash the process.

mod atomic;
mod json;
mod jsonl;
mod locks;

pub use atomic::{atomic_write, recover_bak_file};
pub use json::{read_json, write_json_atomic};
pub use jsonl::{append_jsonl, read_jsonl_valid};
pub use locks::PathLocks;

use std::path::Path;

use steward_types::ErrorKind;

/// Storage-layer failures. Reads are designed never to surface these;
/// writes propagate them so callers can report `STORAGE_WRITE_ERROR`.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("storage write failed for {path}: {source}")]
    Write {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("could not serialize record for {path}: {source}")]
    Serialize {
        path: String,
        #[source]
        source: serde_json::Error,
    },
}

impl StorageError {
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        ErrorKind::StorageWriteError
    }

    pub(crate) fn write(path: &Path, source: std::io::Error) -> Self {
        Self::Write {
            path: path.display().to_string(),
            source,
        }
    }

    pub(crate) fn serialize(path: &Path, source: serde_json::Error) -> Self {
        Self::Serialize {
            path: path.display().to_string(),
            source,
        }
    }
}

/// Seconds since the Unix epoch, used to stamp quarantined files.
pub(crate) fn unix_ts() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}
