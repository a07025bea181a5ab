//! Whole-document JSON read/write.
//!
//! Reads never fail: a missing file yields the caller's default document,
//! and an unparseable file is quarantined to `<path>.corrupt.<ts>` before
//! the default is returned.

use std::fs;
use std::path::Path;

use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::{StorageError, atomic::atomic_write, unix_ts};

/// Read a JSON document, falling back to `T::default()` when the file is
/// missing or corrupt. Corrupt files are moved aside for forensics.
#[must_use]
pub fn read_json<T: DeserializeOwned + Default>(path: &Path) -> T {
    let bytes = match fs::read(path) {
        Ok(bytes) => bytes,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return T::default(),
        Err(e) => {
            tracing::warn!(path = %path.display(), "JSON read failed, using default: {e}");
            return T::default();
        }
    };

    match serde_json::from_slice(&bytes) {
        Ok(doc) => doc,
        Err(e) => {
            quarantine_file(path);
            tracing::warn!(path = %path.display(), "JSON parse failed, quarantined: {e}");
            T::default()
        }
    }
}

/// Serialize `doc` and write it atomically.
pub fn write_json_atomic<T: Serialize>(path: &Path, doc: &T) -> Result<(), StorageError> {
    let mut bytes =
        serde_json::to_vec_pretty(doc).map_err(|e| StorageError::serialize(path, e))?;
    bytes.push(b'\n');
    atomic_write(path, &bytes).map_err(|e| StorageError::write(path, e))
}

fn quarantine_file(path: &Path) {
    let dest = quarantine_name(path);
    if let Err(e) = fs::rename(path, &dest) {
        tracing::warn!(path = %path.display(), "Failed to quarantine corrupt file: {e}");
    }
}

fn quarantine_name(path: &Path) -> std::path::PathBuf {
    let mut name = path.as_os_str().to_os_string();
    name.push(format!(".corrupt.{}", unix_ts()));
    std::path::PathBuf::from(name)
}
