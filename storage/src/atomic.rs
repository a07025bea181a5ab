//! Atomic file writes via temp file + rename.
//!
//! The temp file is created in the same directory as the target; renaming
//! across filesystems is not atomic, and the OS temp dir is routinely on a
//! different mount. On Windows, rename-over-existing fails, so a
//! backup-and-restore fallback avoids data loss when overwriting.

use std::fs;
use std::io::{self, Write};
use std::path::Path;

use tempfile::NamedTempFile;

/// Write `bytes` to `path` atomically. Creates parent directories as
/// needed. On return the target holds either its previous content or
/// `bytes`, never a mix.
pub fn atomic_write(path: &Path, bytes: &[u8]) -> io::Result<()> {
    let parent = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    fs::create_dir_all(parent)?;

    let mut tmp = NamedTempFile::new_in(parent)?;
    tmp.write_all(bytes)?;
    tmp.as_file().sync_all()?;

    if let Err(err) = tmp.persist(path) {
        if path.exists() {
            // Windows fallback: move the old file aside, retry, restore on failure.
            let backup = path.with_extension("bak");
            let _ = fs::remove_file(&backup);
            fs::rename(path, &backup)?;

            if let Err(retry_err) = err.file.persist(path) {
                let _ = fs::rename(&backup, path);
                return Err(retry_err.error);
            }
            if let Err(e) = fs::remove_file(&backup) {
                tracing::warn!(
                    path = %backup.display(),
                    "Failed to remove .bak after atomic write: {e}"
                );
            }
        } else {
            return Err(err.error);
        }
    }
    Ok(())
}

/// Recover from an interrupted atomic write by restoring the `.bak` file.
///
/// If `path` does not exist but `path.bak` does, a crash landed inside the
/// backup-rename window above; rename the backup back so callers can
/// proceed with the previous document.
pub fn recover_bak_file(path: &Path) {
    let backup = path.with_extension("bak");
    if !path.exists() && backup.exists() {
        match fs::rename(&backup, path) {
            Ok(()) => {
                tracing::warn!(
                    path = %path.display(),
                    "Recovered .bak file from interrupted atomic write"
                );
            }
            Err(e) => {
                tracing::warn!(
                    path = %path.display(),
                    "Failed to recover .bak file: {e}"
                );
            }
        }
    }
}
