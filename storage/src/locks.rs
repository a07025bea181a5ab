//! Process-wide per-path write serialization.
//!
//! Tool executions touching the same storage file hold the file's mutex for
//! the duration of the handler, which rules out write-write interleaving
//! and torn JSONL appends. Readers never take these locks; atomic-rename
//! writes guarantee they observe a self-consistent prior version.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

/// Lazily-populated map of `path -> write mutex`.
#[derive(Debug, Default)]
pub struct PathLocks {
    inner: Mutex<HashMap<PathBuf, Arc<tokio::sync::Mutex<()>>>>,
}

impl PathLocks {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Fetch (creating on first use) the mutex guarding `path`. The caller
    /// holds the returned guard across its write.
    #[must_use]
    pub fn for_path(&self, path: &Path) -> Arc<tokio::sync::Mutex<()>> {
        let mut map = self.inner.lock().expect("path lock map poisoned");
        map.entry(path.to_path_buf())
            .or_insert_with(|| Arc::new(tokio::sync::Mutex::new(())))
            .clone()
    }
}

#[cfg(test)]
mod tests {
    use std::path::Path;
    use std::sync::Arc;

    use super::PathLocks;

    #[test]
    fn same_path_yields_the_same_mutex() {
        let locks = PathLocks::new();
        let a = locks.for_path(Path::new("/data/tasks.jsonl"));
        let b = locks.for_path(Path::new("/data/tasks.jsonl"));
        assert!(Arc::ptr_eq(&a, &b));
    }

    #[test]
    fn different_paths_get_independent_mutexes() {
        let locks = PathLocks::new();
        let a = locks.for_path(Path::new("/data/tasks.jsonl"));
        let b = locks.for_path(Path::new("/data/memory.json"));
        assert!(!Arc::ptr_eq(&a, &b));
    }

    #[tokio::test]
    async fn holding_the_lock_blocks_a_second_writer() {
        let locks = PathLocks::new();
        let m = locks.for_path(Path::new("/data/audit.jsonl"));
        let guard = m.lock().await;
        assert!(locks.for_path(Path::new("/data/audit.jsonl")).try_lock().is_err());
        drop(guard);
    }
}
