//! Append-only audit trail.
//!
//! The process-wide serial choke point: every completed handler call
//! produces exactly one entry, appended in completion order under a
//! single mutex.

use std::path::PathBuf;

use steward_storage::append_jsonl;
use steward_types::AuditEntry;

pub struct AuditLog {
    path: PathBuf,
    lock: tokio::sync::Mutex<()>,
}

impl AuditLog {
    #[must_use]
    pub fn new(path: PathBuf) -> Self {
        Self {
            path,
            lock: tokio::sync::Mutex::new(()),
        }
    }

    #[must_use]
    pub fn path(&self) -> &std::path::Path {
        &self.path
    }

    /// Append one entry. An audit write failure is logged, never
    /// propagated; the tool result still reaches the caller.
    pub async fn record(&self, entry: &AuditEntry) {
        let _guard = self.lock.lock().await;
        if let Err(e) = append_jsonl(&self.path, entry) {
            tracing::error!(path = %self.path.display(), "Audit append failed: {e}");
        }
    }
}

#[cfg(test)]
mod tests {
    use serde_json::{Value, json};
    use steward_types::AuditEntry;

    use super::AuditLog;

    fn entry(tool: &str, ok: bool) -> AuditEntry {
        AuditEntry {
            ts: "2026-08-01T00:00:00Z".to_string(),
            tool: tool.to_string(),
            args: json!({}),
            ok,
            duration_ms: 1,
            correlation_id: "c-1".to_string(),
            error: None,
        }
    }

    #[tokio::test]
    async fn entries_append_in_completion_order() {
        let dir = tempfile::tempdir().expect("tempdir");
        let log = AuditLog::new(dir.path().join("audit.jsonl"));

        log.record(&entry("get_time", true)).await;
        log.record(&entry("remember", false)).await;

        let text = std::fs::read_to_string(log.path()).expect("read");
        let tools: Vec<String> = text
            .lines()
            .map(|l| serde_json::from_str::<Value>(l).expect("line")["tool"]
                .as_str()
                .expect("tool")
                .to_string())
            .collect();
        assert_eq!(tools, vec!["get_time", "remember"]);
    }
}
