//! Storage record shapes. The layouts are stable; collaborators read them.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::ErrorObject;

/// One pinned memory: `{ts, text, score?}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MemoryEntry {
    pub ts: String,
    pub text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub score: Option<f64>,
}

/// The memory file: `{version: 1, entries: [...]}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MemoryDocument {
    pub version: u32,
    pub entries: Vec<MemoryEntry>,
}

impl Default for MemoryDocument {
    fn default() -> Self {
        Self {
            version: 1,
            entries: Vec::new(),
        }
    }
}

/// One task line in `tasks.jsonl`. Ids are assigned monotonically.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskRecord {
    pub id: u64,
    pub ts: String,
    pub text: String,
    #[serde(default)]
    pub done: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub due: Option<String>,
    /// Set to `"delegation"` for handoff entries recorded by delegate tools.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
}

/// One reminder line in `reminders.jsonl`. Reminders are recorded, not fired.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReminderRecord {
    pub id: u64,
    pub ts: String,
    pub text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub due: Option<String>,
}

/// One line of the append-only audit trail, written by the executor for
/// every completed handler call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditEntry {
    pub ts: String,
    pub tool: String,
    pub args: Value,
    pub ok: bool,
    pub duration_ms: u64,
    pub correlation_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorObject>,
}
