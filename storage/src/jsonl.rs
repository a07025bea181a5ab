//! Append-only JSONL with per-line corruption quarantine.

use std::collections::HashSet;
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use serde::Serialize;
use serde_json::Value;

use crate::StorageError;

/// Append one record as a single line. Never rewrites existing content.
pub fn append_jsonl<T: Serialize>(path: &Path, record: &T) -> Result<(), StorageError> {
    let line = serde_json::to_string(record).map_err(|e| StorageError::serialize(path, e))?;
    append_raw_line(path, &line).map_err(|e| StorageError::write(path, e))
}

/// Read every parseable line that passes `is_valid`. Blank lines are
/// ignored; lines that fail to parse or fail validation are dropped from
/// the result and appended to `<path>.corrupt` for forensic inspection.
///
/// Quarantining is idempotent: content already present in the corrupt file
/// is not appended again on subsequent reads.
#[must_use]
pub fn read_jsonl_valid(path: &Path, is_valid: impl Fn(&Value) -> bool) -> Vec<Value> {
    let text = match fs::read_to_string(path) {
        Ok(text) => text,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Vec::new(),
        Err(e) => {
            tracing::warn!(path = %path.display(), "JSONL read failed: {e}");
            return Vec::new();
        }
    };

    let corrupt_path = corrupt_sibling(path);
    let mut already_quarantined = load_quarantined(&corrupt_path);

    let mut records = Vec::new();
    for line in text.lines() {
        if line.trim().is_empty() {
            continue;
        }
        match serde_json::from_str::<Value>(line) {
            Ok(value) if is_valid(&value) => records.push(value),
            _ => quarantine_line(&corrupt_path, line, &mut already_quarantined),
        }
    }
    records
}

fn corrupt_sibling(path: &Path) -> PathBuf {
    let mut name = path.as_os_str().to_os_string();
    name.push(".corrupt");
    PathBuf::from(name)
}

fn load_quarantined(corrupt_path: &Path) -> HashSet<String> {
    fs::read_to_string(corrupt_path)
        .map(|text| text.lines().map(str::to_string).collect())
        .unwrap_or_default()
}

fn quarantine_line(corrupt_path: &Path, line: &str, seen: &mut HashSet<String>) {
    if seen.contains(line) {
        return;
    }
    if let Err(e) = append_raw_line(corrupt_path, line) {
        tracing::warn!(path = %corrupt_path.display(), "Failed to quarantine line: {e}");
        return;
    }
    tracing::warn!(path = %corrupt_path.display(), "Quarantined corrupt JSONL line");
    seen.insert(line.to_string());
}

fn append_raw_line(path: &Path, line: &str) -> std::io::Result<()> {
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        fs::create_dir_all(parent)?;
    }
    let mut file = OpenOptions::new().create(true).append(true).open(path)?;
    file.write_all(line.as_bytes())?;
    file.write_all(b"\n")?;
    file.flush()
}

#[cfg(test)]
mod tests {
    use std::fs;

    use serde_json::{Value, json};
    use steward_types::TaskRecord;

    use super::{append_jsonl, read_jsonl_valid};

    fn has_id(value: &Value) -> bool {
        value.get("id").is_some_and(Value::is_u64)
    }

    #[test]
    fn appends_then_reads_back_valid_records() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("tasks.jsonl");
        let task = TaskRecord {
            id: 1,
            ts: "2026-08-01T00:00:00Z".to_string(),
            text: "water the plants".to_string(),
            done: false,
            due: None,
            kind: None,
        };

        append_jsonl(&path, &task).expect("append");
        append_jsonl(&path, &json!({"id": 2, "ts": "t", "text": "x"})).expect("append");

        let records = read_jsonl_valid(&path, has_id);
        assert_eq!(records.len(), 2);
        assert_eq!(records[0]["text"], json!("water the plants"));
    }

    #[test]
    fn missing_file_reads_as_empty() {
        let dir = tempfile::tempdir().expect("tempdir");
        assert!(read_jsonl_valid(&dir.path().join("absent.jsonl"), has_id).is_empty());
    }

    #[test]
    fn malformed_lines_are_dropped_and_quarantined_exactly_once() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("tasks.jsonl");
        fs::write(
            &path,
            "{\"id\": 1, \"ts\": \"t\", \"text\": \"ok\"}\nnot json at all\n\n{\"missing\": \"id\"}\n",
        )
        .expect("seed");

        let first = read_jsonl_valid(&path, has_id);
        assert_eq!(first.len(), 1);

        let corrupt = fs::read_to_string(dir.path().join("tasks.jsonl.corrupt")).expect("corrupt");
        let lines: Vec<_> = corrupt.lines().collect();
        assert_eq!(lines, vec!["not json at all", "{\"missing\": \"id\"}"]);

        // A second read must not re-quarantine the same content.
        let second = read_jsonl_valid(&path, has_id);
        assert_eq!(second.len(), 1);
        let corrupt_again =
            fs::read_to_string(dir.path().join("tasks.jsonl.corrupt")).expect("corrupt");
        assert_eq!(corrupt_again, corrupt);
    }

    #[test]
    fn blank_lines_are_ignored_without_quarantine() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("log.jsonl");
        fs::write(&path, "\n\n{\"id\": 7, \"ts\": \"t\", \"text\": \"x\"}\n\n").expect("seed");

        let records = read_jsonl_valid(&path, has_id);
        assert_eq!(records.len(), 1);
        assert!(!dir.path().join("log.jsonl.corrupt").exists());
    }
}
