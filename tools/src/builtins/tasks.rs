//! Task list, reminders, and delegation recorders.
//!
//! Tasks and reminders are append-only JSONL. Completing a task appends an
//! updated record; readers fold by id and the last record wins. Ids are
//! assigned monotonically under the file's write lock.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use chrono::{Duration, SecondsFormat, Utc};
use serde::Deserialize;
use serde_json::{Value, json};

use steward_storage::{append_jsonl, read_jsonl_valid};
use steward_types::{ReminderRecord, TaskRecord};

use crate::{ExecContext, Tool, ToolError, ToolFut, parse_args};

fn now_iso() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true)
}

fn is_ledger_record(value: &Value) -> bool {
    value.get("id").is_some_and(Value::is_u64) && value.get("text").is_some_and(Value::is_string)
}

fn next_id(path: &Path) -> u64 {
    read_jsonl_valid(path, is_ledger_record)
        .iter()
        .filter_map(|v| v["id"].as_u64())
        .max()
        .unwrap_or(0)
        + 1
}

/// Tasks folded by id; the last record for an id wins.
fn folded_tasks(path: &Path) -> BTreeMap<u64, TaskRecord> {
    let mut tasks = BTreeMap::new();
    for value in read_jsonl_valid(path, is_ledger_record) {
        if let Ok(record) = serde_json::from_value::<TaskRecord>(value) {
            tasks.insert(record.id, record);
        }
    }
    tasks
}

#[derive(Debug, Default)]
pub struct TaskAddTool;

#[derive(Debug, Deserialize)]
struct TaskAddArgs {
    text: String,
    due: Option<String>,
}

impl Tool for TaskAddTool {
    fn name(&self) -> &'static str {
        "task_add"
    }

    fn description(&self) -> &'static str {
        "Add a task to the task list."
    }

    fn schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "text": { "type": "string", "minLength": 1 },
                "due": {
                    "type": "string",
                    "description": "Optional ISO-8601 due timestamp"
                }
            },
            "required": ["text"],
            "additionalProperties": false
        })
    }

    fn lock_target(&self, _args: &Value, ctx: &ExecContext) -> Option<PathBuf> {
        Some(ctx.storage.tasks.clone())
    }

    fn execute<'a>(&'a self, args: Value, ctx: &'a ExecContext) -> ToolFut<'a> {
        Box::pin(async move {
            let typed: TaskAddArgs = parse_args(&args)?;
            let record = TaskRecord {
                id: next_id(&ctx.storage.tasks),
                ts: now_iso(),
                text: typed.text,
                done: false,
                due: typed.due,
                kind: None,
            };
            append_jsonl(&ctx.storage.tasks, &record)?;
            Ok(json!({"id": record.id, "text": record.text}))
        })
    }
}

#[derive(Debug, Default)]
pub struct TaskListTool;

#[derive(Debug, Deserialize)]
struct TaskListArgs {
    status: Option<String>,
}

impl Tool for TaskListTool {
    fn name(&self) -> &'static str {
        "task_list"
    }

    fn description(&self) -> &'static str {
        "List tasks, filtered by status (open, done, or all)."
    }

    fn schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "status": {
                    "type": "string",
                    "enum": ["open", "done", "all"],
                    "description": "Which tasks to show (default open)"
                }
            },
            "additionalProperties": false
        })
    }

    fn execute<'a>(&'a self, args: Value, ctx: &'a ExecContext) -> ToolFut<'a> {
        Box::pin(async move {
            let typed: TaskListArgs = parse_args(&args)?;
            let status = typed.status.as_deref().unwrap_or("open");

            let tasks: Vec<TaskRecord> = folded_tasks(&ctx.storage.tasks)
                .into_values()
                .filter(|t| match status {
                    "open" => !t.done,
                    "done" => t.done,
                    _ => true,
                })
                .collect();
            let count = tasks.len();
            Ok(json!({"tasks": tasks, "count": count}))
        })
    }
}

#[derive(Debug, Default)]
pub struct TaskDoneTool;

#[derive(Debug, Deserialize)]
struct TaskDoneArgs {
    id: u64,
}

impl Tool for TaskDoneTool {
    fn name(&self) -> &'static str {
        "task_done"
    }

    fn description(&self) -> &'static str {
        "Mark a task as done by id."
    }

    fn schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "id": { "type": "integer", "minimum": 1 }
            },
            "required": ["id"],
            "additionalProperties": false
        })
    }

    fn lock_target(&self, _args: &Value, ctx: &ExecContext) -> Option<PathBuf> {
        Some(ctx.storage.tasks.clone())
    }

    fn execute<'a>(&'a self, args: Value, ctx: &'a ExecContext) -> ToolFut<'a> {
        Box::pin(async move {
            let typed: TaskDoneArgs = parse_args(&args)?;
            let mut task = folded_tasks(&ctx.storage.tasks)
                .remove(&typed.id)
                .ok_or_else(|| ToolError::failed(format!("task {} not found", typed.id)))?;
            if !task.done {
                task.done = true;
                task.ts = now_iso();
                append_jsonl(&ctx.storage.tasks, &task)?;
            }
            Ok(json!({"id": task.id, "done": true}))
        })
    }
}

#[derive(Debug, Default)]
pub struct RemindTool;

#[derive(Debug, Deserialize)]
struct RemindArgs {
    text: String,
    in_minutes: Option<i64>,
    due: Option<String>,
}

impl Tool for RemindTool {
    fn name(&self) -> &'static str {
        "remind"
    }

    fn description(&self) -> &'static str {
        "Record a reminder. Reminders are recorded, not fired."
    }

    fn schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "text": { "type": "string", "minLength": 1 },
                "in_minutes": {
                    "type": "integer",
                    "minimum": 1,
                    "description": "Due this many minutes from now"
                },
                "due": {
                    "type": "string",
                    "description": "Explicit ISO-8601 due timestamp"
                }
            },
            "required": ["text"],
            "additionalProperties": false
        })
    }

    fn lock_target(&self, _args: &Value, ctx: &ExecContext) -> Option<PathBuf> {
        Some(ctx.storage.reminders.clone())
    }

    fn execute<'a>(&'a self, args: Value, ctx: &'a ExecContext) -> ToolFut<'a> {
        Box::pin(async move {
            let typed: RemindArgs = parse_args(&args)?;
            let due = match (typed.due, typed.in_minutes) {
                (Some(due), _) => Some(due),
                (None, Some(minutes)) => Some(
                    (Utc::now() + Duration::minutes(minutes))
                        .to_rfc3339_opts(SecondsFormat::Secs, true),
                ),
                (None, None) => None,
            };
            let record = ReminderRecord {
                id: next_id(&ctx.storage.reminders),
                ts: now_iso(),
                text: record_text(typed.text),
                due,
            };
            append_jsonl(&ctx.storage.reminders, &record)?;
            Ok(json!({"id": record.id, "text": record.text, "due": record.due}))
        })
    }
}

fn record_text(text: String) -> String {
    text.trim().to_string()
}

/// Records a handoff to a named delegate. Dispatching the delegate is the
/// interactive layer's business; the core only keeps the ledger.
#[derive(Debug)]
pub struct DelegateTool {
    target: &'static str,
    tool_name: &'static str,
}

#[derive(Debug, Deserialize)]
struct DelegateArgs {
    task: String,
}

impl DelegateTool {
    #[must_use]
    pub fn coder() -> Self {
        Self {
            target: "coder",
            tool_name: "delegate_to_coder",
        }
    }

    #[must_use]
    pub fn researcher() -> Self {
        Self {
            target: "researcher",
            tool_name: "delegate_to_researcher",
        }
    }
}

impl Tool for DelegateTool {
    fn name(&self) -> &'static str {
        self.tool_name
    }

    fn description(&self) -> &'static str {
        "Hand a task to a delegate agent; the handoff is recorded in the task list."
    }

    fn schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "task": { "type": "string", "minLength": 1 }
            },
            "required": ["task"],
            "additionalProperties": false
        })
    }

    fn lock_target(&self, _args: &Value, ctx: &ExecContext) -> Option<PathBuf> {
        Some(ctx.storage.tasks.clone())
    }

    fn execute<'a>(&'a self, args: Value, ctx: &'a ExecContext) -> ToolFut<'a> {
        Box::pin(async move {
            let typed: DelegateArgs = parse_args(&args)?;
            let record = TaskRecord {
                id: next_id(&ctx.storage.tasks),
                ts: now_iso(),
                text: format!("[{}] {}", self.target, typed.task.trim()),
                done: false,
                due: None,
                kind: Some("delegation".to_string()),
            };
            append_jsonl(&ctx.storage.tasks, &record)?;
            Ok(json!({"id": record.id, "target": self.target, "task": typed.task}))
        })
    }
}
