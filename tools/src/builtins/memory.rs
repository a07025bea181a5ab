//! Memory tools: pin facts and recall them by query.

use std::path::PathBuf;

use chrono::{SecondsFormat, Utc};
use serde::Deserialize;
use serde_json::{Value, json};

use steward_storage::{read_json, write_json_atomic};
use steward_types::{MemoryDocument, MemoryEntry};

use crate::{ExecContext, Tool, ToolError, ToolFut, parse_args};

const DEFAULT_RECALL_LIMIT: usize = 5;

/// Store a fact in the memory file.
#[derive(Debug, Default)]
pub struct RememberTool;

#[derive(Debug, Deserialize)]
struct RememberArgs {
    text: String,
}

impl Tool for RememberTool {
    fn name(&self) -> &'static str {
        "remember"
    }

    fn description(&self) -> &'static str {
        "Store a fact, decision, or preference for later recall."
    }

    fn schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "text": {
                    "type": "string",
                    "minLength": 1,
                    "description": "The fact to remember (e.g., 'I parked on level 3')"
                }
            },
            "required": ["text"],
            "additionalProperties": false
        })
    }

    fn lock_target(&self, _args: &Value, ctx: &ExecContext) -> Option<PathBuf> {
        Some(ctx.storage.memory.clone())
    }

    fn writes_memory(&self) -> bool {
        true
    }

    fn execute<'a>(&'a self, args: Value, ctx: &'a ExecContext) -> ToolFut<'a> {
        Box::pin(async move {
            let typed: RememberArgs = parse_args(&args)?;
            let text = typed.text.trim().to_string();
            if text.is_empty() {
                return Err(ToolError::bad_args("text must not be blank"));
            }

            let mut doc: MemoryDocument = read_json(&ctx.storage.memory);
            doc.entries.push(MemoryEntry {
                ts: Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true),
                text,
                score: None,
            });
            write_json_atomic(&ctx.storage.memory, &doc)?;

            Ok(json!({"count": doc.entries.len()}))
        })
    }
}

/// Query the memory file, ranked by token overlap.
#[derive(Debug, Default)]
pub struct RecallTool;

#[derive(Debug, Deserialize)]
struct RecallArgs {
    query: String,
    limit: Option<usize>,
}

impl Tool for RecallTool {
    fn name(&self) -> &'static str {
        "recall"
    }

    fn description(&self) -> &'static str {
        "Search stored memories for entries matching a query."
    }

    fn schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "query": {
                    "type": "string",
                    "minLength": 1,
                    "description": "Words to look for in stored memories"
                },
                "limit": {
                    "type": "integer",
                    "minimum": 1,
                    "maximum": 50,
                    "description": "Maximum entries to return (default 5)"
                }
            },
            "required": ["query"],
            "additionalProperties": false
        })
    }

    fn reads_memory(&self) -> bool {
        true
    }

    fn execute<'a>(&'a self, args: Value, ctx: &'a ExecContext) -> ToolFut<'a> {
        Box::pin(async move {
            let typed: RecallArgs = parse_args(&args)?;
            let limit = typed.limit.unwrap_or(DEFAULT_RECALL_LIMIT);

            let doc: MemoryDocument = read_json(&ctx.storage.memory);
            let total = doc.entries.len();

            let mut scored: Vec<MemoryEntry> = doc
                .entries
                .into_iter()
                .filter_map(|entry| {
                    let score = score_entry(&typed.query, &entry.text);
                    (score > 0.0).then(|| MemoryEntry {
                        score: Some(score),
                        ..entry
                    })
                })
                .collect();
            scored.sort_by(|a, b| {
                b.score
                    .partial_cmp(&a.score)
                    .unwrap_or(std::cmp::Ordering::Equal)
            });
            scored.truncate(limit);

            Ok(json!({"entries": scored, "total": total}))
        })
    }
}

/// Token-overlap score with a bonus for a whole-query substring match.
fn score_entry(query: &str, text: &str) -> f64 {
    let text_lower = text.to_lowercase();
    let query_lower = query.to_lowercase();

    let mut score = 0.0;
    for token in query_lower.split_whitespace() {
        if text_lower.contains(token) {
            score += 1.0;
        }
    }
    if !query_lower.trim().is_empty() && text_lower.contains(query_lower.trim()) {
        score += 2.0;
    }
    score
}
