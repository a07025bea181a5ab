//! File tools. Every path goes through the `PathCapability`.

use std::path::PathBuf;

use ignore::WalkBuilder;
use serde::Deserialize;
use serde_json::{Value, json};

use steward_storage::atomic_write;

use crate::sandbox::AccessMode;
use crate::{ExecContext, Tool, ToolError, ToolFut, parse_args};

const DEFAULT_LIST_LIMIT: usize = 200;
const MAX_LIST_LIMIT: usize = 2000;

#[derive(Debug, Default)]
pub struct ReadFileTool;

#[derive(Debug, Deserialize)]
struct ReadFileArgs {
    path: String,
}

impl Tool for ReadFileTool {
    fn name(&self) -> &'static str {
        "read_file"
    }

    fn description(&self) -> &'static str {
        "Read a text file from the workspace."
    }

    fn schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "path": {
                    "type": "string",
                    "minLength": 1,
                    "description": "Path relative to the base directory"
                }
            },
            "required": ["path"],
            "additionalProperties": false
        })
    }

    fn execute<'a>(&'a self, args: Value, ctx: &'a ExecContext) -> ToolFut<'a> {
        Box::pin(async move {
            let typed: ReadFileArgs = parse_args(&args)?;
            let resolved = ctx.paths.resolve_allowed(&typed.path, AccessMode::Read)?;

            let meta = tokio::fs::metadata(&resolved)
                .await
                .map_err(|e| ToolError::failed(format!("cannot read {}: {e}", typed.path)))?;
            if meta.len() as usize > ctx.limits.max_read_bytes {
                return Err(ToolError::failed(format!(
                    "{} is {} bytes, over the {} byte read limit",
                    typed.path,
                    meta.len(),
                    ctx.limits.max_read_bytes
                )));
            }

            let bytes = tokio::fs::read(&resolved)
                .await
                .map_err(|e| ToolError::failed(format!("cannot read {}: {e}", typed.path)))?;
            let content = String::from_utf8_lossy(&bytes).into_owned();
            Ok(json!({
                "path": typed.path,
                "bytes": bytes.len(),
                "content": content,
            }))
        })
    }
}

#[derive(Debug, Default)]
pub struct WriteFileTool;

#[derive(Debug, Deserialize)]
struct WriteFileArgs {
    path: String,
    content: String,
}

impl Tool for WriteFileTool {
    fn name(&self) -> &'static str {
        "write_file"
    }

    fn description(&self) -> &'static str {
        "Write a text file in the workspace, creating parent directories."
    }

    fn schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "path": {
                    "type": "string",
                    "minLength": 1,
                    "description": "Path relative to the base directory"
                },
                "content": {
                    "type": "string",
                    "description": "Full file content to write"
                }
            },
            "required": ["path", "content"],
            "additionalProperties": false
        })
    }

    fn lock_target(&self, args: &Value, ctx: &ExecContext) -> Option<PathBuf> {
        let path = args.get("path")?.as_str()?;
        ctx.paths.resolve_allowed(path, AccessMode::Write).ok()
    }

    fn execute<'a>(&'a self, args: Value, ctx: &'a ExecContext) -> ToolFut<'a> {
        Box::pin(async move {
            let typed: WriteFileArgs = parse_args(&args)?;
            if typed.content.len() > ctx.limits.max_write_bytes {
                return Err(ToolError::bad_args(format!(
                    "content is {} bytes, over the {} byte write limit",
                    typed.content.len(),
                    ctx.limits.max_write_bytes
                )));
            }

            let resolved = ctx.paths.resolve_allowed(&typed.path, AccessMode::Write)?;
            atomic_write(&resolved, typed.content.as_bytes())
                .map_err(|e| ToolError::failed(format!("write to {} failed: {e}", typed.path)))?;

            Ok(json!({"path": typed.path, "bytes": typed.content.len()}))
        })
    }
}

#[derive(Debug, Default)]
pub struct ListFilesTool;

#[derive(Debug, Deserialize)]
struct ListFilesArgs {
    path: Option<String>,
    limit: Option<usize>,
}

impl Tool for ListFilesTool {
    fn name(&self) -> &'static str {
        "list_files"
    }

    fn description(&self) -> &'static str {
        "List files under a directory, honoring .gitignore."
    }

    fn schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "path": {
                    "type": "string",
                    "description": "Directory to list; defaults to the base directory"
                },
                "limit": {
                    "type": "integer",
                    "minimum": 1,
                    "maximum": MAX_LIST_LIMIT,
                    "description": "Maximum entries to return (default 200)"
                }
            },
            "additionalProperties": false
        })
    }

    fn execute<'a>(&'a self, args: Value, ctx: &'a ExecContext) -> ToolFut<'a> {
        Box::pin(async move {
            let typed: ListFilesArgs = parse_args(&args)?;
            let limit = typed
                .limit
                .unwrap_or(DEFAULT_LIST_LIMIT)
                .clamp(1, MAX_LIST_LIMIT);
            let base = match typed.path.as_deref() {
                Some(p) => ctx.paths.resolve_allowed(p, AccessMode::Read)?,
                None => ctx.paths.base_dir().to_path_buf(),
            };
            if !base.is_dir() {
                return Err(ToolError::failed(format!(
                    "not a directory: {}",
                    base.display()
                )));
            }

            let walker = WalkBuilder::new(&base)
                .git_ignore(true)
                .git_global(true)
                .git_exclude(true)
                .filter_entry(|entry| entry.file_name() != ".git")
                .build();

            let mut files = Vec::new();
            let mut truncated = false;
            for entry in walker {
                let Ok(entry) = entry else { continue };
                if entry.file_type().is_some_and(|ft| ft.is_dir()) {
                    continue;
                }
                if files.len() >= limit {
                    truncated = true;
                    break;
                }
                let rel = entry
                    .path()
                    .strip_prefix(&base)
                    .unwrap_or(entry.path())
                    .to_string_lossy()
                    .into_owned();
                files.push(rel);
            }
            files.sort();

            Ok(json!({"files": files, "truncated": truncated}))
        })
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use serde_json::json;

    use steward_config::{ExecLimits, StoragePaths};
    use steward_storage::PathLocks;
    use steward_types::{CommandRule, PermissionSet};

    use super::{ListFilesTool, ReadFileTool, WriteFileTool};
    use crate::{CommandCapability, ExecContext, PathCapability, Tool, ToolError};

    fn context(dir: &std::path::Path) -> ExecContext {
        let base = dir.to_path_buf();
        ExecContext {
            paths: Arc::new(
                PathCapability::new(&base, &["./".to_string()]).expect("capability"),
            ),
            commands: Arc::new(CommandCapability::new(vec![CommandRule::bare("pwd")], 1024)),
            storage: StoragePaths {
                memory: base.join("memory.json"),
                tasks: base.join("tasks.jsonl"),
                reminders: base.join("reminders.jsonl"),
                audit: base.join("audit.jsonl"),
                command_log: base.join("command_log.jsonl"),
            },
            locks: Arc::new(PathLocks::new()),
            limits: ExecLimits::default(),
            permissions: Arc::new(PermissionSet::default()),
            agent: None,
            correlation_id: "test".to_string(),
        }
    }

    #[tokio::test]
    async fn write_then_read_round_trips() {
        let dir = tempfile::tempdir().expect("tempdir");
        let ctx = context(dir.path());

        let written = WriteFileTool
            .execute(json!({"path": "notes/today.md", "content": "hello"}), &ctx)
            .await
            .expect("write");
        assert_eq!(written["bytes"], json!(5));

        let read = ReadFileTool
            .execute(json!({"path": "notes/today.md"}), &ctx)
            .await
            .expect("read");
        assert_eq!(read["content"], json!("hello"));
    }

    #[tokio::test]
    async fn write_over_the_byte_limit_is_refused() {
        let dir = tempfile::tempdir().expect("tempdir");
        let mut ctx = context(dir.path());
        ctx.limits.max_write_bytes = 4;

        let err = WriteFileTool
            .execute(json!({"path": "big.txt", "content": "too long"}), &ctx)
            .await
            .expect_err("refuse");
        assert!(matches!(err, ToolError::BadArgs { .. }));
    }

    #[tokio::test]
    async fn traversal_paths_are_denied() {
        let dir = tempfile::tempdir().expect("tempdir");
        let ctx = context(dir.path());

        let err = ReadFileTool
            .execute(json!({"path": "../outside.txt"}), &ctx)
            .await
            .expect_err("deny");
        assert!(matches!(err, ToolError::PathTraversal(_)));
    }

    #[tokio::test]
    async fn list_files_skips_git_dir() {
        let dir = tempfile::tempdir().expect("tempdir");
        std::fs::create_dir(dir.path().join(".git")).expect("mkdir");
        std::fs::write(dir.path().join(".git/HEAD"), "ref").expect("seed");
        std::fs::write(dir.path().join("a.txt"), "a").expect("seed");
        std::fs::write(dir.path().join("b.txt"), "b").expect("seed");
        let ctx = context(dir.path());

        let listed = ListFilesTool.execute(json!({}), &ctx).await.expect("list");
        let files = listed["files"].as_array().expect("files");
        assert_eq!(files.len(), 2);
        assert!(files.iter().all(|f| !f.as_str().unwrap().contains(".git")));
    }
}
