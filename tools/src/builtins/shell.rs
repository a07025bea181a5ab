//! Subprocess-backed tools: the allowlisted shell verbs and the git
//! query tools. All spawning goes through the `CommandCapability`.

use serde::Deserialize;
use serde_json::{Value, json};

use crate::sandbox::AccessMode;
use crate::{CommandOutput, ExecContext, Tool, ToolError, ToolFut, parse_args};

fn output_json(out: &CommandOutput) -> Value {
    json!({
        "stdout": out.stdout,
        "stderr": out.stderr,
        "exit": out.exit,
        "truncated": out.truncated,
    })
}

/// Run an allowlisted command with explicit argv.
#[derive(Debug, Default)]
pub struct RunCommandTool;

#[derive(Debug, Deserialize)]
struct RunCommandArgs {
    argv: Vec<String>,
    cwd: Option<String>,
}

impl Tool for RunCommandTool {
    fn name(&self) -> &'static str {
        "run_command"
    }

    fn description(&self) -> &'static str {
        "Run an allowlisted command. Arguments are passed as an array; no shell is involved."
    }

    fn schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "argv": {
                    "type": "array",
                    "items": { "type": "string", "minLength": 1 },
                    "minItems": 1,
                    "description": "Command and arguments, e.g. [\"ls\", \"notes\"]"
                },
                "cwd": {
                    "type": "string",
                    "description": "Working directory relative to the base directory"
                }
            },
            "required": ["argv"],
            "additionalProperties": false
        })
    }

    fn execute<'a>(&'a self, args: Value, ctx: &'a ExecContext) -> ToolFut<'a> {
        Box::pin(async move {
            let typed: RunCommandArgs = parse_args(&args)?;
            let cwd = match typed.cwd.as_deref() {
                Some(p) => ctx.paths.resolve_allowed(p, AccessMode::Read)?,
                None => ctx.paths.base_dir().to_path_buf(),
            };
            let out = ctx
                .commands
                .run_allowed(&typed.argv, &cwd, ctx.limits.command_timeout)
                .await?;
            Ok(output_json(&out))
        })
    }
}

/// Run a git query in the base directory and return its parsed output.
async fn run_git(ctx: &ExecContext, argv: &[&str]) -> Result<CommandOutput, ToolError> {
    let argv: Vec<String> = std::iter::once("git")
        .chain(argv.iter().copied())
        .map(String::from)
        .collect();
    ctx.commands
        .run_allowed(&argv, ctx.paths.base_dir(), ctx.limits.command_timeout)
        .await
}

#[derive(Debug, Default)]
pub struct GitStatusTool;

impl Tool for GitStatusTool {
    fn name(&self) -> &'static str {
        "git_status"
    }

    fn description(&self) -> &'static str {
        "Working tree status of the repository at the base directory."
    }

    fn schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {},
            "additionalProperties": false
        })
    }

    fn execute<'a>(&'a self, _args: Value, ctx: &'a ExecContext) -> ToolFut<'a> {
        Box::pin(async move {
            let out = run_git(ctx, &["status", "--porcelain", "--branch"]).await?;
            if out.exit != 0 {
                return Err(ToolError::failed(format!(
                    "git status failed: {}",
                    out.stderr.trim()
                )));
            }
            Ok(parse_status(&out.stdout))
        })
    }
}

/// Parse `git status --porcelain --branch` output.
fn parse_status(stdout: &str) -> Value {
    let mut branch = None;
    let mut changes = Vec::new();
    for line in stdout.lines() {
        if let Some(rest) = line.strip_prefix("## ") {
            let name = rest.split("...").next().unwrap_or(rest);
            branch = Some(name.to_string());
            continue;
        }
        if line.len() < 4 {
            continue;
        }
        let (status, path) = line.split_at(3);
        changes.push(json!({
            "status": status.trim(),
            "path": path.trim(),
        }));
    }
    let clean = changes.is_empty();
    json!({"branch": branch, "changes": changes, "clean": clean})
}

#[derive(Debug, Default)]
pub struct GitDiffTool;

#[derive(Debug, Deserialize)]
struct GitDiffArgs {
    paths: Option<Vec<String>>,
}

impl Tool for GitDiffTool {
    fn name(&self) -> &'static str {
        "git_diff"
    }

    fn description(&self) -> &'static str {
        "Diffstat of unstaged changes, optionally restricted to paths."
    }

    fn schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "paths": {
                    "type": "array",
                    "items": { "type": "string", "minLength": 1 },
                    "description": "Restrict the diff to these paths"
                }
            },
            "additionalProperties": false
        })
    }

    fn execute<'a>(&'a self, args: Value, ctx: &'a ExecContext) -> ToolFut<'a> {
        Box::pin(async move {
            let typed: GitDiffArgs = parse_args(&args)?;
            let mut argv = vec!["diff", "--stat", "--no-color"];
            let paths = typed.paths.unwrap_or_default();
            for p in &paths {
                argv.push(p.as_str());
            }
            let out = run_git(ctx, &argv).await?;
            if out.exit != 0 {
                return Err(ToolError::failed(format!(
                    "git diff failed: {}",
                    out.stderr.trim()
                )));
            }
            Ok(json!({"diff": out.stdout, "truncated": out.truncated}))
        })
    }
}

#[derive(Debug, Default)]
pub struct GitLogTool;

#[derive(Debug, Deserialize)]
struct GitLogArgs {
    limit: Option<u32>,
}

impl Tool for GitLogTool {
    fn name(&self) -> &'static str {
        "git_log"
    }

    fn description(&self) -> &'static str {
        "Recent commits, one line each."
    }

    fn schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "limit": {
                    "type": "integer",
                    "minimum": 1,
                    "maximum": 200,
                    "description": "Number of commits to show (default 10)"
                }
            },
            "additionalProperties": false
        })
    }

    fn execute<'a>(&'a self, args: Value, ctx: &'a ExecContext) -> ToolFut<'a> {
        Box::pin(async move {
            let typed: GitLogArgs = parse_args(&args)?;
            let limit = typed.limit.unwrap_or(10).to_string();
            let out = run_git(ctx, &["log", "--oneline", "--no-color", "-n", &limit]).await?;
            if out.exit != 0 {
                return Err(ToolError::failed(format!(
                    "git log failed: {}",
                    out.stderr.trim()
                )));
            }
            let commits: Vec<Value> = out
                .stdout
                .lines()
                .filter_map(|line| {
                    let (hash, subject) = line.split_once(' ')?;
                    Some(json!({"hash": hash, "subject": subject}))
                })
                .collect();
            Ok(json!({"commits": commits}))
        })
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::parse_status;

    #[test]
    fn parses_branch_and_changes() {
        let out = "## main...origin/main\n M src/lib.rs\n?? notes.md\n";
        let status = parse_status(out);
        assert_eq!(status["branch"], json!("main"));
        assert_eq!(status["clean"], json!(false));
        let changes = status["changes"].as_array().expect("changes");
        assert_eq!(changes.len(), 2);
        assert_eq!(changes[0]["status"], json!("M"));
        assert_eq!(changes[0]["path"], json!("src/lib.rs"));
        assert_eq!(changes[1]["status"], json!("??"));
    }

    #[test]
    fn clean_tree_reports_clean() {
        let status = parse_status("## main\n");
        assert_eq!(status["clean"], json!(true));
        assert_eq!(status["branch"], json!("main"));
    }
}
