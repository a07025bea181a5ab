//! Built-in tool executors.

pub mod files;
pub mod memory;
pub mod shell;
pub mod tasks;
pub mod timecalc;
pub mod web;

use super::{ToolError, ToolRegistry};

pub use files::{ListFilesTool, ReadFileTool, WriteFileTool};
pub use memory::{RecallTool, RememberTool};
pub use shell::{GitDiffTool, GitLogTool, GitStatusTool, RunCommandTool};
pub use tasks::{DelegateTool, RemindTool, TaskAddTool, TaskDoneTool, TaskListTool};
pub use timecalc::{CalculateTool, GetTimeTool};
pub use web::{GetWeatherTool, ReadUrlTool};

/// Register every built-in tool. Called once from the composition root.
pub fn register_builtins(registry: &mut ToolRegistry) -> Result<(), ToolError> {
    registry.register_builtin(Box::new(RememberTool))?;
    registry.register_builtin(Box::new(RecallTool))?;
    registry.register_builtin(Box::new(ReadFileTool))?;
    registry.register_builtin(Box::new(WriteFileTool))?;
    registry.register_builtin(Box::new(ListFilesTool))?;
    registry.register_builtin(Box::new(TaskAddTool))?;
    registry.register_builtin(Box::new(TaskListTool))?;
    registry.register_builtin(Box::new(TaskDoneTool))?;
    registry.register_builtin(Box::new(RemindTool))?;
    registry.register_builtin(Box::new(DelegateTool::coder()))?;
    registry.register_builtin(Box::new(DelegateTool::researcher()))?;
    registry.register_builtin(Box::new(RunCommandTool))?;
    registry.register_builtin(Box::new(GitStatusTool))?;
    registry.register_builtin(Box::new(GitDiffTool))?;
    registry.register_builtin(Box::new(GitLogTool))?;
    registry.register_builtin(Box::new(GetTimeTool))?;
    registry.register_builtin(Box::new(CalculateTool))?;
    registry.register_builtin(Box::new(ReadUrlTool))?;
    registry.register_builtin(Box::new(GetWeatherTool))?;
    Ok(())
}
