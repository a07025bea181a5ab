//! Tool execution framework: capability objects, registry, executor, and
//! the built-in tools.
//!
//! The executor is the single security choke point; handlers reach the
//! filesystem and subprocesses only through the capability objects carried
//! in their [`ExecContext`].

pub mod audit;
pub mod builtins;
pub mod command;
pub mod executor;
pub mod registry;
pub mod sandbox;
pub mod schema;

use std::future::Future;
use std::path::PathBuf;
use std::pin::Pin;
use std::sync::Arc;

use serde_json::Value;
use steward_config::{ExecLimits, StoragePaths};
use steward_storage::{PathLocks, StorageError};
use steward_types::{Agent, ErrorKind, PermissionSet};

pub use audit::AuditLog;
pub use command::{CommandCapability, CommandOutput};
pub use executor::{ExecuteOptions, Executor};
pub use registry::{RegisteredTool, ToolDefinition, ToolRegistry};
pub use sandbox::{AccessMode, PathCapability};
pub use schema::{ArgSchema, SchemaError};

/// Tool execution future type alias.
pub type ToolFut<'a> = Pin<Box<dyn Future<Output = Result<Value, ToolError>> + Send + 'a>>;

/// Lifecycle tag carried by every registered tool.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToolStatus {
    Ready,
    Experimental,
}

/// Error types for capability checks and tool execution.
#[derive(Debug, thiserror::Error)]
pub enum ToolError {
    #[error("Bad tool args: {message}")]
    BadArgs { message: String },
    #[error("Timed out after {elapsed_ms} ms")]
    Timeout { elapsed_ms: u64 },
    #[error("{0}")]
    PathTraversal(String),
    #[error("{0}")]
    PathAllowlist(String),
    #[error("{0}")]
    CmdAllowlist(String),
    #[error("{message}")]
    ExecutionFailed { message: String },
    #[error("Duplicate tool registered: {name}")]
    DuplicateTool { name: String },
    #[error(transparent)]
    Storage(#[from] StorageError),
}

impl ToolError {
    /// Map onto the closed error-kind set.
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::BadArgs { .. } => ErrorKind::ValidationError,
            Self::Timeout { .. } => ErrorKind::ExecTimeout,
            Self::PathTraversal(_) => ErrorKind::DeniedPathTraversal,
            Self::PathAllowlist(_) => ErrorKind::DeniedPathAllowlist,
            Self::CmdAllowlist(_) => ErrorKind::DeniedCmdAllowlist,
            Self::ExecutionFailed { .. } | Self::DuplicateTool { .. } => ErrorKind::ExecError,
            Self::Storage(e) => e.kind(),
        }
    }

    pub(crate) fn failed(message: impl Into<String>) -> Self {
        Self::ExecutionFailed {
            message: message.into(),
        }
    }

    pub(crate) fn bad_args(message: impl Into<String>) -> Self {
        Self::BadArgs {
            message: message.into(),
        }
    }
}

/// Per-call execution context: the explicit capability bundle.
///
/// Constructed by the executor for every call; never a global.
pub struct ExecContext {
    pub paths: Arc<PathCapability>,
    pub commands: Arc<CommandCapability>,
    pub storage: StoragePaths,
    pub locks: Arc<PathLocks>,
    pub limits: ExecLimits,
    pub permissions: Arc<PermissionSet>,
    pub agent: Option<Arc<Agent>>,
    pub correlation_id: String,
}

/// A named, schema-validated, side-effecting operation.
pub trait Tool: Send + Sync {
    fn name(&self) -> &'static str;
    fn description(&self) -> &'static str;
    /// JSON schema for the argument object. Must be strict
    /// (`additionalProperties: false`); the registry refuses it otherwise.
    fn schema(&self) -> Value;
    fn status(&self) -> ToolStatus {
        ToolStatus::Ready
    }
    /// The file this call mutates, if any. The executor serializes
    /// executions per returned path.
    fn lock_target(&self, _args: &Value, _ctx: &ExecContext) -> Option<PathBuf> {
        None
    }
    /// Whether this tool reads the memory store (surfaced in debug info).
    fn reads_memory(&self) -> bool {
        false
    }
    /// Whether this tool writes the memory store (surfaced in debug info).
    fn writes_memory(&self) -> bool {
        false
    }
    fn execute<'a>(&'a self, args: Value, ctx: &'a ExecContext) -> ToolFut<'a>;
}

pub(crate) fn parse_args<T: serde::de::DeserializeOwned>(args: &Value) -> Result<T, ToolError> {
    serde_json::from_value(args.clone()).map_err(|e| ToolError::BadArgs {
        message: e.to_string(),
    })
}

/// Truncate tool output to the effective maximum length.
#[must_use]
pub fn truncate_output(output: String, effective_max: usize) -> String {
    if output.len() <= effective_max {
        return output;
    }
    let marker = "\n\n... [output truncated]";
    if effective_max <= marker.len() {
        return marker[..effective_max].to_string();
    }
    let max_body = effective_max - marker.len();
    let mut end = max_body;
    while end > 0 && !output.is_char_boundary(end) {
        end -= 1;
    }
    let mut truncated = output;
    truncated.truncate(end);
    truncated.push_str(marker);
    truncated
}

#[cfg(test)]
mod tests {
    use super::{ToolError, truncate_output};
    use steward_types::ErrorKind;

    #[test]
    fn error_kinds_map_onto_the_closed_set() {
        assert_eq!(
            ToolError::bad_args("x").kind(),
            ErrorKind::ValidationError
        );
        assert_eq!(
            ToolError::Timeout { elapsed_ms: 10 }.kind(),
            ErrorKind::ExecTimeout
        );
        assert_eq!(
            ToolError::PathTraversal("p".into()).kind(),
            ErrorKind::DeniedPathTraversal
        );
        assert_eq!(
            ToolError::CmdAllowlist("c".into()).kind(),
            ErrorKind::DeniedCmdAllowlist
        );
    }

    #[test]
    fn truncation_appends_a_marker() {
        let out = truncate_output("x".repeat(100), 50);
        assert!(out.len() <= 50);
        assert!(out.ends_with("[output truncated]"));
    }

    #[test]
    fn short_output_is_untouched() {
        assert_eq!(truncate_output("hello".to_string(), 50), "hello");
    }

    #[test]
    fn truncation_respects_char_boundaries() {
        let out = truncate_output("é".repeat(100), 40);
        assert!(out.len() <= 40);
    }
}
