//! Core domain types for steward - no IO, no async.
//!
//! Everything the router, executor, and storage layers exchange lives here:
//! the closed error-kind set, route and tool results, agent bundles, chat
//! history, permission records, and the storage record shapes.

pub mod agent;
pub mod message;
pub mod permissions;
pub mod records;

use serde::{Deserialize, Serialize};
use serde_json::Value;

pub use agent::{Agent, AgentKind, tool_allowed};
pub use message::{ChatMessage, valid_slice};
pub use permissions::{CommandRule, PermissionSet};
pub use records::{AuditEntry, MemoryDocument, MemoryEntry, ReminderRecord, TaskRecord};

/// Tools permitted when no agent context is present.
///
/// Every entry is side-effect free: the handlers read storage or process
/// state but never mutate files or spawn non-allowlisted processes.
pub const SAFE_TOOLS: &[&str] = &["get_time", "calculate", "recall", "task_list", "git_status"];

/// Whether a tool may run without any agent context.
#[must_use]
pub fn is_safe_tool(name: &str) -> bool {
    SAFE_TOOLS.contains(&name)
}

/// Closed error-kind set shared by every layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorKind {
    ParseError,
    ValidationError,
    RouteError,
    ToolNotFound,
    DeniedAgentTool,
    DeniedNoAgent,
    DeniedByPolicy,
    DeniedPathTraversal,
    DeniedPathAllowlist,
    DeniedCmdAllowlist,
    ConfirmationRequired,
    ExecError,
    ExecTimeout,
    StorageWriteError,
    StorageReadError,
}

impl ErrorKind {
    /// Process exit code for CLI shells: parse/validation/route errors map
    /// to 2, everything else non-ok to 1.
    #[must_use]
    pub fn exit_code(self) -> i32 {
        match self {
            Self::ParseError | Self::ValidationError | Self::RouteError => 2,
            _ => 1,
        }
    }
}

impl ErrorKind {
    /// The wire name; identical to the serde form so logs and JSON agree.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::ParseError => "PARSE_ERROR",
            Self::ValidationError => "VALIDATION_ERROR",
            Self::RouteError => "ROUTE_ERROR",
            Self::ToolNotFound => "TOOL_NOT_FOUND",
            Self::DeniedAgentTool => "DENIED_AGENT_TOOL",
            Self::DeniedNoAgent => "DENIED_NO_AGENT",
            Self::DeniedByPolicy => "DENIED_BY_POLICY",
            Self::DeniedPathTraversal => "DENIED_PATH_TRAVERSAL",
            Self::DeniedPathAllowlist => "DENIED_PATH_ALLOWLIST",
            Self::DeniedCmdAllowlist => "DENIED_CMD_ALLOWLIST",
            Self::ConfirmationRequired => "CONFIRMATION_REQUIRED",
            Self::ExecError => "EXEC_ERROR",
            Self::ExecTimeout => "EXEC_TIMEOUT",
            Self::StorageWriteError => "STORAGE_WRITE_ERROR",
            Self::StorageReadError => "STORAGE_READ_ERROR",
        }
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Structured error payload: `{code, message}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorObject {
    pub code: ErrorKind,
    pub message: String,
}

impl ErrorObject {
    #[must_use]
    pub fn new(code: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }
}

/// A tool invocation proposed by the router (or typed directly by the
/// operator). Args are untrusted until schema-validated by the executor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCallRequest {
    pub tool_name: String,
    pub args: Value,
}

impl ToolCallRequest {
    #[must_use]
    pub fn new(tool_name: impl Into<String>, args: Value) -> Self {
        Self {
            tool_name: tool_name.into(),
            args,
        }
    }
}

/// The routing stage that produced a decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RoutingStage {
    RegexFastPath,
    HeuristicParse,
    CliParse,
    LlmFallback,
    Fallback,
    ToolJson,
    Exception,
}

/// Per-call diagnostics threaded through route and execute results.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DebugInfo {
    pub path: RoutingStage,
    pub duration_ms: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    pub memory_read: bool,
    pub memory_write: bool,
}

impl DebugInfo {
    #[must_use]
    pub fn stage(path: RoutingStage, duration_ms: u64) -> Self {
        Self {
            path,
            duration_ms,
            model: None,
            memory_read: false,
            memory_write: false,
        }
    }
}

/// Token accounting reported by a provider.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Usage {
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
}

/// Caller intent attached to a routed input.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Intent {
    #[default]
    Chat,
    Plan,
    Spike,
}

impl Intent {
    /// Canned instruction used when no provider is configured and the
    /// router falls back to an echo reply.
    #[must_use]
    pub fn instruction(self) -> &'static str {
        match self {
            Self::Chat => "Respond conversationally.",
            Self::Plan => "Outline the steps before acting.",
            Self::Spike => "Resolve to a concrete tool call.",
        }
    }
}

/// Route error codes: 1 = not routable, 2 = validation/parse failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RouteErrorCode {
    NotRoutable,
    Validation,
}

impl RouteErrorCode {
    #[must_use]
    pub fn as_u8(self) -> u8 {
        match self {
            Self::NotRoutable => 1,
            Self::Validation => 2,
        }
    }
}

impl Serialize for RouteErrorCode {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u8(self.as_u8())
    }
}

impl<'de> Deserialize<'de> for RouteErrorCode {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        match u8::deserialize(deserializer)? {
            1 => Ok(Self::NotRoutable),
            2 => Ok(Self::Validation),
            n => Err(serde::de::Error::custom(format!(
                "invalid route error code {n}"
            ))),
        }
    }
}

/// The router's decision: a validated tool invocation, a conversational
/// reply, or a structured refusal.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RouteResult {
    ToolCall {
        intent: Intent,
        tool_call: ToolCallRequest,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        usage: Option<Usage>,
        debug: DebugInfo,
    },
    Reply {
        intent: Intent,
        content: String,
        instruction: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        usage: Option<Usage>,
        debug: DebugInfo,
    },
    Error {
        message: String,
        code: RouteErrorCode,
    },
}

impl RouteResult {
    #[must_use]
    pub fn error(message: impl Into<String>, code: RouteErrorCode) -> Self {
        Self::Error {
            message: message.into(),
            code,
        }
    }
}

/// The executor's answer. Always well-formed; the executor never throws.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolResult {
    pub ok: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorObject>,
    /// Serialized as `_debug` in the machine output shape.
    #[serde(rename = "_debug")]
    pub debug: DebugInfo,
}

impl ToolResult {
    #[must_use]
    pub fn success(result: Value, debug: DebugInfo) -> Self {
        Self {
            ok: true,
            result: Some(result),
            error: None,
            debug,
        }
    }

    #[must_use]
    pub fn failure(code: ErrorKind, message: impl Into<String>, debug: DebugInfo) -> Self {
        Self {
            ok: false,
            result: None,
            error: Some(ErrorObject::new(code, message)),
            debug,
        }
    }

    /// Exit code for CLI shells (0 on success).
    #[must_use]
    pub fn exit_code(&self) -> i32 {
        if self.ok {
            0
        } else {
            self.error.as_ref().map_or(1, |e| e.code.exit_code())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{
        DebugInfo, ErrorKind, RouteErrorCode, RouteResult, RoutingStage, ToolResult, is_safe_tool,
    };
    use serde_json::json;

    #[test]
    fn error_kind_wire_names_are_screaming_snake() {
        let v = serde_json::to_value(ErrorKind::DeniedPathTraversal).unwrap();
        assert_eq!(v, json!("DENIED_PATH_TRAVERSAL"));
        assert_eq!(ErrorKind::DeniedPathTraversal.to_string(), "DENIED_PATH_TRAVERSAL");
    }

    #[test]
    fn exit_codes_follow_the_two_tier_mapping() {
        assert_eq!(ErrorKind::ValidationError.exit_code(), 2);
        assert_eq!(ErrorKind::ParseError.exit_code(), 2);
        assert_eq!(ErrorKind::RouteError.exit_code(), 2);
        assert_eq!(ErrorKind::ExecError.exit_code(), 1);
        assert_eq!(ErrorKind::DeniedByPolicy.exit_code(), 1);
    }

    #[test]
    fn route_error_code_serializes_as_number() {
        let r = RouteResult::error("no tool found", RouteErrorCode::NotRoutable);
        let v = serde_json::to_value(&r).unwrap();
        assert_eq!(v["code"], json!(1));
        assert_eq!(v["type"], json!("error"));
    }

    #[test]
    fn routing_stage_uses_snake_case() {
        let v = serde_json::to_value(RoutingStage::RegexFastPath).unwrap();
        assert_eq!(v, json!("regex_fast_path"));
    }

    #[test]
    fn tool_result_round_trips() {
        let r = ToolResult::success(json!({"count": 3}), DebugInfo::stage(RoutingStage::ToolJson, 5));
        let v = serde_json::to_value(&r).unwrap();
        assert_eq!(v["ok"], json!(true));
        assert!(v.get("error").is_none());
        let back: ToolResult = serde_json::from_value(v).unwrap();
        assert_eq!(back, r);
        assert_eq!(back.exit_code(), 0);
    }

    #[test]
    fn safe_tools_contains_only_read_only_tools() {
        assert!(is_safe_tool("get_time"));
        assert!(is_safe_tool("recall"));
        assert!(!is_safe_tool("write_file"));
        assert!(!is_safe_tool("run_command"));
    }
}
