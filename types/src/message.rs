//! Chat history messages and the valid-slice widening rule.

use serde::{Deserialize, Serialize};

use crate::ToolCallRequest;

/// One turn of conversation history as fed to the provider.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "role", rename_all = "snake_case")]
pub enum ChatMessage {
    User {
        content: String,
    },
    Assistant {
        content: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        tool_call: Option<ToolCallRequest>,
    },
    /// The result of a tool call issued by the preceding assistant message.
    Tool {
        content: String,
    },
}

impl ChatMessage {
    #[must_use]
    pub fn user(content: impl Into<String>) -> Self {
        Self::User {
            content: content.into(),
        }
    }

    #[must_use]
    pub fn assistant(content: impl Into<String>) -> Self {
        Self::Assistant {
            content: content.into(),
            tool_call: None,
        }
    }

    #[must_use]
    pub fn assistant_tool_call(call: ToolCallRequest) -> Self {
        Self::Assistant {
            content: String::new(),
            tool_call: Some(call),
        }
    }

    #[must_use]
    pub fn tool(content: impl Into<String>) -> Self {
        Self::Tool {
            content: content.into(),
        }
    }

    #[must_use]
    pub fn is_tool_result(&self) -> bool {
        matches!(self, Self::Tool { .. })
    }

    #[must_use]
    pub fn is_assistant_tool_call(&self) -> bool {
        matches!(
            self,
            Self::Assistant {
                tool_call: Some(_),
                ..
            }
        )
    }
}

/// Trim `history` to at most `limit` trailing messages, then widen so the
/// slice stays well-formed for providers:
///
/// (a) if the first remaining message is a tool result, pull in earlier
///     messages until the matching assistant tool-call is included;
/// (b) if the last remaining message is an assistant tool-call, pull in the
///     tool results that follow it in the original list.
///
/// Implemented as index arithmetic over the full list rather than a stateful
/// trimmer; the returned slice always borrows from `history`.
#[must_use]
pub fn valid_slice(history: &[ChatMessage], limit: usize) -> &[ChatMessage] {
    if history.is_empty() || limit == 0 {
        return &[];
    }
    let mut start = history.len().saturating_sub(limit);
    let mut end = history.len();

    // (a) Never begin with an orphaned tool result.
    while start > 0 && history[start].is_tool_result() {
        start -= 1;
    }

    // (b) Never end on an unanswered assistant tool-call.
    if history[end - 1].is_assistant_tool_call() {
        while end < history.len() && history[end].is_tool_result() {
            end += 1;
        }
    }

    &history[start..end]
}
