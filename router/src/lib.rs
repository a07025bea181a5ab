//! Router: a multi-stage decision pipeline from free-form input to a
//! validated tool invocation, a conversational reply, or a structured
//! error.
//!
//! Cheap deterministic stages run first; the LLM stage is the fallback.
//! The router never proposes a tool the executor will refuse on agent
//! grounds: both sides consult [`steward_types::tool_allowed`].

mod cache;
pub mod fastpath;
pub mod heuristic;
mod pipeline;

pub use cache::ToolsetCache;
pub use pipeline::{RouteOptions, Router};

use steward_types::ToolCallRequest;

/// Outcome of one deterministic parser stage.
#[derive(Debug, Clone, PartialEq)]
pub enum ParseOutcome {
    /// The stage recognized the input and proposes this call.
    Match(ToolCallRequest),
    /// The stage recognized the input but the command is invalid; the
    /// router surfaces this immediately as a validation error.
    Reject { message: String },
    /// The stage does not apply; try the next one.
    Skip,
}

impl ParseOutcome {
    pub(crate) fn reject(message: impl Into<String>) -> Self {
        Self::Reject {
            message: message.into(),
        }
    }
}
