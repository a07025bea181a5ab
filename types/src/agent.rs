//! Agent model: a named bundle of system-prompt text, tool allowlist, and
//! trust kind. Data only; immutable after construction.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

/// Trust kind. `System` agents bypass the per-agent tool allowlist and can
/// only be minted by the runtime composition root via [`Agent::system`];
/// config deserialization always yields `User`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AgentKind {
    System,
    User,
}

/// Immutable agent definition shared (read-only) across routing calls.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Agent {
    name: String,
    description: String,
    system_prompt: String,
    tools: BTreeSet<String>,
    kind: AgentKind,
}

/// The serialized form accepted from configuration. There is intentionally
/// no `kind` field: everything loaded from disk is a user agent.
#[derive(Debug, Clone, Deserialize)]
pub struct AgentSpec {
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub system_prompt: String,
    #[serde(default)]
    pub tools: BTreeSet<String>,
}

impl Agent {
    /// Construct a system-trust agent. Only the composition root calls this.
    #[must_use]
    pub fn system(
        name: impl Into<String>,
        description: impl Into<String>,
        system_prompt: impl Into<String>,
        tools: impl IntoIterator<Item = String>,
    ) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            system_prompt: system_prompt.into(),
            tools: tools.into_iter().collect(),
            kind: AgentKind::System,
        }
    }

    /// Construct a user-trust agent bound to its tool allowlist.
    #[must_use]
    pub fn user(
        name: impl Into<String>,
        description: impl Into<String>,
        system_prompt: impl Into<String>,
        tools: impl IntoIterator<Item = String>,
    ) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            system_prompt: system_prompt.into(),
            tools: tools.into_iter().collect(),
            kind: AgentKind::User,
        }
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn description(&self) -> &str {
        &self.description
    }

    #[must_use]
    pub fn system_prompt(&self) -> &str {
        &self.system_prompt
    }

    #[must_use]
    pub fn tools(&self) -> &BTreeSet<String> {
        &self.tools
    }

    #[must_use]
    pub fn kind(&self) -> AgentKind {
        self.kind
    }

    /// Whether this agent's allowlist admits `tool`. System agents admit
    /// everything.
    #[must_use]
    pub fn allows(&self, tool: &str) -> bool {
        self.kind == AgentKind::System || self.tools.contains(tool)
    }
}

impl From<AgentSpec> for Agent {
    fn from(spec: AgentSpec) -> Self {
        Agent::user(spec.name, spec.description, spec.system_prompt, spec.tools)
    }
}

/// The single authorization rule shared by router and executor: an agent's
/// allowlist when present, [`crate::SAFE_TOOLS`] when absent.
///
/// The router consults this before emitting a tool call; the executor
/// re-applies it before running one. Keeping the rule in one place is what
/// makes the two agree on every input.
#[must_use]
pub fn tool_allowed(agent: Option<&Agent>, tool: &str) -> bool {
    match agent {
        Some(agent) => agent.allows(tool),
        None => crate::is_safe_tool(tool),
    }
}
