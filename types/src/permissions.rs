//! Permission records loaded once per process from `permissions.json`.

use serde::{Deserialize, Serialize};

/// One allowlisted command. An absent `allowed_flags` list means the
/// command accepts no flags at all.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommandRule {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub allowed_flags: Option<Vec<String>>,
}

impl CommandRule {
    #[must_use]
    pub fn bare(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            allowed_flags: None,
        }
    }

    #[must_use]
    pub fn with_flags(name: impl Into<String>, flags: impl IntoIterator<Item = &'static str>) -> Self {
        Self {
            name: name.into(),
            allowed_flags: Some(flags.into_iter().map(String::from).collect()),
        }
    }

    /// Whether a `-`-prefixed argument is acceptable for this command.
    #[must_use]
    pub fn flag_allowed(&self, flag: &str) -> bool {
        self.allowed_flags
            .as_ref()
            .is_some_and(|flags| flags.iter().any(|f| f == flag))
    }
}

/// Process-wide permission policy. Paths are interpreted relative to the
/// configured base directory; changes require a restart.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PermissionSet {
    #[serde(default)]
    pub allow_paths: Vec<String>,
    #[serde(default)]
    pub allow_commands: Vec<CommandRule>,
    #[serde(default)]
    pub require_confirmation_for: Vec<String>,
    #[serde(default)]
    pub deny_tools: Vec<String>,
}

impl Default for PermissionSet {
    /// The out-of-the-box policy: the base directory itself, the four shell
    /// verbs the fast-path recognizes, and `git` with its query flags.
    fn default() -> Self {
        Self {
            allow_paths: vec!["./".to_string()],
            allow_commands: vec![
                CommandRule::bare("ls"),
                CommandRule::bare("pwd"),
                CommandRule::bare("cat"),
                CommandRule::bare("du"),
                CommandRule::with_flags(
                    "git",
                    [
                        "--porcelain",
                        "--short",
                        "--stat",
                        "--oneline",
                        "--no-color",
                        "--max-count",
                        "-n",
                    ],
                ),
            ],
            require_confirmation_for: Vec::new(),
            deny_tools: Vec::new(),
        }
    }
}

impl PermissionSet {
    #[must_use]
    pub fn command_rule(&self, name: &str) -> Option<&CommandRule> {
        self.allow_commands.iter().find(|rule| rule.name == name)
    }

    #[must_use]
    pub fn denies(&self, tool: &str) -> bool {
        self.deny_tools.iter().any(|t| t == tool)
    }

    #[must_use]
    pub fn requires_confirmation(&self, tool: &str) -> bool {
        self.require_confirmation_for.iter().any(|t| t == tool)
    }
}
