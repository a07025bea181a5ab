//! Tool registry: name → (schema, handler, status).
//!
//! Built-in tools register at startup and always win name collisions.
//! Plugin tools register afterwards at lower priority; a plugin tool with
//! a taken name or a schema that fails conversion is refused with a
//! warning while the rest of the plugin continues to load.

use std::collections::HashMap;

use serde_json::Value;

use super::schema::ArgSchema;
use super::{Tool, ToolError, ToolStatus};

/// A registered tool with its compiled schema.
pub struct RegisteredTool {
    pub tool: Box<dyn Tool>,
    pub schema: ArgSchema,
}

/// What the LLM stage sees for one tool.
#[derive(Debug, Clone, PartialEq)]
pub struct ToolDefinition {
    pub name: String,
    pub description: String,
    pub schema: Value,
    pub experimental: bool,
}

#[derive(Default)]
pub struct ToolRegistry {
    tools: HashMap<String, RegisteredTool>,
}

impl ToolRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a built-in tool. A duplicate or a non-strict schema is a
    /// programming error.
    pub fn register_builtin(&mut self, tool: Box<dyn Tool>) -> Result<(), ToolError> {
        let name = tool.name().to_string();
        if self.tools.contains_key(&name) {
            return Err(ToolError::DuplicateTool { name });
        }
        let schema = ArgSchema::new(tool.schema()).map_err(|e| {
            ToolError::failed(format!("built-in tool '{name}' has a bad schema: {e}"))
        })?;
        self.tools.insert(name, RegisteredTool { tool, schema });
        Ok(())
    }

    /// Register a plugin-contributed tool at lower priority. Returns
    /// whether the tool was actually registered.
    pub fn register_plugin(&mut self, tool: Box<dyn Tool>) -> bool {
        let name = tool.name().to_string();
        if self.tools.contains_key(&name) {
            tracing::warn!(tool = %name, "Plugin tool name already registered; built-in wins");
            return false;
        }
        let schema = match ArgSchema::new(tool.schema()) {
            Ok(schema) => schema,
            Err(e) => {
                tracing::warn!(tool = %name, "Plugin tool schema refused: {e}");
                return false;
            }
        };
        self.tools.insert(name, RegisteredTool { tool, schema });
        true
    }

    #[must_use]
    pub fn get(&self, name: &str) -> Option<&RegisteredTool> {
        self.tools.get(name)
    }

    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.tools.contains_key(name)
    }

    /// Definitions for the LLM tool manifest, sorted by name.
    #[must_use]
    pub fn definitions(&self) -> Vec<ToolDefinition> {
        let mut defs: Vec<ToolDefinition> = self
            .tools
            .values()
            .map(|reg| ToolDefinition {
                name: reg.tool.name().to_string(),
                description: reg.tool.description().to_string(),
                schema: reg.schema.raw().clone(),
                experimental: reg.tool.status() == ToolStatus::Experimental,
            })
            .collect();
        defs.sort_by(|a, b| a.name.cmp(&b.name));
        defs
    }
}
