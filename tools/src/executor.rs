//! The executor: sole authority for whether a tool call may run.
//!
//! Decision order per call: registry resolve, agent authorization, global
//! deny list, schema validation, confirmation gate, handler invocation
//! under the per-path lock, audit append. Each step short-circuits with a
//! structured error; the executor itself never errors and never panics.

use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Instant;

use chrono::{SecondsFormat, Utc};
use futures_util::FutureExt;
use serde_json::Value;

use steward_config::{ExecLimits, StoragePaths};
use steward_storage::PathLocks;
use steward_types::{
    Agent, AgentKind, AuditEntry, DebugInfo, ErrorKind, ErrorObject, PermissionSet, RoutingStage,
    ToolResult, is_safe_tool,
};

use super::{AuditLog, CommandCapability, ExecContext, PathCapability, ToolRegistry};

/// Per-call options. `confirmed` carries the confirmation token attached
/// by the interactive layer after the user approves a gated call.
#[derive(Debug, Default, Clone)]
pub struct ExecuteOptions {
    pub confirmed: bool,
    pub correlation_id: Option<String>,
}

pub struct Executor {
    registry: Arc<ToolRegistry>,
    paths: Arc<PathCapability>,
    commands: Arc<CommandCapability>,
    storage: StoragePaths,
    locks: Arc<PathLocks>,
    limits: ExecLimits,
    permissions: Arc<PermissionSet>,
    audit: Arc<AuditLog>,
}

impl Executor {
    #[must_use]
    pub fn new(
        registry: Arc<ToolRegistry>,
        paths: Arc<PathCapability>,
        commands: Arc<CommandCapability>,
        storage: StoragePaths,
        locks: Arc<PathLocks>,
        limits: ExecLimits,
        permissions: Arc<PermissionSet>,
        audit: Arc<AuditLog>,
    ) -> Self {
        Self {
            registry,
            paths,
            commands,
            storage,
            locks,
            limits,
            permissions,
            audit,
        }
    }

    #[must_use]
    pub fn registry(&self) -> &Arc<ToolRegistry> {
        &self.registry
    }

    /// Execute a tool call for the given agent context.
    pub async fn execute(
        &self,
        tool_name: &str,
        args: Value,
        agent: Option<Arc<Agent>>,
        opts: ExecuteOptions,
    ) -> ToolResult {
        let started = Instant::now();
        let correlation_id = opts
            .correlation_id
            .clone()
            .unwrap_or_else(|| uuid::Uuid::new_v4().to_string());

        let deny = |kind: ErrorKind, message: String, started: Instant| {
            let debug = DebugInfo::stage(RoutingStage::ToolJson, elapsed_ms(started));
            tracing::debug!(tool = tool_name, %kind, "Execution refused: {message}");
            ToolResult::failure(kind, message, debug)
        };

        // 1. Resolve the tool.
        let Some(registered) = self.registry.get(tool_name) else {
            return deny(
                ErrorKind::ToolNotFound,
                format!("unknown tool '{tool_name}'"),
                started,
            );
        };

        // 2. Agent authorization.
        match agent.as_deref() {
            Some(a) if a.kind() == AgentKind::System => {}
            Some(a) => {
                if !a.allows(tool_name) {
                    return deny(
                        ErrorKind::DeniedAgentTool,
                        format!("agent '{}' may not use '{tool_name}'", a.name()),
                        started,
                    );
                }
            }
            None => {
                if !is_safe_tool(tool_name) {
                    return deny(
                        ErrorKind::DeniedNoAgent,
                        format!("'{tool_name}' requires an agent context"),
                        started,
                    );
                }
            }
        }

        // 3. Global deny list.
        if self.permissions.denies(tool_name) {
            return deny(
                ErrorKind::DeniedByPolicy,
                format!("'{tool_name}' is denied by policy"),
                started,
            );
        }

        // 4. Schema validation.
        if let Err(message) = registered.schema.validate(&args) {
            return deny(ErrorKind::ValidationError, message, started);
        }

        // 5. Confirmation gate.
        if self.permissions.requires_confirmation(tool_name) && !opts.confirmed {
            return deny(
                ErrorKind::ConfirmationRequired,
                format!("'{tool_name}' requires confirmation"),
                started,
            );
        }

        // 6. Invoke the handler, serialized per storage file.
        let ctx = ExecContext {
            paths: self.paths.clone(),
            commands: self.commands.clone(),
            storage: self.storage.clone(),
            locks: self.locks.clone(),
            limits: self.limits,
            permissions: self.permissions.clone(),
            agent,
            correlation_id: correlation_id.clone(),
        };

        let tool = &registered.tool;
        let outcome = {
            let _guard = match tool.lock_target(&args, &ctx) {
                Some(path) => Some(self.locks.for_path(&path).lock_owned().await),
                None => None,
            };
            AssertUnwindSafe(tool.execute(args.clone(), &ctx))
                .catch_unwind()
                .await
        };

        let duration_ms = elapsed_ms(started);
        let mut debug = DebugInfo::stage(RoutingStage::ToolJson, duration_ms);
        debug.memory_read = tool.reads_memory();
        debug.memory_write = tool.writes_memory();

        let (result, error) = match outcome {
            Ok(Ok(value)) => (Some(value), None),
            Ok(Err(e)) => (None, Some(ErrorObject::new(e.kind(), e.to_string()))),
            Err(_) => {
                tracing::error!(tool = tool_name, "Handler panicked");
                (
                    None,
                    Some(ErrorObject::new(
                        ErrorKind::ExecError,
                        format!("'{tool_name}' handler panicked"),
                    )),
                )
            }
        };

        // 7. Audit every completed handler call.
        let entry = AuditEntry {
            ts: Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
            tool: tool_name.to_string(),
            args,
            ok: error.is_none(),
            duration_ms,
            correlation_id,
            error: error.clone(),
        };
        self.audit.record(&entry).await;

        ToolResult {
            ok: error.is_none(),
            result,
            error,
            debug,
        }
    }
}

fn elapsed_ms(started: Instant) -> u64 {
    started.elapsed().as_millis() as u64
}
