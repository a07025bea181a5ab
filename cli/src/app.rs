//! Application wiring: the composition root.

use std::collections::HashMap;
use std::sync::Arc;

use anyhow::Context as _;
use chrono::{SecondsFormat, Utc};
use serde_json::{Value, json};

use steward_config::ResolvedConfig;
use steward_providers::{CachingProvider, ChatProvider, OpenAiProvider};
use steward_router::{RouteOptions, Router};
use steward_storage::{PathLocks, append_jsonl, recover_bak_file};
use steward_tools::builtins::register_builtins;
use steward_tools::{
    AuditLog, CommandCapability, ExecuteOptions, Executor, PathCapability, ToolRegistry,
};
use steward_types::{Agent, ErrorKind, Intent, PermissionSet, RouteResult};

use crate::output;

/// Default allowlist for the out-of-the-box assistant agent: no file
/// writes, no subprocesses.
const ASSISTANT_TOOLS: &[&str] = &[
    "recall",
    "get_time",
    "calculate",
    "task_add",
    "task_list",
    "task_done",
    "remind",
    "read_file",
    "list_files",
];

pub struct App {
    config: ResolvedConfig,
    router: Router,
    executor: Executor,
    agents: HashMap<String, Arc<Agent>>,
    provider: Option<Box<dyn ChatProvider>>,
}

impl App {
    pub fn build() -> anyhow::Result<Self> {
        let env = |key: &str| std::env::var(key).ok();
        let config = steward_config::load().context("loading config")?;
        let permissions = steward_config::load_permissions(&steward_config::permissions_path(&env))
            .context("loading permissions")?;

        // Restore any write interrupted by a crash before anything reads.
        recover_bak_file(&config.storage.memory);

        let mut registry = ToolRegistry::new();
        register_builtins(&mut registry).context("registering built-in tools")?;
        let registry = Arc::new(registry);

        let paths = PathCapability::new(&config.base_dir, &permissions.allow_paths)
            .map_err(|e| anyhow::anyhow!("building path capability: {e}"))?;
        let commands = CommandCapability::new(
            permissions.allow_commands.clone(),
            config.limits.max_output_bytes,
        );
        let permissions = Arc::new(permissions);

        let executor = Executor::new(
            registry.clone(),
            Arc::new(paths),
            Arc::new(commands),
            config.storage.clone(),
            Arc::new(PathLocks::new()),
            config.limits,
            permissions.clone(),
            Arc::new(AuditLog::new(config.storage.audit.clone())),
        );

        let router = Router::new(registry.clone(), config.history_limit);
        let agents = build_agents(&config, &permissions);
        let provider = build_provider(&config);

        Ok(Self {
            config,
            router,
            executor,
            agents,
            provider,
        })
    }

    /// Resolve an agent context flag: "none" is agentless, anything else
    /// must name a built agent.
    pub fn agent_named(&self, name: &str) -> anyhow::Result<Option<Arc<Agent>>> {
        if name.eq_ignore_ascii_case("none") {
            return Ok(None);
        }
        self.agents
            .get(&name.to_lowercase())
            .cloned()
            .map(Some)
            .with_context(|| format!("unknown agent '{name}'"))
    }

    pub async fn route_and_execute(
        &self,
        input: &str,
        intent: Intent,
        agent: Option<Arc<Agent>>,
        dry_run: bool,
        confirm: bool,
        machine: bool,
    ) -> anyhow::Result<i32> {
        let correlation_id = uuid_like();
        let opts = RouteOptions {
            forced_instruction: None,
            correlation_id: Some(correlation_id.clone()),
        };
        let route = self
            .router
            .route(
                input,
                intent,
                &[],
                agent.as_ref(),
                self.provider.as_deref(),
                &opts,
            )
            .await;
        self.log_command(input, intent, &route, &correlation_id);

        match route {
            RouteResult::ToolCall {
                ref tool_call, ..
            } if !dry_run => {
                let result = self
                    .executor
                    .execute(
                        &tool_call.tool_name,
                        tool_call.args.clone(),
                        agent,
                        ExecuteOptions {
                            confirmed: confirm,
                            correlation_id: Some(correlation_id),
                        },
                    )
                    .await;
                output::print_tool_result(&tool_call.tool_name, &result, machine);
                Ok(result.exit_code())
            }
            other => {
                let code = output::print_route_result(&other, machine);
                Ok(code)
            }
        }
    }

    pub async fn exec(
        &self,
        tool: &str,
        raw_args: Option<&str>,
        agent: Option<Arc<Agent>>,
        confirm: bool,
        machine: bool,
    ) -> anyhow::Result<i32> {
        // Malformed JSON input to the executor is a parse error, exit 2.
        let args: Value = match raw_args {
            None => json!({}),
            Some(raw) => match serde_json::from_str(raw) {
                Ok(args) => args,
                Err(e) => {
                    output::print_parse_error(&format!("arguments are not valid JSON: {e}"), machine);
                    return Ok(ErrorKind::ParseError.exit_code());
                }
            },
        };

        let result = self
            .executor
            .execute(
                tool,
                args,
                agent,
                ExecuteOptions {
                    confirmed: confirm,
                    correlation_id: None,
                },
            )
            .await;
        output::print_tool_result(tool, &result, machine);
        Ok(result.exit_code())
    }

    pub fn list_tools(&self, machine: bool) {
        let defs = self.executor.registry().definitions();
        if machine {
            let tools: Vec<Value> = defs
                .iter()
                .map(|d| json!({"name": d.name, "description": d.description}))
                .collect();
            println!("{}", json!({"ok": true, "result": {"tools": tools}}));
        } else {
            for def in defs {
                let tag = if def.experimental { " (experimental)" } else { "" };
                println!("{}{tag}  {}", def.name, def.description);
            }
        }
    }

    /// One JSONL record per routed input. Core never reads this file;
    /// it exists for the operator and offline analytics.
    fn log_command(&self, input: &str, intent: Intent, route: &RouteResult, correlation_id: &str) {
        let outcome = match route {
            RouteResult::ToolCall { tool_call, .. } => {
                json!({"kind": "tool_call", "tool": tool_call.tool_name})
            }
            RouteResult::Reply { .. } => json!({"kind": "reply"}),
            RouteResult::Error { code, .. } => {
                json!({"kind": "error", "code": code.as_u8()})
            }
        };
        let record = json!({
            "ts": Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
            "input": input,
            "intent": intent,
            "outcome": outcome,
            "correlation_id": correlation_id,
        });
        if let Err(e) = append_jsonl(&self.config.storage.command_log, &record) {
            tracing::warn!("Command log append failed: {e}");
        }
    }
}

fn build_agents(
    config: &ResolvedConfig,
    _permissions: &PermissionSet,
) -> HashMap<String, Arc<Agent>> {
    let mut agents: HashMap<String, Arc<Agent>> = HashMap::new();

    // The only place system trust is minted.
    agents.insert(
        "system".to_string(),
        Arc::new(Agent::system(
            "system",
            "Operator context with every tool available.",
            "You are steward, a local assistant. Prefer tools over guessing.",
            [],
        )),
    );

    for spec in &config.agents {
        let agent: Agent = Agent::user(
            spec.name.to_lowercase(),
            spec.description.clone(),
            spec.system_prompt.clone(),
            spec.tools.iter().cloned(),
        );
        agents.insert(agent.name().to_string(), Arc::new(agent));
    }

    // A conservative default assistant unless the config defines one.
    agents.entry("assistant".to_string()).or_insert_with(|| {
        Arc::new(Agent::user(
            "assistant",
            "General helper without file-write or subprocess tools.",
            "You are a careful local assistant. Use only your listed tools.",
            ASSISTANT_TOOLS.iter().map(|s| (*s).to_string()),
        ))
    });

    agents
}

fn build_provider(config: &ResolvedConfig) -> Option<Box<dyn ChatProvider>> {
    let api_key = config.api_key.as_ref()?;
    let inner = Arc::new(OpenAiProvider::new(
        config.api_base.clone(),
        api_key.clone(),
        config.model.clone(),
    ));
    Some(Box::new(CachingProvider::new(inner)))
}

/// Correlation ids thread router and executor logging together.
fn uuid_like() -> String {
    uuid::Uuid::new_v4().to_string()
}
