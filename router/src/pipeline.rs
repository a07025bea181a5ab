//! The routing pipeline: deterministic parser stages, the LLM fallback,
//! and the terminal fallback.

use std::sync::Arc;
use std::time::Instant;

use steward_providers::{ChatOutcome, ChatProvider, ChatRequest, StreamCallback};
use steward_tools::{ToolDefinition, ToolRegistry};
use steward_types::{
    Agent, ChatMessage, DebugInfo, Intent, RouteErrorCode, RouteResult, RoutingStage,
    ToolCallRequest, Usage, tool_allowed, valid_slice,
};

use super::{ParseOutcome, ToolsetCache, fastpath, heuristic};

/// Per-route options.
#[derive(Debug, Default, Clone)]
pub struct RouteOptions {
    /// Instruction override for echo replies; defaults to the intent's
    /// canned instruction.
    pub forced_instruction: Option<String>,
    pub correlation_id: Option<String>,
}

pub struct Router {
    registry: Arc<ToolRegistry>,
    toolsets: ToolsetCache,
    history_limit: usize,
}

impl Router {
    #[must_use]
    pub fn new(registry: Arc<ToolRegistry>, history_limit: usize) -> Self {
        Self {
            registry,
            toolsets: ToolsetCache::new(),
            history_limit,
        }
    }

    /// Route one input. Pure given the provider: no I/O beyond what the
    /// provider performs.
    pub async fn route(
        &self,
        input: &str,
        intent: Intent,
        history: &[ChatMessage],
        agent: Option<&Arc<Agent>>,
        provider: Option<&dyn ChatProvider>,
        opts: &RouteOptions,
    ) -> RouteResult {
        let started = Instant::now();
        let input = input.trim();

        // Empty input is a continuation when history exists, an error
        // otherwise.
        if input.is_empty() && history.is_empty() {
            return RouteResult::error("empty input", RouteErrorCode::Validation);
        }

        if !input.is_empty() {
            if let Some(result) = self.deterministic_stages(input, intent, agent, started) {
                return result;
            }
        }

        match provider {
            Some(provider) => {
                self.llm_fallback(input, intent, history, agent, provider, opts, started)
                    .await
            }
            None => terminal_fallback(input, intent, opts, started),
        }
    }

    /// Streaming variant for interactive UIs. Deterministic stages and
    /// tool-call routes behave exactly like [`Router::route`]; only an
    /// LLM text reply is streamed through `on_chunk`.
    pub async fn route_stream(
        &self,
        input: &str,
        intent: Intent,
        history: &[ChatMessage],
        agent: Option<&Arc<Agent>>,
        provider: Option<&dyn ChatProvider>,
        opts: &RouteOptions,
        on_chunk: StreamCallback,
    ) -> RouteResult {
        let result = self
            .route(input, intent, history, agent, provider, opts)
            .await;

        let RouteResult::Reply { .. } = &result else {
            return result;
        };
        let Some(provider) = provider.filter(|p| p.supports_streaming()) else {
            return result;
        };

        let request = self.chat_request(input, history, agent);
        let collected = Arc::new(std::sync::Mutex::new(String::new()));
        let sink = collected.clone();
        let stream_result = provider
            .chat_stream(
                &request,
                Box::new(move |chunk| {
                    sink.lock().expect("stream sink").push_str(&chunk.content);
                    on_chunk(chunk);
                }),
            )
            .await;

        match stream_result {
            Ok(()) => {
                let content = collected.lock().expect("stream sink").clone();
                match result {
                    RouteResult::Reply {
                        intent,
                        instruction,
                        usage,
                        debug,
                        ..
                    } => RouteResult::Reply {
                        intent,
                        content,
                        instruction,
                        usage,
                        debug,
                    },
                    other => other,
                }
            }
            Err(e) => {
                tracing::warn!("Streaming failed, using buffered reply: {e}");
                result
            }
        }
    }

    /// Run the four deterministic parsers in order. `None` means no stage
    /// produced a decision and the caller should fall through to the LLM.
    fn deterministic_stages(
        &self,
        input: &str,
        intent: Intent,
        agent: Option<&Arc<Agent>>,
        started: Instant,
    ) -> Option<RouteResult> {
        let stages: [(RoutingStage, fn(&str) -> ParseOutcome); 4] = [
            (RoutingStage::RegexFastPath, fastpath::parse),
            (RoutingStage::HeuristicParse, heuristic::parse_file_op),
            (RoutingStage::CliParse, heuristic::parse_task),
            (RoutingStage::HeuristicParse, heuristic::parse_memory),
        ];

        for (stage, parser) in stages {
            match parser(input) {
                ParseOutcome::Match(call) => {
                    // A parser match the agent may not use is skipped, not
                    // errored: the executor would refuse it, so the router
                    // must not propose it.
                    if !tool_allowed(agent.map(Arc::as_ref), &call.tool_name) {
                        tracing::debug!(
                            tool = %call.tool_name,
                            ?stage,
                            "Stage match not in agent allowlist; skipping stage"
                        );
                        continue;
                    }
                    return Some(tool_call_result(intent, call, None, None, stage, started));
                }
                ParseOutcome::Reject { message } => {
                    return Some(RouteResult::error(message, RouteErrorCode::Validation));
                }
                ParseOutcome::Skip => {}
            }
        }
        None
    }

    fn chat_request(
        &self,
        input: &str,
        history: &[ChatMessage],
        agent: Option<&Arc<Agent>>,
    ) -> ChatRequest {
        let definitions = self.registry.definitions();
        let (agent_name, system_prompt) = match agent {
            Some(agent) => (agent.name().to_string(), agent.system_prompt().to_string()),
            None => (
                "_anonymous".to_string(),
                "You are a careful local assistant limited to read-only tools.".to_string(),
            ),
        };
        let allowed = |def: &ToolDefinition| match agent {
            // Experimental tools reach the manifest only when an agent
            // opts in by naming them in its allowlist.
            Some(agent) => match agent.kind() {
                steward_types::AgentKind::System => !def.experimental,
                steward_types::AgentKind::User => agent.allows(&def.name),
            },
            None => steward_types::is_safe_tool(&def.name) && !def.experimental,
        };
        let tools = self.toolsets.get_or_build(&agent_name, &definitions, allowed);

        ChatRequest {
            prompt: input.to_string(),
            tools: tools.as_ref().clone(),
            history: valid_slice(history, self.history_limit).to_vec(),
            system_prompt,
        }
    }

    #[allow(clippy::too_many_arguments)]
    async fn llm_fallback(
        &self,
        input: &str,
        intent: Intent,
        history: &[ChatMessage],
        agent: Option<&Arc<Agent>>,
        provider: &dyn ChatProvider,
        opts: &RouteOptions,
        started: Instant,
    ) -> RouteResult {
        let request = self.chat_request(input, history, agent);

        let outcome = match provider.chat(&request).await {
            Ok(outcome) => outcome,
            Err(e) => {
                tracing::warn!("Provider call failed: {e}");
                return RouteResult::error(
                    format!("provider error: {e}"),
                    RouteErrorCode::NotRoutable,
                );
            }
        };

        let ChatOutcome {
            tool_call,
            reply,
            usage,
            model,
        } = outcome;

        if let Some(call) = tool_call {
            // A provider may hallucinate: the name must exist in the
            // registry AND pass the same agent rule the executor applies.
            if !self.registry.contains(&call.tool_name) {
                return RouteResult::error(
                    format!("provider proposed unknown tool '{}'", call.tool_name),
                    RouteErrorCode::Validation,
                );
            }
            if !tool_allowed(agent.map(Arc::as_ref), &call.tool_name) {
                return RouteResult::error(
                    format!("provider proposed disallowed tool '{}'", call.tool_name),
                    RouteErrorCode::Validation,
                );
            }
            return tool_call_result(
                intent,
                call,
                usage,
                model,
                RoutingStage::LlmFallback,
                started,
            );
        }

        let mut debug = DebugInfo::stage(RoutingStage::LlmFallback, elapsed_ms(started));
        debug.model = model;
        RouteResult::Reply {
            intent,
            content: reply.unwrap_or_default(),
            instruction: opts
                .forced_instruction
                .clone()
                .unwrap_or_else(|| intent.instruction().to_string()),
            usage,
            debug,
        }
    }
}

fn tool_call_result(
    intent: Intent,
    call: ToolCallRequest,
    usage: Option<Usage>,
    model: Option<String>,
    stage: RoutingStage,
    started: Instant,
) -> RouteResult {
    let mut debug = DebugInfo::stage(stage, elapsed_ms(started));
    debug.model = model;
    RouteResult::ToolCall {
        intent,
        tool_call: call,
        usage,
        debug,
    }
}

fn terminal_fallback(
    input: &str,
    intent: Intent,
    opts: &RouteOptions,
    started: Instant,
) -> RouteResult {
    if intent == Intent::Spike {
        return RouteResult::error("no tool found", RouteErrorCode::NotRoutable);
    }
    RouteResult::Reply {
        intent,
        content: input.to_string(),
        instruction: opts
            .forced_instruction
            .clone()
            .unwrap_or_else(|| intent.instruction().to_string()),
        usage: None,
        debug: DebugInfo::stage(RoutingStage::Fallback, elapsed_ms(started)),
    }
}

fn elapsed_ms(started: Instant) -> u64 {
    started.elapsed().as_millis() as u64
}
