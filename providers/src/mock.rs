//! Deterministic mock provider keyed by input string.
//!
//! Used by tests and evals: scripted inputs map to fixed outcomes, and
//! anything unscripted falls back to an echo reply, so routing stays a
//! pure function of its inputs.

use std::collections::HashMap;

use serde_json::Value;
use steward_types::ToolCallRequest;

use super::{
    ChatFut, ChatOutcome, ChatProvider, ChatRequest, StreamCallback, StreamChunk, StreamFut,
};

#[derive(Debug, Default)]
pub struct MockProvider {
    scripted: HashMap<String, ChatOutcome>,
}

impl MockProvider {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Script a tool call for an exact input string.
    #[must_use]
    pub fn with_tool_call(mut self, input: impl Into<String>, tool: &str, args: Value) -> Self {
        self.scripted.insert(
            input.into(),
            ChatOutcome::tool_call(ToolCallRequest::new(tool, args)),
        );
        self
    }

    /// Script a text reply for an exact input string.
    #[must_use]
    pub fn with_reply(mut self, input: impl Into<String>, reply: impl Into<String>) -> Self {
        self.scripted.insert(input.into(), ChatOutcome::reply(reply));
        self
    }

    fn outcome_for(&self, prompt: &str) -> ChatOutcome {
        self.scripted
            .get(prompt)
            .cloned()
            .unwrap_or_else(|| ChatOutcome::reply(format!("(mock) {prompt}")))
    }
}

impl ChatProvider for MockProvider {
    fn name(&self) -> &'static str {
        "mock"
    }

    fn model(&self) -> Option<&str> {
        Some("mock")
    }

    fn chat<'a>(&'a self, request: &'a ChatRequest) -> ChatFut<'a> {
        let outcome = self.outcome_for(&request.prompt);
        Box::pin(async move { Ok(outcome) })
    }

    fn supports_streaming(&self) -> bool {
        true
    }

    fn chat_stream<'a>(&'a self, request: &'a ChatRequest, on_chunk: StreamCallback) -> StreamFut<'a> {
        let outcome = self.outcome_for(&request.prompt);
        Box::pin(async move {
            if let Some(reply) = outcome.reply {
                on_chunk(StreamChunk {
                    content: reply,
                    done: false,
                });
            }
            on_chunk(StreamChunk {
                content: String::new(),
                done: true,
            });
            Ok(())
        })
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::{ChatProvider, ChatRequest, MockProvider};

    fn request(prompt: &str) -> ChatRequest {
        ChatRequest {
            prompt: prompt.to_string(),
            tools: Vec::new(),
            history: Vec::new(),
            system_prompt: String::new(),
        }
    }

    #[tokio::test]
    async fn scripted_tool_call_is_returned_verbatim() {
        let mock = MockProvider::new().with_tool_call(
            "note that down",
            "remember",
            json!({"text": "that"}),
        );
        let outcome = mock.chat(&request("note that down")).await.expect("chat");
        assert_eq!(outcome.tool_call.expect("call").tool_name, "remember");
    }

    #[tokio::test]
    async fn unscripted_input_echoes() {
        let mock = MockProvider::new();
        let outcome = mock.chat(&request("hello")).await.expect("chat");
        assert_eq!(outcome.reply.as_deref(), Some("(mock) hello"));
    }

    #[tokio::test]
    async fn same_input_always_yields_the_same_outcome() {
        let mock = MockProvider::new().with_reply("ping", "pong");
        let a = mock.chat(&request("ping")).await.expect("chat");
        let b = mock.chat(&request("ping")).await.expect("chat");
        assert_eq!(a, b);
    }
}
