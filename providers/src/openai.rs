//! OpenAI-compatible HTTP adapter (chat completions wire format).

use serde_json::{Value, json};
use steward_types::{ChatMessage, ToolCallRequest, Usage};

use super::{
    ChatFut, ChatOutcome, ChatProvider, ChatRequest, MAX_SSE_BUFFER_BYTES, ProviderError,
    StreamCallback, StreamChunk, StreamFut, drain_next_sse_event, extract_sse_data, http_client,
    read_capped_error_body,
};

/// Adapter for any endpoint speaking the OpenAI chat-completions protocol.
#[derive(Debug, Clone)]
pub struct OpenAiProvider {
    api_base: String,
    api_key: String,
    model: String,
}

impl OpenAiProvider {
    #[must_use]
    pub fn new(
        api_base: impl Into<String>,
        api_key: impl Into<String>,
        model: impl Into<String>,
    ) -> Self {
        Self {
            api_base: api_base.into().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
            model: model.into(),
        }
    }

    fn endpoint(&self) -> String {
        format!("{}/chat/completions", self.api_base)
    }

    fn build_request_body(&self, request: &ChatRequest, stream: bool) -> Value {
        let mut messages: Vec<Value> = Vec::new();
        if !request.system_prompt.trim().is_empty() {
            messages.push(json!({"role": "system", "content": request.system_prompt}));
        }
        for msg in &request.history {
            messages.push(wire_message(msg));
        }
        messages.push(json!({"role": "user", "content": request.prompt}));

        let mut body = serde_json::Map::new();
        body.insert("model".into(), json!(self.model));
        body.insert("messages".into(), json!(messages));
        if stream {
            body.insert("stream".into(), json!(true));
        } else if !request.tools.is_empty() {
            let tools: Vec<Value> = request
                .tools
                .iter()
                .map(|t| {
                    json!({
                        "type": "function",
                        "function": {
                            "name": t.name,
                            "description": t.description,
                            "parameters": t.schema,
                        }
                    })
                })
                .collect();
            body.insert("tools".into(), json!(tools));
        }
        Value::Object(body)
    }
}

fn wire_message(msg: &ChatMessage) -> Value {
    match msg {
        ChatMessage::User { content } => json!({"role": "user", "content": content}),
        ChatMessage::Assistant { content, tool_call } => match tool_call {
            Some(call) => json!({
                "role": "assistant",
                "content": content,
                "tool_calls": [{
                    "id": "call_0",
                    "type": "function",
                    "function": {
                        "name": call.tool_name,
                        "arguments": call.args.to_string(),
                    }
                }]
            }),
            None => json!({"role": "assistant", "content": content}),
        },
        ChatMessage::Tool { content } => {
            json!({"role": "tool", "tool_call_id": "call_0", "content": content})
        }
    }
}

fn parse_outcome(payload: &Value, model: &str) -> Result<ChatOutcome, ProviderError> {
    let message = payload
        .pointer("/choices/0/message")
        .ok_or_else(|| ProviderError::Malformed("response has no choices".to_string()))?;

    let usage = payload.get("usage").map(|u| Usage {
        prompt_tokens: u["prompt_tokens"].as_u64().unwrap_or(0) as u32,
        completion_tokens: u["completion_tokens"].as_u64().unwrap_or(0) as u32,
    });

    let tool_call = if let Some(call) = message.pointer("/tool_calls/0/function") {
        let name = call["name"]
            .as_str()
            .ok_or_else(|| ProviderError::Malformed("tool call has no name".to_string()))?;
        let raw_args = call["arguments"].as_str().unwrap_or("{}");
        let args: Value = serde_json::from_str(raw_args).map_err(|e| {
            ProviderError::Malformed(format!("tool call arguments are not JSON: {e}"))
        })?;
        Some(ToolCallRequest::new(name, args))
    } else {
        None
    };

    let reply = if tool_call.is_none() {
        Some(
            message["content"]
                .as_str()
                .unwrap_or_default()
                .to_string(),
        )
    } else {
        None
    };

    Ok(ChatOutcome {
        tool_call,
        reply,
        usage,
        model: Some(model.to_string()),
    })
}

impl ChatProvider for OpenAiProvider {
    fn name(&self) -> &'static str {
        "openai"
    }

    fn model(&self) -> Option<&str> {
        Some(&self.model)
    }

    fn chat<'a>(&'a self, request: &'a ChatRequest) -> ChatFut<'a> {
        Box::pin(async move {
            let body = self.build_request_body(request, false);
            let response = http_client()
                .post(self.endpoint())
                .bearer_auth(&self.api_key)
                .json(&body)
                .send()
                .await?;

            if !response.status().is_success() {
                let status = response.status().as_u16();
                let body = read_capped_error_body(response).await;
                return Err(ProviderError::Api { status, body });
            }

            let payload: Value = response.json().await?;
            parse_outcome(&payload, &self.model)
        })
    }

    fn supports_streaming(&self) -> bool {
        true
    }

    fn chat_stream<'a>(&'a self, request: &'a ChatRequest, on_chunk: StreamCallback) -> StreamFut<'a> {
        Box::pin(async move {
            let body = self.build_request_body(request, true);
            let response = http_client()
                .post(self.endpoint())
                .bearer_auth(&self.api_key)
                .json(&body)
                .send()
                .await?;

            if !response.status().is_success() {
                let status = response.status().as_u16();
                let body = read_capped_error_body(response).await;
                return Err(ProviderError::Api { status, body });
            }

            use futures_util::StreamExt;
            let mut stream = response.bytes_stream();
            let mut buffer: Vec<u8> = Vec::new();

            while let Some(chunk) = stream.next().await {
                let chunk = chunk?;
                buffer.extend_from_slice(&chunk);

                if buffer.len() > MAX_SSE_BUFFER_BYTES {
                    return Err(ProviderError::Malformed(
                        "SSE buffer exceeded maximum size (4 MiB)".to_string(),
                    ));
                }

                while let Some(event) = drain_next_sse_event(&mut buffer) {
                    if event.is_empty() {
                        continue;
                    }
                    let event = std::str::from_utf8(&event).map_err(|_| {
                        ProviderError::Malformed("invalid UTF-8 in SSE stream".to_string())
                    })?;
                    if let Some(data) = extract_sse_data(event) {
                        if data == "[DONE]" {
                            on_chunk(StreamChunk {
                                content: String::new(),
                                done: true,
                            });
                            return Ok(());
                        }
                        if let Ok(json) = serde_json::from_str::<Value>(&data)
                            && let Some(delta) = json
                                .pointer("/choices/0/delta/content")
                                .and_then(Value::as_str)
                        {
                            on_chunk(StreamChunk {
                                content: delta.to_string(),
                                done: false,
                            });
                        }
                    }
                }
            }

            // Connection closed without [DONE]; surface the tail marker anyway.
            on_chunk(StreamChunk {
                content: String::new(),
                done: true,
            });
            Ok(())
        })
    }
}
