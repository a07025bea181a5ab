//! LLM provider port.
//!
//! The router depends only on the [`ChatProvider`] trait; wire formats are
//! the adapters' business. Three implementations live here: an
//! OpenAI-compatible HTTP adapter, a deterministic mock for tests and
//! evals, and a caching wrapper that composes over any adapter.

pub mod cache;
pub mod mock;
pub mod openai;

use std::future::Future;
use std::pin::Pin;
use std::sync::OnceLock;
use std::time::Duration;

use serde_json::Value;
use steward_types::{ChatMessage, ToolCallRequest, Usage};

pub use cache::CachingProvider;
pub use mock::MockProvider;
pub use openai::OpenAiProvider;

/// Connection timeout for API requests.
const CONNECT_TIMEOUT_SECS: u64 = 30;

/// Maximum bytes for SSE buffer before aborting (4 MiB).
const MAX_SSE_BUFFER_BYTES: usize = 4 * 1024 * 1024;

/// Maximum bytes for error body reads (32 KiB).
const MAX_ERROR_BODY_BYTES: usize = 32 * 1024;

/// Shared HTTP client for all provider requests.
///
/// Connect timeout only; SSE streams may legitimately run for a long time.
/// Redirects are disabled: API endpoints should never redirect.
pub(crate) fn http_client() -> &'static reqwest::Client {
    static CLIENT: OnceLock<reqwest::Client> = OnceLock::new();
    CLIENT.get_or_init(|| {
        reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(CONNECT_TIMEOUT_SECS))
            .redirect(reqwest::redirect::Policy::none())
            .build()
            .expect("build shared HTTP client")
    })
}

/// Provider-layer failures.
#[derive(Debug, thiserror::Error)]
pub enum ProviderError {
    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("API error {status}: {body}")]
    Api { status: u16, body: String },
    #[error("malformed provider response: {0}")]
    Malformed(String),
    #[error("streaming not supported by {0}")]
    StreamingUnsupported(&'static str),
}

/// A tool definition as exported to the provider.
#[derive(Debug, Clone, PartialEq)]
pub struct ToolSpec {
    pub name: String,
    pub description: String,
    pub schema: Value,
}

/// One chat turn handed to a provider.
#[derive(Debug, Clone)]
pub struct ChatRequest {
    pub prompt: String,
    pub tools: Vec<ToolSpec>,
    pub history: Vec<ChatMessage>,
    pub system_prompt: String,
}

/// What a provider produced: a tool call or a text reply, never both.
#[derive(Debug, Clone, PartialEq)]
pub struct ChatOutcome {
    pub tool_call: Option<ToolCallRequest>,
    pub reply: Option<String>,
    pub usage: Option<Usage>,
    pub model: Option<String>,
}

impl ChatOutcome {
    #[must_use]
    pub fn reply(text: impl Into<String>) -> Self {
        Self {
            tool_call: None,
            reply: Some(text.into()),
            usage: None,
            model: None,
        }
    }

    #[must_use]
    pub fn tool_call(call: ToolCallRequest) -> Self {
        Self {
            tool_call: Some(call),
            reply: None,
            usage: None,
            model: None,
        }
    }
}

/// One incremental chunk of a streamed reply.
#[derive(Debug, Clone, PartialEq)]
pub struct StreamChunk {
    pub content: String,
    pub done: bool,
}

/// Chat future type alias.
pub type ChatFut<'a> = Pin<Box<dyn Future<Output = Result<ChatOutcome, ProviderError>> + Send + 'a>>;
/// Streaming future type alias; chunks are delivered through the callback.
pub type StreamFut<'a> = Pin<Box<dyn Future<Output = Result<(), ProviderError>> + Send + 'a>>;
/// Chunk delivery callback.
pub type StreamCallback = Box<dyn Fn(StreamChunk) + Send>;

/// Abstract chat interface. The core depends only on this.
pub trait ChatProvider: Send + Sync {
    /// Short identifier for logs and debug output.
    fn name(&self) -> &'static str;

    /// The model this provider will answer with, if known up front.
    fn model(&self) -> Option<&str> {
        None
    }

    fn chat<'a>(&'a self, request: &'a ChatRequest) -> ChatFut<'a>;

    fn supports_streaming(&self) -> bool {
        false
    }

    /// Stream a text reply. Implementations that cannot stream return
    /// [`ProviderError::StreamingUnsupported`].
    fn chat_stream<'a>(&'a self, _request: &'a ChatRequest, _on_chunk: StreamCallback) -> StreamFut<'a> {
        let name = self.name();
        Box::pin(async move { Err(ProviderError::StreamingUnsupported(name)) })
    }
}

fn find_sse_event_boundary(buffer: &[u8]) -> Option<(usize, usize)> {
    let lf = buffer.windows(2).position(|w| w == b"\n\n");
    let crlf = buffer.windows(4).position(|w| w == b"\r\n\r\n");
    match (lf, crlf) {
        (Some(a), Some(b)) => Some(if a <= b { (a, 2) } else { (b, 4) }),
        (Some(a), None) => Some((a, 2)),
        (None, Some(b)) => Some((b, 4)),
        (None, None) => None,
    }
}

pub(crate) fn drain_next_sse_event(buffer: &mut Vec<u8>) -> Option<Vec<u8>> {
    let (pos, delim_len) = find_sse_event_boundary(buffer)?;
    let event = buffer[..pos].to_vec();
    buffer.drain(..pos + delim_len);
    Some(event)
}

pub(crate) fn extract_sse_data(event: &str) -> Option<String> {
    let mut data = String::new();
    let mut found = false;

    for line in event.lines() {
        let line = line.strip_suffix('\r').unwrap_or(line);

        if let Some(mut rest) = line.strip_prefix("data:") {
            if let Some(stripped) = rest.strip_prefix(' ') {
                rest = stripped;
            }

            if found {
                data.push('\n');
            }
            data.push_str(rest);
            found = true;
        }
    }

    if found { Some(data) } else { None }
}

/// Read an HTTP error response body with size limits.
pub(crate) async fn read_capped_error_body(response: reqwest::Response) -> String {
    use futures_util::StreamExt;
    let mut body = Vec::new();
    let mut stream = response.bytes_stream();
    while let Some(chunk) = stream.next().await {
        let Ok(chunk) = chunk else { break };
        body.extend_from_slice(&chunk);
        if body.len() > MAX_ERROR_BODY_BYTES {
            body.truncate(MAX_ERROR_BODY_BYTES);
            let text = String::from_utf8_lossy(&body);
            return format!("{text}...(truncated)");
        }
    }
    String::from_utf8_lossy(&body).into_owned()
}

#[cfg(test)]
mod tests {
    use super::{drain_next_sse_event, extract_sse_data};

    #[test]
    fn drains_events_on_blank_line_boundaries() {
        let mut buffer = b"data: one\n\ndata: two\n\npartial".to_vec();
        assert_eq!(drain_next_sse_event(&mut buffer), Some(b"data: one".to_vec()));
        assert_eq!(drain_next_sse_event(&mut buffer), Some(b"data: two".to_vec()));
        assert_eq!(drain_next_sse_event(&mut buffer), None);
        assert_eq!(buffer, b"partial".to_vec());
    }

    #[test]
    fn handles_crlf_boundaries() {
        let mut buffer = b"data: x\r\n\r\nrest".to_vec();
        assert_eq!(drain_next_sse_event(&mut buffer), Some(b"data: x\r".to_vec()));
        assert_eq!(buffer, b"rest".to_vec());
    }

    #[test]
    fn joins_multi_line_data_fields() {
        let event = "data: first\ndata: second";
        assert_eq!(extract_sse_data(event), Some("first\nsecond".to_string()));
    }

    #[test]
    fn non_data_events_yield_none() {
        assert_eq!(extract_sse_data(": keepalive"), None);
        assert_eq!(extract_sse_data("event: ping"), None);
    }
}
