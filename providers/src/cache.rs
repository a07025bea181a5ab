//! Response caching wrapper over any chat provider.
//!
//! Keyed by a fingerprint of `(prompt, sorted tool names, last-3 history
//! messages, system prompt, tool wire format)`. Only successful responses
//! are cached; streaming responses never are.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use sha2::{Digest, Sha256};

use super::{ChatFut, ChatOutcome, ChatProvider, ChatRequest, StreamCallback, StreamFut};

/// Tag describing how tools are serialized on the wire; part of the
/// fingerprint so a format change invalidates old entries.
const TOOL_FORMAT: &str = "openai-tools-v1";

const DEFAULT_TTL_SECS: u64 = 24 * 60 * 60;

struct CacheEntry {
    outcome: ChatOutcome,
    stored_at: Instant,
}

/// Caching wrapper composing over any [`ChatProvider`].
pub struct CachingProvider {
    inner: Arc<dyn ChatProvider>,
    ttl: Duration,
    entries: Mutex<HashMap<String, CacheEntry>>,
}

impl CachingProvider {
    #[must_use]
    pub fn new(inner: Arc<dyn ChatProvider>) -> Self {
        Self::with_ttl(inner, Duration::from_secs(DEFAULT_TTL_SECS))
    }

    #[must_use]
    pub fn with_ttl(inner: Arc<dyn ChatProvider>, ttl: Duration) -> Self {
        Self {
            inner,
            ttl,
            entries: Mutex::new(HashMap::new()),
        }
    }

    fn lookup(&self, key: &str) -> Option<ChatOutcome> {
        let entries = self.entries.lock().expect("cache lock poisoned");
        entries
            .get(key)
            .filter(|e| e.stored_at.elapsed() < self.ttl)
            .map(|e| e.outcome.clone())
    }

    fn store(&self, key: String, outcome: &ChatOutcome) {
        let mut entries = self.entries.lock().expect("cache lock poisoned");
        entries.insert(
            key,
            CacheEntry {
                outcome: outcome.clone(),
                stored_at: Instant::now(),
            },
        );
    }
}

/// Compute the cache fingerprint for a request.
#[must_use]
pub fn fingerprint(request: &ChatRequest) -> String {
    let mut hasher = Sha256::new();
    hasher.update(request.prompt.as_bytes());
    hasher.update([0]);

    let mut names: Vec<&str> = request.tools.iter().map(|t| t.name.as_str()).collect();
    names.sort_unstable();
    for name in names {
        hasher.update(name.as_bytes());
        hasher.update([0]);
    }

    let tail = request.history.len().saturating_sub(3);
    for msg in &request.history[tail..] {
        let line = serde_json::to_string(msg).unwrap_or_default();
        hasher.update(line.as_bytes());
        hasher.update([0]);
    }

    hasher.update(request.system_prompt.as_bytes());
    hasher.update([0]);
    hasher.update(TOOL_FORMAT.as_bytes());

    format!("{:x}", hasher.finalize())
}

impl ChatProvider for CachingProvider {
    fn name(&self) -> &'static str {
        "cache"
    }

    fn model(&self) -> Option<&str> {
        self.inner.model()
    }

    fn chat<'a>(&'a self, request: &'a ChatRequest) -> ChatFut<'a> {
        Box::pin(async move {
            let key = fingerprint(request);
            if let Some(hit) = self.lookup(&key) {
                tracing::debug!(key = %&key[..12], "LLM cache hit");
                return Ok(hit);
            }
            let outcome = self.inner.chat(request).await?;
            self.store(key, &outcome);
            Ok(outcome)
        })
    }

    fn supports_streaming(&self) -> bool {
        self.inner.supports_streaming()
    }

    fn chat_stream<'a>(&'a self, request: &'a ChatRequest, on_chunk: StreamCallback) -> StreamFut<'a> {
        // Streaming responses are never cached; pass straight through.
        self.inner.chat_stream(request, on_chunk)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::time::Duration;

    use super::{CachingProvider, fingerprint};
    use crate::{ChatFut, ChatOutcome, ChatProvider, ChatRequest, ToolSpec};
    use serde_json::json;
    use steward_types::ChatMessage;

    struct CountingProvider {
        calls: AtomicU32,
    }

    impl ChatProvider for CountingProvider {
        fn name(&self) -> &'static str {
            "counting"
        }

        fn chat<'a>(&'a self, request: &'a ChatRequest) -> ChatFut<'a> {
            let n = self.calls.fetch_add(1, Ordering::SeqCst);
            let reply = format!("{} #{n}", request.prompt);
            Box::pin(async move { Ok(ChatOutcome::reply(reply)) })
        }
    }

    fn request(prompt: &str) -> ChatRequest {
        ChatRequest {
            prompt: prompt.to_string(),
            tools: Vec::new(),
            history: Vec::new(),
            system_prompt: "sys".to_string(),
        }
    }

    #[tokio::test]
    async fn repeated_requests_hit_the_cache() {
        let inner = Arc::new(CountingProvider {
            calls: AtomicU32::new(0),
        });
        let cache = CachingProvider::new(inner.clone());

        let a = cache.chat(&request("hi")).await.expect("chat");
        let b = cache.chat(&request("hi")).await.expect("chat");
        assert_eq!(a, b);
        assert_eq!(inner.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn expired_entries_are_refetched() {
        let inner = Arc::new(CountingProvider {
            calls: AtomicU32::new(0),
        });
        let cache = CachingProvider::with_ttl(inner.clone(), Duration::from_millis(0));

        cache.chat(&request("hi")).await.expect("chat");
        cache.chat(&request("hi")).await.expect("chat");
        assert_eq!(inner.calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn fingerprint_ignores_tool_ordering() {
        let mut a = request("p");
        let mut b = request("p");
        let spec = |name: &str| ToolSpec {
            name: name.to_string(),
            description: String::new(),
            schema: json!({}),
        };
        a.tools = vec![spec("alpha"), spec("beta")];
        b.tools = vec![spec("beta"), spec("alpha")];
        assert_eq!(fingerprint(&a), fingerprint(&b));
    }

    #[test]
    fn fingerprint_keys_on_the_last_three_history_messages() {
        let mut a = request("p");
        let mut b = request("p");
        a.history = vec![
            ChatMessage::user("old-a"),
            ChatMessage::user("1"),
            ChatMessage::user("2"),
            ChatMessage::user("3"),
        ];
        b.history = vec![
            ChatMessage::user("old-b"),
            ChatMessage::user("1"),
            ChatMessage::user("2"),
            ChatMessage::user("3"),
        ];
        // Only the trailing three messages participate in the key.
        assert_eq!(fingerprint(&a), fingerprint(&b));

        let mut c = request("p");
        c.history = vec![ChatMessage::user("1"), ChatMessage::user("2"), ChatMessage::user("changed")];
        assert_ne!(fingerprint(&a), fingerprint(&c));
    }

    #[test]
    fn fingerprint_differs_by_system_prompt() {
        let a = request("p");
        let mut b = request("p");
        b.system_prompt = "other".to_string();
        assert_ne!(fingerprint(&a), fingerprint(&b));
    }
}
