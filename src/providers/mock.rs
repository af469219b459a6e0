/*!
 * Deterministic provider for tests and dry runs.
 *
 * - `MockProvider::uppercase()` - translates by uppercasing every cue
 * - `MockProvider::failing(error)` - always fails with `error`
 * - `MockProvider::scripted(replies)` - plays canned replies in order
 * - `MockProvider::new(responder)` - arbitrary behaviour
 * - `.with_delay(f)` - holds each reply back before answering
 *
 * Every request is recorded so tests can inspect prompts afterwards.
 */

use async_trait::async_trait;
use parking_lot::Mutex;
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use super::{Completion, CompletionRequest, Provider};
use crate::errors::ProviderError;
use crate::translation::prompts::TranslationPayload;

type Responder = dyn Fn(&CompletionRequest, usize) -> Result<String, ProviderError> + Send + Sync;
type Delay = dyn Fn(&CompletionRequest) -> Duration + Send + Sync;

/// Mock provider for testing translation behavior
pub struct MockProvider {
    responder: Arc<Responder>,
    delay: Option<Arc<Delay>>,
    request_count: AtomicUsize,
    requests: Mutex<Vec<CompletionRequest>>,
}

impl fmt::Debug for MockProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MockProvider")
            .field("request_count", &self.request_count.load(Ordering::SeqCst))
            .finish()
    }
}

impl MockProvider {
    /// Mock driven by `responder`, which gets the request and its 0-based call number
    pub fn new<F>(responder: F) -> Self
    where
        F: Fn(&CompletionRequest, usize) -> Result<String, ProviderError> + Send + Sync + 'static,
    {
        MockProvider {
            responder: Arc::new(responder),
            delay: None,
            request_count: AtomicUsize::new(0),
            requests: Mutex::new(Vec::new()),
        }
    }

    /// Wait `delay(request)` before each reply; the responder runs after the wait
    pub fn with_delay<F>(mut self, delay: F) -> Self
    where
        F: Fn(&CompletionRequest) -> Duration + Send + Sync + 'static,
    {
        self.delay = Some(Arc::new(delay));
        self
    }

    /// Translates by uppercasing. Context extraction requests get an empty context.
    pub fn uppercase() -> Self {
        Self::new(|request, _| Ok(Self::translate_with(request, |text| text.to_uppercase())))
    }

    /// Always fails with `error`
    pub fn failing(error: ProviderError) -> Self {
        Self::new(move |_, _| Err(error.clone()))
    }

    /// Plays `replies` in order, repeating the last one when exhausted
    pub fn scripted(replies: Vec<Result<String, ProviderError>>) -> Self {
        Self::new(move |_, call| {
            replies
                .get(call)
                .or_else(|| replies.last())
                .cloned()
                .unwrap_or_else(|| Err(ProviderError::Unparseable("no scripted reply".to_string())))
        })
    }

    /// Reply to a translation request by applying `f` to every cue; any
    /// other request gets `{}`
    pub fn translate_with<F>(request: &CompletionRequest, f: F) -> String
    where
        F: Fn(&str) -> String,
    {
        match serde_json::from_str::<TranslationPayload>(&request.prompt) {
            Ok(payload) => {
                let translations: Vec<serde_json::Value> = payload
                    .cues
                    .iter()
                    .map(|cue| serde_json::json!({ "id": cue.id, "text": f(&cue.text) }))
                    .collect();
                serde_json::json!({ "translations": translations }).to_string()
            }
            Err(_) => "{}".to_string(),
        }
    }

    /// Number of requests received
    pub fn request_count(&self) -> usize {
        self.request_count.load(Ordering::SeqCst)
    }

    /// Copies of all requests received, in order
    pub fn requests(&self) -> Vec<CompletionRequest> {
        self.requests.lock().clone()
    }

    /// Requests whose prompt is a translation payload
    pub fn translation_payloads(&self) -> Vec<TranslationPayload> {
        self.requests
            .lock()
            .iter()
            .filter_map(|r| serde_json::from_str(&r.prompt).ok())
            .collect()
    }
}

#[async_trait]
impl Provider for MockProvider {
    fn name(&self) -> &str {
        "mock"
    }

    async fn complete(&self, request: CompletionRequest) -> Result<Completion, ProviderError> {
        let call = self.request_count.fetch_add(1, Ordering::SeqCst);
        self.requests.lock().push(request.clone());
        if let Some(delay) = &self.delay {
            tokio::time::sleep(delay(&request)).await;
        }
        let text = (self.responder)(&request, call)?;
        Ok(Completion {
            prompt_tokens: Some(request.prompt.len() as u64 / 4),
            completion_tokens: Some(text.len() as u64 / 4),
            text,
        })
    }
}
