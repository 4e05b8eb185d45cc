//! Mock gateway for deterministic testing
//!
//! Replies are keyed by the content of the request's last user turn, so a
//! batch of distinct items can be given distinct answers, failures and
//! latencies without touching the network.

use crate::LlmError;
use async_trait::async_trait;
use medex_domain::{Completion, CompletionGateway, CompletionRequest, TokenUsage};
use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

/// Scripted answer for one prompt
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MockReply {
    /// Return this text with these counters
    Text(String, TokenUsage),
    /// Fail the call with `LlmError::Other`
    Error(String),
}

type Responder = Arc<dyn Fn(&str) -> MockReply + Send + Sync>;
type Latency = Arc<dyn Fn(&str) -> Duration + Send + Sync>;

/// Mock completion gateway
///
/// Lookup order for each call: an exact reply registered with
/// [`MockGateway::add_response`] or [`MockGateway::add_error`], then the
/// responder closure, then the default text.
///
/// # Examples
///
/// ```
/// use medex_domain::TokenUsage;
/// use medex_llm::MockGateway;
///
/// let mut gateway = MockGateway::new("{}");
/// gateway.add_response("item a", r#"{"name":"a"}"#, TokenUsage::new(10, 5));
/// gateway.add_error("item b", "boom");
/// assert_eq!(gateway.call_count(), 0);
/// ```
#[derive(Clone)]
pub struct MockGateway {
    default_response: String,
    default_usage: TokenUsage,
    responses: Arc<Mutex<HashMap<String, MockReply>>>,
    responder: Option<Responder>,
    latency: Option<Latency>,
    calls: Arc<Mutex<Vec<CompletionRequest>>>,
}

impl MockGateway {
    /// Create a mock returning `response` for every prompt
    pub fn new(response: impl Into<String>) -> Self {
        Self {
            default_response: response.into(),
            default_usage: TokenUsage::default(),
            responses: Arc::new(Mutex::new(HashMap::new())),
            responder: None,
            latency: None,
            calls: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Usage reported alongside the default response
    pub fn with_default_usage(mut self, usage: TokenUsage) -> Self {
        self.default_usage = usage;
        self
    }

    /// Compute replies from the user turn content
    pub fn with_responder<F>(mut self, responder: F) -> Self
    where
        F: Fn(&str) -> MockReply + Send + Sync + 'static,
    {
        self.responder = Some(Arc::new(responder));
        self
    }

    /// Delay every call by an amount derived from the user turn content
    pub fn with_latency<F>(mut self, latency: F) -> Self
    where
        F: Fn(&str) -> Duration + Send + Sync + 'static,
    {
        self.latency = Some(Arc::new(latency));
        self
    }

    /// Add a specific response for a given user turn
    pub fn add_response(
        &mut self,
        prompt: impl Into<String>,
        response: impl Into<String>,
        usage: TokenUsage,
    ) {
        lock(&self.responses).insert(prompt.into(), MockReply::Text(response.into(), usage));
    }

    /// Configure to return an error for a specific user turn
    pub fn add_error(&mut self, prompt: impl Into<String>, message: impl Into<String>) {
        lock(&self.responses).insert(prompt.into(), MockReply::Error(message.into()));
    }

    /// Number of completed or failed calls so far
    pub fn call_count(&self) -> usize {
        lock(&self.calls).len()
    }

    /// Every request received, in arrival order
    pub fn requests(&self) -> Vec<CompletionRequest> {
        lock(&self.calls).clone()
    }

    /// Forget recorded requests
    pub fn reset_calls(&self) {
        lock(&self.calls).clear();
    }

    fn reply_for(&self, prompt: &str) -> MockReply {
        if let Some(reply) = lock(&self.responses).get(prompt) {
            return reply.clone();
        }
        match &self.responder {
            Some(responder) => responder(prompt),
            None => MockReply::Text(self.default_response.clone(), self.default_usage),
        }
    }
}

impl Default for MockGateway {
    fn default() -> Self {
        Self::new(r#"{"name": "mock item"}"#)
    }
}

impl fmt::Debug for MockGateway {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MockGateway")
            .field("default_response", &self.default_response)
            .field("default_usage", &self.default_usage)
            .field("call_count", &self.call_count())
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl CompletionGateway for MockGateway {
    type Error = LlmError;

    async fn complete(&self, request: CompletionRequest) -> Result<Completion, LlmError> {
        let prompt = request.last_user_content().unwrap_or_default().to_string();
        lock(&self.calls).push(request);

        if let Some(latency) = &self.latency {
            tokio::time::sleep(latency(&prompt)).await;
        }

        match self.reply_for(&prompt) {
            MockReply::Text(text, usage) => Ok(Completion { text, usage }),
            MockReply::Error(message) => Err(LlmError::Other(message)),
        }
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
