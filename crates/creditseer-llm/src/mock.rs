//! Deterministic inference provider for tests and offline runs

use async_trait::async_trait;
use creditseer_domain::{CompletionRequest, InferenceService, ServiceError};
use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

#[derive(Debug, Clone)]
enum Reply {
    Text(String),
    Error(ServiceError),
}

impl Reply {
    fn into_result(self) -> Result<String, ServiceError> {
        match self {
            Reply::Text(text) => Ok(text),
            Reply::Error(e) => Err(e),
        }
    }
}

#[derive(Debug, Default)]
struct MockState {
    queue: VecDeque<Reply>,
    keyed: Vec<(String, Reply)>,
    requests: Vec<CompletionRequest>,
}

/// Mock inference provider for deterministic testing
///
/// This provider returns pre-configured responses without making any network
/// calls. A reply is chosen in this order:
///
/// 1. the next queued reply, if any ([`push_response`](Self::push_response),
///    [`push_error`](Self::push_error));
/// 2. the first keyed reply whose key occurs in the prompt
///    ([`add_response`](Self::add_response), [`add_error`](Self::add_error));
/// 3. the default response.
///
/// Clones share state, so a clone handed to the pipeline can be inspected
/// from the test.
///
/// # Examples
///
/// ```
/// use creditseer_domain::{CompletionRequest, InferenceService};
/// use creditseer_llm::MockProvider;
///
/// # #[tokio::main]
/// # async fn main() {
/// let provider = MockProvider::default();
/// provider.add_response("ARTICLE VII", r#"{"blocks": []}"#);
///
/// let request = CompletionRequest {
///     system: String::new(),
///     prompt: "Chunk: ARTICLE VII NEGATIVE COVENANTS".into(),
///     response_schema: serde_json::json!({}),
///     temperature: 0.0,
/// };
/// assert_eq!(provider.complete(&request).await.unwrap(), r#"{"blocks": []}"#);
/// assert_eq!(provider.call_count(), 1);
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct MockProvider {
    default_response: String,
    delay: Option<Duration>,
    state: Arc<Mutex<MockState>>,
}

impl MockProvider {
    /// Create a new MockProvider with a fixed response for all prompts
    pub fn new(response: impl Into<String>) -> Self {
        Self {
            default_response: response.into(),
            delay: None,
            state: Arc::new(Mutex::new(MockState::default())),
        }
    }

    /// Sleep for `delay` before answering each call
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Respond with `response` whenever the prompt contains `key`
    pub fn add_response(&self, key: impl Into<String>, response: impl Into<String>) {
        self.lock()
            .keyed
            .push((key.into(), Reply::Text(response.into())));
    }

    /// Fail with `ServiceError::Unavailable` whenever the prompt contains `key`
    pub fn add_error(&self, key: impl Into<String>) {
        self.lock().keyed.push((
            key.into(),
            Reply::Error(ServiceError::Unavailable("Mock error".to_string())),
        ));
    }

    /// Queue a response for the next unanswered call
    pub fn push_response(&self, response: impl Into<String>) {
        self.lock().queue.push_back(Reply::Text(response.into()));
    }

    /// Queue an error for the next unanswered call
    pub fn push_error(&self, error: ServiceError) {
        self.lock().queue.push_back(Reply::Error(error));
    }

    /// Get the number of times complete was called
    pub fn call_count(&self) -> usize {
        self.lock().requests.len()
    }

    /// Every request received so far, in call order
    pub fn requests(&self) -> Vec<CompletionRequest> {
        self.lock().requests.clone()
    }

    /// Reset the call count and recorded requests
    pub fn reset_call_count(&self) {
        self.lock().requests.clear();
    }

    fn lock(&self) -> MutexGuard<'_, MockState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn reply_for(&self, request: &CompletionRequest) -> Reply {
        let mut state = self.lock();
        state.requests.push(request.clone());

        if let Some(reply) = state.queue.pop_front() {
            return reply;
        }
        state
            .keyed
            .iter()
            .find(|(key, _)| request.prompt.contains(key.as_str()))
            .map(|(_, reply)| reply.clone())
            .unwrap_or_else(|| Reply::Text(self.default_response.clone()))
    }
}

impl Default for MockProvider {
    fn default() -> Self {
        Self::new("Default mock response")
    }
}

#[async_trait]
impl InferenceService for MockProvider {
    fn model_name(&self) -> &str {
        "mock"
    }

    async fn complete(&self, request: &CompletionRequest) -> Result<String, ServiceError> {
        let reply = self.reply_for(request);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        reply.into_result()
    }
}
