//! OpenAI-compatible chat completions provider
//!
//! Works against the hosted OpenAI API and against local servers that expose
//! the same `/v1/chat/completions` route (vLLM, llama.cpp server, LM Studio).

use crate::error::{is_retryable, status_error, transport_error};
use crate::LlmError;
use async_trait::async_trait;
use creditseer_domain::{CompletionRequest, InferenceService, ServiceError};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::time::Duration;
use tracing::{debug, warn};

/// Default API base URL
pub const DEFAULT_ENDPOINT: &str = "https://api.openai.com";

/// Default timeout for a single HTTP request (120 seconds)
pub const DEFAULT_TIMEOUT_SECS: u64 = 120;

/// Chat completions provider
#[derive(Debug, Clone)]
pub struct OpenAiProvider {
    endpoint: String,
    model: String,
    api_key: Option<String>,
    client: reqwest::Client,
    timeout_secs: u64,
    max_retries: u32,
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: [ChatMessage<'a>; 2],
    temperature: f32,
    response_format: serde_json::Value,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatResponseMessage,
}

#[derive(Deserialize)]
struct ChatResponseMessage {
    #[serde(default)]
    content: Option<String>,
}

impl OpenAiProvider {
    /// Create a provider for `model` at `endpoint` (the base URL, without `/v1`)
    pub fn new(endpoint: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into().trim_end_matches('/').to_string(),
            model: model.into(),
            api_key: None,
            client: reqwest::Client::new(),
            timeout_secs: DEFAULT_TIMEOUT_SECS,
            max_retries: 1,
        }
    }

    /// Set the bearer token sent with every request
    pub fn with_api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = Some(api_key.into());
        self
    }

    /// Set the maximum number of attempts per call
    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries.max(1);
        self
    }

    /// Set the HTTP request timeout
    pub fn with_timeout(mut self, timeout_secs: u64) -> Self {
        self.timeout_secs = timeout_secs;
        self
    }

    fn build_body<'a>(&'a self, request: &'a CompletionRequest) -> ChatRequest<'a> {
        ChatRequest {
            model: &self.model,
            messages: [
                ChatMessage {
                    role: "system",
                    content: &request.system,
                },
                ChatMessage {
                    role: "user",
                    content: &request.prompt,
                },
            ],
            temperature: request.temperature,
            response_format: json!({
                "type": "json_schema",
                "json_schema": {
                    "name": "extraction",
                    "schema": request.response_schema,
                }
            }),
        }
    }

    /// Generate a chat completion
    pub async fn generate(&self, request: &CompletionRequest) -> Result<String, LlmError> {
        let url = format!("{}/v1/chat/completions", self.endpoint);
        let body = self.build_body(request);

        let mut attempts = 0;
        loop {
            attempts += 1;
            debug!("Chat completion request to {} (attempt {})", self.model, attempts);

            let err = match self.send(&url, &body).await {
                Ok(text) => return Ok(text),
                Err(e) => e,
            };

            if !is_retryable(&err) || attempts >= self.max_retries {
                return Err(err);
            }

            let delay = Duration::from_secs(2u64.pow(attempts - 1));
            warn!("Chat completion failed ({}), retrying in {:?}", err, delay);
            tokio::time::sleep(delay).await;
        }
    }

    async fn send(&self, url: &str, body: &ChatRequest<'_>) -> Result<String, LlmError> {
        let mut builder = self
            .client
            .post(url)
            .timeout(Duration::from_secs(self.timeout_secs))
            .json(body);
        if let Some(key) = &self.api_key {
            builder = builder.bearer_auth(key);
        }

        let response = builder
            .send()
            .await
            .map_err(|e| transport_error(e, self.timeout_secs))?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(status_error(status, error_text, &self.model));
        }

        let parsed: ChatResponse = response
            .json()
            .await
            .map_err(|e| LlmError::InvalidResponse(format!("Failed to parse response: {}", e)))?;

        parsed
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .ok_or_else(|| LlmError::InvalidResponse("Response has no message content".to_string()))
    }
}

#[async_trait]
impl InferenceService for OpenAiProvider {
    fn model_name(&self) -> &str {
        &self.model
    }

    async fn complete(&self, request: &CompletionRequest) -> Result<String, ServiceError> {
        self.generate(request).await.map_err(ServiceError::from)
    }
}
