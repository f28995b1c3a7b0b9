//! Ollama Provider Implementation
//!
//! Provides integration with Ollama's local inference API, so agreements never
//! leave the analyst's machine.
//!
//! # Features
//!
//! - Async HTTP communication with the Ollama `/api/generate` endpoint
//! - Structured output: the response schema is passed as Ollama's `format`
//! - Configurable endpoint, model and request timeout
//! - Retry logic with exponential backoff
//!
//! # Examples
//!
//! ```no_run
//! use creditseer_llm::OllamaProvider;
//!
//! let provider = OllamaProvider::new("http://localhost:11434", "llama3.1");
//! ```

use crate::error::{is_retryable, status_error, transport_error};
use crate::LlmError;
use async_trait::async_trait;
use creditseer_domain::{CompletionRequest, InferenceService, ServiceError};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, warn};

/// Default Ollama API endpoint
pub const DEFAULT_ENDPOINT: &str = "http://localhost:11434";

/// Default timeout for a single HTTP request (120 seconds)
pub const DEFAULT_TIMEOUT_SECS: u64 = 120;

/// Default number of attempts per call
///
/// The extractor retries failed calls itself, so one attempt here is enough.
pub const DEFAULT_MAX_RETRIES: u32 = 1;

/// Ollama API provider for local inference
#[derive(Debug, Clone)]
pub struct OllamaProvider {
    endpoint: String,
    model: String,
    client: reqwest::Client,
    timeout_secs: u64,
    max_retries: u32,
}

/// Request body for Ollama generate API
#[derive(Serialize)]
struct OllamaGenerateRequest<'a> {
    model: &'a str,
    system: &'a str,
    prompt: &'a str,
    stream: bool,
    format: &'a serde_json::Value,
    options: OllamaOptions,
}

#[derive(Serialize)]
struct OllamaOptions {
    temperature: f32,
}

/// Response from Ollama generate API
#[derive(Deserialize)]
struct OllamaGenerateResponse {
    response: String,
}

impl OllamaProvider {
    /// Create a new Ollama provider
    ///
    /// # Parameters
    ///
    /// - `endpoint`: Ollama API endpoint (e.g., "http://localhost:11434")
    /// - `model`: Model to use (e.g., "llama3.1", "qwen2.5")
    pub fn new(endpoint: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into().trim_end_matches('/').to_string(),
            model: model.into(),
            client: reqwest::Client::new(),
            timeout_secs: DEFAULT_TIMEOUT_SECS,
            max_retries: DEFAULT_MAX_RETRIES,
        }
    }

    /// Create a new Ollama provider at `http://localhost:11434`
    pub fn default_endpoint(model: impl Into<String>) -> Self {
        Self::new(DEFAULT_ENDPOINT, model)
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

    /// Generate a completion using the Ollama API
    ///
    /// # Errors
    ///
    /// Returns error if:
    /// - Ollama is not running
    /// - Model is not available
    /// - Network communication fails
    /// - Response format is invalid
    pub async fn generate(&self, request: &CompletionRequest) -> Result<String, LlmError> {
        let url = format!("{}/api/generate", self.endpoint);

        let request_body = OllamaGenerateRequest {
            model: &self.model,
            system: &request.system,
            prompt: &request.prompt,
            stream: false,
            format: &request.response_schema,
            options: OllamaOptions {
                temperature: request.temperature,
            },
        };

        let mut attempts = 0;
        loop {
            attempts += 1;
            debug!("Ollama request to {} (attempt {})", self.model, attempts);

            let err = match self.send(&url, &request_body).await {
                Ok(text) => return Ok(text),
                Err(e) => e,
            };

            if !is_retryable(&err) || attempts >= self.max_retries {
                return Err(err);
            }

            // Exponential backoff: 1s, 2s, 4s, etc.
            let delay = Duration::from_secs(2u64.pow(attempts - 1));
            warn!("Ollama request failed ({}), retrying in {:?}", err, delay);
            tokio::time::sleep(delay).await;
        }
    }

    async fn send(
        &self,
        url: &str,
        body: &OllamaGenerateRequest<'_>,
    ) -> Result<String, LlmError> {
        let response = self
            .client
            .post(url)
            .timeout(Duration::from_secs(self.timeout_secs))
            .json(body)
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

        response
            .json::<OllamaGenerateResponse>()
            .await
            .map(|r| r.response)
            .map_err(|e| LlmError::InvalidResponse(format!("Failed to parse response: {}", e)))
    }
}

#[async_trait]
impl InferenceService for OllamaProvider {
    fn model_name(&self) -> &str {
        &self.model
    }

    async fn complete(&self, request: &CompletionRequest) -> Result<String, ServiceError> {
        self.generate(request).await.map_err(ServiceError::from)
    }
}
