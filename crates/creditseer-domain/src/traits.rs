//! Trait definitions for external collaborators
//!
//! These traits define the boundaries between the pipeline and the services
//! it delegates to. Implementations live in other crates (creditseer-llm,
//! creditseer-pdf).

use crate::document::ExtractedText;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors reported by an external service
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ServiceError {
    /// Network or API communication error
    #[error("Service unavailable: {0}")]
    Unavailable(String),

    /// The call did not finish within its deadline
    #[error("Service call timed out after {0} seconds")]
    Timeout(u64),

    /// Rate limit exceeded
    #[error("Rate limit exceeded")]
    RateLimited,

    /// Model not available on the service
    #[error("Model not available: {0}")]
    ModelNotAvailable(String),

    /// The service answered but the payload was unusable
    #[error("Invalid response: {0}")]
    InvalidResponse(String),
}

impl ServiceError {
    /// Whether retrying the same call may succeed
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            ServiceError::Unavailable(_) | ServiceError::Timeout(_) | ServiceError::RateLimited
        )
    }
}

/// A structured-completion request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompletionRequest {
    /// System instruction
    pub system: String,
    /// User prompt carrying the document text and schema
    pub prompt: String,
    /// JSON schema the response must conform to
    pub response_schema: serde_json::Value,
    /// Sampling temperature
    pub temperature: f32,
}

/// Trait for the model inference service
///
/// Implemented by the infrastructure layer (creditseer-llm). Responses are
/// untrusted: callers verify them against the source text before use.
#[async_trait]
pub trait InferenceService: Send + Sync {
    /// Name of the model behind the service, for run metadata
    fn model_name(&self) -> &str;

    /// Produce a completion whose body should conform to `request.response_schema`
    async fn complete(&self, request: &CompletionRequest) -> Result<String, ServiceError>;
}

/// Errors from the text extraction service
#[derive(Error, Debug, Clone, PartialEq)]
pub enum TextExtractionError {
    /// No extractor could parse the document
    #[error("Document is unreadable: {0}")]
    Unreadable(String),

    /// The document parsed but has no extractable text layer
    #[error("Document has no extractable text layer")]
    NoTextLayer,

    /// The extraction service itself failed
    #[error(transparent)]
    Service(#[from] ServiceError),
}

/// Trait for the PDF text extraction service
///
/// Implemented by the infrastructure layer (creditseer-pdf).
#[async_trait]
pub trait TextExtractor: Send + Sync {
    /// Extract text from raw document bytes, reporting which extractor succeeded
    async fn extract_text(&self, bytes: &[u8]) -> Result<ExtractedText, TextExtractionError>;
}
