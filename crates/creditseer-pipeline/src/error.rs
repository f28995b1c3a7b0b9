//! Error types for the pipeline

use creditseer_domain::{DocumentId, PipelineStage, ServiceError, TextExtractionError};
use creditseer_extractor::ExtractorError;
use creditseer_schema::SchemaError;
use thiserror::Error;

/// Errors that abort a pipeline operation
///
/// None of these leave a partial result behind: the run is exactly as it was
/// before the operation started.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum PipelineError {
    /// A required schema is missing or the configuration is invalid
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// The requested stage's prerequisite has not been produced
    #[error("Cannot run {requested}: document is at {current}")]
    Sequence {
        /// Stage that was requested
        requested: PipelineStage,
        /// State the run is in
        current: PipelineStage,
    },

    /// Text extraction or inference failed; the stage may be retried
    #[error("Service error: {0}")]
    Service(#[from] ServiceError),

    /// The document is empty or unreadable
    #[error("Invalid input: {0}")]
    Input(String),

    /// Another stage is in flight for the same document
    #[error("Document {0} is busy: a stage is already running")]
    Busy(DocumentId),

    /// No run exists for the document
    #[error("Unknown document: {0}")]
    UnknownDocument(DocumentId),

    /// A run lock was poisoned by a panicking thread
    #[error("Pipeline state is poisoned")]
    Poisoned,
}

impl PipelineError {
    /// Whether running the same operation again may succeed
    pub fn is_retryable(&self) -> bool {
        match self {
            PipelineError::Service(e) => e.is_retryable(),
            PipelineError::Busy(_) => true,
            _ => false,
        }
    }
}

impl From<TextExtractionError> for PipelineError {
    fn from(err: TextExtractionError) -> Self {
        match err {
            TextExtractionError::Service(e) => PipelineError::Service(e),
            other => PipelineError::Input(other.to_string()),
        }
    }
}

impl From<ExtractorError> for PipelineError {
    fn from(err: ExtractorError) -> Self {
        match err {
            ExtractorError::Service(e) => PipelineError::Service(e),
            ExtractorError::InvalidFormat(msg) => {
                PipelineError::Service(ServiceError::InvalidResponse(msg))
            }
            other @ (ExtractorError::SchemaMismatch { .. } | ExtractorError::Config(_)) => {
                PipelineError::Configuration(other.to_string())
            }
        }
    }
}

impl From<SchemaError> for PipelineError {
    fn from(err: SchemaError) -> Self {
        PipelineError::Configuration(err.to_string())
    }
}
