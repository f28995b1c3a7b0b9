//! Error types for text extraction

use creditseer_domain::{ServiceError, TextExtractionError};
use thiserror::Error;

/// Errors from a single extraction attempt
#[derive(Error, Debug, Clone, PartialEq)]
pub enum PdfError {
    /// The parser rejected the bytes
    #[error("Failed to load PDF: {0}")]
    Load(String),

    /// The parser did not finish in time
    #[error("PDF extraction timed out after {0} seconds")]
    Timeout(u64),

    /// The parser panicked (usually on malformed fonts)
    #[error("PDF extractor crashed: {0}")]
    Crashed(String),

    /// Parsing succeeded but every page is blank
    #[error("PDF has no extractable text layer")]
    NoTextLayer,

    /// Plain text input is not valid UTF-8
    #[error("Input is not valid UTF-8 text: {0}")]
    InvalidUtf8(String),
}

impl From<PdfError> for TextExtractionError {
    fn from(e: PdfError) -> Self {
        match e {
            PdfError::Timeout(secs) => TextExtractionError::Service(ServiceError::Timeout(secs)),
            PdfError::NoTextLayer => TextExtractionError::NoTextLayer,
            other => TextExtractionError::Unreadable(other.to_string()),
        }
    }
}
