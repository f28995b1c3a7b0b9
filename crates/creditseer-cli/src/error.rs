//! Error types for the CLI application.

use creditseer_domain::TextExtractionError;
use creditseer_pipeline::PipelineError;
use creditseer_schema::SchemaError;
use thiserror::Error;

/// Result type alias for CLI operations.
pub type Result<T> = std::result::Result<T, CliError>;

/// CLI-specific errors.
#[derive(Debug, Error)]
pub enum CliError {
    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Schema loading error
    #[error(transparent)]
    Schema(#[from] SchemaError),

    /// Pipeline stage error
    #[error(transparent)]
    Pipeline(#[from] PipelineError),

    /// Text extraction error
    #[error("Text extraction failed: {0}")]
    TextExtraction(#[from] TextExtractionError),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// TOML parsing error
    #[error("TOML parsing error: {0}")]
    Toml(#[from] toml::de::Error),

    /// Invalid input
    #[error("Invalid input: {0}")]
    InvalidInput(String),
}
