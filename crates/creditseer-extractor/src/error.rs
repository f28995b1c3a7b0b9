//! Error types for the extractors

use creditseer_domain::{ChunkType, ServiceError};
use thiserror::Error;

/// Errors that abort a stage for a chunk
///
/// Rejected model output is never an error: it is collected as an
/// [`Anomaly`](creditseer_domain::Anomaly) next to the accepted results.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ExtractorError {
    /// Inference failed after every retry
    #[error("Inference error: {0}")]
    Service(#[from] ServiceError),

    /// The schema passed in does not belong to the chunk
    #[error("Schema mismatch: chunk is {chunk}, schema is for {schema}")]
    SchemaMismatch {
        /// Chunk type of the chunk
        chunk: ChunkType,
        /// Chunk type the schema declares
        schema: ChunkType,
    },

    /// Model output could not be parsed
    ///
    /// The extractors turn this into a `MalformedResponse` anomaly; it only
    /// escapes from the parser functions.
    #[error("Invalid response format: {0}")]
    InvalidFormat(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),
}
