//! Error types for schema loading and resolution

use creditseer_domain::{ChunkType, ExtractionStage};
use std::path::PathBuf;
use thiserror::Error;

/// Errors that can occur while loading or resolving schemas
#[derive(Error, Debug)]
pub enum SchemaError {
    /// A schema file or directory could not be read
    #[error("Failed to read {path}: {source}")]
    Io {
        /// Offending path
        path: PathBuf,
        /// Underlying error
        #[source]
        source: std::io::Error,
    },

    /// A schema document is not valid JSON or does not match the schema format
    #[error("Malformed schema {origin}: {message}")]
    Parse {
        /// File name or position of the document
        origin: String,
        /// Parser message
        message: String,
    },

    /// A schema document parsed but violates a structural rule
    #[error("Invalid schema {schema_id}: {reason}")]
    Invalid {
        /// Schema identifier
        schema_id: String,
        /// What is wrong with it
        reason: String,
    },

    /// Two documents claim the same `(chunk_type, stage)` key
    #[error("Duplicate schema for {chunk_type} {stage}: {first} and {second}")]
    Duplicate {
        /// Chunk type of both documents
        chunk_type: ChunkType,
        /// Stage of both documents
        stage: ExtractionStage,
        /// Schema id registered first
        first: String,
        /// Schema id rejected
        second: String,
    },

    /// No Stage 1 schema exists for a chunk type
    #[error("Configuration error: no stage 1 schema for chunk type '{0}'")]
    MissingStage1(ChunkType),

    /// The registry does not cover every chunk type
    #[error("Configuration error: no stage 1 schema for chunk types: {}", join_types(.0))]
    Incomplete(Vec<ChunkType>),
}

impl SchemaError {
    /// Whether this error means the registry itself is misconfigured
    pub fn is_configuration(&self) -> bool {
        matches!(self, SchemaError::MissingStage1(_) | SchemaError::Incomplete(_))
    }
}

fn join_types(types: &[ChunkType]) -> String {
    types
        .iter()
        .map(ChunkType::as_str)
        .collect::<Vec<_>>()
        .join(", ")
}
