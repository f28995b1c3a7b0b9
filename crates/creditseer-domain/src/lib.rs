//! CreditSeer Domain Layer
//!
//! Core vocabulary shared by every other crate: documents, typed chunks,
//! Stage 1 blocks, Stage 2 values, anomalies and the pipeline stages.
//! It also defines the trait interfaces for the two external collaborators
//! (text extraction and model inference); their implementations live in
//! other crates.
//!
//! ## Key Concepts
//!
//! - **Chunk**: a contiguous, typed region of the document ("article")
//! - **Block**: a verbatim span of a chunk tagged with a `valueType`
//! - **ExtractedValue**: a structured field grounded in exactly one block
//! - **Anomaly**: a rejected model output, surfaced instead of discarded
//! - **Confidence**: a closed `low / medium / high` taxonomy

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod anomaly;
pub mod block;
pub mod chunk;
pub mod document;
pub mod stage;
pub mod text;
pub mod traits;
pub mod value;

// Re-exports for convenience
pub use anomaly::{Anomaly, AnomalyKind};
pub use block::{Block, BlockRef, Span};
pub use chunk::{Chunk, ChunkType};
pub use document::{Document, DocumentId, ExtractedText, ExtractionMethod};
pub use stage::{ExtractionStage, PipelineStage};
pub use text::{normalize_text, page_marker, PAGE_MARKER_PREFIX};
pub use traits::{
    CompletionRequest, InferenceService, ServiceError, TextExtractionError, TextExtractor,
};
pub use value::{
    Confidence, ConfidenceAssessment, ConfidenceFactor, ExtractedValue, FieldValue, OutputMode,
};
