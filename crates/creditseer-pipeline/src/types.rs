//! Stage outputs and reports

use creditseer_domain::{Anomaly, Block, ChunkType, DocumentId, ExtractedValue, PipelineStage};
use creditseer_extractor::MissingField;
use serde::{Deserialize, Serialize};

/// Stage 1 result for one chunk
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChunkBlocks {
    /// Index of the chunk
    pub chunk_index: usize,
    /// Type of the chunk
    pub chunk_type: ChunkType,
    /// Stage 1 schema applied
    pub schema_id: String,
    /// Accepted blocks
    pub blocks: Vec<Block>,
    /// Block ids reported absent
    pub not_found: Vec<String>,
}

/// Committed Stage 1 output of a document
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Stage1Output {
    /// One entry per chunk, in chunk order
    pub chunks: Vec<ChunkBlocks>,
    /// Every anomaly raised during the stage
    pub anomalies: Vec<Anomaly>,
}

impl Stage1Output {
    /// Every accepted block, in document order
    pub fn blocks(&self) -> impl Iterator<Item = &Block> {
        self.chunks.iter().flat_map(|c| c.blocks.iter())
    }

    /// Number of accepted blocks
    pub fn block_count(&self) -> usize {
        self.chunks.iter().map(|c| c.blocks.len()).sum()
    }
}

/// Stage 2 result for one chunk
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChunkValues {
    /// Index of the chunk
    pub chunk_index: usize,
    /// Type of the chunk
    pub chunk_type: ChunkType,
    /// Stage 2 schema applied; `None` when the chunk type has none
    pub schema_id: Option<String>,
    /// Accepted values
    pub values: Vec<ExtractedValue>,
    /// Fields left without a value
    pub missing: Vec<MissingField>,
}

impl ChunkValues {
    /// Whether Stage 2 was skipped for this chunk
    pub fn skipped(&self) -> bool {
        self.schema_id.is_none()
    }
}

/// Committed Stage 2 output of a document
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Stage2Output {
    /// One entry per chunk, in chunk order
    pub chunks: Vec<ChunkValues>,
    /// Every anomaly raised during the stage
    pub anomalies: Vec<Anomaly>,
}

impl Stage2Output {
    /// Every accepted value, in document order
    pub fn values(&self) -> impl Iterator<Item = &ExtractedValue> {
        self.chunks.iter().flat_map(|c| c.values.iter())
    }

    /// Number of accepted values
    pub fn value_count(&self) -> usize {
        self.chunks.iter().map(|c| c.values.len()).sum()
    }
}

/// What a pipeline operation returns: the committed output and its anomalies
#[derive(Debug, Clone, Serialize)]
pub struct StageReport<T> {
    /// Document the stage ran on
    pub document_id: DocumentId,
    /// State reached by the run
    pub stage: PipelineStage,
    /// Output committed to the run
    pub output: T,
    /// Anomalies collected during the stage
    pub anomalies: Vec<Anomaly>,
    /// Model behind the inference service, for the model-driven stages
    pub model_name: Option<String>,
    /// Unix timestamp (seconds) of the commit
    pub timestamp: u64,
    /// Wall time of the stage in milliseconds
    pub processing_time_ms: u64,
}
