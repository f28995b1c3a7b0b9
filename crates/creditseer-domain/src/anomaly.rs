//! Anomalies: model outputs rejected by local verification

use crate::block::BlockRef;
use crate::stage::ExtractionStage;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Why an extraction result was rejected
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnomalyKind {
    /// Stage 1 block text is not a span of the chunk
    UngroundedBlock,
    /// Stage 1 block carries a valueType the schema does not declare
    UnknownValueType,
    /// Stage 2 value cannot be traced to a block's text
    UngroundedValue,
    /// Stage 2 value is grounded in more than one candidate block
    AmbiguousGrounding,
    /// Stage 2 value names a field not defined for the block's value type
    UnknownField,
    /// Stage 2 confidence is outside the schema's taxonomy
    InvalidConfidence,
    /// The inference response could not be parsed at all
    MalformedResponse,
}

impl AnomalyKind {
    /// Get the kind as a string
    pub fn as_str(&self) -> &'static str {
        match self {
            AnomalyKind::UngroundedBlock => "ungrounded_block",
            AnomalyKind::UnknownValueType => "unknown_value_type",
            AnomalyKind::UngroundedValue => "ungrounded_value",
            AnomalyKind::AmbiguousGrounding => "ambiguous_grounding",
            AnomalyKind::UnknownField => "unknown_field",
            AnomalyKind::InvalidConfidence => "invalid_confidence",
            AnomalyKind::MalformedResponse => "malformed_response",
        }
    }
}

impl fmt::Display for AnomalyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A rejected extraction result, kept for analyst review
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Anomaly {
    /// Stage that rejected the result
    pub stage: ExtractionStage,
    /// Chunk the result belonged to
    pub chunk_index: usize,
    /// Block the result referred to, when one could be identified
    pub block_ref: Option<BlockRef>,
    /// Rejection reason
    pub kind: AnomalyKind,
    /// Details for the analyst
    pub detail: String,
    /// The offending text as returned by the model
    pub raw_text: String,
}

impl Anomaly {
    /// Create a new anomaly without a block reference
    pub fn new(
        stage: ExtractionStage,
        chunk_index: usize,
        kind: AnomalyKind,
        detail: impl Into<String>,
        raw_text: impl Into<String>,
    ) -> Self {
        Self {
            stage,
            chunk_index,
            block_ref: None,
            kind,
            detail: detail.into(),
            raw_text: raw_text.into(),
        }
    }

    /// Attach the block the result referred to
    pub fn with_block(mut self, block_ref: BlockRef) -> Self {
        self.block_ref = Some(block_ref);
        self
    }
}
