//! Pipeline stages

use serde::{Deserialize, Serialize};
use std::fmt;

/// Extraction stage a schema applies to
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(into = "u8", try_from = "u8")]
pub enum ExtractionStage {
    /// Verbatim block isolation
    Stage1,
    /// Structured value extraction
    Stage2,
}

impl ExtractionStage {
    /// Stage number
    pub fn number(&self) -> u8 {
        match self {
            ExtractionStage::Stage1 => 1,
            ExtractionStage::Stage2 => 2,
        }
    }

    /// Parse from a stage number
    pub fn from_number(n: u64) -> Option<Self> {
        match n {
            1 => Some(ExtractionStage::Stage1),
            2 => Some(ExtractionStage::Stage2),
            _ => None,
        }
    }
}

impl From<ExtractionStage> for u8 {
    fn from(stage: ExtractionStage) -> Self {
        stage.number()
    }
}

impl TryFrom<u8> for ExtractionStage {
    type Error = String;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        Self::from_number(u64::from(value)).ok_or_else(|| format!("Invalid stage: {}", value))
    }
}

impl fmt::Display for ExtractionStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "stage{}", self.number())
    }
}

/// State of a document's pipeline run
///
/// Runs only move forward one step at a time; re-running a step drops every
/// later one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PipelineStage {
    /// Source bytes received
    Uploaded,
    /// Text extracted and normalized
    TextExtracted,
    /// Text split into typed chunks
    Chunked,
    /// Stage 1 blocks committed
    Stage1Complete,
    /// Stage 2 values committed
    Stage2Complete,
}

impl PipelineStage {
    /// Every state, in order
    pub const ALL: [PipelineStage; 5] = [
        PipelineStage::Uploaded,
        PipelineStage::TextExtracted,
        PipelineStage::Chunked,
        PipelineStage::Stage1Complete,
        PipelineStage::Stage2Complete,
    ];

    /// Get the state name as a string
    pub fn as_str(&self) -> &'static str {
        match self {
            PipelineStage::Uploaded => "uploaded",
            PipelineStage::TextExtracted => "text_extracted",
            PipelineStage::Chunked => "chunked",
            PipelineStage::Stage1Complete => "stage1_complete",
            PipelineStage::Stage2Complete => "stage2_complete",
        }
    }

    /// The state that must already be reached before this one can be produced
    pub fn prerequisite(&self) -> Option<Self> {
        match self {
            PipelineStage::Uploaded => None,
            PipelineStage::TextExtracted => Some(PipelineStage::Uploaded),
            PipelineStage::Chunked => Some(PipelineStage::TextExtracted),
            PipelineStage::Stage1Complete => Some(PipelineStage::Chunked),
            PipelineStage::Stage2Complete => Some(PipelineStage::Stage1Complete),
        }
    }

    /// The next state in the pipeline
    pub fn next(&self) -> Option<Self> {
        match self {
            PipelineStage::Uploaded => Some(PipelineStage::TextExtracted),
            PipelineStage::TextExtracted => Some(PipelineStage::Chunked),
            PipelineStage::Chunked => Some(PipelineStage::Stage1Complete),
            PipelineStage::Stage1Complete => Some(PipelineStage::Stage2Complete),
            PipelineStage::Stage2Complete => None,
        }
    }
}

impl fmt::Display for PipelineStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pipeline_stage_progression() {
        assert_eq!(PipelineStage::Uploaded.next(), Some(PipelineStage::TextExtracted));
        assert_eq!(PipelineStage::Stage1Complete.next(), Some(PipelineStage::Stage2Complete));
        assert_eq!(PipelineStage::Stage2Complete.next(), None);
    }

    #[test]
    fn test_prerequisite_is_inverse_of_next() {
        for stage in PipelineStage::ALL {
            if let Some(next) = stage.next() {
                assert_eq!(next.prerequisite(), Some(stage));
            }
        }
        assert_eq!(PipelineStage::Uploaded.prerequisite(), None);
    }

    #[test]
    fn test_extraction_stage_serializes_as_number() {
        assert_eq!(serde_json::to_string(&ExtractionStage::Stage2).unwrap(), "2");
        let parsed: ExtractionStage = serde_json::from_str("1").unwrap();
        assert_eq!(parsed, ExtractionStage::Stage1);
        assert!(serde_json::from_str::<ExtractionStage>("3").is_err());
        assert_eq!(ExtractionStage::from_number(1), Some(ExtractionStage::Stage1));
        assert_eq!(ExtractionStage::from_number(3), None);
    }
}
