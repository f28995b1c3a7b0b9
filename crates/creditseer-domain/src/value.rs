//! Stage 2 values and their confidence metadata

use crate::block::BlockRef;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Confidence class of an extracted value
///
/// A fixed enumeration rather than a numeric score, ordered
/// `Low < Medium < High`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Confidence {
    /// Weak support in the source block
    Low,
    /// Partial support
    Medium,
    /// Strong, verbatim support
    High,
}

impl Confidence {
    /// Get the confidence label as a string
    pub fn as_str(&self) -> &'static str {
        match self {
            Confidence::Low => "low",
            Confidence::Medium => "medium",
            Confidence::High => "high",
        }
    }

    /// Parse a confidence label (case-insensitive)
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "low" => Some(Confidence::Low),
            "medium" => Some(Confidence::Medium),
            "high" => Some(Confidence::High),
            _ => None,
        }
    }

    /// Map an assessment percentage (0-100) to a confidence class
    pub fn from_percentage(percentage: f64) -> Self {
        if percentage >= 75.0 {
            Confidence::High
        } else if percentage >= 50.0 {
            Confidence::Medium
        } else {
            Confidence::Low
        }
    }
}

impl fmt::Display for Confidence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Confidence {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s).ok_or_else(|| format!("Invalid confidence: {}", s))
    }
}

/// How a field's value relates to the block text
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputMode {
    /// Copied verbatim from the block
    #[default]
    Verbatim,
    /// A concise summary restricted to facts in the block
    Summarized,
}

/// Value of an extracted field
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FieldValue {
    /// A single value
    Single(String),
    /// Several values for a `collectMultiple` field, in document order
    Multiple(Vec<String>),
}

impl FieldValue {
    /// All value strings
    pub fn items(&self) -> Vec<&str> {
        match self {
            FieldValue::Single(v) => vec![v.as_str()],
            FieldValue::Multiple(vs) => vs.iter().map(String::as_str).collect(),
        }
    }

    /// Values joined for display
    pub fn joined(&self, separator: &str) -> String {
        self.items().join(separator)
    }
}

impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.joined("; "))
    }
}

/// One factor of a local confidence assessment
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConfidenceFactor {
    /// Factor name (e.g. "Evidence Support")
    pub factor: String,
    /// Human-readable outcome
    pub status: String,
    /// Points awarded (may be negative for penalties)
    pub score: f64,
    /// Maximum points for this factor
    pub max: f64,
}

/// Locally computed confidence for a value, independent of the model's claim
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConfidenceAssessment {
    /// Resulting class
    pub level: Confidence,
    /// Points awarded, floored at zero
    pub score: f64,
    /// Points available
    pub max_score: f64,
    /// `score / max_score` as a percentage
    pub percentage: f64,
    /// Percentage shown to analysts, capped at 95
    pub display_percentage: f64,
    /// Individual factors
    pub factors: Vec<ConfidenceFactor>,
    /// Whether the block holds several candidates of the same format
    pub ambiguous_candidates: bool,
}

/// A structured value extracted by Stage 2
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExtractedValue {
    /// The single block this value is grounded in
    pub block_ref: BlockRef,
    /// Schema block id of the source block
    pub block_id: String,
    /// Value type of the source block
    pub value_type: String,
    /// Structured field name
    pub field: String,
    /// Extracted value
    pub value: FieldValue,
    /// Output mode the field was extracted with
    pub output_mode: OutputMode,
    /// Final confidence: the lower of reported and assessed
    pub confidence: Confidence,
    /// Confidence the inference service reported
    pub reported_confidence: Confidence,
    /// Local assessment backing `confidence`
    pub assessment: ConfidenceAssessment,
}
