//! PDF extraction configuration

use serde::{Deserialize, Serialize};

/// Configuration for [`PdfTextExtractor`](crate::PdfTextExtractor)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PdfConfig {
    /// Time allowed to each extractor (primary and fallback separately)
    pub timeout_secs: u64,
}

impl Default for PdfConfig {
    fn default() -> Self {
        Self { timeout_secs: 60 }
    }
}
