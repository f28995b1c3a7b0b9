//! Chunk module - typed regions ("articles") of a credit agreement

use crate::block::Span;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Semantic type of a chunk
///
/// The set is closed: every heading the chunker cannot classify lands in
/// `Unclassified`, which still resolves to a Stage 1 schema.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChunkType {
    /// Cover page and preamble before the first article
    Cover,
    /// Defined terms
    Definitions,
    /// The credit facilities themselves
    Credits,
    /// Representations and warranties
    Representations,
    /// Conditions precedent to credit extensions
    Conditions,
    /// Affirmative covenants
    AffirmativeCovenants,
    /// Negative covenants
    NegativeCovenants,
    /// Guarantee
    Guarantee,
    /// Events of default
    EventsOfDefault,
    /// The administrative agent
    AdministrativeAgent,
    /// Miscellaneous provisions
    Miscellaneous,
    /// No classification rule matched
    Unclassified,
}

impl ChunkType {
    /// Every chunk type, in document order
    pub const ALL: [ChunkType; 12] = [
        ChunkType::Cover,
        ChunkType::Definitions,
        ChunkType::Credits,
        ChunkType::Representations,
        ChunkType::Conditions,
        ChunkType::AffirmativeCovenants,
        ChunkType::NegativeCovenants,
        ChunkType::Guarantee,
        ChunkType::EventsOfDefault,
        ChunkType::AdministrativeAgent,
        ChunkType::Miscellaneous,
        ChunkType::Unclassified,
    ];

    /// Get the chunk type label as a string
    pub fn as_str(&self) -> &'static str {
        match self {
            ChunkType::Cover => "cover",
            ChunkType::Definitions => "definitions",
            ChunkType::Credits => "credits",
            ChunkType::Representations => "representations",
            ChunkType::Conditions => "conditions",
            ChunkType::AffirmativeCovenants => "affirmative_covenants",
            ChunkType::NegativeCovenants => "negative_covenants",
            ChunkType::Guarantee => "guarantee",
            ChunkType::EventsOfDefault => "events_of_default",
            ChunkType::AdministrativeAgent => "administrative_agent",
            ChunkType::Miscellaneous => "miscellaneous",
            ChunkType::Unclassified => "unclassified",
        }
    }

    /// Parse a chunk type from its label
    pub fn parse(s: &str) -> Option<Self> {
        let normalized = s.trim().to_lowercase().replace(['-', ' '], "_");
        Self::ALL
            .iter()
            .copied()
            .find(|ct| ct.as_str() == normalized)
    }
}

impl fmt::Display for ChunkType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for ChunkType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s).ok_or_else(|| format!("Invalid chunk type: {}", s))
    }
}

/// A contiguous, typed region of the normalized document text
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Chunk {
    /// Position of the chunk in the document (0-based)
    pub index: usize,

    /// Semantic type used for schema resolution
    pub chunk_type: ChunkType,

    /// Heading title, or a synthetic title for cover/unclassified chunks
    pub title: String,

    /// Byte range of the chunk within the normalized document text
    pub span: Span,

    /// Text of the span
    pub text: String,

    /// First page covered, when the text carries page markers
    pub start_page: Option<u32>,

    /// Last page covered, when the text carries page markers
    pub end_page: Option<u32>,
}

impl Chunk {
    /// Number of characters in the chunk
    pub fn char_count(&self) -> usize {
        self.text.chars().count()
    }

    /// Whether the chunk holds nothing but whitespace
    pub fn is_blank(&self) -> bool {
        self.text.trim().is_empty()
    }
}
