//! Documents and their identifiers

use serde::{Deserialize, Serialize};
use std::fmt;

/// Unique identifier for an uploaded document, based on UUIDv7
///
/// UUIDv7 keeps identifiers sortable by upload time, which is the order the
/// CLI lists pipeline runs in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub struct DocumentId(u128);

impl DocumentId {
    /// Generate a new UUIDv7-based DocumentId
    ///
    /// # Examples
    ///
    /// ```
    /// use creditseer_domain::DocumentId;
    ///
    /// let id = DocumentId::new();
    /// assert!(id.value() > 0);
    /// ```
    pub fn new() -> Self {
        Self(uuid::Uuid::now_v7().as_u128())
    }

    /// Create a DocumentId from a raw u128 value
    pub fn from_value(value: u128) -> Self {
        Self(value)
    }

    /// Parse a DocumentId from its UUID string form
    ///
    /// # Examples
    ///
    /// ```
    /// use creditseer_domain::DocumentId;
    ///
    /// let id = DocumentId::new();
    /// let parsed = DocumentId::from_string(&id.to_string()).unwrap();
    /// assert_eq!(id, parsed);
    /// ```
    pub fn from_string(s: &str) -> Result<Self, String> {
        uuid::Uuid::parse_str(s)
            .map(|u| Self(u.as_u128()))
            .map_err(|e| format!("Invalid document id: {}", e))
    }

    /// Get the raw u128 value
    pub fn value(&self) -> u128 {
        self.0
    }
}

impl Default for DocumentId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for DocumentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", uuid::Uuid::from_u128(self.0))
    }
}

impl From<DocumentId> for String {
    fn from(id: DocumentId) -> Self {
        id.to_string()
    }
}

impl TryFrom<String> for DocumentId {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::from_string(&value)
    }
}

/// Which extractor produced the document text
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExtractionMethod {
    /// The primary PDF text extractor succeeded
    Primary,
    /// The primary extractor failed and the secondary one succeeded
    Fallback,
    /// The input was already plain text
    PlainText,
}

impl ExtractionMethod {
    /// Get the method name as a string
    pub fn as_str(&self) -> &'static str {
        match self {
            ExtractionMethod::Primary => "primary",
            ExtractionMethod::Fallback => "fallback",
            ExtractionMethod::PlainText => "plain_text",
        }
    }
}

impl fmt::Display for ExtractionMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Output of a text extraction service call
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExtractedText {
    /// Extracted text, with `--- Page N ---` markers between pages
    pub text: String,
    /// Extractor that succeeded
    pub method: ExtractionMethod,
    /// Number of pages in the source
    pub page_count: usize,
    /// Number of tables detected (0 when the extractor cannot tell)
    pub table_count: usize,
}

/// A document whose text has been extracted
///
/// Owned by its pipeline run; replaced wholesale on re-upload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    /// Document identifier
    pub id: DocumentId,
    /// Original file name as uploaded
    pub filename: String,
    /// Normalized extracted text
    pub text: String,
    /// Extractor that produced the text
    pub method: ExtractionMethod,
    /// Number of pages
    pub page_count: usize,
    /// Number of tables detected
    pub table_count: usize,
}

impl Document {
    /// Character count of the normalized text
    pub fn char_count(&self) -> usize {
        self.text.chars().count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_document_id_round_trip_through_string() {
        let id = DocumentId::new();
        let s: String = id.into();
        assert_eq!(DocumentId::try_from(s).unwrap(), id);
    }

    #[test]
    fn test_document_id_rejects_garbage() {
        assert!(DocumentId::from_string("not-a-uuid").is_err());
    }

    #[test]
    fn test_document_ids_are_ordered_by_creation() {
        let first = DocumentId::new();
        let second = DocumentId::new();
        assert!(first <= second);
    }

    #[test]
    fn test_document_id_serializes_as_uuid_string() {
        let id = DocumentId::from_value(1);
        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(json, "\"00000000-0000-0000-0000-000000000001\"");
    }
}
