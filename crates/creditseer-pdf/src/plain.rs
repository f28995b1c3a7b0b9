//! Plain text input and format sniffing

use crate::error::PdfError;
use crate::extractor::PdfTextExtractor;
use async_trait::async_trait;
use creditseer_domain::{
    normalize_text, ExtractedText, ExtractionMethod, TextExtractionError, TextExtractor,
};

/// Reads already-extracted UTF-8 text
#[derive(Debug, Clone, Copy, Default)]
pub struct PlainTextExtractor;

impl PlainTextExtractor {
    /// Decode and normalize `bytes`
    pub fn extract(&self, bytes: &[u8]) -> Result<ExtractedText, PdfError> {
        let text = std::str::from_utf8(bytes).map_err(|e| PdfError::InvalidUtf8(e.to_string()))?;
        let text = normalize_text(text.strip_prefix('\u{feff}').unwrap_or(text));
        if text.trim().is_empty() {
            return Err(PdfError::NoTextLayer);
        }
        let page_count = text
            .lines()
            .filter(|l| l.trim_start().starts_with(creditseer_domain::PAGE_MARKER_PREFIX))
            .count();
        Ok(ExtractedText {
            text,
            method: ExtractionMethod::PlainText,
            page_count,
            table_count: 0,
        })
    }
}

#[async_trait]
impl TextExtractor for PlainTextExtractor {
    async fn extract_text(&self, bytes: &[u8]) -> Result<ExtractedText, TextExtractionError> {
        self.extract(bytes).map_err(TextExtractionError::from)
    }
}

/// Routes PDF bytes to [`PdfTextExtractor`] and everything else to
/// [`PlainTextExtractor`]
#[derive(Debug, Clone, Default)]
pub struct DocumentTextExtractor {
    pdf: PdfTextExtractor,
}

impl DocumentTextExtractor {
    /// Create a router around a configured PDF extractor
    pub fn new(pdf: PdfTextExtractor) -> Self {
        Self { pdf }
    }

    /// Whether `bytes` look like a PDF file
    pub fn is_pdf(bytes: &[u8]) -> bool {
        let head = &bytes[..bytes.len().min(1024)];
        head.windows(5).any(|w| w == b"%PDF-")
    }
}

#[async_trait]
impl TextExtractor for DocumentTextExtractor {
    async fn extract_text(&self, bytes: &[u8]) -> Result<ExtractedText, TextExtractionError> {
        if Self::is_pdf(bytes) {
            self.pdf.extract_text(bytes).await
        } else {
            PlainTextExtractor.extract_text(bytes).await
        }
    }
}
