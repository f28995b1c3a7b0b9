//! PDF text extraction with a primary and a fallback parser

use crate::config::PdfConfig;
use crate::error::PdfError;
use async_trait::async_trait;
use creditseer_domain::{
    normalize_text, page_marker, ExtractedText, ExtractionMethod, TextExtractionError,
    TextExtractor,
};
use regex::Regex;
use std::sync::{Arc, LazyLock};
use std::time::Duration;
use tracing::{debug, info, warn};

/// Two or more spaces, or a tab, between cells of a laid-out row
static CELL_GAP: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\t+| {2,}").expect("valid cell gap regex"));

/// Fewest consecutive column rows counted as a table
const MIN_TABLE_ROWS: usize = 3;

/// Extracts the text layer of a PDF
///
/// pdf-extract runs first; if it fails, crashes, times out or finds no text,
/// lopdf is tried. Each runs on a blocking thread under
/// [`PdfConfig::timeout_secs`].
#[derive(Debug, Clone, Default)]
pub struct PdfTextExtractor {
    config: PdfConfig,
}

impl PdfTextExtractor {
    /// Create an extractor with the given configuration
    pub fn new(config: PdfConfig) -> Self {
        Self { config }
    }

    /// Extract text, reporting which parser produced it
    pub async fn extract(&self, bytes: &[u8]) -> Result<ExtractedText, PdfError> {
        let data: Arc<[u8]> = Arc::from(bytes);
        let mut primary_blank = false;

        match self.run_blocking(Arc::clone(&data), primary_pages).await {
            Ok(pages) if has_text(&pages) => {
                info!("Extracted {} pages with pdf-extract", pages.len());
                return Ok(assemble(&pages, ExtractionMethod::Primary));
            }
            Ok(_) => {
                debug!("pdf-extract found no text, trying lopdf");
                primary_blank = true;
            }
            Err(e) => warn!("pdf-extract failed: {}, trying fallback", e),
        }

        match self.run_blocking(data, fallback_pages).await {
            Ok(pages) if has_text(&pages) => {
                info!("Extracted {} pages with lopdf fallback", pages.len());
                Ok(assemble(&pages, ExtractionMethod::Fallback))
            }
            Ok(_) => Err(PdfError::NoTextLayer),
            Err(_) if primary_blank => Err(PdfError::NoTextLayer),
            Err(e) => Err(e),
        }
    }

    async fn run_blocking(
        &self,
        data: Arc<[u8]>,
        f: fn(&[u8]) -> Result<Vec<String>, PdfError>,
    ) -> Result<Vec<String>, PdfError> {
        let secs = self.config.timeout_secs;
        let task = tokio::task::spawn_blocking(move || f(&data));
        match tokio::time::timeout(Duration::from_secs(secs), task).await {
            Ok(Ok(result)) => result,
            Ok(Err(join_err)) => Err(PdfError::Crashed(join_err.to_string())),
            Err(_) => Err(PdfError::Timeout(secs)),
        }
    }
}

#[async_trait]
impl TextExtractor for PdfTextExtractor {
    async fn extract_text(&self, bytes: &[u8]) -> Result<ExtractedText, TextExtractionError> {
        self.extract(bytes).await.map_err(TextExtractionError::from)
    }
}

fn primary_pages(data: &[u8]) -> Result<Vec<String>, PdfError> {
    pdf_extract::extract_text_from_mem_by_pages(data).map_err(|e| PdfError::Load(e.to_string()))
}

fn fallback_pages(data: &[u8]) -> Result<Vec<String>, PdfError> {
    let doc = lopdf::Document::load_mem(data).map_err(|e| PdfError::Load(e.to_string()))?;

    let mut pages = Vec::new();
    for page_num in doc.get_pages().keys() {
        match doc.extract_text(&[*page_num]) {
            Ok(text) => pages.push(text),
            Err(e) => {
                debug!("Could not get text for page {}: {}", page_num, e);
                pages.push(String::new());
            }
        }
    }
    Ok(pages)
}

fn has_text(pages: &[String]) -> bool {
    pages.iter().any(|p| !p.trim().is_empty())
}

/// Join pages behind `--- Page N ---` markers and normalize
fn assemble(pages: &[String], method: ExtractionMethod) -> ExtractedText {
    let mut text = String::new();
    let mut table_count = 0;
    for (i, page) in pages.iter().enumerate() {
        if i > 0 {
            text.push('\n');
        }
        let (page_text, tables) = tabulate(&cleanup_glyphs(page));
        table_count += tables;
        text.push_str(&page_marker(i as u32 + 1));
        text.push('\n');
        text.push_str(page_text.trim_end());
        text.push('\n');
    }

    ExtractedText {
        text: normalize_text(&text),
        method,
        page_count: pages.len(),
        table_count,
    }
}

/// Cells of a line laid out in columns, or `None` for running text
fn cells(line: &str) -> Option<Vec<&str>> {
    let cells: Vec<&str> = CELL_GAP
        .split(line.trim())
        .filter(|cell| !cell.is_empty())
        .collect();
    (cells.len() >= 2).then_some(cells)
}

/// Rewrite column-aligned runs of lines as tab-separated rows
///
/// A run of at least [`MIN_TABLE_ROWS`] consecutive column lines counts as
/// one table. Returns the page text and the number of tables found.
fn tabulate(page: &str) -> (String, usize) {
    let lines: Vec<&str> = page.lines().collect();
    let mut out: Vec<String> = Vec::with_capacity(lines.len());
    let mut tables = 0;
    let mut i = 0;
    while i < lines.len() {
        let run: Vec<Vec<&str>> = lines[i..].iter().map_while(|line| cells(line)).collect();
        if run.len() >= MIN_TABLE_ROWS {
            tables += 1;
            out.extend(run.iter().map(|row| row.join("\t")));
            i += run.len();
        } else {
            out.push(lines[i].to_string());
            i += 1;
        }
    }
    if tables > 0 {
        debug!("Detected {} table(s) on page", tables);
    }
    (out.join("\n"), tables)
}

/// Replace ligatures and layout-only characters some fonts emit
fn cleanup_glyphs(text: &str) -> String {
    text.replace('\u{FB00}', "ff")
        .replace('\u{FB01}', "fi")
        .replace('\u{FB02}', "fl")
        .replace('\u{FB03}', "ffi")
        .replace('\u{FB04}', "ffl")
        .replace('\u{00A0}', " ")
        .replace('\u{00AD}', "")
}

#[cfg(test)]
mod tests {
    use super::*;
    use lopdf::content::{Content, Operation};
    use lopdf::{dictionary, Document, Object, Stream};

    /// Build a PDF with one page per entry; an empty entry is a blank page
    fn build_pdf(pages: &[&str]) -> Vec<u8> {
        let mut doc = Document::with_version("1.5");
        let pages_id = doc.new_object_id();
        let font_id = doc.add_object(dictionary! {
            "Type" => "Font",
            "Subtype" => "Type1",
            "BaseFont" => "Courier",
        });
        let resources_id = doc.add_object(dictionary! {
            "Font" => dictionary! { "F1" => font_id },
        });

        let mut kids = Vec::new();
        for text in pages {
            let operations = if text.is_empty() {
                vec![]
            } else {
                vec![
                    Operation::new("BT", vec![]),
                    Operation::new("Tf", vec!["F1".into(), 12.into()]),
                    Operation::new("Td", vec![72.into(), 700.into()]),
                    Operation::new("Tj", vec![Object::string_literal(*text)]),
                    Operation::new("ET", vec![]),
                ]
            };
            let content = Content { operations };
            let content_id =
                doc.add_object(Stream::new(dictionary! {}, content.encode().unwrap()));
            let page_id = doc.add_object(dictionary! {
                "Type" => "Page",
                "Parent" => pages_id,
                "Contents" => content_id,
            });
            kids.push(page_id.into());
        }

        let count = kids.len() as i64;
        doc.objects.insert(
            pages_id,
            Object::Dictionary(dictionary! {
                "Type" => "Pages",
                "Kids" => kids,
                "Count" => count,
                "Resources" => resources_id,
                "MediaBox" => vec![0.into(), 0.into(), 595.into(), 842.into()],
            }),
        );
        let catalog_id = doc.add_object(dictionary! {
            "Type" => "Catalog",
            "Pages" => pages_id,
        });
        doc.trailer.set("Root", catalog_id);

        let mut bytes = Vec::new();
        doc.save_to(&mut bytes).unwrap();
        bytes
    }

    #[tokio::test]
    async fn test_extracts_pages_with_markers() {
        let bytes = build_pdf(&["CREDIT AGREEMENT", "ARTICLE I DEFINITIONS"]);
        let extracted = PdfTextExtractor::default().extract(&bytes).await.unwrap();

        assert_eq!(extracted.page_count, 2);
        assert!(extracted.text.starts_with("--- Page 1 ---\n"));
        assert!(extracted.text.contains("--- Page 2 ---"));
        assert!(extracted.text.contains("CREDIT AGREEMENT"));
        assert!(extracted.text.contains("DEFINITIONS"));
        let marker = extracted.text.find("--- Page 2 ---").unwrap();
        assert!(extracted.text.find("DEFINITIONS").unwrap() > marker);
    }

    #[tokio::test]
    async fn test_garbage_is_unreadable() {
        let err = PdfTextExtractor::default()
            .extract_text(b"definitely not a pdf")
            .await
            .unwrap_err();
        assert!(matches!(err, TextExtractionError::Unreadable(_)));
    }

    #[tokio::test]
    async fn test_blank_pdf_has_no_text_layer() {
        let bytes = build_pdf(&["", ""]);
        let err = PdfTextExtractor::default().extract(&bytes).await.unwrap_err();
        assert_eq!(err, PdfError::NoTextLayer);
    }

    #[test]
    fn test_assemble_normalizes_and_counts() {
        let pages = vec!["first\r\npage".to_string(), "e\u{FB03}cient\0".to_string()];
        let extracted = assemble(&pages, ExtractionMethod::Fallback);
        assert_eq!(
            extracted.text,
            "--- Page 1 ---\nfirst\npage\n\n--- Page 2 ---\nefficient\n"
        );
        assert_eq!(extracted.page_count, 2);
        assert_eq!(extracted.method, ExtractionMethod::Fallback);
        assert_eq!(extracted.table_count, 0);
    }

    #[test]
    fn test_tabulate_rewrites_column_runs() {
        let page = "\
SECTION 6.12 Total Leverage Ratio.
Fiscal Quarter Ending      Maximum Ratio
June 30, 2024              3.50:1.00
September 30, 2024         3.25:1.00
The Borrower shall comply with the above.";
        let (text, tables) = tabulate(page);
        assert_eq!(tables, 1);
        assert!(text.starts_with("SECTION 6.12 Total Leverage Ratio.\n"));
        assert!(text.contains("Fiscal Quarter Ending\tMaximum Ratio\n"));
        assert!(text.contains("June 30, 2024\t3.50:1.00\n"));
        assert!(text.ends_with("3.25:1.00\nThe Borrower shall comply with the above."));
    }

    #[test]
    fn test_short_column_runs_are_not_tables() {
        let page = "Name      Value\nBorrower  Acme\n\nrunning text";
        let (text, tables) = tabulate(page);
        assert_eq!(tables, 0);
        assert_eq!(text, page);
    }

    #[test]
    fn test_assemble_counts_tables_across_pages() {
        let table = "A  B\nC  D\nE  F".to_string();
        let extracted = assemble(&[table.clone(), "prose".to_string(), table], ExtractionMethod::Primary);
        assert_eq!(extracted.table_count, 2);
        assert!(extracted.text.contains("A\tB\nC\tD\nE\tF"));
    }

    #[test]
    fn test_has_text() {
        assert!(!has_text(&["  \n".to_string(), String::new()]));
        assert!(has_text(&[String::new(), "x".to_string()]));
    }
}
