//! Splitting agreement text into typed article chunks
//!
//! The chunker walks the text line by line looking for `ARTICLE` headings.
//! A heading is accepted only when it is outside the table of contents, is
//! not itself a contents entry (trailing page number), and carries an article
//! number greater than the last accepted one. Everything between two accepted
//! headings belongs to the first, so the chunks always tile the input.

use creditseer_domain::{Chunk, ChunkType, Span};
use regex::Regex;
use std::ops::Range;
use std::sync::LazyLock;

static HEADING: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[ \t]*ARTICLE[ \t]+([IVXL]+|[0-9]{1,2})(?:[ \t]*$|[ \t.:\-–—]+(.*)$)")
        .expect("valid heading regex")
});

static TOC_ENTRY: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?:^|[\s.])\d+\s*$").expect("valid toc entry regex"));

static TOC_MARKER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^\s*table\s+of\s+contents\b").expect("valid toc marker regex")
});

static TOC_END: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)^\s*(?:schedules|exhibits)\b").expect("valid toc end regex"));

static PAGE_MARKER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?m)^--- Page (\d+) ---").expect("valid page marker regex"));

/// Title given to text before the first article
pub const COVER_TITLE: &str = "COVER PAGE";

/// Title given to the single chunk of a document without article headings
pub const UNSTRUCTURED_TITLE: &str = "FULL DOCUMENT";

/// Most lines joined into a title taken from below the heading
const MAX_TITLE_LINES: usize = 2;

/// Splits normalized agreement text into chunks
#[derive(Debug, Clone, Copy, Default)]
pub struct Chunker;

#[derive(Debug, Clone, Copy)]
struct Line<'a> {
    start: usize,
    text: &'a str,
}

#[derive(Debug, Clone)]
struct Candidate {
    line: usize,
    start: usize,
    number: u32,
    label: String,
    remainder: String,
}

impl Candidate {
    fn is_toc_entry(&self) -> bool {
        TOC_ENTRY.is_match(&self.remainder)
    }
}

impl Chunker {
    /// Create a new chunker
    pub fn new() -> Self {
        Self
    }

    /// Split `text` into ordered, contiguous chunks
    ///
    /// Never fails: text without accepted headings, including the empty
    /// string, becomes a single unclassified chunk.
    ///
    /// # Examples
    ///
    /// ```
    /// use creditseer_domain::ChunkType;
    /// use creditseer_extractor::Chunker;
    ///
    /// let text = "CREDIT AGREEMENT\n\nARTICLE I\nDEFINITIONS\n\"Borrower\" means Acme.\n";
    /// let chunks = Chunker::new().chunk(text);
    ///
    /// assert_eq!(chunks.len(), 2);
    /// assert_eq!(chunks[0].chunk_type, ChunkType::Cover);
    /// assert_eq!(chunks[1].chunk_type, ChunkType::Definitions);
    /// assert_eq!(chunks[1].title, "ARTICLE I DEFINITIONS");
    /// ```
    pub fn chunk(&self, text: &str) -> Vec<Chunk> {
        let lines = split_lines(text);
        let candidates: Vec<Candidate> = lines
            .iter()
            .enumerate()
            .filter_map(|(i, line)| parse_heading(i, line))
            .collect();
        let toc = toc_region(&lines, &candidates);

        let mut accepted: Vec<&Candidate> = Vec::new();
        let mut last_number = 0;
        for candidate in &candidates {
            if candidate.is_toc_entry() {
                continue;
            }
            if toc.as_ref().is_some_and(|r| r.contains(&candidate.start)) {
                continue;
            }
            if candidate.number <= last_number {
                continue;
            }
            last_number = candidate.number;
            accepted.push(candidate);
        }

        let pages = PageIndex::new(text);

        if accepted.is_empty() {
            return vec![build_chunk(
                text,
                &pages,
                0,
                ChunkType::Unclassified,
                UNSTRUCTURED_TITLE.to_string(),
                0..text.len(),
            )];
        }

        let mut chunks = Vec::with_capacity(accepted.len() + 1);
        let first_start = accepted[0].start;
        let mut body_start = 0;
        if !text[..first_start].trim().is_empty() {
            chunks.push(build_chunk(
                text,
                &pages,
                0,
                ChunkType::Cover,
                COVER_TITLE.to_string(),
                0..first_start,
            ));
            body_start = first_start;
        }

        for (i, candidate) in accepted.iter().enumerate() {
            let start = if i == 0 { body_start } else { candidate.start };
            let end = accepted.get(i + 1).map_or(text.len(), |next| next.start);
            let heading_title = heading_title(&lines, candidate);
            let title = if heading_title.is_empty() {
                format!("ARTICLE {}", candidate.label)
            } else {
                format!("ARTICLE {} {}", candidate.label, heading_title)
            };
            let chunk_type = classify(&heading_title);
            let index = chunks.len();
            chunks.push(build_chunk(text, &pages, index, chunk_type, title, start..end));
        }

        chunks
    }
}

/// Classify an article title by ordered keyword rules
///
/// The first matching rule wins; titles matching none are `Unclassified`.
pub fn classify(title: &str) -> ChunkType {
    let upper = title.to_uppercase();
    let has = |word: &str| upper.contains(word);

    if has("DEFINITION") {
        ChunkType::Definitions
    } else if has("REPRESENTATION") || has("WARRANT") {
        ChunkType::Representations
    } else if has("NEGATIVE") && has("COVENANT") {
        ChunkType::NegativeCovenants
    } else if has("AFFIRMATIVE") && has("COVENANT") {
        ChunkType::AffirmativeCovenants
    } else if has("CONDITION") {
        ChunkType::Conditions
    } else if has("EVENT") && has("DEFAULT") {
        ChunkType::EventsOfDefault
    } else if has("GUARANT") {
        ChunkType::Guarantee
    } else if has("AGENT") {
        ChunkType::AdministrativeAgent
    } else if has("CREDIT") || has("LOAN") || has("FACILIT") {
        ChunkType::Credits
    } else if has("MISCELLANEOUS") {
        ChunkType::Miscellaneous
    } else if has("COVER") {
        ChunkType::Cover
    } else {
        ChunkType::Unclassified
    }
}

/// Page lookup over `--- Page N ---` markers
#[derive(Debug, Clone, Default)]
pub struct PageIndex {
    markers: Vec<(usize, u32)>,
}

impl PageIndex {
    /// Index every page marker in `text`
    pub fn new(text: &str) -> Self {
        let markers = PAGE_MARKER
            .captures_iter(text)
            .filter_map(|caps| {
                let start = caps.get(0)?.start();
                let page = caps.get(1)?.as_str().parse().ok()?;
                Some((start, page))
            })
            .collect();
        Self { markers }
    }

    /// Whether the text carried any markers
    pub fn is_empty(&self) -> bool {
        self.markers.is_empty()
    }

    /// Page of the last marker at or before `offset`, else the first page
    pub fn page_at(&self, offset: usize) -> Option<u32> {
        self.markers
            .iter()
            .take_while(|(start, _)| *start <= offset)
            .last()
            .or_else(|| self.markers.first())
            .map(|(_, page)| *page)
    }
}

/// Page containing byte `offset` of `text`, when the text carries page markers
pub fn page_at(text: &str, offset: usize) -> Option<u32> {
    PageIndex::new(text).page_at(offset)
}

fn build_chunk(
    text: &str,
    pages: &PageIndex,
    index: usize,
    chunk_type: ChunkType,
    title: String,
    range: Range<usize>,
) -> Chunk {
    let span = Span::from(range);
    let last = span.end.saturating_sub(1).max(span.start);
    Chunk {
        index,
        chunk_type,
        title,
        text: text[span.as_range()].to_string(),
        start_page: pages.page_at(span.start),
        end_page: pages.page_at(last),
        span,
    }
}

fn split_lines(text: &str) -> Vec<Line<'_>> {
    let mut offset = 0;
    text.split_inclusive('\n')
        .map(|raw| {
            let line = Line {
                start: offset,
                text: raw.trim_end_matches(['\n', '\r']),
            };
            offset += raw.len();
            line
        })
        .collect()
}

fn parse_heading(line_index: usize, line: &Line<'_>) -> Option<Candidate> {
    let caps = HEADING.captures(line.text)?;
    let label = caps.get(1)?.as_str();
    let number = article_number(label)?;
    let remainder = caps
        .get(2)
        .map(|m| m.as_str().trim().to_string())
        .unwrap_or_default();
    Some(Candidate {
        line: line_index,
        start: line.start,
        number,
        label: label.to_string(),
        remainder,
    })
}

fn article_number(label: &str) -> Option<u32> {
    if label.bytes().all(|b| b.is_ascii_digit()) {
        return label.parse().ok().filter(|n| (1..=99).contains(n));
    }
    parse_roman(label).filter(|n| (1..=50).contains(n))
}

/// Parse a canonical roman numeral made of I, V, X and L
fn parse_roman(s: &str) -> Option<u32> {
    let value = |c: char| match c {
        'I' => Some(1),
        'V' => Some(5),
        'X' => Some(10),
        'L' => Some(50),
        _ => None,
    };
    let digits: Vec<u32> = s.chars().map(value).collect::<Option<_>>()?;
    let mut total = 0;
    for (i, d) in digits.iter().enumerate() {
        match digits.get(i + 1) {
            Some(next) if next > d => total -= *d as i64,
            _ => total += *d as i64,
        }
    }
    let total = u32::try_from(total).ok()?;
    (to_roman(total) == s).then_some(total)
}

fn to_roman(mut n: u32) -> String {
    const TABLE: [(u32, &str); 7] = [
        (50, "L"),
        (40, "XL"),
        (10, "X"),
        (9, "IX"),
        (5, "V"),
        (4, "IV"),
        (1, "I"),
    ];
    let mut out = String::new();
    for (value, symbol) in TABLE {
        while n >= value {
            out.push_str(symbol);
            n -= value;
        }
    }
    out
}

/// Start of the table of contents up to the first line that ends it
///
/// The contents end at the earlier of a `SCHEDULES`/`EXHIBITS` line and the
/// first heading whose number repeats one seen after the marker. Without a
/// repeat, the first heading after the marker bounds the region.
fn toc_region(lines: &[Line<'_>], candidates: &[Candidate]) -> Option<Range<usize>> {
    let (marker_index, marker) = lines
        .iter()
        .enumerate()
        .find(|(_, line)| TOC_MARKER.is_match(line.text))?;

    let listed_end = lines[marker_index + 1..]
        .iter()
        .find(|line| TOC_END.is_match(line.text))
        .map(|line| line.start);

    let after_marker: Vec<&Candidate> = candidates.iter().filter(|c| c.line > marker_index).collect();
    let mut seen = Vec::new();
    let mut repeated = None;
    for candidate in &after_marker {
        if seen.contains(&candidate.number) {
            repeated = Some(candidate.start);
            break;
        }
        seen.push(candidate.number);
    }
    let heading_end = repeated.or_else(|| after_marker.first().map(|c| c.start));

    let end = match (listed_end, heading_end) {
        (Some(a), Some(b)) => a.min(b),
        (Some(end), None) | (None, Some(end)) => end,
        (None, None) => marker.start + marker.text.len(),
    };
    Some(marker.start..end.max(marker.start + marker.text.len()))
}

/// Title on the heading line, or up to two title-shaped lines below it
fn heading_title(lines: &[Line<'_>], candidate: &Candidate) -> String {
    let inline = candidate
        .remainder
        .trim_matches(|c: char| c.is_whitespace() || matches!(c, '.' | ':' | '-' | '–' | '—'));
    if !inline.is_empty() {
        return inline.to_string();
    }

    let mut following = lines[candidate.line + 1..]
        .iter()
        .map(|line| line.text.trim())
        .skip_while(|text| text.is_empty());

    let mut parts = Vec::new();
    while parts.len() < MAX_TITLE_LINES {
        match following.next() {
            Some(text) if is_title_line(text) => parts.push(text),
            _ => break,
        }
    }
    parts.join(" ")
}

fn is_title_line(text: &str) -> bool {
    !text.is_empty()
        && !text.chars().any(char::is_lowercase)
        && text.chars().any(char::is_uppercase)
        && !HEADING.is_match(text)
        && !text.starts_with("SECTION")
}
