//! Text normalization and page markers
//!
//! Chunk spans, block spans and page lookups are all byte offsets into the
//! normalized text, so every producer of document text runs it through
//! [`normalize_text`] exactly once before it is stored.

/// Prefix of a page marker line
pub const PAGE_MARKER_PREFIX: &str = "--- Page ";

/// Marker line inserted before the text of page `page` (1-indexed)
pub fn page_marker(page: u32) -> String {
    format!("{}{} ---", PAGE_MARKER_PREFIX, page)
}

/// Normalize line endings and strip control bytes
///
/// `\r\n` and lone `\r` become `\n`, form feeds become `\n`, NUL bytes are
/// removed. Idempotent.
///
/// # Examples
///
/// ```
/// use creditseer_domain::normalize_text;
///
/// assert_eq!(normalize_text("a\r\nb\rc\u{c}d\0"), "a\nb\nc\nd");
/// ```
pub fn normalize_text(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut chars = text.chars().peekable();
    while let Some(c) = chars.next() {
        match c {
            '\r' => {
                if chars.peek() == Some(&'\n') {
                    chars.next();
                }
                out.push('\n');
            }
            '\u{c}' => out.push('\n'),
            '\0' => {}
            _ => out.push(c),
        }
    }
    out
}
