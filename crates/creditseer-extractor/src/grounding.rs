//! Locating model output in the source text
//!
//! Nothing the model returns is trusted. Stage 1 block text must be a real
//! span of the chunk; Stage 2 values must be supported by their block.

use creditseer_domain::OutputMode;
use regex::Regex;
use std::ops::Range;
use std::sync::LazyLock;

static NUMBER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\d+(?:,\d{3})*(?:\.\d+)?").expect("valid number regex")
});

static WORD: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[A-Za-z0-9]+").expect("valid word regex"));

/// Words that carry no evidence on their own
pub const STOPWORDS: &[&str] = &[
    "the", "a", "an", "and", "or", "but", "in", "on", "at", "to", "for", "of", "with", "by",
    "from", "as", "is", "are", "was", "were", "be", "been", "being", "have", "has", "had", "do",
    "does", "did", "will", "would", "should", "could", "may", "might", "must", "can", "shall",
];

/// Tolerance when comparing numbers from a value with numbers in its block
const NUMBER_TOLERANCE: f64 = 0.01;

/// Find `needle` in `haystack` and return the exact byte range it occupies
///
/// An exact substring match wins. Otherwise runs of whitespace on either side
/// compare equal, and the range returned covers the haystack's own text, so
/// `&haystack[range]` can differ from `needle` in whitespace only.
///
/// # Examples
///
/// ```
/// use creditseer_extractor::grounding::locate_verbatim;
///
/// let chunk = "\"Borrower\" means\n  Acme Corp.";
/// let range = locate_verbatim(chunk, "\"Borrower\" means Acme Corp.").unwrap();
/// assert_eq!(&chunk[range], "\"Borrower\" means\n  Acme Corp.");
/// ```
pub fn locate_verbatim(haystack: &str, needle: &str) -> Option<Range<usize>> {
    let needle = needle.trim();
    if needle.is_empty() {
        return None;
    }
    if let Some(start) = haystack.find(needle) {
        return Some(start..start + needle.len());
    }

    let collapsed = Collapsed::new(haystack);
    let target = collapse_whitespace(needle);
    let start = collapsed.text.find(&target)?;
    let end = start + target.len();
    Some(collapsed.starts[start]..collapsed.ends[end - 1])
}

/// Whitespace-collapsed copy of a text with a byte map back to the original
struct Collapsed {
    text: String,
    starts: Vec<usize>,
    ends: Vec<usize>,
}

impl Collapsed {
    fn new(source: &str) -> Self {
        let mut text = String::with_capacity(source.len());
        let mut starts = Vec::with_capacity(source.len());
        let mut ends = Vec::with_capacity(source.len());
        let mut chars = source.char_indices().peekable();

        while let Some((pos, c)) = chars.next() {
            if c.is_whitespace() {
                let mut end = pos + c.len_utf8();
                while let Some(&(next_pos, next)) = chars.peek() {
                    if !next.is_whitespace() {
                        break;
                    }
                    end = next_pos + next.len_utf8();
                    chars.next();
                }
                text.push(' ');
                starts.push(pos);
                ends.push(end);
            } else {
                let end = pos + c.len_utf8();
                text.push(c);
                for _ in 0..c.len_utf8() {
                    starts.push(pos);
                    ends.push(end);
                }
            }
        }

        Self { text, starts, ends }
    }
}

/// Replace every run of whitespace with one space and trim the ends
pub fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Case- and whitespace-insensitive containment
pub fn contains_loose(haystack: &str, needle: &str) -> bool {
    let needle = collapse_whitespace(needle).to_lowercase();
    !needle.is_empty() && collapse_whitespace(haystack).to_lowercase().contains(&needle)
}

/// Numbers appearing in `text`, thousands separators removed
pub fn numbers_in(text: &str) -> Vec<f64> {
    NUMBER
        .find_iter(text)
        .filter_map(|m| m.as_str().replace(',', "").parse().ok())
        .collect()
}

/// Whether every number in `value` also appears in `source`
pub fn numbers_supported(value: &str, source: &str) -> bool {
    let available = numbers_in(source);
    numbers_in(value)
        .iter()
        .all(|n| available.iter().any(|m| (n - m).abs() <= NUMBER_TOLERANCE))
}

/// Lower-cased words longer than `min_len` bytes that are not stopwords
pub fn meaningful_tokens(text: &str, min_len: usize) -> Vec<String> {
    WORD.find_iter(text)
        .map(|m| m.as_str().to_lowercase())
        .filter(|w| w.len() > min_len && !STOPWORDS.contains(&w.as_str()))
        .collect()
}

/// Whether a Stage 2 value is supported by a block's text
///
/// Verbatim values must occur in the block. Summaries may rephrase, but must
/// not introduce numbers and must share at least one meaningful word.
pub fn value_grounded(value: &str, mode: OutputMode, block_text: &str) -> bool {
    match mode {
        OutputMode::Verbatim => contains_loose(block_text, value),
        OutputMode::Summarized => {
            if !numbers_supported(value, block_text) {
                return false;
            }
            let block_tokens = meaningful_tokens(block_text, 3);
            meaningful_tokens(value, 3)
                .iter()
                .any(|t| block_tokens.contains(t))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exact_match() {
        let text = "Section 6.12 Leverage Ratio. Not greater than 3.50:1.00.";
        let range = locate_verbatim(text, "3.50:1.00").unwrap();
        assert_eq!(&text[range], "3.50:1.00");
    }

    #[test]
    fn test_needle_is_trimmed() {
        let text = "The Borrower shall not.";
        assert_eq!(locate_verbatim(text, "  Borrower shall\n"), Some(4..18));
    }

    #[test]
    fn test_whitespace_insensitive_match_maps_to_source_range() {
        let text = "intro\n\"Consolidated EBITDA\"  means,\nfor any period,\tnet income.";
        let range = locate_verbatim(text, "\"Consolidated EBITDA\" means, for any period, net income.")
            .unwrap();
        assert_eq!(
            &text[range],
            "\"Consolidated EBITDA\"  means,\nfor any period,\tnet income."
        );
    }

    #[test]
    fn test_multibyte_text_maps_cleanly() {
        let text = "Lender\u{2019}s  share — 5%";
        let range = locate_verbatim(text, "Lender\u{2019}s share — 5%").unwrap();
        assert_eq!(&text[range], text);
    }

    #[test]
    fn test_not_found() {
        assert_eq!(locate_verbatim("abc def", "abc  xyz"), None);
        assert_eq!(locate_verbatim("abc", "   "), None);
        assert_eq!(locate_verbatim("abc", "ABC"), None);
    }

    #[test]
    fn test_contains_loose() {
        assert!(contains_loose("The Applicable\nMargin is 2.00%", "applicable margin"));
        assert!(!contains_loose("The Applicable Margin", "applicable rate"));
        assert!(!contains_loose("anything", ""));
    }

    #[test]
    fn test_numbers_in() {
        assert_eq!(numbers_in("$25,000,000 and 3.50:1.00"), vec![25_000_000.0, 3.5, 1.0]);
        assert!(numbers_in("no digits").is_empty());
    }

    #[test]
    fn test_numbers_supported() {
        let block = "a Leverage Ratio of 3.50 to 1.00 for the quarter";
        assert!(numbers_supported("3.5:1.0", block));
        assert!(!numbers_supported("4.00:1.00", block));
        assert!(numbers_supported("no numbers here", block));
    }

    #[test]
    fn test_meaningful_tokens_skip_stopwords_and_short_words() {
        let tokens = meaningful_tokens("The Borrower shall pay the Agent", 4);
        assert_eq!(tokens, vec!["borrower"]);
        let tokens = meaningful_tokens("The Borrower shall pay the Agent", 3);
        assert_eq!(tokens, vec!["borrower", "agent"]);
    }

    #[test]
    fn test_verbatim_value_grounding() {
        let block = "Applicable Margin means 2.25% per annum.";
        assert!(value_grounded("2.25% per annum", OutputMode::Verbatim, block));
        assert!(!value_grounded("2.50%", OutputMode::Verbatim, block));
    }

    #[test]
    fn test_summarized_value_grounding() {
        let block = "\"Base Rate\" means the greatest of (a) the Prime Rate and (b) the Federal Funds Rate plus 0.50%.";
        assert!(value_grounded(
            "Greatest of prime rate and federal funds rate plus 0.50%",
            OutputMode::Summarized,
            block
        ));
        assert!(!value_grounded(
            "Greatest of prime rate plus 1.00%",
            OutputMode::Summarized,
            block
        ));
        assert!(!value_grounded("Unrelated words", OutputMode::Summarized, block));
    }
}
