//! Local confidence assessment for Stage 2 values
//!
//! Each value is scored on up to seven factors against its block:
//!
//! | Factor           | Max | Applies to                          |
//! |------------------|-----|-------------------------------------|
//! | Value Presence   | 3   | all                                 |
//! | Format Validity  | 2   | all, by hint type                   |
//! | Evidence Support | 2   | all                                 |
//! | Completeness     | 1   | all                                 |
//! | Anchor Proximity | 1   | all; scored only with a hint pattern|
//! | Ambiguity Check  | 0   | metrics, dates, durations (-0.5)    |
//! | Faithfulness     | 1   | summarized fields                   |
//!
//! The level follows the percentage of the maximum: 75% and above is high,
//! 50% and above medium, anything lower is low. The displayed percentage is
//! capped at 95%.

use crate::grounding::{meaningful_tokens, numbers_in};
use creditseer_domain::{Confidence, ConfidenceAssessment, ConfidenceFactor, FieldValue, OutputMode};
use creditseer_schema::{FieldSpec, HintType};
use regex::{Regex, RegexBuilder};
use std::collections::BTreeSet;
use std::sync::LazyLock;

/// Cap on the displayed percentage
pub const DISPLAY_CAP: f64 = 95.0;

/// Anchor distance (bytes) beyond which proximity scores nothing
const PROXIMITY_THRESHOLD: usize = 500;

const MONTHS: &str =
    "January|February|March|April|May|June|July|August|September|October|November|December";
const DURATION_UNITS: &str = "day|days|Business\\s+Day|Business\\s+Days|month|months|year|years";
const NUMBER_WORDS: &str = "one|two|three|four|five|six|seven|eight|nine|ten|eleven|twelve|\
thirteen|fourteen|fifteen|twenty|thirty|forty|fifty|sixty|ninety";

const RATE_ANCHORS: &[&str] = &[
    "greatest of",
    "least of",
    "prime rate",
    "libor",
    "sofr",
    "plus",
    "dividing",
    "one minus",
    "multiplied by",
    "divided by",
    "base rate",
    "alternate base rate",
    "adjusted",
    "applicable",
    "margin",
    "spread",
];

const KEY_RATE_TERMS: &[&str] = &[
    "prime rate",
    "libor",
    "sofr",
    "federal funds",
    "base rate",
    "alternate base rate",
    "adjusted libo",
    "eurodollar",
    "cd rate",
];

fn case_insensitive(patterns: &[String]) -> Vec<Regex> {
    patterns
        .iter()
        .filter_map(|p| RegexBuilder::new(p).case_insensitive(true).build().ok())
        .collect()
}

static METRIC_FORMAT: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    case_insensitive(&[
        r"^\$[\s,]?\d+([,.]\d+)*".into(),
        r"USD\s+[\d,]+".into(),
        r"U\.S\.\s*dollars?\s+[\d,]+".into(),
        r"\d+(\.\d+)?%".into(),
        r"\d+(\.\d+)?:\d+(\.\d+)?".into(),
        r"\d+\.\d+\s*bps".into(),
        r"^\d+([,.]\d+)*$".into(),
    ])
});

static DATE_FORMAT: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    case_insensitive(&[
        r"\d{1,2}[/-]\d{1,2}[/-]\d{2,4}".into(),
        format!(r"({MONTHS})\s+\d{{1,2}},\s+\d{{4}}"),
        format!(r"\d{{1,2}}\s+({MONTHS})\s+\d{{4}}"),
    ])
});

static LOCATION_FORMAT: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    case_insensitive(&[
        r"Section\s+[0-9A-Za-z.()]+".into(),
        r"Schedule\s+[0-9A-Za-z.()]+".into(),
        r"Exhibit\s+[A-Za-z0-9]+".into(),
        r"Appendix\s+[A-Za-z0-9]+".into(),
    ])
});

static DURATION_FORMAT: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    case_insensitive(&[
        format!(r"\d+\s+({DURATION_UNITS})"),
        format!(r"({NUMBER_WORDS})\s+({DURATION_UNITS})"),
        r"\d+\s+hours?".into(),
    ])
});

static BOOLEAN_FORMAT: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    case_insensitive(&[
        r"^(yes|no|true|false|automatic|discretionary|required|not\s+required)$".into(),
    ])
});

static METRIC_CANDIDATES: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    case_insensitive(&[
        r"\$[\s,]?\d+([,.]\d+)*".into(),
        r"USD\s+[\d,]+".into(),
        r"U\.S\.\s*dollars?\s+[\d,]+".into(),
        r"\d+(\.\d+)?%".into(),
        r"\d+(\.\d+)?:\d+(\.\d+)?".into(),
        r"\d+\.\d+\s*bps".into(),
        r"\b\d{1,3}(?:,\d{3})*(?:\.\d+)?\b".into(),
    ])
});

static DATE_CANDIDATES: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    case_insensitive(&[
        r"\d{1,2}[/-]\d{1,2}[/-]\d{2,4}".into(),
        format!(r"({MONTHS})\s+\d{{1,2}},\s+\d{{4}}"),
    ])
});

static DURATION_CANDIDATES: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    case_insensitive(&[
        format!(r"\d+\s+({DURATION_UNITS})"),
        format!(r"({NUMBER_WORDS})\s+({DURATION_UNITS})"),
    ])
});

/// Whether `value` has the shape expected for `hint_type`
///
/// Text and unknown types always pass.
pub fn validate_format(value: &str, hint_type: HintType) -> bool {
    let value = value.trim();
    let patterns: &[Regex] = match hint_type {
        HintType::QuantitativeMetric => METRIC_FORMAT.as_slice(),
        HintType::Date => DATE_FORMAT.as_slice(),
        HintType::Location => LOCATION_FORMAT.as_slice(),
        HintType::Duration => DURATION_FORMAT.as_slice(),
        HintType::Boolean => BOOLEAN_FORMAT.as_slice(),
        HintType::Text | HintType::Other => return true,
    };
    patterns.iter().any(|re| re.is_match(value))
}

/// Score `value` against the block it was extracted from
///
/// `spec` is `None` when the field is unknown to the schema; the value is then
/// treated as free text.
pub fn assess(spec: Option<&FieldSpec>, value: &FieldValue, block_text: &str) -> ConfidenceAssessment {
    let hint_type = spec.map(|s| s.extraction_hint.hint_type).unwrap_or_default();
    let summarized = spec.is_some_and(|s| s.output_mode == OutputMode::Summarized);
    let pattern = spec
        .and_then(|s| s.extraction_hint.pattern.as_deref())
        .filter(|p| !p.trim().is_empty());
    let rate_notes = spec
        .and_then(|s| s.extraction_hint.notes.as_deref())
        .is_some_and(|n| n.to_lowercase().contains("rate"));

    let items: Vec<&str> = value
        .items()
        .into_iter()
        .filter(|v| !is_not_found(v))
        .collect();
    let missing = items.is_empty();
    let is_list = matches!(value, FieldValue::Multiple(_));
    let joined = items.join(" ");
    let first = items.first().copied().unwrap_or("");

    let mut card = Scorecard::default();

    // Presence
    if missing {
        card.add("Value Presence", "Not Found", 0.0, 3.0);
    } else {
        card.add("Value Presence", "Found", 3.0, 3.0);
    }

    // Format validity
    let format_valid = !missing
        && if is_list {
            items.iter().all(|v| validate_format(v, hint_type))
        } else {
            validate_format(first, hint_type)
        };
    if format_valid {
        card.add("Format Validity", format!("Valid {} format", hint_type), 2.0, 2.0);
    } else {
        card.add(
            "Format Validity",
            format!("Format mismatch for {} type", hint_type),
            0.0,
            2.0,
        );
    }

    // Evidence support
    if missing {
        card.add("Evidence Support", "N/A (value not found)", 0.0, 2.0);
    } else {
        let evidence = if summarized || (hint_type == HintType::Text && rate_notes) {
            anchor_coverage(&joined, block_text)
        } else if block_text.to_lowercase().contains(&joined.to_lowercase()) {
            2.0
        } else if has_meaningful_tokens(&joined, block_text) {
            1.0
        } else {
            0.0
        };
        let status = match evidence as u8 {
            2 => "Strong match",
            1 => "Partial match",
            _ => "Weak match",
        };
        card.add("Evidence Support", status, evidence, 2.0);
    }

    // Completeness
    if missing {
        card.add("Completeness", "N/A (value not found)", 0.0, 1.0);
    } else if is_list {
        let score = if items.len() >= 2 { 1.0 } else { 0.5 };
        card.add("Completeness", format!("{} item(s)", items.len()), score, 1.0);
    } else {
        let score = if format_valid { 1.0 } else { 0.0 };
        card.add("Completeness", "Single value", score, 1.0);
    }

    // Anchor proximity
    match pattern {
        Some(pattern) if !missing => {
            let (score, status) = anchor_proximity(first, block_text, pattern);
            card.add("Anchor Proximity", status, score, 1.0);
        }
        Some(_) => card.add("Anchor Proximity", "N/A (value not found)", 0.0, 1.0),
        None => card.add("Anchor Proximity", "N/A (no pattern hint)", 0.0, 1.0),
    }

    // Ambiguity
    let mut ambiguous = false;
    match candidate_patterns(hint_type) {
        Some(patterns) if !missing => {
            let count = count_candidates(patterns, block_text);
            if count > 1 {
                ambiguous = true;
                card.add(
                    "Ambiguity Check",
                    format!("Multiple {} candidates found ({})", hint_type, count),
                    -0.5,
                    0.0,
                );
            } else {
                card.add("Ambiguity Check", "Single candidate or unambiguous", 0.0, 0.0);
            }
        }
        _ => card.add("Ambiguity Check", "N/A (not applicable)", 0.0, 0.0),
    }

    // Faithfulness
    if summarized {
        if missing {
            card.add("Faithfulness", "N/A (value not found)", 0.0, 1.0);
        } else {
            let (score, status) = faithfulness(&joined, block_text);
            card.add("Faithfulness", status, score, 1.0);
        }
    } else {
        card.factors.push(ConfidenceFactor {
            factor: "Faithfulness".to_string(),
            status: "N/A (not summarized output)".to_string(),
            score: 0.0,
            max: 1.0,
        });
    }

    card.finish(missing, ambiguous)
}

#[derive(Default)]
struct Scorecard {
    score: f64,
    max: f64,
    factors: Vec<ConfidenceFactor>,
}

impl Scorecard {
    fn add(&mut self, factor: &str, status: impl Into<String>, score: f64, max: f64) {
        self.score += score;
        self.max += max;
        self.factors.push(ConfidenceFactor {
            factor: factor.to_string(),
            status: status.into(),
            score: round(score, 2),
            max,
        });
    }

    fn finish(self, missing: bool, ambiguous: bool) -> ConfidenceAssessment {
        let score = self.score.max(0.0);
        let percentage = if missing || self.max == 0.0 {
            0.0
        } else {
            score / self.max * 100.0
        };
        ConfidenceAssessment {
            level: Confidence::from_percentage(percentage),
            score: round(score, 1),
            max_score: self.max,
            percentage: round(percentage, 1),
            display_percentage: round(percentage.min(DISPLAY_CAP), 1),
            factors: self.factors,
            ambiguous_candidates: ambiguous,
        }
    }
}

fn round(value: f64, places: i32) -> f64 {
    let factor = 10f64.powi(places);
    (value * factor).round() / factor
}

fn is_not_found(value: &str) -> bool {
    let value = value.trim();
    value.is_empty() || value.eq_ignore_ascii_case(crate::prompt::NOT_FOUND)
}

/// At least two long non-stopword tokens of the value, two of which occur in the block
fn has_meaningful_tokens(value: &str, block_text: &str) -> bool {
    let tokens = meaningful_tokens(value, 4);
    if tokens.len() < 2 {
        return false;
    }
    let block_lower = block_text.to_lowercase();
    tokens.iter().filter(|t| block_lower.contains(t.as_str())).count() >= 2
}

fn anchor_coverage(value: &str, block_text: &str) -> f64 {
    let value_lower = value.to_lowercase();
    let block_lower = block_text.to_lowercase();
    let found = RATE_ANCHORS
        .iter()
        .filter(|a| value_lower.contains(*a) && block_lower.contains(*a))
        .count();
    match found {
        0 => 0.0,
        1 | 2 => 1.0,
        _ => 2.0,
    }
}

/// Regex alternatives of a hint pattern; plain text is matched literally
fn anchor_regexes(pattern: &str) -> Result<Vec<Regex>, regex::Error> {
    const META: &[char] = &['\\', '(', ')', '[', ']', '.', '*', '+', '?', '^', '$'];
    pattern
        .trim_matches(|c| c == '(' || c == ')')
        .split('|')
        .map(str::trim)
        .filter(|alt| !alt.is_empty())
        .map(|alt| {
            let source = if alt.contains(META) {
                alt.to_string()
            } else {
                regex::escape(alt)
            };
            RegexBuilder::new(&source).case_insensitive(true).build()
        })
        .collect()
}

fn find_insensitive(haystack: &str, needle: &str) -> Option<usize> {
    if needle.is_empty() {
        return None;
    }
    RegexBuilder::new(&regex::escape(needle))
        .case_insensitive(true)
        .build()
        .ok()?
        .find(haystack)
        .map(|m| m.start())
}

fn anchor_proximity(value: &str, block_text: &str, pattern: &str) -> (f64, String) {
    let regexes = match anchor_regexes(pattern) {
        Ok(regexes) => regexes,
        Err(e) => {
            let message: String = e.to_string().chars().take(50).collect();
            return (0.0, format!("Pattern matching error: {}", message));
        }
    };
    let anchors: Vec<usize> = regexes
        .iter()
        .flat_map(|re| re.find_iter(block_text).map(|m| m.start()))
        .collect();
    if anchors.is_empty() {
        return (0.0, "Anchor pattern not found in block".to_string());
    }

    let position = find_insensitive(block_text, value).or_else(|| {
        value
            .split_whitespace()
            .next()
            .and_then(|token| find_insensitive(block_text, token))
    });
    let Some(position) = position else {
        return (0.0, "Value not found near anchor".to_string());
    };

    let distance = anchors
        .iter()
        .map(|a| a.abs_diff(position))
        .min()
        .unwrap_or(usize::MAX);
    if distance > PROXIMITY_THRESHOLD {
        return (0.0, format!("Far from anchor ({} chars)", distance));
    }

    let score = round(1.0 - distance as f64 / PROXIMITY_THRESHOLD as f64, 2);
    let status = if distance <= 100 {
        format!("Very close to anchor ({} chars)", distance)
    } else if distance <= 250 {
        format!("Close to anchor ({} chars)", distance)
    } else {
        format!("Moderate distance from anchor ({} chars)", distance)
    };
    (score, status)
}

fn candidate_patterns(hint_type: HintType) -> Option<&'static [Regex]> {
    match hint_type {
        HintType::QuantitativeMetric => Some(METRIC_CANDIDATES.as_slice()),
        HintType::Date => Some(DATE_CANDIDATES.as_slice()),
        HintType::Duration => Some(DURATION_CANDIDATES.as_slice()),
        _ => None,
    }
}

/// Distinct matches of any candidate pattern in the block
///
/// A match lying inside a longer match (the `3.50` of `3.50:1.00`) is part of
/// that candidate, not another one.
fn count_candidates(patterns: &[Regex], block_text: &str) -> usize {
    let mut spans: Vec<(usize, usize)> = patterns
        .iter()
        .flat_map(|re| re.find_iter(block_text).map(|m| (m.start(), m.end())))
        .collect();
    spans.sort_by(|a, b| a.0.cmp(&b.0).then(b.1.cmp(&a.1)));

    let mut outer: Vec<(usize, usize)> = Vec::new();
    for span in spans {
        if outer
            .last()
            .is_some_and(|last| span.0 >= last.0 && span.1 <= last.1)
        {
            continue;
        }
        outer.push(span);
    }
    outer
        .iter()
        .map(|(start, end)| block_text[*start..*end].trim())
        .collect::<BTreeSet<_>>()
        .len()
}

fn faithfulness(value: &str, block_text: &str) -> (f64, String) {
    let available = numbers_in(block_text);
    let introduced: Vec<String> = numbers_in(value)
        .into_iter()
        .filter(|n| !available.iter().any(|m| (n - m).abs() < 0.01))
        .map(|n| n.to_string())
        .collect();
    let numbers_ok = introduced.is_empty();

    let value_lower = value.to_lowercase();
    let block_lower = block_text.to_lowercase();
    let has_rate_term = KEY_RATE_TERMS
        .iter()
        .any(|t| value_lower.contains(t) && block_lower.contains(t));

    match (numbers_ok, has_rate_term) {
        (true, true) => (1.0, "Faithful: all numbers present, key terms included".to_string()),
        (true, false) => (
            0.5,
            "Partially faithful: numbers OK but missing key rate terms".to_string(),
        ),
        (false, true) => (
            0.3,
            format!(
                "Partially faithful: key terms OK but introduced numbers: {}",
                introduced.iter().take(3).cloned().collect::<Vec<_>>().join(", ")
            ),
        ),
        (false, false) => (
            0.0,
            "Not faithful: introduced numbers and missing key terms".to_string(),
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use creditseer_schema::ExtractionHint;

    fn spec(hint_type: HintType, pattern: Option<&str>, multiple: bool, mode: OutputMode) -> FieldSpec {
        FieldSpec {
            name: "field".to_string(),
            extraction_hint: ExtractionHint {
                hint_type,
                pattern: pattern.map(str::to_string),
                notes: None,
            },
            collect_multiple: multiple,
            output_mode: mode,
        }
    }

    fn factor<'a>(a: &'a ConfidenceAssessment, name: &str) -> &'a ConfidenceFactor {
        a.factors.iter().find(|f| f.factor == name).unwrap()
    }

    #[test]
    fn test_format_validation() {
        assert!(validate_format("$50,000,000", HintType::QuantitativeMetric));
        assert!(validate_format("3.50:1.00", HintType::QuantitativeMetric));
        assert!(validate_format("2.25%", HintType::QuantitativeMetric));
        assert!(validate_format("150.0 bps", HintType::QuantitativeMetric));
        assert!(!validate_format("fifty million", HintType::QuantitativeMetric));

        assert!(validate_format("June 30, 2024", HintType::Date));
        assert!(validate_format("30 June 2024", HintType::Date));
        assert!(validate_format("06/30/2024", HintType::Date));
        assert!(!validate_format("the last day of the quarter", HintType::Date));

        assert!(validate_format("Section 7.02(c)", HintType::Location));
        assert!(validate_format("Exhibit B", HintType::Location));
        assert!(!validate_format("clause (c) above", HintType::Location));

        assert!(validate_format("30 days", HintType::Duration));
        assert!(validate_format("five Business Days", HintType::Duration));
        assert!(!validate_format("promptly", HintType::Duration));

        assert!(validate_format("Automatic", HintType::Boolean));
        assert!(validate_format("not required", HintType::Boolean));
        assert!(!validate_format("maybe", HintType::Boolean));

        assert!(validate_format("anything at all", HintType::Text));
        assert!(validate_format("anything at all", HintType::Other));
    }

    #[test]
    fn test_verbatim_metric_with_single_candidate_is_high() {
        let block = "the Borrower shall not permit the Total Leverage Ratio to exceed 3.50:1.00.";
        let spec = spec(HintType::QuantitativeMetric, Some("Leverage Ratio"), false, OutputMode::Verbatim);
        let a = assess(Some(&spec), &FieldValue::Single("3.50:1.00".into()), block);

        assert_eq!(factor(&a, "Value Presence").score, 3.0);
        assert_eq!(factor(&a, "Format Validity").score, 2.0);
        assert_eq!(factor(&a, "Evidence Support").score, 2.0);
        assert_eq!(factor(&a, "Completeness").score, 1.0);
        assert!(factor(&a, "Anchor Proximity").score > 0.8);
        assert!(factor(&a, "Anchor Proximity").status.starts_with("Very close"));
        assert_eq!(a.max_score, 9.0);
        assert_eq!(a.level, Confidence::High);
        assert!(!a.ambiguous_candidates);
    }

    #[test]
    fn test_ambiguity_penalty() {
        let block = "3.50:1.00 for 2024, 3.25:1.00 for 2025 and 3.00:1.00 thereafter";
        let spec = spec(HintType::QuantitativeMetric, None, false, OutputMode::Verbatim);
        let a = assess(Some(&spec), &FieldValue::Single("3.25:1.00".into()), block);
        assert!(a.ambiguous_candidates);
        assert_eq!(factor(&a, "Ambiguity Check").score, -0.5);
    }

    #[test]
    fn test_list_completeness() {
        let block = "June 30, 2024 and September 30, 2024";
        let spec = spec(HintType::Date, None, true, OutputMode::Verbatim);

        let two = assess(
            Some(&spec),
            &FieldValue::Multiple(vec!["June 30, 2024".into(), "September 30, 2024".into()]),
            block,
        );
        assert_eq!(factor(&two, "Completeness").score, 1.0);
        assert_eq!(factor(&two, "Completeness").status, "2 item(s)");

        let one = assess(Some(&spec), &FieldValue::Multiple(vec!["June 30, 2024".into()]), block);
        assert_eq!(factor(&one, "Completeness").score, 0.5);
    }

    #[test]
    fn test_list_with_bad_item_fails_format() {
        let spec = spec(HintType::Date, None, true, OutputMode::Verbatim);
        let a = assess(
            Some(&spec),
            &FieldValue::Multiple(vec!["June 30, 2024".into(), "year end".into()]),
            "June 30, 2024 and year end",
        );
        assert_eq!(factor(&a, "Format Validity").score, 0.0);
    }

    #[test]
    fn test_partial_evidence_from_meaningful_tokens() {
        let block = "Indebtedness secured by purchase money Liens on equipment";
        let spec = spec(HintType::Text, None, false, OutputMode::Verbatim);
        let a = assess(
            Some(&spec),
            &FieldValue::Single("purchase money equipment financing".into()),
            block,
        );
        assert_eq!(factor(&a, "Evidence Support").score, 1.0);
    }

    #[test]
    fn test_summarized_rate_definition() {
        let block = "\"Base Rate\" means the greatest of (a) the Prime Rate and (b) the Federal Funds Rate plus 0.50%.";
        let spec = spec(HintType::Text, None, false, OutputMode::Summarized);
        let a = assess(
            Some(&spec),
            &FieldValue::Single("greatest of prime rate and federal funds rate plus 0.50%".into()),
            block,
        );

        assert_eq!(factor(&a, "Evidence Support").score, 2.0);
        assert_eq!(factor(&a, "Faithfulness").score, 1.0);
        assert_eq!(a.max_score, 10.0);
        assert_eq!(a.level, Confidence::High);
    }

    #[test]
    fn test_summarized_with_introduced_number() {
        let block = "\"Base Rate\" means the Prime Rate plus 0.50%.";
        let (score, status) = faithfulness("prime rate plus 1.75%", block);
        assert_eq!(score, 0.3);
        assert!(status.contains("1.75"));
        let (score, _) = faithfulness("the reference rate", block);
        assert_eq!(score, 0.5);
    }

    #[test]
    fn test_missing_value_is_low() {
        let spec = spec(HintType::Text, Some("means"), false, OutputMode::Verbatim);
        let a = assess(Some(&spec), &FieldValue::Single("Not Found".into()), "x means y");
        assert_eq!(a.level, Confidence::Low);
        assert_eq!(a.percentage, 0.0);
        assert_eq!(factor(&a, "Anchor Proximity").status, "N/A (value not found)");
    }

    #[test]
    fn test_anchor_alternatives_and_distance() {
        let filler = "x".repeat(300);
        let block = format!("\"Term\" shall mean {} VALUE", filler);
        let (score, status) = anchor_proximity("VALUE", &block, "(shall mean|means)");
        assert!(score > 0.0 && score < 0.5);
        assert!(status.starts_with("Moderate distance"));

        let (score, status) = anchor_proximity("VALUE", &block, "defined as");
        assert_eq!(score, 0.0);
        assert_eq!(status, "Anchor pattern not found in block");

        let far = format!("means {} VALUE", "y".repeat(600));
        let (score, status) = anchor_proximity("VALUE", &far, "means");
        assert_eq!(score, 0.0);
        assert!(status.starts_with("Far from anchor"));
    }

    #[test]
    fn test_invalid_non_ascii_pattern_scores_zero() {
        let pattern = format!("x[{}", "\u{e9}".repeat(30));
        let spec = spec(HintType::QuantitativeMetric, Some(&pattern), false, OutputMode::Verbatim);
        let a = assess(Some(&spec), &FieldValue::Single("2.00%".into()), "Applicable Rate: 2.00%");

        let anchor = factor(&a, "Anchor Proximity");
        assert_eq!(anchor.score, 0.0);
        assert!(anchor.status.starts_with("Pattern matching error"));
    }

    #[test]
    fn test_display_percentage_is_capped() {
        let block = "the Borrower shall not permit the Total Leverage Ratio to exceed 3.50:1.00.";
        let spec = spec(HintType::QuantitativeMetric, Some("Leverage Ratio"), false, OutputMode::Verbatim);
        let a = assess(Some(&spec), &FieldValue::Single("3.50:1.00".into()), block);
        assert!(a.percentage > DISPLAY_CAP);
        assert_eq!(a.display_percentage, DISPLAY_CAP);
    }

    #[test]
    fn test_unknown_field_is_text() {
        let a = assess(None, &FieldValue::Single("Acme".into()), "Acme Corp");
        assert_eq!(factor(&a, "Format Validity").score, 2.0);
        assert_eq!(factor(&a, "Anchor Proximity").status, "N/A (no pattern hint)");
    }
}
