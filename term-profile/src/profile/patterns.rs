//! Regex-based recognition of common text shapes.

use once_cell::sync::Lazy;
use regex::Regex;

use crate::profile::types::{PatternMatch, TextPattern};

/// Minimum share of sampled values a pattern must match to be recorded.
pub const MIN_PATTERN_RATE: f64 = 0.10;

#[allow(clippy::expect_used)]
static PATTERNS: Lazy<Vec<(TextPattern, Regex)>> = Lazy::new(|| {
    let table = [
        (
            TextPattern::Email,
            r"^[A-Za-z0-9._%+\-]+@[A-Za-z0-9.\-]+\.[A-Za-z]{2,}$",
        ),
        (TextPattern::Url, r"(?i)^(https?|ftp)://[^\s/$.?#][^\s]*$"),
        (
            TextPattern::Phone,
            r"^\+?\d{0,3}[\s.\-]?\(?\d{3}\)?[\s.\-]?\d{3}[\s.\-]?\d{4}$",
        ),
        (
            TextPattern::Uuid,
            r"^[0-9a-fA-F]{8}-[0-9a-fA-F]{4}-[0-9a-fA-F]{4}-[0-9a-fA-F]{4}-[0-9a-fA-F]{12}$",
        ),
        (
            TextPattern::IpAddress,
            r"^((25[0-5]|2[0-4]\d|1?\d?\d)\.){3}(25[0-5]|2[0-4]\d|1?\d?\d)$",
        ),
        (TextPattern::CreditCard, r"^(\d{4}[\s\-]?){3}\d{4}$"),
        (
            TextPattern::PostalCode,
            r"^(\d{5}(-\d{4})?|[A-Za-z]\d[A-Za-z] ?\d[A-Za-z]\d)$",
        ),
        (
            TextPattern::Date,
            r"^(\d{4}-\d{2}-\d{2}|\d{1,2}/\d{1,2}/\d{4}|\d{1,2}\.\d{1,2}\.\d{4})$",
        ),
        (
            TextPattern::Currency,
            r"^([$€£¥]\s?-?\d{1,3}(,?\d{3})*(\.\d{1,2})?|-?\d+(\.\d{1,2})?\s?(USD|EUR|GBP|JPY))$",
        ),
        (TextPattern::Percentage, r"^-?\d+(\.\d+)?\s?%$"),
    ];
    table
        .into_iter()
        .map(|(kind, re)| (kind, Regex::new(re).expect("hard-coded pattern is valid")))
        .collect()
});

/// True when `value` has the shape of `pattern`.
pub fn matches(pattern: TextPattern, value: &str) -> bool {
    PATTERNS
        .iter()
        .find(|(kind, _)| *kind == pattern)
        .is_some_and(|(_, re)| re.is_match(value.trim()))
}

/// Match rates of every pattern reaching `min_rate` over `values`, highest
/// rate first.
pub fn detect_patterns<S: AsRef<str>>(values: &[S], min_rate: f64) -> Vec<PatternMatch> {
    if values.is_empty() {
        return Vec::new();
    }
    let total = values.len() as f64;
    let mut found: Vec<PatternMatch> = PATTERNS
        .iter()
        .filter_map(|(kind, re)| {
            let hits = values
                .iter()
                .filter(|v| re.is_match(v.as_ref().trim()))
                .count();
            let match_rate = hits as f64 / total;
            (hits > 0 && match_rate >= min_rate).then_some(PatternMatch {
                pattern: *kind,
                match_rate,
            })
        })
        .collect();
    found.sort_by(|a, b| {
        b.match_rate
            .total_cmp(&a.match_rate)
            .then(a.pattern.cmp(&b.pattern))
    });
    found
}
