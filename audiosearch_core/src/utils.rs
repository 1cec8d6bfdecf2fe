//! Text helpers shared by the site adapters.

use once_cell::sync::Lazy;
use regex::Regex;
use url::Url;

/// Amount directly followed by a currency marker ("1 234 kr", "12.500:-").
static PRICE_WITH_UNIT: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)(\d{1,3}(?:[ \u{a0}.]\d{3})+|\d+)(?:,(\d{1,2}))?\s*(?:kr\b|sek\b|:-)")
        .unwrap()
});

/// Any amount, with optional thousands separators and decimal comma.
static BARE_NUMBER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(\d{1,3}(?:[ \u{a0}.]\d{3})+|\d+)(?:,(\d{1,2}))?").unwrap());

/// Extract a price from free text.
///
/// Prefers an amount tagged with `kr`, `SEK` or `:-`; falls back to the first
/// number. Dots and spaces are thousands separators, a comma starts decimals.
/// Zero is treated as "no price".
pub fn extract_price(text: &str) -> Option<f64> {
    let caps = PRICE_WITH_UNIT
        .captures(text)
        .or_else(|| BARE_NUMBER.captures(text))?;

    let whole: String = caps[1].chars().filter(|c| c.is_ascii_digit()).collect();
    if whole.is_empty() {
        return None;
    }
    let mut amount: f64 = whole.parse().ok()?;
    if let Some(frac) = caps.get(2) {
        let frac_value: f64 = frac.as_str().parse().ok()?;
        amount += frac_value / 10f64.powi(frac.as_str().len() as i32);
    }

    (amount > 0.0).then_some(amount)
}

/// Only the price-with-currency form, for scanning whole cards of text
/// where a bare number is more likely a model number than a price.
pub fn extract_tagged_price(text: &str) -> Option<f64> {
    if PRICE_WITH_UNIT.is_match(text) {
        extract_price(text)
    } else {
        None
    }
}

/// Lowercased alphanumeric words of `text`.
pub fn word_tokens(text: &str) -> Vec<String> {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|w| !w.is_empty())
        .map(|w| w.to_lowercase())
        .collect()
}

/// True when every word of every term occurs as a whole word in `haystack`.
///
/// "h90" matches "Hegel H90 Integrated" but not "H900".
pub fn matches_all_terms(haystack: &str, terms: &[String]) -> bool {
    let words = word_tokens(haystack);
    terms
        .iter()
        .flat_map(|term| word_tokens(term))
        .all(|needle| words.iter().any(|w| *w == needle))
}

/// Resolve `href` against the site base URL. Unresolvable input is returned as-is.
pub fn normalize_url(base: &Url, href: &str) -> String {
    let href = href.trim();
    base.join(href)
        .map(|u| u.to_string())
        .unwrap_or_else(|_| href.to_string())
}

/// Collapse runs of whitespace into single spaces.
pub fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Truncate on a character boundary, appending "..." when shortened.
pub fn truncate_chars(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        text.to_string()
    } else {
        let cut: String = text.chars().take(max_chars).collect();
        format!("{}...", cut.trim_end())
    }
}
