//! Search query construction.
//!
//! Builds the fallback ladder of queries for one company:
//! 1. quoted core of the name + address hint + negative site filters
//! 2. raw name + address hint + negative site filters
//! 3. raw name alone
//!
//! The quoted core puts the distinguishing part of the name in quotes so the
//! engine phrase-matches it, leaving legal suffixes and parenthetical
//! clarifiers outside.

/// A quote is inserted directly before the earliest of these.
const QUOTE_STOPS: &[&str] = &[" limited", " ltd", " llc", " inc", " incorporated", " (", "("];

/// Address text is cut at the first of these jurisdiction tokens.
const JURISDICTION_TOKENS: &[&str] = &["united kingdom", "england", "u.k.", "uk"];

/// Registry and social-network sites excluded from the first two query
/// variants; their pages outrank small companies' own sites.
const NEGATIVE_SITE_FILTERS: &[&str] = &[
    "companieshouse.gov.uk",
    "endole.co.uk",
    "duedil.com",
    "192.com",
    "yell.com",
    "facebook.com",
    "linkedin.com",
    "twitter.com",
    "instagram.com",
];

/// Earliest byte position in `text` where any of `needles` occurs,
/// compared ASCII-case-insensitively. Needles are ASCII.
fn earliest_occurrence(text: &str, needles: &[&str]) -> Option<usize> {
    let mut earliest: Option<usize> = None;

    for needle in needles {
        let mut i = 0;
        while i + needle.len() <= text.len() {
            if text.is_char_boundary(i) && text.is_char_boundary(i + needle.len()) {
                if text[i..i + needle.len()].eq_ignore_ascii_case(needle) {
                    if earliest.map_or(true, |e| i < e) {
                        earliest = Some(i);
                    }
                    break;
                }
            }
            i += 1;
        }
    }

    earliest
}

/// Quote the core of a company name: `Acme Widgets Ltd (UK)` becomes
/// `"Acme Widgets" Ltd (UK)`. Original case is preserved. Without any
/// stop-string the whole name is quoted.
pub fn quoted_core_query(name: &str) -> String {
    let name = name.trim();

    match earliest_occurrence(name, QUOTE_STOPS) {
        Some(0) | None => format!("\"{}\"", name),
        Some(pos) => format!("\"{}\"{}", &name[..pos], &name[pos..]),
    }
}

/// Reduce a registered address to a search hint: drop a "c/o" prefix up to
/// the first ", ", cut at the first jurisdiction token, trim trailing
/// commas and whitespace.
pub fn address_hint(address: &str) -> String {
    let mut hint = address.trim();

    if hint.to_lowercase().contains("c/o") {
        if let Some(pos) = hint.find(", ") {
            hint = &hint[pos + 2..];
        }
    }

    let mut hint = hint.to_string();
    if let Some(pos) = earliest_word_occurrence(&hint, JURISDICTION_TOKENS) {
        hint.truncate(pos);
    }

    hint.trim_end_matches([',', ' ']).to_string()
}

/// Like `earliest_occurrence` but the match must be a standalone word:
/// bounded by non-alphanumeric characters or the ends of the text.
fn earliest_word_occurrence(text: &str, needles: &[&str]) -> Option<usize> {
    let mut earliest: Option<usize> = None;

    for needle in needles {
        let mut i = 0;
        while i + needle.len() <= text.len() {
            if !text.is_char_boundary(i) || !text.is_char_boundary(i + needle.len()) {
                i += 1;
                continue;
            }
            if text[i..i + needle.len()].eq_ignore_ascii_case(needle) {
                let before_ok = i == 0
                    || text[..i]
                        .chars()
                        .next_back()
                        .map_or(true, |c| !c.is_alphanumeric());
                let after_ok = text[i + needle.len()..]
                    .chars()
                    .next()
                    .map_or(true, |c| !c.is_alphanumeric());

                if before_ok && after_ok {
                    if earliest.map_or(true, |e| i < e) {
                        earliest = Some(i);
                    }
                    break;
                }
            }
            i += 1;
        }
    }

    earliest
}

/// The ordered query ladder for one company. Later entries are only issued
/// when earlier ones contribute nothing new.
pub fn query_variants(name: &str, address: &str) -> Vec<String> {
    let name = name.trim();
    let hint = address_hint(address);
    let filters = negative_filters();

    let mut variants = Vec::with_capacity(3);

    let mut first = quoted_core_query(name);
    if !hint.is_empty() {
        first.push(' ');
        first.push_str(&hint);
    }
    first.push(' ');
    first.push_str(&filters);
    variants.push(first);

    let mut second = name.to_string();
    if !hint.is_empty() {
        second.push(' ');
        second.push_str(&hint);
    }
    second.push(' ');
    second.push_str(&filters);
    variants.push(second);

    variants.push(name.to_string());

    variants
}

fn negative_filters() -> String {
    NEGATIVE_SITE_FILTERS
        .iter()
        .map(|d| format!("-site:{}", d))
        .collect::<Vec<_>>()
        .join(" ")
}
