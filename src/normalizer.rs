//! Company Name Normalization
//!
//! Turns raw registry names into comparable token sequences:
//! - Legal suffixes dropped as whole tokens: Limited, Ltd, LLC, Inc, Incorporated
//! - Ampersand variations: "A & B" -> "a and b"
//! - Punctuation/case folded before tokenizing
//! - Abbreviation variant: Systems -> sys, Company -> co, etc.
//! - Initialism variant: "Acme Widget Works" -> "a w w" (needs >= 2 tokens)
//!
//! Also provides the longest-prefix-run matcher used to compare token
//! sequences against domains and page titles.

use tracing::debug;

/// Legal-entity suffix tokens removed during tokenization.
const LEGAL_SUFFIXES: &[&str] = &["limited", "ltd", "llc", "inc", "incorporated"];

/// Tokens that pass through the initials variant unchanged.
const INITIALS_PASSTHROUGH: &[&str] = &["and", "&", "the", "of", "if", "by", "to"];

/// Token-wise synonym table for the abbreviation variant.
/// Longer spellings first so "systems" wins over "system".
const ABBREVIATIONS: &[(&str, &str)] = &[
    ("associations", "assoc"),
    ("association", "assoc"),
    ("corporation", "corp"),
    ("incorporated", "inc"),
    ("technologies", "tech"),
    ("technology", "tech"),
    ("systems", "sys"),
    ("system", "sys"),
    ("services", "serv"),
    ("service", "serv"),
    ("company", "co"),
    ("limited", "ltd"),
];

/// Tokenize a company name: lower-case, "&" -> "and", split on non-word
/// characters, drop legal suffix tokens.
pub fn words_in_name(name: &str) -> Vec<String> {
    let lowered = name.trim().to_lowercase().replace('&', " and ");

    lowered
        .split(|c: char| !c.is_alphanumeric() && c != '_')
        .filter(|t| !t.is_empty())
        .filter(|t| !LEGAL_SUFFIXES.contains(t))
        .map(|t| t.to_string())
        .collect()
}

/// The tokenized name rejoined with spaces. Used for title/whois/API checks.
pub fn filtered_name(name: &str) -> String {
    words_in_name(name).join(" ")
}

/// Apply the abbreviation synonym table token-wise.
pub fn abbreviate(tokens: &[String]) -> Vec<String> {
    tokens
        .iter()
        .map(|token| {
            for (long, short) in ABBREVIATIONS {
                if token == long {
                    return short.to_string();
                }
            }
            token.clone()
        })
        .collect()
}

/// Map each token to its first character; passthrough tokens stay whole.
/// Returns None for fewer than 2 tokens: a single-token initialism is
/// just one letter and matches almost anything.
pub fn initials(tokens: &[String]) -> Option<Vec<String>> {
    if tokens.len() < 2 {
        debug!("Skipping initials variant: only {} token(s)", tokens.len());
        return None;
    }

    Some(
        tokens
            .iter()
            .map(|token| {
                if INITIALS_PASSTHROUGH.contains(&token.as_str()) {
                    token.clone()
                } else {
                    token.chars().take(1).collect()
                }
            })
            .collect(),
    )
}

/// Longest contiguous prefix run of `tokens` found in `haystack`.
///
/// Joins `tokens[..k]` with `join` and looks for it in `haystack`
/// (case-insensitive), trying k from the full length downwards and stopping
/// at the first hit. With `anchored` the joined run must be a prefix of the
/// haystack rather than appear anywhere. Empty input yields 0.
pub fn longest_run(tokens: &[String], haystack: &str, join: &str, anchored: bool) -> usize {
    let haystack = haystack.to_lowercase();

    for k in (1..=tokens.len()).rev() {
        let joined = tokens[..k].join(join);

        let hit = if anchored {
            haystack.starts_with(&joined)
        } else {
            haystack.contains(&joined)
        };

        if hit {
            return k;
        }
    }

    0
}

/// Best run over every start offset: for each i, the longest run of
/// `tokens[i..]` in `haystack`, keeping the maximum. Lets "widgets" in
/// "acme widgets ltd" still match the domain "widgets.co.uk".
pub fn best_run_at_any_offset(tokens: &[String], haystack: &str, join: &str) -> usize {
    let mut best = 0;

    for i in 0..tokens.len() {
        let run = longest_run(&tokens[i..], haystack, join, false);
        if run > best {
            best = run;
        }
    }

    best
}
