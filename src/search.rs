//! Search-engine result retrieval.
//!
//! Issues one query against the engine's HTML endpoint and extracts result
//! URLs. Three outcomes are kept apart on purpose:
//! - `Results`: the ordered candidate URLs (possibly empty after filtering)
//! - `NoResults`: the engine explicitly said nothing matched
//! - `Err(Captcha | Transient)`: retry-later conditions; the caller must
//!   abandon the current company, never record "no match"
//!
//! Engine pages, directory sites and configured block-lists are filtered out
//! of the results.

use async_trait::async_trait;
use once_cell::sync::Lazy;
use scraper::{Html, Selector};
use std::sync::Arc;
use thiserror::Error;
use tracing::debug;

use crate::domain_utils;
use crate::fetch::PageFetcher;

// Compiled once; the selector string is a compile-time constant.
static ANCHOR_SELECTOR: Lazy<Selector> = Lazy::new(|| Selector::parse("a").unwrap());

/// Engine interstitial text shown when requests look automated.
const CAPTCHA_MARKER: &str = "detected unusual traffic from your computer network.";

/// Engine text for a query with no hits.
const NO_RESULTS_MARKER: &str = "did not match any documents";

/// URL substrings that mark engine-internal links, always rejected.
const ENGINE_AVOID_PATTERNS: &[&str] = &["webcache.googleusercontent.com", "google."];

/// Directory, registry and social sites that outrank small companies' own
/// sites but are never the companies' own sites.
const DIRECTORY_DOMAINS: &[&str] = &[
    "facebook.com",
    "instagram.com",
    "twitter.com",
    "linkedin.com",
    "youtube.com",
    "wikipedia.org",
    "companieshouse.gov.uk",
    "endole.co.uk",
    "duedil.com",
    "companycheck.co.uk",
    "bizdb.co.uk",
    "opencorporates.com",
    "192.com",
    "yell.com",
    "thomsonlocal.com",
];

#[derive(Error, Debug)]
pub enum SearchError {
    #[error("Search engine presented a captcha")]
    Captcha,

    #[error("Search request failed: {0}")]
    Transient(String),
}

/// What a completed search produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SearchOutcome {
    /// Ordered result URLs after filtering; may be empty.
    Results(Vec<String>),
    /// The engine explicitly reported no documents for the query.
    NoResults,
}

/// The search capability the ranker and scorer depend on.
#[async_trait]
pub trait SearchClient: Send + Sync {
    /// Run one query. `accept_all` lifts the directory/block-list filters
    /// (used for `site:` checks that target those very sites);
    /// `extra_avoid` carries the caller's per-company rejected domains.
    async fn search(
        &self,
        query: &str,
        max_results: usize,
        accept_all: bool,
        extra_avoid: &[String],
    ) -> Result<SearchOutcome, SearchError>;
}

/// HTML-scraping client for a Google-style results page.
pub struct GoogleSearchClient {
    fetcher: Arc<dyn PageFetcher>,
    base_url: String,
    user_avoid_patterns: Vec<String>,
    user_avoid_domains: Vec<String>,
}

impl GoogleSearchClient {
    pub fn new(
        fetcher: Arc<dyn PageFetcher>,
        base_url: String,
        user_avoid_patterns: Vec<String>,
        user_avoid_domains: Vec<String>,
    ) -> Self {
        Self {
            fetcher,
            base_url: base_url.trim_end_matches('/').to_string(),
            user_avoid_patterns,
            user_avoid_domains: user_avoid_domains
                .into_iter()
                .map(|d| d.to_lowercase())
                .collect(),
        }
    }

    fn should_avoid(&self, url: &str, accept_all: bool, extra_avoid: &[String]) -> bool {
        if url.is_empty() {
            return true;
        }

        // Relative hrefs are engine-internal links
        if !url.starts_with("http:") && !url.starts_with("https:") {
            return true;
        }

        if ENGINE_AVOID_PATTERNS.iter().any(|p| url.contains(p)) {
            return true;
        }

        if accept_all {
            return false;
        }

        if self.user_avoid_patterns.iter().any(|p| !p.is_empty() && url.contains(p.as_str())) {
            return true;
        }

        let domain = domain_utils::domain_name(url);

        DIRECTORY_DOMAINS.contains(&domain.as_str())
            || self.user_avoid_domains.iter().any(|d| d == &domain)
            || extra_avoid.iter().any(|d| d.eq_ignore_ascii_case(&domain))
    }

    /// Pull result URLs out of the page. Two passes, mirroring how result
    /// anchors appear: styled anchors first, then any anchor carrying the
    /// engine's `/url?` redirect in href or ping.
    fn extract_results(
        &self,
        page: &str,
        max_results: usize,
        accept_all: bool,
        extra_avoid: &[String],
    ) -> Vec<String> {
        let document = Html::parse_document(page);

        let mut results = Vec::new();

        for require_class in [true, false] {
            for element in document.select(&ANCHOR_SELECTOR) {
                if require_class && element.value().attr("class").is_none() {
                    continue;
                }

                let href = element.value().attr("href").unwrap_or("");
                let ping = element.value().attr("ping").unwrap_or("");

                if !href.contains("/url?") && !ping.contains("/url?") {
                    continue;
                }

                if self.should_avoid(href, accept_all, extra_avoid) {
                    continue;
                }

                // The second pass revisits anchors the first already took
                if results.iter().any(|r| r == href) {
                    continue;
                }

                results.push(href.to_string());

                if results.len() >= max_results {
                    return results;
                }
            }
        }

        results
    }
}

#[async_trait]
impl SearchClient for GoogleSearchClient {
    async fn search(
        &self,
        query: &str,
        max_results: usize,
        accept_all: bool,
        extra_avoid: &[String],
    ) -> Result<SearchOutcome, SearchError> {
        let url = format!("{}/search?q={}", self.base_url, urlencoding::encode(query));

        let page = self
            .fetcher
            .fetch_text(&url)
            .await
            .map_err(|e| SearchError::Transient(e.to_string()))?;

        if page.contains(CAPTCHA_MARKER) {
            debug!("Captcha page returned for query: {}", query);
            return Err(SearchError::Captcha);
        }

        if page.contains(NO_RESULTS_MARKER) {
            debug!("No search results for: {}", query);
            return Ok(SearchOutcome::NoResults);
        }

        let results = self.extract_results(&page, max_results, accept_all, extra_avoid);
        debug!("Query '{}' produced {} result(s)", query, results.len());

        Ok(SearchOutcome::Results(results))
    }
}
