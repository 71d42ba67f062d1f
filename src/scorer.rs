//! Weighted confidence scoring for one candidate website.
//!
//! Every check reports an awarded/possible pair into a fresh [`ScoreState`]:
//! possible points accrue on every check, awarded points only on a pass.
//! The quick tier runs the two checks that need no extra network fan-out
//! (preferred suffix, name-vs-domain); the detailed tier adds the address,
//! WHOIS, social-profile, page-title and autocomplete checks, each of which
//! costs its own request or search.

use std::sync::Arc;

use once_cell::sync::Lazy;
use scraper::{Html, Selector};
use serde::Deserialize;
use thiserror::Error;
use tracing::{debug, info};

use crate::batch::CompanyRecord;
use crate::domain_utils::{bare_domain, domain_name, main_part};
use crate::fetch::PageFetcher;
use crate::normalizer::{
    abbreviate, best_run_at_any_offset, filtered_name, initials, longest_run, words_in_name,
};
use crate::query::address_hint;
use crate::search::{SearchClient, SearchError, SearchOutcome};
use crate::whois::WhoisLookup;

const WEIGHT_PREFERRED_DOMAIN: i64 = 200;
const WEIGHT_NAME_EXACT: i64 = 500;
const WEIGHT_NAME_PARTIAL_PER_TOKEN: i64 = 300;
const WEIGHT_ADDRESS: i64 = 250;
const WEIGHT_WHOIS: i64 = 300;
const WEIGHT_SOCIAL: i64 = 300;
const WEIGHT_TITLE_EXACT: i64 = 200;
const WEIGHT_TITLE_EXACT_FLAG: i64 = 200;
const WEIGHT_TITLE_PER_TOKEN: i64 = 100;
const WEIGHT_TITLE_ALL_WORDS_BONUS: i64 = 100;
const WEIGHT_SUGGEST: i64 = 175;

const SOCIAL_SITES: [&str; 3] = ["facebook.com", "instagram.com", "twitter.com"];

// Compiled once; the selector string is a compile-time constant.
static TITLE_SELECTOR: Lazy<Selector> = Lazy::new(|| Selector::parse("title").unwrap());

#[derive(Error, Debug, PartialEq, Eq)]
pub enum ScoreError {
    /// The search engine started serving CAPTCHA pages mid-scoring. The
    /// whole company must be deferred and retried on a later sweep.
    #[error("Search engine presented a captcha")]
    Captcha,
}

/// Accumulated outcome of one (company, candidate) evaluation.
///
/// Created fresh per evaluation and returned by value; nothing here is
/// shared between candidates.
#[derive(Debug, Clone)]
pub struct ScoreState {
    /// Candidate domain the checks ran against.
    pub domain: String,
    pub confidence: i64,
    pub maximum_possible: i64,
    pub tests_passed: u32,
    pub tests_total: u32,
    /// One human-readable line per check, prefixed `passed:`/`failed:`.
    pub audit: Vec<String>,
}

impl ScoreState {
    fn new(domain: &str) -> Self {
        Self {
            domain: domain.to_string(),
            confidence: 0,
            maximum_possible: 0,
            tests_passed: 0,
            tests_total: 0,
            audit: Vec::new(),
        }
    }

    /// Record one check. Possible points always accrue so the maximum
    /// stays comparable across candidates; awarded points only on a pass.
    fn add(&mut self, awarded: i64, possible: i64, detail: String, summary: &str) {
        self.maximum_possible += possible;
        self.tests_total += 1;

        let outcome = if awarded > 0 {
            self.tests_passed += 1;
            self.confidence += awarded;
            debug!(
                "Confidence: {} out of {}. Added {}. Passed: {}",
                self.confidence, self.maximum_possible, awarded, detail
            );
            "passed"
        } else {
            debug!(
                "Confidence: {} out of {}. Failed: {}",
                self.confidence, self.maximum_possible, detail
            );
            "failed"
        };

        info!(
            "Domain: {}. Tests passed: {} of {}. Test {}: {}.",
            self.domain, self.tests_passed, self.tests_total, outcome, summary
        );

        self.audit.push(format!("{outcome}: {detail}"));
    }
}

/// Runs the check battery against one candidate URL.
pub struct ConfidenceScorer {
    search: Arc<dyn SearchClient>,
    fetcher: Arc<dyn PageFetcher>,
    whois: WhoisLookup,
    preferred_domain: String,
    suggest_url: String,
    social_results: usize,
}

impl ConfidenceScorer {
    pub fn new(
        search: Arc<dyn SearchClient>,
        fetcher: Arc<dyn PageFetcher>,
        whois: WhoisLookup,
        preferred_domain: String,
        suggest_url: String,
        social_results: usize,
    ) -> Self {
        Self {
            search,
            fetcher,
            whois,
            preferred_domain,
            suggest_url,
            social_results,
        }
    }

    /// Score `url` as a potential official website for `record`.
    ///
    /// `detailed: false` stops after the two cheap checks. A CAPTCHA on any
    /// in-scoring search aborts the evaluation; transient failures make the
    /// affected check score zero and the battery continues.
    pub async fn measure(
        &self,
        record: &CompanyRecord,
        url: &str,
        detailed: bool,
    ) -> Result<ScoreState, ScoreError> {
        let domain = domain_name(url);
        let bare = bare_domain(&domain);
        let origin = main_part(url);

        let basic_name = record.name.trim().to_lowercase();
        let filtered = filtered_name(&record.name);

        let mut state = ScoreState::new(&domain);

        self.check_preferred_domain(&mut state, &domain);
        self.check_name_in_domain(&mut state, &record.name, &bare);

        if !detailed {
            return Ok(state);
        }

        self.check_address_on_site(&mut state, record, &domain, url)
            .await?;
        self.check_whois(&mut state, &domain, &filtered).await;

        for social in SOCIAL_SITES {
            self.check_social_profile(&mut state, social, &basic_name, &origin)
                .await?;
        }

        self.check_title(&mut state, url, &filtered, &record.name)
            .await;
        self.check_suggestion(&mut state, &filtered, &domain).await;

        Ok(state)
    }

    fn check_preferred_domain(&self, state: &mut ScoreState, domain: &str) {
        let mut score = 0;
        if !self.preferred_domain.is_empty() && domain.ends_with(&self.preferred_domain) {
            score = WEIGHT_PREFERRED_DOMAIN;
        }

        state.add(
            score,
            WEIGHT_PREFERRED_DOMAIN,
            format!("The domain ends in {}.", self.preferred_domain),
            &format!("domain ends in {}", self.preferred_domain),
        );
    }

    /// Compare the name against the first label of the domain. An exact
    /// concatenated match wins outright; otherwise the best token run over
    /// the regular, abbreviated and initials spellings scores per token.
    /// The initials spelling must match at the very start of the label and
    /// cover at least two tokens.
    fn check_name_in_domain(&self, state: &mut ScoreState, name: &str, bare: &str) {
        let words = words_in_name(name);
        let display_name = name.trim().to_lowercase();

        let exact = !words.is_empty() && words.concat() == bare;
        let score = if exact { WEIGHT_NAME_EXACT } else { 0 };
        state.add(
            score,
            WEIGHT_NAME_EXACT,
            "All words match.".to_string(),
            "domain matches company name",
        );

        if exact {
            return;
        }

        let regular = best_run_at_any_offset(&words, bare, "");
        let abbreviated = best_run_at_any_offset(&abbreviate(&words), bare, "");
        let initialed = match initials(&words) {
            Some(letters) => {
                let run = longest_run(&letters, bare, "", true);
                if run >= 2 {
                    run
                } else {
                    0
                }
            }
            None => 0,
        };

        let best = regular.max(abbreviated).max(initialed);

        state.add(
            best as i64 * WEIGHT_NAME_PARTIAL_PER_TOKEN,
            words.len() as i64 * WEIGHT_NAME_PARTIAL_PER_TOKEN,
            format!(
                "{} has {} out of {} words in a row the same as {}.",
                bare,
                best,
                words.len(),
                display_name
            ),
            "domain similar to company name",
        );
    }

    async fn check_address_on_site(
        &self,
        state: &mut ScoreState,
        record: &CompanyRecord,
        domain: &str,
        url: &str,
    ) -> Result<(), ScoreError> {
        let hint = address_hint(&record.registered_address);

        let mut score = 0;
        if !hint.is_empty() {
            let query = format!("site:{domain} {hint}");
            match self.search.search(&query, 1, false, &[]).await {
                Ok(SearchOutcome::Results(results)) if !results.is_empty() => {
                    score = WEIGHT_ADDRESS;
                }
                Ok(_) => {}
                Err(SearchError::Captcha) => return Err(ScoreError::Captcha),
                Err(SearchError::Transient(reason)) => {
                    debug!("Address search for {domain} failed: {reason}");
                }
            }
        }

        state.add(
            score,
            WEIGHT_ADDRESS,
            format!("The registered address appears on {url}."),
            "address on website",
        );

        Ok(())
    }

    async fn check_whois(&self, state: &mut ScoreState, domain: &str, filtered: &str) {
        let found = self.whois.name_appears(domain, filtered).await;
        let score = if found { WEIGHT_WHOIS } else { 0 };

        state.add(
            score,
            WEIGHT_WHOIS,
            format!("The whois record for {domain} contains {filtered}."),
            "whois",
        );
    }

    /// Look for a profile on `social` that links back to the candidate.
    /// The search runs with `accept_all` because the wanted results live on
    /// a site the avoid lists would normally drop.
    async fn check_social_profile(
        &self,
        state: &mut ScoreState,
        social: &str,
        basic_name: &str,
        origin: &str,
    ) -> Result<(), ScoreError> {
        debug!("Checking {social}");

        let query = format!("site:{social} {basic_name} {origin}");
        let urls = match self
            .search
            .search(&query, self.social_results, true, &[])
            .await
        {
            Ok(SearchOutcome::Results(urls)) => urls,
            Ok(SearchOutcome::NoResults) => Vec::new(),
            Err(SearchError::Captcha) => return Err(ScoreError::Captcha),
            Err(SearchError::Transient(reason)) => {
                debug!("Search on {social} failed: {reason}");
                Vec::new()
            }
        };

        let needle = origin.to_lowercase();
        let mut matching_url = String::new();
        let mut score = 0;

        for candidate in urls {
            match self.fetcher.fetch_text(&candidate).await {
                Ok(page) if page.to_lowercase().contains(&needle) => {
                    matching_url = candidate;
                    score = WEIGHT_SOCIAL;
                    break;
                }
                Ok(_) => {}
                Err(e) => debug!("Could not fetch {candidate}: {e}"),
            }
        }

        state.add(
            score,
            WEIGHT_SOCIAL,
            format!(
                "The company's page on {social} seems to be {matching_url} and it contains {origin}."
            ),
            &format!("{social} page"),
        );

        Ok(())
    }

    async fn check_title(&self, state: &mut ScoreState, url: &str, filtered: &str, name: &str) {
        let page = match self.fetcher.fetch_text(url).await {
            Ok(page) => page,
            Err(e) => {
                debug!("Could not fetch {url}: {e}");
                String::new()
            }
        };

        let title = extract_title(&page);

        if !filtered.is_empty() && title.to_lowercase().contains(filtered) {
            state.add(
                WEIGHT_TITLE_EXACT,
                WEIGHT_TITLE_EXACT,
                format!("Found {filtered} in title of {url}."),
                "website title",
            );
            state.add(
                WEIGHT_TITLE_EXACT_FLAG,
                WEIGHT_TITLE_EXACT_FLAG,
                format!("The title of {url} matches the full company name."),
                "website title",
            );
            return;
        }

        let words = words_in_name(name);
        let run = longest_run(&words, &title, " ", false);

        state.add(
            run as i64 * WEIGHT_TITLE_PER_TOKEN,
            words.len() as i64 * WEIGHT_TITLE_PER_TOKEN,
            format!(
                "The title of {url} has {run} out of {} words in a row the same as {filtered}. Title: {title}.",
                words.len()
            ),
            "website title",
        );

        let bonus = if words.len() >= 2 && run == words.len() {
            WEIGHT_TITLE_ALL_WORDS_BONUS
        } else {
            0
        };
        state.add(
            bonus,
            WEIGHT_TITLE_ALL_WORDS_BONUS,
            "All words in website title match.".to_string(),
            "website title",
        );
    }

    /// Cross-check against an external company-autocomplete service: pass
    /// when its top suggestion names the candidate domain.
    async fn check_suggestion(&self, state: &mut ScoreState, filtered: &str, domain: &str) {
        let mut score = 0;

        if !filtered.is_empty() && !self.suggest_url.is_empty() {
            let url = format!("{}{}", self.suggest_url, urlencoding::encode(filtered));
            match self.fetcher.fetch_text(&url).await {
                Ok(body) => match serde_json::from_str::<Vec<Suggestion>>(&body) {
                    Ok(suggestions) => {
                        if let Some(first) = suggestions.first() {
                            if first.domain.eq_ignore_ascii_case(domain) {
                                score = WEIGHT_SUGGEST;
                            }
                        }
                    }
                    Err(e) => debug!("Could not parse suggestions for {filtered}: {e}"),
                },
                Err(e) => debug!("Could not fetch {url}: {e}"),
            }
        }

        state.add(
            score,
            WEIGHT_SUGGEST,
            "The domain from the search engine matches the domain from another service."
                .to_string(),
            "autocomplete",
        );
    }
}

#[derive(Debug, Deserialize)]
struct Suggestion {
    #[serde(default)]
    domain: String,
}

fn extract_title(page: &str) -> String {
    let document = Html::parse_document(page);
    document
        .select(&TITLE_SELECTOR)
        .next()
        .map(|el| el.text().collect::<String>().trim().to_string())
        .unwrap_or_default()
}
