//! Candidate ranking: turns search results for one company into a single
//! chosen website, or decides there is none.
//!
//! Flow per company: issue the query-variant ladder, quick-score each
//! distinct candidate domain, detail-score the ones that qualify, and keep
//! the best strictly-improving confidence until it reaches the stop ceiling
//! or the try budget runs out. A CAPTCHA or failing search defers the whole
//! company for a later sweep instead of recording "no website".

use std::sync::Arc;

use tracing::{debug, error, info};

use crate::batch::CompanyRecord;
use crate::config::ScoringConfig;
use crate::domain_utils::{domain_name, main_part};
use crate::query::query_variants;
use crate::scorer::{ConfidenceScorer, ScoreError, ScoreState};
use crate::search::{SearchClient, SearchError, SearchOutcome};

/// Durable answer for one company.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FinderResult {
    /// Origin URL of the chosen site, or `"none"`.
    pub url: String,
    pub confidence: i64,
    pub maximum_possible: i64,
}

impl FinderResult {
    /// The recorded no-website-found value.
    pub fn none() -> Self {
        Self {
            url: "none".to_string(),
            confidence: 0,
            maximum_possible: -1,
        }
    }

    pub fn is_unresolved(&self) -> bool {
        self.url == "none"
    }
}

/// Per-company verdict for one sweep.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FindOutcome {
    /// Either a website or the none sentinel; both are persisted and the
    /// company is permanently done.
    Resolved(FinderResult),
    /// Blocked by a CAPTCHA or a failing search. Nothing is persisted; a
    /// later sweep retries the company from scratch.
    Deferred(String),
}

pub struct DomainFinder {
    search: Arc<dyn SearchClient>,
    scorer: ConfidenceScorer,
    minimum_confidence: i64,
    stop_confidence: i64,
    maximum_tries: usize,
    quick_accept: bool,
}

impl DomainFinder {
    pub fn new(
        search: Arc<dyn SearchClient>,
        scorer: ConfidenceScorer,
        scoring: &ScoringConfig,
    ) -> Self {
        Self {
            search,
            scorer,
            minimum_confidence: scoring.minimum_confidence,
            stop_confidence: scoring.minimum_confidence_to_stop_looking,
            maximum_tries: scoring.maximum_tries,
            quick_accept: scoring.quick_accept,
        }
    }

    /// Resolve one company to its official website.
    pub async fn find(&self, record: &CompanyRecord) -> FindOutcome {
        let mut best: Option<(String, ScoreState)> = None;
        let mut seen_urls: Vec<String> = Vec::new();
        let mut rejected_domains: Vec<String> = Vec::new();
        let mut previous_domain = String::new();
        let mut attempts = 0usize;

        'variants: for variant in query_variants(&record.name, &record.registered_address) {
            let outcome = match self
                .search
                .search(&variant, self.maximum_tries, false, &rejected_domains)
                .await
            {
                Ok(outcome) => outcome,
                Err(SearchError::Captcha) => {
                    info!("Skipping this item. Captcha during search.");
                    return FindOutcome::Deferred("captcha during search".to_string());
                }
                Err(SearchError::Transient(reason)) => {
                    return FindOutcome::Deferred(format!("search failed: {reason}"));
                }
            };

            let urls = match outcome {
                SearchOutcome::Results(urls) => urls,
                SearchOutcome::NoResults => {
                    error!("No search results for: {variant}");
                    continue;
                }
            };

            // First-seen order across variants; an URL counts once.
            let fresh: Vec<String> = urls
                .into_iter()
                .filter(|u| !seen_urls.contains(u))
                .collect();
            if fresh.is_empty() {
                continue;
            }
            seen_urls.extend(fresh.iter().cloned());

            for url in fresh {
                if attempts >= self.maximum_tries {
                    break 'variants;
                }

                let domain = domain_name(&url);
                if domain == previous_domain {
                    continue;
                }
                previous_domain = domain.clone();

                attempts += 1;
                debug!(
                    "Trying candidate {} of {}: {}",
                    attempts, self.maximum_tries, domain
                );

                let quick = match self.scorer.measure(record, &url, false).await {
                    Ok(state) => state,
                    Err(ScoreError::Captcha) => return self.deferred_by_captcha(),
                };

                if quick.confidence < self.minimum_confidence {
                    self.reject(&quick, attempts, &mut rejected_domains, domain);
                    continue;
                }

                if self.quick_accept {
                    return FindOutcome::Resolved(self.resolved(record, &url, &quick));
                }

                let detailed = match self.scorer.measure(record, &url, true).await {
                    Ok(state) => state,
                    Err(ScoreError::Captcha) => return self.deferred_by_captcha(),
                };

                if detailed.confidence < self.minimum_confidence {
                    self.reject(&detailed, attempts, &mut rejected_domains, domain);
                    continue;
                }

                let improved = match &best {
                    Some((_, current)) => detailed.confidence > current.confidence,
                    None => true,
                };
                if improved {
                    best = Some((url, detailed));
                }

                if let Some((_, state)) = &best {
                    if state.confidence >= self.stop_confidence {
                        break 'variants;
                    }
                }
            }

            // A qualifying candidate ends the ladder; the remaining
            // variants exist only to keep an empty run going.
            if best.is_some() {
                break;
            }
        }

        match best {
            Some((url, state)) => FindOutcome::Resolved(self.resolved(record, &url, &state)),
            None => FindOutcome::Resolved(FinderResult::none()),
        }
    }

    fn deferred_by_captcha(&self) -> FindOutcome {
        info!("Skipping this item. Captcha while scoring.");
        FindOutcome::Deferred("captcha while scoring".to_string())
    }

    fn reject(
        &self,
        state: &ScoreState,
        attempts: usize,
        rejected_domains: &mut Vec<String>,
        domain: String,
    ) {
        info!(
            "Confidence is only {}. Trying next candidate. On {} of {}.",
            state.confidence, attempts, self.maximum_tries
        );
        rejected_domains.push(domain);
    }

    fn resolved(&self, record: &CompanyRecord, url: &str, state: &ScoreState) -> FinderResult {
        info!(
            "Result for {}: {}. Confidence {} out of {}.",
            record.name, state.domain, state.confidence, state.maximum_possible
        );

        FinderResult {
            url: main_part(url),
            confidence: state.confidence,
            maximum_possible: state.maximum_possible,
        }
    }
}
