//! Shared helpers for the integration tests: a wiremock search engine and
//! the fully wired pipeline pointed at it.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use wiremock::matchers::{method, path};
use wiremock::{Match, Mock, MockServer, Request, ResponseTemplate};

use sitefinder::batch::CompanyRecord;
use sitefinder::config::{BatchConfig, ScoringConfig};
use sitefinder::driver::BatchDriver;
use sitefinder::fetch::{HttpFetcher, PageFetcher};
use sitefinder::finder::DomainFinder;
use sitefinder::history::HistoryStore;
use sitefinder::logger::{RunLogger, VerbosityLevel};
use sitefinder::output::OutputWriter;
use sitefinder::proxy::ProxyPool;
use sitefinder::rng::SharedRng;
use sitefinder::scorer::ConfidenceScorer;
use sitefinder::search::{GoogleSearchClient, SearchClient};
use sitefinder::whois::WhoisLookup;

/// Matches a search request whose decoded `q` parameter contains a needle.
pub struct QueryContains(pub &'static str);

impl Match for QueryContains {
    fn matches(&self, request: &Request) -> bool {
        request
            .url
            .query_pairs()
            .any(|(key, value)| key == "q" && value.contains(self.0))
    }
}

/// A results page in the shape the extractor expects: styled anchors
/// carrying the engine's `/url?` redirect marker.
pub fn results_page(urls: &[&str]) -> String {
    let anchors: String = urls
        .iter()
        .map(|u| format!(r#"<a class="result" href="{}" ping="/url?sa=t">{}</a>"#, u, u))
        .collect();
    format!("<html><body>{}</body></html>", anchors)
}

/// Serve a results page for every query whose `q` contains `needle`.
pub async fn mount_search(server: &MockServer, needle: &'static str, urls: &[&str]) {
    Mock::given(method("GET"))
        .and(path("/search"))
        .and(QueryContains(needle))
        .respond_with(ResponseTemplate::new(200).set_body_string(results_page(urls)))
        .mount(server)
        .await;
}

/// Serve the engine's no-documents page for every remaining search.
pub async fn mount_no_results_fallback(server: &MockServer) {
    Mock::given(method("GET"))
        .and(path("/search"))
        .respond_with(ResponseTemplate::new(200).set_body_string(
            "<html><body>Your search did not match any documents.</body></html>",
        ))
        .mount(server)
        .await;
}

/// Serve the engine's unusual-traffic interstitial for every search.
pub async fn mount_captcha(server: &MockServer) {
    Mock::given(method("GET"))
        .and(path("/search"))
        .respond_with(ResponseTemplate::new(200).set_body_string(
            "<html><body>Our systems have detected unusual traffic \
             from your computer network.</body></html>",
        ))
        .mount(server)
        .await;
}

pub fn history_path(dir: &Path) -> PathBuf {
    dir.join("history.sqlite")
}

pub fn output_path(dir: &Path) -> PathBuf {
    dir.join("output.csv")
}

/// The full pipeline against the mock engine, quick-accept so candidate
/// scoring needs no traffic beyond the gather searches.
pub fn driver_against(server: &MockServer, dir: &Path, write_output_rows: bool) -> BatchDriver {
    let rng = SharedRng::new(Some(7));
    let fetcher: Arc<dyn PageFetcher> = Arc::new(
        HttpFetcher::new(5, ProxyPool::empty(), rng.clone(), None).unwrap(),
    );

    let search: Arc<dyn SearchClient> = Arc::new(GoogleSearchClient::new(
        Arc::clone(&fetcher),
        server.uri(),
        vec![],
        vec![],
    ));

    let scoring = ScoringConfig {
        minimum_confidence: 500,
        minimum_confidence_to_stop_looking: 1000,
        maximum_tries: 7,
        quick_accept: true,
        suggest_url: format!("{}/suggest?query=", server.uri()),
        social_results: 2,
    };

    let whois = WhoisLookup::new(Arc::clone(&fetcher), rng);
    let scorer = ConfidenceScorer::new(
        Arc::clone(&search),
        fetcher,
        whois,
        ".co.uk".to_string(),
        scoring.suggest_url.clone(),
        scoring.social_results,
    );
    let finder = DomainFinder::new(search, scorer, &scoring);

    let history = HistoryStore::open(&history_path(dir)).unwrap();
    let output = OutputWriter::new(output_path(dir));
    let logger = RunLogger::new(VerbosityLevel::Silent);
    let batch = BatchConfig {
        seconds_between_items: 0,
        maximum_days_to_keep_items: 90,
    };

    BatchDriver::new(finder, history, output, logger, &batch, write_output_rows)
}

/// Second connection onto a driver's history file, for seeding and
/// assertions.
pub fn history(dir: &Path) -> HistoryStore {
    HistoryStore::open(&history_path(dir)).unwrap()
}

pub fn output_lines(dir: &Path) -> Vec<String> {
    std::fs::read_to_string(output_path(dir))
        .unwrap()
        .lines()
        .map(|l| l.to_string())
        .collect()
}

pub fn company(number: &str, name: &str, address: &str) -> CompanyRecord {
    CompanyRecord {
        number: number.to_string(),
        name: name.to_string(),
        date_incorporated: "2010-01-01".to_string(),
        active_directors: "2".to_string(),
        registered_address: address.to_string(),
    }
}

pub fn acme() -> CompanyRecord {
    company(
        "12345678",
        "Acme Widgets Ltd",
        "1 High Street, London, United Kingdom",
    )
}
