//! Batch run loop: works through the company list in repeated passes until
//! every item is done.
//!
//! A pass touches each item once. Items already present in history are
//! counted done without any network traffic, so an interrupted run picks up
//! exactly where it stopped. Deferred items (CAPTCHA, failing searches) and
//! rows without a company name stay undone and come back on the next pass.
//!
//! Sharded workers write history only; `combine` merges history rows for
//! the full input into the output file afterwards.

use std::time::Duration;

use anyhow::Result;
use tracing::debug;

use crate::batch::CompanyRecord;
use crate::config::BatchConfig;
use crate::finder::{DomainFinder, FindOutcome, FinderResult};
use crate::history::HistoryStore;
use crate::logger::RunLogger;
use crate::output::OutputWriter;

/// Pause between passes while some items are still undone.
const SECONDS_BETWEEN_PASSES: u64 = 10;

pub struct BatchDriver {
    finder: DomainFinder,
    history: HistoryStore,
    output: OutputWriter,
    logger: RunLogger,
    seconds_between_items: u64,
    /// False for sharded workers; their rows reach the output file through
    /// `combine` instead.
    write_output_rows: bool,
}

impl BatchDriver {
    pub fn new(
        finder: DomainFinder,
        history: HistoryStore,
        output: OutputWriter,
        logger: RunLogger,
        batch: &BatchConfig,
        write_output_rows: bool,
    ) -> Self {
        Self {
            finder,
            history,
            output,
            logger,
            seconds_between_items: batch.seconds_between_items,
            write_output_rows,
        }
    }

    /// Work the list until every item is done, pausing between passes.
    pub async fn run(&self, items: &[CompanyRecord]) -> Result<()> {
        self.logger.start_progress(items.len() as u64).await;

        loop {
            let done = self.sweep(items).await;

            self.logger.set_progress_position(done as u64).await;
            self.logger.log_pass_progress(done, items.len());

            if done >= items.len() {
                break;
            }

            self.logger.log_pass_retry();
            tokio::time::sleep(Duration::from_secs(SECONDS_BETWEEN_PASSES)).await;
        }

        self.logger.finish_progress("Done all items.").await;
        Ok(())
    }

    /// One pass over the list. Returns how many items are done, counting
    /// items finished on earlier passes or by other workers.
    pub async fn sweep(&self, items: &[CompanyRecord]) -> usize {
        debug!("Starting a pass over {} items", items.len());

        let mut done = 0;

        for (index, record) in items.iter().enumerate() {
            self.logger.update_progress(&record.name).await;

            match self.work_item(index, items.len(), record).await {
                Ok(true) => done += 1,
                Ok(false) => {}
                Err(error) => self.logger.log_item_failed(&error.to_string()),
            }
        }

        done
    }

    async fn work_item(
        &self,
        index: usize,
        total: usize,
        record: &CompanyRecord,
    ) -> Result<bool> {
        self.logger.log_item_start(index + 1, total, &record.name);

        // A row without a company name cannot be searched or keyed. It
        // comes back every pass until the input file is corrected.
        if record.name.trim().is_empty() {
            self.logger.warn("Skipping. This item has no company name.");
            return Ok(false);
        }

        if self.history.is_done(&record.number)? {
            self.logger.log_already_done();
            return Ok(true);
        }

        match self.finder.find(record).await {
            FindOutcome::Resolved(result) => {
                if self.write_output_rows {
                    self.output.append(record, &result)?;
                }

                self.history.record(
                    &record.number,
                    &record.name,
                    &result.url,
                    result.confidence,
                    result.maximum_possible,
                )?;

                if result.is_unresolved() {
                    self.logger.log_unresolved(&record.name);
                } else {
                    self.logger.log_resolved(&record.name, &result.url);
                }

                self.wait_between().await;
                Ok(true)
            }
            FindOutcome::Deferred(reason) => {
                self.logger.log_deferred(&record.name, &reason);
                Ok(false)
            }
        }
    }

    async fn wait_between(&self) {
        if self.seconds_between_items == 0 {
            return;
        }

        self.logger.log_waiting(self.seconds_between_items);
        tokio::time::sleep(Duration::from_secs(self.seconds_between_items)).await;
    }

    /// Merge history rows for the full input list into the output file,
    /// polling until every company has a row.
    pub async fn combine(&self, items: &[CompanyRecord]) -> Result<()> {
        self.logger.info("Combining results from all workers.");

        loop {
            let written = self.combine_pass(items)?;

            self.logger.log_combine_progress(
                written,
                items.len(),
                &self.output.path().display().to_string(),
            );

            if written >= items.len() {
                self.logger.info("Wrote all items.");
                break;
            }

            self.logger.log_pass_retry();
            tokio::time::sleep(Duration::from_secs(SECONDS_BETWEEN_PASSES)).await;
        }

        Ok(())
    }

    /// One merge pass. The output file is rebuilt from scratch each pass so
    /// an incomplete poll never leaves duplicate rows behind.
    pub fn combine_pass(&self, items: &[CompanyRecord]) -> Result<usize> {
        self.output.reset()?;

        let mut written = 0;

        for record in items {
            if record.number.is_empty() {
                continue;
            }

            let entry = match self.history.get(&record.number) {
                Ok(Some(entry)) => entry,
                Ok(None) => continue,
                Err(error) => {
                    self.logger.log_item_failed(&error.to_string());
                    continue;
                }
            };

            let result = FinderResult {
                url: entry.result,
                confidence: entry.confidence,
                maximum_possible: entry.maximum_possible_confidence,
            };

            if let Err(error) = self.output.append(record, &result) {
                self.logger.log_item_failed(&error.to_string());
                continue;
            }

            written += 1;
        }

        Ok(written)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ScoringConfig;
    use crate::fetch::{FetchError, PageFetcher};
    use crate::history::HistoryStore;
    use crate::logger::VerbosityLevel;
    use crate::rng::SharedRng;
    use crate::scorer::ConfidenceScorer;
    use crate::search::{SearchClient, SearchError, SearchOutcome};
    use crate::whois::WhoisLookup;
    use async_trait::async_trait;
    use std::path::PathBuf;
    use std::sync::{Arc, Mutex};

    // ===== test doubles =====

    enum Reply {
        Results(Vec<&'static str>),
        Captcha,
    }

    /// Search double keyed by query prefix; records every query. The
    /// default reply is no results.
    struct CannedSearch {
        replies: Vec<(&'static str, Reply)>,
        calls: Mutex<Vec<String>>,
    }

    impl CannedSearch {
        fn new(replies: Vec<(&'static str, Reply)>) -> Self {
            Self {
                replies,
                calls: Mutex::new(Vec::new()),
            }
        }

        fn queries(&self) -> Vec<String> {
            self.calls.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl SearchClient for CannedSearch {
        async fn search(
            &self,
            query: &str,
            _max_results: usize,
            _accept_all: bool,
            _extra_avoid: &[String],
        ) -> Result<SearchOutcome, SearchError> {
            self.calls.lock().unwrap().push(query.to_string());

            for (prefix, reply) in &self.replies {
                if query.starts_with(prefix) {
                    return match reply {
                        Reply::Results(urls) => Ok(SearchOutcome::Results(
                            urls.iter().map(|u| u.to_string()).collect(),
                        )),
                        Reply::Captcha => Err(SearchError::Captcha),
                    };
                }
            }

            Ok(SearchOutcome::NoResults)
        }
    }

    struct PanickingFetcher;

    #[async_trait]
    impl PageFetcher for PanickingFetcher {
        async fn fetch_text(&self, url: &str) -> Result<String, FetchError> {
            panic!("this flow must not fetch pages (url was: {url})");
        }
    }

    // ===== fixtures =====

    fn acme() -> CompanyRecord {
        CompanyRecord {
            number: "12345678".to_string(),
            name: "Acme Widgets Ltd".to_string(),
            date_incorporated: "2001-05-14".to_string(),
            active_directors: "3".to_string(),
            registered_address: "1 High Street, London, United Kingdom".to_string(),
        }
    }

    fn blue() -> CompanyRecord {
        CompanyRecord {
            number: "87654321".to_string(),
            name: "Blue Bottle Coffee Ltd".to_string(),
            date_incorporated: "2015-09-01".to_string(),
            active_directors: "2".to_string(),
            registered_address: "42 Roast Lane, Bristol, United Kingdom".to_string(),
        }
    }

    /// Quick scoring with `quick_accept` needs no page fetches, so every
    /// driver test runs against the panicking fetcher.
    fn driver(
        search: &Arc<CannedSearch>,
        dir: &tempfile::TempDir,
        write_output_rows: bool,
    ) -> BatchDriver {
        let fetcher: Arc<dyn PageFetcher> = Arc::new(PanickingFetcher);
        let whois = WhoisLookup::new(Arc::clone(&fetcher), SharedRng::new(Some(3)));
        let scoring = ScoringConfig {
            minimum_confidence: 500,
            minimum_confidence_to_stop_looking: 1000,
            maximum_tries: 7,
            quick_accept: true,
            suggest_url: "https://autocomplete.invalid/suggest?query=".to_string(),
            social_results: 2,
        };
        let scorer = ConfidenceScorer::new(
            Arc::clone(search) as Arc<dyn SearchClient>,
            fetcher,
            whois,
            ".co.uk".to_string(),
            scoring.suggest_url.clone(),
            scoring.social_results,
        );
        let finder =
            DomainFinder::new(Arc::clone(search) as Arc<dyn SearchClient>, scorer, &scoring);

        let history = HistoryStore::open(&history_path(dir)).unwrap();
        let output = OutputWriter::new(output_path(dir));
        let logger = RunLogger::new(VerbosityLevel::Silent);
        let batch = BatchConfig {
            seconds_between_items: 0,
            maximum_days_to_keep_items: 90,
        };

        BatchDriver::new(finder, history, output, logger, &batch, write_output_rows)
    }

    fn history_path(dir: &tempfile::TempDir) -> PathBuf {
        dir.path().join("history.sqlite")
    }

    fn output_path(dir: &tempfile::TempDir) -> PathBuf {
        dir.path().join("output.csv")
    }

    /// Second connection onto the driver's history file, for seeding and
    /// assertions.
    fn history(dir: &tempfile::TempDir) -> HistoryStore {
        HistoryStore::open(&history_path(dir)).unwrap()
    }

    fn output_lines(dir: &tempfile::TempDir) -> Vec<String> {
        std::fs::read_to_string(output_path(dir))
            .unwrap()
            .lines()
            .map(|l| l.to_string())
            .collect()
    }

    // ===== sweeps =====

    #[tokio::test]
    async fn test_sweep_resolves_and_records() {
        let search = Arc::new(CannedSearch::new(vec![
            ("\"Acme", Reply::Results(vec!["https://acmewidgets.co.uk"])),
            ("\"Blue", Reply::Results(vec!["https://bluebottlecoffee.co.uk"])),
        ]));
        let dir = tempfile::tempdir().unwrap();
        let driver = driver(&search, &dir, true);

        let done = driver.sweep(&[acme(), blue()]).await;

        assert_eq!(done, 2);

        let store = history(&dir);
        assert!(store.is_done("12345678").unwrap());
        assert!(store.is_done("87654321").unwrap());

        let lines = output_lines(&dir);
        assert_eq!(lines.len(), 3);
        assert!(lines[0].starts_with("Company Number"));
        // Preferred suffix plus exact name match, nothing else attempted.
        assert!(lines[1].ends_with("https://acmewidgets.co.uk,100"));
    }

    #[tokio::test]
    async fn test_sweep_counts_items_done_earlier_without_searching() {
        let search = Arc::new(CannedSearch::new(vec![(
            "\"Blue",
            Reply::Results(vec!["https://bluebottlecoffee.co.uk"]),
        )]));
        let dir = tempfile::tempdir().unwrap();
        history(&dir)
            .record("12345678", "Acme Widgets Ltd", "https://already.co.uk", 600, 700)
            .unwrap();
        let driver = driver(&search, &dir, true);

        let done = driver.sweep(&[acme(), blue()]).await;

        assert_eq!(done, 2);
        assert!(!search.queries().iter().any(|q| q.contains("Acme")));

        let lines = output_lines(&dir);
        assert_eq!(lines.len(), 2, "only the fresh item gets an output row");
        assert!(lines[1].contains("bluebottlecoffee"));
    }

    #[tokio::test]
    async fn test_sweep_defers_on_captcha() {
        let search = Arc::new(CannedSearch::new(vec![("\"Acme", Reply::Captcha)]));
        let dir = tempfile::tempdir().unwrap();
        let driver = driver(&search, &dir, true);

        let done = driver.sweep(&[acme()]).await;

        assert_eq!(done, 0);
        assert_eq!(history(&dir).count().unwrap(), 0);
        assert!(!output_path(&dir).exists());
    }

    #[tokio::test]
    async fn test_sweep_never_finishes_a_nameless_item() {
        let search = Arc::new(CannedSearch::new(vec![(
            "\"Acme",
            Reply::Results(vec!["https://acmewidgets.co.uk"]),
        )]));
        let dir = tempfile::tempdir().unwrap();
        let driver = driver(&search, &dir, true);

        let nameless = CompanyRecord {
            number: "99999999".to_string(),
            name: String::new(),
            date_incorporated: String::new(),
            active_directors: String::new(),
            registered_address: "7 Empty Row, Leeds".to_string(),
        };
        let items = [nameless, acme()];

        assert_eq!(driver.sweep(&items).await, 1);
        // The named item is now in history but the nameless one still
        // blocks the pass from completing.
        assert_eq!(driver.sweep(&items).await, 1);
        assert_eq!(history(&dir).count().unwrap(), 1);
    }

    #[tokio::test]
    async fn test_sweep_records_the_none_sentinel() {
        let search = Arc::new(CannedSearch::new(vec![]));
        let dir = tempfile::tempdir().unwrap();
        let driver = driver(&search, &dir, true);

        let done = driver.sweep(&[acme()]).await;

        assert_eq!(done, 1);

        let entry = history(&dir).get("12345678").unwrap().unwrap();
        assert_eq!(entry.result, "none");
        assert_eq!(entry.confidence, 0);
        assert_eq!(entry.maximum_possible_confidence, -1);

        let lines = output_lines(&dir);
        assert!(lines[1].ends_with(",none,-1"));
    }

    #[tokio::test]
    async fn test_sharded_worker_writes_history_only() {
        let search = Arc::new(CannedSearch::new(vec![(
            "\"Acme",
            Reply::Results(vec!["https://acmewidgets.co.uk"]),
        )]));
        let dir = tempfile::tempdir().unwrap();
        let driver = driver(&search, &dir, false);

        let done = driver.sweep(&[acme()]).await;

        assert_eq!(done, 1);
        assert!(history(&dir).is_done("12345678").unwrap());
        assert!(!output_path(&dir).exists());
    }

    // ===== combine =====

    #[test]
    fn test_combine_pass_merges_history_rows() {
        let search = Arc::new(CannedSearch::new(vec![]));
        let dir = tempfile::tempdir().unwrap();
        let store = history(&dir);
        store
            .record("12345678", "Acme Widgets Ltd", "https://acmewidgets.co.uk", 700, 700)
            .unwrap();
        store
            .record("87654321", "Blue Bottle Coffee Ltd", "none", 0, -1)
            .unwrap();
        let driver = driver(&search, &dir, true);

        let carol = CompanyRecord {
            number: "11112222".to_string(),
            name: "Carol Baking Co Ltd".to_string(),
            date_incorporated: "2019-01-20".to_string(),
            active_directors: "1".to_string(),
            registered_address: "3 Oven Road, York".to_string(),
        };
        let items = [acme(), blue(), carol];

        let written = driver.combine_pass(&items).unwrap();
        assert_eq!(written, 2);

        let lines = output_lines(&dir);
        assert_eq!(lines.len(), 3);
        assert!(lines[1].ends_with("https://acmewidgets.co.uk,100"));
        assert!(lines[2].ends_with(",none,-1"));

        // The missing company arrives; the next pass rebuilds the file
        // without duplicating the rows written before.
        store
            .record("11112222", "Carol Baking Co Ltd", "https://carolbaking.co.uk", 500, 700)
            .unwrap();

        assert_eq!(driver.combine_pass(&items).unwrap(), 3);
        assert_eq!(output_lines(&dir).len(), 4);
    }

    #[test]
    fn test_combine_pass_skips_rows_without_a_number() {
        let search = Arc::new(CannedSearch::new(vec![]));
        let dir = tempfile::tempdir().unwrap();
        history(&dir)
            .record("12345678", "Acme Widgets Ltd", "https://acmewidgets.co.uk", 700, 700)
            .unwrap();
        let driver = driver(&search, &dir, true);

        let unnumbered = CompanyRecord {
            number: String::new(),
            name: "Ghost Trading Ltd".to_string(),
            date_incorporated: String::new(),
            active_directors: String::new(),
            registered_address: "1 Nowhere Street".to_string(),
        };

        let written = driver.combine_pass(&[acme(), unnumbered]).unwrap();

        assert_eq!(written, 1);
        assert_eq!(output_lines(&dir).len(), 2);
    }
}
