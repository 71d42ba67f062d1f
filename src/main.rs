#![allow(dead_code)]

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Result;
use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod batch;
mod cli;
mod config;
mod domain_utils;
mod driver;
mod fetch;
mod finder;
mod history;
mod logger;
mod normalizer;
mod output;
mod proxy;
mod query;
mod rng;
mod scorer;
mod search;
mod whois;

use cli::Cli;
use config::{AppConfig, ConfigError};
use driver::BatchDriver;
use fetch::{HttpFetcher, PageFetcher};
use finder::DomainFinder;
use history::HistoryStore;
use logger::{RunLogger, VerbosityLevel};
use output::OutputWriter;
use proxy::ProxyPool;
use rng::SharedRng;
use scorer::ConfidenceScorer;
use search::{GoogleSearchClient, SearchClient};
use whois::WhoisLookup;

/// On-disk response cache used by debug runs.
const DEBUG_CACHE_DIR: &str = "logs/cache";

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Handle --init flag first (before any other processing)
    if cli.init {
        match AppConfig::create_default_config() {
            Ok(path) => {
                println!("✅ Created default configuration file at: {}", path.display());
                println!("   Edit this file to customize settings, then run sitefinder again.");
                std::process::exit(0);
            }
            Err(e) => {
                eprintln!("❌ Failed to create configuration file: {}", e);
                std::process::exit(1);
            }
        }
    }

    if let Err(e) = cli.validate() {
        eprintln!("❌ Invalid arguments: {}", e);
        std::process::exit(1);
    }

    let mut app_config = load_config(&cli);

    if cli.debug {
        app_config.apply_debug_profile();
    }

    init_tracing(cli.verbose);

    let verbosity = VerbosityLevel::from_verbose_count(cli.verbose);
    let logger = match cli.worker_log_file() {
        Some(log_file_path) => RunLogger::with_log_file(verbosity, log_file_path),
        None => RunLogger::new(verbosity),
    };

    print_status_block(&cli, &app_config);

    let rng = SharedRng::new(cli.seed);

    let proxies = match ProxyPool::load(
        &app_config.proxy.proxy_list_url,
        app_config.http.request_timeout_secs,
    )
    .await
    {
        Ok(pool) => pool,
        Err(e) => {
            eprintln!("⚠️  Proxy list unavailable, continuing without proxies: {}", e);
            ProxyPool::empty()
        }
    };

    let cache_dir = if cli.debug && !cli.no_cache {
        Some(PathBuf::from(DEBUG_CACHE_DIR))
    } else {
        None
    };

    // Searches get the longer timeout; candidate-page fetches the shorter one.
    let search_fetcher: Arc<dyn PageFetcher> = Arc::new(HttpFetcher::new(
        app_config.http.search_timeout_secs,
        proxies.clone(),
        rng.clone(),
        cache_dir.clone(),
    )?);
    let page_fetcher: Arc<dyn PageFetcher> = Arc::new(HttpFetcher::new(
        app_config.http.request_timeout_secs,
        proxies,
        rng.clone(),
        cache_dir,
    )?);

    let search: Arc<dyn SearchClient> = Arc::new(GoogleSearchClient::new(
        Arc::clone(&search_fetcher),
        app_config.search.default_search_url.clone(),
        app_config.search.ignore_patterns.clone(),
        app_config.search.ignore_domains.clone(),
    ));

    let whois = WhoisLookup::new(Arc::clone(&page_fetcher), rng.clone());
    let scorer = ConfidenceScorer::new(
        Arc::clone(&search),
        Arc::clone(&page_fetcher),
        whois,
        app_config.search.preferred_domain.clone(),
        app_config.scoring.suggest_url.clone(),
        app_config.scoring.social_results,
    );
    let finder = DomainFinder::new(Arc::clone(&search), scorer, &app_config.scoring);

    let history = HistoryStore::open(Path::new(&app_config.files.history_file))?;
    let pruned = history.prune(app_config.batch.maximum_days_to_keep_items)?;
    if pruned > 0 {
        logger.info(&format!("Pruned {} old history entries.", pruned));
    }

    let output = OutputWriter::new(&app_config.files.output_file);
    logger.record_output_file(&app_config.files.output_file);

    let items = batch::load_companies(Path::new(&app_config.files.input_file))?;
    logger.info(&format!("Loaded {} companies from {}.", items.len(), app_config.files.input_file));

    // Sharded workers keep their rows out of the shared output file; a
    // --combine run merges everything from history afterwards.
    let write_output_rows = cli.thread_count <= 1;

    let driver = BatchDriver::new(
        finder,
        history,
        output,
        logger.clone(),
        &app_config.batch,
        write_output_rows,
    );

    logger.info("Starting.");

    if cli.combine {
        driver.combine(&items).await?;
    } else {
        // Shard on file order so worker slices stay stable across runs,
        // then shuffle this worker's slice so retries attack the list in a
        // fresh order.
        let mut mine = batch::shard(&items, cli.thread_number, cli.thread_count).to_vec();
        rng.shuffle(&mut mine);

        driver.run(&mine).await?;
        logger.print_final_summary();
    }

    if logger.is_log_export_enabled() {
        if let Err(e) = logger.export_logs() {
            eprintln!("⚠️  Failed to write log file: {}", e);
        }
    }

    Ok(())
}

/// Load configuration, offering to create the default file interactively.
fn load_config(cli: &Cli) -> AppConfig {
    if let Some(path) = &cli.config {
        return match AppConfig::load_from_path(Path::new(path)) {
            Ok(cfg) => cfg,
            Err(e) => {
                eprintln!("❌ Configuration error: {}", e);
                std::process::exit(1);
            }
        };
    }

    match AppConfig::load() {
        Ok(cfg) => cfg,
        Err(ConfigError::FileNotFound(path)) => {
            match AppConfig::prompt_create_config() {
                Ok(Some(created_path)) => {
                    println!("✅ Created default configuration file at: {}", created_path.display());
                    println!("   Edit this file to customize settings, then run sitefinder again.");
                    std::process::exit(0);
                }
                Ok(None) => {
                    eprintln!("❌ Configuration file not found at: {}", path.display());
                    eprintln!("   Run with --init to create a default configuration file.");
                    std::process::exit(1);
                }
                Err(e) => {
                    eprintln!("❌ Failed to create configuration file: {}", e);
                    std::process::exit(1);
                }
            }
        }
        Err(e) => {
            eprintln!("❌ Configuration error: {}", e);
            std::process::exit(1);
        }
    }
}

fn init_tracing(verbose: u8) {
    let default_filter = match verbose {
        0 => "sitefinder=warn",
        1 => "sitefinder=info",
        _ => "sitefinder=debug",
    };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_filter.into()),
        )
        .with(tracing_subscriber::fmt::layer().with_target(false))
        .init();
}

/// Consolidated startup status block.
fn print_status_block(cli: &Cli, config: &AppConfig) {
    eprintln!();

    if config.proxy.proxy_list_url.is_empty() && !Path::new("proxies.csv").exists() {
        eprintln!("❌ DISABLED: Proxy rotation (no proxies.csv and no proxy_list_url)");
    } else {
        eprintln!("✅ ENABLED: Proxy rotation");
    }

    if config.search.preferred_domain.is_empty() {
        eprintln!("❌ DISABLED: Preferred-domain bonus (search.preferred_domain is empty)");
    } else {
        eprintln!("✅ ENABLED: Preferred-domain bonus ({})", config.search.preferred_domain);
    }

    if config.scoring.suggest_url.is_empty() {
        eprintln!("❌ DISABLED: Company-suggestion check (scoring.suggest_url is empty)");
    } else {
        eprintln!("✅ ENABLED: Company-suggestion check");
    }

    if config.scoring.quick_accept {
        eprintln!("✅ ENABLED: Quick accept (first candidate passing the cheap checks wins)");
    } else {
        eprintln!("❌ DISABLED: Quick accept (every candidate gets the full battery)");
    }

    if cli.debug {
        if cli.no_cache {
            eprintln!("✅ ENABLED: Debug profile (response cache skipped via --no-cache)");
        } else {
            eprintln!("✅ ENABLED: Debug profile (responses cached in {})", DEBUG_CACHE_DIR);
        }
    }

    if cli.thread_count > 1 {
        eprintln!(
            "✅ ENABLED: Sharded mode (worker {} of {}; writes history only, merge with --combine)",
            cli.thread_number, cli.thread_count
        );
    }

    eprintln!();
}
