use clap::Parser;

#[derive(Parser, Debug)]
#[command(name = "sitefinder")]
#[command(about = "Finds a company's official website from its name and registered address")]
#[command(version)]
pub struct Cli {
    /// Create default configuration file at ./config/sitefinder.toml
    #[arg(long)]
    pub init: bool,

    /// Path to the configuration file (defaults to ./config/sitefinder.toml)
    #[arg(long, value_name = "FILE")]
    pub config: Option<String>,

    /// Debug profile: faster pacing, fewer candidates, cached responses
    #[arg(long)]
    pub debug: bool,

    /// Skip the debug response cache even when --debug is set
    #[arg(long)]
    pub no_cache: bool,

    /// Merge history entries from all workers into the output file instead of resolving
    #[arg(long)]
    pub combine: bool,

    /// This worker's 1-based index when the input is sharded across processes
    #[arg(long, value_name = "N", default_value = "1")]
    pub thread_number: usize,

    /// Total number of worker processes sharing the input
    #[arg(long, value_name = "N", default_value = "1")]
    pub thread_count: usize,

    /// Seed for shuffle/proxy/mirror randomness (omit for a random seed)
    #[arg(long, value_name = "SEED")]
    pub seed: Option<u64>,

    /// Verbose logging (use -v for INFO, -vv for DEBUG with per-check details)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Write logs to this file; sharded workers append -<thread_number> to the name
    #[arg(long, value_name = "FILE")]
    pub log_file: Option<String>,
}

impl Cli {
    pub fn validate(&self) -> Result<(), String> {
        if self.thread_number == 0 {
            return Err("Thread number must be at least 1".to_string());
        }

        if self.thread_count == 0 {
            return Err("Thread count must be at least 1".to_string());
        }

        if self.thread_number > self.thread_count {
            return Err(format!(
                "Thread number {} exceeds thread count {}",
                self.thread_number, self.thread_count
            ));
        }

        Ok(())
    }

    /// Log file path with the worker suffix applied when sharded.
    pub fn worker_log_file(&self) -> Option<String> {
        let path = self.log_file.as_ref()?;

        if self.thread_count <= 1 {
            return Some(path.clone());
        }

        let suffixed = match path.rsplit_once('.') {
            Some((stem, ext)) => format!("{}-{}.{}", stem, self.thread_number, ext),
            None => format!("{}-{}", path, self.thread_number),
        };
        Some(suffixed)
    }
}
