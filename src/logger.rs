use std::fs::OpenOptions;
use std::io::{self, Write};
use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::{SystemTime, UNIX_EPOCH};

use indicatif::{ProgressBar, ProgressStyle};
use tokio::sync::RwLock;

#[derive(Clone, Copy, Debug, PartialEq, PartialOrd)]
pub enum VerbosityLevel {
    Silent = 0,    // Only show progress bar and final summary
    Summary = 1,   // Per-item progress (default)
    Detailed = 2,  // Candidate-level detail and warnings
    Debug = 3,     // All messages including debug info
}

impl VerbosityLevel {
    pub fn from_verbose_count(count: u8) -> Self {
        match count {
            0 => VerbosityLevel::Summary,
            1 => VerbosityLevel::Detailed,
            2.. => VerbosityLevel::Debug,
        }
    }
}

/// User-facing progress reporting for a batch run.
///
/// Module-level diagnostics go through `tracing` and only appear when a
/// verbose filter is active; this logger carries the lines an operator
/// watches during a run, plus the progress bar and the final summary.
#[derive(Clone)]
pub struct RunLogger {
    verbosity: VerbosityLevel,
    progress_bar: Arc<RwLock<Option<ProgressBar>>>,
    run_metadata: Arc<Mutex<RunMetadata>>,
    log_buffer: Arc<Mutex<Vec<String>>>,
    log_file_path: Option<String>,
}

#[derive(Default, Clone)]
struct RunMetadata {
    start_time: Option<SystemTime>,
    end_time: Option<SystemTime>,
    items_total: usize,
    websites_found: usize,
    no_match: usize,
    deferred: usize,
    already_done: usize,
    failed: usize,
    output_file: String,
}

impl RunLogger {
    pub fn new(verbosity: VerbosityLevel) -> Self {
        Self {
            verbosity,
            progress_bar: Arc::new(RwLock::new(None)),
            run_metadata: Arc::new(Mutex::new(RunMetadata::default())),
            log_buffer: Arc::new(Mutex::new(Vec::new())),
            log_file_path: None,
        }
    }

    pub fn with_log_file(verbosity: VerbosityLevel, log_file_path: String) -> Self {
        Self {
            verbosity,
            progress_bar: Arc::new(RwLock::new(None)),
            run_metadata: Arc::new(Mutex::new(RunMetadata::default())),
            log_buffer: Arc::new(Mutex::new(Vec::new())),
            log_file_path: Some(log_file_path),
        }
    }

    // Core logging functions with consistent timestamp formatting
    pub fn info(&self, message: &str) {
        if self.verbosity >= VerbosityLevel::Summary {
            self.print_message("INFO", message);
        }
    }

    pub fn warn(&self, message: &str) {
        if self.verbosity >= VerbosityLevel::Detailed {
            self.print_message("WARN", message);
        }
    }

    pub fn error(&self, message: &str) {
        // Errors are shown at every verbosity level.
        self.print_message("ERROR", message);
    }

    pub fn debug(&self, message: &str) {
        if self.verbosity >= VerbosityLevel::Debug {
            self.print_message("DEBUG", message);
        }
    }

    fn print_message(&self, level: &str, message: &str) {
        let timestamp = self.get_timestamp();
        let msg = format!("[{}] {}: {}", timestamp, level, message);

        // Store in log buffer if log file export is enabled
        if self.log_file_path.is_some() {
            if let Ok(mut buffer) = self.log_buffer.lock() {
                buffer.push(msg.clone());
            }
        }

        // Route through an active progress bar so lines land above it
        if let Ok(guard) = self.progress_bar.try_read() {
            if let Some(pb) = guard.as_ref() {
                pb.println(msg);
                return;
            }
        }

        eprintln!("{}", msg);
    }

    fn get_timestamp(&self) -> String {
        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default();
        let secs = now.as_secs();
        let millis = now.subsec_millis();

        let hours = (secs / 3600) % 24;
        let minutes = (secs % 3600) / 60;
        let seconds = secs % 60;

        format!("{:02}:{:02}:{:02}.{:03}", hours, minutes, seconds, millis)
    }

    // Progress bar management with visual completion tracking
    pub async fn start_progress(&self, total_items: u64) {
        let pb = ProgressBar::new(total_items);

        pb.set_style(
            ProgressStyle::default_bar()
                .template("[{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({percent}%) {msg}")
                .unwrap_or_else(|_| {
                    ProgressStyle::default_bar()
                        .template("{bar:40} {pos}/{len} {msg}")
                        .unwrap_or_else(|_| ProgressStyle::default_bar())
                })
                .progress_chars("##-"),
        );

        pb.set_message("Starting...");

        let mut progress_guard = self.progress_bar.write().await;
        *progress_guard = Some(pb);

        let mut metadata = self.run_metadata.lock().unwrap();
        if metadata.start_time.is_none() {
            metadata.start_time = Some(SystemTime::now());
        }
        metadata.items_total = total_items as usize;
    }

    pub async fn update_progress(&self, message: &str) {
        if let Some(pb) = self.progress_bar.read().await.as_ref() {
            pb.set_message(message.to_string());
        }
    }

    pub async fn set_progress_position(&self, position: u64) {
        if let Some(pb) = self.progress_bar.read().await.as_ref() {
            pb.set_position(position);
        }
    }

    pub async fn finish_progress(&self, final_message: &str) {
        let mut progress_guard = self.progress_bar.write().await;
        if let Some(pb) = progress_guard.take() {
            pb.finish_and_clear();
        }
        drop(progress_guard);

        let mut metadata = self.run_metadata.lock().unwrap();
        metadata.end_time = Some(SystemTime::now());
        drop(metadata);

        if self.verbosity >= VerbosityLevel::Summary {
            self.print_message("INFO", final_message);
        }
    }

    // Item-level progress, matching the order items are worked in
    pub fn log_item_start(&self, position: usize, total: usize, name: &str) {
        self.info(&format!("Item {} of {}: {}.", position, total, name));
    }

    pub fn log_already_done(&self) {
        self.info("Skipping. Already done this item.");
        let mut metadata = self.run_metadata.lock().unwrap();
        metadata.already_done += 1;
    }

    pub fn log_resolved(&self, name: &str, url: &str) {
        self.info(&format!("Website for {}: {}.", name, url));
        let mut metadata = self.run_metadata.lock().unwrap();
        metadata.websites_found += 1;
    }

    pub fn log_unresolved(&self, name: &str) {
        self.info(&format!("No website found for {}.", name));
        let mut metadata = self.run_metadata.lock().unwrap();
        metadata.no_match += 1;
    }

    pub fn log_deferred(&self, name: &str, reason: &str) {
        self.warn(&format!("Deferring {} until the next pass: {}", name, reason));
        let mut metadata = self.run_metadata.lock().unwrap();
        metadata.deferred += 1;
    }

    pub fn log_item_failed(&self, error: &str) {
        self.error(&format!("Skipping. Something went wrong: {}", error));
        let mut metadata = self.run_metadata.lock().unwrap();
        metadata.failed += 1;
    }

    pub fn log_waiting(&self, seconds: u64) {
        self.info(&format!("Waiting {} seconds.", seconds));
    }

    pub fn log_pass_progress(&self, done: usize, total: usize) {
        self.info(&format!("Done {} of {} items.", done, total));
    }

    pub fn log_pass_retry(&self) {
        self.info("Don't have all the results yet. Will try again in a few seconds.");
    }

    pub fn log_combine_progress(&self, written: usize, total: usize, path: &str) {
        self.info(&format!("Wrote {} of {} results to {}.", written, total, path));
    }

    pub fn record_output_file(&self, path: &str) {
        let mut metadata = self.run_metadata.lock().unwrap();
        metadata.output_file = path.to_string();
    }

    // Final summary message
    pub fn print_final_summary(&self) {
        let metadata = self.run_metadata.lock().unwrap();

        // Clear any remaining progress bar artifacts
        print!("\x1b[2K\r");
        io::stdout().flush().unwrap_or_default();

        println!("\n=== RUN SUMMARY ===");

        if let (Some(start), Some(end)) = (metadata.start_time, metadata.end_time) {
            let duration = end.duration_since(start).unwrap_or_default();
            println!("Run Duration: {:.2}s", duration.as_secs_f64());
        }

        println!("Items In Batch: {}", metadata.items_total);
        println!("Websites Found: {}", metadata.websites_found);
        println!("No Match: {}", metadata.no_match);
        println!("Already Done: {}", metadata.already_done);

        if metadata.deferred > 0 {
            println!("Deferred: {}", metadata.deferred);
        }
        if metadata.failed > 0 {
            println!("Failed: {}", metadata.failed);
        }

        if !metadata.output_file.is_empty() {
            println!("Results File: {}", metadata.output_file);
        }

        println!("===================\n");

        if metadata.websites_found > 0 {
            println!(
                "✅ Run completed. Found websites for {} items.",
                metadata.websites_found
            );
        } else {
            println!("✅ Run completed. No new websites found.");
        }
    }

    /// Export all collected logs to the configured file
    pub fn export_logs(&self) -> Result<(), Box<dyn std::error::Error>> {
        if let Some(ref log_file_path) = self.log_file_path {
            if let Ok(buffer) = self.log_buffer.lock() {
                // Create parent directories if they don't exist
                if let Some(parent) = Path::new(log_file_path).parent() {
                    std::fs::create_dir_all(parent)?;
                }

                let mut file = OpenOptions::new()
                    .create(true)
                    .write(true)
                    .truncate(true)
                    .open(log_file_path)?;

                for log_entry in buffer.iter() {
                    writeln!(file, "{}", log_entry)?;
                }

                file.flush()?;
                return Ok(());
            }
        }
        Ok(())
    }

    /// Check if log export is enabled
    pub fn is_log_export_enabled(&self) -> bool {
        self.log_file_path.is_some()
    }
}
