//! Configuration management for sitefinder
//!
//! All configuration is loaded from `./config/sitefinder.toml`.
//! No hardcoded defaults exist in source code - all defaults are in the config template.

use serde::Deserialize;
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Configuration file path relative to working directory
pub const CONFIG_PATH: &str = "./config/sitefinder.toml";

/// Default configuration file content - this is the ONLY place defaults exist
pub const DEFAULT_CONFIG: &str = include_str!("../config/sitefinder.toml");

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Configuration file not found at {0}")]
    FileNotFound(PathBuf),

    #[error("Failed to read configuration file: {0}")]
    IoError(#[from] io::Error),

    #[error("Failed to parse configuration file: {0}")]
    ParseError(#[from] toml::de::Error),

    #[error("Configuration field '{field}' cannot be empty")]
    EmptyRequired { field: String },

    #[error("Invalid value for '{field}': {reason}")]
    InvalidValue { field: String, reason: String },
}

/// Root configuration structure
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub files: FilesConfig,
    pub search: SearchConfig,
    pub scoring: ScoringConfig,
    pub batch: BatchConfig,
    #[serde(default)]
    pub proxy: ProxyConfig,
    pub http: HttpConfig,
}

/// Input, output and history file locations
#[derive(Debug, Clone, Deserialize)]
pub struct FilesConfig {
    pub input_file: String,
    pub output_file: String,
    pub history_file: String,
}

/// Search engine endpoint and candidate filtering
#[derive(Debug, Clone, Deserialize)]
pub struct SearchConfig {
    pub default_search_url: String,
    /// Suffix a candidate domain must end with to earn the preferred-domain
    /// score. Empty means the check never passes (its weight still counts).
    #[serde(default)]
    pub preferred_domain: String,
    /// URL substrings to always reject
    #[serde(default)]
    pub ignore_patterns: Vec<String>,
    /// Domains to reject in addition to the built-in directory list
    #[serde(default)]
    pub ignore_domains: Vec<String>,
}

/// Thresholds and knobs for the confidence scorer and ranker
#[derive(Debug, Clone, Deserialize)]
pub struct ScoringConfig {
    pub minimum_confidence: i64,
    pub minimum_confidence_to_stop_looking: i64,
    /// Most candidates examined per company
    pub maximum_tries: usize,
    /// Accept the first quick-qualifying candidate without detailed checks
    #[serde(default)]
    pub quick_accept: bool,
    /// Company-suggestion autocomplete endpoint; filtered name appended URL-encoded
    pub suggest_url: String,
    /// Search results fetched per social network in the cross-link check
    #[serde(default = "default_social_results")]
    pub social_results: usize,
}

fn default_social_results() -> usize {
    5
}

/// Batch pacing and history retention
#[derive(Debug, Clone, Deserialize)]
pub struct BatchConfig {
    pub seconds_between_items: u64,
    /// Prune history entries older than this many days at startup; 0 keeps all
    pub maximum_days_to_keep_items: i64,
}

/// Optional proxy list source
#[derive(Debug, Clone, Deserialize, Default)]
pub struct ProxyConfig {
    #[serde(default)]
    pub proxy_list_url: String,
}

/// HTTP client timeouts
#[derive(Debug, Clone, Deserialize)]
pub struct HttpConfig {
    pub request_timeout_secs: u64,
    pub search_timeout_secs: u64,
}

impl AppConfig {
    /// Load configuration from the default path
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from_path(Path::new(CONFIG_PATH))
    }

    /// Load configuration from a specific path
    pub fn load_from_path(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Err(ConfigError::FileNotFound(path.to_path_buf()));
        }

        let content = fs::read_to_string(path)?;
        let config: AppConfig = toml::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate all configuration values
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.files.input_file.is_empty() {
            return Err(ConfigError::EmptyRequired {
                field: "files.input_file".to_string(),
            });
        }
        if self.files.output_file.is_empty() {
            return Err(ConfigError::EmptyRequired {
                field: "files.output_file".to_string(),
            });
        }
        if self.files.history_file.is_empty() {
            return Err(ConfigError::EmptyRequired {
                field: "files.history_file".to_string(),
            });
        }

        if !self.search.default_search_url.starts_with("http://")
            && !self.search.default_search_url.starts_with("https://")
        {
            return Err(ConfigError::InvalidValue {
                field: "search.default_search_url".to_string(),
                reason: format!("expected http(s) URL, got '{}'", self.search.default_search_url),
            });
        }

        if self.scoring.minimum_confidence <= 0 {
            return Err(ConfigError::InvalidValue {
                field: "scoring.minimum_confidence".to_string(),
                reason: "must be greater than 0".to_string(),
            });
        }
        if self.scoring.minimum_confidence_to_stop_looking < self.scoring.minimum_confidence {
            return Err(ConfigError::InvalidValue {
                field: "scoring.minimum_confidence_to_stop_looking".to_string(),
                reason: "must not be below scoring.minimum_confidence".to_string(),
            });
        }
        if self.scoring.maximum_tries == 0 {
            return Err(ConfigError::InvalidValue {
                field: "scoring.maximum_tries".to_string(),
                reason: "must be at least 1".to_string(),
            });
        }
        if !self.scoring.suggest_url.is_empty()
            && !self.scoring.suggest_url.starts_with("http://")
            && !self.scoring.suggest_url.starts_with("https://")
        {
            return Err(ConfigError::InvalidValue {
                field: "scoring.suggest_url".to_string(),
                reason: format!("expected http(s) URL or empty, got '{}'", self.scoring.suggest_url),
            });
        }

        if self.http.request_timeout_secs == 0 {
            return Err(ConfigError::EmptyRequired {
                field: "http.request_timeout_secs".to_string(),
            });
        }
        if self.http.search_timeout_secs == 0 {
            return Err(ConfigError::EmptyRequired {
                field: "http.search_timeout_secs".to_string(),
            });
        }
        if self.batch.maximum_days_to_keep_items < 0 {
            return Err(ConfigError::InvalidValue {
                field: "batch.maximum_days_to_keep_items".to_string(),
                reason: "must be 0 or positive".to_string(),
            });
        }

        Ok(())
    }

    /// Debug profile: faster pacing, fewer candidates, smaller social fan-out.
    pub fn apply_debug_profile(&mut self) {
        self.batch.seconds_between_items = 1;
        self.scoring.maximum_tries = 3;
        self.scoring.social_results = 2;
    }

    /// Create default configuration file at the standard location
    pub fn create_default_config() -> Result<PathBuf, ConfigError> {
        let path = Path::new(CONFIG_PATH);

        // Create config directory if it doesn't exist
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        // Write default config
        let mut file = fs::File::create(path)?;
        file.write_all(DEFAULT_CONFIG.as_bytes())?;

        Ok(path.to_path_buf())
    }

    /// Check if stdin is a TTY (interactive terminal)
    pub fn is_interactive() -> bool {
        atty::is(atty::Stream::Stdin)
    }

    /// Prompt user to create default config (only in interactive mode)
    pub fn prompt_create_config() -> Result<Option<PathBuf>, ConfigError> {
        if !Self::is_interactive() {
            return Ok(None);
        }

        print!("Configuration file not found. Create default config? [Y/n] ");
        io::stdout().flush()?;

        let mut input = String::new();
        io::stdin().read_line(&mut input)?;
        let input = input.trim().to_lowercase();

        if input.is_empty() || input == "y" || input == "yes" {
            let path = Self::create_default_config()?;
            Ok(Some(path))
        } else {
            Ok(None)
        }
    }
}
