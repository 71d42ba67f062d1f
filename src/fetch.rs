//! HTTP page fetching.
//!
//! One boundary for every outbound page request: search-engine pages,
//! candidate sites, WHOIS mirrors, the autocomplete API. Bodies are returned
//! regardless of HTTP status, since engine defenses (CAPTCHA interstitials)
//! arrive on error statuses and are detected from page content by callers.
//! Transport errors and timeouts become `FetchError` so callers can treat
//! them as the retry-later failure signal.

use async_trait::async_trait;
use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;
use tracing::debug;

use crate::proxy::ProxyPool;
use crate::rng::SharedRng;

/// User agents rotated across requests.
const USER_AGENTS: &[&str] = &[
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36",
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/119.0.0.0 Safari/537.36",
    "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36",
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64; rv:121.0) Gecko/20100101 Firefox/121.0",
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10.15; rv:120.0) Gecko/20100101 Firefox/120.0",
];

#[derive(Error, Debug)]
pub enum FetchError {
    #[error("Request timed out after {0}s")]
    Timeout(u64),

    #[error("Request failed: {0}")]
    Request(String),
}

/// The fetch capability the scorer, search client and whois lookup depend on.
#[async_trait]
pub trait PageFetcher: Send + Sync {
    /// Fetch a URL's body as text.
    async fn fetch_text(&self, url: &str) -> Result<String, FetchError>;
}

/// reqwest-backed fetcher with user-agent rotation, optional per-request
/// proxies, and an optional on-disk response cache for debug runs.
pub struct HttpFetcher {
    client: reqwest::Client,
    timeout_secs: u64,
    proxies: ProxyPool,
    rng: SharedRng,
    cache_dir: Option<PathBuf>,
}

impl HttpFetcher {
    pub fn new(
        timeout_secs: u64,
        proxies: ProxyPool,
        rng: SharedRng,
        cache_dir: Option<PathBuf>,
    ) -> Result<Self, FetchError> {
        let client = build_client(timeout_secs, None)?;

        Ok(Self {
            client,
            timeout_secs,
            proxies,
            rng,
            cache_dir,
        })
    }

    fn classify(&self, error: reqwest::Error) -> FetchError {
        if error.is_timeout() {
            FetchError::Timeout(self.timeout_secs)
        } else {
            FetchError::Request(error.to_string())
        }
    }

    fn cache_path(&self, url: &str) -> Option<PathBuf> {
        let dir = self.cache_dir.as_ref()?;
        let mut hasher = DefaultHasher::new();
        url.hash(&mut hasher);
        Some(dir.join(format!("{:016x}.html", hasher.finish())))
    }

    fn read_cache(&self, url: &str) -> Option<String> {
        let path = self.cache_path(url)?;
        let body = std::fs::read_to_string(&path).ok()?;
        debug!("Cache hit for {}", url);
        Some(body)
    }

    /// Best effort; a failed cache write never fails the fetch.
    fn write_cache(&self, url: &str, body: &str) {
        let Some(path) = self.cache_path(url) else {
            return;
        };

        if let Some(parent) = path.parent() {
            if let Err(e) = std::fs::create_dir_all(parent) {
                debug!("Could not create cache directory: {}", e);
                return;
            }
        }

        if let Err(e) = std::fs::write(&path, body) {
            debug!("Could not write cache entry for {}: {}", url, e);
        }
    }
}

fn build_client(timeout_secs: u64, proxy_url: Option<&str>) -> Result<reqwest::Client, FetchError> {
    let mut builder = reqwest::Client::builder()
        .timeout(Duration::from_secs(timeout_secs))
        .redirect(reqwest::redirect::Policy::limited(10));

    if let Some(proxy_url) = proxy_url {
        let proxy = reqwest::Proxy::all(proxy_url)
            .map_err(|e| FetchError::Request(format!("invalid proxy {}: {}", proxy_url, e)))?;
        builder = builder.proxy(proxy);
    }

    builder
        .build()
        .map_err(|e| FetchError::Request(e.to_string()))
}

#[async_trait]
impl PageFetcher for HttpFetcher {
    async fn fetch_text(&self, url: &str) -> Result<String, FetchError> {
        if let Some(cached) = self.read_cache(url) {
            return Ok(cached);
        }

        let user_agent = self
            .rng
            .choose(USER_AGENTS)
            .copied()
            .unwrap_or("sitefinder/0.1");

        debug!("GET {}", url);

        // A proxied request needs its own client; reqwest fixes the proxy
        // at build time.
        let request = match self.proxies.choose(&self.rng) {
            Some(proxy_url) => build_client(self.timeout_secs, Some(&proxy_url))?.get(url),
            None => self.client.get(url),
        };

        let response = request
            .header(reqwest::header::USER_AGENT, user_agent)
            .send()
            .await
            .map_err(|e| self.classify(e))?;

        let body = response.text().await.map_err(|e| self.classify(e))?;

        self.write_cache(url, &body);
        Ok(body)
    }
}
