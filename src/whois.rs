//! WHOIS mirror lookup.
//!
//! Ownership signal for the scorer: fetch one public WHOIS page (mirror
//! chosen at random, their rate limits differ) and look for the company's
//! filtered name in the record. The candidate domain itself is stripped
//! from the page first so the lookup's echo of the query never counts as
//! a match. Failures score zero; nothing propagates.

use std::sync::Arc;
use tracing::debug;

use crate::fetch::PageFetcher;
use crate::rng::SharedRng;

pub struct WhoisLookup {
    fetcher: Arc<dyn PageFetcher>,
    rng: SharedRng,
}

fn mirror_urls(domain: &str) -> [String; 3] {
    [
        format!("https://www.namecheap.com/domains/whoislookup-api/{}", domain),
        format!("https://www.whois.com/whois/{}", domain),
        format!("https://who.is/whois/{}", domain),
    ]
}

impl WhoisLookup {
    pub fn new(fetcher: Arc<dyn PageFetcher>, rng: SharedRng) -> Self {
        Self { fetcher, rng }
    }

    /// Does the domain's WHOIS record mention the filtered company name?
    pub async fn name_appears(&self, domain: &str, filtered_name: &str) -> bool {
        if filtered_name.is_empty() {
            return false;
        }

        let urls = mirror_urls(domain);
        let url = match self.rng.choose_index(urls.len()) {
            Some(idx) => &urls[idx],
            None => return false,
        };

        debug!("Checking {}", url);

        let page = match self.fetcher.fetch_text(url).await {
            Ok(page) => page,
            Err(e) => {
                debug!("Whois lookup via {} failed: {}", url, e);
                return false;
            }
        };

        // Strip the queried domain so its own echo can't match the name
        let cleaned = page.replace(domain, "").to_lowercase();

        if !cleaned.contains("domain name:") {
            debug!("It seems {} didn't return any whois information", url);
        }

        cleaned.contains(filtered_name)
    }
}
