//! Adapter-side plumbing: the query handed to each adapter, the sink it
//! pushes listings into, and the HTTP helpers the bundled site adapters share.

use std::collections::BTreeMap;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::AdapterError;
use crate::listing::Listing;

pub mod parse;

#[cfg(feature = "hifitorget")]
pub mod hifitorget;
#[cfg(feature = "taktoton")]
pub mod taktoton;

/// Default HTTP user agent for the bundled adapters.
pub const DEFAULT_USER_AGENT: &str =
    "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/126.0 Safari/537.36";

/// Per-request HTTP timeout. The task runner's timeout is the real bound;
/// this only keeps a stuck connection from holding a socket forever.
const HTTP_TIMEOUT: Duration = Duration::from_secs(30);

/// What an adapter is asked to search for.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AdapterQuery {
    /// One or more non-empty query terms
    pub terms: Vec<String>,

    /// Free-form per-adapter filters (e.g., `min_price`, `region`)
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub params: BTreeMap<String, String>,
}

impl AdapterQuery {
    pub fn new(terms: Vec<String>) -> Self {
        Self {
            terms,
            params: BTreeMap::new(),
        }
    }

    pub fn with_param(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.params.insert(key.into(), value.into());
        self
    }

    /// All terms joined with spaces, for sites with a single search box.
    pub fn text(&self) -> String {
        self.terms
            .iter()
            .map(|t| t.trim())
            .filter(|t| !t.is_empty())
            .collect::<Vec<_>>()
            .join(" ")
    }

    pub fn param(&self, key: &str) -> Option<&str> {
        self.params.get(key).map(|v| v.as_str())
    }

    /// Numeric parameter; unparseable values are ignored.
    pub fn param_f64(&self, key: &str) -> Option<f64> {
        self.param(key).and_then(|v| v.trim().parse().ok())
    }

    pub fn min_price(&self) -> Option<f64> {
        self.param_f64("min_price")
    }

    pub fn max_price(&self) -> Option<f64> {
        self.param_f64("max_price")
    }

    /// Price bounds check. An unknown price always passes.
    pub fn price_in_bounds(&self, price: Option<f64>) -> bool {
        let Some(price) = price else {
            return true;
        };
        if self.min_price().is_some_and(|min| price < min) {
            return false;
        }
        if self.max_price().is_some_and(|max| price > max) {
            return false;
        }
        true
    }
}

/// Collects the listings one adapter produces during one search.
///
/// Owned by the task runner, so whatever was pushed before a failure
/// survives as a partial result. Every pushed listing is stamped with the
/// sink's source id; listings without a title are dropped.
#[derive(Debug)]
pub struct ListingSink {
    source: &'static str,
    listings: Vec<Listing>,
    rejected: usize,
}

impl ListingSink {
    pub fn new(source: &'static str) -> Self {
        Self {
            source,
            listings: Vec::new(),
            rejected: 0,
        }
    }

    pub fn source(&self) -> &'static str {
        self.source
    }

    /// Push one listing. Returns `false` if it was rejected.
    pub fn push(&mut self, mut listing: Listing) -> bool {
        let title = listing.title.trim();
        if title.is_empty() {
            self.rejected += 1;
            debug!(
                target: "audiosearch.runner",
                source = self.source,
                url = %listing.url,
                "dropping listing without title"
            );
            return false;
        }
        if title.len() != listing.title.len() {
            listing.title = title.to_string();
        }
        if listing.source != self.source {
            listing.source = self.source.to_string();
        }
        self.listings.push(listing);
        true
    }

    pub fn extend(&mut self, listings: impl IntoIterator<Item = Listing>) {
        for listing in listings {
            self.push(listing);
        }
    }

    pub fn len(&self) -> usize {
        self.listings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.listings.is_empty()
    }

    pub fn rejected(&self) -> usize {
        self.rejected
    }

    pub fn into_listings(self) -> Vec<Listing> {
        self.listings
    }
}

/// Shared HTTP client with cookies, the configured user agent and a
/// connection-level timeout.
pub fn http_client(user_agent: &str) -> Result<reqwest::Client, AdapterError> {
    let client = reqwest::Client::builder()
        .user_agent(user_agent)
        .cookie_store(true)
        .timeout(HTTP_TIMEOUT)
        .build()?;
    Ok(client)
}

/// GET a page and return its body, mapping non-2xx and bot walls to errors.
pub async fn fetch_html(client: &reqwest::Client, url: &str) -> Result<String, AdapterError> {
    let response = client.get(url).send().await?;
    let status = response.status();
    if !status.is_success() {
        return Err(AdapterError::Status {
            status: status.as_u16(),
            url: url.to_string(),
        });
    }
    let body = response.text().await?;
    if looks_like_challenge(&body) {
        return Err(AdapterError::Blocked);
    }
    Ok(body)
}

fn looks_like_challenge(body: &str) -> bool {
    let lower = body.to_lowercase();
    lower.contains("cf-chl") || lower.contains("g-recaptcha") || lower.contains("h-captcha")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_query_text_and_params() {
        let query = AdapterQuery::new(vec![" yamaha ".into(), "receiver".into()])
            .with_param("min_price", "500")
            .with_param("max_price", "abc");

        assert_eq!(query.text(), "yamaha receiver");
        assert_eq!(query.min_price(), Some(500.0));
        assert_eq!(query.max_price(), None);
    }

    #[test]
    fn test_price_bounds_keep_unknown_price() {
        let query = AdapterQuery::new(vec!["amp".into()])
            .with_param("min_price", "1000")
            .with_param("max_price", "5000");

        assert!(query.price_in_bounds(None));
        assert!(query.price_in_bounds(Some(1000.0)));
        assert!(!query.price_in_bounds(Some(999.0)));
        assert!(!query.price_in_bounds(Some(5001.0)));
    }

    #[test]
    fn test_sink_stamps_source_and_drops_untitled() {
        let mut sink = ListingSink::new("taktoton");
        assert!(sink.push(Listing::new("other", "  Rega Planar 3 ", "https://a")));
        assert!(!sink.push(Listing::new("taktoton", "   ", "https://b")));

        assert_eq!(sink.len(), 1);
        assert_eq!(sink.rejected(), 1);
        let listings = sink.into_listings();
        assert_eq!(listings[0].source, "taktoton");
        assert_eq!(listings[0].title, "Rega Planar 3");
    }

    #[test]
    fn test_challenge_detection() {
        assert!(looks_like_challenge("<div class=\"g-recaptcha\"></div>"));
        assert!(!looks_like_challenge("<ul class=\"product-items\"></ul>"));
    }
}
