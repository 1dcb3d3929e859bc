//! HTTP feed fetcher.

use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use feedherald_shared::{FeedheraldError, Item, Result};
use reqwest::Client;
use tracing::{debug, instrument};
use url::Url;

use crate::FeedSource;
use crate::convert::entries_to_items;

/// User-Agent string for feed requests.
const USER_AGENT: &str = concat!("feedherald/", env!("CARGO_PKG_VERSION"));

/// Per-request timeout. The poller also bounds the whole retry sequence.
const REQUEST_TIMEOUT_SECS: u64 = 30;

/// Fetches and parses an RSS/Atom/JSON feed over HTTP.
pub struct FeedFetcher {
    url: Url,
    client: Client,
}

impl FeedFetcher {
    /// Create a fetcher for `url`.
    pub fn new(url: Url) -> Result<Self> {
        let client = Client::builder()
            .user_agent(USER_AGENT)
            .redirect(reqwest::redirect::Policy::limited(10))
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()
            .map_err(|e| FeedheraldError::Fetch(format!("failed to build HTTP client: {e}")))?;

        Ok(Self { url, client })
    }
}

#[async_trait]
impl FeedSource for FeedFetcher {
    #[instrument(skip_all, fields(url = %self.url))]
    async fn fetch(&self) -> Result<Vec<Item>> {
        let response = self
            .client
            .get(self.url.as_str())
            .send()
            .await
            .map_err(|e| FeedheraldError::Fetch(format!("{}: {e}", self.url)))?;

        let status = response.status();
        if !status.is_success() {
            return Err(FeedheraldError::Fetch(format!("{}: HTTP {status}", self.url)));
        }

        let body = response
            .bytes()
            .await
            .map_err(|e| FeedheraldError::Fetch(format!("{}: body read failed: {e}", self.url)))?;

        debug!(bytes = body.len(), "feed downloaded");

        // Parsing is synchronous; keep it off the event loop.
        let fetched_at = Utc::now();
        let items = tokio::task::spawn_blocking(move || {
            feed_rs::parser::parse(&body[..]).map(|feed| entries_to_items(feed, fetched_at))
        })
        .await
        .map_err(|e| FeedheraldError::Fetch(format!("feed parse task failed: {e}")))?
        .map_err(|e| FeedheraldError::Fetch(format!("{}: unparseable feed: {e}", self.url)))?;

        debug!(items = items.len(), "feed parsed");
        Ok(items)
    }

    fn describe(&self) -> String {
        self.url.to_string()
    }
}
