//! Feed retrieval and normalization.
//!
//! This crate provides:
//! - [`FeedSource`]: the seam the poller fetches through
//! - [`FeedFetcher`]: HTTP + `feed-rs` implementation for RSS/Atom/JSON feeds
//! - [`entries_to_items`]: conversion to [`Item`]s, newest first

mod convert;
mod fetcher;

use async_trait::async_trait;
use feedherald_shared::{Item, Result};

pub use convert::entries_to_items;
pub use fetcher::FeedFetcher;

/// Something that yields the current feed contents.
///
/// Implementations must return items sorted newest first, so the first
/// element is the one the poller compares against the last-seen marker.
#[async_trait]
pub trait FeedSource: Send + Sync {
    /// Fetch and parse the feed once. No retries.
    async fn fetch(&self) -> Result<Vec<Item>>;

    /// Human-readable location, for logs.
    fn describe(&self) -> String;
}
