//! Periodic feed polling.
//!
//! Each tick fetches the feed, compares the newest item against the ledger's
//! last-seen marker, and announces the item if it is new. The marker is
//! written before the announcement goes out, so a crash mid-send never
//! causes a duplicate.

use std::sync::Arc;

use feedherald_feed::FeedSource;
use feedherald_shared::{FeedheraldError, Item, Result};
use tokio::time::{MissedTickBehavior, sleep, timeout};
use tracing::{debug, error, info, instrument, warn};

use crate::context::BridgeContext;
use crate::notifier::{DeliveryOutcome, Notifier};

/// Result of one poll cycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PollOutcome {
    /// The newest item is the one already recorded.
    Unchanged { id: String },
    /// A new item was recorded and handed to the notifier.
    Processed { id: String, delivery: DeliveryOutcome },
    /// The feed had no entries.
    Empty,
    /// The cycle was abandoned; retried on the next tick.
    Failed(String),
}

/// Polls the feed on a fixed interval.
pub struct FeedPoller {
    ctx: BridgeContext,
    source: Arc<dyn FeedSource>,
    notifier: Notifier,
}

impl FeedPoller {
    pub fn new(ctx: BridgeContext, source: Arc<dyn FeedSource>) -> Self {
        let notifier = Notifier::new(ctx.clone());
        Self {
            ctx,
            source,
            notifier,
        }
    }

    /// Fetch the feed, retrying transient failures.
    ///
    /// The whole sequence, retry delays included, is bounded by the
    /// configured timeout.
    pub async fn fetch_with_retry(&self) -> Result<Vec<Item>> {
        let poll = &self.ctx.config.poll;

        let attempts = async {
            let mut attempt = 1;
            loop {
                match self.source.fetch().await {
                    Ok(items) => return Ok(items),
                    Err(e) if attempt < poll.retries && e.is_transient() => {
                        warn!(attempt, max = poll.retries, error = %e, "error fetching feed, retrying");
                        sleep(poll.retry_delay()).await;
                        attempt += 1;
                    }
                    Err(e) => return Err(e),
                }
            }
        };

        timeout(poll.timeout(), attempts)
            .await
            .map_err(|_| FeedheraldError::Timeout {
                operation: format!("fetching {}", self.source.describe()),
                secs: poll.timeout_secs,
            })?
    }

    /// Run one poll cycle. Never fails; problems are logged and reported in
    /// the outcome.
    #[instrument(skip_all)]
    pub async fn tick(&self) -> PollOutcome {
        info!(source = %self.source.describe(), "checking feed");

        let items = match self.fetch_with_retry().await {
            Ok(items) => items,
            Err(e) => {
                error!(error = %e, "error checking feed");
                return PollOutcome::Failed(e.to_string());
            }
        };

        let Some(newest) = items.into_iter().next() else {
            info!("feed has no entries");
            return PollOutcome::Empty;
        };

        let last_seen = match self.ctx.ledger.last_seen_id().await {
            Ok(id) => id,
            Err(e) => {
                error!(error = %e, "failed to read last seen entry");
                return PollOutcome::Failed(e.to_string());
            }
        };

        if last_seen.as_deref() == Some(newest.id.as_str()) {
            debug!(entry_id = %newest.id, "no new entries");
            return PollOutcome::Unchanged { id: newest.id };
        }

        info!(entry_id = %newest.id, title = %newest.title, "new entry found");
        if let Err(e) = self.ctx.ledger.set_last_seen(&newest).await {
            error!(entry_id = %newest.id, error = %e, "failed to record last seen entry");
        }

        let delivery = self.notifier.deliver(&newest).await;
        PollOutcome::Processed {
            id: newest.id,
            delivery,
        }
    }

    /// Tick forever on the configured interval. The first tick runs
    /// immediately.
    pub async fn run(self) {
        let mut interval = tokio::time::interval(self.ctx.config.poll.interval());
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        info!(
            every_secs = self.ctx.config.poll.interval_secs,
            "feed poller started"
        );

        loop {
            interval.tick().await;
            let outcome = self.tick().await;
            debug!(?outcome, "poll cycle finished");
        }
    }
}
