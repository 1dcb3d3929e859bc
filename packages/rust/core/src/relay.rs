//! Relay bot message intake.
//!
//! Another bot posts releases into the source channel as plain text, one
//! field per line:
//!
//! ```text
//! <title>
//! <link>
//! <author>
//! <published>
//! [<id>]
//! ```

use feedherald_shared::Item;
use sha2::{Digest, Sha256};
use tracing::{debug, info, instrument, warn};

use crate::context::BridgeContext;
use crate::notifier::{DeliveryOutcome, Notifier};

/// Minimum number of lines in a well-formed relay message.
const MIN_LINES: usize = 4;

/// Parse a relay message. `None` when it is malformed.
pub fn parse_relay_message(content: &str) -> Option<Item> {
    let lines: Vec<&str> = content.trim().lines().map(str::trim).collect();
    if lines.len() < MIN_LINES {
        return None;
    }

    let (title, link) = (lines[0], lines[1]);
    if title.is_empty() || link.is_empty() {
        return None;
    }

    let id = lines
        .get(4)
        .filter(|id| !id.is_empty())
        .map(|id| id.to_string())
        .unwrap_or_else(|| fallback_id(title, link));

    Some(Item {
        id,
        title: title.to_string(),
        link: link.to_string(),
        author: lines[2].to_string(),
        published: lines[3].to_string(),
    })
}

/// Deterministic id for relay messages that carry none.
fn fallback_id(title: &str, link: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(title.as_bytes());
    hasher.update(b"\n");
    hasher.update(link.as_bytes());
    format!("relay-{:x}", hasher.finalize())
}

/// Turns relay bot posts into announcements.
#[derive(Clone)]
pub struct RelayListener {
    ctx: BridgeContext,
    notifier: Notifier,
}

impl RelayListener {
    pub fn new(ctx: BridgeContext) -> Self {
        let notifier = Notifier::new(ctx.clone());
        Self { ctx, notifier }
    }

    /// Whether a message from `author_id` in `channel_id` is a relay post.
    pub fn accepts(&self, channel_id: u64, author_id: u64) -> bool {
        channel_id == self.ctx.config.source_channel_id && author_id == self.ctx.config.relay_bot_id
    }

    /// Handle a message. Returns `None` when the message is ignored.
    #[instrument(skip(self, content))]
    pub async fn on_message(
        &self,
        channel_id: u64,
        author_id: u64,
        content: &str,
    ) -> Option<DeliveryOutcome> {
        if !self.accepts(channel_id, author_id) {
            return None;
        }

        let Some(item) = parse_relay_message(content) else {
            warn!(lines = content.lines().count(), "ignoring malformed relay message");
            return None;
        };

        info!(entry_id = %item.id, title = %item.title, "relay entry received");
        let outcome = self.notifier.deliver(&item).await;
        debug!(?outcome, "relay entry handled");
        Some(outcome)
    }
}
