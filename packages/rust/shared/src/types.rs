//! Core domain types for feedherald.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Item
// ---------------------------------------------------------------------------

/// One announcement candidate, ingested from the feed or the relay channel.
///
/// `published` keeps the source's own representation (RFC 3339, RFC 2822,
/// or a bare `YYYY-MM-DD HH:MM:SS`); it is normalized when persisted and
/// again when rendered.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Item {
    /// Source-provided identifier, unique per source.
    pub id: String,
    /// Release title, e.g. `My Series Chapter 12`.
    pub title: String,
    /// Link to the release.
    pub link: String,
    /// Author or uploader name.
    pub author: String,
    /// Publication timestamp as supplied by the source.
    pub published: String,
}

// ---------------------------------------------------------------------------
// PendingEntry
// ---------------------------------------------------------------------------

/// Lifecycle state of a row in the pending set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PendingStatus {
    /// Waiting for its role to appear; swept every cycle.
    Pending,
    /// Gave up after the configured number of misses; no longer swept.
    Abandoned,
}

impl PendingStatus {
    /// Column value stored in `pending_entries.status`.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Abandoned => "abandoned",
        }
    }
}

impl std::str::FromStr for PendingStatus {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "pending" => Ok(Self::Pending),
            "abandoned" => Ok(Self::Abandoned),
            other => Err(format!("unknown pending status '{other}'")),
        }
    }
}

/// An item whose role could not be resolved yet, as stored in the ledger.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingEntry {
    /// The deferred item. `published` is in canonical ledger format.
    pub item: Item,
    /// Sweeps that failed to resolve a role for this entry.
    pub attempts: u32,
    /// Current lifecycle state.
    pub status: PendingStatus,
    /// When the entry was (last) queued.
    pub queued_at: DateTime<Utc>,
}
