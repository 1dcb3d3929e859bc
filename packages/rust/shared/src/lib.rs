//! Shared types, error model, and configuration for feedherald.
//!
//! This crate is the foundation depended on by all other feedherald crates.
//! It provides:
//! - [`FeedheraldError`], the unified error type
//! - Domain types ([`Item`], [`PendingEntry`], [`PendingStatus`])
//! - Timestamp normalization for the ledger and for display
//! - Configuration ([`Config`], loaded from the environment)

pub mod config;
pub mod error;
pub mod timestamp;
pub mod types;

// Re-export public API at crate root for ergonomic imports.
pub use config::{AnnouncementConfig, Config, DatabaseConfig, PollConfig, RoleMatch};
pub use error::{FeedheraldError, Result};
pub use timestamp::{display_timestamp, normalize_timestamp, parse_timestamp};
pub use types::{Item, PendingEntry, PendingStatus};
