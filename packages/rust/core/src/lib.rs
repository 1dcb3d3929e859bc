//! Reconciliation logic for feedherald.
//!
//! This crate turns feed items and relay posts into role-mentioning
//! announcements: polling, deduplication against the ledger, role
//! resolution, deferral of unresolved items and their periodic retry.
//! The chat service is reached only through [`platform::ChatPlatform`].

pub mod backlog;
pub mod bridge;
pub mod context;
pub mod notifier;
pub mod platform;
pub mod poller;
pub mod relay;
pub mod resolver;
pub mod sweeper;

#[cfg(test)]
mod testing;

pub use bridge::{BackgroundTasks, Bridge, IncomingMessage};
pub use context::BridgeContext;
pub use notifier::{DeliveryOutcome, Notifier};
pub use platform::{Announcement, ChannelMessage, ChatPlatform, GuildRole, LinkButton};
pub use poller::{FeedPoller, PollOutcome};
pub use sweeper::{PendingSweeper, SweepSummary};
