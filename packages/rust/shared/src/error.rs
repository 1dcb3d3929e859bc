//! Error types for feedherald.
//!
//! Library crates use [`FeedheraldError`] via `thiserror`.
//! The CLI wraps this with `color-eyre` for rich diagnostics.
//!
//! A role that does not resolve is not an error: the resolver returns
//! `None` and the item is deferred to the pending set.

use std::path::PathBuf;

/// Top-level error type for all feedherald operations.
#[derive(Debug, thiserror::Error)]
pub enum FeedheraldError {
    /// Configuration loading or validation error.
    #[error("config error: {message}")]
    Config { message: String },

    /// Network/HTTP error or unparseable body while fetching the feed.
    #[error("fetch error: {0}")]
    Fetch(String),

    /// The whole fetch sequence (all retries) ran past its deadline.
    #[error("timed out after {secs}s: {operation}")]
    Timeout { operation: String, secs: u64 },

    /// Database connection, query, or value normalization error.
    #[error("persistence error: {0}")]
    Persistence(String),

    /// Outbound message rejected, or the target channel is missing.
    #[error("delivery error: {0}")]
    Delivery(String),

    /// Chat platform lookup error (roles, channel history).
    #[error("platform error: {0}")]
    Platform(String),

    /// Filesystem I/O error.
    #[error("I/O error at {path:?}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
}

/// Convenience alias used throughout the codebase.
pub type Result<T> = std::result::Result<T, FeedheraldError>;

impl FeedheraldError {
    /// Create a config error from any displayable message.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config {
            message: msg.into(),
        }
    }

    /// Create a persistence error from any displayable value.
    pub fn persistence(err: impl std::fmt::Display) -> Self {
        Self::Persistence(err.to_string())
    }

    /// Wrap a `std::io::Error` with a path for context.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Whether the failure is worth retrying within the same fetch cycle.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Fetch(_) | Self::Timeout { .. })
    }
}
