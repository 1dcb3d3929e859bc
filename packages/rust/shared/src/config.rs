//! Application configuration for feedherald.
//!
//! Everything is sourced from the environment (optionally seeded from a
//! `.env` file). Missing or malformed required values are fatal at startup;
//! tuning knobs fall back to defaults.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::{FeedheraldError, Result};

/// Default ledger location when `DATABASE_URL` is not set.
const DEFAULT_DATABASE_URL: &str = "var/feedherald.db";

/// Default target of the fixed "Visit Site" button.
const DEFAULT_SITE_URL: &str = "https://komiklovers.com/";

/// Shown in place of secrets by [`Config::redacted`].
const REDACTED: &str = "<redacted>";

// ---------------------------------------------------------------------------
// Config structs
// ---------------------------------------------------------------------------

/// Top-level runtime configuration, built once and shared read-only.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Feed polled by the poller.
    pub feed_url: Url,
    /// Discord bot token.
    pub discord_token: String,
    /// Guild whose roles are matched against release titles.
    pub guild_id: u64,
    /// Channel announcements are posted to.
    pub target_channel_id: u64,
    /// Channel the relay bot posts its line-based messages to.
    pub source_channel_id: u64,
    /// User id of the relay bot.
    pub relay_bot_id: u64,
    /// Prefix for the backlog chat commands.
    pub command_prefix: String,
    /// How series keys are matched against role names.
    pub role_match: RoleMatch,
    /// Seconds between pending sweeps.
    pub sweep_interval_secs: u64,
    /// Misses after which a pending entry is abandoned. `None` keeps it forever.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pending_max_attempts: Option<u32>,
    /// Ledger connection.
    pub database: DatabaseConfig,
    /// Fixed parts of every announcement.
    pub announcement: AnnouncementConfig,
    /// Feed poller timing.
    pub poll: PollConfig,
}

/// Role-name matching policy for the resolver.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RoleMatch {
    /// Role name must equal the series key.
    Exact,
    /// Role name must contain the series key, ignoring case.
    #[default]
    Contains,
}

impl std::str::FromStr for RoleMatch {
    type Err = FeedheraldError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "exact" => Ok(Self::Exact),
            "contains" | "substring" => Ok(Self::Contains),
            other => Err(FeedheraldError::config(format!(
                "ROLE_MATCH must be 'exact' or 'contains', got '{other}'"
            ))),
        }
    }
}

/// Ledger database location.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// Local file path, or a `libsql://` / `https://` URL for a remote database.
    pub url: String,
    /// Auth token for remote databases.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub auth_token: Option<String>,
}

impl DatabaseConfig {
    /// Load only the ledger settings, for commands that never touch the
    /// gateway or the feed.
    pub fn from_env() -> Result<Self> {
        load_dotenv()?;
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from `DATABASE_URL` and `DATABASE_AUTH_TOKEN`.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let env = EnvReader { lookup: &lookup };
        let config = Self {
            url: env
                .get("DATABASE_URL")
                .unwrap_or_else(|| DEFAULT_DATABASE_URL.into()),
            auth_token: env.get("DATABASE_AUTH_TOKEN"),
        };

        if config.is_remote() && config.auth_token.is_none() {
            return Err(FeedheraldError::config(
                "DATABASE_AUTH_TOKEN is required for a remote DATABASE_URL",
            ));
        }
        Ok(config)
    }

    /// Whether `url` points at a remote libsql server.
    pub fn is_remote(&self) -> bool {
        ["libsql://", "https://", "http://"]
            .iter()
            .any(|scheme| self.url.starts_with(scheme))
    }
}

/// Fixed announcement decorations.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnnouncementConfig {
    /// Target of the "Visit Site" button.
    pub site_url: Url,
    /// Role mentioned in front of every announcement, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub always_mention_role_id: Option<u64>,
}

/// Feed poller timing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PollConfig {
    /// Seconds between poll ticks.
    pub interval_secs: u64,
    /// Fetch attempts per tick.
    pub retries: u32,
    /// Seconds between fetch attempts.
    pub retry_delay_secs: u64,
    /// Deadline in seconds for the whole retry sequence.
    pub timeout_secs: u64,
}

impl Default for PollConfig {
    fn default() -> Self {
        Self {
            interval_secs: 60,
            retries: 3,
            retry_delay_secs: 5,
            timeout_secs: 60,
        }
    }
}

impl PollConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }

    pub fn retry_delay(&self) -> Duration {
        Duration::from_secs(self.retry_delay_secs)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

// ---------------------------------------------------------------------------
// Loading
// ---------------------------------------------------------------------------

impl Config {
    /// Load from the process environment, after seeding it from `.env` if present.
    pub fn from_env() -> Result<Self> {
        load_dotenv()?;
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from an arbitrary key lookup. All missing required keys are
    /// reported together.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let env = EnvReader { lookup: &lookup };

        let mut missing: Vec<&str> = [
            "RSS_URL",
            "DISCORD_TOKEN",
            "SOURCE_CHANNEL_ID",
            "OTHER_BOT_ID",
            "GUILD_ID",
        ]
        .into_iter()
        .filter(|key| env.get(key).is_none())
        .collect();
        if env.first_of(&["TARGET_CHANNEL_ID", "CHANNEL_ID"]).is_none() {
            missing.push("TARGET_CHANNEL_ID");
        }

        if !missing.is_empty() {
            return Err(FeedheraldError::config(format!(
                "missing required environment variables: {}",
                missing.join(", ")
            )));
        }

        let target_channel = env
            .first_of(&["TARGET_CHANNEL_ID", "CHANNEL_ID"])
            .unwrap_or_default();

        let defaults = PollConfig::default();
        let config = Self {
            feed_url: parse_url("RSS_URL", &env.required("RSS_URL")?)?,
            discord_token: env.required("DISCORD_TOKEN")?,
            guild_id: parse_id("GUILD_ID", &env.required("GUILD_ID")?)?,
            target_channel_id: parse_id("TARGET_CHANNEL_ID", &target_channel)?,
            source_channel_id: parse_id("SOURCE_CHANNEL_ID", &env.required("SOURCE_CHANNEL_ID")?)?,
            relay_bot_id: parse_id("OTHER_BOT_ID", &env.required("OTHER_BOT_ID")?)?,
            command_prefix: env.get("COMMAND_PREFIX").unwrap_or_else(|| "!".into()),
            role_match: env
                .get("ROLE_MATCH")
                .map(|v| v.parse::<RoleMatch>())
                .transpose()?
                .unwrap_or_default(),
            database: DatabaseConfig::from_lookup(&lookup)?,
            announcement: AnnouncementConfig {
                site_url: parse_url(
                    "SITE_URL",
                    &env.get("SITE_URL").unwrap_or_else(|| DEFAULT_SITE_URL.into()),
                )?,
                always_mention_role_id: env
                    .get("ALWAYS_MENTION_ROLE_ID")
                    .map(|v| parse_id("ALWAYS_MENTION_ROLE_ID", &v))
                    .transpose()?,
            },
            poll: PollConfig {
                interval_secs: env.number("POLL_INTERVAL_SECS", defaults.interval_secs)?,
                retries: env.number("FETCH_RETRIES", defaults.retries)?,
                retry_delay_secs: env.number("FETCH_RETRY_DELAY_SECS", defaults.retry_delay_secs)?,
                timeout_secs: env.number("FETCH_TIMEOUT_SECS", defaults.timeout_secs)?,
            },
            sweep_interval_secs: env.number("SWEEP_INTERVAL_SECS", 60)?,
            pending_max_attempts: env
                .get("PENDING_MAX_ATTEMPTS")
                .map(|v| parse_number::<u32>("PENDING_MAX_ATTEMPTS", &v))
                .transpose()?,
        };

        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        if self.poll.retries == 0 {
            return Err(FeedheraldError::config("FETCH_RETRIES must be at least 1"));
        }
        if self.poll.interval_secs == 0 || self.sweep_interval_secs == 0 {
            return Err(FeedheraldError::config(
                "POLL_INTERVAL_SECS and SWEEP_INTERVAL_SECS must be positive",
            ));
        }
        if self.command_prefix.trim().is_empty() {
            return Err(FeedheraldError::config("COMMAND_PREFIX must not be blank"));
        }
        Ok(())
    }

    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweep_interval_secs)
    }

    /// Copy with secrets replaced, for display.
    pub fn redacted(&self) -> Self {
        let mut copy = self.clone();
        copy.discord_token = REDACTED.into();
        if copy.database.auth_token.is_some() {
            copy.database.auth_token = Some(REDACTED.into());
        }
        copy
    }

    /// Render as pretty TOML (secrets redacted).
    pub fn to_toml(&self) -> Result<String> {
        toml::to_string_pretty(&self.redacted()).map_err(|e| FeedheraldError::config(e.to_string()))
    }
}

/// Seed the process environment from `.env`, if there is one.
fn load_dotenv() -> Result<()> {
    match dotenvy::dotenv() {
        Ok(path) => tracing::debug!(?path, "loaded .env file"),
        Err(e) if e.not_found() => {}
        Err(e) => return Err(FeedheraldError::config(format!("failed to read .env: {e}"))),
    }
    Ok(())
}

/// Trimmed, non-empty view over a key lookup.
struct EnvReader<'a, F: Fn(&str) -> Option<String>> {
    lookup: &'a F,
}

impl<F: Fn(&str) -> Option<String>> EnvReader<'_, F> {
    fn get(&self, key: &str) -> Option<String> {
        (self.lookup)(key)
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
    }

    fn first_of(&self, keys: &[&str]) -> Option<String> {
        keys.iter().find_map(|key| self.get(key))
    }

    fn required(&self, key: &str) -> Result<String> {
        self.get(key)
            .ok_or_else(|| FeedheraldError::config(format!("{key} is not set")))
    }

    fn number<T: std::str::FromStr>(&self, key: &str, default: T) -> Result<T> {
        match self.get(key) {
            Some(raw) => parse_number(key, &raw),
            None => Ok(default),
        }
    }
}

fn parse_number<T: std::str::FromStr>(key: &str, raw: &str) -> Result<T> {
    raw.parse()
        .map_err(|_| FeedheraldError::config(format!("{key} must be a number, got '{raw}'")))
}

/// Discord snowflakes are non-zero u64s.
fn parse_id(key: &str, raw: &str) -> Result<u64> {
    match raw.parse::<u64>() {
        Ok(0) | Err(_) => Err(FeedheraldError::config(format!(
            "{key} must be a non-zero numeric id, got '{raw}'"
        ))),
        Ok(id) => Ok(id),
    }
}

fn parse_url(key: &str, raw: &str) -> Result<Url> {
    Url::parse(raw).map_err(|e| FeedheraldError::config(format!("{key} '{raw}' is not a valid URL: {e}")))
}
