//! Title → role mention resolution.
//!
//! Release titles look like `"<Series> Chapter <N>"`. The series part is
//! matched against guild role names to find who to ping.

use std::sync::LazyLock;

use feedherald_shared::RoleMatch;
use regex::Regex;
use tracing::{debug, instrument, warn};

use crate::context::BridgeContext;
use crate::platform::GuildRole;

/// Trailing `Chapter N` / `Episode N` marker, with optional decimal part.
static RELEASE_SUFFIX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^(.*?)\s*\b(?:chapter|episode)\s+\d+(?:\.\d+)?\s*$")
        .expect("valid regex")
});

/// Series key for `title`: the title with any trailing release marker removed.
///
/// Titles without a marker are their own key.
pub fn series_key(title: &str) -> String {
    let title = title.trim();
    match RELEASE_SUFFIX.captures(title) {
        Some(caps) => caps[1].trim().to_string(),
        None => title.to_string(),
    }
}

/// Pick the role for `key` under `policy`.
///
/// `Contains` prefers a case-insensitive exact name, then the shortest name
/// containing the key; equal lengths fall back to the lowest role id.
pub fn match_role<'a>(roles: &'a [GuildRole], key: &str, policy: RoleMatch) -> Option<&'a GuildRole> {
    if key.is_empty() {
        return None;
    }
    let candidates = roles.iter().filter(|r| r.name != "@everyone");

    match policy {
        RoleMatch::Exact => candidates.filter(|r| r.name == key).min_by_key(|r| r.id),
        RoleMatch::Contains => {
            let needle = key.to_lowercase();
            candidates
                .clone()
                .filter(|r| r.name.to_lowercase() == needle)
                .min_by_key(|r| r.id)
                .or_else(|| {
                    candidates
                        .filter(|r| r.name.to_lowercase().contains(&needle))
                        .min_by_key(|r| (r.name.len(), r.id))
                })
        }
    }
}

/// Resolves titles against the live role snapshot.
#[derive(Clone)]
pub struct RoleResolver {
    ctx: BridgeContext,
}

impl RoleResolver {
    pub fn new(ctx: BridgeContext) -> Self {
        Self { ctx }
    }

    /// Fetch the guild's roles. `None` when the guild cannot be read.
    pub async fn snapshot(&self) -> Option<Vec<GuildRole>> {
        let guild_id = self.ctx.config.guild_id;
        match self.ctx.platform.guild_roles(guild_id).await {
            Ok(roles) => Some(roles),
            Err(e) => {
                warn!(guild_id, error = %e, "guild role snapshot unavailable");
                None
            }
        }
    }

    /// Resolve `title` against an already fetched snapshot.
    pub fn resolve_in(&self, roles: &[GuildRole], title: &str) -> Option<String> {
        let key = series_key(title);
        let role = match_role(roles, &key, self.ctx.config.role_match);
        match role {
            Some(role) => debug!(series = %key, role = %role.name, "matched role"),
            None => debug!(series = %key, "no matching role"),
        }
        role.map(GuildRole::mention)
    }

    /// Mention token for the role matching `title`, if any.
    #[instrument(skip_all, fields(title = %title))]
    pub async fn resolve(&self, title: &str) -> Option<String> {
        let roles = self.snapshot().await?;
        self.resolve_in(&roles, title)
    }
}
