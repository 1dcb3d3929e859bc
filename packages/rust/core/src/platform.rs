//! Chat platform seam.
//!
//! The bridge talks to the chat service only through [`ChatPlatform`], so the
//! reconciliation logic can run against the real gateway or an in-memory fake.

use async_trait::async_trait;
use feedherald_shared::Result;

/// Embed colour used for every announcement.
pub const ANNOUNCEMENT_COLOUR: u32 = 0x78_47_8C;

/// A role as seen in the guild's role snapshot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GuildRole {
    pub id: u64,
    pub name: String,
}

impl GuildRole {
    /// Mention token that pings members of this role.
    pub fn mention(&self) -> String {
        role_mention(self.id)
    }
}

/// Mention token for a role id.
pub fn role_mention(id: u64) -> String {
    format!("<@&{id}>")
}

/// A message read back from channel history.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChannelMessage {
    pub author_id: u64,
    pub content: String,
}

/// A URL button attached under the embed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinkButton {
    pub label: String,
    pub url: String,
}

/// A fully rendered announcement, ready to post.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Announcement {
    /// Channel the announcement is posted to.
    pub channel_id: u64,
    /// Plain message body; carries the role mentions.
    pub content: String,
    /// Embed title.
    pub title: String,
    /// Embed colour as `0xRRGGBB`.
    pub colour: u32,
    /// Embed footer text.
    pub footer: String,
    /// Link buttons, in display order.
    pub buttons: Vec<LinkButton>,
}

/// Operations the bridge needs from the chat service.
#[async_trait]
pub trait ChatPlatform: Send + Sync {
    /// Current role snapshot of `guild_id`.
    async fn guild_roles(&self, guild_id: u64) -> Result<Vec<GuildRole>>;

    /// Post an announcement to its channel.
    async fn send_announcement(&self, announcement: &Announcement) -> Result<()>;

    /// Up to `limit` most recent messages of `channel_id`, newest first.
    async fn recent_messages(&self, channel_id: u64, limit: u8) -> Result<Vec<ChannelMessage>>;
}
