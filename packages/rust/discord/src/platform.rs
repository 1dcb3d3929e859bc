//! [`ChatPlatform`] over the Discord REST API.

use std::sync::Arc;

use async_trait::async_trait;
use feedherald_core::{Announcement, ChannelMessage, ChatPlatform, GuildRole};
use feedherald_shared::{FeedheraldError, Result};
use serenity::all::{
    ChannelId, CreateActionRow, CreateButton, CreateEmbed, CreateEmbedFooter, CreateMessage,
    GetMessages, GuildId, Http,
};
use tracing::debug;

/// Discord-backed platform. Shares the client's HTTP handle.
#[derive(Clone)]
pub struct SerenityPlatform {
    http: Arc<Http>,
}

impl SerenityPlatform {
    pub fn new(http: Arc<Http>) -> Self {
        Self { http }
    }
}

/// Build the outgoing message for `announcement`.
pub fn build_message(announcement: &Announcement) -> CreateMessage {
    let embed = CreateEmbed::new()
        .title(&announcement.title)
        .colour(announcement.colour)
        .footer(CreateEmbedFooter::new(&announcement.footer));

    let buttons: Vec<CreateButton> = announcement
        .buttons
        .iter()
        .map(|b| CreateButton::new_link(&b.url).label(&b.label))
        .collect();

    let mut message = CreateMessage::new()
        .content(&announcement.content)
        .embed(embed);
    if !buttons.is_empty() {
        message = message.components(vec![CreateActionRow::Buttons(buttons)]);
    }
    message
}

#[async_trait]
impl ChatPlatform for SerenityPlatform {
    async fn guild_roles(&self, guild_id: u64) -> Result<Vec<GuildRole>> {
        let roles = GuildId::new(guild_id)
            .roles(&self.http)
            .await
            .map_err(|e| FeedheraldError::Platform(format!("guild {guild_id} roles: {e}")))?;

        Ok(roles
            .into_values()
            .map(|role| GuildRole {
                id: role.id.get(),
                name: role.name,
            })
            .collect())
    }

    async fn send_announcement(&self, announcement: &Announcement) -> Result<()> {
        let channel = ChannelId::new(announcement.channel_id);
        let sent = channel
            .send_message(&self.http, build_message(announcement))
            .await
            .map_err(|e| FeedheraldError::Delivery(format!("channel {channel}: {e}")))?;

        debug!(message_id = %sent.id, channel_id = %channel, "announcement posted");
        Ok(())
    }

    async fn recent_messages(&self, channel_id: u64, limit: u8) -> Result<Vec<ChannelMessage>> {
        let messages = ChannelId::new(channel_id)
            .messages(&self.http, GetMessages::new().limit(limit))
            .await
            .map_err(|e| FeedheraldError::Platform(format!("channel {channel_id} history: {e}")))?;

        Ok(messages
            .into_iter()
            .map(|m| ChannelMessage {
                author_id: m.author.id.get(),
                content: m.content,
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use feedherald_core::LinkButton;
    use serde_json::json;

    fn announcement(buttons: Vec<LinkButton>) -> Announcement {
        Announcement {
            channel_id: 1,
            content: "<@&42> Read Now!".into(),
            title: "My Series Chapter 12".into(),
            colour: 0x78478C,
            footer: "Posted by uploader • 01 January 2024, 01:05 PM".into(),
            buttons,
        }
    }

    #[test]
    fn message_carries_embed_and_link_buttons() {
        let message = build_message(&announcement(vec![
            LinkButton {
                label: "Read Now".into(),
                url: "https://example.com/a".into(),
            },
            LinkButton {
                label: "Visit Site".into(),
                url: "https://site.example.com/".into(),
            },
        ]));
        let value = serde_json::to_value(&message).unwrap();

        assert_eq!(value["content"], json!("<@&42> Read Now!"));
        let embed = &value["embeds"][0];
        assert_eq!(embed["title"], json!("My Series Chapter 12"));
        assert_eq!(embed["color"], json!(0x78478C));
        assert_eq!(
            embed["footer"]["text"],
            json!("Posted by uploader • 01 January 2024, 01:05 PM")
        );
        let buttons = &value["components"][0]["components"];
        assert_eq!(buttons[0]["url"], json!("https://example.com/a"));
        assert_eq!(buttons[1]["label"], json!("Visit Site"));
    }

    #[test]
    fn no_buttons_means_no_action_row() {
        let value = serde_json::to_value(build_message(&announcement(vec![]))).unwrap();
        assert!(value.get("components").is_none_or(|c| c.as_array().is_none_or(Vec::is_empty)));
    }
}
