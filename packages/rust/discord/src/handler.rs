//! Gateway event handling for the bridge.

use std::sync::Arc;

use async_trait::async_trait;
use feedherald_core::{Bridge, IncomingMessage};
use serenity::all::{Context, EventHandler, Message, Ready};
use tracing::{error, info};

use crate::{MESSAGE_LIMIT, split_reply};

/// Gateway event handler; adapts events onto the [`Bridge`].
pub struct Handler {
    bridge: Arc<Bridge>,
}

impl Handler {
    pub fn new(bridge: Arc<Bridge>) -> Self {
        Self { bridge }
    }
}

#[async_trait]
impl EventHandler for Handler {
    async fn ready(&self, _ctx: Context, ready: Ready) {
        info!(user = %ready.user.name, guilds = ready.guilds.len(), "logged in");
        self.bridge.start_background_tasks();
    }

    async fn message(&self, ctx: Context, msg: Message) {
        let incoming = IncomingMessage {
            channel_id: msg.channel_id.get(),
            author_id: msg.author.id.get(),
            author_is_bot: msg.author.bot,
            content: &msg.content,
        };

        let Some(reply) = self.bridge.handle_message(incoming).await else {
            return;
        };
        for chunk in split_reply(&reply, MESSAGE_LIMIT) {
            if let Err(e) = msg.channel_id.say(&ctx.http, chunk).await {
                error!(channel_id = %msg.channel_id, error = %e, "failed to reply to command");
                return;
            }
        }
    }
}
