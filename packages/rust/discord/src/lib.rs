//! Discord gateway adapter for feedherald.
//!
//! Connects the [`Bridge`] to a Discord guild: [`SerenityPlatform`] carries
//! outgoing calls, [`handler::Handler`] feeds gateway events in.

pub mod handler;
pub mod platform;

use std::sync::Arc;

use feedherald_core::{Bridge, BridgeContext};
use feedherald_feed::FeedFetcher;
use feedherald_shared::{Config, FeedheraldError, Result};
use feedherald_storage::Ledger;
use serenity::Client;
use serenity::all::{GatewayIntents, Http};
use tracing::{info, warn};

pub use handler::Handler;
pub use platform::SerenityPlatform;

/// Discord's per-message content limit.
pub const MESSAGE_LIMIT: usize = 2000;

/// Open the ledger, connect to the gateway and run until Ctrl-C.
pub async fn run(config: Config) -> Result<()> {
    let ledger = Ledger::open(&config.database).await?;
    let source = Arc::new(FeedFetcher::new(config.feed_url.clone())?);

    let http = Arc::new(Http::new(&config.discord_token));
    let platform = Arc::new(SerenityPlatform::new(http));

    let token = config.discord_token.clone();
    let ctx = BridgeContext::new(config, ledger, platform);
    let bridge = Arc::new(Bridge::new(ctx, source));

    let intents =
        GatewayIntents::GUILDS | GatewayIntents::GUILD_MESSAGES | GatewayIntents::MESSAGE_CONTENT;
    let mut client = Client::builder(&token, intents)
        .event_handler(Handler::new(bridge))
        .await
        .map_err(|e| FeedheraldError::Platform(format!("failed to build client: {e}")))?;

    let shard_manager = client.shard_manager.clone();
    tokio::spawn(async move {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "failed to listen for Ctrl-C");
            return;
        }
        info!("shutting down");
        shard_manager.shutdown_all().await;
    });

    info!("connecting to gateway");
    client
        .start_autosharded()
        .await
        .map_err(|e| FeedheraldError::Platform(format!("gateway error: {e}")))
}

/// Split `text` into chunks that fit one message, breaking on lines where
/// possible.
pub fn split_reply(text: &str, limit: usize) -> Vec<String> {
    let mut chunks = Vec::new();
    let mut current = String::new();

    for line in text.lines() {
        let mut line = line;
        while line.chars().count() > limit {
            if !current.is_empty() {
                chunks.push(std::mem::take(&mut current));
            }
            let cut = line
                .char_indices()
                .nth(limit)
                .map(|(i, _)| i)
                .unwrap_or(line.len());
            chunks.push(line[..cut].to_string());
            line = &line[cut..];
        }

        let needed = if current.is_empty() { 0 } else { 1 } + line.chars().count();
        if current.chars().count() + needed > limit {
            chunks.push(std::mem::take(&mut current));
        }
        if !current.is_empty() {
            current.push('\n');
        }
        current.push_str(line);
    }

    if !current.is_empty() {
        chunks.push(current);
    }
    chunks
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_reply_is_one_chunk() {
        assert_eq!(split_reply("1. A\n2. B", MESSAGE_LIMIT), ["1. A\n2. B"]);
    }

    #[test]
    fn long_listing_splits_on_lines() {
        let listing = (1..=5).map(|i| format!("{i}. Title")).collect::<Vec<_>>().join("\n");
        let chunks = split_reply(&listing, 20);

        assert_eq!(chunks, ["1. Title\n2. Title", "3. Title\n4. Title", "5. Title"]);
        assert!(chunks.iter().all(|c| c.chars().count() <= 20));
    }

    #[test]
    fn oversized_line_is_cut() {
        let chunks = split_reply(&"x".repeat(25), 10);
        assert_eq!(chunks.len(), 3);
        assert_eq!(chunks[2], "xxxxx");
    }
}
