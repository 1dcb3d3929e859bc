//! Operator chat commands over the relay backlog.
//!
//! `list`, `send <n>` and `sendall` work on the relay posts still visible in
//! the source channel's recent history, minus anything already queued or
//! announced.

use feedherald_shared::{Item, Result};
use tracing::{info, instrument, warn};

use crate::context::BridgeContext;
use crate::notifier::{DeliveryOutcome, Notifier};
use crate::relay::parse_relay_message;

/// How far back in the source channel the backlog looks.
pub const HISTORY_LIMIT: u8 = 100;

/// A parsed operator command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BacklogCommand {
    List,
    /// 1-based index into the listing.
    Send(usize),
    SendAll,
}

impl BacklogCommand {
    /// Parse `content` under `prefix`.
    ///
    /// `None` when the message is not a backlog command at all; `Some(Err)`
    /// carries a usage message for a recognized but malformed command.
    pub fn parse(content: &str, prefix: &str) -> Option<std::result::Result<Self, String>> {
        let rest = content.trim().strip_prefix(prefix)?;
        let mut words = rest.split_whitespace();

        match words.next()? {
            "list" => Some(Ok(Self::List)),
            "sendall" => Some(Ok(Self::SendAll)),
            "send" => Some(
                words
                    .next()
                    .and_then(|n| n.parse::<usize>().ok())
                    .filter(|n| *n > 0)
                    .map(Self::Send)
                    .ok_or_else(|| format!("Usage: {prefix}send <number>")),
            ),
            _ => None,
        }
    }
}

/// Executes backlog commands and renders their replies.
#[derive(Clone)]
pub struct Backlog {
    ctx: BridgeContext,
    notifier: Notifier,
}

impl Backlog {
    pub fn new(ctx: BridgeContext) -> Self {
        let notifier = Notifier::new(ctx.clone());
        Self { ctx, notifier }
    }

    /// Relay posts from recent source channel history, newest first,
    /// excluding entries already queued or announced.
    pub async fn entries(&self) -> Result<Vec<Item>> {
        let config = &self.ctx.config;
        let messages = self
            .ctx
            .platform
            .recent_messages(config.source_channel_id, HISTORY_LIMIT)
            .await?;
        let queued = self.ctx.ledger.pending_ids().await?;
        let delivered = self.ctx.ledger.delivered_ids().await?;

        Ok(messages
            .into_iter()
            .filter(|m| m.author_id == config.relay_bot_id)
            .filter_map(|m| parse_relay_message(&m.content))
            .filter(|item| !queued.contains(&item.id) && !delivered.contains(&item.id))
            .collect())
    }

    /// Run `command` and return the reply text.
    #[instrument(skip(self))]
    pub async fn execute(&self, command: BacklogCommand) -> String {
        match self.try_execute(command).await {
            Ok(reply) => reply,
            Err(e) => {
                warn!(error = %e, "backlog command failed");
                format!("An error occurred: {e}")
            }
        }
    }

    async fn try_execute(&self, command: BacklogCommand) -> Result<String> {
        let entries = self.entries().await?;

        match command {
            BacklogCommand::List => Ok(render_list(&entries)),
            BacklogCommand::Send(n) => {
                let Some(item) = n.checked_sub(1).and_then(|i| entries.get(i)) else {
                    return Ok(format!("Invalid number. Choose between 1 and {}.", entries.len()));
                };
                Ok(match self.notifier.deliver(item).await {
                    DeliveryOutcome::Sent => format!("Sent: {}", item.title),
                    DeliveryOutcome::Deferred => {
                        format!("No role found for {}; queued for retry.", item.title)
                    }
                    DeliveryOutcome::Failed(reason) => {
                        format!("Failed to send {}: {reason}", item.title)
                    }
                })
            }
            BacklogCommand::SendAll => {
                if entries.is_empty() {
                    return Ok("No entries to send.".into());
                }
                let (mut sent, mut deferred, mut failed) = (0, 0, 0);
                for item in &entries {
                    match self.notifier.deliver(item).await {
                        DeliveryOutcome::Sent => sent += 1,
                        DeliveryOutcome::Deferred => deferred += 1,
                        DeliveryOutcome::Failed(_) => failed += 1,
                    }
                }
                info!(sent, deferred, failed, "backlog sendall finished");
                Ok(format!(
                    "Processed {} entries: {sent} sent, {deferred} queued, {failed} failed.",
                    entries.len()
                ))
            }
        }
    }
}

fn render_list(entries: &[Item]) -> String {
    if entries.is_empty() {
        return "No entries found.".into();
    }
    entries
        .iter()
        .enumerate()
        .map(|(i, item)| format!("{}. {}", i + 1, item.title))
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::platform::ChannelMessage;
    use crate::relay::RelayListener;
    use crate::testing::{FakePlatform, RELAY_BOT, SOURCE_CHANNEL, item, role, test_context};

    fn post(id: &str, title: &str) -> ChannelMessage {
        ChannelMessage {
            author_id: RELAY_BOT,
            content: format!("{title}\nhttps://example.com/{id}\nuploader\n2024-01-01T00:00:00\n{id}"),
        }
    }

    #[test]
    fn parses_commands() {
        assert_eq!(BacklogCommand::parse("!list", "!"), Some(Ok(BacklogCommand::List)));
        assert_eq!(BacklogCommand::parse(" !send 2 ", "!"), Some(Ok(BacklogCommand::Send(2))));
        assert_eq!(BacklogCommand::parse("!sendall", "!"), Some(Ok(BacklogCommand::SendAll)));
        assert!(matches!(BacklogCommand::parse("!send", "!"), Some(Err(_))));
        assert!(matches!(BacklogCommand::parse("!send 0", "!"), Some(Err(_))));
        assert!(matches!(BacklogCommand::parse("!send two", "!"), Some(Err(_))));
        assert_eq!(BacklogCommand::parse("!help", "!"), None);
        assert_eq!(BacklogCommand::parse("list", "!"), None);
        assert_eq!(BacklogCommand::parse("?list", "?"), Some(Ok(BacklogCommand::List)));
    }

    #[tokio::test]
    async fn list_excludes_queued_and_foreign_messages() {
        let platform = FakePlatform::with_roles(vec![]);
        platform.set_history(vec![
            post("c", "Series C Chapter 3"),
            ChannelMessage {
                author_id: 1,
                content: "chatter\nthat\nlooks\nlike a post".into(),
            },
            post("b", "Series B Chapter 2"),
            post("a", "Series A Chapter 1"),
        ]);
        let ctx = test_context(platform.clone()).await;
        ctx.ledger.upsert_pending(&item("b", "Series B Chapter 2")).await.unwrap();

        let reply = Backlog::new(ctx).execute(BacklogCommand::List).await;

        assert_eq!(reply, "1. Series C Chapter 3\n2. Series A Chapter 1");
    }

    #[tokio::test]
    async fn send_announces_selected_entry() {
        let platform = FakePlatform::with_roles(vec![role(1, "Series A")]);
        platform.set_history(vec![post("c", "Series C Chapter 3"), post("a", "Series A Chapter 1")]);
        let backlog = Backlog::new(test_context(platform.clone()).await);

        let reply = backlog.execute(BacklogCommand::Send(2)).await;

        assert_eq!(reply, "Sent: Series A Chapter 1");
        assert_eq!(platform.sent()[0].title, "Series A Chapter 1");
        assert_eq!(backlog.execute(BacklogCommand::List).await, "1. Series C Chapter 3");

        let reply = backlog.execute(BacklogCommand::Send(5)).await;
        assert_eq!(reply, "Invalid number. Choose between 1 and 1.");
    }

    #[tokio::test]
    async fn sendall_sends_or_queues_each_entry() {
        let platform = FakePlatform::with_roles(vec![role(1, "Series A")]);
        platform.set_history(vec![post("c", "Series C Chapter 3"), post("a", "Series A Chapter 1")]);
        let ctx = test_context(platform.clone()).await;

        let reply = Backlog::new(ctx.clone()).execute(BacklogCommand::SendAll).await;

        assert_eq!(reply, "Processed 2 entries: 1 sent, 1 queued, 0 failed.");
        let queued = ctx.ledger.pending_ids().await.unwrap();
        assert!(queued.contains("c"));
        assert!(ctx.ledger.delivered_ids().await.unwrap().contains("a"));
        assert_eq!(
            Backlog::new(ctx).execute(BacklogCommand::List).await,
            "No entries found."
        );
    }

    #[tokio::test]
    async fn repeated_sendall_sends_nothing_new() {
        let platform = FakePlatform::with_roles(vec![role(1, "Series A")]);
        platform.set_history(vec![post("a", "Series A Chapter 1")]);
        let backlog = Backlog::new(test_context(platform.clone()).await);

        let first = backlog.execute(BacklogCommand::SendAll).await;
        assert_eq!(first, "Processed 1 entries: 1 sent, 0 queued, 0 failed.");
        assert_eq!(backlog.execute(BacklogCommand::List).await, "No entries found.");

        let second = backlog.execute(BacklogCommand::SendAll).await;
        assert_eq!(second, "No entries to send.");
        assert_eq!(platform.sent().len(), 1);
    }

    #[tokio::test]
    async fn relayed_entries_are_not_listed_again() {
        let platform = FakePlatform::with_roles(vec![role(1, "Series A")]);
        let entry = post("a", "Series A Chapter 1");
        platform.set_history(vec![entry.clone()]);
        let ctx = test_context(platform.clone()).await;

        let relay = RelayListener::new(ctx.clone());
        relay.on_message(SOURCE_CHANNEL, RELAY_BOT, &entry.content).await;

        assert_eq!(Backlog::new(ctx).execute(BacklogCommand::List).await, "No entries found.");
    }

    #[tokio::test]
    async fn empty_backlog_replies_plainly() {
        let platform = FakePlatform::with_roles(vec![]);
        let backlog = Backlog::new(test_context(platform).await);

        assert_eq!(backlog.execute(BacklogCommand::List).await, "No entries found.");
        assert_eq!(backlog.execute(BacklogCommand::SendAll).await, "No entries to send.");
    }
}
