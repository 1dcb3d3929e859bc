//! Announcement delivery.
//!
//! The notifier renders an item for the target channel and sends it when a
//! role resolves. Unresolved items are parked in the pending queue for the
//! sweeper.

use feedherald_shared::{Item, Result, display_timestamp};
use tracing::{error, info, instrument, warn};
use url::Url;

use crate::context::BridgeContext;
use crate::platform::{ANNOUNCEMENT_COLOUR, Announcement, LinkButton, role_mention};
use crate::resolver::RoleResolver;

const READ_LABEL: &str = "Read Now";
const SITE_LABEL: &str = "Visit Site";

/// What happened to an item handed to [`Notifier::deliver`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeliveryOutcome {
    /// Announced in the target channel.
    Sent,
    /// No role matched; queued for a later sweep.
    Deferred,
    /// Dropped after a send or persistence failure.
    Failed(String),
}

/// Renders and posts announcements.
#[derive(Clone)]
pub struct Notifier {
    ctx: BridgeContext,
    resolver: RoleResolver,
}

impl Notifier {
    pub fn new(ctx: BridgeContext) -> Self {
        let resolver = RoleResolver::new(ctx.clone());
        Self { ctx, resolver }
    }

    pub fn resolver(&self) -> &RoleResolver {
        &self.resolver
    }

    /// Announce `item` if a role resolves, otherwise defer it.
    #[instrument(skip_all, fields(entry_id = %item.id, title = %item.title))]
    pub async fn deliver(&self, item: &Item) -> DeliveryOutcome {
        let Some(mention) = self.resolver.resolve(&item.title).await else {
            return match self.ctx.ledger.upsert_pending(item).await {
                Ok(()) => {
                    info!("no role found, entry deferred");
                    DeliveryOutcome::Deferred
                }
                Err(e) => {
                    error!(error = %e, "failed to queue pending entry");
                    DeliveryOutcome::Failed(e.to_string())
                }
            };
        };

        match self.announce(item, &mention).await {
            Ok(()) => {
                // A successful send supersedes any queued copy of the item.
                if let Err(e) = self.ctx.ledger.remove_pending(&item.id).await {
                    warn!(error = %e, "failed to clear pending copy of sent entry");
                }
                DeliveryOutcome::Sent
            }
            Err(e) => {
                error!(error = %e, "error sending announcement");
                DeliveryOutcome::Failed(e.to_string())
            }
        }
    }

    /// Post `item` with `mention` to the target channel and record its id
    /// as delivered.
    pub async fn announce(&self, item: &Item, mention: &str) -> Result<()> {
        let announcement = self.render(item, mention);
        self.ctx.platform.send_announcement(&announcement).await?;
        info!(entry_id = %item.id, "notification sent");

        if let Err(e) = self.ctx.ledger.mark_delivered(&item.id).await {
            warn!(entry_id = %item.id, error = %e, "failed to record delivered entry");
        }
        Ok(())
    }

    /// Build the announcement for `item`.
    pub fn render(&self, item: &Item, mention: &str) -> Announcement {
        let config = &self.ctx.config;
        let always = config
            .announcement
            .always_mention_role_id
            .map(role_mention)
            .unwrap_or_default();

        let mut buttons = Vec::with_capacity(2);
        if Url::parse(&item.link).is_ok() {
            buttons.push(LinkButton {
                label: READ_LABEL.into(),
                url: item.link.clone(),
            });
        } else {
            warn!(entry_id = %item.id, link = %item.link, "entry link is not a URL, omitting button");
        }
        buttons.push(LinkButton {
            label: SITE_LABEL.into(),
            url: config.announcement.site_url.to_string(),
        });

        Announcement {
            channel_id: config.target_channel_id,
            content: format!("{always}{mention} {READ_LABEL}!"),
            title: item.title.clone(),
            colour: ANNOUNCEMENT_COLOUR,
            footer: format!(
                "Posted by {} • {}",
                item.author,
                display_timestamp(&item.published)
            ),
            buttons,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{FakePlatform, TARGET_CHANNEL, item, role, test_config, test_context, test_context_with};

    #[tokio::test]
    async fn sends_when_role_resolves() {
        let platform = FakePlatform::with_roles(vec![role(42, "My Series")]);
        let ctx = test_context(platform.clone()).await;
        let notifier = Notifier::new(ctx.clone());

        let outcome = notifier.deliver(&item("a", "My Series Chapter 12")).await;

        assert_eq!(outcome, DeliveryOutcome::Sent);
        let sent = platform.sent();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].channel_id, TARGET_CHANNEL);
        assert_eq!(sent[0].content, "<@&42> Read Now!");
        assert_eq!(sent[0].title, "My Series Chapter 12");
        assert!(ctx.ledger.list_pending().await.unwrap().is_empty());
        assert!(ctx.ledger.delivered_ids().await.unwrap().contains("a"));
    }

    #[tokio::test]
    async fn defers_when_no_role_matches() {
        let platform = FakePlatform::with_roles(vec![role(42, "Other")]);
        let ctx = test_context(platform.clone()).await;
        let notifier = Notifier::new(ctx.clone());

        let outcome = notifier.deliver(&item("a", "My Series Chapter 12")).await;

        assert_eq!(outcome, DeliveryOutcome::Deferred);
        assert!(platform.sent().is_empty());
        let pending = ctx.ledger.list_pending().await.unwrap();
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].item.id, "a");
    }

    #[tokio::test]
    async fn send_failure_is_dropped_not_queued() {
        let platform = FakePlatform::with_roles(vec![role(42, "My Series")]);
        platform.set_fail_sends(true);
        let ctx = test_context(platform.clone()).await;
        let notifier = Notifier::new(ctx.clone());

        let outcome = notifier.deliver(&item("a", "My Series Chapter 12")).await;

        assert!(matches!(outcome, DeliveryOutcome::Failed(_)));
        assert!(ctx.ledger.list_pending().await.unwrap().is_empty());
        assert!(ctx.ledger.delivered_ids().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn failed_queue_write_is_reported() {
        let platform = FakePlatform::with_roles(vec![]);
        let ctx = test_context(platform.clone()).await;
        let mut entry = item("a", "My Series Chapter 12");
        entry.published = "soon".into();

        let outcome = Notifier::new(ctx.clone()).deliver(&entry).await;

        assert!(matches!(outcome, DeliveryOutcome::Failed(_)));
        assert!(platform.sent().is_empty());
        assert!(ctx.ledger.list_pending().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn successful_send_clears_pending_copy() {
        let platform = FakePlatform::with_roles(vec![]);
        let ctx = test_context(platform.clone()).await;
        let notifier = Notifier::new(ctx.clone());
        let entry = item("a", "My Series Chapter 12");

        assert_eq!(notifier.deliver(&entry).await, DeliveryOutcome::Deferred);
        platform.set_roles(vec![role(42, "My Series")]);
        assert_eq!(notifier.deliver(&entry).await, DeliveryOutcome::Sent);

        assert!(ctx.ledger.get_pending("a").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn renders_footer_buttons_and_fixed_mention() {
        let mut config = test_config();
        config.announcement.always_mention_role_id = Some(7);
        let notifier = Notifier::new(test_context_with(config, FakePlatform::with_roles(vec![])).await);

        let rendered = notifier.render(&item("a", "My Series Chapter 12"), "<@&42>");

        assert_eq!(rendered.content, "<@&7><@&42> Read Now!");
        assert_eq!(rendered.colour, 0x78478C);
        assert_eq!(rendered.footer, "Posted by uploader • 01 January 2024, 01:05 PM");
        let labels: Vec<&str> = rendered.buttons.iter().map(|b| b.label.as_str()).collect();
        assert_eq!(labels, ["Read Now", "Visit Site"]);
        assert_eq!(rendered.buttons[0].url, "https://example.com/a");
        assert_eq!(rendered.buttons[1].url, "https://site.example.com/");
    }

    #[tokio::test]
    async fn unparseable_timestamp_renders_invalid_date() {
        let notifier = Notifier::new(test_context(FakePlatform::with_roles(vec![])).await);
        let mut entry = item("a", "My Series Chapter 12");
        entry.published = "sometime".into();
        entry.link = "not a link".into();

        let rendered = notifier.render(&entry, "<@&42>");

        assert_eq!(rendered.footer, "Posted by uploader • Invalid date");
        assert_eq!(rendered.buttons.len(), 1);
    }
}
