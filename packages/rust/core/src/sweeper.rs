//! Pending queue sweeps.
//!
//! Deferred items are retried against a fresh role snapshot on every sweep.
//! An entry leaves the queue only after its announcement was sent, or when
//! it exhausts the configured attempt cap.

use feedherald_storage::MissOutcome;
use serde::Serialize;
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info, instrument, warn};

use crate::context::BridgeContext;
use crate::notifier::Notifier;

/// Counts from one sweep.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SweepSummary {
    pub delivered: usize,
    pub still_pending: usize,
    pub send_failed: usize,
    pub abandoned: usize,
}

/// Retries the pending queue on a fixed interval.
pub struct PendingSweeper {
    ctx: BridgeContext,
    notifier: Notifier,
}

impl PendingSweeper {
    pub fn new(ctx: BridgeContext) -> Self {
        let notifier = Notifier::new(ctx.clone());
        Self { ctx, notifier }
    }

    /// Run one sweep over the current pending snapshot.
    #[instrument(skip_all)]
    pub async fn tick(&self) -> SweepSummary {
        let mut summary = SweepSummary::default();

        let entries = match self.ctx.ledger.list_pending().await {
            Ok(entries) => entries,
            Err(e) => {
                error!(error = %e, "failed to list pending entries");
                return summary;
            }
        };
        if entries.is_empty() {
            return summary;
        }

        // Misses only count against a real snapshot.
        let Some(roles) = self.notifier.resolver().snapshot().await else {
            warn!(pending = entries.len(), "skipping sweep, roles unavailable");
            summary.still_pending = entries.len();
            return summary;
        };

        debug!(pending = entries.len(), "sweeping pending entries");
        for entry in entries {
            let item = &entry.item;

            let Some(mention) = self.notifier.resolver().resolve_in(&roles, &item.title) else {
                self.record_miss(&item.id, &mut summary).await;
                continue;
            };

            if let Err(e) = self.notifier.announce(item, &mention).await {
                error!(entry_id = %item.id, error = %e, "error sending pending entry");
                summary.send_failed += 1;
                continue;
            }

            summary.delivered += 1;
            match self.ctx.ledger.remove_pending(&item.id).await {
                Ok(_) => info!(entry_id = %item.id, "pending entry delivered"),
                Err(e) => error!(entry_id = %item.id, error = %e, "failed to delete delivered entry"),
            }
        }

        if summary != SweepSummary::default() {
            info!(
                delivered = summary.delivered,
                still_pending = summary.still_pending,
                send_failed = summary.send_failed,
                abandoned = summary.abandoned,
                "sweep finished"
            );
        }
        summary
    }

    async fn record_miss(&self, id: &str, summary: &mut SweepSummary) {
        let cap = self.ctx.config.pending_max_attempts;
        match self.ctx.ledger.record_miss(id, cap).await {
            Ok(MissOutcome::Retrying { attempts }) => {
                debug!(entry_id = id, attempts, "still no role for pending entry");
                summary.still_pending += 1;
            }
            Ok(MissOutcome::Abandoned { attempts }) => {
                warn!(entry_id = id, attempts, "pending entry abandoned");
                summary.abandoned += 1;
            }
            Ok(MissOutcome::Gone) => debug!(entry_id = id, "pending entry removed mid-sweep"),
            Err(e) => {
                error!(entry_id = id, error = %e, "failed to record miss");
                summary.still_pending += 1;
            }
        }
    }

    /// Sweep forever on the configured interval.
    pub async fn run(self) {
        let mut interval = tokio::time::interval(self.ctx.config.sweep_interval());
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        info!(
            every_secs = self.ctx.config.sweep_interval_secs,
            "pending sweeper started"
        );

        loop {
            interval.tick().await;
            self.tick().await;
        }
    }
}
