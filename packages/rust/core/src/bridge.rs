//! Wiring of the bridge components behind a single entry point.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use feedherald_feed::FeedSource;
use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::backlog::{Backlog, BacklogCommand};
use crate::context::BridgeContext;
use crate::poller::FeedPoller;
use crate::relay::RelayListener;
use crate::sweeper::PendingSweeper;

/// An incoming chat message, reduced to what the bridge inspects.
#[derive(Debug, Clone, Copy)]
pub struct IncomingMessage<'a> {
    pub channel_id: u64,
    pub author_id: u64,
    pub author_is_bot: bool,
    pub content: &'a str,
}

/// Handles for the two background loops.
pub struct BackgroundTasks {
    pub poller: JoinHandle<()>,
    pub sweeper: JoinHandle<()>,
}

/// The running bridge: background loops plus message handling.
pub struct Bridge {
    ctx: BridgeContext,
    source: Arc<dyn FeedSource>,
    relay: RelayListener,
    backlog: Backlog,
    started: AtomicBool,
}

impl Bridge {
    pub fn new(ctx: BridgeContext, source: Arc<dyn FeedSource>) -> Self {
        Self {
            relay: RelayListener::new(ctx.clone()),
            backlog: Backlog::new(ctx.clone()),
            ctx,
            source,
            started: AtomicBool::new(false),
        }
    }

    /// Spawn the poller and sweeper. Only the first call spawns; gateway
    /// reconnects re-deliver the ready event and get `None`.
    pub fn start_background_tasks(&self) -> Option<BackgroundTasks> {
        if self.started.swap(true, Ordering::SeqCst) {
            debug!("background tasks already running");
            return None;
        }

        let poller = FeedPoller::new(self.ctx.clone(), self.source.clone());
        let sweeper = PendingSweeper::new(self.ctx.clone());
        info!("starting background tasks");
        Some(BackgroundTasks {
            poller: tokio::spawn(poller.run()),
            sweeper: tokio::spawn(sweeper.run()),
        })
    }

    /// Route a message to the relay listener or the backlog commands.
    /// Returns the reply to post in the message's channel, if any.
    pub async fn handle_message(&self, message: IncomingMessage<'_>) -> Option<String> {
        if self.relay.accepts(message.channel_id, message.author_id) {
            self.relay
                .on_message(message.channel_id, message.author_id, message.content)
                .await;
            return None;
        }

        if message.author_is_bot {
            return None;
        }

        match BacklogCommand::parse(message.content, &self.ctx.config.command_prefix)? {
            Ok(command) => Some(self.backlog.execute(command).await),
            Err(usage) => Some(usage),
        }
    }
}
