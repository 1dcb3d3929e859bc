//! In-memory fakes shared by the unit tests.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use feedherald_feed::FeedSource;
use feedherald_shared::{Config, FeedheraldError, Item, Result};
use feedherald_storage::Ledger;
use uuid::Uuid;

use crate::context::BridgeContext;
use crate::platform::{Announcement, ChannelMessage, ChatPlatform, GuildRole};

pub const GUILD: u64 = 100;
pub const TARGET_CHANNEL: u64 = 200;
pub const SOURCE_CHANNEL: u64 = 300;
pub const RELAY_BOT: u64 = 400;

pub fn test_config() -> Config {
    let env = HashMap::from([
        ("RSS_URL", "https://feeds.example.com/rss"),
        ("DISCORD_TOKEN", "token"),
        ("GUILD_ID", "100"),
        ("TARGET_CHANNEL_ID", "200"),
        ("SOURCE_CHANNEL_ID", "300"),
        ("OTHER_BOT_ID", "400"),
        ("SITE_URL", "https://site.example.com/"),
    ]);
    Config::from_lookup(|key| env.get(key).map(|v| v.to_string())).expect("test config")
}

pub async fn test_ledger() -> Ledger {
    let tmp = std::env::temp_dir().join(format!("fh_core_{}.db", Uuid::now_v7()));
    Ledger::open_local(&tmp).await.expect("open test db")
}

pub async fn test_context(platform: Arc<FakePlatform>) -> BridgeContext {
    test_context_with(test_config(), platform).await
}

pub async fn test_context_with(config: Config, platform: Arc<FakePlatform>) -> BridgeContext {
    BridgeContext::new(config, test_ledger().await, platform)
}

pub fn item(id: &str, title: &str) -> Item {
    Item {
        id: id.into(),
        title: title.into(),
        link: format!("https://example.com/{id}"),
        author: "uploader".into(),
        published: "2024-01-01T13:05:00Z".into(),
    }
}

pub fn role(id: u64, name: &str) -> GuildRole {
    GuildRole {
        id,
        name: name.into(),
    }
}

/// Records announcements and serves a configurable role snapshot.
#[derive(Default)]
pub struct FakePlatform {
    roles: Mutex<Vec<GuildRole>>,
    history: Mutex<Vec<ChannelMessage>>,
    sent: Mutex<Vec<Announcement>>,
    roles_unavailable: AtomicBool,
    fail_sends: AtomicBool,
    /// When set, the last-seen marker is captured at the moment of each send.
    observed_ledger: Mutex<Option<Ledger>>,
    markers_at_send: Mutex<Vec<Option<String>>>,
}

impl FakePlatform {
    pub fn with_roles(roles: Vec<GuildRole>) -> Arc<Self> {
        let platform = Self::default();
        *platform.roles.lock().unwrap() = roles;
        Arc::new(platform)
    }

    pub fn set_roles(&self, roles: Vec<GuildRole>) {
        *self.roles.lock().unwrap() = roles;
    }

    pub fn set_history(&self, history: Vec<ChannelMessage>) {
        *self.history.lock().unwrap() = history;
    }

    pub fn set_roles_unavailable(&self, unavailable: bool) {
        self.roles_unavailable.store(unavailable, Ordering::SeqCst);
    }

    pub fn set_fail_sends(&self, fail: bool) {
        self.fail_sends.store(fail, Ordering::SeqCst);
    }

    pub fn observe_marker(&self, ledger: Ledger) {
        *self.observed_ledger.lock().unwrap() = Some(ledger);
    }

    pub fn sent(&self) -> Vec<Announcement> {
        self.sent.lock().unwrap().clone()
    }

    pub fn markers_at_send(&self) -> Vec<Option<String>> {
        self.markers_at_send.lock().unwrap().clone()
    }
}

#[async_trait]
impl ChatPlatform for FakePlatform {
    async fn guild_roles(&self, guild_id: u64) -> Result<Vec<GuildRole>> {
        if self.roles_unavailable.load(Ordering::SeqCst) || guild_id != GUILD {
            return Err(FeedheraldError::Platform(format!("guild {guild_id} not found")));
        }
        Ok(self.roles.lock().unwrap().clone())
    }

    async fn send_announcement(&self, announcement: &Announcement) -> Result<()> {
        let ledger = self.observed_ledger.lock().unwrap().clone();
        if let Some(ledger) = ledger {
            let marker = ledger.last_seen_id().await.expect("read marker");
            self.markers_at_send.lock().unwrap().push(marker);
        }

        if self.fail_sends.load(Ordering::SeqCst) {
            return Err(FeedheraldError::Delivery("missing permissions".into()));
        }
        self.sent.lock().unwrap().push(announcement.clone());
        Ok(())
    }

    async fn recent_messages(&self, _channel_id: u64, limit: u8) -> Result<Vec<ChannelMessage>> {
        let history = self.history.lock().unwrap();
        Ok(history.iter().take(limit as usize).cloned().collect())
    }
}

/// Feed source that replays scripted responses.
#[derive(Default)]
pub struct FakeFeed {
    responses: Mutex<VecDeque<Result<Vec<Item>>>>,
    calls: AtomicUsize,
    hang: AtomicBool,
}

impl FakeFeed {
    pub fn scripted(responses: Vec<Result<Vec<Item>>>) -> Arc<Self> {
        let feed = Self::default();
        *feed.responses.lock().unwrap() = responses.into();
        Arc::new(feed)
    }

    pub fn hanging() -> Arc<Self> {
        let feed = Self::default();
        feed.hang.store(true, Ordering::SeqCst);
        Arc::new(feed)
    }

    pub fn push(&self, response: Result<Vec<Item>>) {
        self.responses.lock().unwrap().push_back(response);
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl FeedSource for FakeFeed {
    async fn fetch(&self) -> Result<Vec<Item>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.hang.load(Ordering::SeqCst) {
            tokio::time::sleep(Duration::from_secs(3600)).await;
        }
        self.responses
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(FeedheraldError::Fetch("no scripted response".into())))
    }

    fn describe(&self) -> String {
        "fake feed".into()
    }
}
