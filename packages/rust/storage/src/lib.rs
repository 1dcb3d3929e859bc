//! libSQL-backed entry ledger.
//!
//! The [`Ledger`] records the poller's last-seen marker, the pending set
//! of items whose role has not resolved yet, and the ids already announced. It is the only shared mutable
//! state in the bot.
//!
//! **Access rules:**
//! - Every operation opens its own connection and drops it on return, so a
//!   failed call leaves nothing half-open and the next cycle simply retries.
//! - Writes are idempotent upserts/deletes keyed by entry id; concurrent
//!   poller, sweeper and relay calls may interleave freely.

mod migrations;

use std::collections::HashSet;
use std::path::Path;
use std::sync::Arc;

use chrono::{DateTime, SecondsFormat, Utc};
use feedherald_shared::{
    DatabaseConfig, FeedheraldError, Item, PendingEntry, PendingStatus, Result,
    normalize_timestamp,
};
use libsql::{Connection, Database, params};
use tracing::{debug, info, instrument};

const PENDING_COLUMNS: &str =
    "entry_id, published, title, link, author, attempts, status, queued_at";

/// Result of [`Ledger::record_miss`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MissOutcome {
    /// Still pending after `attempts` misses.
    Retrying { attempts: u32 },
    /// Reached the attempt cap and will no longer be swept.
    Abandoned { attempts: u32 },
    /// The entry was removed (or abandoned) concurrently.
    Gone,
}

/// Durable ledger handle. Cheap to clone; clones share the database.
#[derive(Clone)]
pub struct Ledger {
    db: Arc<Database>,
}

impl Ledger {
    /// Open the ledger described by `config` and apply pending migrations.
    pub async fn open(config: &DatabaseConfig) -> Result<Self> {
        if !config.is_remote() {
            return Self::open_local(Path::new(&config.url)).await;
        }

        let token = config.auth_token.clone().unwrap_or_default();
        let db = libsql::Builder::new_remote(config.url.clone(), token)
            .build()
            .await
            .map_err(FeedheraldError::persistence)?;

        info!(url = %config.url, "opened remote ledger");
        Self::from_database(db).await
    }

    /// Open or create a local database file at `path`.
    pub async fn open_local(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|e| FeedheraldError::io(parent, e))?;
        }

        let db = libsql::Builder::new_local(path)
            .build()
            .await
            .map_err(FeedheraldError::persistence)?;

        debug!(?path, "opened local ledger");
        Self::from_database(db).await
    }

    async fn from_database(db: Database) -> Result<Self> {
        let ledger = Self { db: Arc::new(db) };
        ledger.run_migrations().await?;
        Ok(ledger)
    }

    /// Scoped connection for a single operation.
    fn connect(&self) -> Result<Connection> {
        self.db.connect().map_err(|e| {
            FeedheraldError::Persistence(format!("failed to acquire connection: {e}"))
        })
    }

    /// Run pending schema migrations.
    async fn run_migrations(&self) -> Result<()> {
        let conn = self.connect()?;
        let current_version = schema_version(&conn).await;

        for migration in migrations::all_migrations() {
            if migration.version > current_version {
                info!(
                    version = migration.version,
                    description = migration.description,
                    "applying migration"
                );
                conn.execute_batch(migration.sql).await.map_err(|e| {
                    FeedheraldError::Persistence(format!(
                        "migration v{} failed: {e}",
                        migration.version
                    ))
                })?;
            }
        }
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Last-seen marker
    // -----------------------------------------------------------------------

    /// Id of the most recently recorded poller item, or `None` on an empty ledger.
    pub async fn last_seen_id(&self) -> Result<Option<String>> {
        let conn = self.connect()?;
        let mut rows = conn
            .query(
                "SELECT entry_id FROM entries ORDER BY seen_at DESC, rowid DESC LIMIT 1",
                params![],
            )
            .await
            .map_err(FeedheraldError::persistence)?;

        let id = match rows.next().await.map_err(FeedheraldError::persistence)? {
            Some(row) => Some(row.get::<String>(0).map_err(FeedheraldError::persistence)?),
            None => None,
        };
        debug!(last_seen = id.as_deref().unwrap_or("<none>"), "fetched last-seen id");
        Ok(id)
    }

    /// Record `item` as the newest poller item.
    ///
    /// Nothing is written when the item's timestamp cannot be normalized.
    #[instrument(skip_all, fields(entry_id = %item.id))]
    pub async fn set_last_seen(&self, item: &Item) -> Result<()> {
        let published = normalize_timestamp(&item.published)?;
        let conn = self.connect()?;
        conn.execute(
            "INSERT INTO entries (entry_id, published, title, link, author, seen_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)
             ON CONFLICT(entry_id) DO UPDATE SET
               published = excluded.published,
               title = excluded.title,
               link = excluded.link,
               author = excluded.author,
               seen_at = excluded.seen_at",
            params![
                item.id.as_str(),
                published.as_str(),
                item.title.as_str(),
                item.link.as_str(),
                item.author.as_str(),
                now_string(),
            ],
        )
        .await
        .map_err(FeedheraldError::persistence)?;

        info!(%published, title = %item.title, "set last-seen entry");
        Ok(())
    }

    /// When `id` was last recorded as the marker, if ever.
    pub async fn seen_at(&self, id: &str) -> Result<Option<DateTime<Utc>>> {
        let conn = self.connect()?;
        let mut rows = conn
            .query("SELECT seen_at FROM entries WHERE entry_id = ?1", params![id])
            .await
            .map_err(FeedheraldError::persistence)?;

        match rows.next().await.map_err(FeedheraldError::persistence)? {
            Some(row) => {
                let raw = row.get::<String>(0).map_err(FeedheraldError::persistence)?;
                parse_stored_time("seen_at", &raw).map(Some)
            }
            None => Ok(None),
        }
    }

    // -----------------------------------------------------------------------
    // Delivered ids
    // -----------------------------------------------------------------------

    /// Record that `id` was announced.
    pub async fn mark_delivered(&self, id: &str) -> Result<()> {
        let conn = self.connect()?;
        conn.execute(
            "INSERT INTO delivered_entries (entry_id, delivered_at) VALUES (?1, ?2)
             ON CONFLICT(entry_id) DO UPDATE SET delivered_at = excluded.delivered_at",
            params![id, now_string()],
        )
        .await
        .map_err(FeedheraldError::persistence)?;

        debug!(entry_id = id, "marked entry delivered");
        Ok(())
    }

    /// Ids of every announced entry.
    pub async fn delivered_ids(&self) -> Result<HashSet<String>> {
        self.id_set("SELECT entry_id FROM delivered_entries").await
    }

    // -----------------------------------------------------------------------
    // Pending set
    // -----------------------------------------------------------------------

    /// Insert `item` into the pending set, or overwrite the existing row.
    ///
    /// Overwriting resets the miss counter and re-activates an abandoned entry.
    #[instrument(skip_all, fields(entry_id = %item.id))]
    pub async fn upsert_pending(&self, item: &Item) -> Result<()> {
        let published = normalize_timestamp(&item.published)?;
        let conn = self.connect()?;
        conn.execute(
            "INSERT INTO pending_entries (entry_id, published, title, link, author, attempts, status, queued_at)
             VALUES (?1, ?2, ?3, ?4, ?5, 0, 'pending', ?6)
             ON CONFLICT(entry_id) DO UPDATE SET
               published = excluded.published,
               title = excluded.title,
               link = excluded.link,
               author = excluded.author,
               attempts = 0,
               status = 'pending'",
            params![
                item.id.as_str(),
                published.as_str(),
                item.title.as_str(),
                item.link.as_str(),
                item.author.as_str(),
                now_string(),
            ],
        )
        .await
        .map_err(FeedheraldError::persistence)?;

        info!(title = %item.title, "saved pending entry");
        Ok(())
    }

    /// Snapshot of entries still waiting for a role, oldest first.
    pub async fn list_pending(&self) -> Result<Vec<PendingEntry>> {
        let entries = self.list_by_status(PendingStatus::Pending).await?;
        info!(count = entries.len(), "fetched pending entries");
        Ok(entries)
    }

    /// Entries that hit the attempt cap.
    pub async fn list_abandoned(&self) -> Result<Vec<PendingEntry>> {
        self.list_by_status(PendingStatus::Abandoned).await
    }

    async fn list_by_status(&self, status: PendingStatus) -> Result<Vec<PendingEntry>> {
        let conn = self.connect()?;
        let mut rows = conn
            .query(
                &format!(
                    "SELECT {PENDING_COLUMNS} FROM pending_entries
                     WHERE status = ?1 ORDER BY queued_at, entry_id"
                ),
                params![status.as_str()],
            )
            .await
            .map_err(FeedheraldError::persistence)?;

        let mut results = Vec::new();
        while let Some(row) = rows.next().await.map_err(FeedheraldError::persistence)? {
            results.push(row_to_pending(&row)?);
        }
        Ok(results)
    }

    /// Look up a single pending-set row, whatever its status.
    pub async fn get_pending(&self, id: &str) -> Result<Option<PendingEntry>> {
        let conn = self.connect()?;
        let mut rows = conn
            .query(
                &format!("SELECT {PENDING_COLUMNS} FROM pending_entries WHERE entry_id = ?1"),
                params![id],
            )
            .await
            .map_err(FeedheraldError::persistence)?;

        match rows.next().await.map_err(FeedheraldError::persistence)? {
            Some(row) => Ok(Some(row_to_pending(&row)?)),
            None => Ok(None),
        }
    }

    /// Ids currently in the pending set (pending or abandoned).
    pub async fn pending_ids(&self) -> Result<HashSet<String>> {
        self.id_set("SELECT entry_id FROM pending_entries").await
    }

    async fn id_set(&self, sql: &str) -> Result<HashSet<String>> {
        let conn = self.connect()?;
        let mut rows = conn
            .query(sql, params![])
            .await
            .map_err(FeedheraldError::persistence)?;

        let mut ids = HashSet::new();
        while let Some(row) = rows.next().await.map_err(FeedheraldError::persistence)? {
            ids.insert(row.get::<String>(0).map_err(FeedheraldError::persistence)?);
        }
        Ok(ids)
    }

    /// Delete `id` from the pending set. Returns whether a row was removed;
    /// an absent id is not an error.
    pub async fn remove_pending(&self, id: &str) -> Result<bool> {
        let conn = self.connect()?;
        let affected = conn
            .execute("DELETE FROM pending_entries WHERE entry_id = ?1", params![id])
            .await
            .map_err(FeedheraldError::persistence)?;

        if affected > 0 {
            info!(entry_id = id, "deleted pending entry");
        } else {
            debug!(entry_id = id, "pending entry already absent");
        }
        Ok(affected > 0)
    }

    /// Count a failed resolution for `id`, abandoning it once `max_attempts`
    /// misses have accumulated.
    pub async fn record_miss(&self, id: &str, max_attempts: Option<u32>) -> Result<MissOutcome> {
        let conn = self.connect()?;
        conn.execute(
            "UPDATE pending_entries SET
               attempts = attempts + 1,
               status = CASE
                 WHEN ?2 IS NOT NULL AND attempts + 1 >= ?2 THEN 'abandoned'
                 ELSE status
               END
             WHERE entry_id = ?1 AND status = 'pending'",
            params![id, max_attempts.map(i64::from)],
        )
        .await
        .map_err(FeedheraldError::persistence)?;

        let mut rows = conn
            .query(
                "SELECT attempts, status FROM pending_entries WHERE entry_id = ?1",
                params![id],
            )
            .await
            .map_err(FeedheraldError::persistence)?;

        let Some(row) = rows.next().await.map_err(FeedheraldError::persistence)? else {
            return Ok(MissOutcome::Gone);
        };
        let attempts = row.get::<i64>(0).map_err(FeedheraldError::persistence)? as u32;
        let status = row.get::<String>(1).map_err(FeedheraldError::persistence)?;

        Ok(match status.parse::<PendingStatus>() {
            Ok(PendingStatus::Pending) => MissOutcome::Retrying { attempts },
            Ok(PendingStatus::Abandoned) => MissOutcome::Abandoned { attempts },
            Err(e) => return Err(FeedheraldError::Persistence(e)),
        })
    }
}

/// Current schema version, or 0 if no migrations have been applied.
async fn schema_version(conn: &Connection) -> u32 {
    let result = conn
        .query("SELECT MAX(version) FROM schema_migrations", params![])
        .await;

    match result {
        Ok(mut rows) => match rows.next().await {
            Ok(Some(row)) => row.get::<u32>(0).unwrap_or(0),
            _ => 0,
        },
        Err(_) => 0, // Table doesn't exist yet
    }
}

/// Fixed-width RFC 3339 so lexical order matches time order.
fn now_string() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn parse_stored_time(column: &str, raw: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| FeedheraldError::Persistence(format!("invalid {column}: {e}")))
}

/// Convert a `pending_entries` row to a [`PendingEntry`].
fn row_to_pending(row: &libsql::Row) -> Result<PendingEntry> {
    let text = |idx: i32| row.get::<String>(idx).map_err(FeedheraldError::persistence);

    let status = text(6)?
        .parse::<PendingStatus>()
        .map_err(FeedheraldError::Persistence)?;
    let queued_at = parse_stored_time("queued_at", &text(7)?)?;

    Ok(PendingEntry {
        item: Item {
            id: text(0)?,
            published: text(1)?,
            title: text(2)?,
            link: text(3)?,
            author: text(4)?,
        },
        attempts: row.get::<i64>(5).map_err(FeedheraldError::persistence)? as u32,
        status,
        queued_at,
    })
}
