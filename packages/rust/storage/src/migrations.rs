//! SQL migration definitions for the feedherald ledger.
//!
//! Migrations are applied in order on open. Each migration has a version
//! number and a batch of SQL statements.

/// A database migration with a version and SQL statements.
pub(crate) struct Migration {
    pub version: u32,
    pub description: &'static str,
    pub sql: &'static str,
}

/// All migrations, in ascending version order.
pub(crate) fn all_migrations() -> Vec<Migration> {
    vec![
        Migration {
            version: 1,
            description: "Initial schema: entries (last-seen history), pending_entries",
            sql: r#"
-- Schema version tracking
CREATE TABLE IF NOT EXISTS schema_migrations (
    version    INTEGER PRIMARY KEY,
    applied_at TEXT NOT NULL DEFAULT (datetime('now'))
);

-- Items announced by the feed poller; the latest arrival is the marker
CREATE TABLE IF NOT EXISTS entries (
    entry_id  TEXT PRIMARY KEY,
    published TEXT NOT NULL,
    title     TEXT NOT NULL,
    link      TEXT NOT NULL,
    author    TEXT NOT NULL,
    seen_at   TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_entries_seen_at ON entries(seen_at);

-- Items whose role did not resolve yet
CREATE TABLE IF NOT EXISTS pending_entries (
    entry_id  TEXT PRIMARY KEY,
    published TEXT NOT NULL,
    title     TEXT NOT NULL,
    link      TEXT NOT NULL,
    author    TEXT NOT NULL,
    attempts  INTEGER NOT NULL DEFAULT 0,
    status    TEXT NOT NULL DEFAULT 'pending'
              CHECK (status IN ('pending', 'abandoned')),
    queued_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_pending_status ON pending_entries(status, queued_at);

INSERT INTO schema_migrations (version) VALUES (1);
"#,
        },
        Migration {
            version: 2,
            description: "delivered_entries: ids already announced",
            sql: r#"
CREATE TABLE IF NOT EXISTS delivered_entries (
    entry_id     TEXT PRIMARY KEY,
    delivered_at TEXT NOT NULL
);

INSERT INTO schema_migrations (version) VALUES (2);
"#,
        },
    ]
}
