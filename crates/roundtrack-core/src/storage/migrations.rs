//! Versioned schema migrations.
//!
//! Applied automatically when the database is opened. The
//! `schema_version` table holds the single current version.

use rusqlite::{Connection, Result as SqliteResult};
use tracing::{info, warn};

/// Current schema version.
pub const SCHEMA_VERSION: i32 = 3;

/// Apply all pending migrations.
///
/// # Errors
/// Returns an error if a migration fails; the failed step is rolled back.
pub fn migrate(conn: &Connection) -> SqliteResult<()> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS schema_version (
            version INTEGER PRIMARY KEY
        );",
    )?;

    let current = schema_version(conn);
    if current < 1 {
        migrate_v1(conn)?;
    }
    if current < 2 {
        migrate_v2(conn)?;
    }
    if current < 3 {
        migrate_v3(conn)?;
    }
    if current < SCHEMA_VERSION {
        info!(from = current, to = SCHEMA_VERSION, "database migrated");
    }
    Ok(())
}

/// Current schema version, 0 for a fresh database.
pub fn schema_version(conn: &Connection) -> i32 {
    conn.query_row("SELECT version FROM schema_version", [], |row| {
        row.get::<_, i32>(0)
    })
    .unwrap_or_else(|e| {
        if !matches!(e, rusqlite::Error::QueryReturnedNoRows) {
            warn!(error = %e, "failed to read schema_version");
        }
        0
    })
}

fn set_version(conn: &Connection, version: i32) -> SqliteResult<()> {
    conn.execute("DELETE FROM schema_version", [])?;
    conn.execute("INSERT INTO schema_version (version) VALUES (?1)", [version])?;
    Ok(())
}

/// v1: users, blocks, gamification profiles and a key-value table for
/// small bookkeeping values such as the last sync time.
///
/// Blocks keep their full JSON next to the columns used for filtering.
fn migrate_v1(conn: &Connection) -> SqliteResult<()> {
    let tx = conn.unchecked_transaction()?;
    tx.execute_batch(
        "CREATE TABLE IF NOT EXISTS users (
            id          INTEGER PRIMARY KEY AUTOINCREMENT,
            name        TEXT NOT NULL,
            avatar      TEXT NOT NULL DEFAULT '',
            color       TEXT NOT NULL,
            daily_goal  INTEGER NOT NULL,
            role        TEXT NOT NULL DEFAULT 'user',
            active      INTEGER NOT NULL DEFAULT 1
        );

        CREATE TABLE IF NOT EXISTS blocks (
            id          TEXT PRIMARY KEY,
            user_id     INTEGER NOT NULL REFERENCES users(id),
            process     TEXT NOT NULL,
            round       INTEGER NOT NULL,
            date        TEXT NOT NULL,
            ended_at    TEXT NOT NULL,
            data        TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS profiles (
            user_id     INTEGER PRIMARY KEY REFERENCES users(id),
            data        TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS kv (
            key   TEXT PRIMARY KEY,
            value TEXT NOT NULL
        );

        CREATE INDEX IF NOT EXISTS idx_blocks_user_date ON blocks(user_id, date);",
    )?;
    set_version(&tx, 1)?;
    tx.commit()
}

/// v2: archival flag set by "new day". Archived blocks stay queryable.
fn migrate_v2(conn: &Connection) -> SqliteResult<()> {
    let tx = conn.unchecked_transaction()?;
    tx.execute_batch(
        "ALTER TABLE blocks ADD COLUMN archived INTEGER NOT NULL DEFAULT 0;
         CREATE INDEX IF NOT EXISTS idx_blocks_user_archived ON blocks(user_id, archived);",
    )?;
    set_version(&tx, 2)?;
    tx.commit()
}

/// v3: sync outbox. One row per queued item so concurrent processes
/// append and remove items without rewriting each other's state.
fn migrate_v3(conn: &Connection) -> SqliteResult<()> {
    let tx = conn.unchecked_transaction()?;
    tx.execute_batch(
        "CREATE TABLE IF NOT EXISTS sync_queue (
            seq         INTEGER PRIMARY KEY AUTOINCREMENT,
            id          TEXT NOT NULL UNIQUE,
            data        TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS sync_dead_letters (
            seq         INTEGER PRIMARY KEY AUTOINCREMENT,
            id          TEXT NOT NULL UNIQUE,
            data        TEXT NOT NULL
        );",
    )?;
    set_version(&tx, 3)?;
    tx.commit()
}
