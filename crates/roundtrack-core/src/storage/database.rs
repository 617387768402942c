//! SQLite storage for users, blocks and gamification profiles.
//!
//! Blocks are append-only: they are inserted once and afterwards only
//! their `archived` flag may change. Live counters are never stored.

use std::path::Path;

use std::time::Duration as StdDuration;

use chrono::NaiveDate;
use rusqlite::{params, Connection, OptionalExtension};
use serde::de::DeserializeOwned;
use tracing::{debug, info};

use super::data_dir;
use super::migrations;
use crate::error::{CoreError, DatabaseError};
use crate::gamification::GamificationProfile;
use crate::round::Block;
use crate::stats::DateRange;
use crate::sync::{DeadLetter, SyncQueueItem};
use crate::users::{NewUser, Role, User, UserUpdate};

const DB_FILE: &str = "roundtrack.db";

/// How long a writer waits for another process holding the lock.
const BUSY_TIMEOUT: StdDuration = StdDuration::from_secs(5);

/// SQLite database handle.
pub struct Database {
    conn: Connection,
}

fn date_key(date: NaiveDate) -> String {
    date.format("%Y-%m-%d").to_string()
}

impl Database {
    /// Get a reference to the underlying SQLite connection.
    pub fn conn(&self) -> &Connection {
        &self.conn
    }

    /// Open the database at `~/.config/roundtrack/roundtrack.db`.
    ///
    /// # Errors
    /// Returns an error if the database cannot be opened or migrated.
    pub fn open() -> Result<Self, CoreError> {
        let path = data_dir()?.join(DB_FILE);
        Ok(Self::open_at(&path)?)
    }

    /// Open (or create) the database at `path`.
    pub fn open_at(path: &Path) -> Result<Self, DatabaseError> {
        let conn = Connection::open(path).map_err(|source| DatabaseError::OpenFailed {
            path: path.to_path_buf(),
            source,
        })?;
        debug!(path = %path.display(), "database opened");
        Self::init(conn)
    }

    /// Open an in-memory database.
    pub fn open_memory() -> Result<Self, DatabaseError> {
        Self::init(Connection::open_in_memory()?)
    }

    fn init(conn: Connection) -> Result<Self, DatabaseError> {
        conn.busy_timeout(BUSY_TIMEOUT)?;
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        migrations::migrate(&conn)?;
        Ok(Self { conn })
    }

    // ── Users ────────────────────────────────────────────────────────

    /// # Errors
    /// Validation errors for an empty name or malformed color.
    pub fn create_user(&self, new: NewUser) -> Result<User, CoreError> {
        new.validate()?;
        self.conn.execute(
            "INSERT INTO users (name, avatar, color, daily_goal, role, active)
             VALUES (?1, ?2, ?3, ?4, ?5, 1)",
            params![
                new.name.trim(),
                new.avatar,
                new.color,
                new.daily_goal,
                new.role.as_str()
            ],
        )?;
        let id = self.conn.last_insert_rowid();
        info!(user_id = id, name = %new.name.trim(), "user created");
        Ok(self.user(id)?)
    }

    pub fn get_user(&self, id: i64) -> Result<Option<User>, DatabaseError> {
        let row = self
            .conn
            .query_row(
                "SELECT id, name, avatar, color, daily_goal, role, active FROM users WHERE id = ?1",
                [id],
                Self::user_row,
            )
            .optional()?;
        row.map(Self::decode_user).transpose()
    }

    /// Like [`get_user`](Self::get_user) but a missing row is an error.
    pub fn user(&self, id: i64) -> Result<User, DatabaseError> {
        self.get_user(id)?.ok_or_else(|| DatabaseError::NotFound {
            entity: "user",
            id: id.to_string(),
        })
    }

    pub fn list_users(&self, include_inactive: bool) -> Result<Vec<User>, DatabaseError> {
        let mut stmt = self.conn.prepare(
            "SELECT id, name, avatar, color, daily_goal, role, active FROM users
             WHERE active = 1 OR ?1
             ORDER BY id",
        )?;
        let rows = stmt.query_map([include_inactive], Self::user_row)?;
        rows.map(|row| Self::decode_user(row?)).collect()
    }

    pub fn update_user(&self, id: i64, update: UserUpdate) -> Result<User, CoreError> {
        let mut user = self.user(id)?;
        update.apply(&mut user)?;
        self.write_user(&user)?;
        debug!(user_id = id, "user updated");
        Ok(user)
    }

    /// Soft delete: the row stays so existing blocks keep their owner.
    pub fn deactivate_user(&self, id: i64) -> Result<User, DatabaseError> {
        let mut user = self.user(id)?;
        user.active = false;
        self.write_user(&user)?;
        info!(user_id = id, "user deactivated");
        Ok(user)
    }

    fn write_user(&self, user: &User) -> Result<(), DatabaseError> {
        self.conn.execute(
            "UPDATE users SET name = ?2, avatar = ?3, color = ?4, daily_goal = ?5, role = ?6, active = ?7
             WHERE id = ?1",
            params![
                user.id,
                user.name,
                user.avatar,
                user.color,
                user.daily_goal,
                user.role.as_str(),
                user.active
            ],
        )?;
        Ok(())
    }

    #[allow(clippy::type_complexity)]
    fn user_row(
        row: &rusqlite::Row<'_>,
    ) -> rusqlite::Result<(i64, String, String, String, u32, String, bool)> {
        Ok((
            row.get(0)?,
            row.get(1)?,
            row.get(2)?,
            row.get(3)?,
            row.get(4)?,
            row.get(5)?,
            row.get(6)?,
        ))
    }

    fn decode_user(
        (id, name, avatar, color, daily_goal, role, active): (
            i64,
            String,
            String,
            String,
            u32,
            String,
            bool,
        ),
    ) -> Result<User, DatabaseError> {
        let role = role.parse::<Role>().map_err(|e| DatabaseError::CorruptRow {
            table: "users",
            message: e.to_string(),
        })?;
        Ok(User {
            id,
            name,
            avatar,
            color,
            daily_goal,
            role,
            active,
        })
    }

    // ── Blocks ───────────────────────────────────────────────────────

    /// Append a block. Returns `false` if a block with the same id exists;
    /// the stored one is left untouched.
    pub fn insert_block(&self, block: &Block) -> Result<bool, CoreError> {
        let data = serde_json::to_string(block)?;
        let inserted = self.conn.execute(
            "INSERT OR IGNORE INTO blocks (id, user_id, process, round, date, ended_at, data)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                block.id(),
                block.user_id(),
                block.process().as_str(),
                block.round(),
                date_key(block.date()),
                block.ended_at().to_rfc3339(),
                data
            ],
        )?;
        Ok(inserted == 1)
    }

    pub fn block_exists(&self, id: &str) -> Result<bool, DatabaseError> {
        let found = self
            .conn
            .query_row("SELECT 1 FROM blocks WHERE id = ?1", [id], |_| Ok(()))
            .optional()?;
        Ok(found.is_some())
    }

    pub fn block(&self, id: &str) -> Result<Option<Block>, DatabaseError> {
        let data = self
            .conn
            .query_row("SELECT data FROM blocks WHERE id = ?1", [id], |row| {
                row.get::<_, String>(0)
            })
            .optional()?;
        data.as_deref().map(Self::decode_block).transpose()
    }

    /// Blocks of `user_id` dated within `range`, oldest first.
    pub fn blocks_for(
        &self,
        user_id: i64,
        range: DateRange,
        include_archived: bool,
    ) -> Result<Vec<Block>, DatabaseError> {
        let mut stmt = self.conn.prepare(
            "SELECT data FROM blocks
             WHERE user_id = ?1 AND date >= ?2 AND date <= ?3 AND (archived = 0 OR ?4)
             ORDER BY date, ended_at, round",
        )?;
        let rows = stmt.query_map(
            params![
                user_id,
                date_key(range.start),
                date_key(range.end),
                include_archived
            ],
            |row| row.get::<_, String>(0),
        )?;
        rows.map(|data| Self::decode_block(&data?)).collect()
    }

    /// Every block of `user_id`, archived ones included, oldest first.
    pub fn all_blocks(&self, user_id: i64) -> Result<Vec<Block>, DatabaseError> {
        let mut stmt = self.conn.prepare(
            "SELECT data FROM blocks WHERE user_id = ?1 ORDER BY date, ended_at, round",
        )?;
        let rows = stmt.query_map([user_id], |row| row.get::<_, String>(0))?;
        rows.map(|data| Self::decode_block(&data?)).collect()
    }

    /// Number the next live block of the day should carry.
    pub fn next_round(&self, user_id: i64, date: NaiveDate) -> Result<u32, DatabaseError> {
        let max: Option<u32> = self.conn.query_row(
            "SELECT MAX(round) FROM blocks WHERE user_id = ?1 AND date = ?2 AND archived = 0",
            params![user_id, date_key(date)],
            |row| row.get(0),
        )?;
        Ok(max.map_or(1, |m| m.saturating_add(1)))
    }

    /// Mark every unarchived block of `user_id` dated on or before `date`
    /// as archived. Returns the number of blocks archived.
    pub fn archive_through(&self, user_id: i64, date: NaiveDate) -> Result<usize, DatabaseError> {
        let changed = self.conn.execute(
            "UPDATE blocks SET archived = 1 WHERE user_id = ?1 AND date <= ?2 AND archived = 0",
            params![user_id, date_key(date)],
        )?;
        Ok(changed)
    }

    fn decode_block(data: &str) -> Result<Block, DatabaseError> {
        decode_json("blocks", data)
    }

    // ── Profiles ─────────────────────────────────────────────────────

    /// Stored profile, or a fresh one for a user that never scored.
    pub fn load_profile(&self, user_id: i64) -> Result<GamificationProfile, DatabaseError> {
        let data = self
            .conn
            .query_row(
                "SELECT data FROM profiles WHERE user_id = ?1",
                [user_id],
                |row| row.get::<_, String>(0),
            )
            .optional()?;
        match data {
            Some(data) => decode_json("profiles", &data),
            None => Ok(GamificationProfile::new(user_id)),
        }
    }

    pub fn save_profile(&self, profile: &GamificationProfile) -> Result<(), CoreError> {
        let data = serde_json::to_string(profile)?;
        self.conn.execute(
            "INSERT INTO profiles (user_id, data) VALUES (?1, ?2)
             ON CONFLICT(user_id) DO UPDATE SET data = excluded.data",
            params![profile.user_id(), data],
        )?;
        Ok(())
    }

    // ── Sync queue ───────────────────────────────────────────────────

    /// Append `item` at the tail of the sync queue.
    pub fn queue_push(&self, item: &SyncQueueItem) -> Result<(), CoreError> {
        let data = serde_json::to_string(item)?;
        self.conn.execute(
            "INSERT INTO sync_queue (id, data) VALUES (?1, ?2)",
            params![item.id, data],
        )?;
        Ok(())
    }

    /// Oldest pending item.
    pub fn queue_head(&self) -> Result<Option<SyncQueueItem>, DatabaseError> {
        let data = self
            .conn
            .query_row(
                "SELECT data FROM sync_queue ORDER BY seq LIMIT 1",
                [],
                |row| row.get::<_, String>(0),
            )
            .optional()?;
        data.as_deref()
            .map(|d| decode_json("sync_queue", d))
            .transpose()
    }

    /// Pending items, oldest first.
    pub fn queue_items(&self) -> Result<Vec<SyncQueueItem>, DatabaseError> {
        let mut stmt = self.conn.prepare("SELECT data FROM sync_queue ORDER BY seq")?;
        let rows = stmt.query_map([], |row| row.get::<_, String>(0))?;
        rows.map(|data| decode_json("sync_queue", &data?)).collect()
    }

    pub fn queue_len(&self) -> Result<usize, DatabaseError> {
        let count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM sync_queue", [], |row| row.get(0))?;
        Ok(usize::try_from(count).unwrap_or(0))
    }

    /// Rewrite a pending item in place, keeping its position. Returns
    /// `false` if the item is no longer queued.
    pub fn queue_update(&self, item: &SyncQueueItem) -> Result<bool, CoreError> {
        let data = serde_json::to_string(item)?;
        let changed = self.conn.execute(
            "UPDATE sync_queue SET data = ?2 WHERE id = ?1",
            params![item.id, data],
        )?;
        Ok(changed == 1)
    }

    pub fn queue_remove(&self, id: &str) -> Result<bool, DatabaseError> {
        let changed = self
            .conn
            .execute("DELETE FROM sync_queue WHERE id = ?1", [id])?;
        Ok(changed == 1)
    }

    /// Drop every pending item. Returns how many were dropped.
    pub fn queue_clear(&self) -> Result<usize, DatabaseError> {
        Ok(self.conn.execute("DELETE FROM sync_queue", [])?)
    }

    /// Move a pending item to the dead-letter table. Returns `false` if
    /// the item was no longer queued.
    pub fn queue_dead_letter(&self, letter: &DeadLetter) -> Result<bool, CoreError> {
        let data = serde_json::to_string(letter)?;
        self.in_transaction(|| {
            if !self.queue_remove(&letter.item.id)? {
                return Ok(false);
            }
            self.conn.execute(
                "INSERT OR REPLACE INTO sync_dead_letters (id, data) VALUES (?1, ?2)",
                params![letter.item.id, data],
            )?;
            Ok(true)
        })
    }

    /// Dead letters in the order they failed.
    pub fn dead_letters(&self) -> Result<Vec<DeadLetter>, DatabaseError> {
        let mut stmt = self
            .conn
            .prepare("SELECT data FROM sync_dead_letters ORDER BY seq")?;
        let rows = stmt.query_map([], |row| row.get::<_, String>(0))?;
        rows.map(|data| decode_json("sync_dead_letters", &data?))
            .collect()
    }

    /// Move every dead letter back to the tail of the queue with a fresh
    /// attempt budget.
    pub fn requeue_dead_letters(&self) -> Result<usize, CoreError> {
        self.in_transaction(|| {
            let letters = self.dead_letters()?;
            for letter in &letters {
                let mut item = letter.item.clone();
                item.attempts = 0;
                item.next_attempt_at = None;
                self.queue_push(&item)?;
            }
            self.conn.execute("DELETE FROM sync_dead_letters", [])?;
            Ok(letters.len())
        })
    }

    /// Run `f` in a transaction, or inside the caller's transaction if one
    /// is already open on this connection.
    pub fn in_transaction<T>(
        &self,
        f: impl FnOnce() -> Result<T, CoreError>,
    ) -> Result<T, CoreError> {
        if !self.conn.is_autocommit() {
            return f();
        }
        let tx = self.conn.unchecked_transaction()?;
        let out = f()?;
        tx.commit()?;
        Ok(out)
    }

    // ── Key-value ────────────────────────────────────────────────────

    pub fn kv_get(&self, key: &str) -> Result<Option<String>, DatabaseError> {
        Ok(self
            .conn
            .query_row("SELECT value FROM kv WHERE key = ?1", [key], |row| row.get(0))
            .optional()?)
    }

    pub fn kv_set(&self, key: &str, value: &str) -> Result<(), DatabaseError> {
        self.conn.execute(
            "INSERT INTO kv (key, value) VALUES (?1, ?2)
             ON CONFLICT(key) DO UPDATE SET value = excluded.value",
            params![key, value],
        )?;
        Ok(())
    }
}

fn decode_json<T: DeserializeOwned>(table: &'static str, data: &str) -> Result<T, DatabaseError> {
    serde_json::from_str(data).map_err(|e| DatabaseError::CorruptRow {
        table,
        message: e.to_string(),
    })
}
