//! SQLite-backed session store and session history.
//!
//! The session store is three independent kv slots -- solo, group, and
//! schedule-active -- each holding one whole [`BlockSession`] serialized as
//! a single JSON blob. Whole-blob writes are the unit of atomicity: a
//! reader can never observe a session with some fields written and others
//! missing. A blob that is present but unparsable is logged, deleted, and
//! treated as absent; restoration never crashes on a corrupt record.
//!
//! Both the lifecycle controller and the monitor process open this
//! database; SQLite is the only channel between them.

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::StoreError;
use crate::session::{BlockSession, SessionOrigin};

use super::data_dir;

/// The three persisted session slots. Each is clearable independently and
/// carries enough information to resume the monitor with no other input.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Slot {
    Solo,
    Group,
    Schedule,
}

impl Slot {
    pub const ALL: [Slot; 3] = [Slot::Solo, Slot::Group, Slot::Schedule];

    fn key(self) -> &'static str {
        match self {
            Slot::Solo => "active_session.solo",
            Slot::Group => "active_session.group",
            Slot::Schedule => "active_session.schedule",
        }
    }

    pub fn origin(self) -> SessionOrigin {
        match self {
            Slot::Solo => SessionOrigin::Solo,
            Slot::Group => SessionOrigin::Group,
            Slot::Schedule => SessionOrigin::Scheduled,
        }
    }

    pub fn for_origin(origin: SessionOrigin) -> Slot {
        match origin {
            SessionOrigin::Solo => Slot::Solo,
            SessionOrigin::Group => Slot::Group,
            SessionOrigin::Scheduled => Slot::Schedule,
        }
    }
}

/// A finished (or aborted) session, as recorded for history.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistoryRecord {
    pub id: i64,
    pub origin: String,
    pub started_at: DateTime<Utc>,
    pub ended_at: DateTime<Utc>,
    pub duration_seconds: i64,
    pub completed: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct HistoryStats {
    pub total_sessions: u64,
    pub completed_sessions: u64,
    pub total_focus_seconds: u64,
}

/// Kv flag set by the monitor when its foreground query stops working, so
/// the controller can surface the missing permission on next foreground.
const KEY_PERMISSION_MISSING: &str = "monitor.permission_missing";

/// SQLite database holding the session slots and the session history.
pub struct Database {
    conn: Connection,
}

impl Database {
    /// Open the database at `~/.config/focusguard/focusguard.db`.
    ///
    /// Creates the database file and schema if they don't exist.
    ///
    /// # Errors
    /// Returns an error if the database cannot be opened or migrated.
    pub fn open() -> Result<Self, StoreError> {
        let path = data_dir()
            .map_err(|e| StoreError::QueryFailed(e.to_string()))?
            .join("focusguard.db");
        Self::open_at(&path)
    }

    /// Open the database at an explicit path.
    pub fn open_at(path: &std::path::Path) -> Result<Self, StoreError> {
        let conn = Connection::open(path).map_err(|e| StoreError::OpenFailed {
            path: path.to_path_buf(),
            source: e,
        })?;
        let db = Self { conn };
        db.migrate()?;
        Ok(db)
    }

    /// Open an in-memory database (for tests).
    pub fn open_memory() -> Result<Self, StoreError> {
        let conn = Connection::open_in_memory()?;
        let db = Self { conn };
        db.migrate()?;
        Ok(db)
    }

    fn migrate(&self) -> Result<(), StoreError> {
        self.conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS kv (
                key   TEXT PRIMARY KEY,
                value TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS sessions (
                id               INTEGER PRIMARY KEY AUTOINCREMENT,
                origin           TEXT NOT NULL,
                started_at       TEXT NOT NULL,
                ended_at         TEXT NOT NULL,
                duration_seconds INTEGER NOT NULL,
                completed        INTEGER NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_sessions_ended_at ON sessions(ended_at);",
        )?;
        Ok(())
    }

    // ── Session slots ────────────────────────────────────────────────

    /// Write a slot as one serialized blob, or clear it with `None`.
    ///
    /// The write is synchronous-durable: once this returns, the record
    /// survives immediate process termination.
    pub fn write_slot(
        &self,
        slot: Slot,
        session: Option<&BlockSession>,
    ) -> Result<(), StoreError> {
        match session {
            Some(s) => {
                let blob = serde_json::to_string(s)
                    .map_err(|e| StoreError::QueryFailed(e.to_string()))?;
                self.conn.execute(
                    "INSERT OR REPLACE INTO kv (key, value) VALUES (?1, ?2)",
                    params![slot.key(), blob],
                )?;
            }
            None => {
                self.conn
                    .execute("DELETE FROM kv WHERE key = ?1", params![slot.key()])?;
            }
        }
        Ok(())
    }

    /// Read a slot. Absent or unparsable records both come back as `None`;
    /// a corrupt blob is deleted so it cannot re-trip later readers.
    pub fn read_slot(&self, slot: Slot) -> Result<Option<BlockSession>, StoreError> {
        let blob: Option<String> = self
            .conn
            .query_row(
                "SELECT value FROM kv WHERE key = ?1",
                params![slot.key()],
                |row| row.get(0),
            )
            .optional()?;

        let Some(blob) = blob else {
            return Ok(None);
        };

        match serde_json::from_str::<BlockSession>(&blob) {
            Ok(session) => Ok(Some(session)),
            Err(e) => {
                warn!(slot = slot.key(), error = %e, "discarding corrupt session record");
                self.write_slot(slot, None)?;
                Ok(None)
            }
        }
    }

    /// Resolve the single authoritative session.
    ///
    /// Expired slots are cleared on the way through. If more than one
    /// non-expired slot exists, the most recently started wins (ties break
    /// Solo > Group > Scheduled) and the losers are cleared -- they are
    /// treated as already ended.
    pub fn read_active(
        &self,
        now: DateTime<Utc>,
    ) -> Result<Option<(Slot, BlockSession)>, StoreError> {
        let mut live: Vec<(Slot, BlockSession)> = Vec::new();
        for slot in Slot::ALL {
            if let Some(session) = self.read_slot(slot)? {
                if session.is_expired(now) {
                    self.write_slot(slot, None)?;
                } else {
                    live.push((slot, session));
                }
            }
        }

        live.sort_by_key(|(_, s)| (s.started_at, s.origin.priority()));
        let winner = live.pop();

        for (slot, session) in live {
            warn!(
                slot = slot.key(),
                started_at = %session.started_at,
                "clearing superseded session"
            );
            self.write_slot(slot, None)?;
        }

        Ok(winner)
    }

    /// Clear all three slots.
    pub fn clear_all_slots(&self) -> Result<(), StoreError> {
        for slot in Slot::ALL {
            self.write_slot(slot, None)?;
        }
        Ok(())
    }

    // ── Monitor flags ────────────────────────────────────────────────

    /// Record that the monitor lost its foreground query capability.
    pub fn set_permission_missing(&self, which: &str) -> Result<(), StoreError> {
        self.conn.execute(
            "INSERT OR REPLACE INTO kv (key, value) VALUES (?1, ?2)",
            params![KEY_PERMISSION_MISSING, which],
        )?;
        Ok(())
    }

    /// Read and clear the monitor's permission-missing flag.
    pub fn take_permission_missing(&self) -> Result<Option<String>, StoreError> {
        let value: Option<String> = self
            .conn
            .query_row(
                "SELECT value FROM kv WHERE key = ?1",
                params![KEY_PERMISSION_MISSING],
                |row| row.get(0),
            )
            .optional()?;
        if value.is_some() {
            self.conn
                .execute("DELETE FROM kv WHERE key = ?1", params![KEY_PERMISSION_MISSING])?;
        }
        Ok(value)
    }

    // ── Session history ──────────────────────────────────────────────

    /// Record a finished or aborted session.
    ///
    /// # Errors
    /// Returns an error if the insert fails.
    pub fn record_session(
        &self,
        origin: SessionOrigin,
        started_at: DateTime<Utc>,
        ended_at: DateTime<Utc>,
        duration_seconds: i64,
        completed: bool,
    ) -> Result<i64, StoreError> {
        self.conn.execute(
            "INSERT INTO sessions (origin, started_at, ended_at, duration_seconds, completed)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                origin.as_str(),
                started_at.to_rfc3339(),
                ended_at.to_rfc3339(),
                duration_seconds,
                completed,
            ],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    /// Most recent history entries, newest first.
    pub fn recent_sessions(&self, limit: u32) -> Result<Vec<HistoryRecord>, StoreError> {
        let mut stmt = self.conn.prepare(
            "SELECT id, origin, started_at, ended_at, duration_seconds, completed
             FROM sessions ORDER BY ended_at DESC LIMIT ?1",
        )?;
        let rows = stmt.query_map(params![limit], |row| {
            let started: String = row.get(2)?;
            let ended: String = row.get(3)?;
            Ok(HistoryRecord {
                id: row.get(0)?,
                origin: row.get(1)?,
                started_at: parse_rfc3339(&started),
                ended_at: parse_rfc3339(&ended),
                duration_seconds: row.get(4)?,
                completed: row.get(5)?,
            })
        })?;
        rows.collect::<Result<Vec<_>, _>>().map_err(Into::into)
    }

    pub fn history_stats(&self) -> Result<HistoryStats, StoreError> {
        self.conn
            .query_row(
                "SELECT COUNT(*),
                        COALESCE(SUM(completed), 0),
                        COALESCE(SUM(CASE WHEN completed THEN duration_seconds ELSE 0 END), 0)
                 FROM sessions",
                [],
                |row| {
                    Ok(HistoryStats {
                        total_sessions: row.get(0)?,
                        completed_sessions: row.get(1)?,
                        total_focus_seconds: row.get(2)?,
                    })
                },
            )
            .map_err(Into::into)
    }
}

fn parse_rfc3339(s: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(|_| Utc::now())
}
