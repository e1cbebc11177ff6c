//! SQLite-based storage for focus schedules.
//!
//! Schedule status only ever moves forward (`pending -> active ->
//! completed`, or `pending -> cancelled`); [`ScheduleDb::transition`]
//! enforces that at the storage boundary so no caller can wind a schedule
//! backwards.

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use uuid::Uuid;

use crate::error::StoreError;
use crate::session::{AppId, FocusSchedule, ScheduleStatus};

use super::data_dir;

fn parse_status(status_str: &str) -> ScheduleStatus {
    match status_str {
        "active" => ScheduleStatus::Active,
        "completed" => ScheduleStatus::Completed,
        "cancelled" => ScheduleStatus::Cancelled,
        _ => ScheduleStatus::Pending,
    }
}

fn parse_datetime_fallback(dt_str: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(dt_str)
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(|_| Utc::now())
}

fn row_to_schedule(row: &rusqlite::Row) -> Result<FocusSchedule, rusqlite::Error> {
    let apps_json: String = row.get(1)?;
    let blocked_apps: Vec<AppId> = serde_json::from_str(&apps_json).unwrap_or_default();

    let start_str: String = row.get(2)?;
    let status_str: String = row.get(4)?;
    let created_str: String = row.get(5)?;

    Ok(FocusSchedule {
        id: row.get(0)?,
        blocked_apps,
        start_time: parse_datetime_fallback(&start_str),
        duration_minutes: row.get(3)?,
        status: parse_status(&status_str),
        created_at: parse_datetime_fallback(&created_str),
    })
}

/// SQLite database for schedule storage.
pub struct ScheduleDb {
    conn: Connection,
}

impl ScheduleDb {
    /// Open the schedule database at `~/.config/focusguard/focusguard.db`.
    ///
    /// # Errors
    /// Returns an error if the database cannot be opened or migrated.
    pub fn open() -> Result<Self, StoreError> {
        let path = data_dir()
            .map_err(|e| StoreError::QueryFailed(e.to_string()))?
            .join("focusguard.db");
        Self::open_at(&path)
    }

    /// Open at an explicit path.
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
            "CREATE TABLE IF NOT EXISTS focus_schedules (
                id               TEXT PRIMARY KEY,
                blocked_apps     TEXT NOT NULL,
                start_time       TEXT NOT NULL,
                duration_minutes INTEGER NOT NULL,
                status           TEXT NOT NULL DEFAULT 'pending',
                created_at       TEXT NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_schedules_status ON focus_schedules(status);",
        )?;
        Ok(())
    }

    /// Insert a new pending schedule and return it.
    pub fn add(
        &self,
        blocked_apps: Vec<AppId>,
        start_time: DateTime<Utc>,
        duration_minutes: i64,
    ) -> Result<FocusSchedule, StoreError> {
        let schedule = FocusSchedule {
            id: Uuid::new_v4().to_string(),
            blocked_apps,
            start_time,
            duration_minutes,
            status: ScheduleStatus::Pending,
            created_at: Utc::now(),
        };
        let apps_json = serde_json::to_string(&schedule.blocked_apps)
            .map_err(|e| StoreError::QueryFailed(e.to_string()))?;
        self.conn.execute(
            "INSERT INTO focus_schedules (id, blocked_apps, start_time, duration_minutes, status, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                schedule.id,
                apps_json,
                schedule.start_time.to_rfc3339(),
                schedule.duration_minutes,
                schedule.status.as_str(),
                schedule.created_at.to_rfc3339(),
            ],
        )?;
        Ok(schedule)
    }

    pub fn get(&self, id: &str) -> Result<Option<FocusSchedule>, StoreError> {
        self.conn
            .query_row(
                "SELECT id, blocked_apps, start_time, duration_minutes, status, created_at
                 FROM focus_schedules WHERE id = ?1",
                params![id],
                row_to_schedule,
            )
            .optional()
            .map_err(Into::into)
    }

    /// Schedules still visible to the user: pending or active, soonest first.
    pub fn visible(&self) -> Result<Vec<FocusSchedule>, StoreError> {
        let mut stmt = self.conn.prepare(
            "SELECT id, blocked_apps, start_time, duration_minutes, status, created_at
             FROM focus_schedules
             WHERE status IN ('pending', 'active')
             ORDER BY start_time ASC",
        )?;
        let rows = stmt.query_map([], row_to_schedule)?;
        rows.collect::<Result<Vec<_>, _>>().map_err(Into::into)
    }

    /// Move a schedule to a new status, enforcing forward-only transitions.
    pub fn transition(&self, id: &str, next: ScheduleStatus) -> Result<(), StoreError> {
        let current = self
            .get(id)?
            .ok_or_else(|| StoreError::ScheduleNotFound(id.to_string()))?;

        if current.status == next {
            return Ok(()); // idempotent
        }
        if !current.status.can_transition_to(next) {
            return Err(StoreError::InvalidTransition {
                from: current.status.as_str(),
                to: next.as_str(),
            });
        }

        self.conn.execute(
            "UPDATE focus_schedules SET status = ?1 WHERE id = ?2",
            params![next.as_str(), id],
        )?;
        Ok(())
    }
}
