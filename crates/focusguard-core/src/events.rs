use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::session::SessionOrigin;

/// Every state change the controller performs produces an Event.
/// The host loop renders them; one-shot commands print them.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Event {
    SessionStarted {
        origin: SessionOrigin,
        blocked_apps: Vec<String>,
        ends_at: DateTime<Utc>,
        strict: bool,
        at: DateTime<Utc>,
    },
    SessionEnded {
        origin: SessionOrigin,
        completed: bool,
        at: DateTime<Utc>,
    },
    SessionResumed {
        origin: SessionOrigin,
        remaining_secs: i64,
        at: DateTime<Utc>,
    },
    /// A stale or foreign persisted session was discarded during restore.
    SessionDiscarded {
        origin: SessionOrigin,
        reason: DiscardReason,
        at: DateTime<Utc>,
    },
    AlarmArmed {
        schedule_id: String,
        fire_at: DateTime<Utc>,
        at: DateTime<Utc>,
    },
    /// Precise wake scheduling was denied; the schedule will activate via
    /// the foreground tick path only.
    AlarmFallback {
        schedule_id: String,
        at: DateTime<Utc>,
    },
    ScheduleActivated {
        schedule_id: String,
        ends_at: DateTime<Utc>,
        at: DateTime<Utc>,
    },
    ScheduleCompleted {
        schedule_id: String,
        at: DateTime<Utc>,
    },
    ScheduleCancelled {
        schedule_id: String,
        at: DateTime<Utc>,
    },
    GroupActivated {
        session_id: String,
        ends_at: DateTime<Utc>,
        at: DateTime<Utc>,
    },
    GroupDeactivated {
        session_id: String,
        completed: bool,
        at: DateTime<Utc>,
    },
}

/// Why a persisted session was not resumed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DiscardReason {
    Expired,
    OwnerMismatch,
    LostAuthority,
}
