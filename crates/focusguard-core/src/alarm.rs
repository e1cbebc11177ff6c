//! One-shot OS wake timers for starting enforcement without the
//! controller resident.
//!
//! The wake handler armed here must itself perform the session-store write
//! and the monitor start; it never depends on the controller process
//! being alive. Alarms are best-effort for *starting* a window -- the
//! monitor's own expiry check is what stops it, so a lost disarm can
//! never cause indefinite blocking.

use chrono::{DateTime, Utc};

use crate::error::AlarmError;
use crate::session::{AppId, FocusSchedule};

/// Everything the wake handler needs to activate a schedule on its own.
#[derive(Debug, Clone, PartialEq)]
pub struct WakeRequest {
    pub schedule_id: String,
    pub blocked_apps: Vec<AppId>,
    pub fire_at: DateTime<Utc>,
    pub expire_at: DateTime<Utc>,
}

impl WakeRequest {
    pub fn for_schedule(schedule: &FocusSchedule) -> Self {
        Self {
            schedule_id: schedule.id.clone(),
            blocked_apps: schedule.blocked_apps.clone(),
            fire_at: schedule.start_time,
            expire_at: schedule.end_time(),
        }
    }
}

/// Arms and disarms one-shot OS wake timers, one per pending schedule.
pub trait WakeScheduler {
    /// Request a wake at `fire_at`. Re-arming with the same schedule id
    /// replaces any prior pending alarm for that id.
    ///
    /// # Errors
    /// [`AlarmError::Denied`] when the OS refuses precise wake scheduling;
    /// the caller falls back to tick-driven activation.
    fn arm(&self, request: &WakeRequest) -> Result<(), AlarmError>;

    /// Cancel any pending wake for the schedule id. Unknown ids are a
    /// no-op.
    fn disarm(&self, schedule_id: &str) -> Result<(), AlarmError>;
}
