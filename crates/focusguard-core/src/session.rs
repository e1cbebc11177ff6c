//! Domain types for blocking sessions, schedules, and group sessions.
//!
//! A [`BlockSession`] is the single authoritative "what is blocked right
//! now" record. Solo, scheduled, and group starts all collapse into one of
//! these, discriminated by [`SessionOrigin`], which is what keeps the
//! three lifecycles from ever being active simultaneously.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// Opaque application identifier. The engine gives it no semantics beyond
/// equality.
pub type AppId = String;

/// Where an active blocking window came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionOrigin {
    Solo,
    Scheduled,
    Group,
}

impl SessionOrigin {
    pub fn as_str(self) -> &'static str {
        match self {
            SessionOrigin::Solo => "solo",
            SessionOrigin::Scheduled => "scheduled",
            SessionOrigin::Group => "group",
        }
    }

    /// Tie-break rank when two sessions share the same `started_at`: a
    /// manual start expresses fresher intent than a timer.
    pub(crate) fn priority(self) -> u8 {
        match self {
            SessionOrigin::Solo => 2,
            SessionOrigin::Group => 1,
            SessionOrigin::Scheduled => 0,
        }
    }
}

/// An active blocking window.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BlockSession {
    pub origin: SessionOrigin,

    /// Applications forbidden from foregrounding. Non-empty while active.
    pub blocked_apps: Vec<AppId>,

    pub started_at: DateTime<Utc>,
    pub ends_at: DateTime<Utc>,

    /// If true, the user-facing "end early" affordance is suppressed.
    /// Enforced in the controller/UI layer, not by the monitor.
    #[serde(default)]
    pub strict: bool,

    /// Owning user, used to discard sessions restored under a different
    /// account. For Group origin this is the creator (attribution only).
    #[serde(default)]
    pub owner_user_id: Option<String>,

    /// Schedule id or group session id for the Scheduled/Group origins.
    #[serde(default)]
    pub source_id: Option<String>,
}

impl BlockSession {
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now >= self.ends_at
    }

    /// Remaining window, clamped to zero.
    pub fn remaining(&self, now: DateTime<Utc>) -> Duration {
        (self.ends_at - now).max(Duration::zero())
    }

    /// Planned window length in whole seconds.
    pub fn duration_seconds(&self) -> i64 {
        (self.ends_at - self.started_at).num_seconds()
    }

    pub fn blocks(&self, app: &str) -> bool {
        self.blocked_apps.iter().any(|a| a == app)
    }
}

/// Status of a future blocking commitment.
///
/// Transitions only move forward: `pending -> active -> completed`, or
/// `pending -> cancelled`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScheduleStatus {
    Pending,
    Active,
    Completed,
    Cancelled,
}

impl ScheduleStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            ScheduleStatus::Pending => "pending",
            ScheduleStatus::Active => "active",
            ScheduleStatus::Completed => "completed",
            ScheduleStatus::Cancelled => "cancelled",
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, ScheduleStatus::Completed | ScheduleStatus::Cancelled)
    }

    pub fn can_transition_to(self, next: ScheduleStatus) -> bool {
        matches!(
            (self, next),
            (ScheduleStatus::Pending, ScheduleStatus::Active)
                | (ScheduleStatus::Pending, ScheduleStatus::Cancelled)
                | (ScheduleStatus::Active, ScheduleStatus::Completed)
                | (ScheduleStatus::Active, ScheduleStatus::Cancelled)
        )
    }
}

/// A future commitment to start a [`BlockSession`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FocusSchedule {
    pub id: String,
    pub blocked_apps: Vec<AppId>,
    pub start_time: DateTime<Utc>,
    pub duration_minutes: i64,
    pub status: ScheduleStatus,
    pub created_at: DateTime<Utc>,
}

impl FocusSchedule {
    pub fn end_time(&self) -> DateTime<Utc> {
        self.start_time + Duration::minutes(self.duration_minutes)
    }

    /// The schedule's window contains `now`.
    pub fn is_in_window(&self, now: DateTime<Utc>) -> bool {
        now >= self.start_time && now < self.end_time()
    }

    /// Build the BlockSession persisted when this schedule activates.
    pub fn to_block_session(&self, owner_user_id: Option<String>) -> BlockSession {
        BlockSession {
            origin: SessionOrigin::Scheduled,
            blocked_apps: self.blocked_apps.clone(),
            started_at: self.start_time,
            ends_at: self.end_time(),
            strict: false,
            owner_user_id,
            source_id: Some(self.id.clone()),
        }
    }
}

/// Status of a replicated group session. Lifecycle is owned by the remote
/// store; locally we only react to transitions we observe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GroupStatus {
    Scheduled,
    Active,
    Ended,
    Cancelled,
}

impl GroupStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            GroupStatus::Scheduled => "scheduled",
            GroupStatus::Active => "active",
            GroupStatus::Ended => "ended",
            GroupStatus::Cancelled => "cancelled",
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, GroupStatus::Ended | GroupStatus::Cancelled)
    }
}

/// Membership status within a group session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MemberStatus {
    Invited,
    Accepted,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GroupMember {
    pub user_id: String,
    pub status: MemberStatus,
}

/// A Schedule-like record replicated to multiple participants.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GroupSession {
    pub id: String,
    pub invite_code: String,
    pub creator_id: String,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub duration_minutes: i64,
    pub blocked_apps: Vec<AppId>,
    pub strict: bool,
    pub status: GroupStatus,
    #[serde(default)]
    pub members: Vec<GroupMember>,
}

impl GroupSession {
    /// Build the BlockSession persisted when this group session activates.
    pub fn to_block_session(&self) -> BlockSession {
        BlockSession {
            origin: SessionOrigin::Group,
            blocked_apps: self.blocked_apps.clone(),
            started_at: self.start_time,
            ends_at: self.end_time,
            strict: self.strict,
            owner_user_id: Some(self.creator_id.clone()),
            source_id: Some(self.id.clone()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn session(start_offset_secs: i64, len_secs: i64) -> BlockSession {
        let now = Utc::now();
        BlockSession {
            origin: SessionOrigin::Solo,
            blocked_apps: vec!["instagram".into()],
            started_at: now + Duration::seconds(start_offset_secs),
            ends_at: now + Duration::seconds(start_offset_secs + len_secs),
            strict: false,
            owner_user_id: None,
            source_id: None,
        }
    }

    #[test]
    fn duration_matches_window() {
        let s = session(0, 25 * 60);
        assert_eq!(s.duration_seconds(), 25 * 60);
    }

    #[test]
    fn expiry_is_inclusive_at_ends_at() {
        let s = session(-60, 60);
        assert!(s.is_expired(s.ends_at));
        assert!(!s.is_expired(s.ends_at - Duration::seconds(1)));
    }

    #[test]
    fn schedule_status_never_moves_backwards() {
        use ScheduleStatus::*;
        assert!(Pending.can_transition_to(Active));
        assert!(Pending.can_transition_to(Cancelled));
        assert!(Active.can_transition_to(Completed));
        assert!(Active.can_transition_to(Cancelled));
        assert!(!Active.can_transition_to(Pending));
        assert!(!Completed.can_transition_to(Active));
        assert!(!Cancelled.can_transition_to(Pending));
        assert!(!Completed.can_transition_to(Pending));
    }

    #[test]
    fn schedule_window_bounds() {
        let sched = FocusSchedule {
            id: "s1".into(),
            blocked_apps: vec!["a".into()],
            start_time: Utc::now(),
            duration_minutes: 30,
            status: ScheduleStatus::Pending,
            created_at: Utc::now(),
        };
        assert!(sched.is_in_window(sched.start_time));
        assert!(!sched.is_in_window(sched.end_time()));
        assert_eq!(sched.end_time() - sched.start_time, Duration::minutes(30));
    }
}
