//! Session lifecycle controller.
//!
//! Owns the single "what is active right now" decision across the solo,
//! scheduled, and group origins. Runs on the host's cooperative loop:
//! `tick` is a recurring timer callback, never a blocking loop, and does
//! only bounded local I/O. The countdown shown to the user is computed
//! from the locally held `ends_at`, not from per-tick store reads.
//!
//! Ordering guarantee: every activation writes the session store *before*
//! signalling the monitor, so the monitor never observes a start signal
//! without a readable session record.

use std::collections::HashSet;

use chrono::{DateTime, Duration, Utc};
use tracing::{info, warn};

use crate::alarm::{WakeRequest, WakeScheduler};
use crate::error::{PermissionError, Result, ValidationError};
use crate::events::{DiscardReason, Event};
use crate::group::GroupEvent;
use crate::host::{AccountInfo, MonitorControl, PermissionGate};
use crate::session::{AppId, BlockSession, ScheduleStatus, SessionOrigin};
use crate::storage::{Database, ScheduleDb, Slot};

/// Result of an `on_foreground` re-check.
#[derive(Debug)]
pub struct ForegroundStatus {
    /// Wall-clock remaining window, when a session is active.
    pub remaining_secs: Option<i64>,
    /// First missing permission, if enforcement cannot run.
    pub missing_permission: Option<PermissionError>,
    pub events: Vec<Event>,
}

pub struct LifecycleController {
    db: Database,
    schedules: ScheduleDb,
    wake: Box<dyn WakeScheduler>,
    monitor: Box<dyn MonitorControl>,
    account: Box<dyn AccountInfo>,
    permissions: Box<dyn PermissionGate>,
    /// Locally held copy of the authoritative session; drives the
    /// countdown without touching the store every tick.
    active: Option<(Slot, BlockSession)>,
    /// Schedule ids we have already tried to arm (successfully or not).
    armed: HashSet<String>,
    /// Set once precise wake scheduling has been denied; activation then
    /// relies on the tick path alone.
    alarm_degraded: bool,
}

impl LifecycleController {
    pub fn new(
        db: Database,
        schedules: ScheduleDb,
        wake: Box<dyn WakeScheduler>,
        monitor: Box<dyn MonitorControl>,
        account: Box<dyn AccountInfo>,
        permissions: Box<dyn PermissionGate>,
    ) -> Self {
        Self {
            db,
            schedules,
            wake,
            monitor,
            account,
            permissions,
            active: None,
            armed: HashSet::new(),
            alarm_degraded: false,
        }
    }

    // ── Queries ──────────────────────────────────────────────────────

    pub fn active_session(&self) -> Option<&BlockSession> {
        self.active.as_ref().map(|(_, s)| s)
    }

    pub fn remaining(&self, now: DateTime<Utc>) -> Option<Duration> {
        self.active_session().map(|s| s.remaining(now))
    }

    pub fn alarm_degraded(&self) -> bool {
        self.alarm_degraded
    }

    pub fn schedules(&self) -> &ScheduleDb {
        &self.schedules
    }

    pub fn database(&self) -> &Database {
        &self.db
    }

    // ── Solo sessions ────────────────────────────────────────────────

    /// Start an immediate solo session.
    pub fn start_solo(
        &mut self,
        blocked_apps: Vec<AppId>,
        duration_minutes: i64,
        strict: bool,
        now: DateTime<Utc>,
    ) -> Result<Event> {
        if blocked_apps.is_empty() {
            return Err(ValidationError::EmptyCollection("blocked_apps".into()).into());
        }
        if duration_minutes <= 0 {
            return Err(ValidationError::InvalidValue {
                field: "duration_minutes".into(),
                message: "must be positive".into(),
            }
            .into());
        }
        if let Some(missing) = self.permissions.missing() {
            return Err(missing.into());
        }

        let session = BlockSession {
            origin: SessionOrigin::Solo,
            blocked_apps,
            started_at: now,
            ends_at: now + Duration::minutes(duration_minutes),
            strict,
            owner_user_id: self.account.read_user_id(),
            source_id: None,
        };

        // A manual start supersedes whatever else was active.
        self.db.write_slot(Slot::Group, None)?;
        self.db.write_slot(Slot::Schedule, None)?;
        self.db.write_slot(Slot::Solo, Some(&session))?;
        self.monitor.start()?;
        self.active = Some((Slot::Solo, session.clone()));

        info!(ends_at = %session.ends_at, apps = session.blocked_apps.len(), "solo session started");
        Ok(Event::SessionStarted {
            origin: SessionOrigin::Solo,
            blocked_apps: session.blocked_apps,
            ends_at: session.ends_at,
            strict: session.strict,
            at: now,
        })
    }

    /// End the solo session. Safe to call twice: the second call is a
    /// no-op and returns `None`.
    pub fn end_solo(&mut self, completed: bool, now: DateTime<Utc>) -> Result<Option<Event>> {
        let stored = self.db.read_slot(Slot::Solo)?;
        let cached = match &self.active {
            Some((Slot::Solo, s)) => Some(s.clone()),
            _ => None,
        };
        let Some(session) = stored.or(cached) else {
            return Ok(None);
        };

        self.db.write_slot(Slot::Solo, None)?;
        if matches!(self.active, Some((Slot::Solo, _))) {
            self.active = None;
        }
        self.stop_monitor_quietly();

        self.db.record_session(
            SessionOrigin::Solo,
            session.started_at,
            now,
            session.duration_seconds(),
            completed,
        )?;
        Ok(Some(Event::SessionEnded {
            origin: SessionOrigin::Solo,
            completed,
            at: now,
        }))
    }

    // ── Startup / foreground ─────────────────────────────────────────

    /// Run once at process start: validate each persisted slot
    /// independently, then resume whichever session is authoritative as
    /// if it had just been observed mid-flight.
    pub fn restore_on_launch(&mut self, now: DateTime<Utc>) -> Result<Vec<Event>> {
        let mut events = Vec::new();
        let current_user = self.account.read_user_id();

        for slot in Slot::ALL {
            let Some(session) = self.db.read_slot(slot)? else {
                continue;
            };

            if session.owner_user_id.is_some() && session.owner_user_id != current_user {
                warn!(slot = ?slot, "discarding session owned by another account");
                self.db.write_slot(slot, None)?;
                events.push(Event::SessionDiscarded {
                    origin: slot.origin(),
                    reason: DiscardReason::OwnerMismatch,
                    at: now,
                });
                continue;
            }

            if session.is_expired(now) {
                self.db.write_slot(slot, None)?;
                if slot == Slot::Schedule {
                    if let Some(id) = &session.source_id {
                        self.finish_schedule_status(id, &mut events, now);
                    }
                }
                events.push(Event::SessionDiscarded {
                    origin: slot.origin(),
                    reason: DiscardReason::Expired,
                    at: now,
                });
            }
        }

        if let Some((slot, session)) = self.db.read_active(now)? {
            let remaining = session.remaining(now).num_seconds();
            if !self.monitor.is_running() {
                self.monitor.start()?;
            }
            events.push(Event::SessionResumed {
                origin: session.origin,
                remaining_secs: remaining,
                at: now,
            });
            self.active = Some((slot, session));
        } else {
            self.active = None;
        }

        Ok(events)
    }

    /// Invoked when the host app returns to the foreground: re-check the
    /// countdown against wall-clock time and re-check permission status.
    pub fn on_foreground(&mut self, now: DateTime<Utc>) -> Result<ForegroundStatus> {
        let mut events = Vec::new();

        if let Some((_, session)) = &self.active {
            if session.is_expired(now) {
                events.extend(self.complete_active(now)?);
            } else {
                // The store may have changed out from under us (monitor
                // expiry race, a superseding start, a remote cancel)
                // while we were suspended.
                self.active = self.db.read_active(now)?;
            }
        }

        let mut missing = self.permissions.missing();
        if missing.is_none() && self.db.take_permission_missing()?.is_some() {
            missing = Some(PermissionError::ForegroundQueryMissing);
        }

        Ok(ForegroundStatus {
            remaining_secs: self
                .active_session()
                .map(|s| s.remaining(now).num_seconds()),
            missing_permission: missing,
            events,
        })
    }

    // ── Schedule processing ──────────────────────────────────────────

    /// Recurring timer callback (roughly once per second while any
    /// schedule exists). Arms alarms for future schedules, activates
    /// schedules whose window has opened, and completes schedules whose
    /// window has closed. Also finalizes the local countdown when the
    /// active session's window ends.
    pub fn tick(&mut self, now: DateTime<Utc>) -> Result<Vec<Event>> {
        let mut events = Vec::new();

        if let Some((_, session)) = &self.active {
            if session.is_expired(now) {
                events.extend(self.complete_active(now)?);
            }
        }

        for schedule in self.schedules.visible()? {
            match schedule.status {
                ScheduleStatus::Pending if now < schedule.start_time => {
                    if !self.armed.contains(&schedule.id) {
                        self.armed.insert(schedule.id.clone());
                        match self.wake.arm(&WakeRequest::for_schedule(&schedule)) {
                            Ok(()) => events.push(Event::AlarmArmed {
                                schedule_id: schedule.id.clone(),
                                fire_at: schedule.start_time,
                                at: now,
                            }),
                            Err(e) => {
                                warn!(schedule_id = %schedule.id, error = %e,
                                      "wake scheduling denied, falling back to tick activation");
                                self.alarm_degraded = true;
                                events.push(Event::AlarmFallback {
                                    schedule_id: schedule.id.clone(),
                                    at: now,
                                });
                            }
                        }
                    }
                }
                ScheduleStatus::Pending if schedule.is_in_window(now) => {
                    // Covers the app being foregrounded exactly as the
                    // window opens, without waiting on the alarm.
                    self.schedules.transition(&schedule.id, ScheduleStatus::Active)?;
                    let session = schedule.to_block_session(self.account.read_user_id());
                    self.db.write_slot(Slot::Schedule, Some(&session))?;
                    self.monitor.start()?;
                    self.active = self.db.read_active(now)?;
                    events.push(Event::ScheduleActivated {
                        schedule_id: schedule.id.clone(),
                        ends_at: session.ends_at,
                        at: now,
                    });
                }
                ScheduleStatus::Pending => {
                    // Window already over before it ever activated.
                    self.schedules
                        .transition(&schedule.id, ScheduleStatus::Cancelled)?;
                    events.push(Event::ScheduleCancelled {
                        schedule_id: schedule.id.clone(),
                        at: now,
                    });
                }
                ScheduleStatus::Active if now >= schedule.end_time() => {
                    self.schedules
                        .transition(&schedule.id, ScheduleStatus::Completed)?;
                    if self.active_schedule_id() == Some(schedule.id.as_str()) {
                        if let Some((_, session)) = self.active.take() {
                            self.db.record_session(
                                SessionOrigin::Scheduled,
                                session.started_at,
                                now,
                                session.duration_seconds(),
                                true,
                            )?;
                        }
                    }
                    self.db.write_slot(Slot::Schedule, None)?;
                    self.stop_monitor_quietly();
                    events.push(Event::ScheduleCompleted {
                        schedule_id: schedule.id.clone(),
                        at: now,
                    });
                }
                _ => {}
            }
        }

        Ok(events)
    }

    /// Cancel a schedule: disarm its alarm, deactivate it if it is the
    /// active one, and mark it cancelled. Any other active session is
    /// left untouched.
    pub fn cancel_schedule(&mut self, id: &str, now: DateTime<Utc>) -> Result<Vec<Event>> {
        let mut events = Vec::new();

        if let Err(e) = self.wake.disarm(id) {
            warn!(schedule_id = %id, error = %e, "failed to disarm wake timer");
        }
        self.armed.remove(id);

        if self.active_schedule_id() == Some(id) {
            self.active = None;
            self.db.write_slot(Slot::Schedule, None)?;
            self.stop_monitor_quietly();
        } else if let Some(stored) = self.db.read_slot(Slot::Schedule)? {
            if stored.source_id.as_deref() == Some(id) {
                self.db.write_slot(Slot::Schedule, None)?;
                self.stop_monitor_quietly();
            }
        }

        self.schedules.transition(id, ScheduleStatus::Cancelled)?;
        events.push(Event::ScheduleCancelled {
            schedule_id: id.to_string(),
            at: now,
        });
        Ok(events)
    }

    // ── Group sessions ───────────────────────────────────────────────

    /// Funnel a group status transition through the same activation /
    /// deactivation paths used by solo and scheduled sessions.
    pub fn on_group_event(&mut self, event: GroupEvent, now: DateTime<Utc>) -> Result<Vec<Event>> {
        let mut events = Vec::new();
        match event {
            GroupEvent::Activated(group) => {
                if group.end_time <= now {
                    return Ok(events);
                }
                let session = group.to_block_session();
                self.db.write_slot(Slot::Group, Some(&session))?;
                self.monitor.start()?;
                self.active = self.db.read_active(now)?;
                events.push(Event::GroupActivated {
                    session_id: group.id,
                    ends_at: session.ends_at,
                    at: now,
                });
            }
            GroupEvent::Ended(id) => self.deactivate_group(id, true, now, &mut events)?,
            GroupEvent::Cancelled(id) => self.deactivate_group(id, false, now, &mut events)?,
        }
        Ok(events)
    }

    /// Deactivate locally only if the currently persisted group session
    /// is the one the remote reported on.
    fn deactivate_group(
        &mut self,
        id: String,
        completed: bool,
        now: DateTime<Utc>,
        events: &mut Vec<Event>,
    ) -> Result<()> {
        let stored = self.db.read_slot(Slot::Group)?;
        let is_ours = stored
            .as_ref()
            .map(|s| s.source_id.as_deref() == Some(id.as_str()))
            .unwrap_or(false);
        if !is_ours {
            return Ok(());
        }
        if completed {
            if let Some(session) = &stored {
                self.db.record_session(
                    SessionOrigin::Group,
                    session.started_at,
                    now,
                    session.duration_seconds(),
                    true,
                )?;
            }
        }
        self.db.write_slot(Slot::Group, None)?;
        if matches!(self.active, Some((Slot::Group, _))) {
            self.active = None;
        }
        self.stop_monitor_quietly();
        events.push(Event::GroupDeactivated {
            session_id: id,
            completed,
            at: now,
        });
        Ok(())
    }

    // ── Internal ─────────────────────────────────────────────────────

    fn active_schedule_id(&self) -> Option<&str> {
        match &self.active {
            Some((Slot::Schedule, s)) => s.source_id.as_deref(),
            _ => None,
        }
    }

    /// The cached session's window is over: record it, clear its slot,
    /// release the monitor.
    fn complete_active(&mut self, now: DateTime<Utc>) -> Result<Vec<Event>> {
        let mut events = Vec::new();
        let Some((slot, session)) = self.active.take() else {
            return Ok(events);
        };

        self.db.record_session(
            session.origin,
            session.started_at,
            now,
            session.duration_seconds(),
            true,
        )?;
        self.db.write_slot(slot, None)?;
        self.stop_monitor_quietly();

        if slot == Slot::Schedule {
            if let Some(id) = &session.source_id {
                self.finish_schedule_status(id, &mut events, now);
            }
        }

        events.push(Event::SessionEnded {
            origin: session.origin,
            completed: true,
            at: now,
        });
        Ok(events)
    }

    fn finish_schedule_status(&self, id: &str, events: &mut Vec<Event>, now: DateTime<Utc>) {
        match self.schedules.transition(id, ScheduleStatus::Completed) {
            Ok(()) => events.push(Event::ScheduleCompleted {
                schedule_id: id.to_string(),
                at: now,
            }),
            Err(e) => warn!(schedule_id = %id, error = %e, "could not complete schedule"),
        }
    }

    fn stop_monitor_quietly(&self) {
        // The cleared store slot is the authoritative stop signal; a
        // failed process stop only delays the monitor's own exit.
        if let Err(e) = self.monitor.stop() {
            warn!(error = %e, "monitor stop signal failed");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::CoreError;
    use crate::session::{GroupSession, GroupStatus};
    use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
    use std::sync::{Arc, Mutex};

    #[derive(Default)]
    struct WakeLog {
        armed: Mutex<Vec<String>>,
        disarmed: Mutex<Vec<String>>,
        deny: AtomicBool,
    }

    struct TestWake(Arc<WakeLog>);

    impl WakeScheduler for TestWake {
        fn arm(&self, request: &WakeRequest) -> std::result::Result<(), crate::error::AlarmError> {
            if self.0.deny.load(Ordering::SeqCst) {
                return Err(crate::error::AlarmError::Denied("test".into()));
            }
            self.0.armed.lock().unwrap().push(request.schedule_id.clone());
            Ok(())
        }
        fn disarm(&self, schedule_id: &str) -> std::result::Result<(), crate::error::AlarmError> {
            self.0.disarmed.lock().unwrap().push(schedule_id.to_string());
            Ok(())
        }
    }

    #[derive(Default)]
    struct MonitorLog {
        running: AtomicBool,
        starts: AtomicU32,
    }

    struct TestMonitor(Arc<MonitorLog>);

    impl MonitorControl for TestMonitor {
        fn start(&self) -> std::io::Result<()> {
            self.0.running.store(true, Ordering::SeqCst);
            self.0.starts.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
        fn stop(&self) -> std::io::Result<()> {
            self.0.running.store(false, Ordering::SeqCst);
            Ok(())
        }
        fn is_running(&self) -> bool {
            self.0.running.load(Ordering::SeqCst)
        }
    }

    struct TestAccount(Option<String>);

    impl AccountInfo for TestAccount {
        fn read_user_id(&self) -> Option<String> {
            self.0.clone()
        }
    }

    struct TestPerms {
        fg: bool,
        ov: bool,
    }

    impl PermissionGate for TestPerms {
        fn has_foreground_query_permission(&self) -> bool {
            self.fg
        }
        fn has_overlay_permission(&self) -> bool {
            self.ov
        }
        fn request_permission(&self, _kind: crate::host::PermissionKind) {}
    }

    struct Fixture {
        controller: LifecycleController,
        wake: Arc<WakeLog>,
        monitor: Arc<MonitorLog>,
    }

    fn fixture_with_user(user: Option<&str>) -> Fixture {
        let wake = Arc::new(WakeLog::default());
        let monitor = Arc::new(MonitorLog::default());
        let controller = LifecycleController::new(
            Database::open_memory().unwrap(),
            ScheduleDb::open_memory().unwrap(),
            Box::new(TestWake(wake.clone())),
            Box::new(TestMonitor(monitor.clone())),
            Box::new(TestAccount(user.map(String::from))),
            Box::new(TestPerms { fg: true, ov: true }),
        );
        Fixture {
            controller,
            wake,
            monitor,
        }
    }

    fn fixture() -> Fixture {
        fixture_with_user(Some("user-1"))
    }

    fn apps() -> Vec<String> {
        vec!["instagram".into(), "tiktok".into()]
    }

    #[test]
    fn start_solo_persists_before_monitor_and_sets_countdown() {
        let mut fx = fixture();
        let now = Utc::now();
        fx.controller.start_solo(apps(), 25, false, now).unwrap();

        let stored = fx.controller.db.read_slot(Slot::Solo).unwrap().unwrap();
        assert_eq!(stored.duration_seconds(), 25 * 60);
        assert_eq!(stored.owner_user_id.as_deref(), Some("user-1"));
        assert!(fx.monitor.running.load(Ordering::SeqCst));
        assert_eq!(
            fx.controller.remaining(now).unwrap(),
            Duration::minutes(25)
        );
    }

    #[test]
    fn start_solo_rejects_empty_block_set() {
        let mut fx = fixture();
        let err = fx
            .controller
            .start_solo(vec![], 25, false, Utc::now())
            .unwrap_err();
        assert!(matches!(err, CoreError::Validation(_)));
    }

    #[test]
    fn start_solo_requires_permissions() {
        let wake = Arc::new(WakeLog::default());
        let monitor = Arc::new(MonitorLog::default());
        let mut controller = LifecycleController::new(
            Database::open_memory().unwrap(),
            ScheduleDb::open_memory().unwrap(),
            Box::new(TestWake(wake)),
            Box::new(TestMonitor(monitor.clone())),
            Box::new(TestAccount(None)),
            Box::new(TestPerms { fg: false, ov: true }),
        );
        let err = controller.start_solo(apps(), 25, false, Utc::now()).unwrap_err();
        assert!(matches!(
            err,
            CoreError::Permission(PermissionError::ForegroundQueryMissing)
        ));
        // Nothing half-applied.
        assert!(controller.db.read_slot(Slot::Solo).unwrap().is_none());
        assert!(!monitor.running.load(Ordering::SeqCst));
    }

    #[test]
    fn end_solo_is_idempotent() {
        let mut fx = fixture();
        let now = Utc::now();
        fx.controller.start_solo(apps(), 25, false, now).unwrap();

        let first = fx.controller.end_solo(false, now).unwrap();
        assert!(first.is_some());
        let second = fx.controller.end_solo(false, now).unwrap();
        assert!(second.is_none());

        let stats = fx.controller.db.history_stats().unwrap();
        assert_eq!(stats.total_sessions, 1);
        assert!(!fx.monitor.running.load(Ordering::SeqCst));
    }

    #[test]
    fn tick_arms_pending_future_schedule_once() {
        let mut fx = fixture();
        let now = Utc::now();
        fx.controller
            .schedules
            .add(apps(), now + Duration::minutes(10), 25)
            .unwrap();

        fx.controller.tick(now).unwrap();
        fx.controller.tick(now).unwrap();
        assert_eq!(fx.wake.armed.lock().unwrap().len(), 1);
    }

    #[test]
    fn alarm_denial_degrades_but_tick_still_activates() {
        let mut fx = fixture();
        fx.wake.deny.store(true, Ordering::SeqCst);
        let now = Utc::now();
        let sched = fx
            .controller
            .schedules
            .add(apps(), now + Duration::seconds(5), 25)
            .unwrap();

        let events = fx.controller.tick(now).unwrap();
        assert!(matches!(events[0], Event::AlarmFallback { .. }));
        assert!(fx.controller.alarm_degraded());

        // Window opens: the tick path takes over.
        let later = now + Duration::seconds(6);
        fx.controller.tick(later).unwrap();
        let loaded = fx.controller.schedules.get(&sched.id).unwrap().unwrap();
        assert_eq!(loaded.status, ScheduleStatus::Active);
        assert!(fx.monitor.running.load(Ordering::SeqCst));
    }

    #[test]
    fn tick_activates_schedule_in_window() {
        let mut fx = fixture();
        let now = Utc::now();
        let sched = fx
            .controller
            .schedules
            .add(apps(), now - Duration::seconds(1), 25)
            .unwrap();

        let events = fx.controller.tick(now).unwrap();
        assert!(events
            .iter()
            .any(|e| matches!(e, Event::ScheduleActivated { .. })));

        let stored = fx.controller.db.read_slot(Slot::Schedule).unwrap().unwrap();
        assert_eq!(stored.source_id.as_deref(), Some(sched.id.as_str()));
        assert_eq!(stored.origin, SessionOrigin::Scheduled);
        assert!(fx.monitor.running.load(Ordering::SeqCst));
    }

    #[test]
    fn tick_completes_overdue_schedule() {
        let mut fx = fixture();
        let start = Utc::now() - Duration::minutes(30);
        let sched = fx.controller.schedules.add(apps(), start, 25).unwrap();
        fx.controller
            .schedules
            .transition(&sched.id, ScheduleStatus::Active)
            .unwrap();

        let events = fx.controller.tick(Utc::now()).unwrap();
        assert!(events
            .iter()
            .any(|e| matches!(e, Event::ScheduleCompleted { .. })));
        let loaded = fx.controller.schedules.get(&sched.id).unwrap().unwrap();
        assert_eq!(loaded.status, ScheduleStatus::Completed);
        assert!(fx.controller.db.read_slot(Slot::Schedule).unwrap().is_none());
    }

    #[test]
    fn overlapping_schedules_yield_single_authoritative_session() {
        let mut fx = fixture();
        let now = Utc::now();
        fx.controller
            .schedules
            .add(apps(), now - Duration::minutes(5), 30)
            .unwrap();
        fx.controller
            .schedules
            .add(vec!["reddit".into()], now - Duration::minutes(1), 30)
            .unwrap();

        fx.controller.tick(now).unwrap();

        // Exactly one slot survives; the later-starting schedule wins.
        let (slot, session) = fx.controller.db.read_active(now).unwrap().unwrap();
        assert_eq!(slot, Slot::Schedule);
        assert_eq!(session.blocked_apps, vec!["reddit".to_string()]);
        let mut populated = 0;
        for s in Slot::ALL {
            if fx.controller.db.read_slot(s).unwrap().is_some() {
                populated += 1;
            }
        }
        assert_eq!(populated, 1);
    }

    #[test]
    fn cancel_non_active_schedule_leaves_active_session_untouched() {
        let mut fx = fixture();
        let now = Utc::now();
        fx.controller.start_solo(apps(), 25, false, now).unwrap();
        let sched = fx
            .controller
            .schedules
            .add(apps(), now + Duration::minutes(10), 25)
            .unwrap();
        fx.controller.tick(now).unwrap();

        fx.controller.cancel_schedule(&sched.id, now).unwrap();

        assert_eq!(fx.wake.disarmed.lock().unwrap().as_slice(), &[sched.id.clone()]);
        let loaded = fx.controller.schedules.get(&sched.id).unwrap().unwrap();
        assert_eq!(loaded.status, ScheduleStatus::Cancelled);
        // Solo session untouched.
        assert!(fx.controller.db.read_slot(Slot::Solo).unwrap().is_some());
        assert!(fx.controller.active_session().is_some());
    }

    #[test]
    fn restore_clears_expired_session() {
        let mut fx = fixture();
        let now = Utc::now();
        let expired = BlockSession {
            origin: SessionOrigin::Solo,
            blocked_apps: apps(),
            started_at: now - Duration::minutes(30),
            ends_at: now - Duration::minutes(5),
            strict: false,
            owner_user_id: Some("user-1".into()),
            source_id: None,
        };
        fx.controller.db.write_slot(Slot::Solo, Some(&expired)).unwrap();

        let events = fx.controller.restore_on_launch(now).unwrap();
        assert!(events.iter().any(|e| matches!(
            e,
            Event::SessionDiscarded {
                reason: DiscardReason::Expired,
                ..
            }
        )));
        assert!(fx.controller.active_session().is_none());
        assert!(fx.controller.db.read_slot(Slot::Solo).unwrap().is_none());
        assert!(!fx.monitor.running.load(Ordering::SeqCst));
    }

    #[test]
    fn restore_discards_other_users_session() {
        let mut fx = fixture_with_user(Some("user-2"));
        let now = Utc::now();
        let foreign = BlockSession {
            origin: SessionOrigin::Solo,
            blocked_apps: apps(),
            started_at: now,
            ends_at: now + Duration::minutes(20),
            strict: false,
            owner_user_id: Some("user-1".into()),
            source_id: None,
        };
        fx.controller.db.write_slot(Slot::Solo, Some(&foreign)).unwrap();

        let events = fx.controller.restore_on_launch(now).unwrap();
        assert!(events.iter().any(|e| matches!(
            e,
            Event::SessionDiscarded {
                reason: DiscardReason::OwnerMismatch,
                ..
            }
        )));
        assert!(fx.controller.active_session().is_none());
        assert!(fx.controller.db.read_slot(Slot::Solo).unwrap().is_none());
    }

    #[test]
    fn restore_resumes_live_session_and_restarts_monitor() {
        let mut fx = fixture();
        let now = Utc::now();
        let live = BlockSession {
            origin: SessionOrigin::Solo,
            blocked_apps: apps(),
            started_at: now - Duration::minutes(5),
            ends_at: now + Duration::minutes(20),
            strict: false,
            owner_user_id: Some("user-1".into()),
            source_id: None,
        };
        fx.controller.db.write_slot(Slot::Solo, Some(&live)).unwrap();

        let events = fx.controller.restore_on_launch(now).unwrap();
        assert!(events
            .iter()
            .any(|e| matches!(e, Event::SessionResumed { .. })));
        assert_eq!(
            fx.controller.remaining(now).unwrap(),
            Duration::minutes(20)
        );
        assert!(fx.monitor.running.load(Ordering::SeqCst));
    }

    fn group_session(now: DateTime<Utc>, id: &str) -> GroupSession {
        GroupSession {
            id: id.into(),
            invite_code: "ABC234".into(),
            creator_id: "user-1".into(),
            start_time: now,
            end_time: now + Duration::minutes(60),
            duration_minutes: 60,
            blocked_apps: apps(),
            strict: true,
            status: GroupStatus::Active,
            members: vec![],
        }
    }

    #[test]
    fn group_activation_and_end_flow() {
        let mut fx = fixture();
        let now = Utc::now();
        let group = group_session(now, "g-1");

        fx.controller
            .on_group_event(GroupEvent::Activated(group), now)
            .unwrap();
        let stored = fx.controller.db.read_slot(Slot::Group).unwrap().unwrap();
        assert_eq!(stored.origin, SessionOrigin::Group);
        assert!(stored.strict);
        assert!(fx.monitor.running.load(Ordering::SeqCst));

        let events = fx
            .controller
            .on_group_event(GroupEvent::Ended("g-1".into()), now + Duration::minutes(60))
            .unwrap();
        assert!(events
            .iter()
            .any(|e| matches!(e, Event::GroupDeactivated { completed: true, .. })));
        assert!(fx.controller.db.read_slot(Slot::Group).unwrap().is_none());
        assert!(fx.controller.active_session().is_none());
    }

    #[test]
    fn group_end_for_unknown_session_is_ignored() {
        let mut fx = fixture();
        let now = Utc::now();
        fx.controller.start_solo(apps(), 25, false, now).unwrap();

        let events = fx
            .controller
            .on_group_event(GroupEvent::Cancelled("g-9".into()), now)
            .unwrap();
        assert!(events.is_empty());
        // Solo untouched.
        assert!(fx.controller.db.read_slot(Slot::Solo).unwrap().is_some());
    }

    #[test]
    fn on_foreground_finalizes_expired_countdown() {
        let mut fx = fixture();
        let now = Utc::now();
        fx.controller.start_solo(apps(), 1, false, now).unwrap();

        let status = fx
            .controller
            .on_foreground(now + Duration::seconds(61))
            .unwrap();
        assert!(status.remaining_secs.is_none());
        assert!(status
            .events
            .iter()
            .any(|e| matches!(e, Event::SessionEnded { completed: true, .. })));
        let stats = fx.controller.db.history_stats().unwrap();
        assert_eq!(stats.total_sessions, 1);
        assert_eq!(stats.total_focus_seconds, 60);
    }
}
