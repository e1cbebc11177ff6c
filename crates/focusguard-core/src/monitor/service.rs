//! Store-driven monitor service loop.
//!
//! Runs in its own process. On every sample it re-reads the session store:
//! an absent record is the cooperative stop signal, an expired record is
//! cleared and the loop exits, and a changed record rebuilds the engine.
//! Because state is recovered from the store on entry, a restarted monitor
//! resumes the same window with no help from the controller.

use chrono::{DateTime, Utc};
use tracing::{info, warn};

use super::engine::{MonitorEngine, SampleEffect};
use super::{ForegroundProbe, MonitorConfig, OverlaySurface};
use crate::error::StoreError;
use crate::session::{AppId, BlockSession, SessionOrigin};
use crate::storage::{Database, Slot};

/// Why the service loop stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MonitorExit {
    /// The store no longer holds an active session (stopped or cancelled).
    SessionCleared,
    /// The window reached its end; the slot has been cleared.
    Expired,
    /// The foreground query capability is gone; flagged for the
    /// controller and stopped rather than enforcing with stale data.
    PermissionLost,
}

pub struct MonitorService<P: ForegroundProbe, O: OverlaySurface> {
    db: Database,
    probe: P,
    overlay: O,
    config: MonitorConfig,
    active: Option<(Slot, MonitorEngine)>,
}

impl<P: ForegroundProbe, O: OverlaySurface> MonitorService<P, O> {
    pub fn new(db: Database, probe: P, overlay: O, config: MonitorConfig) -> Self {
        Self {
            db,
            probe,
            overlay,
            config,
            active: None,
        }
    }

    /// The alarm fire path: persist the schedule's BlockSession directly,
    /// with no controller involved. The caller then runs the service.
    pub fn bootstrap_schedule(
        db: &Database,
        schedule_id: &str,
        blocked_apps: Vec<AppId>,
        now: DateTime<Utc>,
        ends_at: DateTime<Utc>,
    ) -> Result<(), StoreError> {
        let session = BlockSession {
            origin: SessionOrigin::Scheduled,
            blocked_apps,
            started_at: now,
            ends_at,
            strict: false,
            owner_user_id: None,
            source_id: Some(schedule_id.to_string()),
        };
        db.write_slot(Slot::Schedule, Some(&session))
    }

    /// One sampling step. Returns `Some(exit)` when the loop should stop.
    pub fn step(&mut self, now: DateTime<Utc>) -> Result<Option<MonitorExit>, StoreError> {
        // Expiry backstop first. This is what guarantees termination even
        // if the controller's stop signal never arrives.
        if let Some((slot, engine)) = &self.active {
            if now >= engine.expire_at() {
                let slot = *slot;
                self.overlay.hide();
                self.db.write_slot(slot, None)?;
                self.active = None;
                info!("session window over, monitor stopping");
                return Ok(Some(MonitorExit::Expired));
            }
        }

        let Some((slot, session)) = self.db.read_active(now)? else {
            self.overlay.hide();
            self.active = None;
            return Ok(Some(MonitorExit::SessionCleared));
        };

        let rebuild = self
            .active
            .as_ref()
            .map(|(s, e)| *s != slot || !e.matches(&session))
            .unwrap_or(true);
        if rebuild {
            info!(
                origin = session.origin.as_str(),
                ends_at = %session.ends_at,
                apps = session.blocked_apps.len(),
                "monitoring session"
            );
            self.overlay.hide();
            self.active = Some((slot, MonitorEngine::new(&session, &self.config)));
        }

        let foreground = match self.probe.foreground_app(now) {
            Ok(fg) => fg,
            Err(perm) => {
                warn!(error = %perm, "foreground query unavailable, stopping monitor");
                self.overlay.hide();
                self.active = None;
                self.db.set_permission_missing("foreground_query")?;
                return Ok(Some(MonitorExit::PermissionLost));
            }
        };

        let Some(entry) = self.active.as_mut() else {
            return Ok(None);
        };
        let slot = entry.0;
        let effect = entry.1.on_sample(now, foreground.as_deref());
        match effect {
            SampleEffect::ShowOverlay => {
                self.overlay.show(session.remaining(now).num_seconds());
            }
            SampleEffect::HideOverlay => self.overlay.hide(),
            SampleEffect::Expired => {
                self.overlay.hide();
                self.db.write_slot(slot, None)?;
                self.active = None;
                info!("session window over, monitor stopping");
                return Ok(Some(MonitorExit::Expired));
            }
            SampleEffect::None => {}
        }

        Ok(None)
    }

    /// Sample until the session ends, is cleared, or the probe dies.
    pub fn run(&mut self) -> Result<MonitorExit, StoreError> {
        let interval = std::time::Duration::from_secs(self.config.sample_interval_secs.max(1));
        loop {
            if let Some(exit) = self.step(Utc::now())? {
                return Ok(exit);
            }
            std::thread::sleep(interval);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::PermissionError;
    use chrono::Duration;
    use std::collections::VecDeque;

    struct ScriptedProbe {
        samples: VecDeque<Result<Option<AppId>, PermissionError>>,
    }

    impl ScriptedProbe {
        fn new(samples: Vec<Result<Option<AppId>, PermissionError>>) -> Self {
            Self {
                samples: samples.into(),
            }
        }
    }

    impl ForegroundProbe for ScriptedProbe {
        fn foreground_app(
            &mut self,
            _now: DateTime<Utc>,
        ) -> Result<Option<AppId>, PermissionError> {
            self.samples.pop_front().unwrap_or(Ok(None))
        }
    }

    #[derive(Default)]
    struct RecordingOverlay {
        visible: bool,
        shows: u32,
    }

    impl OverlaySurface for RecordingOverlay {
        fn show(&mut self, _remaining_secs: i64) {
            self.visible = true;
            self.shows += 1;
        }
        fn hide(&mut self) {
            self.visible = false;
        }
    }

    fn solo_session(now: DateTime<Utc>, len_secs: i64) -> BlockSession {
        BlockSession {
            origin: SessionOrigin::Solo,
            blocked_apps: vec!["instagram".into()],
            started_at: now,
            ends_at: now + Duration::seconds(len_secs),
            strict: false,
            owner_user_id: None,
            source_id: None,
        }
    }

    fn service_with(
        db: Database,
        samples: Vec<Result<Option<AppId>, PermissionError>>,
    ) -> MonitorService<ScriptedProbe, RecordingOverlay> {
        MonitorService::new(
            db,
            ScriptedProbe::new(samples),
            RecordingOverlay::default(),
            MonitorConfig::default(),
        )
    }

    #[test]
    fn exits_immediately_without_session() {
        let mut svc = service_with(Database::open_memory().unwrap(), vec![]);
        assert_eq!(
            svc.step(Utc::now()).unwrap(),
            Some(MonitorExit::SessionCleared)
        );
    }

    #[test]
    fn blocked_foreground_raises_overlay() {
        let now = Utc::now();
        let db = Database::open_memory().unwrap();
        db.write_slot(Slot::Solo, Some(&solo_session(now, 600))).unwrap();
        let mut svc = service_with(db, vec![Ok(Some("instagram".into()))]);

        assert_eq!(svc.step(now).unwrap(), None);
        assert!(svc.overlay.visible);
    }

    #[test]
    fn cleared_slot_is_a_stop_signal() {
        let now = Utc::now();
        let db = Database::open_memory().unwrap();
        db.write_slot(Slot::Solo, Some(&solo_session(now, 600))).unwrap();
        let mut svc = service_with(
            db,
            vec![Ok(Some("instagram".into())), Ok(Some("instagram".into()))],
        );
        assert_eq!(svc.step(now).unwrap(), None);
        assert!(svc.overlay.visible);

        svc.db.write_slot(Slot::Solo, None).unwrap();
        assert_eq!(svc.step(now).unwrap(), Some(MonitorExit::SessionCleared));
        assert!(!svc.overlay.visible);
    }

    #[test]
    fn expiry_clears_slot_and_stops() {
        let now = Utc::now();
        let db = Database::open_memory().unwrap();
        db.write_slot(Slot::Solo, Some(&solo_session(now, 60))).unwrap();
        let mut svc = service_with(db, vec![Ok(Some("instagram".into())), Ok(None)]);

        assert_eq!(svc.step(now).unwrap(), None);
        assert!(svc.overlay.visible);

        let exit = svc.step(now + Duration::seconds(61)).unwrap();
        assert_eq!(exit, Some(MonitorExit::Expired));
        assert!(!svc.overlay.visible);
        assert!(svc.db.read_slot(Slot::Solo).unwrap().is_none());
    }

    #[test]
    fn probe_failure_degrades_to_stop_and_flags() {
        let now = Utc::now();
        let db = Database::open_memory().unwrap();
        db.write_slot(Slot::Solo, Some(&solo_session(now, 600))).unwrap();
        let mut svc = service_with(
            db,
            vec![
                Ok(Some("instagram".into())),
                Err(PermissionError::ForegroundQueryMissing),
            ],
        );
        svc.step(now).unwrap();
        assert_eq!(svc.step(now).unwrap(), Some(MonitorExit::PermissionLost));
        assert!(!svc.overlay.visible);
        assert_eq!(
            svc.db.take_permission_missing().unwrap().as_deref(),
            Some("foreground_query")
        );
    }

    #[test]
    fn restart_recovers_session_from_store() {
        let now = Utc::now();
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("focusguard.db");
        {
            let db = Database::open_at(&path).unwrap();
            db.write_slot(Slot::Solo, Some(&solo_session(now, 600))).unwrap();
        }
        // A brand-new service (fresh process) picks the session up.
        let db = Database::open_at(&path).unwrap();
        let mut svc = service_with(db, vec![Ok(Some("instagram".into()))]);
        assert_eq!(svc.step(now).unwrap(), None);
        assert!(svc.overlay.visible);
        assert_eq!(svc.overlay.shows, 1);
    }

    #[test]
    fn bootstrap_schedule_produces_active_session() {
        let now = Utc::now();
        let db = Database::open_memory().unwrap();
        MonitorService::<ScriptedProbe, RecordingOverlay>::bootstrap_schedule(
            &db,
            "sched-1",
            vec!["tiktok".into()],
            now,
            now + Duration::seconds(60),
        )
        .unwrap();

        let (slot, session) = db.read_active(now).unwrap().unwrap();
        assert_eq!(slot, Slot::Schedule);
        assert_eq!(session.origin, SessionOrigin::Scheduled);
        assert_eq!(session.source_id.as_deref(), Some("sched-1"));
    }
}
