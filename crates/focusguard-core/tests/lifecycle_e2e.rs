//! End-to-end lifecycle tests with simulated clocks and mock hosts.

use chrono::{Duration, Utc};
use focusguard_core::monitor::service::MonitorService;
use focusguard_core::{
    AlarmError, AccountInfo, Database, ForegroundProbe, LifecycleController, MonitorConfig,
    MonitorControl, MonitorState, OverlaySurface, PermissionError, PermissionGate, PermissionKind,
    ScheduleDb, SessionOrigin, Slot, WakeRequest, WakeScheduler,
};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

struct NoopWake {
    armed: Arc<Mutex<Vec<WakeRequest>>>,
}

impl WakeScheduler for NoopWake {
    fn arm(&self, request: &WakeRequest) -> Result<(), AlarmError> {
        self.armed.lock().unwrap().push(request.clone());
        Ok(())
    }
    fn disarm(&self, _schedule_id: &str) -> Result<(), AlarmError> {
        Ok(())
    }
}

struct FlagMonitor(Arc<AtomicBool>);

impl MonitorControl for FlagMonitor {
    fn start(&self) -> std::io::Result<()> {
        self.0.store(true, Ordering::SeqCst);
        Ok(())
    }
    fn stop(&self) -> std::io::Result<()> {
        self.0.store(false, Ordering::SeqCst);
        Ok(())
    }
    fn is_running(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

struct User(&'static str);

impl AccountInfo for User {
    fn read_user_id(&self) -> Option<String> {
        Some(self.0.to_string())
    }
}

struct AllGranted;

impl PermissionGate for AllGranted {
    fn has_foreground_query_permission(&self) -> bool {
        true
    }
    fn has_overlay_permission(&self) -> bool {
        true
    }
    fn request_permission(&self, _kind: PermissionKind) {}
}

fn controller_at(
    path: &std::path::Path,
) -> (LifecycleController, Arc<Mutex<Vec<WakeRequest>>>, Arc<AtomicBool>) {
    let armed = Arc::new(Mutex::new(Vec::new()));
    let running = Arc::new(AtomicBool::new(false));
    let controller = LifecycleController::new(
        Database::open_at(path).unwrap(),
        ScheduleDb::open_at(path).unwrap(),
        Box::new(NoopWake {
            armed: armed.clone(),
        }),
        Box::new(FlagMonitor(running.clone())),
        Box::new(User("user-1")),
        Box::new(AllGranted),
    );
    (controller, armed, running)
}

#[test]
fn solo_minute_session_runs_to_completion() {
    let dir = tempfile::tempdir().unwrap();
    let db_path = dir.path().join("focusguard.db");
    let (mut controller, _, running) = controller_at(&db_path);

    let t0 = Utc::now();
    controller
        .start_solo(vec!["app-a".into()], 1, false, t0)
        .unwrap();
    assert!(running.load(Ordering::SeqCst));

    // Mid-window: still counting down.
    let events = controller.tick(t0 + Duration::seconds(30)).unwrap();
    assert!(events.is_empty());
    assert_eq!(
        controller.remaining(t0 + Duration::seconds(30)).unwrap(),
        Duration::seconds(30)
    );

    // 61 simulated seconds in: idle, store empty, one completed record.
    controller.tick(t0 + Duration::seconds(61)).unwrap();
    assert!(controller.active_session().is_none());
    let db = Database::open_at(&db_path).unwrap();
    for slot in Slot::ALL {
        assert!(db.read_slot(slot).unwrap().is_none());
    }
    let history = db.recent_sessions(10).unwrap();
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].duration_seconds, 60);
    assert!(history[0].completed);
    assert_eq!(history[0].origin, "solo");
    assert!(!running.load(Ordering::SeqCst));
}

#[test]
fn restored_controller_resumes_mid_window_session() {
    let dir = tempfile::tempdir().unwrap();
    let db_path = dir.path().join("focusguard.db");
    let t0 = Utc::now();
    {
        let (mut controller, _, _) = controller_at(&db_path);
        controller
            .start_solo(vec!["app-a".into()], 30, false, t0)
            .unwrap();
        // Controller process "dies" here.
    }

    let (mut controller, _, running) = controller_at(&db_path);
    let t1 = t0 + Duration::minutes(10);
    controller.restore_on_launch(t1).unwrap();

    let session = controller.active_session().expect("session resumed");
    assert_eq!(session.origin, SessionOrigin::Solo);
    assert_eq!(session.remaining(t1), Duration::minutes(20));
    assert!(running.load(Ordering::SeqCst));
}

// ── Alarm fire path ──────────────────────────────────────────────────

struct FixedProbe(Option<&'static str>);

impl ForegroundProbe for FixedProbe {
    fn foreground_app(
        &mut self,
        _now: chrono::DateTime<Utc>,
    ) -> Result<Option<String>, PermissionError> {
        Ok(self.0.map(String::from))
    }
}

#[derive(Default)]
struct FlagOverlay {
    visible: bool,
}

impl OverlaySurface for FlagOverlay {
    fn show(&mut self, _remaining_secs: i64) {
        self.visible = true;
    }
    fn hide(&mut self) {
        self.visible = false;
    }
}

#[test]
fn alarm_fire_path_activates_without_controller() {
    let dir = tempfile::tempdir().unwrap();
    let db_path = dir.path().join("focusguard.db");

    // A controller armed the schedule earlier, then its process went away.
    let t0 = Utc::now();
    let schedule_id = {
        let (mut controller, armed, _) = controller_at(&db_path);
        let sched = controller
            .schedules()
            .add(vec!["app-a".into()], t0 + Duration::seconds(5), 1)
            .unwrap();
        controller.tick(t0).unwrap();
        let requests = armed.lock().unwrap();
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].fire_at, sched.start_time);
        sched.id
    };

    // The wake handler alone: bootstrap the store, then run the monitor.
    let fire_at = t0 + Duration::seconds(5);
    let expire_at = t0 + Duration::seconds(65);
    let db = Database::open_at(&db_path).unwrap();
    MonitorService::<FixedProbe, FlagOverlay>::bootstrap_schedule(
        &db,
        &schedule_id,
        vec!["app-a".into()],
        fire_at,
        expire_at,
    )
    .unwrap();

    let mut service = MonitorService::new(
        db,
        FixedProbe(Some("app-a")),
        FlagOverlay::default(),
        MonitorConfig::default(),
    );

    // Active BlockSession exists and the monitor is live and enforcing.
    assert_eq!(service.step(fire_at).unwrap(), None);

    let db = Database::open_at(&db_path).unwrap();
    let (slot, session) = db.read_active(fire_at).unwrap().unwrap();
    assert_eq!(slot, Slot::Schedule);
    assert_eq!(session.origin, SessionOrigin::Scheduled);
    assert_eq!(session.ends_at, expire_at);
    assert_eq!(session.source_id.as_deref(), Some(schedule_id.as_str()));

    // And it self-terminates at expiry regardless of how it was started.
    let exit = service.step(expire_at).unwrap();
    assert!(exit.is_some());
    assert!(db.read_slot(Slot::Schedule).unwrap().is_none());
}

#[test]
fn monitor_reports_blocking_then_idle_over_a_window() {
    // Monitor never reports Blocking once now >= ends_at.
    let now = Utc::now();
    let session = focusguard_core::BlockSession {
        origin: SessionOrigin::Solo,
        blocked_apps: vec!["app-a".into()],
        started_at: now,
        ends_at: now + Duration::seconds(10),
        strict: false,
        owner_user_id: None,
        source_id: None,
    };
    let mut engine = focusguard_core::MonitorEngine::new(&session, &MonitorConfig::default());
    engine.on_sample(now, Some("app-a"));
    assert_eq!(engine.state(), MonitorState::Blocking);
    engine.on_sample(now + Duration::seconds(10), Some("app-a"));
    assert_eq!(engine.state(), MonitorState::Idle);
}
