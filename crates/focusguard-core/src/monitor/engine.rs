//! Monitor state machine.
//!
//! The engine is wall-clock based and has no internal threads -- the
//! hosting loop calls [`MonitorEngine::on_sample`] once per sampling
//! interval and applies the returned effect to the overlay.
//!
//! ## State transitions
//!
//! ```text
//! Watching -> Blocking   (blocked app foregrounded)
//! Blocking -> Watching   (debounce_threshold consecutive safe samples)
//! any      -> Idle       (now >= expire_at)
//! ```
//!
//! Only the controller app and the home screen count as safe. Drifting to
//! a third unrelated app while Blocking resets the counter and keeps the
//! overlay up: leaving the blocked app sideways is not compliance.

use chrono::{DateTime, Utc};

use super::MonitorConfig;
use crate::session::{AppId, BlockSession};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MonitorState {
    /// No active session; the hosting process may stop.
    Idle,
    /// Active session, overlay hidden.
    Watching,
    /// Active session, overlay shown.
    Blocking,
}

/// What the hosting loop must do after a sample.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SampleEffect {
    None,
    ShowOverlay,
    HideOverlay,
    /// The window is over: hide the overlay, clear the store, stop.
    Expired,
}

/// Debounce and overlay state for one blocking window.
///
/// Rebuilt from zero whenever the monitor process restarts; the counter is
/// a flicker optimization, not a correctness requirement -- correctness
/// comes from the session store.
#[derive(Debug)]
pub struct MonitorEngine {
    state: MonitorState,
    blocked_apps: Vec<AppId>,
    expire_at: DateTime<Utc>,
    safe_apps: Vec<AppId>,
    controller_app: AppId,
    debounce_threshold: u32,
    consecutive_safe: u32,
}

impl MonitorEngine {
    /// Enter Watching for a non-expired session, capturing the expiry and
    /// the safe-app set.
    pub fn new(session: &BlockSession, config: &MonitorConfig) -> Self {
        let mut safe_apps = vec![config.controller_app.clone()];
        if let Some(home) = &config.home_app {
            safe_apps.push(home.clone());
        }
        Self {
            state: MonitorState::Watching,
            blocked_apps: session.blocked_apps.clone(),
            expire_at: session.ends_at,
            safe_apps,
            controller_app: config.controller_app.clone(),
            debounce_threshold: config.debounce_threshold,
            consecutive_safe: 0,
        }
    }

    pub fn state(&self) -> MonitorState {
        self.state
    }

    pub fn expire_at(&self) -> DateTime<Utc> {
        self.expire_at
    }

    /// The engine still matches this session (same window end and block
    /// set). When it stops matching, the loop rebuilds the engine.
    pub fn matches(&self, session: &BlockSession) -> bool {
        self.expire_at == session.ends_at && self.blocked_apps == session.blocked_apps
    }

    /// Evaluate one foreground sample.
    pub fn on_sample(&mut self, now: DateTime<Utc>, foreground: Option<&str>) -> SampleEffect {
        if now >= self.expire_at {
            self.state = MonitorState::Idle;
            self.consecutive_safe = 0;
            return SampleEffect::Expired;
        }

        let is_blocked = foreground
            .map(|fg| fg != self.controller_app && self.blocked_apps.iter().any(|a| a == fg))
            .unwrap_or(false);
        let is_safe = foreground
            .map(|fg| self.safe_apps.iter().any(|a| a == fg))
            .unwrap_or(false);

        if is_blocked {
            self.consecutive_safe = 0;
            if self.state != MonitorState::Blocking {
                self.state = MonitorState::Blocking;
                return SampleEffect::ShowOverlay;
            }
            return SampleEffect::None;
        }

        if self.state == MonitorState::Blocking {
            if is_safe {
                self.consecutive_safe += 1;
                if self.consecutive_safe >= self.debounce_threshold {
                    self.state = MonitorState::Watching;
                    self.consecutive_safe = 0;
                    return SampleEffect::HideOverlay;
                }
            } else {
                // Unrelated app: not proof of compliance.
                self.consecutive_safe = 0;
            }
        } else {
            self.consecutive_safe = 0;
        }

        SampleEffect::None
    }
}
