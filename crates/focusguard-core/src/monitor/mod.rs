//! Foreground monitor: the enforcement half of the engine.
//!
//! [`engine::MonitorEngine`] is the pure Idle/Watching/Blocking state
//! machine; [`service::MonitorService`] wraps it in a store-driven
//! sampling loop meant to run in its own OS-supervised process. The two
//! halves share no memory with the controller -- the session store is the
//! only channel, which is what lets enforcement outlive the controlling
//! process.

pub mod engine;
pub mod service;

pub use engine::{MonitorEngine, MonitorState, SampleEffect};
pub use service::{MonitorExit, MonitorService};

use chrono::{DateTime, Utc};

use crate::error::PermissionError;
use crate::session::AppId;

/// Samples the most recently foregrounded application identifier.
///
/// Implementations should tolerate brief gaps in event delivery by
/// answering from a short trailing window rather than returning `None`
/// the instant a single query comes back empty.
pub trait ForegroundProbe {
    /// `Ok(None)` means "no known foreground app right now"; an `Err`
    /// means the query capability itself is gone (permission revoked),
    /// at which point the monitor degrades to Idle rather than risk a
    /// stale overlay.
    fn foreground_app(&mut self, now: DateTime<Utc>) -> Result<Option<AppId>, PermissionError>;
}

/// The full-screen blocking overlay.
///
/// `show`/`hide` must be idempotent; the sampling loop calls them on
/// every transition without tracking prior visibility.
pub trait OverlaySurface {
    fn show(&mut self, remaining_secs: i64);
    fn hide(&mut self);
}

/// Monitor tuning, captured on entry to Watching/Blocking.
#[derive(Debug, Clone)]
pub struct MonitorConfig {
    /// Consecutive safe samples required before the overlay lifts.
    pub debounce_threshold: u32,
    /// The controller's own app identifier. Never treated as blocked and
    /// always counts as safe.
    pub controller_app: AppId,
    /// The device's home-screen app, if known. Counts as safe.
    pub home_app: Option<AppId>,
    /// Seconds between samples.
    pub sample_interval_secs: u64,
}

impl MonitorConfig {
    pub fn from_config(cfg: &crate::storage::Config) -> Self {
        Self {
            debounce_threshold: cfg.monitor.debounce_threshold,
            controller_app: cfg.monitor.controller_app.clone(),
            home_app: cfg.monitor.home_app.clone(),
            sample_interval_secs: cfg.monitor.sample_interval_secs,
        }
    }
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            debounce_threshold: 3,
            controller_app: "focusguard".into(),
            home_app: None,
            sample_interval_secs: 1,
        }
    }
}
