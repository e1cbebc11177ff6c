//! # Focusguard Core Library
//!
//! Core engine for Focusguard, a digital-wellbeing enforcement tool:
//! the user nominates applications to be unusable for a bounded window --
//! an immediate solo session, a future scheduled window, or a window
//! shared with other participants -- and the engine keeps them blocked
//! even if the controlling process dies, the machine restarts mid-window,
//! or the user tries to escape by switching tasks.
//!
//! ## Architecture
//!
//! - **Lifecycle Controller**: tick-driven state machine owning the single
//!   "what is active right now" decision across the three origins
//! - **Session Store**: crash-surviving whole-blob slots in SQLite, the
//!   single source of truth consulted on every (re)start
//! - **Foreground Monitor**: an independent sampling loop (own process)
//!   that raises and lowers the blocking overlay with debounce
//! - **Alarm Scheduler**: one-shot OS wake timers that activate scheduled
//!   windows without the controller resident
//! - **Group Adapter**: translates a remotely replicated session into the
//!   same local activation calls as solo and scheduled sessions
//!
//! ## Key Components
//!
//! - [`LifecycleController`]: orchestration entry points
//! - [`MonitorEngine`] / [`MonitorService`]: enforcement state machine
//! - [`Database`]: session slots and history persistence
//! - [`GroupSyncAdapter`]: shared-session synchronization

pub mod alarm;
pub mod controller;
pub mod error;
pub mod events;
pub mod group;
pub mod host;
pub mod monitor;
pub mod session;
pub mod storage;

pub use alarm::{WakeRequest, WakeScheduler};
pub use controller::{ForegroundStatus, LifecycleController};
pub use error::{
    AlarmError, CoreError, GroupError, PermissionError, StoreError, ValidationError,
};
pub use events::Event;
pub use group::{GroupEvent, GroupRemote, GroupSyncAdapter, HttpGroupRemote};
pub use host::{AccountInfo, AppInventory, InstalledApp, MonitorControl, PermissionGate, PermissionKind};
pub use monitor::{
    ForegroundProbe, MonitorConfig, MonitorEngine, MonitorExit, MonitorService, MonitorState,
    OverlaySurface,
};
pub use session::{
    AppId, BlockSession, FocusSchedule, GroupMember, GroupSession, GroupStatus, MemberStatus,
    ScheduleStatus, SessionOrigin,
};
pub use storage::{Config, Database, ScheduleDb, Slot};
