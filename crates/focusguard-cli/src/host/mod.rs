//! Linux host adapters behind the core's collaborator traits.

pub mod alarm;
pub mod apps;
pub mod monitor_control;
pub mod overlay;
pub mod probe;

pub use apps::DesktopAppInventory;
pub use overlay::HostOverlay;

use focusguard_core::{
    AccountInfo, Config, Database, LifecycleController, PermissionGate, PermissionKind, ScheduleDb,
};

/// Wire a controller to the real host: SQLite storage, systemd wake
/// timers, process-supervised monitor, config-backed account.
pub fn build_controller(
    config: &Config,
) -> Result<LifecycleController, Box<dyn std::error::Error>> {
    Ok(LifecycleController::new(
        Database::open()?,
        ScheduleDb::open()?,
        Box::new(alarm::SystemdWakeScheduler::new()?),
        Box::new(monitor_control::ProcessMonitorControl::new()?),
        Box::new(ConfigAccount {
            user_id: config.account.user_id.clone(),
        }),
        Box::new(DisplayPermissionGate {
            overlay_configured: config.monitor.overlay_command.is_some(),
        }),
    ))
}

/// Account id from the config file; the sign-in flow itself is outside
/// the engine.
pub struct ConfigAccount {
    pub user_id: Option<String>,
}

impl AccountInfo for ConfigAccount {
    fn read_user_id(&self) -> Option<String> {
        self.user_id.clone()
    }
}

/// Permission checks for a desktop session: foreground queries need a
/// display server, the overlay needs a display or a configured command.
pub struct DisplayPermissionGate {
    pub overlay_configured: bool,
}

fn has_display() -> bool {
    std::env::var_os("DISPLAY").is_some() || std::env::var_os("WAYLAND_DISPLAY").is_some()
}

impl PermissionGate for DisplayPermissionGate {
    fn has_foreground_query_permission(&self) -> bool {
        has_display()
    }

    fn has_overlay_permission(&self) -> bool {
        self.overlay_configured || has_display()
    }

    fn request_permission(&self, kind: PermissionKind) {
        match kind {
            PermissionKind::ForegroundQuery => {
                eprintln!("run focusguard inside a graphical session (DISPLAY must be set)")
            }
            PermissionKind::Overlay => {
                eprintln!("set monitor.overlay_command in config.toml to enable the overlay")
            }
        }
    }
}
