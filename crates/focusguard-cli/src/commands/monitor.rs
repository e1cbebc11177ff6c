//! The enforcement monitor process.
//!
//! `focusguard monitor run` is started three ways: by the controller when
//! a session begins, by a systemd wake timer when a scheduled window
//! opens (with `--schedule-id/--apps/--until`, in which case it writes
//! the session store itself before monitoring), and by hand when
//! debugging. In every case the session store is the source of truth and
//! the monitor exits on its own at the window's end.

use chrono::{DateTime, Utc};
use clap::Subcommand;
use focusguard_core::monitor::service::MonitorService;
use focusguard_core::{Config, Database, MonitorConfig, MonitorExit};
use tracing::info;

use crate::host::{self, HostOverlay};

#[derive(Subcommand)]
pub enum MonitorAction {
    /// Run the sampling loop until the active session ends
    Run {
        /// Schedule id to activate before monitoring (wake-timer path)
        #[arg(long)]
        schedule_id: Option<String>,
        /// Blocked apps for the schedule activation (comma-separated ids)
        #[arg(long, value_delimiter = ',')]
        apps: Vec<String>,
        /// Window end for the schedule activation, RFC 3339
        #[arg(long)]
        until: Option<String>,
    },
    /// Report whether a monitor process is running
    Status,
}

pub fn run(action: MonitorAction) -> Result<(), Box<dyn std::error::Error>> {
    match action {
        MonitorAction::Run {
            schedule_id,
            apps,
            until,
        } => run_monitor(schedule_id, apps, until),
        MonitorAction::Status => {
            if host::monitor_control::monitor_pid()?.is_some() {
                println!("running");
            } else {
                println!("stopped");
            }
            Ok(())
        }
    }
}

fn run_monitor(
    schedule_id: Option<String>,
    apps: Vec<String>,
    until: Option<String>,
) -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let config = Config::load_or_default();
    let db = Database::open()?;
    let now = Utc::now();

    // Wake-timer activation: persist the schedule's session before the
    // loop, with no controller in the picture.
    if let Some(id) = &schedule_id {
        let ends_at: DateTime<Utc> = until
            .as_deref()
            .ok_or("--until is required with --schedule-id")?
            .parse()
            .map_err(|e| format!("invalid --until: {e}"))?;
        if apps.is_empty() {
            return Err("--apps is required with --schedule-id".into());
        }
        if ends_at > now {
            MonitorService::<host::probe::HostProbe, HostOverlay>::bootstrap_schedule(
                &db, id, apps, now, ends_at,
            )?;
            info!(schedule_id = %id, ends_at = %ends_at, "schedule activated by wake timer");
        } else {
            info!(schedule_id = %id, "wake fired after the window closed, nothing to do");
        }
    }

    // Single monitor per machine; a second start is a no-op.
    if host::monitor_control::monitor_pid()?.is_some() {
        info!("monitor already running");
        return Ok(());
    }
    host::monitor_control::write_own_pid()?;

    let probe = host::probe::HostProbe::new(config.monitor.trailing_window_secs)?;
    let overlay = HostOverlay::from_config(&config);
    let mut service = MonitorService::new(db, probe, overlay, MonitorConfig::from_config(&config));

    let exit = service.run();
    host::monitor_control::clear_own_pid();
    match exit? {
        MonitorExit::Expired => info!("window complete"),
        MonitorExit::SessionCleared => info!("session cleared, stopping"),
        MonitorExit::PermissionLost => {
            return Err("foreground query permission lost; enforcement stopped".into())
        }
    }
    Ok(())
}
