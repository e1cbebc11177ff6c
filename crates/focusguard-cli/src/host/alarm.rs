//! One-shot wake timers via transient systemd user units.
//!
//! `arm` creates a `--user` timer named after the schedule id that execs
//! `focusguard monitor run --schedule-id ... --apps ... --until ...` at
//! the window start, so activation happens with no controller process
//! resident. Re-arming the same id stops the old unit first, which makes
//! the call idempotent.

use std::path::PathBuf;
use std::process::Command;

use focusguard_core::{AlarmError, WakeRequest, WakeScheduler};
use tracing::debug;

pub struct SystemdWakeScheduler {
    exe: PathBuf,
}

impl SystemdWakeScheduler {
    pub fn new() -> Result<Self, std::io::Error> {
        Ok(Self {
            exe: std::env::current_exe()?,
        })
    }

    fn unit_name(schedule_id: &str) -> String {
        let safe: String = schedule_id
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() { c } else { '-' })
            .collect();
        format!("focusguard-wake-{safe}")
    }

    fn stop_unit(unit: &str) {
        for suffix in [".timer", ".service"] {
            let _ = Command::new("systemctl")
                .args(["--user", "stop", &format!("{unit}{suffix}")])
                .output();
        }
        let _ = Command::new("systemctl")
            .args(["--user", "reset-failed", unit])
            .output();
    }
}

impl WakeScheduler for SystemdWakeScheduler {
    fn arm(&self, request: &WakeRequest) -> Result<(), AlarmError> {
        let unit = Self::unit_name(&request.schedule_id);
        // Replace any prior pending alarm for this id.
        Self::stop_unit(&unit);

        let on_calendar = request.fire_at.format("%Y-%m-%d %H:%M:%S UTC").to_string();
        let output = Command::new("systemd-run")
            .args([
                "--user",
                "--collect",
                "--unit",
                &unit,
                &format!("--on-calendar={on_calendar}"),
                "--timer-property=AccuracySec=1s",
            ])
            .arg(&self.exe)
            .args([
                "monitor",
                "run",
                "--schedule-id",
                &request.schedule_id,
                "--apps",
                &request.blocked_apps.join(","),
                "--until",
                &request.expire_at.to_rfc3339(),
            ])
            .output()
            .map_err(|e| AlarmError::SpawnFailed(e.to_string()))?;

        if !output.status.success() {
            return Err(AlarmError::Denied(
                String::from_utf8_lossy(&output.stderr).trim().to_string(),
            ));
        }
        debug!(unit = %unit, fire_at = %request.fire_at, "wake timer armed");
        Ok(())
    }

    fn disarm(&self, schedule_id: &str) -> Result<(), AlarmError> {
        Self::stop_unit(&Self::unit_name(schedule_id));
        Ok(())
    }
}
