//! Monitor process supervision via a pidfile.
//!
//! The stop here is only a hint: the authoritative stop signal is the
//! cleared session-store slot, which the monitor observes on its next
//! sample, and the monitor's own expiry check bounds its lifetime even
//! if both are lost.

use std::path::PathBuf;
use std::process::{Command, Stdio};

use focusguard_core::storage::data_dir;
use focusguard_core::MonitorControl;
use tracing::{debug, warn};

fn pidfile_path() -> std::io::Result<PathBuf> {
    data_dir()
        .map(|d| d.join("monitor.pid"))
        .map_err(|e| std::io::Error::other(e.to_string()))
}

/// Pid of a live monitor process, if one is running.
pub fn monitor_pid() -> std::io::Result<Option<i32>> {
    let path = pidfile_path()?;
    let Ok(content) = std::fs::read_to_string(&path) else {
        return Ok(None);
    };
    let Ok(pid) = content.trim().parse::<i32>() else {
        let _ = std::fs::remove_file(&path);
        return Ok(None);
    };
    if process_alive(pid) {
        Ok(Some(pid))
    } else {
        // Stale pidfile from a crashed monitor.
        let _ = std::fs::remove_file(&path);
        Ok(None)
    }
}

/// Record the calling process as the monitor.
pub fn write_own_pid() -> std::io::Result<()> {
    std::fs::write(pidfile_path()?, std::process::id().to_string())
}

pub fn clear_own_pid() {
    if let Ok(path) = pidfile_path() {
        let _ = std::fs::remove_file(path);
    }
}

#[cfg(unix)]
fn process_alive(pid: i32) -> bool {
    use nix::sys::signal;
    use nix::unistd::Pid;
    signal::kill(Pid::from_raw(pid), None).is_ok()
}

#[cfg(not(unix))]
fn process_alive(_pid: i32) -> bool {
    false
}

#[cfg(unix)]
fn terminate(pid: i32) {
    use nix::sys::signal::{self, Signal};
    use nix::unistd::Pid;
    match signal::kill(Pid::from_raw(pid), Signal::SIGTERM) {
        Ok(()) | Err(nix::errno::Errno::ESRCH) => {}
        Err(e) => warn!(pid, error = %e, "failed to signal monitor"),
    }
}

#[cfg(not(unix))]
fn terminate(_pid: i32) {}

/// Starts `focusguard monitor run` as a detached child and signals it to
/// stop by pid.
pub struct ProcessMonitorControl {
    exe: PathBuf,
}

impl ProcessMonitorControl {
    pub fn new() -> Result<Self, std::io::Error> {
        Ok(Self {
            exe: std::env::current_exe()?,
        })
    }
}

impl MonitorControl for ProcessMonitorControl {
    fn start(&self) -> std::io::Result<()> {
        if monitor_pid()?.is_some() {
            debug!("monitor already running");
            return Ok(());
        }
        let child = Command::new(&self.exe)
            .args(["monitor", "run"])
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()?;
        debug!(pid = child.id(), "monitor spawned");
        Ok(())
    }

    fn stop(&self) -> std::io::Result<()> {
        if let Some(pid) = monitor_pid()? {
            terminate(pid);
        }
        Ok(())
    }

    fn is_running(&self) -> bool {
        matches!(monitor_pid(), Ok(Some(_)))
    }
}
