//! Blocking overlay, as a child process.
//!
//! `show` spawns the configured full-screen command (remaining seconds in
//! `FOCUSGUARD_REMAINING_SECS`); `hide` kills it. Dismissal only ever
//! happens through the sampling loop observing compliance -- the overlay
//! process itself has no way to lift the block. Without a configured
//! command the monitor still enforces state and logs transitions.

use std::process::{Child, Command, Stdio};

use focusguard_core::{Config, OverlaySurface};
use tracing::{info, warn};

pub struct CommandOverlay {
    command: Vec<String>,
    child: Option<Child>,
}

impl CommandOverlay {
    pub fn new(command: Vec<String>) -> Self {
        Self {
            command,
            child: None,
        }
    }
}

impl OverlaySurface for CommandOverlay {
    fn show(&mut self, remaining_secs: i64) {
        if self.child.is_some() {
            return;
        }
        let Some((program, args)) = self.command.split_first() else {
            return;
        };
        match Command::new(program)
            .args(args)
            .env("FOCUSGUARD_REMAINING_SECS", remaining_secs.to_string())
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()
        {
            Ok(child) => self.child = Some(child),
            Err(e) => warn!(program = %program, error = %e, "overlay spawn failed"),
        }
    }

    fn hide(&mut self) {
        if let Some(mut child) = self.child.take() {
            let _ = child.kill();
            let _ = child.wait();
        }
    }
}

/// Log-only stand-in when no overlay command is configured.
#[derive(Default)]
pub struct LogOverlay {
    visible: bool,
}

impl OverlaySurface for LogOverlay {
    fn show(&mut self, remaining_secs: i64) {
        if !self.visible {
            warn!(remaining_secs, "blocked app foregrounded (no overlay command configured)");
            self.visible = true;
        }
    }

    fn hide(&mut self) {
        if self.visible {
            info!("block lifted");
            self.visible = false;
        }
    }
}

pub enum HostOverlay {
    Command(CommandOverlay),
    Log(LogOverlay),
}

impl HostOverlay {
    pub fn from_config(config: &Config) -> Self {
        match &config.monitor.overlay_command {
            Some(command) if !command.is_empty() => {
                HostOverlay::Command(CommandOverlay::new(command.clone()))
            }
            _ => HostOverlay::Log(LogOverlay::default()),
        }
    }
}

impl OverlaySurface for HostOverlay {
    fn show(&mut self, remaining_secs: i64) {
        match self {
            HostOverlay::Command(o) => o.show(remaining_secs),
            HostOverlay::Log(o) => o.show(remaining_secs),
        }
    }

    fn hide(&mut self) {
        match self {
            HostOverlay::Command(o) => o.hide(),
            HostOverlay::Log(o) => o.hide(),
        }
    }
}
