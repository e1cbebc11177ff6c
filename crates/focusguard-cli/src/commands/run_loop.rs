//! Foreground controller loop.
//!
//! Restores persisted state, then ticks the lifecycle controller once a
//! second and polls the group remote every few seconds, funnelling group
//! transitions through the same controller entry points as everything
//! else. The countdown is computed from the locally held end time; the
//! loop never blocks on the remote.

use chrono::Utc;
use focusguard_core::{Config, GroupError, GroupSyncAdapter, HttpGroupRemote};
use tracing::{info, warn};

use crate::host;

const GROUP_POLL_EVERY_TICKS: u64 = 5;

pub fn run() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let config = Config::load_or_default();
    let mut controller = host::build_controller(&config)?;

    let mut group = match build_group_adapter(&config) {
        Ok(adapter) => Some(adapter),
        Err(GroupError::NotConfigured) | Err(GroupError::NotSignedIn) => None,
        Err(e) => {
            warn!(error = %e, "group sync unavailable");
            None
        }
    };

    let now = Utc::now();
    for event in controller.restore_on_launch(now)? {
        info!(event = %serde_json::to_string(&event)?, "restored");
    }
    let status = controller.on_foreground(now)?;
    if let Some(missing) = status.missing_permission {
        warn!(%missing, "enforcement cannot run until this permission is granted");
    }

    let mut ticks: u64 = 0;
    loop {
        let now = Utc::now();
        for event in controller.tick(now)? {
            info!(event = %serde_json::to_string(&event)?, "tick");
        }

        if ticks % GROUP_POLL_EVERY_TICKS == 0 {
            if let Some(adapter) = group.as_mut() {
                match adapter.refresh(now) {
                    Ok(events) => {
                        for group_event in events {
                            for event in controller.on_group_event(group_event, now)? {
                                info!(event = %serde_json::to_string(&event)?, "group");
                            }
                        }
                    }
                    // Local state untouched; the next poll retries.
                    Err(e) => warn!(error = %e, "group refresh failed"),
                }
            }
        }

        if let Some(remaining) = controller.remaining(now) {
            if remaining.num_seconds() % 60 == 0 {
                info!(remaining_secs = remaining.num_seconds(), "countdown");
            }
        }

        ticks += 1;
        std::thread::sleep(std::time::Duration::from_secs(1));
    }
}

fn build_group_adapter(
    config: &Config,
) -> Result<GroupSyncAdapter<HttpGroupRemote>, GroupError> {
    let base_url = config
        .group
        .base_url
        .as_deref()
        .ok_or(GroupError::NotConfigured)?;
    let api_key = config.group.api_key.as_deref().unwrap_or_default();
    let user_id = config
        .account
        .user_id
        .clone()
        .ok_or(GroupError::NotSignedIn)?;
    Ok(GroupSyncAdapter::new(
        HttpGroupRemote::new(base_url, api_key)?,
        user_id,
    ))
}
