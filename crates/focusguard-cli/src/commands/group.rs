use chrono::{DateTime, Utc};
use clap::Subcommand;
use focusguard_core::{Config, GroupError, GroupSyncAdapter, HttpGroupRemote};

use crate::host;

#[derive(Subcommand)]
pub enum GroupAction {
    /// Create a shared session and print its invite code
    Create {
        /// Apps to block (comma-separated ids)
        #[arg(long, value_delimiter = ',')]
        apps: Vec<String>,
        /// Window start, RFC 3339
        #[arg(long)]
        at: String,
        /// Window length in minutes
        #[arg(long)]
        minutes: i64,
        /// Suppress the leave-early affordance for all members
        #[arg(long)]
        strict: bool,
    },
    /// Join a session by invite code
    Join { code: String },
    /// Leave the current session
    Leave,
    /// Cancel the current session (creator only)
    Cancel,
    /// Show the current session
    Status,
}

fn adapter(config: &Config) -> Result<GroupSyncAdapter<HttpGroupRemote>, GroupError> {
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

pub fn run(action: GroupAction) -> Result<(), Box<dyn std::error::Error>> {
    let config = Config::load_or_default();
    let mut adapter = adapter(&config)?;
    let now = Utc::now();

    match action {
        GroupAction::Create {
            apps,
            at,
            minutes,
            strict,
        } => {
            if apps.is_empty() {
                return Err("choose at least one app to block".into());
            }
            let start: DateTime<Utc> = at
                .parse()
                .map_err(|e| format!("invalid start time {at:?}: {e}"))?;
            if minutes <= 0 {
                return Err("duration must be positive".into());
            }
            let session = adapter.create(start, minutes, apps, strict)?;
            println!("invite code: {}", session.invite_code);
            println!("{}", serde_json::to_string_pretty(&session)?);
        }
        GroupAction::Join { code } => {
            let session = adapter.join_by_code(&code, now)?;
            println!("joined {} (starts {})", session.invite_code, session.start_time);
            println!("{}", serde_json::to_string_pretty(&session)?);
        }
        GroupAction::Leave => {
            adapter.refresh(now)?;
            let Some(session) = adapter.snapshot().cloned() else {
                return Err("no current group session".into());
            };
            adapter.leave(&session.id)?;
            // If it was already enforcing locally, release it.
            let mut controller = host::build_controller(&config)?;
            controller.restore_on_launch(now)?;
            controller.on_group_event(
                focusguard_core::GroupEvent::Cancelled(session.id.clone()),
                now,
            )?;
            println!("left {}", session.invite_code);
        }
        GroupAction::Cancel => {
            adapter.refresh(now)?;
            let Some(session) = adapter.snapshot().cloned() else {
                return Err("no current group session".into());
            };
            adapter.cancel(&session.id)?;
            let mut controller = host::build_controller(&config)?;
            controller.restore_on_launch(now)?;
            let events = controller.on_group_event(
                focusguard_core::GroupEvent::Cancelled(session.id.clone()),
                now,
            )?;
            for event in events {
                println!("{}", serde_json::to_string(&event)?);
            }
            println!("cancelled {}", session.invite_code);
        }
        GroupAction::Status => {
            adapter.refresh(now)?;
            match adapter.snapshot() {
                Some(session) => println!("{}", serde_json::to_string_pretty(session)?),
                None => println!("no current group session"),
            }
        }
    }
    Ok(())
}
