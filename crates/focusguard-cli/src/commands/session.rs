use chrono::Utc;
use clap::Subcommand;
use focusguard_core::{Config, Database};

use crate::host;

#[derive(Subcommand)]
pub enum SessionAction {
    /// Start an immediate blocking session
    Start {
        /// Apps to block (comma-separated ids); defaults to the configured set
        #[arg(long, value_delimiter = ',')]
        apps: Vec<String>,
        /// Session length in minutes; defaults to the configured duration
        #[arg(long)]
        minutes: Option<i64>,
        /// Suppress the end-early affordance
        #[arg(long)]
        strict: bool,
    },
    /// End the running solo session early
    End,
    /// Show the authoritative session, if any
    Status,
    /// Recent session history
    History {
        #[arg(long, default_value_t = 10)]
        limit: u32,
    },
}

pub fn run(action: SessionAction) -> Result<(), Box<dyn std::error::Error>> {
    let config = Config::load_or_default();
    match action {
        SessionAction::Start {
            apps,
            minutes,
            strict,
        } => {
            let apps = if apps.is_empty() {
                config.blocking.blocked_apps.clone()
            } else {
                apps
            };
            let minutes = minutes.unwrap_or(config.blocking.default_duration_minutes);
            let strict = strict || config.blocking.strict_mode;

            let mut controller = host::build_controller(&config)?;
            let now = Utc::now();
            controller.restore_on_launch(now)?;
            if let Some(active) = controller.active_session() {
                return Err(format!(
                    "a {} session is already active until {}",
                    active.origin.as_str(),
                    active.ends_at
                )
                .into());
            }
            let event = controller.start_solo(apps, minutes, strict, now)?;
            println!("{}", serde_json::to_string_pretty(&event)?);
        }
        SessionAction::End => {
            let mut controller = host::build_controller(&config)?;
            let now = Utc::now();
            controller.restore_on_launch(now)?;
            if let Some(active) = controller.active_session() {
                if active.strict {
                    return Err("strict session: cannot end early".into());
                }
            }
            match controller.end_solo(false, now)? {
                Some(event) => println!("{}", serde_json::to_string_pretty(&event)?),
                None => println!("no solo session to end"),
            }
        }
        SessionAction::Status => {
            let db = Database::open()?;
            match db.read_active(Utc::now())? {
                Some((_, session)) => {
                    println!("{}", serde_json::to_string_pretty(&session)?)
                }
                None => println!("idle"),
            }
        }
        SessionAction::History { limit } => {
            let db = Database::open()?;
            let records = db.recent_sessions(limit)?;
            println!("{}", serde_json::to_string_pretty(&records)?);
        }
    }
    Ok(())
}
