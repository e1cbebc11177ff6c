use chrono::{DateTime, Utc};
use clap::Subcommand;
use focusguard_core::{Config, ScheduleDb};

use crate::host;

#[derive(Subcommand)]
pub enum ScheduleAction {
    /// Schedule a future blocking window
    Add {
        /// Apps to block (comma-separated ids)
        #[arg(long, value_delimiter = ',')]
        apps: Vec<String>,
        /// Window start, RFC 3339 (e.g. 2026-08-06T14:00:00Z)
        #[arg(long)]
        at: String,
        /// Window length in minutes
        #[arg(long)]
        minutes: i64,
    },
    /// List pending and active schedules
    List,
    /// Cancel a schedule by id
    Cancel { id: String },
}

pub fn run(action: ScheduleAction) -> Result<(), Box<dyn std::error::Error>> {
    let config = Config::load_or_default();
    match action {
        ScheduleAction::Add { apps, at, minutes } => {
            if apps.is_empty() {
                return Err("choose at least one app to block".into());
            }
            let start: DateTime<Utc> = at
                .parse()
                .map_err(|e| format!("invalid start time {at:?}: {e}"))?;
            let now = Utc::now();
            if start <= now {
                return Err("start time must be in the future".into());
            }
            if minutes <= 0 {
                return Err("duration must be positive".into());
            }

            let mut controller = host::build_controller(&config)?;
            controller.restore_on_launch(now)?;
            let schedule = controller.schedules().add(apps, start, minutes)?;
            // Arm the wake timer right away rather than waiting on a tick.
            let events = controller.tick(now)?;
            println!("{}", serde_json::to_string_pretty(&schedule)?);
            for event in events {
                println!("{}", serde_json::to_string(&event)?);
            }
        }
        ScheduleAction::List => {
            let db = ScheduleDb::open()?;
            println!("{}", serde_json::to_string_pretty(&db.visible()?)?);
        }
        ScheduleAction::Cancel { id } => {
            let mut controller = host::build_controller(&config)?;
            let now = Utc::now();
            controller.restore_on_launch(now)?;
            let events = controller.cancel_schedule(&id, now)?;
            for event in events {
                println!("{}", serde_json::to_string(&event)?);
            }
        }
    }
    Ok(())
}
