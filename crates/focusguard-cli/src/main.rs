use clap::{Parser, Subcommand};

mod commands;
mod host;

#[derive(Parser)]
#[command(name = "focusguard", version, about = "Focusguard CLI")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Solo focus sessions
    Session {
        #[command(subcommand)]
        action: commands::session::SessionAction,
    },
    /// Scheduled blocking windows
    Schedule {
        #[command(subcommand)]
        action: commands::schedule::ScheduleAction,
    },
    /// Group focus sessions
    Group {
        #[command(subcommand)]
        action: commands::group::GroupAction,
    },
    /// Installed applications for the block-set picker
    Apps {
        #[command(subcommand)]
        action: commands::apps::AppsAction,
    },
    /// Configuration management
    Config {
        #[command(subcommand)]
        action: commands::config::ConfigAction,
    },
    /// Enforcement monitor (normally started by the controller or a wake timer)
    Monitor {
        #[command(subcommand)]
        action: commands::monitor::MonitorAction,
    },
    /// Run the controller loop in the foreground
    Run,
}

fn main() {
    let cli = Cli::parse();
    let result = match cli.command {
        Commands::Session { action } => commands::session::run(action),
        Commands::Schedule { action } => commands::schedule::run(action),
        Commands::Group { action } => commands::group::run(action),
        Commands::Apps { action } => commands::apps::run(action),
        Commands::Config { action } => commands::config::run(action),
        Commands::Monitor { action } => commands::monitor::run(action),
        Commands::Run => commands::run_loop::run(),
    };

    if let Err(e) = result {
        eprintln!("error: {e}");
        std::process::exit(1);
    }
}
