use clap::Subcommand;
use focusguard_core::Config;

#[derive(Subcommand)]
pub enum ConfigAction {
    /// Print the current configuration
    Show,
    /// Set the signed-in account id used to validate restored sessions
    SetUser {
        /// User id, or omit to sign out
        user_id: Option<String>,
    },
    /// Set the default blocked-app set
    SetApps {
        #[arg(value_delimiter = ',')]
        apps: Vec<String>,
    },
    /// Configure the group sync endpoint
    SetGroupRemote {
        base_url: String,
        #[arg(long)]
        api_key: Option<String>,
    },
}

pub fn run(action: ConfigAction) -> Result<(), Box<dyn std::error::Error>> {
    match action {
        ConfigAction::Show => {
            let config = Config::load_or_default();
            print!("{}", toml::to_string_pretty(&config)?);
        }
        ConfigAction::SetUser { user_id } => {
            let mut config = Config::load_or_default();
            config.account.user_id = user_id;
            config.save()?;
            println!("account updated");
        }
        ConfigAction::SetApps { apps } => {
            let mut config = Config::load_or_default();
            config.blocking.blocked_apps = apps;
            config.save()?;
            println!("default block set updated");
        }
        ConfigAction::SetGroupRemote { base_url, api_key } => {
            let mut config = Config::load_or_default();
            config.group.base_url = Some(base_url);
            config.group.api_key = api_key;
            config.save()?;
            println!("group remote updated");
        }
    }
    Ok(())
}
