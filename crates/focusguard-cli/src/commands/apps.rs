use clap::Subcommand;
use focusguard_core::AppInventory;

use crate::host::DesktopAppInventory;

#[derive(Subcommand)]
pub enum AppsAction {
    /// List installable applications (id + display name)
    List,
}

pub fn run(action: AppsAction) -> Result<(), Box<dyn std::error::Error>> {
    match action {
        AppsAction::List => {
            let inventory = DesktopAppInventory::new();
            let apps = inventory.list_installable_apps();
            println!("{}", serde_json::to_string_pretty(&apps)?);
        }
    }
    Ok(())
}
