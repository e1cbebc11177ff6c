//! Application inventory from XDG desktop entries.
//!
//! The app identifier is the entry's `StartupWMClass` (lowercased) when
//! present, else the desktop file's stem -- the same identifier the X11
//! probe reports for the running window, which is what makes block sets
//! line up with enforcement.

use std::collections::BTreeMap;
use std::path::PathBuf;

use focusguard_core::{AppInventory, InstalledApp};

pub struct DesktopAppInventory {
    dirs: Vec<PathBuf>,
}

impl DesktopAppInventory {
    pub fn new() -> Self {
        let mut dirs = vec![
            PathBuf::from("/usr/share/applications"),
            PathBuf::from("/usr/local/share/applications"),
        ];
        if let Some(home) = std::env::var_os("HOME") {
            dirs.push(PathBuf::from(home).join(".local/share/applications"));
        }
        Self { dirs }
    }

    pub fn with_dirs(dirs: Vec<PathBuf>) -> Self {
        Self { dirs }
    }

    fn parse_entry(stem: &str, content: &str) -> Option<InstalledApp> {
        let mut name = None;
        let mut wm_class = None;
        let mut in_entry = false;

        for line in content.lines() {
            let line = line.trim();
            if line.starts_with('[') {
                in_entry = line == "[Desktop Entry]";
                continue;
            }
            if !in_entry {
                continue;
            }
            if let Some(value) = line.strip_prefix("NoDisplay=") {
                if value.trim() == "true" {
                    return None;
                }
            } else if let Some(value) = line.strip_prefix("Hidden=") {
                if value.trim() == "true" {
                    return None;
                }
            } else if let Some(value) = line.strip_prefix("Name=") {
                if name.is_none() {
                    name = Some(value.trim().to_string());
                }
            } else if let Some(value) = line.strip_prefix("StartupWMClass=") {
                wm_class = Some(value.trim().to_lowercase());
            }
        }

        Some(InstalledApp {
            id: wm_class.unwrap_or_else(|| stem.to_lowercase()),
            display_name: name?,
        })
    }
}

impl Default for DesktopAppInventory {
    fn default() -> Self {
        Self::new()
    }
}

impl AppInventory for DesktopAppInventory {
    fn list_installable_apps(&self) -> Vec<InstalledApp> {
        let mut apps: BTreeMap<String, InstalledApp> = BTreeMap::new();
        for dir in &self.dirs {
            let Ok(entries) = std::fs::read_dir(dir) else {
                continue;
            };
            for entry in entries.flatten() {
                let path = entry.path();
                if path.extension().and_then(|e| e.to_str()) != Some("desktop") {
                    continue;
                }
                let Some(stem) = path.file_stem().and_then(|s| s.to_str()) else {
                    continue;
                };
                let Ok(content) = std::fs::read_to_string(&path) else {
                    continue;
                };
                if let Some(app) = Self::parse_entry(stem, &content) {
                    apps.entry(app.id.clone()).or_insert(app);
                }
            }
        }
        let mut list: Vec<InstalledApp> = apps.into_values().collect();
        list.sort_by(|a, b| a.display_name.to_lowercase().cmp(&b.display_name.to_lowercase()));
        list
    }
}
