//! TOML-based application configuration.
//!
//! Stores user preferences including:
//! - Default blocking duration, default blocked-app set, strict mode
//! - Monitor tuning (sample interval, debounce, safe apps, overlay command)
//! - Group sync endpoint and credentials
//! - The signed-in account id used to validate restored sessions
//!
//! Configuration is stored at `~/.config/focusguard/config.toml`.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use super::data_dir;

/// Blocking defaults applied to new solo sessions.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BlockingConfig {
    #[serde(default = "default_duration_minutes")]
    pub default_duration_minutes: i64,
    #[serde(default)]
    pub strict_mode: bool,
    /// Default block set for the picker; opaque app identifiers.
    #[serde(default)]
    pub blocked_apps: Vec<String>,
}

/// Foreground monitor tuning.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MonitorSection {
    #[serde(default = "default_sample_interval")]
    pub sample_interval_secs: u64,
    #[serde(default = "default_debounce")]
    pub debounce_threshold: u32,
    /// How far back a foreground sample may be reused when the query
    /// returns nothing (tolerates gaps in event delivery).
    #[serde(default = "default_trailing_window")]
    pub trailing_window_secs: i64,
    /// The controller's own app identifier; always a safe app.
    #[serde(default = "default_controller_app")]
    pub controller_app: String,
    /// The home-screen / shell app identifier, if any.
    #[serde(default)]
    pub home_app: Option<String>,
    /// Command spawned to present the full-screen overlay. Killed to hide
    /// it. When unset the monitor logs instead of drawing.
    #[serde(default)]
    pub overlay_command: Option<Vec<String>>,
}

/// Group sync endpoint.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct GroupConfig {
    #[serde(default)]
    pub base_url: Option<String>,
    #[serde(default)]
    pub api_key: Option<String>,
}

/// Signed-in account. Authentication itself lives outside the core; only
/// the resulting id is needed here.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct AccountConfig {
    #[serde(default)]
    pub user_id: Option<String>,
}

/// Application configuration.
///
/// Serialized to/from TOML at `~/.config/focusguard/config.toml`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub blocking: BlockingConfig,
    #[serde(default)]
    pub monitor: MonitorSection,
    #[serde(default)]
    pub group: GroupConfig,
    #[serde(default)]
    pub account: AccountConfig,
}

// Default functions
fn default_duration_minutes() -> i64 {
    25
}
fn default_sample_interval() -> u64 {
    1
}
fn default_debounce() -> u32 {
    3
}
fn default_trailing_window() -> i64 {
    10
}
fn default_controller_app() -> String {
    "focusguard".into()
}

impl Default for BlockingConfig {
    fn default() -> Self {
        Self {
            default_duration_minutes: default_duration_minutes(),
            strict_mode: false,
            blocked_apps: Vec::new(),
        }
    }
}

impl Default for MonitorSection {
    fn default() -> Self {
        Self {
            sample_interval_secs: default_sample_interval(),
            debounce_threshold: default_debounce(),
            trailing_window_secs: default_trailing_window(),
            controller_app: default_controller_app(),
            home_app: None,
            overlay_command: None,
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            blocking: BlockingConfig::default(),
            monitor: MonitorSection::default(),
            group: GroupConfig::default(),
            account: AccountConfig::default(),
        }
    }
}

impl Config {
    fn path() -> Result<PathBuf, Box<dyn std::error::Error>> {
        Ok(data_dir()?.join("config.toml"))
    }

    /// Load from disk, writing the default file on first run.
    ///
    /// # Errors
    /// Returns an error if the file exists but cannot be read or parsed.
    pub fn load() -> Result<Self, Box<dyn std::error::Error>> {
        let path = Self::path()?;
        match std::fs::read_to_string(&path) {
            Ok(content) => Ok(toml::from_str(&content)?),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                let cfg = Self::default();
                cfg.save()?;
                Ok(cfg)
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Persist to disk.
    ///
    /// # Errors
    /// Returns an error if the config cannot be serialized or written.
    pub fn save(&self) -> Result<(), Box<dyn std::error::Error>> {
        let content = toml::to_string_pretty(self)?;
        std::fs::write(Self::path()?, content)?;
        Ok(())
    }

    /// Load from disk, returning default on error.
    pub fn load_or_default() -> Self {
        Self::load().unwrap_or_default()
    }
}
