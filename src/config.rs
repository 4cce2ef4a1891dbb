//! Configuration module for project switching.
//!
//! This module provides a layered configuration system that supports:
//! - Default values
//! - TOML configuration file
//! - Environment variable overrides
//!
//! # Environment Variables
//!
//! Environment variables must be prefixed with `PS_` and use double underscores
//! to separate nested levels:
//! - `PS_SWITCHING__DEBOUNCE_MS=500` sets `switching.debounce_ms`
//! - `PS_SWITCHING__ACTIVATE_ON_FOCUS=false` sets `switching.activate_on_focus`
//! - `PS_LOGGING__DEFAULT=debug` sets `logging.default`

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

const SETTINGS_DIR: &str = ".projswitch";

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct Settings {
    /// Version of the configuration schema
    #[serde(default = "default_version")]
    pub version: u32,

    /// File holding persisted selections (last environment per project,
    /// last active project)
    #[serde(default = "default_state_path")]
    pub state_path: PathBuf,

    /// Switching behavior
    #[serde(default)]
    pub switching: SwitchingConfig,

    /// Log levels
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct SwitchingConfig {
    /// Quiet period after a configuration change before the project is
    /// reloaded
    #[serde(default = "default_debounce_ms")]
    pub debounce_ms: u64,

    /// Switch to the project owning the focused editor
    #[serde(default = "default_true")]
    pub activate_on_focus: bool,

    /// Name of the build-tool configuration file inside each project
    #[serde(default = "default_config_file")]
    pub config_file: String,
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct LoggingConfig {
    /// Level applied to every target without an override
    #[serde(default = "default_log_level")]
    pub default: String,

    /// Per-target overrides, e.g. `switch = "debug"`
    #[serde(default)]
    pub modules: HashMap<String, String>,
}

fn default_version() -> u32 {
    1
}
fn default_state_path() -> PathBuf {
    PathBuf::from(SETTINGS_DIR).join("state.json")
}
fn default_debounce_ms() -> u64 {
    3000
}
fn default_true() -> bool {
    true
}
fn default_config_file() -> String {
    "platformio.ini".to_string()
}
fn default_log_level() -> String {
    "warn".to_string()
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            version: default_version(),
            state_path: default_state_path(),
            switching: SwitchingConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

impl Default for SwitchingConfig {
    fn default() -> Self {
        Self {
            debounce_ms: default_debounce_ms(),
            activate_on_focus: true,
            config_file: default_config_file(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            default: default_log_level(),
            modules: HashMap::new(),
        }
    }
}

impl SwitchingConfig {
    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }
}

impl Settings {
    /// Load configuration from all sources, looking for `.projswitch/settings.toml`
    /// in the current directory and its ancestors.
    pub fn load() -> Result<Self, Box<figment::Error>> {
        let config_path = Self::find_workspace_config()
            .unwrap_or_else(|| PathBuf::from(SETTINGS_DIR).join("settings.toml"));

        Self::load_from(config_path)
    }

    /// Load configuration from a specific file, then apply `PS_` overrides.
    pub fn load_from(path: impl AsRef<Path>) -> Result<Self, Box<figment::Error>> {
        Figment::new()
            .merge(Serialized::defaults(Settings::default()))
            .merge(Toml::file(path.as_ref()))
            .merge(Env::prefixed("PS_").map(|key| {
                key.as_str()
                    .to_lowercase()
                    .replace("__", ".")
                    .into()
            }))
            .extract()
            .map_err(Box::new)
    }

    /// Find `.projswitch/settings.toml` from the current directory upwards
    fn find_workspace_config() -> Option<PathBuf> {
        let current = std::env::current_dir().ok()?;

        current
            .ancestors()
            .map(|ancestor| ancestor.join(SETTINGS_DIR))
            .find(|dir| dir.is_dir())
            .map(|dir| dir.join("settings.toml"))
    }

    /// Save current configuration to file
    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), Box<dyn std::error::Error>> {
        let parent = path.as_ref().parent().ok_or("Invalid path")?;
        std::fs::create_dir_all(parent)?;

        let toml_string = toml::to_string_pretty(self)?;
        std::fs::write(path, toml_string)?;

        Ok(())
    }
}
