// File: ./src/config.rs
// Handles configuration loading, saving, and defaults.
use crate::context::AppContext;
use crate::model::{DEFAULT_MAX_RETRIES, FieldSchema};
use crate::storage::LocalStorage;
use anyhow::{Error, Result};
use log::LevelFilter;
use serde::{Deserialize, Serialize};
use std::fs;
use std::str::FromStr;

fn default_kind_field() -> String {
    "kind".to_string()
}
fn default_status_field() -> String {
    "status".to_string()
}
fn default_repeat_field() -> String {
    "repeat".to_string()
}
fn default_scheduled_field() -> String {
    "scheduled".to_string()
}

fn default_task_kind() -> String {
    "task".to_string()
}
fn default_done_status() -> String {
    "done".to_string()
}
fn default_pending_status() -> String {
    "todo".to_string()
}

fn default_max_retries() -> usize {
    DEFAULT_MAX_RETRIES
}

fn default_log_level() -> String {
    "warn".to_string()
}

#[derive(Deserialize, Serialize, Clone, Debug, PartialEq)]
pub struct Config {
    #[serde(default = "default_kind_field")]
    pub kind_field: String,
    #[serde(default = "default_status_field")]
    pub status_field: String,
    #[serde(default = "default_repeat_field")]
    pub repeat_field: String,
    #[serde(default = "default_scheduled_field")]
    pub scheduled_field: String,

    #[serde(default = "default_task_kind")]
    pub task_kind: String,
    #[serde(default = "default_done_status")]
    pub done_status: String,
    #[serde(default = "default_pending_status")]
    pub pending_status: String,

    /// How many too-soon candidates are skipped before giving up.
    #[serde(default = "default_max_retries")]
    pub max_initial_period_retries: usize,

    #[serde(default)]
    pub desktop_notifications: bool,

    #[serde(default = "default_log_level")]
    pub log_level: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            kind_field: default_kind_field(),
            status_field: default_status_field(),
            repeat_field: default_repeat_field(),
            scheduled_field: default_scheduled_field(),
            task_kind: default_task_kind(),
            done_status: default_done_status(),
            pending_status: default_pending_status(),
            max_initial_period_retries: DEFAULT_MAX_RETRIES,
            desktop_notifications: false,
            log_level: default_log_level(),
        }
    }
}

impl Config {
    /// Load the configuration from disk using an explicit context.
    /// Returns a contextualized error if reading or parsing fails.
    pub fn load(ctx: &dyn AppContext) -> Result<Self> {
        let path = ctx.get_config_file_path()?;

        // Explicitly detect missing file so callers can fall back to defaults.
        if !path.exists() {
            return Err(anyhow::anyhow!("Config file not found"));
        }

        let contents = fs::read_to_string(&path).map_err(|e| {
            anyhow::anyhow!("Failed to read config file '{}': {}", path.display(), e)
        })?;

        let config: Config = toml::from_str(&contents).map_err(|e| {
            anyhow::anyhow!("Failed to parse config file '{}': {}", path.display(), e)
        })?;

        Ok(config)
    }

    /// Like `load`, but a missing file yields the defaults.
    pub fn load_or_default(ctx: &dyn AppContext) -> Result<Self> {
        match Self::load(ctx) {
            Ok(config) => Ok(config),
            Err(e) if Self::is_missing_config_error(&e) => Ok(Self::default()),
            Err(e) => Err(e),
        }
    }

    /// Whether an error from `load` means the config file was missing,
    /// either by our explicit message or an underlying IO NotFound.
    pub fn is_missing_config_error(err: &Error) -> bool {
        if err.to_string().contains("Config file not found") {
            return true;
        }

        err.chain().any(|cause| {
            cause
                .downcast_ref::<std::io::Error>()
                .is_some_and(|io_err| io_err.kind() == std::io::ErrorKind::NotFound)
        })
    }

    /// Save configuration using an explicit context.
    pub fn save(&self, ctx: &dyn AppContext) -> Result<()> {
        let path = ctx.get_config_file_path()?;
        LocalStorage::with_lock(&path, || {
            let toml_str = toml::to_string_pretty(self)?;
            LocalStorage::atomic_write(&path, toml_str)?;
            Ok(())
        })?;
        Ok(())
    }

    pub fn schema(&self) -> FieldSchema {
        FieldSchema {
            kind_field: self.kind_field.clone(),
            status_field: self.status_field.clone(),
            repeat_field: self.repeat_field.clone(),
            scheduled_field: self.scheduled_field.clone(),
            task_kind: self.task_kind.clone(),
            done_status: self.done_status.clone(),
            pending_status: self.pending_status.clone(),
        }
    }

    /// The configured log level; unknown names fall back to `warn`.
    pub fn level_filter(&self) -> LevelFilter {
        LevelFilter::from_str(self.log_level.trim()).unwrap_or(LevelFilter::Warn)
    }
}
