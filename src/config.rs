//! Runtime settings for pveforge
//!
//! Loaded from `--config`, else `~/.config/pveforge/config.toml` when it
//! exists, else built-in defaults. Relative paths resolve against the
//! working directory; `~` is expanded.

use anyhow::{Context, Result, bail};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Get the config directory path
pub fn config_dir() -> Result<PathBuf> {
    let home = dirs::home_dir().context("Could not determine home directory")?;
    Ok(home.join(".config").join("pveforge"))
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Settings {
    /// Bound on each external command, in seconds
    #[serde(default = "default_timeout_secs")]
    pub command_timeout_secs: u64,

    /// Where apply transcripts are written
    #[serde(default = "default_log_dir")]
    pub log_dir: String,

    /// Where rollback snapshots are written
    #[serde(default = "default_snapshot_dir")]
    pub snapshot_dir: String,

    /// Where support bundles are written
    #[serde(default = "default_bundle_dir")]
    pub bundle_dir: String,
}

fn default_timeout_secs() -> u64 {
    pvekit::DEFAULT_TIMEOUT.as_secs()
}

fn default_log_dir() -> String {
    "generated/logs".to_string()
}

fn default_snapshot_dir() -> String {
    "generated/snapshots".to_string()
}

fn default_bundle_dir() -> String {
    "generated".to_string()
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            command_timeout_secs: default_timeout_secs(),
            log_dir: default_log_dir(),
            snapshot_dir: default_snapshot_dir(),
            bundle_dir: default_bundle_dir(),
        }
    }
}

impl Settings {
    /// Load settings from an explicit path or the default location
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        if let Some(path) = explicit {
            return Self::from_file(path);
        }

        let default_path = config_dir()?.join("config.toml");
        if default_path.exists() {
            Self::from_file(&default_path)
        } else {
            log::debug!("No config at {}, using defaults", default_path.display());
            Ok(Self::default())
        }
    }

    /// Parse a config file
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Could not read {}", path.display()))?;
        let settings: Settings = toml::from_str(&content)
            .with_context(|| format!("Invalid config format: {}", path.display()))?;
        settings.validate()?;
        log::debug!("Loaded config from {}", path.display());
        Ok(settings)
    }

    fn validate(&self) -> Result<()> {
        if self.command_timeout_secs == 0 {
            bail!("command_timeout_secs must be greater than zero");
        }
        Ok(())
    }

    pub fn command_timeout(&self) -> Duration {
        Duration::from_secs(self.command_timeout_secs)
    }

    pub fn log_dir(&self) -> PathBuf {
        expand_path(&self.log_dir)
    }

    pub fn snapshot_dir(&self) -> PathBuf {
        expand_path(&self.snapshot_dir)
    }

    pub fn bundle_dir(&self) -> PathBuf {
        expand_path(&self.bundle_dir)
    }
}

/// Expand `~` and environment variables in a configured path
fn expand_path(raw: &str) -> PathBuf {
    let expanded = shellexpand::full(raw)
        .map(|s| s.into_owned())
        .unwrap_or_else(|_| shellexpand::tilde(raw).into_owned());
    PathBuf::from(expanded)
}
