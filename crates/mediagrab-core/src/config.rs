//! Application configuration management.
//!
//! Handles loading and saving pipeline-wide settings: the temp directory
//! for intermediate downloads, the external combiner binary, the default
//! size budget and the retry knobs.

use std::fs;
use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::{Error, Result};
use crate::media::DEFAULT_BUDGET_MIB;
use crate::retry::{DEFAULT_MAX_ATTEMPTS, RetryPolicy};

/// Retry configuration for metadata fetches.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct RetryConfig {
    /// Maximum number of attempts, including the first.
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    /// Fixed delay between attempts in milliseconds.
    #[serde(default = "default_delay_ms")]
    pub delay_ms: u64,
}

const fn default_max_attempts() -> u32 {
    DEFAULT_MAX_ATTEMPTS
}

const fn default_delay_ms() -> u64 {
    1000
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            delay_ms: 1000,
        }
    }
}

impl RetryConfig {
    /// Build the runtime policy for this configuration.
    #[must_use]
    pub const fn policy(&self) -> RetryPolicy {
        RetryPolicy::new(self.max_attempts, Duration::from_millis(self.delay_ms))
    }
}

/// Application configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AppConfig {
    /// Directory where temp download artifacts are written.
    #[serde(default = "default_temp_dir")]
    pub temp_dir: PathBuf,
    /// External audio/video combiner binary.
    #[serde(default = "default_ffmpeg")]
    pub ffmpeg_path: PathBuf,
    /// Default size budget in MiB when a request does not specify one.
    #[serde(default = "default_budget_mib")]
    pub default_budget_mib: u64,
    /// Retry behavior for metadata fetches.
    #[serde(default)]
    pub retry: RetryConfig,
}

fn default_temp_dir() -> PathBuf {
    std::env::temp_dir()
}

fn default_ffmpeg() -> PathBuf {
    PathBuf::from("ffmpeg")
}

const fn default_budget_mib() -> u64 {
    DEFAULT_BUDGET_MIB
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            temp_dir: default_temp_dir(),
            ffmpeg_path: default_ffmpeg(),
            default_budget_mib: DEFAULT_BUDGET_MIB,
            retry: RetryConfig::default(),
        }
    }
}

impl AppConfig {
    /// Load configuration from disk, or fall back to defaults if no config
    /// file exists yet.
    ///
    /// # Errors
    ///
    /// Returns an error if the config file exists but cannot be read or
    /// parsed.
    pub fn load() -> Result<Self> {
        let Some(config_path) = config_file_path() else {
            warn!("no config directory available, using defaults");
            return Ok(Self::default());
        };

        if !config_path.exists() {
            debug!("config file not found, using defaults");
            return Ok(Self::default());
        }

        let content = fs::read_to_string(&config_path)?;
        let config: Self = serde_json::from_str(&content)
            .map_err(|e| Error::Configuration(format!("invalid config file: {e}")))?;

        debug!(path = %config_path.display(), "configuration loaded");
        Ok(config)
    }

    /// Save configuration to disk.
    ///
    /// # Errors
    ///
    /// Returns an error if no config directory is available or the file
    /// cannot be written.
    pub fn save(&self) -> Result<()> {
        let config_path = config_file_path()
            .ok_or_else(|| Error::Configuration("no config directory available".to_string()))?;

        if let Some(parent) = config_path.parent() {
            fs::create_dir_all(parent)?;
        }

        let content = serde_json::to_string_pretty(self)
            .map_err(|e| Error::Configuration(format!("failed to serialize config: {e}")))?;
        fs::write(&config_path, content)?;

        debug!(path = %config_path.display(), "configuration saved");
        Ok(())
    }
}

fn config_file_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("mediagrab").join("config.json"))
}
