//! Settings file management

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::errors::DeployError;
use crate::filesys::file::File;
use crate::logs::LogLevel;

/// Environment variable overriding the sync service URL
pub const SYNC_URL_ENV: &str = "LIFT_SYNC_URL";

/// Environment variable overriding the log level
pub const LOG_LEVEL_ENV: &str = "LIFT_LOG_LEVEL";

/// Client settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    /// Log level
    #[serde(default)]
    pub log_level: LogLevel,

    /// Sync service configuration
    #[serde(default)]
    pub sync: SyncServiceSettings,

    /// Maximum number of files pushed at the same time
    #[serde(default = "default_upload_concurrency")]
    pub upload_concurrency: usize,
}

fn default_upload_concurrency() -> usize {
    5
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            log_level: LogLevel::Info,
            sync: SyncServiceSettings::default(),
            upload_concurrency: default_upload_concurrency(),
        }
    }
}

impl Settings {
    /// Load settings from `file`, falling back to defaults when it is absent,
    /// then apply environment overrides.
    pub async fn load(file: &File) -> Result<Self, DeployError> {
        let mut settings = if file.exists().await {
            let contents = file.read_string().await.map_err(|e| {
                DeployError::Config(format!(
                    "Unable to read settings file {}: {}",
                    file.path().display(),
                    e
                ))
            })?;
            serde_json::from_str(&contents).map_err(|e| {
                DeployError::Config(format!(
                    "Invalid settings file {}: {}",
                    file.path().display(),
                    e
                ))
            })?
        } else {
            debug!("No settings file at {}, using defaults", file.path().display());
            Settings::default()
        };

        settings.apply_env(|key| std::env::var(key).ok())?;
        Ok(settings)
    }

    /// Apply overrides from an environment lookup
    pub fn apply_env<F>(&mut self, lookup: F) -> Result<(), DeployError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(url) = lookup(SYNC_URL_ENV).filter(|v| !v.is_empty()) {
            self.sync.base_url = url;
        }
        if let Some(level) = lookup(LOG_LEVEL_ENV).filter(|v| !v.is_empty()) {
            self.log_level = level.parse().map_err(DeployError::Config)?;
        }
        Ok(())
    }
}

/// Sync service settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncServiceSettings {
    /// Base URL for the sync service
    #[serde(default = "default_sync_url")]
    pub base_url: String,

    /// Timeout for establishing connections, in seconds
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_secs: u64,
}

fn default_sync_url() -> String {
    "https://sync.hooklift.io/v1".to_string()
}

fn default_connect_timeout() -> u64 {
    10
}

impl Default for SyncServiceSettings {
    fn default() -> Self {
        Self {
            base_url: default_sync_url(),
            connect_timeout_secs: default_connect_timeout(),
        }
    }
}
