use anyhow::{Context, Result};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use std::{fs, path::PathBuf};
use tracing::debug;

pub const DEFAULT_BASE_URL: &str = "https://api.finanzguru.de";

/// Longest accepted poll interval: one day.
pub const MAX_UPDATE_INTERVAL_MINUTES: u64 = 24 * 60;
/// Longest accepted per-request timeout: ten minutes.
pub const MAX_REQUEST_TIMEOUT_SECS: u64 = 600;

fn default_base_url() -> String {
    DEFAULT_BASE_URL.to_string()
}

fn default_update_interval_minutes() -> u64 {
    30
}

fn default_request_timeout_secs() -> u64 {
    30
}

fn default_currency() -> String {
    "EUR".to_string()
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct AppConfig {
    pub email: String,
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default = "default_update_interval_minutes")]
    pub update_interval_minutes: u64,
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
    #[serde(default = "default_currency")]
    pub currency: String,
    pub data_path: Option<String>,
}

impl AppConfig {
    pub fn load() -> Result<Self> {
        debug!("Loading default config");
        let config_path = Self::default_config_path()?;
        Self::load_from_path(&config_path)
    }

    pub fn default_config_path() -> Result<PathBuf> {
        let proj_dirs = ProjectDirs::from("de", "finanzguru", "finanzguru")
            .context("Could not determine project directories")?;
        Ok(proj_dirs.config_dir().join("config.yaml"))
    }

    pub fn default_data_path(&self) -> Result<PathBuf> {
        if let Some(custom_path) = &self.data_path {
            return Ok(PathBuf::from(custom_path));
        }
        let proj_dirs = ProjectDirs::from("de", "finanzguru", "finanzguru")
            .context("Could not determine project directories")?;
        Ok(proj_dirs.data_dir().to_path_buf())
    }

    pub fn load_from_path<P: AsRef<std::path::Path>>(path: P) -> Result<Self> {
        let config_str = fs::read_to_string(path.as_ref())
            .with_context(|| format!("Failed to read config file: {}", path.as_ref().display()))?;

        let config: Self = serde_yaml::from_str(&config_str)
            .with_context(|| format!("Failed to parse config file: {}", path.as_ref().display()))?;
        config
            .validate()
            .with_context(|| format!("Invalid config file: {}", path.as_ref().display()))?;
        debug!("Successfully loaded config");
        Ok(config)
    }

    /// Rejects values the poller and HTTP client cannot work with.
    pub fn validate(&self) -> Result<()> {
        if self.email.trim().is_empty() {
            anyhow::bail!("email must not be empty");
        }
        if !(1..=MAX_UPDATE_INTERVAL_MINUTES).contains(&self.update_interval_minutes) {
            anyhow::bail!(
                "update_interval_minutes must be between 1 and {MAX_UPDATE_INTERVAL_MINUTES}, got {}",
                self.update_interval_minutes
            );
        }
        if !(1..=MAX_REQUEST_TIMEOUT_SECS).contains(&self.request_timeout_secs) {
            anyhow::bail!(
                "request_timeout_secs must be between 1 and {MAX_REQUEST_TIMEOUT_SECS}, got {}",
                self.request_timeout_secs
            );
        }
        Ok(())
    }

    /// Persistence key of the configured connection.
    pub fn connection_id(&self) -> String {
        self.email.trim().to_lowercase()
    }

    pub fn update_interval(&self) -> Duration {
        Duration::from_secs(self.update_interval_minutes.saturating_mul(60))
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}
