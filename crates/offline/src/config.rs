//! Offline-mode configuration.

use std::path::PathBuf;
use std::time::Duration;

pub const ENV_OFFLINE_ENABLED: &str = "SALESDESK_OFFLINE_ENABLED";
pub const ENV_SYNC_INTERVAL_MS: &str = "SALESDESK_SYNC_INTERVAL_MS";
pub const ENV_MAX_RETRY_ATTEMPTS: &str = "SALESDESK_MAX_RETRY_ATTEMPTS";
pub const ENV_DB_NAME: &str = "SALESDESK_DB_NAME";
pub const ENV_DB_VERSION: &str = "SALESDESK_DB_VERSION";
pub const ENV_DB_DIR: &str = "SALESDESK_DB_DIR";
pub const ENV_REFRESH_PAGE_SIZE: &str = "SALESDESK_REFRESH_PAGE_SIZE";
pub const ENV_PROBE_INTERVAL_MS: &str = "SALESDESK_PROBE_INTERVAL_MS";

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    #[error("invalid value '{value}' for {key}")]
    Invalid { key: &'static str, value: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OfflineConfig {
    /// When false, offline creation is refused and the worker never syncs.
    pub enabled: bool,
    /// Period of the background sync timer.
    pub sync_interval: Duration,
    /// Delivery attempts before a queue item is parked as failed.
    pub max_retry_attempts: u32,
    pub db_name: String,
    pub db_version: u32,
    /// Directory of the database file; `None` uses the OS data directory.
    pub db_dir: Option<PathBuf>,
    /// Records pulled per collection during refresh.
    pub refresh_page_size: u32,
    /// How often the connectivity probe is polled.
    pub probe_interval: Duration,
}

impl Default for OfflineConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            sync_interval: Duration::from_millis(300_000),
            max_retry_attempts: 3,
            db_name: "salesdesk-offline".to_string(),
            db_version: 1,
            db_dir: None,
            refresh_page_size: 100,
            probe_interval: Duration::from_millis(30_000),
        }
    }
}

impl OfflineConfig {
    /// Read the configuration from process environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build the configuration from an arbitrary key lookup; unset keys keep
    /// their defaults.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(value) = lookup(ENV_OFFLINE_ENABLED) {
            config.enabled = parse_bool(ENV_OFFLINE_ENABLED, &value)?;
        }
        if let Some(value) = lookup(ENV_SYNC_INTERVAL_MS) {
            config.sync_interval = Duration::from_millis(parse_positive(ENV_SYNC_INTERVAL_MS, &value)?);
        }
        if let Some(value) = lookup(ENV_MAX_RETRY_ATTEMPTS) {
            config.max_retry_attempts = parse_positive(ENV_MAX_RETRY_ATTEMPTS, &value)?;
        }
        if let Some(value) = lookup(ENV_DB_NAME) {
            let name = value.trim();
            if name.is_empty() {
                return Err(invalid(ENV_DB_NAME, &value));
            }
            config.db_name = name.to_string();
        }
        if let Some(value) = lookup(ENV_DB_VERSION) {
            config.db_version = parse_positive(ENV_DB_VERSION, &value)?;
        }
        if let Some(value) = lookup(ENV_DB_DIR) {
            if !value.trim().is_empty() {
                config.db_dir = Some(PathBuf::from(value.trim()));
            }
        }
        if let Some(value) = lookup(ENV_REFRESH_PAGE_SIZE) {
            config.refresh_page_size = parse_positive(ENV_REFRESH_PAGE_SIZE, &value)?;
        }
        if let Some(value) = lookup(ENV_PROBE_INTERVAL_MS) {
            config.probe_interval = Duration::from_millis(parse_positive(ENV_PROBE_INTERVAL_MS, &value)?);
        }

        Ok(config)
    }

    pub fn with_enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    pub fn with_sync_interval(mut self, interval: Duration) -> Self {
        self.sync_interval = interval;
        self
    }

    pub fn with_max_retry_attempts(mut self, attempts: u32) -> Self {
        self.max_retry_attempts = attempts;
        self
    }

    pub fn with_database(mut self, name: impl Into<String>, version: u32) -> Self {
        self.db_name = name.into();
        self.db_version = version;
        self
    }

    pub fn with_db_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.db_dir = Some(dir.into());
        self
    }

    pub fn with_refresh_page_size(mut self, size: u32) -> Self {
        self.refresh_page_size = size;
        self
    }

    pub fn with_probe_interval(mut self, interval: Duration) -> Self {
        self.probe_interval = interval;
        self
    }
}

fn invalid(key: &'static str, value: &str) -> ConfigError {
    ConfigError::Invalid {
        key,
        value: value.to_string(),
    }
}

fn parse_bool(key: &'static str, value: &str) -> Result<bool, ConfigError> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(invalid(key, value)),
    }
}

fn parse_positive<T>(key: &'static str, value: &str) -> Result<T, ConfigError>
where
    T: core::str::FromStr + PartialEq + Default,
{
    match value.trim().parse::<T>() {
        Ok(parsed) if parsed != T::default() => Ok(parsed),
        _ => Err(invalid(key, value)),
    }
}
