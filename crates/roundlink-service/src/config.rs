//! Configuration file management.
//!
//! A TOML file provides every setting; each has a default so a missing file
//! or section is valid. A handful of environment variables override the file
//! for container deployments.

use std::path::PathBuf;

use anyhow::Context;
use roundlink_oracle::{OracleError, SubmissionConfig};
use roundlink_types::OracleProfile;
use serde::{Deserialize, Serialize};

/// Environment variable naming the config file.
pub const CONFIG_ENV: &str = "ROUNDLINK_CONFIG";

/// Config file used when [`CONFIG_ENV`] is unset.
pub const DEFAULT_CONFIG_PATH: &str = "config/roundlink.toml";

/// Complete service configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ServiceConfig {
    /// Retry loop tuning.
    #[serde(default)]
    pub submission: SubmissionConfig,
    /// Chain identity.
    #[serde(default)]
    pub chain: ChainConfig,
    /// Monitor settings.
    #[serde(default)]
    pub monitor: MonitorConfig,
    /// Storage settings.
    #[serde(default)]
    pub storage: StorageConfig,
    /// Logging settings.
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Chain configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ChainConfig {
    /// Address of the wallet submissions are sent from.
    #[serde(default)]
    pub from: String,
}

/// Monitor configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MonitorConfig {
    /// Seconds between reconciliation passes.
    #[serde(default = "default_poll_interval")]
    pub poll_interval_secs: u64,
    /// Oracles to reconcile, with their invitation-to-feed maps.
    #[serde(default)]
    pub oracles: Vec<OracleProfile>,
}

/// Storage configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// SQLite database file.
    #[serde(default = "default_db_path")]
    pub db_path: String,
}

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level: "trace" | "debug" | "info" | "warn" | "error".
    #[serde(default = "default_log_level")]
    pub level: String,
}

// Default value functions

fn default_poll_interval() -> u64 {
    60
}

fn default_db_path() -> String {
    "data/database.db".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            poll_interval_secs: default_poll_interval(),
            oracles: Vec::new(),
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            db_path: default_db_path(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

impl ServiceConfig {
    /// Load configuration from the config file, then apply environment
    /// overrides and validate.
    ///
    /// Falls back to defaults if the file does not exist.
    pub fn load() -> anyhow::Result<Self> {
        let config_path = Self::config_path();
        let mut config = if config_path.exists() {
            let content = std::fs::read_to_string(&config_path)
                .with_context(|| format!("reading {}", config_path.display()))?;
            Self::from_toml(&content)?
        } else {
            Self::default()
        };
        config.apply_overrides(|key| std::env::var(key).ok())?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_toml(content: &str) -> anyhow::Result<Self> {
        toml::from_str(content).context("parsing service config")
    }

    /// Apply `FROM`, `SUBMIT_RETRIES`, `SEND_CHECK_INTERVAL` and `DB_FILE`.
    pub fn apply_overrides<F>(&mut self, lookup: F) -> anyhow::Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(from) = lookup("FROM") {
            self.chain.from = from;
        }
        if let Some(retries) = lookup("SUBMIT_RETRIES") {
            self.submission.max_retries = retries
                .parse()
                .context("$SUBMIT_RETRIES should be a valid number")?;
        }
        if let Some(interval) = lookup("SEND_CHECK_INTERVAL") {
            self.submission.check_interval_secs = interval
                .parse()
                .context("$SEND_CHECK_INTERVAL should be a valid number")?;
        }
        if let Some(db_file) = lookup("DB_FILE") {
            self.storage.db_path = db_file;
        }
        Ok(())
    }

    /// Reject settings the engine cannot run with.
    pub fn validate(&self) -> Result<(), OracleError> {
        self.submission.validate()?;
        if self.monitor.poll_interval_secs == 0 {
            return Err(OracleError::InvalidConfig(
                "monitor.poll_interval_secs must be greater than zero".into(),
            ));
        }
        if let Some(oracle) = self.monitor.oracles.iter().find(|o| o.address.is_empty()) {
            return Err(OracleError::InvalidConfig(format!(
                "monitored oracle '{}' has no address",
                oracle.name
            )));
        }
        Ok(())
    }

    pub fn db_path(&self) -> PathBuf {
        PathBuf::from(&self.storage.db_path)
    }

    /// Get the config file path.
    fn config_path() -> PathBuf {
        std::env::var(CONFIG_ENV)
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from(DEFAULT_CONFIG_PATH))
    }
}
