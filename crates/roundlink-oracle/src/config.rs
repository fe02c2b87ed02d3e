//! Submission tuning consumed by the resolver and the coordinator.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::{OracleError, Result};

/// Default number of submission attempts per job.
pub const DEFAULT_MAX_RETRIES: u32 = 3;

/// Default pause between a submission and its confirmation check.
pub const DEFAULT_CHECK_INTERVAL_SECS: u64 = 45;

/// Default number of distinct offers inspected per history scan.
pub const DEFAULT_HISTORY_SCAN_LIMIT: usize = 5;

/// Largest accepted `max_retries`.
pub const MAX_RETRIES: u32 = 100;

/// Largest accepted pause between a submission and its check: one day.
pub const MAX_CHECK_INTERVAL_SECS: u64 = 86_400;

/// Largest accepted history scan.
pub const MAX_HISTORY_SCAN_LIMIT: usize = 1_000;

/// Bounds and pacing of the retry loop.
///
/// Total wall-clock time of one submission is at most
/// `max_retries * check_interval`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubmissionConfig {
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_check_interval")]
    pub check_interval_secs: u64,
    #[serde(default = "default_scan_limit")]
    pub history_scan_limit: usize,
    #[serde(default)]
    pub keyring: KeyringConfig,
}

/// Keyring the ledger writer signs with.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyringConfig {
    /// Keyring home directory. Empty = client default.
    #[serde(default)]
    pub home: String,
    #[serde(default = "default_keyring_backend")]
    pub backend: String,
}

fn default_max_retries() -> u32 {
    DEFAULT_MAX_RETRIES
}

fn default_check_interval() -> u64 {
    DEFAULT_CHECK_INTERVAL_SECS
}

fn default_scan_limit() -> usize {
    DEFAULT_HISTORY_SCAN_LIMIT
}

fn default_keyring_backend() -> String {
    "test".to_string()
}

impl Default for SubmissionConfig {
    fn default() -> Self {
        Self {
            max_retries: DEFAULT_MAX_RETRIES,
            check_interval_secs: DEFAULT_CHECK_INTERVAL_SECS,
            history_scan_limit: DEFAULT_HISTORY_SCAN_LIMIT,
            keyring: KeyringConfig::default(),
        }
    }
}

impl Default for KeyringConfig {
    fn default() -> Self {
        Self {
            home: String::new(),
            backend: default_keyring_backend(),
        }
    }
}

impl SubmissionConfig {
    pub fn check_interval(&self) -> Duration {
        Duration::from_secs(self.check_interval_secs)
    }

    /// Upper bound on the duration of one submission job.
    pub fn max_duration(&self) -> Duration {
        self.check_interval().saturating_mul(self.max_retries)
    }

    /// Reject settings that would make the retry loop unpaced or unbounded,
    /// or the history scan useless.
    pub fn validate(&self) -> Result<()> {
        if self.check_interval_secs == 0 || self.check_interval_secs > MAX_CHECK_INTERVAL_SECS {
            return Err(OracleError::InvalidConfig(format!(
                "check_interval_secs must be between 1 and {MAX_CHECK_INTERVAL_SECS}"
            )));
        }
        if self.max_retries > MAX_RETRIES {
            return Err(OracleError::InvalidConfig(format!(
                "max_retries must be at most {MAX_RETRIES}"
            )));
        }
        if self.history_scan_limit == 0 || self.history_scan_limit > MAX_HISTORY_SCAN_LIMIT {
            return Err(OracleError::InvalidConfig(format!(
                "history_scan_limit must be between 1 and {MAX_HISTORY_SCAN_LIMIT}"
            )));
        }
        Ok(())
    }
}
