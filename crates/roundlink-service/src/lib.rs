//! # roundlink-service
//!
//! Wiring around the round-submission engine: configuration, tracing setup,
//! the Prometheus metrics sink, SQLite-backed job store and in-progress flag,
//! the submission entry point and the monitor poll loop.
//!
//! The concrete ledger client and the HTTP job API live outside this
//! workspace and plug in through [`roundlink_oracle::ports`].

pub mod config;
pub mod metrics;
pub mod monitor;
pub mod store;
pub mod submit;
pub mod telemetry;

pub use config::ServiceConfig;
pub use metrics::PrometheusMetrics;
pub use monitor::Monitor;
pub use store::SqliteStore;
pub use submit::SubmissionService;

/// Current Unix time in seconds.
pub(crate) fn unix_now() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}
