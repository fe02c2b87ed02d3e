//! # roundlink-oracle
//!
//! Round-submission reconciliation engine for a price feed oracle.
//!
//! The aggregator contract advances through numbered rounds. This crate
//! decides whether a price may still be pushed for a round, drives the bounded
//! retry loop that pushes it, and incrementally folds the oracle's offer
//! history into per-feed observation state for monitoring.
//!
//! ## Modules
//!
//! - [`capdata`]: decoding of vstorage records and encoding of bridge actions
//! - [`history`]: lazy newest-first scan of an oracle's offer history
//! - [`resolver`]: current round of a feed and whether this oracle filled it
//! - [`eligibility`]: pure submission gate
//! - [`submission`]: retry-driven submission coordinator
//! - [`reconcile`]: incremental reconciliation cursor
//! - [`prices`]: latest aggregated price and `amountIn` of a feed
//! - [`ports`]: collaborator interfaces (ledger, registry, job store, metrics)
//! - [`config`]: submission tuning
//! - `testing`: in-memory collaborators (`test-support` feature)

pub mod capdata;
pub mod config;
pub mod eligibility;
pub mod history;
pub mod ports;
pub mod prices;
pub mod reconcile;
pub mod resolver;
pub mod submission;

#[cfg(any(test, feature = "test-support"))]
pub mod testing;

pub use config::{KeyringConfig, SubmissionConfig};
pub use eligibility::{evaluate, Eligibility};
pub use reconcile::Reconciler;
pub use resolver::RoundResolver;
pub use submission::{SubmissionCoordinator, SubmissionOutcome};

/// Error types for oracle operations.
#[derive(Debug, thiserror::Error)]
pub enum OracleError {
    /// A ledger record could not be decoded. Indicates a protocol mismatch;
    /// never retried.
    #[error("failed to parse {what}: {detail}")]
    Parse {
        /// Which record was being decoded.
        what: &'static str,
        /// Decoder message.
        detail: String,
    },

    /// The oracle holds no invitation for the feed.
    #[error("invitation for {0} not found in oracle invitations")]
    FeedNotRegistered(String),

    /// The ledger client failed to read or submit.
    #[error("ledger transport error: {0}")]
    Transport(String),

    /// The job store failed.
    #[error("job store error: {0}")]
    Store(String),

    /// Configuration rejected by validation.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}

impl OracleError {
    pub(crate) fn parse(what: &'static str, detail: impl ToString) -> Self {
        Self::Parse {
            what,
            detail: detail.to_string(),
        }
    }
}

/// Convenience result type for oracle operations.
pub type Result<T> = std::result::Result<T, OracleError>;
