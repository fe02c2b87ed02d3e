//! Collaborator interfaces.
//!
//! The engine owns none of these resources. Ledger access, the feed
//! registry, the per-feed in-progress flag and job persistence live in other
//! processes or crates and are reached only through these traits.

use async_trait::async_trait;
use futures::stream::BoxStream;
use roundlink_types::wallet::{CapData, PurseBalance};
use roundlink_types::{FeedInvitationMap, OfferId, RoundId};

use crate::config::KeyringConfig;
use crate::Result;

/// Raw wallet updates of one oracle, newest first. Pulled lazily; the
/// underlying history may be arbitrarily deep.
pub type RawHistory = BoxStream<'static, Result<Vec<u8>>>;

/// Read side of the ledger.
#[async_trait]
pub trait LedgerReader: Send + Sync {
    /// Latest published round record of a feed (vstorage
    /// `published.priceFeed.<feed>_price_feed.latestRound`).
    async fn latest_round_record(&self, feed: &str) -> Result<Vec<u8>>;

    /// Latest published price record of a feed (vstorage
    /// `published.priceFeed.<feed>_price_feed`).
    async fn latest_price_record(&self, feed: &str) -> Result<Vec<u8>>;

    /// Wallet update stream of an oracle, newest first.
    fn submission_history(&self, oracle: &str) -> RawHistory;

    /// Current purse balances of an oracle.
    async fn balances(&self, oracle: &str) -> Result<Vec<PurseBalance>>;
}

/// Write side of the ledger. Delivery is observable only through
/// [`LedgerReader`].
#[async_trait]
pub trait LedgerWriter: Send + Sync {
    async fn submit_action(
        &self,
        payload: &CapData,
        from: &str,
        keyring: &KeyringConfig,
    ) -> Result<()>;
}

/// Resolves the invitations an oracle holds for each feed.
#[async_trait]
pub trait FeedRegistry: Send + Sync {
    async fn resolve_invitations(&self, oracle: &str) -> Result<FeedInvitationMap>;
}

/// Cross-process "submission in progress" flag, keyed by feed.
#[async_trait]
pub trait SubmissionFlag: Send + Sync {
    async fn is_in_progress(&self, feed: &str) -> Result<bool>;
}

/// Persistent job state.
#[async_trait]
pub trait JobStore: Send + Sync {
    /// Record the epoch-seconds time of a submission attempt for `feed`.
    async fn record_submission_attempt(&self, feed: &str, timestamp: u64) -> Result<()>;
}

/// Sink for monitoring observations.
pub trait MetricsSink: Send + Sync {
    /// `actual_price` is the feed's published price, `None` when it could
    /// not be read.
    #[allow(clippy::too_many_arguments)]
    fn record_observation(
        &self,
        oracle_name: &str,
        oracle: &str,
        feed: &str,
        price: f64,
        id: OfferId,
        actual_price: Option<f64>,
        round: RoundId,
    );

    fn record_balance(&self, oracle_name: &str, oracle: &str, brand: &str, value: f64);
}
