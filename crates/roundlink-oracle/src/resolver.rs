//! Round state resolver.
//!
//! Combines a feed's latest round record with the querying oracle's offer
//! history to decide whether that oracle has already filled the round. Every
//! call reads fresh ledger state; nothing is cached between calls.

use std::sync::Arc;

use roundlink_types::{OfferId, RoundId, RoundInfo, RoundRecord};
use tracing::{debug, info};

use crate::ports::{FeedRegistry, LedgerReader};
use crate::{capdata, history, OracleError, Result};

/// Resolves round state for feeds through the ledger and feed registry.
#[derive(Clone)]
pub struct RoundResolver {
    reader: Arc<dyn LedgerReader>,
    registry: Arc<dyn FeedRegistry>,
    scan_limit: usize,
}

impl RoundResolver {
    pub fn new(
        reader: Arc<dyn LedgerReader>,
        registry: Arc<dyn FeedRegistry>,
        scan_limit: usize,
    ) -> Self {
        Self {
            reader,
            registry,
            scan_limit,
        }
    }

    /// Read and parse the feed's latest round record.
    pub async fn latest_round(&self, feed: &str) -> Result<RoundRecord> {
        let raw = self.reader.latest_round_record(feed).await?;
        capdata::decode_round(&raw)
    }

    /// Invitation id `oracle` pushes `feed` prices through.
    ///
    /// # Errors
    ///
    /// [`OracleError::FeedNotRegistered`] if the oracle holds no invitation
    /// for the feed.
    pub async fn invitation_for(&self, oracle: &str, feed: &str) -> Result<OfferId> {
        let invitations = self.registry.resolve_invitations(oracle).await?;
        invitations
            .get(feed)
            .ok_or_else(|| OracleError::FeedNotRegistered(feed.to_string()))
    }

    /// Whether `oracle` has a non-errored submission for `round` through
    /// `invitation`.
    ///
    /// Walks the scanned history newest first. The first matching push for
    /// the round decides `true`. A push for an older round means the oracle
    /// has not reached `round` yet, since submissions are ordered by round,
    /// and the walk stops with `false`.
    pub async fn submission_made(
        &self,
        oracle: &str,
        invitation: OfferId,
        round: RoundId,
    ) -> Result<bool> {
        let records = history::decode(self.reader.submission_history(oracle));
        let offers = history::scan(records, self.scan_limit).await?;

        for offer in &offers {
            let Some(push) = offer.push_price() else {
                continue;
            };
            if push.prior_submission_id != invitation || offer.is_error() {
                continue;
            }
            if push.target_round == round {
                return Ok(true);
            }
            if push.target_round < round {
                debug!(oracle, round, seen = push.target_round, "older round reached");
                return Ok(false);
            }
        }
        Ok(false)
    }

    /// Current round of `feed` as seen by `oracle`.
    ///
    /// # Errors
    ///
    /// - [`OracleError::Parse`] if the round record cannot be decoded
    /// - [`OracleError::FeedNotRegistered`] if the oracle has no invitation for the feed
    pub async fn resolve_round(&self, feed: &str, oracle: &str) -> Result<RoundInfo> {
        let record = self.latest_round(feed).await?;
        let invitation = self.invitation_for(oracle, feed).await?;
        let submission_made = self
            .submission_made(oracle, invitation, record.round_id)
            .await?;

        info!(feed, round = record.round_id, submission_made, "latest round");
        Ok(RoundInfo::from_record(record, submission_made))
    }

    /// Target round of the oracle's newest non-errored price push, if any is
    /// within the scan window.
    pub async fn latest_submitted_round(&self, oracle: &str) -> Result<Option<RoundId>> {
        let records = history::decode(self.reader.submission_history(oracle));
        let offers = history::scan(records, self.scan_limit).await?;
        Ok(offers
            .iter()
            .find_map(|offer| offer.push_price().map(|push| push.target_round)))
    }
}
