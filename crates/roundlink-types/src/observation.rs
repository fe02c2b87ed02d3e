//! Per-oracle observation state kept by the monitor between polls.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::{OfferId, RoundId};

/// Latest accepted observation of one feed.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct FeedObservation {
    /// Unit price divided by the feed's `amountIn`.
    pub price: f64,
    /// Offer id of the submission the price came from.
    pub id: OfferId,
    pub round: RoundId,
}

/// Reconciliation cursor and derived per-feed values for one oracle.
///
/// `last_submission_id` never decreases and neither does any
/// `values[feed].round`.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct OracleObservationState {
    /// High-water mark of processed offer ids.
    #[serde(default, alias = "last_offer_id")]
    pub last_submission_id: OfferId,
    #[serde(default)]
    pub values: BTreeMap<String, FeedObservation>,
}

impl OracleObservationState {
    /// Last recorded round for `feed`, zero if the feed was never observed.
    pub fn last_round(&self, feed: &str) -> RoundId {
        self.values.get(feed).map_or(0, |obs| obs.round)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_last_round_defaults_to_zero() {
        let state = OracleObservationState::default();
        assert_eq!(state.last_round("ATOM-USD"), 0);
    }

    #[test]
    fn test_legacy_field_name_accepted() {
        let json = r#"{"last_offer_id": 42, "values": {"ATOM-USD": {"price": 9.5, "id": 42, "round": 3}}}"#;
        let state: OracleObservationState = serde_json::from_str(json).expect("parse");
        assert_eq!(state.last_submission_id, 42);
        assert_eq!(state.last_round("ATOM-USD"), 3);
    }
}
