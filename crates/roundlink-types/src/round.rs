//! Round state of a price feed.

use serde::{Deserialize, Serialize};

use crate::RoundId;

/// The latest round as published by a feed's aggregator.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoundRecord {
    pub round_id: RoundId,
    /// Epoch seconds at which the round started.
    pub started_at: u64,
    /// Address of the oracle that opened the round.
    pub started_by: String,
}

/// A round record resolved against one oracle's submission history.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoundInfo {
    pub round_id: RoundId,
    pub started_at: u64,
    pub started_by: String,
    /// Whether the querying oracle has a non-errored submission for `round_id`.
    pub submission_made: bool,
}

impl RoundInfo {
    pub fn from_record(record: RoundRecord, submission_made: bool) -> Self {
        Self {
            round_id: record.round_id,
            started_at: record.started_at,
            started_by: record.started_by,
            submission_made,
        }
    }
}
