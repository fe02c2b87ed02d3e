//! Decoded submission history records.

use serde::{Deserialize, Serialize};

use crate::{OfferId, RoundId};

/// Terminal state of an offer as last published by the wallet.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Outcome {
    /// Accepted by the wallet, no result published yet.
    Pending,
    /// The offer completed.
    Success,
    /// The offer failed with the given message.
    Error(String),
}

impl Outcome {
    pub fn is_error(&self) -> bool {
        matches!(self, Outcome::Error(_))
    }
}

/// Arguments of a `PushPrice` continuing offer.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PushPrice {
    /// Invitation id of the feed this offer continues from.
    pub prior_submission_id: OfferId,
    /// Round the price is pushed for.
    pub target_round: RoundId,
    /// Raw unit price, scaled by the feed's `amountIn`.
    pub unit_price: u128,
}

/// What an offer in the history did.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum OfferAction {
    PushPrice(PushPrice),
    /// Any other offer (invitation acceptance, transfers, ...).
    Other { maker: Option<String> },
}

/// One entry of an oracle's offer history.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubmissionRecord {
    pub id: OfferId,
    pub action: OfferAction,
    pub outcome: Outcome,
}

impl SubmissionRecord {
    /// The price push carried by this record, if it is one.
    pub fn push_price(&self) -> Option<&PushPrice> {
        match &self.action {
            OfferAction::PushPrice(push) => Some(push),
            OfferAction::Other { .. } => None,
        }
    }

    pub fn is_error(&self) -> bool {
        self.outcome.is_error()
    }
}
