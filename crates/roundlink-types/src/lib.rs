//! # roundlink-types
//!
//! Shared domain types used across the roundlink workspace: the decoded
//! submission history, resolved round state, per-oracle observation state and
//! the wire shapes exchanged with the smart wallet.

pub mod feed;
pub mod observation;
pub mod round;
pub mod submission;
pub mod wallet;

pub use feed::{FeedInvitationMap, OracleProfile};
pub use observation::{FeedObservation, OracleObservationState};
pub use round::{RoundInfo, RoundRecord};
pub use submission::{OfferAction, Outcome, PushPrice, SubmissionRecord};

/// Offer identifier. The wallet uses the client-side millisecond timestamp.
pub type OfferId = u64;

/// Round ordinal of a price feed aggregator.
pub type RoundId = u64;

/// Invitation maker name of a price push offer.
pub const PUSH_PRICE_MAKER: &str = "PushPrice";

/// Suffix the board name of a price feed instance carries (e.g. `ATOM-USD price feed`).
pub const PRICE_FEED_SUFFIX: &str = " price feed";

/// Brands whose purse balances are tracked by the monitor.
pub const MONITORED_BRANDS: [&str; 2] = ["BLD", "IST"];
