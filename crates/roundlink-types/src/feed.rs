//! Feed addressing: invitation ids and monitored oracle profiles.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::{OfferId, PRICE_FEED_SUFFIX};

/// Feed name -> invitation id through which an oracle pushes prices for it.
///
/// Depends on live wallet state; rebuilt for every operation.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct FeedInvitationMap {
    invitations: BTreeMap<String, OfferId>,
}

impl FeedInvitationMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build the map from the wallet's used-invitation table.
    ///
    /// `used` yields `(offer_id, instance_board_id)` pairs; `board_names`
    /// resolves a board id to the instance name published under
    /// `agoricNames`, e.g. `ATOM-USD price feed`. Entries whose board id is
    /// unknown or that are not price feed instances are skipped.
    pub fn from_used_invitations<'a, I>(used: I, board_names: &BTreeMap<String, String>) -> Self
    where
        I: IntoIterator<Item = (OfferId, &'a str)>,
    {
        let mut map = Self::new();
        for (offer_id, board_id) in used {
            let Some(name) = board_names.get(board_id) else {
                continue;
            };
            if let Some(feed) = name.strip_suffix(PRICE_FEED_SUFFIX) {
                map.insert(feed, offer_id);
            }
        }
        map
    }

    pub fn insert(&mut self, feed: impl Into<String>, invitation: OfferId) {
        self.invitations.insert(feed.into(), invitation);
    }

    pub fn get(&self, feed: &str) -> Option<OfferId> {
        self.invitations.get(feed).copied()
    }

    pub fn len(&self) -> usize {
        self.invitations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.invitations.is_empty()
    }
}

impl<S: Into<String>> FromIterator<(S, OfferId)> for FeedInvitationMap {
    fn from_iter<T: IntoIterator<Item = (S, OfferId)>>(iter: T) -> Self {
        let mut map = Self::new();
        for (feed, invitation) in iter {
            map.insert(feed, invitation);
        }
        map
    }
}

/// A monitored oracle and the feeds it reports on.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OracleProfile {
    /// Wallet address.
    pub address: String,
    /// Human readable name used as a metrics label.
    pub name: String,
    /// Invitation id -> feed name.
    #[serde(default, with = "invitation_keys")]
    pub feeds: BTreeMap<OfferId, String>,
}

impl OracleProfile {
    pub fn feed_for(&self, invitation: OfferId) -> Option<&str> {
        self.feeds.get(&invitation).map(String::as_str)
    }
}

/// TOML only has string keys, so invitation ids are written as strings.
mod invitation_keys {
    use std::collections::BTreeMap;

    use serde::de::Error as _;
    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    use crate::OfferId;

    pub fn serialize<S: Serializer>(
        feeds: &BTreeMap<OfferId, String>,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        feeds
            .iter()
            .map(|(id, feed)| (id.to_string(), feed))
            .collect::<BTreeMap<_, _>>()
            .serialize(serializer)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<BTreeMap<OfferId, String>, D::Error> {
        let raw = BTreeMap::<String, String>::deserialize(deserializer)?;
        raw.into_iter()
            .map(|(id, feed)| {
                id.parse::<OfferId>()
                    .map(|id| (id, feed))
                    .map_err(|e| D::Error::custom(format!("invalid invitation id '{id}': {e}")))
            })
            .collect()
    }
}
