//! Smart wallet wire shapes.
//!
//! Inbound: wallet updates published under `published.wallet.<address>` and
//! purse balances. Outbound: the `executeOffer` bridge action and the CapData
//! envelope it travels in.

use serde::{Deserialize, Serialize};

use crate::{OfferId, RoundId, PUSH_PRICE_MAKER};

/// Serialized marshal payload.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CapData {
    pub body: String,
    #[serde(default)]
    pub slots: Vec<String>,
}

/// One vstorage stream cell: every value published at `block_height`.
#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StreamCell {
    #[serde(with = "nat")]
    pub block_height: u64,
    pub values: Vec<String>,
}

/// An entry of the wallet's update stream.
#[derive(Clone, Debug, Deserialize)]
#[serde(tag = "updated", rename_all = "camelCase")]
pub enum WalletUpdate {
    OfferStatus { status: OfferStatus },
    #[serde(other)]
    Other,
}

/// Offer status as published by the wallet. Successive updates for the same
/// `id` supersede each other.
#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OfferStatus {
    #[serde(with = "nat")]
    pub id: OfferId,
    pub invitation_spec: InvitationSpec,
    #[serde(default)]
    pub error: Option<String>,
    #[serde(default)]
    pub num_wants_satisfied: Option<u64>,
    #[serde(default)]
    pub result: Option<serde_json::Value>,
}

#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InvitationSpec {
    pub source: String,
    #[serde(default, with = "nat::option")]
    pub previous_offer: Option<OfferId>,
    #[serde(default)]
    pub invitation_maker_name: Option<String>,
    #[serde(default)]
    pub invitation_args: Vec<serde_json::Value>,
}

/// Balance of one purse, with the brand's alleged interface name
/// (e.g. `Alleged: BLD brand`).
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PurseBalance {
    pub brand: String,
    #[serde(with = "nat")]
    pub value: u128,
}

impl PurseBalance {
    /// Short brand name: the second word of the interface name.
    pub fn brand_name(&self) -> Option<&str> {
        self.brand.split(' ').nth(1)
    }
}

/// Wallet bridge action.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct BridgeAction {
    pub method: &'static str,
    pub offer: Offer,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Offer {
    pub id: OfferId,
    pub invitation_spec: ContinuingInvitation,
    pub proposal: serde_json::Map<String, serde_json::Value>,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ContinuingInvitation {
    pub source: &'static str,
    pub previous_offer: OfferId,
    pub invitation_maker_name: &'static str,
    pub invitation_args: Vec<PushPriceArgs>,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PushPriceArgs {
    #[serde(serialize_with = "nat::serialize_bigint")]
    pub unit_price: u128,
    pub round_id: RoundId,
}

impl BridgeAction {
    /// `executeOffer` continuing `previous_offer` with a price push for `round_id`.
    pub fn push_price(
        offer_id: OfferId,
        previous_offer: OfferId,
        unit_price: u128,
        round_id: RoundId,
    ) -> Self {
        Self {
            method: "executeOffer",
            offer: Offer {
                id: offer_id,
                invitation_spec: ContinuingInvitation {
                    source: "continuing",
                    previous_offer,
                    invitation_maker_name: PUSH_PRICE_MAKER,
                    invitation_args: vec![PushPriceArgs {
                        unit_price,
                        round_id,
                    }],
                },
                proposal: serde_json::Map::new(),
            },
        }
    }
}

/// Natural numbers as they appear on the wire: JSON numbers, decimal strings
/// or legacy marshalled bigints `{"@qclass": "bigint", "digits": "..."}`.
pub mod nat {
    use serde::de::Error as _;
    use serde::{Deserialize, Deserializer, Serializer};
    use serde_json::Value;

    /// Decode a natural number from a JSON value.
    pub fn from_value<T: TryFrom<u128>>(value: &Value) -> Option<T> {
        let n: u128 = match value {
            Value::Number(n) => n.as_u64().map(u128::from)?,
            Value::String(s) => s.parse().ok()?,
            Value::Object(obj) => match (obj.get("@qclass"), obj.get("digits")) {
                (Some(Value::String(class)), Some(Value::String(digits))) if class == "bigint" => {
                    digits.parse().ok()?
                }
                _ => return None,
            },
            _ => return None,
        };
        T::try_from(n).ok()
    }

    pub fn deserialize<'de, D, T>(deserializer: D) -> Result<T, D::Error>
    where
        D: Deserializer<'de>,
        T: TryFrom<u128>,
    {
        let value = Value::deserialize(deserializer)?;
        from_value(&value).ok_or_else(|| D::Error::custom(format!("not a natural number: {value}")))
    }

    pub fn serialize<S: Serializer, T: Copy + Into<u128>>(
        value: &T,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&(*value).into().to_string())
    }

    /// Legacy marshal encoding of a bigint.
    pub fn serialize_bigint<S: Serializer>(value: &u128, serializer: S) -> Result<S::Ok, S::Error> {
        use serde::ser::SerializeMap;
        let mut map = serializer.serialize_map(Some(2))?;
        map.serialize_entry("@qclass", "bigint")?;
        map.serialize_entry("digits", &value.to_string())?;
        map.end()
    }

    pub mod option {
        use serde::{Deserialize, Deserializer};
        use serde_json::Value;

        pub fn deserialize<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
        where
            D: Deserializer<'de>,
            T: TryFrom<u128>,
        {
            let value = Option::<Value>::deserialize(deserializer)?;
            Ok(value.as_ref().and_then(super::from_value))
        }
    }
}
