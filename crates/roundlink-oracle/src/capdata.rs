//! CapData decoding of vstorage records and wallet updates.
//!
//! A vstorage read yields `{"value": "<cell>"}` where `<cell>` is a JSON
//! stream cell `{"blockHeight": .., "values": [..]}`. Each value is a CapData
//! envelope `{"body": "<json>", "slots": [..]}`; the body uses the legacy
//! marshal encoding with bigints as `{"@qclass": "bigint", "digits": ".."}`.

use roundlink_types::wallet::{nat, BridgeAction, CapData, StreamCell, WalletUpdate};
use roundlink_types::{OfferAction, Outcome, PushPrice, RoundRecord, SubmissionRecord, PUSH_PRICE_MAKER};
use serde::Deserialize;
use serde_json::Value;

use crate::{OracleError, Result};

#[derive(Deserialize)]
struct VstorageEnvelope {
    value: String,
}

/// Decode the body of the most recent value in a vstorage read.
pub fn latest_body(raw: &[u8], what: &'static str) -> Result<Value> {
    let envelope: VstorageEnvelope =
        serde_json::from_slice(raw).map_err(|e| OracleError::parse(what, e))?;
    let cell: StreamCell =
        serde_json::from_str(&envelope.value).map_err(|e| OracleError::parse(what, e))?;
    let latest = cell
        .values
        .last()
        .ok_or_else(|| OracleError::parse(what, "stream cell has no values"))?;
    let capdata: CapData =
        serde_json::from_str(latest).map_err(|e| OracleError::parse(what, e))?;
    let body = capdata.body.replace('\\', "");
    serde_json::from_str(&body).map_err(|e| OracleError::parse(what, e))
}

/// Decode a feed's latest round record.
pub fn decode_round(raw: &[u8]) -> Result<RoundRecord> {
    const WHAT: &str = "round record";
    let body = latest_body(raw, WHAT)?;
    let round_id = nat_at(&body, "/roundId", WHAT)?;
    let started_at = nat_at(&body, "/startedAt", WHAT)?;
    let started_by = body
        .pointer("/startedBy")
        .and_then(Value::as_str)
        .ok_or_else(|| OracleError::parse(WHAT, "missing startedBy"))?
        .to_string();
    Ok(RoundRecord {
        round_id,
        started_at,
        started_by,
    })
}

/// `amountIn` and `amountOut` of a feed's latest price quote.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PriceQuote {
    pub amount_in: u128,
    pub amount_out: u128,
}

/// Decode a feed's latest price record.
pub fn decode_price(raw: &[u8]) -> Result<PriceQuote> {
    const WHAT: &str = "price record";
    let body = latest_body(raw, WHAT)?;
    Ok(PriceQuote {
        amount_in: nat_at(&body, "/amountIn/value", WHAT)?,
        amount_out: nat_at(&body, "/amountOut/value", WHAT)?,
    })
}

/// Decode one raw wallet update. Updates other than offer statuses yield
/// `None`.
pub fn decode_wallet_update(raw: &[u8]) -> Result<Option<SubmissionRecord>> {
    const WHAT: &str = "wallet update";
    let update: WalletUpdate =
        serde_json::from_slice(raw).map_err(|e| OracleError::parse(WHAT, e))?;
    let WalletUpdate::OfferStatus { status } = update else {
        return Ok(None);
    };

    let outcome = match (&status.error, status.num_wants_satisfied, &status.result) {
        (Some(message), _, _) => Outcome::Error(message.clone()),
        (None, Some(_), _) | (None, _, Some(_)) => Outcome::Success,
        (None, None, None) => Outcome::Pending,
    };

    let spec = status.invitation_spec;
    let action = match (spec.invitation_maker_name.as_deref(), spec.previous_offer) {
        (Some(PUSH_PRICE_MAKER), Some(prior_submission_id)) => {
            let args = spec
                .invitation_args
                .first()
                .ok_or_else(|| OracleError::parse(WHAT, "PushPrice offer without arguments"))?;
            OfferAction::PushPrice(PushPrice {
                prior_submission_id,
                target_round: nat_at(args, "/roundId", WHAT)?,
                unit_price: nat_at(args, "/unitPrice", WHAT)?,
            })
        }
        (maker, _) => OfferAction::Other {
            maker: maker.map(str::to_string),
        },
    };

    Ok(Some(SubmissionRecord {
        id: status.id,
        action,
        outcome,
    }))
}

/// Serialize a bridge action for the wallet.
pub fn encode_action(action: &BridgeAction) -> Result<CapData> {
    let body = serde_json::to_string(action).map_err(|e| OracleError::parse("bridge action", e))?;
    Ok(CapData {
        body,
        slots: Vec::new(),
    })
}

/// A natural number at `pointer`, either a bigint or `{"digits": ..}` record.
fn nat_at<T: TryFrom<u128>>(value: &Value, pointer: &str, what: &'static str) -> Result<T> {
    let field = value
        .pointer(pointer)
        .ok_or_else(|| OracleError::parse(what, format!("missing {pointer}")))?;
    nat::from_value(field)
        .or_else(|| field.get("digits").and_then(nat::from_value))
        .ok_or_else(|| OracleError::parse(what, format!("{pointer} is not a natural number")))
}
