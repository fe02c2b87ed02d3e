//! History scanner.
//!
//! An oracle's offer history is an append-only stream of wallet updates read
//! newest first. Several updates may be published for the same offer id; the
//! newest one is authoritative. The scanner walks the stream lazily and keeps
//! the newest non-errored record of each distinct id, stopping as soon as
//! `limit` ids have been accepted, so its cost is bounded by `limit` and not
//! by the depth of the history.

use std::collections::HashSet;

use futures::{future, Stream, TryStreamExt};
use roundlink_types::SubmissionRecord;
use tracing::trace;

use crate::capdata;
use crate::ports::RawHistory;
use crate::Result;

/// Decode a raw wallet update stream into offer records, dropping updates
/// that are not offer statuses.
pub fn decode(raw: RawHistory) -> impl Stream<Item = Result<SubmissionRecord>> + Send + Unpin {
    raw.try_filter_map(|bytes| future::ready(capdata::decode_wallet_update(&bytes)))
}

/// Collect at most `limit` records, newest first, one per distinct id.
///
/// A record whose outcome is an error is skipped and its id is marked as
/// seen, so an older state of the same offer is never returned either.
pub async fn scan<S>(records: S, limit: usize) -> Result<Vec<SubmissionRecord>>
where
    S: Stream<Item = Result<SubmissionRecord>> + Unpin,
{
    let mut records = records;
    let mut accepted = Vec::new();
    let mut seen = HashSet::new();

    while accepted.len() < limit {
        let Some(record) = records.try_next().await? else {
            break;
        };
        if !seen.insert(record.id) {
            continue;
        }
        if record.is_error() {
            trace!(id = record.id, "skipping errored offer");
            continue;
        }
        accepted.push(record);
    }

    Ok(accepted)
}
