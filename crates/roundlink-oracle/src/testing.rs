//! In-memory collaborators for tests.
//!
//! Available to this crate's unit tests and, through the `test-support`
//! feature, to other workspace crates.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use futures::stream::{self, StreamExt};
use roundlink_types::wallet::{CapData, PurseBalance};
use roundlink_types::{FeedInvitationMap, OfferId, Outcome, RoundId};
use serde_json::{json, Value};

use crate::config::{KeyringConfig, SubmissionConfig};
use crate::ports::{
    FeedRegistry, JobStore, LedgerReader, LedgerWriter, MetricsSink, RawHistory, SubmissionFlag,
};
use crate::{OracleError, Reconciler, Result, RoundResolver, SubmissionCoordinator};

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

fn bigint(n: u128) -> Value {
    json!({"@qclass": "bigint", "digits": n.to_string()})
}

/// A vstorage read whose single value has the given CapData body.
pub fn vstorage_record(body: Value) -> Vec<u8> {
    let capdata = json!({"body": body.to_string(), "slots": []}).to_string();
    let cell = json!({"blockHeight": "1200", "values": [capdata]}).to_string();
    json!({ "value": cell }).to_string().into_bytes()
}

/// Raw latest-round record.
pub fn round_record(round: RoundId, started_at: u64, started_by: &str) -> Vec<u8> {
    vstorage_record(json!({
        "roundId": bigint(round.into()),
        "startedAt": bigint(started_at.into()),
        "startedBy": started_by,
    }))
}

/// Raw latest-price record.
pub fn price_record(amount_in: u128, amount_out: u128) -> Vec<u8> {
    vstorage_record(json!({
        "amountIn": {"brand": {"@qclass": "slot", "index": 0}, "value": bigint(amount_in)},
        "amountOut": {"brand": {"@qclass": "slot", "index": 1}, "value": bigint(amount_out)},
    }))
}

/// Raw `PushPrice` offer status.
pub fn push(
    id: OfferId,
    invitation: OfferId,
    round: RoundId,
    unit_price: u128,
    outcome: Outcome,
) -> Vec<u8> {
    let mut status = json!({
        "id": id,
        "invitationSpec": {
            "source": "continuing",
            "previousOffer": invitation,
            "invitationMakerName": "PushPrice",
            "invitationArgs": [{"roundId": round, "unitPrice": bigint(unit_price)}],
        },
    });
    match outcome {
        Outcome::Pending => {}
        Outcome::Success => status["numWantsSatisfied"] = json!(1),
        Outcome::Error(message) => status["error"] = json!(message),
    }
    json!({"updated": "offerStatus", "status": status})
        .to_string()
        .into_bytes()
}

/// Raw offer status of a non-price offer.
pub fn other_offer(id: OfferId, maker: &str) -> Vec<u8> {
    json!({
        "updated": "offerStatus",
        "status": {
            "id": id,
            "invitationSpec": {"source": "purse", "invitationMakerName": maker},
            "numWantsSatisfied": 1,
        },
    })
    .to_string()
    .into_bytes()
}

#[derive(Default)]
struct LedgerState {
    rounds: HashMap<String, RoundId>,
    raw_rounds: HashMap<String, Vec<u8>>,
    prices: HashMap<String, Vec<u8>>,
    history: HashMap<String, Vec<Vec<u8>>>,
    /// `(oracle, reads left hidden, entry)`, published once no reads are left.
    delayed: Vec<(String, usize, Vec<u8>)>,
    balances: HashMap<String, Vec<PurseBalance>>,
}

/// Ledger whose state tests mutate directly.
#[derive(Default)]
pub struct FakeLedger {
    state: Mutex<LedgerState>,
    history_pulls: Arc<AtomicUsize>,
}

impl FakeLedger {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn set_round(&self, feed: &str, round: RoundId) {
        let mut state = lock(&self.state);
        state.rounds.insert(feed.to_string(), round);
        state.raw_rounds.remove(feed);
    }

    /// Serve `raw` as the feed's round record, bypassing encoding.
    pub fn set_raw_round(&self, feed: &str, raw: Vec<u8>) {
        lock(&self.state).raw_rounds.insert(feed.to_string(), raw);
    }

    pub fn round(&self, feed: &str) -> Option<RoundId> {
        lock(&self.state).rounds.get(feed).copied()
    }

    pub fn set_price(&self, feed: &str, amount_in: u128, amount_out: u128) {
        lock(&self.state)
            .prices
            .insert(feed.to_string(), price_record(amount_in, amount_out));
    }

    /// Publish a new wallet update; it becomes the newest history entry.
    pub fn push_history(&self, oracle: &str, raw: Vec<u8>) {
        lock(&self.state)
            .history
            .entry(oracle.to_string())
            .or_default()
            .insert(0, raw);
    }

    /// Publish `raw` after `hidden_reads` more reads of the oracle's history
    /// have missed it.
    pub fn push_history_after(&self, oracle: &str, raw: Vec<u8>, hidden_reads: usize) {
        lock(&self.state)
            .delayed
            .push((oracle.to_string(), hidden_reads, raw));
    }

    pub fn set_balances(&self, oracle: &str, balances: Vec<PurseBalance>) {
        lock(&self.state)
            .balances
            .insert(oracle.to_string(), balances);
    }

    /// Total history entries pulled by readers so far.
    pub fn history_pulls(&self) -> usize {
        self.history_pulls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl LedgerReader for FakeLedger {
    async fn latest_round_record(&self, feed: &str) -> Result<Vec<u8>> {
        let state = lock(&self.state);
        if let Some(raw) = state.raw_rounds.get(feed) {
            return Ok(raw.clone());
        }
        state
            .rounds
            .get(feed)
            .map(|round| round_record(*round, 1_700_000_000 + round * 60, "agoric1starter"))
            .ok_or_else(|| OracleError::Transport(format!("no round published for {feed}")))
    }

    async fn latest_price_record(&self, feed: &str) -> Result<Vec<u8>> {
        lock(&self.state)
            .prices
            .get(feed)
            .cloned()
            .ok_or_else(|| OracleError::Transport(format!("no price published for {feed}")))
    }

    fn submission_history(&self, oracle: &str) -> RawHistory {
        let mut state = lock(&self.state);
        let mut published = Vec::new();
        state.delayed.retain_mut(|(target, hidden, raw)| {
            if target.as_str() != oracle {
                return true;
            }
            if *hidden > 0 {
                *hidden -= 1;
                return true;
            }
            published.push(std::mem::take(raw));
            false
        });
        for raw in published {
            state.history.entry(oracle.to_string()).or_default().insert(0, raw);
        }
        let entries = state
            .history
            .get(oracle)
            .cloned()
            .unwrap_or_default();
        let pulls = self.history_pulls.clone();
        stream::iter(entries)
            .inspect(move |_| {
                pulls.fetch_add(1, Ordering::SeqCst);
            })
            .map(Ok)
            .boxed()
    }

    async fn balances(&self, oracle: &str) -> Result<Vec<PurseBalance>> {
        Ok(lock(&self.state)
            .balances
            .get(oracle)
            .cloned()
            .unwrap_or_default())
    }
}

enum SendEffect {
    /// The submission shows up as a successful offer in the oracle's history.
    Land { ledger: Arc<FakeLedger>, oracle: String },
    /// Like `Land`, but missed by the next `hidden_reads` history reads.
    LandLate {
        ledger: Arc<FakeLedger>,
        oracle: String,
        hidden_reads: usize,
    },
    /// The feed opens the next round.
    AdvanceRound { ledger: Arc<FakeLedger>, feed: String },
}

/// Successful offer status for a submitted `PushPrice` action body.
fn landed(body: &Value) -> Vec<u8> {
    let offer = &body["offer"];
    let spec = &offer["invitationSpec"];
    let args = &spec["invitationArgs"][0];
    let unit_price = args["unitPrice"]["digits"]
        .as_str()
        .and_then(|digits| digits.parse().ok())
        .unwrap_or_default();
    push(
        offer["id"].as_u64().unwrap_or_default(),
        spec["previousOffer"].as_u64().unwrap_or_default(),
        args["roundId"].as_u64().unwrap_or_default(),
        unit_price,
        Outcome::Success,
    )
}

/// Writer that records every payload and optionally mutates a ledger.
#[derive(Default)]
pub struct FakeWriter {
    sent: Mutex<Vec<(Value, String)>>,
    effects: Mutex<Vec<SendEffect>>,
}

impl FakeWriter {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Decoded bodies and sender of every submitted action.
    pub fn sent(&self) -> Vec<(Value, String)> {
        lock(&self.sent).clone()
    }

    pub fn land_in(&self, ledger: Arc<FakeLedger>, oracle: &str) {
        lock(&self.effects).push(SendEffect::Land {
            ledger,
            oracle: oracle.to_string(),
        });
    }

    pub fn land_late_in(&self, ledger: Arc<FakeLedger>, oracle: &str, hidden_reads: usize) {
        lock(&self.effects).push(SendEffect::LandLate {
            ledger,
            oracle: oracle.to_string(),
            hidden_reads,
        });
    }

    pub fn advance_round_after_send(&self, ledger: Arc<FakeLedger>, feed: &str) {
        lock(&self.effects).push(SendEffect::AdvanceRound {
            ledger,
            feed: feed.to_string(),
        });
    }
}

#[async_trait]
impl LedgerWriter for FakeWriter {
    async fn submit_action(
        &self,
        payload: &CapData,
        from: &str,
        _keyring: &KeyringConfig,
    ) -> Result<()> {
        let body: Value = serde_json::from_str(&payload.body)
            .map_err(|e| OracleError::Transport(format!("bad payload: {e}")))?;

        for effect in lock(&self.effects).iter() {
            match effect {
                SendEffect::Land { ledger, oracle } => {
                    ledger.push_history(oracle, landed(&body));
                }
                SendEffect::LandLate {
                    ledger,
                    oracle,
                    hidden_reads,
                } => {
                    ledger.push_history_after(oracle, landed(&body), *hidden_reads);
                }
                SendEffect::AdvanceRound { ledger, feed } => {
                    let next = ledger.round(feed).unwrap_or_default() + 1;
                    ledger.set_round(feed, next);
                }
            }
        }

        lock(&self.sent).push((body, from.to_string()));
        Ok(())
    }
}

/// Registry backed by a fixed table.
#[derive(Default)]
pub struct FakeRegistry {
    invitations: Mutex<HashMap<String, FeedInvitationMap>>,
}

impl FakeRegistry {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn register(&self, oracle: &str, feed: &str, invitation: OfferId) {
        lock(&self.invitations)
            .entry(oracle.to_string())
            .or_default()
            .insert(feed, invitation);
    }
}

#[async_trait]
impl FeedRegistry for FakeRegistry {
    async fn resolve_invitations(&self, oracle: &str) -> Result<FeedInvitationMap> {
        Ok(lock(&self.invitations)
            .get(oracle)
            .cloned()
            .unwrap_or_default())
    }
}

/// In-progress flags set by the test.
#[derive(Default)]
pub struct FakeFlag {
    flags: Mutex<HashMap<String, bool>>,
}

impl FakeFlag {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn set(&self, feed: &str, in_progress: bool) {
        lock(&self.flags).insert(feed.to_string(), in_progress);
    }
}

#[async_trait]
impl SubmissionFlag for FakeFlag {
    async fn is_in_progress(&self, feed: &str) -> Result<bool> {
        Ok(lock(&self.flags).get(feed).copied().unwrap_or(false))
    }
}

/// Job store remembering every recorded attempt.
#[derive(Default)]
pub struct FakeJobs {
    attempts: Mutex<HashMap<String, Vec<u64>>>,
}

impl FakeJobs {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn attempts(&self, feed: &str) -> usize {
        lock(&self.attempts).get(feed).map_or(0, Vec::len)
    }
}

#[async_trait]
impl JobStore for FakeJobs {
    async fn record_submission_attempt(&self, feed: &str, timestamp: u64) -> Result<()> {
        lock(&self.attempts)
            .entry(feed.to_string())
            .or_default()
            .push(timestamp);
        Ok(())
    }
}

/// One `record_observation` call.
#[derive(Clone, Debug, PartialEq)]
pub struct RecordedObservation {
    pub oracle_name: String,
    pub oracle: String,
    pub feed: String,
    pub price: f64,
    pub id: OfferId,
    pub actual_price: Option<f64>,
    pub round: RoundId,
}

/// Metrics sink that keeps every call.
#[derive(Default)]
pub struct RecordingMetrics {
    observations: Mutex<Vec<RecordedObservation>>,
    balances: Mutex<Vec<(String, f64)>>,
}

impl RecordingMetrics {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn observations(&self) -> Vec<RecordedObservation> {
        lock(&self.observations).clone()
    }

    /// `(brand, value)` of every balance recorded.
    pub fn balances(&self) -> Vec<(String, f64)> {
        lock(&self.balances).clone()
    }
}

impl MetricsSink for RecordingMetrics {
    fn record_observation(
        &self,
        oracle_name: &str,
        oracle: &str,
        feed: &str,
        price: f64,
        id: OfferId,
        actual_price: Option<f64>,
        round: RoundId,
    ) {
        lock(&self.observations).push(RecordedObservation {
            oracle_name: oracle_name.to_string(),
            oracle: oracle.to_string(),
            feed: feed.to_string(),
            price,
            id,
            actual_price,
            round,
        });
    }

    fn record_balance(&self, _oracle_name: &str, _oracle: &str, brand: &str, value: f64) {
        lock(&self.balances).push((brand.to_string(), value));
    }
}

/// Every fake wired together.
pub struct Harness {
    pub ledger: Arc<FakeLedger>,
    pub writer: Arc<FakeWriter>,
    pub registry: Arc<FakeRegistry>,
    pub flag: Arc<FakeFlag>,
    pub jobs: Arc<FakeJobs>,
    pub metrics: Arc<RecordingMetrics>,
}

impl Harness {
    pub fn new() -> Self {
        Self {
            ledger: FakeLedger::new(),
            writer: FakeWriter::new(),
            registry: FakeRegistry::new(),
            flag: FakeFlag::new(),
            jobs: FakeJobs::new(),
            metrics: RecordingMetrics::new(),
        }
    }

    pub fn resolver(&self, scan_limit: usize) -> RoundResolver {
        RoundResolver::new(self.ledger.clone(), self.registry.clone(), scan_limit)
    }

    pub fn coordinator(&self, config: SubmissionConfig) -> SubmissionCoordinator {
        SubmissionCoordinator::new(
            self.resolver(config.history_scan_limit),
            self.writer.clone(),
            self.flag.clone(),
            self.jobs.clone(),
            config,
        )
    }

    pub fn reconciler(&self, scan_limit: usize) -> Reconciler {
        Reconciler::new(self.ledger.clone(), self.metrics.clone(), scan_limit)
    }
}

impl Default for Harness {
    fn default() -> Self {
        Self::new()
    }
}
