//! Periodic reconciliation of monitored oracles.
//!
//! Each tick runs one reconciliation pass per configured oracle, all oracles
//! concurrently. State is persisted only when a pass changed it; a failing
//! oracle is logged and retried on the next tick.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use futures::future::join_all;
use roundlink_oracle::ports::{LedgerReader, MetricsSink};
use roundlink_oracle::{prices, Reconciler, Result};
use roundlink_types::OracleProfile;
use tokio::sync::broadcast;
use tokio::time::MissedTickBehavior;
use tracing::{error, info, warn};

use crate::config::MonitorConfig;
use crate::store::SqliteStore;

/// Result of one poll over all oracles.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PollReport {
    /// Oracles whose state changed and was saved.
    pub updated: usize,
    pub unchanged: usize,
    pub failed: usize,
}

pub struct Monitor {
    reconciler: Reconciler,
    reader: Arc<dyn LedgerReader>,
    store: SqliteStore,
    oracles: Vec<OracleProfile>,
    poll_interval: Duration,
}

impl Monitor {
    pub fn new(
        config: &MonitorConfig,
        scan_limit: usize,
        reader: Arc<dyn LedgerReader>,
        metrics: Arc<dyn MetricsSink>,
        store: SqliteStore,
    ) -> Self {
        Self {
            reconciler: Reconciler::new(reader.clone(), metrics, scan_limit),
            reader,
            store,
            oracles: config.oracles.clone(),
            poll_interval: Duration::from_secs(config.poll_interval_secs),
        }
    }

    /// Reconcile every oracle once.
    pub async fn poll_once(&self) -> PollReport {
        let results = join_all(self.oracles.iter().map(|oracle| self.poll_oracle(oracle))).await;

        let mut report = PollReport::default();
        for (oracle, result) in self.oracles.iter().zip(results) {
            match result {
                Ok(true) => report.updated += 1,
                Ok(false) => report.unchanged += 1,
                Err(e) => {
                    error!(oracle = %oracle.address, error = %e, "reconciliation failed");
                    report.failed += 1;
                }
            }
        }
        info!(
            updated = report.updated,
            unchanged = report.unchanged,
            failed = report.failed,
            "monitor poll complete"
        );
        report
    }

    /// Poll on every tick until `shutdown` fires.
    pub async fn run(&self, mut shutdown: broadcast::Receiver<()>) {
        let mut ticker = tokio::time::interval(self.poll_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        info!(
            oracles = self.oracles.len(),
            interval_secs = self.poll_interval.as_secs(),
            "monitor started"
        );

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    self.poll_once().await;
                }
                _ = shutdown.recv() => {
                    info!("monitor shutting down");
                    break;
                }
            }
        }
    }

    async fn poll_oracle(&self, oracle: &OracleProfile) -> Result<bool> {
        let prior = self.store.load_state(&oracle.address).await?;
        let amounts = self.amounts_in(oracle).await;

        let next = self.reconciler.reconcile(oracle, &prior, &amounts).await?;
        if next == prior {
            return Ok(false);
        }
        self.store.save_state(&oracle.address, &next).await?;
        Ok(true)
    }

    /// `amountIn` of each of the oracle's feeds. Unreadable feeds are left
    /// out and their observations skipped for this pass.
    async fn amounts_in(&self, oracle: &OracleProfile) -> BTreeMap<String, u128> {
        let mut amounts = BTreeMap::new();
        for feed in oracle.feeds.values() {
            match prices::amount_in(self.reader.as_ref(), feed).await {
                Ok(amount) => {
                    amounts.insert(feed.clone(), amount);
                }
                Err(e) => warn!(feed = %feed, error = %e, "could not read amountIn"),
            }
        }
        amounts
    }
}
