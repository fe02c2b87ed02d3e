//! Incremental reconciliation cursor.
//!
//! The monitor polls every oracle periodically. Each pass folds only the
//! offers published since the previous pass into the oracle's
//! [`OracleObservationState`]: the history is read newest first and the walk
//! stops at the first offer id at or below the prior high-water mark.

use std::collections::BTreeMap;
use std::sync::Arc;

use roundlink_types::{FeedObservation, OracleObservationState, OracleProfile, MONITORED_BRANDS};
use tracing::{debug, info, warn};

use crate::ports::{LedgerReader, MetricsSink};
use crate::{history, prices, Result};

/// Folds oracle offer histories into observation state and metrics.
#[derive(Clone)]
pub struct Reconciler {
    reader: Arc<dyn LedgerReader>,
    metrics: Arc<dyn MetricsSink>,
    scan_limit: usize,
}

impl Reconciler {
    pub fn new(
        reader: Arc<dyn LedgerReader>,
        metrics: Arc<dyn MetricsSink>,
        scan_limit: usize,
    ) -> Self {
        Self {
            reader,
            metrics,
            scan_limit,
        }
    }

    /// Run one reconciliation pass for `oracle`.
    ///
    /// `amounts_in` holds the `amountIn` scale of each feed. Returns `prior`
    /// unchanged when no new observation was accepted.
    pub async fn reconcile(
        &self,
        oracle: &OracleProfile,
        prior: &OracleObservationState,
        amounts_in: &BTreeMap<String, u128>,
    ) -> Result<OracleObservationState> {
        info!(oracle = %oracle.address, feeds = oracle.feeds.len(), "reconciling oracle");

        let records = history::decode(self.reader.submission_history(&oracle.address));
        let offers = history::scan(records, self.scan_limit).await?;
        let balances = self.reader.balances(&oracle.address).await?;

        let mut next = prior.clone();
        for offer in &offers {
            if offer.id <= prior.last_submission_id {
                break;
            }
            let Some(push) = offer.push_price() else {
                continue;
            };
            if offer.is_error() {
                continue;
            }
            let Some(feed) = oracle.feed_for(push.prior_submission_id) else {
                debug!(oracle = %oracle.address, invitation = push.prior_submission_id, "offer for unmonitored feed");
                continue;
            };
            if push.target_round <= next.last_round(feed) {
                continue;
            }
            let Some(&amount_in) = amounts_in.get(feed).filter(|amount| **amount > 0) else {
                warn!(feed, "no amountIn for feed, skipping observation");
                continue;
            };

            let price = push.unit_price as f64 / amount_in as f64;
            next.values.insert(
                feed.to_string(),
                FeedObservation {
                    price,
                    id: offer.id,
                    round: push.target_round,
                },
            );
            next.last_submission_id = next.last_submission_id.max(offer.id);

            let actual_price = match prices::query_price(self.reader.as_ref(), feed).await {
                Ok(actual) => Some(actual),
                Err(e) => {
                    warn!(feed, error = %e, "could not read published price");
                    None
                }
            };
            self.metrics.record_observation(
                &oracle.name,
                &oracle.address,
                feed,
                price,
                offer.id,
                actual_price,
                push.target_round,
            );
        }

        for balance in &balances {
            let Some(brand) = balance.brand_name() else {
                continue;
            };
            if MONITORED_BRANDS.iter().any(|tracked| brand.contains(tracked)) {
                self.metrics
                    .record_balance(&oracle.name, &oracle.address, brand, balance.value as f64);
            }
        }

        Ok(next)
    }
}

#[cfg(test)]
mod tests {
    use roundlink_types::wallet::PurseBalance;
    use roundlink_types::Outcome;

    use super::*;
    use crate::testing::{other_offer, push, Harness};

    const ORACLE: &str = "agoric1oracle";

    fn profile() -> OracleProfile {
        OracleProfile {
            address: ORACLE.into(),
            name: "Oracle A".into(),
            feeds: [(12, "ATOM-USD".to_string()), (13, "OSMO-USD".to_string())]
                .into_iter()
                .collect(),
        }
    }

    fn amounts() -> BTreeMap<String, u128> {
        [("ATOM-USD".to_string(), 1_000_000), ("OSMO-USD".to_string(), 1_000_000)]
            .into_iter()
            .collect()
    }

    fn harness() -> Harness {
        let harness = Harness::new();
        harness.ledger.set_price("ATOM-USD", 1_000_000, 10_000_000);
        harness.ledger.set_price("OSMO-USD", 1_000_000, 500_000);
        harness
    }

    fn prior(last_submission_id: u64) -> OracleObservationState {
        OracleObservationState {
            last_submission_id,
            ..OracleObservationState::default()
        }
    }

    #[tokio::test]
    async fn test_only_entries_above_high_water_mark() {
        let harness = harness();
        // Newest first: 105, 102, 98, 95.
        for (id, round) in [(95, 1), (98, 2), (102, 3), (105, 4)] {
            let feed = if id % 2 == 0 { 12 } else { 13 };
            harness
                .ledger
                .push_history(ORACLE, push(id, feed, round, 9_000_000, Outcome::Success));
        }

        let state = harness
            .reconciler(10)
            .reconcile(&profile(), &prior(100), &amounts())
            .await
            .expect("reconcile");

        assert_eq!(state.last_submission_id, 105);
        let atom = &state.values["ATOM-USD"];
        assert_eq!((atom.id, atom.round), (102, 3));
        let osmo = &state.values["OSMO-USD"];
        assert_eq!((osmo.id, osmo.round), (105, 4));
        assert_eq!(harness.metrics.observations().len(), 2);
    }

    #[tokio::test]
    async fn test_unit_price_scaled_by_amount_in() {
        let harness = harness();
        harness
            .ledger
            .push_history(ORACLE, push(200, 12, 7, 9_870_000, Outcome::Success));

        let state = harness
            .reconciler(5)
            .reconcile(&profile(), &prior(0), &amounts())
            .await
            .expect("reconcile");

        let atom = &state.values["ATOM-USD"];
        assert!((atom.price - 9.87).abs() < 1e-9);

        let observations = harness.metrics.observations();
        assert_eq!(observations.len(), 1);
        let obs = &observations[0];
        assert_eq!(obs.oracle_name, "Oracle A");
        assert_eq!(obs.feed, "ATOM-USD");
        assert_eq!(obs.round, 7);
        let actual = obs.actual_price.expect("published price");
        assert!((actual - 10.0).abs() < 1e-9);
    }

    #[tokio::test]
    async fn test_unchanged_history_is_noop() {
        let harness = harness();
        harness
            .ledger
            .push_history(ORACLE, push(200, 12, 7, 9_870_000, Outcome::Success));
        let reconciler = harness.reconciler(5);

        let first = reconciler
            .reconcile(&profile(), &OracleObservationState::default(), &amounts())
            .await
            .expect("first pass");
        let second = reconciler
            .reconcile(&profile(), &first, &amounts())
            .await
            .expect("second pass");

        assert_eq!(second, first);
        assert_eq!(harness.metrics.observations().len(), 1);
    }

    #[tokio::test]
    async fn test_same_round_keeps_newest() {
        let harness = harness();
        harness
            .ledger
            .push_history(ORACLE, push(300, 12, 7, 1_000_000, Outcome::Success));
        harness
            .ledger
            .push_history(ORACLE, push(301, 12, 7, 2_000_000, Outcome::Success));

        let state = harness
            .reconciler(5)
            .reconcile(&profile(), &prior(0), &amounts())
            .await
            .expect("reconcile");

        let atom = &state.values["ATOM-USD"];
        assert_eq!(atom.id, 301);
        assert!((atom.price - 2.0).abs() < 1e-9);
    }

    #[tokio::test]
    async fn test_older_round_never_overwrites() {
        let harness = harness();
        harness
            .ledger
            .push_history(ORACLE, push(400, 12, 3, 1_000_000, Outcome::Success));
        let mut start = prior(350);
        start.values.insert(
            "ATOM-USD".into(),
            FeedObservation {
                price: 5.0,
                id: 350,
                round: 4,
            },
        );

        let state = harness
            .reconciler(5)
            .reconcile(&profile(), &start, &amounts())
            .await
            .expect("reconcile");

        assert_eq!(state, start);
    }

    #[tokio::test]
    async fn test_skips_errored_unmonitored_and_other_offers() {
        let harness = harness();
        harness
            .ledger
            .push_history(ORACLE, push(500, 12, 9, 1_000_000, Outcome::Error("late".into())));
        harness
            .ledger
            .push_history(ORACLE, push(501, 99, 9, 1_000_000, Outcome::Success));
        harness.ledger.push_history(ORACLE, other_offer(502, "Deposit"));

        let state = harness
            .reconciler(5)
            .reconcile(&profile(), &prior(0), &amounts())
            .await
            .expect("reconcile");

        assert_eq!(state, prior(0));
        assert!(harness.metrics.observations().is_empty());
    }

    #[tokio::test]
    async fn test_unreadable_published_price_still_advances() {
        let harness = Harness::new();
        harness.ledger.set_price("ATOM-USD", 1_000_000, 10_000_000);
        // amountIn was read, but no OSMO-USD price can be queried.
        harness
            .ledger
            .push_history(ORACLE, push(700, 12, 4, 9_000_000, Outcome::Success));
        harness
            .ledger
            .push_history(ORACLE, push(701, 13, 4, 450_000, Outcome::Success));
        let reconciler = harness.reconciler(5);

        let state = reconciler
            .reconcile(&profile(), &prior(0), &amounts())
            .await
            .expect("reconcile");

        assert_eq!(state.last_submission_id, 701);
        assert_eq!(state.last_round("OSMO-USD"), 4);
        assert_eq!(state.last_round("ATOM-USD"), 4);
        let observations = harness.metrics.observations();
        assert_eq!(observations.len(), 2);
        let osmo = observations.iter().find(|o| o.feed == "OSMO-USD").expect("osmo");
        assert_eq!(osmo.actual_price, None);
        let atom = observations.iter().find(|o| o.feed == "ATOM-USD").expect("atom");
        assert!(atom.actual_price.is_some());

        // The next pass does not emit the same observations again.
        let again = reconciler
            .reconcile(&profile(), &state, &amounts())
            .await
            .expect("second pass");
        assert_eq!(again, state);
        assert_eq!(harness.metrics.observations().len(), 2);
    }

    #[tokio::test]
    async fn test_missing_amount_in_skips_feed() {
        let harness = harness();
        harness
            .ledger
            .push_history(ORACLE, push(600, 12, 9, 1_000_000, Outcome::Success));

        let state = harness
            .reconciler(5)
            .reconcile(&profile(), &prior(0), &BTreeMap::new())
            .await
            .expect("reconcile");
        assert_eq!(state, prior(0));
    }

    #[tokio::test]
    async fn test_monotonic_over_growing_history() {
        let harness = harness();
        let reconciler = harness.reconciler(5);
        let mut state = OracleObservationState::default();

        let mut id = 1_000;
        for round in 1..=12u64 {
            id += 7;
            harness
                .ledger
                .push_history(ORACLE, push(id, 12 + round % 2, round, 1_000_000, Outcome::Success));
            let next = reconciler
                .reconcile(&profile(), &state, &amounts())
                .await
                .expect("reconcile");

            assert!(next.last_submission_id >= state.last_submission_id);
            for (feed, obs) in &state.values {
                assert!(next.values[feed].round >= obs.round);
            }
            state = next;
        }
        assert_eq!(state.last_submission_id, id);
    }

    #[tokio::test]
    async fn test_balances_for_tracked_brands_only() {
        let harness = harness();
        harness.ledger.set_balances(
            ORACLE,
            vec![
                PurseBalance {
                    brand: "Alleged: BLD brand".into(),
                    value: 25_000_000,
                },
                PurseBalance {
                    brand: "Alleged: IST brand".into(),
                    value: 3_000_000,
                },
                PurseBalance {
                    brand: "Alleged: ATOM brand".into(),
                    value: 1,
                },
            ],
        );

        harness
            .reconciler(5)
            .reconcile(&profile(), &prior(0), &amounts())
            .await
            .expect("reconcile");

        let balances = harness.metrics.balances();
        let brands: Vec<&str> = balances.iter().map(|(brand, _)| brand.as_str()).collect();
        assert_eq!(brands, vec!["BLD", "IST"]);
        assert!((balances[0].1 - 25_000_000.0).abs() < 1e-9);
    }
}
