//! Submission entry point used by the job API.
//!
//! Wraps the coordinator with the feed's lease in the job table so that
//! other service instances see the submission as in progress, and records
//! the reported outcome per feed.

use std::sync::Arc;

use roundlink_oracle::ports::{FeedRegistry, LedgerReader, LedgerWriter};
use roundlink_oracle::{
    OracleError, Result, RoundResolver, SubmissionConfig, SubmissionCoordinator, SubmissionOutcome,
};
use roundlink_types::RoundId;
use tracing::{error, info, warn};

use crate::store::SqliteStore;

/// Stable label stored as a job's `last_result`.
pub fn result_label(outcome: SubmissionOutcome) -> &'static str {
    match outcome {
        SubmissionOutcome::AlreadySatisfied => "already_satisfied",
        SubmissionOutcome::Confirmed { .. } => "confirmed",
        SubmissionOutcome::Stale { .. } => "stale",
        SubmissionOutcome::InProgressElsewhere { .. } => "in_progress_elsewhere",
        SubmissionOutcome::Exhausted { .. } => "exhausted",
    }
}

/// Pushes prices for one oracle wallet.
pub struct SubmissionService {
    coordinator: SubmissionCoordinator,
    store: SqliteStore,
    from: String,
}

impl SubmissionService {
    /// # Errors
    ///
    /// [`OracleError::InvalidConfig`] if `from` is empty or `config` fails
    /// validation.
    pub fn new(
        config: SubmissionConfig,
        from: impl Into<String>,
        reader: Arc<dyn LedgerReader>,
        writer: Arc<dyn LedgerWriter>,
        registry: Arc<dyn FeedRegistry>,
        store: SqliteStore,
    ) -> Result<Self> {
        config.validate()?;
        let from = from.into();
        if from.is_empty() {
            return Err(OracleError::InvalidConfig(
                "chain.from must name the submitting wallet".into(),
            ));
        }

        let resolver = RoundResolver::new(reader, registry, config.history_scan_limit);
        let store_handle = Arc::new(store.clone());
        let coordinator = SubmissionCoordinator::new(
            resolver,
            writer,
            store_handle.clone(),
            store_handle,
            config,
        );
        Ok(Self {
            coordinator,
            store,
            from,
        })
    }

    /// Lease lifetime: the longest a job can run plus one check interval.
    pub fn lease_ttl_secs(&self) -> u64 {
        let config = self.coordinator.config();
        config
            .max_duration()
            .saturating_add(config.check_interval())
            .as_secs()
    }

    /// Push `price` for `round` of `feed`.
    ///
    /// The lease is released whether or not the coordinator succeeds. A
    /// failed release is logged and does not replace the job's result.
    pub async fn submit_price(
        &self,
        price: u128,
        feed: &str,
        round: RoundId,
    ) -> Result<SubmissionOutcome> {
        if !self.store.acquire_lease(feed, self.lease_ttl_secs()).await? {
            warn!(feed, round, "feed leased by another submitter");
            return Ok(SubmissionOutcome::InProgressElsewhere { attempts: 0 });
        }

        let result = self.coordinator.submit(price, feed, round, &self.from).await;
        if let Err(e) = self.store.release_lease(feed).await {
            error!(feed, round, error = %e, "failed to release feed lease");
        }

        let outcome = result?;
        self.store
            .record_result(feed, round, result_label(outcome))
            .await?;
        info!(feed, round, result = result_label(outcome), "submission job finished");
        Ok(outcome)
    }
}

#[cfg(test)]
mod tests {
    use roundlink_oracle::testing::{push, Harness};
    use roundlink_types::Outcome;

    use super::*;

    const ORACLE: &str = "agoric1oracle";
    const FEED: &str = "ATOM-USD";

    fn service(harness: &Harness, store: SqliteStore) -> SubmissionService {
        SubmissionService::new(
            SubmissionConfig::default(),
            ORACLE,
            harness.ledger.clone(),
            harness.writer.clone(),
            harness.registry.clone(),
            store,
        )
        .expect("service")
    }

    fn harness() -> Harness {
        let harness = Harness::new();
        harness.ledger.set_round(FEED, 5);
        harness.registry.register(ORACLE, FEED, 12);
        harness
    }

    fn store(holder: &str) -> SqliteStore {
        SqliteStore::new(roundlink_db::open_memory().expect("db"), holder)
    }

    #[test]
    fn test_empty_sender_rejected() {
        let harness = harness();
        let result = SubmissionService::new(
            SubmissionConfig::default(),
            "",
            harness.ledger.clone(),
            harness.writer.clone(),
            harness.registry.clone(),
            store("svc-a"),
        );
        assert!(matches!(result, Err(OracleError::InvalidConfig(_))));
    }

    #[test]
    fn test_lease_ttl_covers_whole_job() {
        let harness = harness();
        assert_eq!(service(&harness, store("svc-a")).lease_ttl_secs(), 180);
    }

    #[tokio::test(start_paused = true)]
    async fn test_confirmed_submission_records_result_and_releases_lease() {
        let harness = harness();
        harness.writer.land_in(harness.ledger.clone(), ORACLE);
        let store = store("svc-a");
        let service = service(&harness, store.clone());

        let outcome = service.submit_price(9_870_000, FEED, 5).await.expect("submit");
        assert_eq!(outcome, SubmissionOutcome::Confirmed { attempts: 1 });

        let job = store.job(FEED).await.expect("job").expect("row");
        assert_eq!(job.last_reported_round, 5);
        assert_eq!(job.last_result.as_deref(), Some("confirmed"));
        assert_eq!(job.lock_holder, None);
        assert!(job.last_submission_time > 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_already_satisfied_is_recorded() {
        let harness = harness();
        harness
            .ledger
            .push_history(ORACLE, push(100, 12, 5, 1, Outcome::Success));
        let store = store("svc-a");

        let outcome = service(&harness, store.clone())
            .submit_price(1, FEED, 5)
            .await
            .expect("submit");
        assert_eq!(outcome, SubmissionOutcome::AlreadySatisfied);
        let job = store.job(FEED).await.expect("job").expect("row");
        assert_eq!(job.last_result.as_deref(), Some("already_satisfied"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_leased_feed_is_skipped() {
        let harness = harness();
        let store = store("svc-a");
        store.acquire_lease(FEED, 10_000).await.expect("lease");
        let rival = store.with_holder("svc-b");

        let outcome = service(&harness, rival)
            .submit_price(1, FEED, 5)
            .await
            .expect("submit");
        assert_eq!(outcome, SubmissionOutcome::InProgressElsewhere { attempts: 0 });
        assert!(harness.writer.sent().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_concurrent_jobs_for_one_feed_do_not_overlap() {
        let harness = harness();
        let service = service(&harness, store("svc-a"));

        let (a, b) = tokio::join!(
            service.submit_price(9_870_000, FEED, 5),
            service.submit_price(9_880_000, FEED, 5)
        );
        let mut outcomes = [a.expect("first job"), b.expect("second job")];
        outcomes.sort_by_key(|outcome| outcome.attempts());
        assert_eq!(
            outcomes,
            [
                SubmissionOutcome::InProgressElsewhere { attempts: 0 },
                SubmissionOutcome::Exhausted { attempts: 3 },
            ]
        );
        assert_eq!(harness.writer.sent().len(), 3);

        // The feed is free again once the running job is done.
        harness
            .ledger
            .push_history(ORACLE, push(100, 12, 5, 1, Outcome::Success));
        let outcome = service.submit_price(1, FEED, 5).await.expect("later job");
        assert_eq!(outcome, SubmissionOutcome::AlreadySatisfied);
    }

    #[tokio::test(start_paused = true)]
    async fn test_lease_released_on_error() {
        let harness = harness();
        let store = store("svc-a");

        let err = service(&harness, store.clone())
            .submit_price(1, "OSMO-USD", 5)
            .await
            .unwrap_err();
        assert!(matches!(err, OracleError::FeedNotRegistered(_)));
        let job = store.job("OSMO-USD").await.expect("job").expect("row");
        assert_eq!(job.lock_holder, None);
        assert_eq!(job.last_result, None);
    }

    /// Store whose database refuses to clear a lease.
    fn store_refusing_release() -> SqliteStore {
        let conn = roundlink_db::open_memory().expect("db");
        conn.execute_batch(
            "CREATE TRIGGER refuse_release BEFORE UPDATE OF lock_holder ON jobs
             WHEN NEW.lock_holder IS NULL
             BEGIN SELECT RAISE(ABORT, 'release refused'); END;",
        )
        .expect("trigger");
        SqliteStore::new(conn, "svc-a")
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_release_keeps_job_result() {
        let harness = harness();
        harness
            .ledger
            .push_history(ORACLE, push(100, 12, 5, 1, Outcome::Success));
        let store = store_refusing_release();
        let service = service(&harness, store.clone());

        let outcome = service.submit_price(1, FEED, 5).await.expect("submit");
        assert_eq!(outcome, SubmissionOutcome::AlreadySatisfied);
        let job = store.job(FEED).await.expect("job").expect("row");
        assert_eq!(job.last_result.as_deref(), Some("already_satisfied"));

        let err = service.submit_price(1, "OSMO-USD", 5).await.unwrap_err();
        assert!(matches!(err, OracleError::FeedNotRegistered(_)));
    }
}
