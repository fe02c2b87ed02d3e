//! Retry-driven submission coordinator.
//!
//! Pushes a price for a target round and waits for it to become visible in
//! the oracle's offer history. Each attempt re-resolves the feed's round so a
//! round that closed while an earlier attempt was in flight never receives a
//! late submission. The loop is bounded by `max_retries`; the only suspension
//! point is the `check_interval` sleep after each attempt.

use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use roundlink_types::wallet::BridgeAction;
use roundlink_types::RoundId;
use tracing::{error, info, warn};

use crate::config::SubmissionConfig;
use crate::eligibility::{evaluate, Eligibility};
use crate::ports::{JobStore, LedgerWriter, SubmissionFlag};
use crate::resolver::RoundResolver;
use crate::{capdata, Result};

/// How a submission job ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubmissionOutcome {
    /// The round already held this oracle's submission before anything was
    /// sent.
    AlreadySatisfied,
    /// A submission sent by this job became visible.
    Confirmed { attempts: u32 },
    /// The feed moved past the target round.
    Stale { resolved_round: RoundId, attempts: u32 },
    /// Another process is submitting for the feed.
    InProgressElsewhere { attempts: u32 },
    /// `max_retries` attempts were sent without the submission showing up.
    Exhausted { attempts: u32 },
}

impl SubmissionOutcome {
    /// Whether the target round holds this oracle's submission.
    pub fn submitted(self) -> bool {
        matches!(
            self,
            SubmissionOutcome::AlreadySatisfied | SubmissionOutcome::Confirmed { .. }
        )
    }

    /// Number of actions sent to the ledger.
    pub fn attempts(self) -> u32 {
        match self {
            SubmissionOutcome::AlreadySatisfied => 0,
            SubmissionOutcome::Confirmed { attempts }
            | SubmissionOutcome::Stale { attempts, .. }
            | SubmissionOutcome::InProgressElsewhere { attempts }
            | SubmissionOutcome::Exhausted { attempts } => attempts,
        }
    }
}

/// Drives price submissions for one or more feeds.
pub struct SubmissionCoordinator {
    resolver: RoundResolver,
    writer: Arc<dyn LedgerWriter>,
    flag: Arc<dyn SubmissionFlag>,
    jobs: Arc<dyn JobStore>,
    config: SubmissionConfig,
}

impl SubmissionCoordinator {
    pub fn new(
        resolver: RoundResolver,
        writer: Arc<dyn LedgerWriter>,
        flag: Arc<dyn SubmissionFlag>,
        jobs: Arc<dyn JobStore>,
        config: SubmissionConfig,
    ) -> Self {
        Self {
            resolver,
            writer,
            flag,
            jobs,
            config,
        }
    }

    pub fn config(&self) -> &SubmissionConfig {
        &self.config
    }

    /// Push `price` for `target_round` of `feed` from the `from` wallet.
    ///
    /// # Errors
    ///
    /// - [`crate::OracleError::FeedNotRegistered`] if `from` has no invitation for `feed`
    /// - [`crate::OracleError::Parse`] if a round record cannot be decoded
    /// - transport and store errors from the collaborators
    ///
    /// Running out of retries, a stale round and a concurrent submission
    /// elsewhere are outcomes, not errors.
    pub async fn submit(
        &self,
        price: u128,
        feed: &str,
        target_round: RoundId,
        from: &str,
    ) -> Result<SubmissionOutcome> {
        let outcome = self.run(price, feed, target_round, from).await;
        match &outcome {
            Ok(SubmissionOutcome::AlreadySatisfied) => {
                info!(feed, round = target_round, "price already submitted for round")
            }
            Ok(SubmissionOutcome::Confirmed { attempts }) => {
                info!(feed, round = target_round, attempts, "price submitted successfully")
            }
            Ok(SubmissionOutcome::Stale { resolved_round, attempts }) => info!(
                feed,
                round = target_round,
                resolved_round,
                attempts,
                "price failed to be submitted for old round"
            ),
            Ok(SubmissionOutcome::InProgressElsewhere { attempts }) => warn!(
                feed,
                round = target_round,
                attempts,
                "submission in progress elsewhere, giving up"
            ),
            Ok(SubmissionOutcome::Exhausted { attempts }) => error!(
                feed,
                round = target_round,
                attempts,
                "price failed to be submitted for round"
            ),
            Err(e) => error!(feed, round = target_round, error = %e, "price submission aborted"),
        }
        outcome
    }

    async fn run(
        &self,
        price: u128,
        feed: &str,
        target_round: RoundId,
        from: &str,
    ) -> Result<SubmissionOutcome> {
        let invitation = self.resolver.invitation_for(from, feed).await?;

        let mut submitted = self
            .resolver
            .submission_made(from, invitation, target_round)
            .await?;
        if submitted {
            return Ok(SubmissionOutcome::AlreadySatisfied);
        }
        let mut in_progress = self.flag.is_in_progress(feed).await?;

        let mut attempts = 0;
        while attempts < self.config.max_retries && !submitted && !in_progress {
            let resolved = self.resolver.resolve_round(feed, from).await?;
            match evaluate(target_round, &resolved) {
                Eligibility::Proceed => {}
                Eligibility::Stale => {
                    return Ok(SubmissionOutcome::Stale {
                        resolved_round: resolved.round_id,
                        attempts,
                    });
                }
                Eligibility::AlreadySatisfied if attempts == 0 => {
                    return Ok(SubmissionOutcome::AlreadySatisfied);
                }
                Eligibility::AlreadySatisfied => {
                    return Ok(SubmissionOutcome::Confirmed { attempts });
                }
            }

            attempts += 1;
            info!(feed, round = target_round, attempt = attempts, "submitting price");

            let action = BridgeAction::push_price(now_millis(), invitation, price, target_round);
            let payload = capdata::encode_action(&action)?;
            self.writer
                .submit_action(&payload, from, &self.config.keyring)
                .await?;
            self.jobs
                .record_submission_attempt(feed, now_millis() / 1000)
                .await?;

            tokio::time::sleep(self.config.check_interval()).await;

            submitted = self
                .resolver
                .submission_made(from, invitation, target_round)
                .await?;
            in_progress = self.flag.is_in_progress(feed).await?;
        }

        Ok(if submitted {
            SubmissionOutcome::Confirmed { attempts }
        } else if in_progress {
            SubmissionOutcome::InProgressElsewhere { attempts }
        } else {
            SubmissionOutcome::Exhausted { attempts }
        })
    }
}

/// Client-side offer id: milliseconds since the Unix epoch.
fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{push, Harness};
    use roundlink_types::Outcome;

    const ORACLE: &str = "agoric1oracle";
    const FEED: &str = "ATOM-USD";
    const INVITATION: u64 = 12;

    fn harness(round: RoundId) -> Harness {
        let harness = Harness::new();
        harness.ledger.set_round(FEED, round);
        harness.registry.register(ORACLE, FEED, INVITATION);
        harness
    }

    #[tokio::test(start_paused = true)]
    async fn test_already_submitted_sends_nothing() {
        let harness = harness(5);
        harness
            .ledger
            .push_history(ORACLE, push(100, INVITATION, 5, 9_870_000, Outcome::Success));

        let outcome = harness
            .coordinator(SubmissionConfig::default())
            .submit(9_870_000, FEED, 5, ORACLE)
            .await
            .expect("submit");

        assert_eq!(outcome, SubmissionOutcome::AlreadySatisfied);
        assert!(outcome.submitted());
        assert_eq!(harness.writer.sent().len(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_stale_round_sends_nothing() {
        let harness = harness(6);
        let outcome = harness
            .coordinator(SubmissionConfig::default())
            .submit(9_870_000, FEED, 5, ORACLE)
            .await
            .expect("submit");

        assert_eq!(
            outcome,
            SubmissionOutcome::Stale {
                resolved_round: 6,
                attempts: 0
            }
        );
        assert!(!outcome.submitted());
        assert_eq!(harness.writer.sent().len(), 0);
        assert_eq!(harness.jobs.attempts(FEED), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_exhausts_retries_when_never_visible() {
        let harness = harness(5);
        let config = SubmissionConfig {
            max_retries: 3,
            ..SubmissionConfig::default()
        };
        let started = tokio::time::Instant::now();

        let outcome = harness
            .coordinator(config.clone())
            .submit(9_870_000, FEED, 5, ORACLE)
            .await
            .expect("submit");

        assert_eq!(outcome, SubmissionOutcome::Exhausted { attempts: 3 });
        assert_eq!(harness.writer.sent().len(), 3);
        assert_eq!(harness.jobs.attempts(FEED), 3);
        let elapsed = started.elapsed();
        assert!(elapsed >= config.max_duration());
        assert!(elapsed < config.max_duration() + config.check_interval());
    }

    #[tokio::test(start_paused = true)]
    async fn test_confirmed_when_submission_lands() {
        let harness = harness(5);
        harness.writer.land_in(harness.ledger.clone(), ORACLE);

        let outcome = harness
            .coordinator(SubmissionConfig::default())
            .submit(9_870_000, FEED, 5, ORACLE)
            .await
            .expect("submit");

        assert_eq!(outcome, SubmissionOutcome::Confirmed { attempts: 1 });
        let sent = harness.writer.sent();
        assert_eq!(sent.len(), 1);
        let spec = &sent[0].0["offer"]["invitationSpec"];
        assert_eq!(spec["previousOffer"], INVITATION);
        assert_eq!(spec["invitationArgs"][0]["roundId"], 5);
        assert_eq!(spec["invitationArgs"][0]["unitPrice"]["digits"], "9870000");
        assert_eq!(sent[0].1, ORACLE);
    }

    #[tokio::test(start_paused = true)]
    async fn test_late_visibility_confirmed_by_round_check() {
        let harness = harness(5);
        // The check after the sleep misses the push; the next round
        // resolution sees it.
        harness.writer.land_late_in(harness.ledger.clone(), ORACLE, 1);

        let outcome = harness
            .coordinator(SubmissionConfig::default())
            .submit(9_870_000, FEED, 5, ORACLE)
            .await
            .expect("submit");

        assert_eq!(outcome, SubmissionOutcome::Confirmed { attempts: 1 });
        assert!(outcome.submitted());
        assert_eq!(harness.writer.sent().len(), 1);
        assert_eq!(harness.jobs.attempts(FEED), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_in_progress_elsewhere_skips_loop() {
        let harness = harness(5);
        harness.flag.set(FEED, true);

        let outcome = harness
            .coordinator(SubmissionConfig::default())
            .submit(9_870_000, FEED, 5, ORACLE)
            .await
            .expect("submit");

        assert_eq!(outcome, SubmissionOutcome::InProgressElsewhere { attempts: 0 });
        assert_eq!(harness.writer.sent().len(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_round_advances_mid_job() {
        let harness = harness(5);
        harness.writer.advance_round_after_send(harness.ledger.clone(), FEED);

        let outcome = harness
            .coordinator(SubmissionConfig::default())
            .submit(9_870_000, FEED, 5, ORACLE)
            .await
            .expect("submit");

        assert_eq!(
            outcome,
            SubmissionOutcome::Stale {
                resolved_round: 6,
                attempts: 1
            }
        );
        assert_eq!(harness.writer.sent().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_unregistered_feed_is_error() {
        let harness = harness(5);
        let err = harness
            .coordinator(SubmissionConfig::default())
            .submit(1, "OSMO-USD", 5, ORACLE)
            .await
            .unwrap_err();
        assert!(matches!(err, crate::OracleError::FeedNotRegistered(feed) if feed == "OSMO-USD"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_parse_failure_terminates_loop() {
        let harness = harness(5);
        harness.ledger.set_raw_round(FEED, b"{\"value\": \"garbage\"}".to_vec());

        let err = harness
            .coordinator(SubmissionConfig::default())
            .submit(1, FEED, 5, ORACLE)
            .await
            .unwrap_err();
        assert!(matches!(err, crate::OracleError::Parse { .. }));
        assert_eq!(harness.writer.sent().len(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_zero_retries_sends_nothing() {
        let harness = harness(5);
        let config = SubmissionConfig {
            max_retries: 0,
            ..SubmissionConfig::default()
        };
        let outcome = harness
            .coordinator(config)
            .submit(1, FEED, 5, ORACLE)
            .await
            .expect("submit");
        assert_eq!(outcome, SubmissionOutcome::Exhausted { attempts: 0 });
    }
}
