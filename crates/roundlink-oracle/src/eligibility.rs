//! Submission eligibility gate.

use roundlink_types::{RoundId, RoundInfo};

/// Whether a price may still be pushed for a target round.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Eligibility {
    /// The round is open and not yet filled by this oracle.
    Proceed,
    /// This oracle already filled the target round.
    AlreadySatisfied,
    /// The feed has moved past the target round.
    Stale,
}

impl Eligibility {
    /// Whether the retry loop must stop without sending.
    pub fn is_terminal(self) -> bool {
        !matches!(self, Eligibility::Proceed)
    }
}

/// Decide eligibility of `target_round` against the currently resolved round.
pub fn evaluate(target_round: RoundId, resolved: &RoundInfo) -> Eligibility {
    if resolved.round_id > target_round {
        Eligibility::Stale
    } else if resolved.round_id == target_round && resolved.submission_made {
        Eligibility::AlreadySatisfied
    } else {
        Eligibility::Proceed
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn round(round_id: RoundId, submission_made: bool) -> RoundInfo {
        RoundInfo {
            round_id,
            started_at: 1_700_000_000,
            started_by: "agoric1starter".into(),
            submission_made,
        }
    }

    #[test]
    fn test_newer_round_is_stale_regardless_of_submission() {
        for target in 0..20 {
            for ahead in 1..5 {
                assert_eq!(evaluate(target, &round(target + ahead, false)), Eligibility::Stale);
                assert_eq!(evaluate(target, &round(target + ahead, true)), Eligibility::Stale);
            }
        }
    }

    #[test]
    fn test_same_round_already_submitted_is_terminal() {
        for target in 0..20 {
            let verdict = evaluate(target, &round(target, true));
            assert_eq!(verdict, Eligibility::AlreadySatisfied);
            assert!(verdict.is_terminal());
        }
    }

    #[test]
    fn test_same_round_not_submitted_proceeds() {
        assert_eq!(evaluate(5, &round(5, false)), Eligibility::Proceed);
    }

    #[test]
    fn test_older_round_proceeds() {
        // The feed has not opened the target round yet.
        assert_eq!(evaluate(5, &round(4, true)), Eligibility::Proceed);
        assert_eq!(evaluate(5, &round(4, false)), Eligibility::Proceed);
        assert!(!Eligibility::Proceed.is_terminal());
    }
}
