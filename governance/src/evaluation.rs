//! Quorum and majority arithmetic.
//!
//! All percentages are integer and truncating: `(part * 100) / whole`.
//! A quorum is met when that value is `>=` the configured percentage, so the
//! boundary itself counts as met.

use agora_types::TokenAmount;
use serde::{Deserialize, Serialize};

use crate::config::GovernanceConfig;
use crate::error::GovernanceError;
use crate::tally::Tally;

/// Why an evaluation did not pass.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum RejectionReason {
    Quorum,
    Majority,
}

/// Outcome of evaluating a tally against the configuration.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Verdict {
    Passed,
    Rejected(RejectionReason),
}

/// `floor(part * 100 / whole)`; `whole` must be non-zero.
fn percent_floor(part: u128, whole: u128) -> Result<u128, GovernanceError> {
    debug_assert!(whole > 0);
    part.checked_mul(100)
        .map(|scaled| scaled / whole)
        .ok_or(GovernanceError::TallyOverflow)
}

/// Whether `total` votes out of `supply` meet a `quorum_pct` quorum.
///
/// No votes, or no supply, never meets quorum (even a 0% quorum).
pub fn quorum_met(total: u128, supply: u128, quorum_pct: u8) -> Result<bool, GovernanceError> {
    if total == 0 || supply == 0 {
        return Ok(false);
    }
    Ok(percent_floor(total, supply)? >= u128::from(quorum_pct))
}

/// Whether `for_weight` out of `total` reaches `majority_pct`.
pub fn majority_met(for_weight: u128, total: u128, majority_pct: u8) -> Result<bool, GovernanceError> {
    if total == 0 {
        return Ok(false);
    }
    Ok(percent_floor(for_weight, total)? >= u128::from(majority_pct))
}

/// Evaluate a frozen tally: quorum first, then majority.
pub fn evaluate(
    tally: &Tally,
    total_supply: TokenAmount,
    config: &GovernanceConfig,
) -> Result<Verdict, GovernanceError> {
    let total = tally.total()?;
    if !quorum_met(total, total_supply.raw(), config.quorum_percentage)? {
        return Ok(Verdict::Rejected(RejectionReason::Quorum));
    }
    if !majority_met(tally.for_weight, total, config.majority_percentage)? {
        return Ok(Verdict::Rejected(RejectionReason::Majority));
    }
    Ok(Verdict::Passed)
}

/// Read-only participation figures for a proposal.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct VoteSummary {
    pub total_votes: u128,
    pub total_supply: TokenAmount,
    pub quorum_reached: bool,
    /// `for * 100 / total`, 0 when nobody voted.
    pub approval_rate_pct: u128,
    /// `total * 100 / supply`, 0 when the supply is zero.
    pub participation_rate_pct: u128,
}

impl VoteSummary {
    pub fn compute(
        tally: &Tally,
        total_supply: TokenAmount,
        config: &GovernanceConfig,
    ) -> Result<Self, GovernanceError> {
        let total = tally.total()?;
        let supply = total_supply.raw();
        Ok(Self {
            total_votes: total,
            total_supply,
            quorum_reached: quorum_met(total, supply, config.quorum_percentage)?,
            approval_rate_pct: if total == 0 {
                0
            } else {
                percent_floor(tally.for_weight, total)?
            },
            participation_rate_pct: if supply == 0 {
                0
            } else {
                percent_floor(total, supply)?
            },
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(quorum: u8, majority: u8) -> GovernanceConfig {
        GovernanceConfig {
            quorum_percentage: quorum,
            majority_percentage: majority,
            ..GovernanceConfig::default()
        }
    }

    #[test]
    fn quorum_boundary_is_inclusive() {
        assert!(quorum_met(40, 1000, 4).unwrap());
        assert!(!quorum_met(39, 1000, 4).unwrap());
    }

    #[test]
    fn quorum_truncates() {
        // 49.9% truncates to 49.
        assert!(!quorum_met(499, 1000, 50).unwrap());
    }

    #[test]
    fn zero_quorum_still_needs_a_vote() {
        assert!(!quorum_met(0, 1000, 0).unwrap());
        assert!(quorum_met(1, 1000, 0).unwrap());
        assert!(!quorum_met(10, 0, 0).unwrap());
    }

    #[test]
    fn majority_boundary_is_inclusive() {
        assert!(majority_met(51, 100, 51).unwrap());
        assert!(!majority_met(50, 100, 51).unwrap());
    }

    #[test]
    fn evaluate_checks_quorum_before_majority() {
        let tally = Tally {
            for_weight: 0,
            against_weight: 10,
            abstain_weight: 0,
        };
        assert_eq!(
            evaluate(&tally, TokenAmount::new(1000), &config(4, 51)).unwrap(),
            Verdict::Rejected(RejectionReason::Quorum)
        );
        assert_eq!(
            evaluate(&tally, TokenAmount::new(100), &config(4, 51)).unwrap(),
            Verdict::Rejected(RejectionReason::Majority)
        );
    }

    #[test]
    fn abstain_counts_for_quorum_but_not_approval() {
        let tally = Tally {
            for_weight: 30,
            against_weight: 0,
            abstain_weight: 70,
        };
        let summary = VoteSummary::compute(&tally, TokenAmount::new(1000), &config(10, 51)).unwrap();
        assert!(summary.quorum_reached);
        assert_eq!(summary.participation_rate_pct, 10);
        assert_eq!(summary.approval_rate_pct, 30);
        assert_eq!(
            evaluate(&tally, TokenAmount::new(1000), &config(10, 51)).unwrap(),
            Verdict::Rejected(RejectionReason::Majority)
        );
    }

    #[test]
    fn summary_of_empty_tally() {
        let summary =
            VoteSummary::compute(&Tally::default(), TokenAmount::ZERO, &config(4, 51)).unwrap();
        assert_eq!(summary.total_votes, 0);
        assert!(!summary.quorum_reached);
        assert_eq!(summary.approval_rate_pct, 0);
        assert_eq!(summary.participation_rate_pct, 0);
    }
}
