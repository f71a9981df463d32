//! Governance configuration.
//!
//! Defaults follow the original marketplace deployment: 1,000,000 token
//! proposal threshold, 7-day vote, 2-day execution delay, 4% quorum,
//! 51% majority.

use agora_types::TokenAmount;
use serde::{Deserialize, Serialize};

use crate::error::{ExecutionError, GovernanceError};
use crate::params::{ConfigParam, ParamValue};

pub const DEFAULT_MIN_PROPOSAL_THRESHOLD: u128 = 1_000_000;
pub const DEFAULT_VOTING_PERIOD_SECS: u64 = 7 * 24 * 3600;
pub const DEFAULT_EXECUTION_DELAY_SECS: u64 = 2 * 24 * 3600;
pub const DEFAULT_QUORUM_PERCENTAGE: u8 = 4;
pub const DEFAULT_MAJORITY_PERCENTAGE: u8 = 51;

/// Which moment's balance is used as a vote's weight.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VoteWeightPolicy {
    /// The voter's balance when the vote is cast (or revised).
    #[default]
    AtCast,
    /// The voter's balance when the proposal opened.
    AtProposalStart,
}

/// Process-wide governance configuration (singleton record).
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct GovernanceConfig {
    /// Minimum balance a creator needs to submit a proposal.
    #[serde(default = "default_min_proposal_threshold")]
    pub min_proposal_threshold: TokenAmount,

    /// Length of the voting window in seconds.
    #[serde(default = "default_voting_period_secs")]
    pub voting_period_secs: u64,

    /// Wait after the window closes before execution is allowed.
    #[serde(default = "default_execution_delay_secs")]
    pub execution_delay_secs: u64,

    /// Share of total supply (0–100) that must have voted.
    #[serde(default = "default_quorum_percentage")]
    pub quorum_percentage: u8,

    /// Share of counted votes (0–100) that must be For.
    #[serde(default = "default_majority_percentage")]
    pub majority_percentage: u8,

    /// Fixed at initialisation; not a governable parameter.
    #[serde(default)]
    pub vote_weight_policy: VoteWeightPolicy,
}

// ── Serde default helpers ──────────────────────────────────────────────

fn default_min_proposal_threshold() -> TokenAmount {
    TokenAmount::new(DEFAULT_MIN_PROPOSAL_THRESHOLD)
}

fn default_voting_period_secs() -> u64 {
    DEFAULT_VOTING_PERIOD_SECS
}

fn default_execution_delay_secs() -> u64 {
    DEFAULT_EXECUTION_DELAY_SECS
}

fn default_quorum_percentage() -> u8 {
    DEFAULT_QUORUM_PERCENTAGE
}

fn default_majority_percentage() -> u8 {
    DEFAULT_MAJORITY_PERCENTAGE
}

// ── Impl ───────────────────────────────────────────────────────────────

impl GovernanceConfig {
    pub fn validate(&self) -> Result<(), GovernanceError> {
        for param in ConfigParam::ALL {
            param
                .check(&self.value_of(param))
                .map_err(GovernanceError::InvalidConfig)?;
        }
        Ok(())
    }

    /// Current value of one of the configuration parameters.
    pub fn value_of(&self, param: ConfigParam) -> ParamValue {
        match param {
            ConfigParam::MinProposalThreshold => ParamValue::Amount(self.min_proposal_threshold),
            ConfigParam::VotingPeriod => ParamValue::Duration(self.voting_period_secs),
            ConfigParam::ExecutionDelay => ParamValue::Duration(self.execution_delay_secs),
            ConfigParam::QuorumPercentage => ParamValue::Percentage(self.quorum_percentage),
            ConfigParam::MajorityPercentage => ParamValue::Percentage(self.majority_percentage),
        }
    }

    /// The configuration as `(parameter name, value)` pairs.
    pub fn as_parameters(&self) -> Vec<(&'static str, ParamValue)> {
        ConfigParam::ALL
            .into_iter()
            .map(|p| (p.name(), self.value_of(p)))
            .collect()
    }

    /// Apply a parameter write to the configuration.
    pub fn apply(&mut self, param: ConfigParam, value: &ParamValue) -> Result<(), ExecutionError> {
        param.check(value).map_err(|reason| ExecutionError::InvalidParameter {
            name: param.name().to_string(),
            reason,
        })?;
        match (param, value) {
            (ConfigParam::MinProposalThreshold, ParamValue::Amount(a)) => {
                self.min_proposal_threshold = *a
            }
            (ConfigParam::VotingPeriod, ParamValue::Duration(s)) => self.voting_period_secs = *s,
            (ConfigParam::ExecutionDelay, ParamValue::Duration(s)) => {
                self.execution_delay_secs = *s
            }
            (ConfigParam::QuorumPercentage, ParamValue::Percentage(p)) => {
                self.quorum_percentage = *p
            }
            (ConfigParam::MajorityPercentage, ParamValue::Percentage(p)) => {
                self.majority_percentage = *p
            }
            // `check` above rejected every other combination.
            _ => {}
        }
        Ok(())
    }
}

impl Default for GovernanceConfig {
    fn default() -> Self {
        Self {
            min_proposal_threshold: default_min_proposal_threshold(),
            voting_period_secs: default_voting_period_secs(),
            execution_delay_secs: default_execution_delay_secs(),
            quorum_percentage: default_quorum_percentage(),
            majority_percentage: default_majority_percentage(),
            vote_weight_policy: VoteWeightPolicy::default(),
        }
    }
}
