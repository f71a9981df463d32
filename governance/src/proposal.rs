//! Governance proposals and their lifecycle.

use std::fmt;
use std::str::FromStr;

use agora_types::{PrincipalId, ProposalId, Timestamp, TokenAmount};
use serde::{Deserialize, Serialize};

use crate::error::{ExecutionError, GovernanceError};
use crate::params::ParamValue;
use crate::tally::Tally;

/// What kind of change a proposal makes.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ProposalKind {
    ParameterChange,
    ContractUpgrade,
    FundsAllocation,
    ServiceUpdate,
}

impl ProposalKind {
    pub const ALL: [Self; 4] = [
        Self::ParameterChange,
        Self::ContractUpgrade,
        Self::FundsAllocation,
        Self::ServiceUpdate,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ParameterChange => "parameter_change",
            Self::ContractUpgrade => "contract_upgrade",
            Self::FundsAllocation => "funds_allocation",
            Self::ServiceUpdate => "service_update",
        }
    }
}

impl fmt::Display for ProposalKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ProposalKind {
    type Err = GovernanceError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|k| k.as_str() == s)
            .ok_or_else(|| GovernanceError::InvalidProposal(format!("unknown proposal kind {s:?}")))
    }
}

/// Lifecycle status of a proposal.
///
/// Active → {FailedQuorum, Rejected, Executed}. FailedQuorum and Rejected may
/// be evaluated again and move to any of the three outcomes; Executed is terminal.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ProposalStatus {
    /// Created; accepting votes inside its window, evaluable after the delay.
    Active,
    /// Last evaluation found participation below quorum.
    FailedQuorum,
    /// Last evaluation met quorum but not the majority.
    Rejected,
    /// Dispatched successfully. Terminal.
    Executed,
}

impl ProposalStatus {
    pub const ALL: [Self; 4] = [Self::Active, Self::FailedQuorum, Self::Rejected, Self::Executed];

    /// The transition table. Nothing ever returns to `Active`, and `Executed`
    /// has no outgoing edges. Failed evaluations stay re-evaluable.
    pub fn can_transition_to(self, next: ProposalStatus) -> bool {
        use ProposalStatus::*;
        matches!(
            (self, next),
            (Active | FailedQuorum | Rejected, FailedQuorum | Rejected | Executed)
        )
    }

    pub fn is_terminal(self) -> bool {
        Self::ALL.into_iter().all(|next| !self.can_transition_to(next))
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::FailedQuorum => "failed_quorum",
            Self::Rejected => "rejected",
            Self::Executed => "executed",
        }
    }
}

impl fmt::Display for ProposalStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ProposalStatus {
    type Err = GovernanceError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|k| k.as_str() == s)
            .ok_or_else(|| GovernanceError::InvalidProposal(format!("unknown proposal status {s:?}")))
    }
}

/// A governance proposal.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Proposal {
    pub id: ProposalId,
    /// Store-issued creation sequence; orders listings.
    pub seq: u64,
    pub creator: PrincipalId,
    pub title: String,
    pub description: String,
    pub kind: ProposalKind,
    /// Encoded [`ProposalAction`], decoded again at dispatch time.
    pub payload: Vec<u8>,
    pub voting_start: Timestamp,
    pub voting_end: Timestamp,
    pub status: ProposalStatus,
    pub tally: Tally,
    pub executed: bool,
    pub execution_time: Option<Timestamp>,
    /// Set once an external effect handler is about to run for this proposal.
    /// While set, the passing verdict stands and the handler is not invoked again.
    pub effect_claimed_at: Option<Timestamp>,
}

impl Proposal {
    /// Whether a vote cast at `now` is accepted. Both window bounds are inclusive.
    pub fn is_open_at(&self, now: Timestamp) -> bool {
        self.status == ProposalStatus::Active && now >= self.voting_start && now <= self.voting_end
    }

    /// First moment at which the proposal may be evaluated.
    pub fn executable_at(&self, execution_delay_secs: u64) -> Timestamp {
        self.voting_end.saturating_add_secs(execution_delay_secs)
    }

    /// Move to `next`, enforcing the transition table.
    pub fn transition(&mut self, next: ProposalStatus) -> Result<(), GovernanceError> {
        if !self.status.can_transition_to(next) {
            return Err(GovernanceError::IllegalTransition {
                from: self.status,
                to: next,
            });
        }
        self.status = next;
        Ok(())
    }

    pub fn action(&self) -> Result<ProposalAction, ExecutionError> {
        ProposalAction::decode(self.kind, &self.payload)
    }
}

/// One `(name, value)` pair of a ParameterChange proposal.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParameterUpdate {
    pub name: String,
    pub value: ParamValue,
}

/// The typed payload of a proposal, one variant per [`ProposalKind`].
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum ProposalAction {
    ParameterChange {
        updates: Vec<ParameterUpdate>,
    },
    ContractUpgrade {
        contract: String,
        /// Hash of the new code, as reported by the ledger network.
        code_hash: [u8; 32],
    },
    FundsAllocation {
        recipient: PrincipalId,
        amount: TokenAmount,
        memo: String,
    },
    ServiceUpdate {
        service: String,
        changes: Vec<(String, String)>,
    },
}

impl ProposalAction {
    pub fn kind(&self) -> ProposalKind {
        match self {
            Self::ParameterChange { .. } => ProposalKind::ParameterChange,
            Self::ContractUpgrade { .. } => ProposalKind::ContractUpgrade,
            Self::FundsAllocation { .. } => ProposalKind::FundsAllocation,
            Self::ServiceUpdate { .. } => ProposalKind::ServiceUpdate,
        }
    }

    pub fn encode(&self) -> Result<Vec<u8>, GovernanceError> {
        crate::codec::encode(self)
    }

    /// Decode a payload stored on a proposal of kind `expected`.
    pub fn decode(expected: ProposalKind, bytes: &[u8]) -> Result<Self, ExecutionError> {
        let action: Self =
            bincode::deserialize(bytes).map_err(|e| ExecutionError::Decode(e.to_string()))?;
        if action.kind() != expected {
            return Err(ExecutionError::KindMismatch {
                expected,
                found: action.kind(),
            });
        }
        Ok(action)
    }

    /// Structural checks done at submission time.
    pub fn validate(&self) -> Result<(), String> {
        match self {
            Self::ParameterChange { updates } => {
                if updates.is_empty() {
                    return Err("parameter change without updates".to_string());
                }
                let mut seen = std::collections::HashSet::new();
                for update in updates {
                    crate::params::check_parameter_name(&update.name)?;
                    if !seen.insert(update.name.as_str()) {
                        return Err(format!("parameter {} updated twice", update.name));
                    }
                    if let Some(param) = crate::params::ConfigParam::from_name(&update.name) {
                        param.check(&update.value)?;
                    }
                }
                Ok(())
            }
            Self::ContractUpgrade { contract, .. } if contract.trim().is_empty() => {
                Err("empty contract name".to_string())
            }
            Self::FundsAllocation { amount, .. } if amount.is_zero() => {
                Err("zero allocation".to_string())
            }
            Self::ServiceUpdate { service, changes } => {
                if service.trim().is_empty() {
                    Err("empty service name".to_string())
                } else if changes.is_empty() {
                    Err("service update without changes".to_string())
                } else {
                    Ok(())
                }
            }
            _ => Ok(()),
        }
    }
}

/// Input to [`GovernanceEngine::create_proposal`](crate::GovernanceEngine::create_proposal).
#[derive(Clone, Debug)]
pub struct NewProposal {
    pub creator: PrincipalId,
    pub title: String,
    pub description: String,
    pub kind: ProposalKind,
    pub payload: Vec<u8>,
}

impl NewProposal {
    /// Build a submission from a typed action.
    pub fn new(
        creator: PrincipalId,
        title: impl Into<String>,
        description: impl Into<String>,
        action: &ProposalAction,
    ) -> Result<Self, GovernanceError> {
        Ok(Self {
            creator,
            title: title.into(),
            description: description.into(),
            kind: action.kind(),
            payload: action.encode()?,
        })
    }
}
