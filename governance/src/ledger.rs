//! Ledger submitter: durable, ordered commit of governance state transitions.
//!
//! Every mutation is described as a [`StateDelta`] and committed here before
//! the engine writes its own store or reports success.

use std::sync::Arc;

use agora_types::{ProposalId, Timestamp};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::config::GovernanceConfig;
use crate::evaluation::RejectionReason;
use crate::params::ParameterRecord;
use crate::proposal::{Proposal, ProposalStatus};
use crate::tally::{Tally, Vote};

/// One governance state transition.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum StateDelta {
    Initialized {
        config: GovernanceConfig,
        parameters: Vec<ParameterRecord>,
    },
    ProposalCreated {
        proposal: Proposal,
    },
    VoteRecorded {
        vote: Vote,
        previous: Option<Vote>,
        tally: Tally,
    },
    ProposalRejected {
        id: ProposalId,
        status: ProposalStatus,
        reason: RejectionReason,
        evaluated_at: Timestamp,
    },
    /// An external effect handler is about to run for a passed proposal.
    EffectClaimed {
        id: ProposalId,
        claimed_at: Timestamp,
    },
    /// The handler reported failure, so the claim is withdrawn and a later
    /// evaluation starts over.
    EffectReleased {
        id: ProposalId,
        released_at: Timestamp,
        reason: String,
    },
    ProposalExecuted {
        id: ProposalId,
        executed_at: Timestamp,
        parameters: Vec<ParameterRecord>,
        config: Option<GovernanceConfig>,
    },
}

impl StateDelta {
    /// Short event name, used in logs.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Initialized { .. } => "initialized",
            Self::ProposalCreated { .. } => "proposal_created",
            Self::VoteRecorded { .. } => "vote_cast",
            Self::ProposalRejected { .. } => "proposal_rejected",
            Self::EffectClaimed { .. } => "effect_claimed",
            Self::EffectReleased { .. } => "effect_released",
            Self::ProposalExecuted { .. } => "proposal_executed",
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommitReceipt {
    /// Position of the delta in the ledger's total order.
    pub sequence: u64,
}

#[derive(Debug, Error)]
pub enum LedgerError {
    #[error("ledger unavailable: {0}")]
    Unavailable(String),

    #[error("ledger rejected delta: {0}")]
    Rejected(String),
}

pub trait LedgerSubmitter: Send + Sync {
    fn commit(&self, delta: &StateDelta) -> Result<CommitReceipt, LedgerError>;
}

impl<T: LedgerSubmitter + ?Sized> LedgerSubmitter for Arc<T> {
    fn commit(&self, delta: &StateDelta) -> Result<CommitReceipt, LedgerError> {
        (**self).commit(delta)
    }
}
