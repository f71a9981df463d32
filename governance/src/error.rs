use agora_store::StoreError;
use agora_types::{PrincipalId, ProposalId, Timestamp};
use thiserror::Error;

use crate::ledger::LedgerError;
use crate::oracle::OracleError;
use crate::proposal::{ProposalKind, ProposalStatus};

/// Broad classification callers use to decide what to tell the user.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ErrorClass {
    /// The action is not valid in the current state; retrying unchanged will fail again.
    Precondition,
    /// A collaborator failed; the same call may succeed later.
    Infrastructure,
}

#[derive(Debug, Error)]
pub enum GovernanceError {
    #[error("insufficient stake: need {required}, have {available}")]
    InsufficientStake { required: u128, available: u128 },

    #[error("invalid proposal: {0}")]
    InvalidProposal(String),

    #[error("invalid vote: {0}")]
    InvalidVote(String),

    #[error("invalid payload for {kind:?} proposal: {reason}")]
    InvalidPayload { kind: ProposalKind, reason: String },

    #[error("invalid governance configuration: {0}")]
    InvalidConfig(String),

    #[error("proposal {0} not found")]
    ProposalNotFound(ProposalId),

    #[error("no vote by {voter} on proposal {proposal}")]
    VoteNotFound {
        proposal: ProposalId,
        voter: PrincipalId,
    },

    #[error("parameter {0} not found")]
    ParameterNotFound(String),

    #[error("proposal {id} is not accepting votes (status {status:?}, window {start}..={end})")]
    ProposalNotActive {
        id: ProposalId,
        status: ProposalStatus,
        start: Timestamp,
        end: Timestamp,
    },

    #[error("{0} has no voting power")]
    NoVotingPower(PrincipalId),

    #[error("execution delay not elapsed: executable at {executable_at}")]
    ExecutionDelayNotElapsed { executable_at: Timestamp },

    #[error("proposal {0} already executed")]
    AlreadyExecuted(ProposalId),

    #[error("illegal status transition {from:?} -> {to:?}")]
    IllegalTransition {
        from: ProposalStatus,
        to: ProposalStatus,
    },

    #[error("execution failed: {0}")]
    ExecutionFailed(#[from] ExecutionError),

    #[error("tally arithmetic overflow")]
    TallyOverflow,

    #[error("balance oracle unavailable: {0}")]
    OracleUnavailable(#[from] OracleError),

    #[error("ledger commit failed: {0}")]
    LedgerCommitFailed(#[from] LedgerError),

    #[error("store error: {0}")]
    Store(#[from] StoreError),

    #[error("codec error: {0}")]
    Codec(String),
}

impl GovernanceError {
    pub fn class(&self) -> ErrorClass {
        match self {
            Self::ExecutionFailed(ExecutionError::Handler(_))
            | Self::OracleUnavailable(_)
            | Self::LedgerCommitFailed(_)
            | Self::Store(_)
            | Self::Codec(_) => ErrorClass::Infrastructure,
            _ => ErrorClass::Precondition,
        }
    }

    /// Whether retrying the same call later can succeed without anything else changing.
    pub fn is_retryable(&self) -> bool {
        self.class() == ErrorClass::Infrastructure
    }
}

/// Failure of an effect handler or of decoding the proposal payload at dispatch time.
#[derive(Debug, Error)]
pub enum ExecutionError {
    #[error("payload decode failed: {0}")]
    Decode(String),

    #[error("payload is a {found:?} action but the proposal is {expected:?}")]
    KindMismatch {
        expected: ProposalKind,
        found: ProposalKind,
    },

    #[error("no effect handler registered for {0:?}")]
    NoHandler(ProposalKind),

    #[error("invalid value for parameter {name}: {reason}")]
    InvalidParameter { name: String, reason: String },

    #[error("effect handler failed: {0}")]
    Handler(String),
}
