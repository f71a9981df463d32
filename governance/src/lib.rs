//! Token-weighted governance for the Agora platform.
//!
//! Proposals pass through a fixed lifecycle: creation (gated by a minimum
//! balance), a voting window in which holders cast or revise weighted votes,
//! an execution delay, then a single evaluation of quorum and majority. A
//! passing proposal is dispatched to its effect exactly once.
//!
//! Key principle: one token = one unit of vote weight, read from an external
//! balance oracle. All governance parameters, including the thresholds that
//! govern this process, change only through executed ParameterChange proposals.

mod codec;
pub mod config;
pub mod dispatcher;
pub mod engine;
pub mod error;
pub mod evaluation;
pub mod ledger;
mod locks;
pub mod oracle;
pub mod params;
pub mod proposal;
pub mod tally;

pub use config::{GovernanceConfig, VoteWeightPolicy};
pub use dispatcher::{EffectHandler, ExecutionDispatcher, ExecutionEffects, ExecutionPlan};
pub use engine::{ExecutionOutcome, GovernanceEngine};
pub use error::{ErrorClass, ExecutionError, GovernanceError};
pub use evaluation::{RejectionReason, Verdict, VoteSummary};
pub use ledger::{CommitReceipt, LedgerError, LedgerSubmitter, StateDelta};
pub use oracle::{BalanceOracle, OracleError};
pub use params::{
    check_parameter_name, ConfigParam, ParamValue, ParameterRecord, ParameterStore,
    StagedParameters, MAX_PARAMETER_NAME_LEN,
};
pub use proposal::{
    NewProposal, ParameterUpdate, Proposal, ProposalAction, ProposalKind, ProposalStatus,
};
pub use tally::{Tally, Vote, VoteChoice, VoteReceipt};
