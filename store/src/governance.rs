//! Governance storage trait.
//!
//! Logical layout:
//! - proposals keyed by [`ProposalId`], listed in creation-sequence order
//! - votes keyed by `(ProposalId, PrincipalId)`
//! - parameters keyed by name, each with an append-only history
//! - the governance configuration as a singleton
//! - a monotonically increasing sequence counter

use crate::StoreError;
use agora_types::{PrincipalId, ProposalId};

/// One mutation inside a [`WriteSet`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum WriteOp {
    /// Insert or replace a proposal. `seq` orders proposals for listing and
    /// must be the value the proposal was created with.
    PutProposal { id: ProposalId, seq: u64, data: Vec<u8> },
    /// Insert or replace the single live vote of `voter` on `proposal`.
    PutVote {
        proposal: ProposalId,
        voter: PrincipalId,
        data: Vec<u8>,
    },
    /// Insert or replace the current value of a parameter.
    PutParameter { name: String, data: Vec<u8> },
    /// Append one entry to a parameter's history.
    AppendParameterHistory { name: String, data: Vec<u8> },
    /// Replace the configuration singleton.
    PutConfig { data: Vec<u8> },
}

/// A batch of mutations applied all-or-nothing by [`GovernanceStore::commit`].
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct WriteSet {
    ops: Vec<WriteOp>,
}

impl WriteSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, op: WriteOp) -> &mut Self {
        self.ops.push(op);
        self
    }

    pub fn ops(&self) -> &[WriteOp] {
        &self.ops
    }

    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }

    pub fn len(&self) -> usize {
        self.ops.len()
    }
}

/// Trait for storing governance state (proposals, votes, parameters, config).
///
/// Single-key reads see the result of every committed [`WriteSet`] in full or
/// not at all.
pub trait GovernanceStore: Send + Sync {
    /// Get a proposal by ID.
    fn get_proposal(&self, id: &ProposalId) -> Result<Vec<u8>, StoreError>;

    /// All proposals, oldest first.
    fn list_proposals(&self) -> Result<Vec<Vec<u8>>, StoreError>;

    /// Get a specific voter's live vote on a proposal.
    fn get_vote(&self, proposal: &ProposalId, voter: &PrincipalId) -> Result<Vec<u8>, StoreError>;

    /// Get all live votes for a proposal.
    fn get_votes(&self, proposal: &ProposalId) -> Result<Vec<Vec<u8>>, StoreError>;

    /// Get the current value of a parameter.
    fn get_parameter(&self, name: &str) -> Result<Vec<u8>, StoreError>;

    /// All parameters, ordered by name.
    fn list_parameters(&self) -> Result<Vec<(String, Vec<u8>)>, StoreError>;

    /// A parameter's history, oldest first. Empty if the parameter never changed.
    fn get_parameter_history(&self, name: &str) -> Result<Vec<Vec<u8>>, StoreError>;

    /// The configuration singleton, `None` before initialisation.
    fn get_config(&self) -> Result<Option<Vec<u8>>, StoreError>;

    /// Atomically reserve and return the next sequence number (starting at 1).
    fn next_sequence(&self) -> Result<u64, StoreError>;

    /// Apply every operation of `batch` atomically.
    fn commit(&self, batch: &WriteSet) -> Result<(), StoreError>;
}

impl<T: GovernanceStore + ?Sized> GovernanceStore for std::sync::Arc<T> {
    fn get_proposal(&self, id: &ProposalId) -> Result<Vec<u8>, StoreError> {
        (**self).get_proposal(id)
    }

    fn list_proposals(&self) -> Result<Vec<Vec<u8>>, StoreError> {
        (**self).list_proposals()
    }

    fn get_vote(&self, proposal: &ProposalId, voter: &PrincipalId) -> Result<Vec<u8>, StoreError> {
        (**self).get_vote(proposal, voter)
    }

    fn get_votes(&self, proposal: &ProposalId) -> Result<Vec<Vec<u8>>, StoreError> {
        (**self).get_votes(proposal)
    }

    fn get_parameter(&self, name: &str) -> Result<Vec<u8>, StoreError> {
        (**self).get_parameter(name)
    }

    fn list_parameters(&self) -> Result<Vec<(String, Vec<u8>)>, StoreError> {
        (**self).list_parameters()
    }

    fn get_parameter_history(&self, name: &str) -> Result<Vec<Vec<u8>>, StoreError> {
        (**self).get_parameter_history(name)
    }

    fn get_config(&self) -> Result<Option<Vec<u8>>, StoreError> {
        (**self).get_config()
    }

    fn next_sequence(&self) -> Result<u64, StoreError> {
        (**self).next_sequence()
    }

    fn commit(&self, batch: &WriteSet) -> Result<(), StoreError> {
        (**self).commit(batch)
    }
}
