//! Nullable store: thread-safe in-memory governance storage for testing.
//!
//! All tables live behind one mutex so a [`WriteSet`] is applied atomically,
//! matching what a single LMDB write transaction gives the real store.

use agora_store::{GovernanceStore, StoreError, WriteOp, WriteSet};
use agora_types::{PrincipalId, ProposalId};
use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;

#[derive(Default)]
struct Tables {
    /// id → (creation sequence, encoded proposal)
    proposals: HashMap<ProposalId, (u64, Vec<u8>)>,
    votes: BTreeMap<(ProposalId, String), Vec<u8>>,
    parameters: BTreeMap<String, Vec<u8>>,
    history: HashMap<String, Vec<Vec<u8>>>,
    config: Option<Vec<u8>>,
    sequence: u64,
}

/// An in-memory governance store for testing.
pub struct NullGovernanceStore {
    tables: Mutex<Tables>,
    fail_commits: AtomicBool,
    /// Commits still allowed before `fail_commits` switches on; `usize::MAX` when unarmed.
    fail_after: AtomicUsize,
    commits: AtomicUsize,
}

impl NullGovernanceStore {
    pub fn new() -> Self {
        Self {
            tables: Mutex::new(Tables::default()),
            fail_commits: AtomicBool::new(false),
            fail_after: AtomicUsize::new(usize::MAX),
            commits: AtomicUsize::new(0),
        }
    }

    /// Make every following `commit` fail with a backend error.
    pub fn set_failing(&self, failing: bool) {
        self.fail_after.store(usize::MAX, Ordering::SeqCst);
        self.fail_commits.store(failing, Ordering::SeqCst);
    }

    /// Let `commits` more commits succeed, then fail every following one.
    pub fn set_failing_after(&self, commits: usize) {
        self.fail_commits.store(false, Ordering::SeqCst);
        self.fail_after.store(commits, Ordering::SeqCst);
    }

    /// Number of successful commits so far.
    pub fn commit_count(&self) -> usize {
        self.commits.load(Ordering::SeqCst)
    }

    pub fn proposal_count(&self) -> usize {
        self.tables.lock().unwrap().proposals.len()
    }

    pub fn vote_count(&self) -> usize {
        self.tables.lock().unwrap().votes.len()
    }
}

impl Default for NullGovernanceStore {
    fn default() -> Self {
        Self::new()
    }
}

impl GovernanceStore for NullGovernanceStore {
    fn get_proposal(&self, id: &ProposalId) -> Result<Vec<u8>, StoreError> {
        self.tables
            .lock()
            .unwrap()
            .proposals
            .get(id)
            .map(|(_, data)| data.clone())
            .ok_or_else(|| StoreError::NotFound(format!("proposal {id}")))
    }

    fn list_proposals(&self) -> Result<Vec<Vec<u8>>, StoreError> {
        let tables = self.tables.lock().unwrap();
        let mut entries: Vec<_> = tables.proposals.values().collect();
        entries.sort_by_key(|(seq, _)| *seq);
        Ok(entries.into_iter().map(|(_, data)| data.clone()).collect())
    }

    fn get_vote(&self, proposal: &ProposalId, voter: &PrincipalId) -> Result<Vec<u8>, StoreError> {
        self.tables
            .lock()
            .unwrap()
            .votes
            .get(&(*proposal, voter.as_str().to_string()))
            .cloned()
            .ok_or_else(|| StoreError::NotFound(format!("vote of {voter} on {proposal}")))
    }

    fn get_votes(&self, proposal: &ProposalId) -> Result<Vec<Vec<u8>>, StoreError> {
        Ok(self
            .tables
            .lock()
            .unwrap()
            .votes
            .iter()
            .filter(|((id, _), _)| id == proposal)
            .map(|(_, data)| data.clone())
            .collect())
    }

    fn get_parameter(&self, name: &str) -> Result<Vec<u8>, StoreError> {
        self.tables
            .lock()
            .unwrap()
            .parameters
            .get(name)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(format!("parameter {name}")))
    }

    fn list_parameters(&self) -> Result<Vec<(String, Vec<u8>)>, StoreError> {
        Ok(self
            .tables
            .lock()
            .unwrap()
            .parameters
            .iter()
            .map(|(name, data)| (name.clone(), data.clone()))
            .collect())
    }

    fn get_parameter_history(&self, name: &str) -> Result<Vec<Vec<u8>>, StoreError> {
        Ok(self
            .tables
            .lock()
            .unwrap()
            .history
            .get(name)
            .cloned()
            .unwrap_or_default())
    }

    fn get_config(&self) -> Result<Option<Vec<u8>>, StoreError> {
        Ok(self.tables.lock().unwrap().config.clone())
    }

    fn next_sequence(&self) -> Result<u64, StoreError> {
        let mut tables = self.tables.lock().unwrap();
        tables.sequence += 1;
        Ok(tables.sequence)
    }

    fn commit(&self, batch: &WriteSet) -> Result<(), StoreError> {
        let remaining = self.fail_after.load(Ordering::SeqCst);
        if remaining == 0 {
            self.fail_commits.store(true, Ordering::SeqCst);
        } else if remaining != usize::MAX {
            self.fail_after.store(remaining - 1, Ordering::SeqCst);
        }
        if self.fail_commits.load(Ordering::SeqCst) {
            return Err(StoreError::Backend("null store set to fail".to_string()));
        }
        let mut tables = self.tables.lock().unwrap();
        for op in batch.ops() {
            match op {
                WriteOp::PutProposal { id, seq, data } => {
                    tables.proposals.insert(*id, (*seq, data.clone()));
                }
                WriteOp::PutVote { proposal, voter, data } => {
                    tables
                        .votes
                        .insert((*proposal, voter.as_str().to_string()), data.clone());
                }
                WriteOp::PutParameter { name, data } => {
                    tables.parameters.insert(name.clone(), data.clone());
                }
                WriteOp::AppendParameterHistory { name, data } => {
                    tables.history.entry(name.clone()).or_default().push(data.clone());
                }
                WriteOp::PutConfig { data } => {
                    tables.config = Some(data.clone());
                }
            }
        }
        self.commits.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn commit_applies_every_op() {
        let store = NullGovernanceStore::new();
        let id = ProposalId::new([1; 32]);
        let mut batch = WriteSet::new();
        batch
            .push(WriteOp::PutProposal { id, seq: 1, data: vec![1] })
            .push(WriteOp::PutVote {
                proposal: id,
                voter: PrincipalId::new("alice"),
                data: vec![2],
            })
            .push(WriteOp::AppendParameterHistory { name: "fee".into(), data: vec![3] })
            .push(WriteOp::AppendParameterHistory { name: "fee".into(), data: vec![4] });
        store.commit(&batch).unwrap();

        assert_eq!(store.get_proposal(&id).unwrap(), vec![1]);
        assert_eq!(store.get_vote(&id, &PrincipalId::new("alice")).unwrap(), vec![2]);
        assert_eq!(store.get_parameter_history("fee").unwrap(), vec![vec![3], vec![4]]);
        assert_eq!(store.commit_count(), 1);
    }

    #[test]
    fn failing_store_applies_nothing() {
        let store = NullGovernanceStore::new();
        store.set_failing(true);
        let mut batch = WriteSet::new();
        batch.push(WriteOp::PutConfig { data: vec![9] });
        assert!(store.commit(&batch).is_err());
        assert_eq!(store.get_config().unwrap(), None);
    }

    #[test]
    fn failing_after_lets_the_given_commits_through() {
        let store = NullGovernanceStore::new();
        let mut batch = WriteSet::new();
        batch.push(WriteOp::PutConfig { data: vec![1] });
        store.set_failing_after(1);
        assert!(store.commit(&batch).is_ok());
        assert!(store.commit(&batch).is_err());
        assert!(store.commit(&batch).is_err());
        store.set_failing(false);
        assert!(store.commit(&batch).is_ok());
        assert_eq!(store.commit_count(), 2);
    }

    #[test]
    fn proposals_list_in_sequence_order() {
        let store = NullGovernanceStore::new();
        let mut batch = WriteSet::new();
        batch
            .push(WriteOp::PutProposal { id: ProposalId::new([9; 32]), seq: 2, data: vec![2] })
            .push(WriteOp::PutProposal { id: ProposalId::new([1; 32]), seq: 1, data: vec![1] });
        store.commit(&batch).unwrap();
        assert_eq!(store.list_proposals().unwrap(), vec![vec![1], vec![2]]);
        assert_eq!(store.next_sequence().unwrap(), 1);
        assert_eq!(store.next_sequence().unwrap(), 2);
    }
}
