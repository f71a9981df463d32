//! LMDB implementation of GovernanceStore.
//!
//! Key formats:
//! - votes: `proposal_id (32) ++ voter.as_bytes()`, so a proposal's votes
//!   are one prefix scan
//! - parameter history: `len(name) (u32 BE) ++ name ++ index (u64 BE)`, so
//!   entries scan oldest first and one name's prefix never covers another's
//! - proposal order: `seq (u64 BE)` → proposal id

use std::sync::Arc;

use heed::types::Bytes;
use heed::{Database, Env, RwTxn};

use agora_store::{GovernanceStore, StoreError, WriteOp, WriteSet};
use agora_types::{PrincipalId, ProposalId};

use crate::LmdbError;

const CONFIG_KEY: &[u8] = b"governance_config";
const SEQUENCE_KEY: &[u8] = b"proposal_seq";

pub struct LmdbGovernanceStore {
    pub(crate) env: Arc<Env>,
    pub(crate) proposals_db: Database<Bytes, Bytes>,
    pub(crate) proposal_order_db: Database<Bytes, Bytes>,
    pub(crate) votes_db: Database<Bytes, Bytes>,
    pub(crate) parameters_db: Database<Bytes, Bytes>,
    pub(crate) parameter_history_db: Database<Bytes, Bytes>,
    pub(crate) meta_db: Database<Bytes, Bytes>,
}

/// Build the binary composite key `proposal_id ++ voter_bytes`.
fn vote_key(proposal: &ProposalId, voter: &PrincipalId) -> Vec<u8> {
    let voter = voter.as_str().as_bytes();
    let mut key = Vec::with_capacity(32 + voter.len());
    key.extend_from_slice(proposal.as_bytes());
    key.extend_from_slice(voter);
    key
}

fn history_prefix(name: &str) -> Result<Vec<u8>, LmdbError> {
    let len = u32::try_from(name.len())
        .map_err(|_| LmdbError::Serialization(format!("parameter name of {} bytes", name.len())))?;
    let mut prefix = Vec::with_capacity(4 + name.len() + 8);
    prefix.extend_from_slice(&len.to_be_bytes());
    prefix.extend_from_slice(name.as_bytes());
    Ok(prefix)
}

fn decode_u64(bytes: &[u8], what: &str) -> Result<u64, LmdbError> {
    let arr: [u8; 8] = bytes
        .try_into()
        .map_err(|_| LmdbError::Corruption(format!("{what} has unexpected byte length")))?;
    Ok(u64::from_be_bytes(arr))
}

impl LmdbGovernanceStore {
    fn apply(&self, wtxn: &mut RwTxn<'_>, op: &WriteOp) -> Result<(), LmdbError> {
        match op {
            WriteOp::PutProposal { id, seq, data } => {
                self.proposals_db.put(wtxn, id.as_bytes(), data)?;
                self.proposal_order_db
                    .put(wtxn, &seq.to_be_bytes(), id.as_bytes())?;
            }
            WriteOp::PutVote {
                proposal,
                voter,
                data,
            } => {
                self.votes_db.put(wtxn, &vote_key(proposal, voter), data)?;
            }
            WriteOp::PutParameter { name, data } => {
                self.parameters_db.put(wtxn, name.as_bytes(), data)?;
            }
            WriteOp::AppendParameterHistory { name, data } => {
                let mut key = history_prefix(name)?;
                // Counted inside the write transaction, so appends earlier in
                // the same batch are included.
                let index = self
                    .parameter_history_db
                    .prefix_iter(wtxn, &key)?
                    .count() as u64;
                key.extend_from_slice(&index.to_be_bytes());
                self.parameter_history_db.put(wtxn, &key, data)?;
            }
            WriteOp::PutConfig { data } => {
                self.meta_db.put(wtxn, CONFIG_KEY, data)?;
            }
        }
        Ok(())
    }
}

impl GovernanceStore for LmdbGovernanceStore {
    fn get_proposal(&self, id: &ProposalId) -> Result<Vec<u8>, StoreError> {
        let rtxn = self.env.read_txn().map_err(LmdbError::from)?;
        let val = self
            .proposals_db
            .get(&rtxn, id.as_bytes())
            .map_err(LmdbError::from)?
            .ok_or_else(|| LmdbError::NotFound(format!("proposal {id}")))?;
        Ok(val.to_vec())
    }

    fn list_proposals(&self) -> Result<Vec<Vec<u8>>, StoreError> {
        let rtxn = self.env.read_txn().map_err(LmdbError::from)?;
        let mut results = Vec::new();
        for entry in self.proposal_order_db.iter(&rtxn).map_err(LmdbError::from)? {
            let (seq, id) = entry.map_err(LmdbError::from)?;
            let val = self
                .proposals_db
                .get(&rtxn, id)
                .map_err(LmdbError::from)?
                .ok_or_else(|| {
                    LmdbError::Corruption(format!(
                        "proposal order entry {} points at a missing proposal",
                        decode_u64(seq, "proposal order key").unwrap_or_default()
                    ))
                })?;
            results.push(val.to_vec());
        }
        Ok(results)
    }

    fn get_vote(&self, proposal: &ProposalId, voter: &PrincipalId) -> Result<Vec<u8>, StoreError> {
        let rtxn = self.env.read_txn().map_err(LmdbError::from)?;
        let val = self
            .votes_db
            .get(&rtxn, &vote_key(proposal, voter))
            .map_err(LmdbError::from)?
            .ok_or_else(|| LmdbError::NotFound(format!("vote of {voter} on {proposal}")))?;
        Ok(val.to_vec())
    }

    fn get_votes(&self, proposal: &ProposalId) -> Result<Vec<Vec<u8>>, StoreError> {
        let rtxn = self.env.read_txn().map_err(LmdbError::from)?;
        let iter = self
            .votes_db
            .prefix_iter(&rtxn, proposal.as_bytes())
            .map_err(LmdbError::from)?;
        let mut results = Vec::new();
        for entry in iter {
            let (_key, val) = entry.map_err(LmdbError::from)?;
            results.push(val.to_vec());
        }
        Ok(results)
    }

    fn get_parameter(&self, name: &str) -> Result<Vec<u8>, StoreError> {
        let rtxn = self.env.read_txn().map_err(LmdbError::from)?;
        let val = self
            .parameters_db
            .get(&rtxn, name.as_bytes())
            .map_err(LmdbError::from)?
            .ok_or_else(|| LmdbError::NotFound(format!("parameter {name}")))?;
        Ok(val.to_vec())
    }

    fn list_parameters(&self) -> Result<Vec<(String, Vec<u8>)>, StoreError> {
        let rtxn = self.env.read_txn().map_err(LmdbError::from)?;
        let mut results = Vec::new();
        for entry in self.parameters_db.iter(&rtxn).map_err(LmdbError::from)? {
            let (key, val) = entry.map_err(LmdbError::from)?;
            let name = String::from_utf8(key.to_vec())
                .map_err(|e| LmdbError::Corruption(format!("parameter name: {e}")))?;
            results.push((name, val.to_vec()));
        }
        Ok(results)
    }

    fn get_parameter_history(&self, name: &str) -> Result<Vec<Vec<u8>>, StoreError> {
        let prefix = history_prefix(name)?;
        let rtxn = self.env.read_txn().map_err(LmdbError::from)?;
        let iter = self
            .parameter_history_db
            .prefix_iter(&rtxn, &prefix)
            .map_err(LmdbError::from)?;
        let mut results = Vec::new();
        for entry in iter {
            let (_key, val) = entry.map_err(LmdbError::from)?;
            results.push(val.to_vec());
        }
        Ok(results)
    }

    fn get_config(&self) -> Result<Option<Vec<u8>>, StoreError> {
        let rtxn = self.env.read_txn().map_err(LmdbError::from)?;
        let val = self.meta_db.get(&rtxn, CONFIG_KEY).map_err(LmdbError::from)?;
        Ok(val.map(|v| v.to_vec()))
    }

    fn next_sequence(&self) -> Result<u64, StoreError> {
        let mut wtxn = self.env.write_txn().map_err(LmdbError::from)?;
        let current = match self.meta_db.get(&wtxn, SEQUENCE_KEY).map_err(LmdbError::from)? {
            Some(bytes) => decode_u64(bytes, "proposal sequence")?,
            None => 0,
        };
        let next = current + 1;
        self.meta_db
            .put(&mut wtxn, SEQUENCE_KEY, &next.to_be_bytes())
            .map_err(LmdbError::from)?;
        wtxn.commit().map_err(LmdbError::from)?;
        Ok(next)
    }

    fn commit(&self, batch: &WriteSet) -> Result<(), StoreError> {
        let mut wtxn = self.env.write_txn().map_err(LmdbError::from)?;
        for op in batch.ops() {
            self.apply(&mut wtxn, op)?;
        }
        wtxn.commit().map_err(LmdbError::from)?;
        tracing::trace!(ops = batch.len(), "governance batch committed");
        Ok(())
    }
}
