//! LMDB environment setup.

use std::path::Path;
use std::sync::Arc;

use heed::types::Bytes;
use heed::{Database, Env, EnvOpenOptions};

use crate::governance::LmdbGovernanceStore;
use crate::migration::Migrator;
use crate::LmdbError;

/// Default map size: 1 GiB.
pub const DEFAULT_MAP_SIZE: usize = 1 << 30;

const MAX_DBS: u32 = 8;

/// Wraps the LMDB environment and all database handles.
pub struct LmdbEnvironment {
    env: Arc<Env>,
    /// proposal id (32) → encoded proposal
    proposals_db: Database<Bytes, Bytes>,
    /// creation sequence (u64 BE) → proposal id
    proposal_order_db: Database<Bytes, Bytes>,
    /// proposal id (32) ++ voter → encoded vote
    votes_db: Database<Bytes, Bytes>,
    /// parameter name → encoded current record
    parameters_db: Database<Bytes, Bytes>,
    /// parameter name ++ 0x00 ++ index (u64 BE) → encoded record
    parameter_history_db: Database<Bytes, Bytes>,
    /// config singleton, sequence counter, schema version
    meta_db: Database<Bytes, Bytes>,
}

impl LmdbEnvironment {
    /// Open or create an LMDB environment in the directory `path`, creating
    /// the directory if needed, and bring its schema up to date.
    pub fn open(path: &Path, map_size: usize) -> Result<Self, LmdbError> {
        std::fs::create_dir_all(path)?;

        // SAFETY: the environment is opened once per process and the
        // directory is not shared with another process using a different map size.
        let env = unsafe {
            EnvOpenOptions::new()
                .map_size(map_size)
                .max_dbs(MAX_DBS)
                .open(path)?
        };

        let mut wtxn = env.write_txn()?;
        let proposals_db = env.create_database(&mut wtxn, Some("proposals"))?;
        let proposal_order_db = env.create_database(&mut wtxn, Some("proposal_order"))?;
        let votes_db = env.create_database(&mut wtxn, Some("votes"))?;
        let parameters_db = env.create_database(&mut wtxn, Some("parameters"))?;
        let parameter_history_db = env.create_database(&mut wtxn, Some("parameter_history"))?;
        let meta_db = env.create_database(&mut wtxn, Some("meta"))?;
        wtxn.commit()?;

        let environment = Self {
            env: Arc::new(env),
            proposals_db,
            proposal_order_db,
            votes_db,
            parameters_db,
            parameter_history_db,
            meta_db,
        };
        Migrator::run(&environment.env, environment.meta_db)?;

        tracing::info!(path = %path.display(), map_size, "LMDB environment opened");
        Ok(environment)
    }

    pub fn env(&self) -> &Arc<Env> {
        &self.env
    }

    /// A governance store sharing this environment.
    pub fn governance_store(&self) -> LmdbGovernanceStore {
        LmdbGovernanceStore {
            env: Arc::clone(&self.env),
            proposals_db: self.proposals_db,
            proposal_order_db: self.proposal_order_db,
            votes_db: self.votes_db,
            parameters_db: self.parameters_db,
            parameter_history_db: self.parameter_history_db,
            meta_db: self.meta_db,
        }
    }
}
