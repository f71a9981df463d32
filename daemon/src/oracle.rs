//! Balance oracle backed by a TOML file of balance snapshots.
//!
//! ```toml
//! [[snapshot]]
//! at = 0
//! [snapshot.balances]
//! alice = 600
//! bob = "500"
//!
//! [[snapshot]]
//! at = 1700000000
//! total_supply = 20000
//! [snapshot.balances]
//! alice = 900
//! ```
//!
//! A query at time `t` is answered from the latest snapshot taken at or
//! before `t`. Total supply defaults to the sum of that snapshot's balances.

use std::collections::BTreeMap;
use std::path::Path;

use agora_governance::{BalanceOracle, OracleError};
use agora_types::{PrincipalId, Timestamp, TokenAmount};
use serde::Deserialize;

#[derive(Debug, Deserialize)]
struct SnapshotFile {
    #[serde(default)]
    snapshot: Vec<Snapshot>,
}

#[derive(Debug, Deserialize)]
struct Snapshot {
    at: u64,
    #[serde(default)]
    total_supply: Option<TokenAmount>,
    #[serde(default)]
    balances: BTreeMap<String, TokenAmount>,
}

pub struct SnapshotOracle {
    /// Keyed by snapshot time.
    snapshots: BTreeMap<Timestamp, Snapshot>,
}

impl SnapshotOracle {
    pub fn from_toml_file(path: &Path) -> Result<Self, OracleError> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            OracleError::Unavailable(format!("failed to read {}: {e}", path.display()))
        })?;
        Self::from_toml_str(&content)
    }

    pub fn from_toml_str(s: &str) -> Result<Self, OracleError> {
        let file: SnapshotFile = toml::from_str(s)
            .map_err(|e| OracleError::Unavailable(format!("invalid balances file: {e}")))?;
        let mut snapshots = BTreeMap::new();
        for snapshot in file.snapshot {
            for name in snapshot.balances.keys() {
                PrincipalId::parse(name)
                    .map_err(|e| OracleError::Unavailable(format!("invalid balances file: {e}")))?;
            }
            snapshots.insert(Timestamp::new(snapshot.at), snapshot);
        }
        tracing::debug!(snapshots = snapshots.len(), "balance snapshots loaded");
        Ok(Self { snapshots })
    }

    fn snapshot_at(&self, at: Timestamp) -> Result<&Snapshot, OracleError> {
        self.snapshots
            .range(..=at)
            .next_back()
            .map(|(_, snapshot)| snapshot)
            .ok_or(OracleError::NoSnapshot(at))
    }
}

impl BalanceOracle for SnapshotOracle {
    fn balance_of(&self, principal: &PrincipalId, at: Timestamp) -> Result<TokenAmount, OracleError> {
        Ok(self
            .snapshot_at(at)?
            .balances
            .get(principal.as_str())
            .copied()
            .unwrap_or(TokenAmount::ZERO))
    }

    fn total_supply(&self, at: Timestamp) -> Result<TokenAmount, OracleError> {
        let snapshot = self.snapshot_at(at)?;
        if let Some(supply) = snapshot.total_supply {
            return Ok(supply);
        }
        snapshot
            .balances
            .values()
            .try_fold(TokenAmount::ZERO, |acc, b| acc.checked_add(*b))
            .ok_or_else(|| OracleError::Unavailable("total supply overflows".to_string()))
    }
}
