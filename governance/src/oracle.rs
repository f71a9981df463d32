//! Balance oracle: the engine's view of token holdings.
//!
//! Implemented outside this crate by whatever talks to the ledger network.
//! Calls may block on I/O; the engine never holds a proposal lock across them.

use std::sync::Arc;

use agora_types::{PrincipalId, Timestamp, TokenAmount};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum OracleError {
    #[error("oracle unavailable: {0}")]
    Unavailable(String),

    #[error("no balance snapshot at {0}")]
    NoSnapshot(Timestamp),
}

pub trait BalanceOracle: Send + Sync {
    /// Balance of `principal` at `at`. Unknown principals hold zero.
    fn balance_of(&self, principal: &PrincipalId, at: Timestamp) -> Result<TokenAmount, OracleError>;

    /// Total token supply at `at`.
    fn total_supply(&self, at: Timestamp) -> Result<TokenAmount, OracleError>;
}

impl<T: BalanceOracle + ?Sized> BalanceOracle for Arc<T> {
    fn balance_of(&self, principal: &PrincipalId, at: Timestamp) -> Result<TokenAmount, OracleError> {
        (**self).balance_of(principal, at)
    }

    fn total_supply(&self, at: Timestamp) -> Result<TokenAmount, OracleError> {
        (**self).total_supply(at)
    }
}
