//! Top-level error type shared across crates.

use thiserror::Error;

/// Errors raised while constructing or parsing the shared types.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum AgoraError {
    #[error("invalid principal: {0}")]
    InvalidPrincipal(String),

    #[error("invalid proposal id: {0}")]
    InvalidProposalId(String),

    #[error("amount overflow")]
    AmountOverflow,
}
