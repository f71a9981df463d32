//! Fundamental types for the Agora governance engine.
//!
//! This crate defines the core types shared across every other crate in the workspace:
//! principals, proposal identifiers, token amounts and timestamps.

pub mod amount;
pub mod error;
pub mod principal;
pub mod proposal_id;
pub mod time;

pub use amount::TokenAmount;
pub use error::AgoraError;
pub use principal::PrincipalId;
pub use proposal_id::ProposalId;
pub use time::Timestamp;
