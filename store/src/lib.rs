//! Abstract storage traits for the Agora governance engine.
//!
//! Every storage backend (LMDB, in-memory for testing) implements these
//! traits. The engine depends only on the traits and stores opaque,
//! already-encoded values; the encoding belongs to `agora-governance`.

pub mod error;
pub mod governance;

pub use error::StoreError;
pub use governance::{GovernanceStore, WriteOp, WriteSet};
