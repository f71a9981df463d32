//! LMDB storage backend for the Agora governance engine.
//!
//! Implements [`agora_store::GovernanceStore`] using the `heed` LMDB bindings.
//! Each table maps to one LMDB database within a single environment, and a
//! [`agora_store::WriteSet`] is applied in one write transaction.

pub mod environment;
pub mod error;
pub mod governance;
pub mod migration;

pub use environment::{LmdbEnvironment, DEFAULT_MAP_SIZE};
pub use error::LmdbError;
pub use governance::LmdbGovernanceStore;
