//! Nullable infrastructure for deterministic testing.
//!
//! Every external dependency of the governance engine (clock, storage,
//! balance oracle, ledger) sits behind a trait. This crate provides
//! test-friendly implementations that:
//! - Return deterministic values
//! - Can be controlled programmatically, including failure injection
//! - Never touch the filesystem or network
//!
//! Usage: swap real implementations for nullables in tests.

pub mod clock;
pub mod ledger;
pub mod oracle;
pub mod store;

pub use clock::NullClock;
pub use ledger::NullLedger;
pub use oracle::NullBalanceOracle;
pub use store::NullGovernanceStore;
