//! Lending vaults - supply collateral, borrow against it
//!
//! `LendingVaultFactory` hosts every lending instance; `DebtTracker` keeps
//! the per-instance slice of the factory's borrow in the lending market.

pub mod debt;
pub mod vault;

pub use debt::{DebtRecord, DebtTracker};
pub use vault::{LendingInstance, LendingVaultFactory};
