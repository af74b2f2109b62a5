//! Delta-neutral vaults - a lending leg hedged by a staking leg

pub mod vault;

pub use vault::{DeltaNeutralVaultFactory, Legs, Position};
