//! Staking vaults - swap into a pool's stake token and stake it

pub mod vault;

pub use vault::{StakingInstance, StakingVaultFactory};
