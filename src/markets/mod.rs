//! Reference markets the vault strategies run against
//!
//! A money market with two-slope interest, a reward staking pool, a
//! constant product swap router and a single-asset price feed. Vaults only
//! see them through the narrow interfaces in [`interfaces`].

pub mod events;
pub mod interest_rate;
pub mod interfaces;
pub mod lending_pool;
pub mod price_feed;
pub mod router;
pub mod staking_pool;

pub use interest_rate::InterestRateModel;
pub use interfaces::{
    LendingMarketContractRef, PriceFeedContractRef, StakingMarketContractRef, SwapRouterContractRef,
};
pub use lending_pool::LendingPool;
pub use price_feed::PriceOracle;
pub use router::AmmRouter;
pub use staking_pool::StakingPool;

