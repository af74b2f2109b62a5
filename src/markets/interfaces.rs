//! Narrow interfaces through which vaults consume external markets
use odra::prelude::*;
use odra::casper_types::U256;

/// Money market the lending strategy supplies to and borrows from
#[odra::external_contract]
pub trait LendingMarket {
    /// Supply `amount` of `asset` as collateral of the caller
    fn supply(&mut self, asset: Address, amount: U256);

    /// Withdraw previously supplied collateral
    fn redeem_supplied(&mut self, asset: Address, amount: U256);

    /// Borrow `amount` of `asset` against the caller's collateral
    fn borrow(&mut self, asset: Address, amount: U256);

    /// Repay part of the caller's borrow of `asset`
    fn repay_borrow(&mut self, asset: Address, amount: U256);

    /// Borrow rate per accrual period (one second), scaled by 1e18
    fn borrow_rate_per_period(&self, asset: Address) -> U256;

    /// Borrow balance of `holder` including interest accrued up to now
    fn borrow_balance_current(&self, asset: Address, holder: Address) -> U256;

    fn supplied_balance(&self, asset: Address, holder: Address) -> U256;

    fn is_listed(&self, asset: Address) -> bool;

    /// Share of the supplied value of `asset` that counts as borrowing power
    fn collateral_factor_bps(&self, asset: Address) -> u32;
}

/// Reward pool the staking strategy stakes into
#[odra::external_contract]
pub trait StakingMarket {
    fn stake(&mut self, pool_id: u32, amount: U256);

    /// Returns the amount of stake token sent back
    fn unstake(&mut self, pool_id: u32, amount: U256) -> U256;

    /// Pays out the caller's pending rewards and returns the amount
    fn claim_rewards(&mut self, pool_id: u32) -> U256;

    fn pending_rewards(&self, pool_id: u32, holder: Address) -> U256;

    fn staked_balance(&self, pool_id: u32, holder: Address) -> U256;

    /// Token staked in `pool_id`, if the pool exists
    fn pool_token(&self, pool_id: u32) -> Option<Address>;

    fn reward_token(&self) -> Address;
}

/// Swap router used to enter and leave the stake token
#[odra::external_contract]
pub trait SwapRouter {
    fn swap(&mut self, amount_in: U256, path: Vec<Address>, min_out: U256, deadline: u64) -> U256;

    fn get_amounts_out(&self, amount_in: U256, path: Vec<Address>) -> Vec<U256>;

    fn has_pool(&self, token_a: Address, token_b: Address) -> bool;
}

/// Chainlink style price feed
#[odra::external_contract]
pub trait PriceFeed {
    fn latest_answer(&self) -> U256;

    fn decimals(&self) -> u8;
}
