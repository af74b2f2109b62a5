//! Events for the reference markets

use odra::prelude::*;
use odra::casper_types::U256;

// ============================================================================
// Lending Events
// ============================================================================

/// Event emitted when an asset is listed in the lending pool
#[odra::event]
pub struct MarketListed {
    pub asset: Address,
    pub price_feed: Address,
    pub collateral_factor_bps: u32,
}

/// Event emitted when collateral is supplied
#[odra::event]
pub struct Supplied {
    pub account: Address,
    pub asset: Address,
    pub amount: U256,
    pub timestamp: u64,
}

/// Event emitted when supplied collateral is withdrawn
#[odra::event]
pub struct SupplyRedeemed {
    pub account: Address,
    pub asset: Address,
    pub amount: U256,
    pub timestamp: u64,
}

/// Event emitted when an asset is borrowed
#[odra::event]
pub struct MarketBorrow {
    pub borrower: Address,
    pub asset: Address,
    pub amount: U256,
    /// Borrow balance after the operation
    pub account_borrows: U256,
    pub timestamp: u64,
}

/// Event emitted when a borrow is repaid
#[odra::event]
pub struct MarketRepay {
    pub payer: Address,
    pub asset: Address,
    pub amount: U256,
    /// Borrow balance after the operation
    pub account_borrows: U256,
    pub timestamp: u64,
}

/// Event emitted when interest is accrued on a market
#[odra::event]
pub struct InterestAccrued {
    pub asset: Address,
    pub interest: U256,
    pub borrow_index: U256,
    pub total_borrows: U256,
    pub timestamp: u64,
}

/// Event emitted when the pool is paused or resumed
#[odra::event]
pub struct PauseChanged {
    pub paused: bool,
    pub changed_by: Address,
}

// ============================================================================
// Staking Events
// ============================================================================

#[odra::event]
pub struct Staked {
    pub user: Address,
    pub pool_id: u32,
    pub amount: U256,
    pub timestamp: u64,
}

#[odra::event]
pub struct Unstaked {
    pub user: Address,
    pub pool_id: u32,
    pub amount: U256,
    pub timestamp: u64,
}

#[odra::event]
pub struct RewardsClaimed {
    pub user: Address,
    pub pool_id: u32,
    pub reward_amount: U256,
    pub timestamp: u64,
}

#[odra::event]
pub struct PoolCreated {
    pub pool_id: u32,
    pub stake_token: Address,
    pub reward_rate: U256,
    pub created_by: Address,
}

#[odra::event]
pub struct RewardRateUpdated {
    pub pool_id: u32,
    pub old_rate: U256,
    pub new_rate: U256,
    pub updated_by: Address,
}

// ============================================================================
// Swap Events
// ============================================================================

/// Event emitted when liquidity is added to a swap pool
#[odra::event]
pub struct LiquidityAdded {
    pub provider: Address,
    pub token0: Address,
    pub token1: Address,
    pub amount0: U256,
    pub amount1: U256,
    pub liquidity: U256,
}

/// Event emitted when a swap is executed
#[odra::event]
pub struct Swapped {
    pub sender: Address,
    pub token_in: Address,
    pub token_out: Address,
    pub amount_in: U256,
    pub amount_out: U256,
}

// ============================================================================
// Price Events
// ============================================================================

/// Event emitted when a feed publishes a new answer
#[odra::event]
pub struct PriceUpdated {
    pub answer: U256,
    pub updated_by: Address,
    pub timestamp: u64,
}
