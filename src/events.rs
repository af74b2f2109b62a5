//! Event definitions for the vault factories and the asset token
use odra::prelude::*;
use odra::casper_types::U256;

use crate::vault::VaultId;

/// Event emitted when a factory creates a new vault instance
#[odra::event]
pub struct VaultCreated {
    /// Underlying asset of the instance
    pub asset: Address,
    /// Content-addressed id of the instance
    pub vault: VaultId,
    /// Template the instance was created from
    pub template: u32,
    /// Position of the instance in the registry
    pub index: u32,
}

/// Event emitted when assets are deposited into a vault instance
#[odra::event]
pub struct Deposit {
    pub vault: VaultId,
    /// Account that supplied the assets
    pub sender: Address,
    /// Account credited with the shares
    pub owner: Address,
    pub assets: U256,
    pub shares: U256,
    pub timestamp: u64,
}

/// Event emitted when shares are burned for assets
#[odra::event]
pub struct Withdraw {
    pub vault: VaultId,
    /// Account that executed the exit
    pub sender: Address,
    /// Account receiving the assets
    pub receiver: Address,
    /// Account whose shares were burned
    pub owner: Address,
    pub assets: U256,
    pub shares: U256,
    pub timestamp: u64,
}

/// Event emitted when vault shares move between accounts
#[odra::event]
pub struct ShareTransfer {
    pub vault: VaultId,
    pub from: Option<Address>,
    pub to: Option<Address>,
    pub value: U256,
}

/// Event emitted when a share allowance is set
#[odra::event]
pub struct ShareApproval {
    pub vault: VaultId,
    pub owner: Address,
    pub spender: Address,
    pub value: U256,
}

/// Event emitted when a lending instance refreshes its debt
#[odra::event]
pub struct DebtUpdated {
    pub vault: VaultId,
    /// Debt before the refresh
    pub previous_debt: U256,
    /// Debt after the refresh
    pub debt: U256,
    /// Per-second borrow rate reported by the market (scaled by 1e18)
    pub borrow_rate: U256,
    pub timestamp: u64,
}

/// Event emitted when a lending instance repays part of its debt
#[odra::event]
pub struct DebtRepaid {
    pub vault: VaultId,
    pub payer: Address,
    pub amount: U256,
    /// Debt left after the repayment
    pub remaining_debt: U256,
    pub timestamp: u64,
}

/// Event emitted when a lending instance borrows against new collateral
#[odra::event]
pub struct StrategyBorrowed {
    pub vault: VaultId,
    pub borrow_asset: Address,
    /// Account the borrowed tokens were sent to
    pub recipient: Address,
    pub amount: U256,
    pub timestamp: u64,
}

/// Event emitted when staking rewards are compounded
#[odra::event]
pub struct Harvested {
    pub vault: VaultId,
    /// Rewards claimed from the pool
    pub rewards: U256,
    /// Stake tokens added back to the pool
    pub restaked: U256,
    pub timestamp: u64,
}

/// Event emitted when the factory template changes
#[odra::event]
pub struct TemplateChanged {
    pub old_template: u32,
    pub new_template: u32,
    pub changed_by: Address,
}

/// Event emitted when the factory administrator changes
#[odra::event]
pub struct AdminChanged {
    pub old_admin: Address,
    pub new_admin: Address,
}

/// Event emitted when a factory's market parameters change
#[odra::event]
pub struct MarketParametersChanged {
    /// Name of the changed parameter
    pub parameter: String,
    pub changed_by: Address,
    pub timestamp: u64,
}

/// Event emitted when asset tokens are transferred
#[odra::event]
pub struct Transfer {
    /// Sender address
    pub from: Address,
    /// Recipient address
    pub to: Address,
    /// Amount transferred
    pub value: U256,
}

/// Event emitted when approval is granted
#[odra::event]
pub struct Approval {
    /// Owner address
    pub owner: Address,
    /// Spender address
    pub spender: Address,
    /// Amount approved
    pub value: U256,
}
