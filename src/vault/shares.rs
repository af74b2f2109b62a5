//! Per-instance fungible share token
use odra::prelude::*;
use odra::casper_types::U256;

use super::VaultId;
use crate::errors::VaultError;
use crate::events::{ShareApproval, ShareTransfer};

/// Share balances of every instance hosted by a factory.
/// For each instance the balances always sum to its total supply.
#[odra::module]
pub struct ShareLedger {
    balances: Mapping<(VaultId, Address), U256>,
    allowances: Mapping<(VaultId, Address, Address), U256>,
    supply: Mapping<VaultId, U256>,
}

#[odra::module]
impl ShareLedger {
    pub fn total_supply(&self, vault: VaultId) -> U256 {
        self.supply.get(&vault).unwrap_or_default()
    }

    pub fn balance_of(&self, vault: VaultId, owner: Address) -> U256 {
        self.balances.get(&(vault, owner)).unwrap_or_default()
    }

    pub fn allowance(&self, vault: VaultId, owner: Address, spender: Address) -> U256 {
        self.allowances
            .get(&(vault, owner, spender))
            .unwrap_or_default()
    }

    pub fn transfer(&mut self, vault: VaultId, to: Address, amount: U256) -> bool {
        let caller = self.env().caller();
        self.move_shares(&vault, caller, to, amount);
        true
    }

    pub fn approve(&mut self, vault: VaultId, spender: Address, amount: U256) -> bool {
        let caller = self.env().caller();
        self.set_allowance(&vault, caller, spender, amount);
        true
    }

    pub fn transfer_from(&mut self, vault: VaultId, from: Address, to: Address, amount: U256) -> bool {
        let caller = self.env().caller();
        self.spend_allowance(&vault, from, caller, amount);
        self.move_shares(&vault, from, to, amount);
        true
    }
}

impl ShareLedger {
    pub fn mint(&mut self, vault: &VaultId, to: Address, amount: U256) {
        let supply = self.total_supply(*vault);
        self.supply.set(vault, supply + amount);
        let balance = self.balance_of(*vault, to);
        self.balances.set(&(*vault, to), balance + amount);

        self.env().emit_event(ShareTransfer {
            vault: *vault,
            from: None,
            to: Some(to),
            value: amount,
        });
    }

    pub fn burn(&mut self, vault: &VaultId, from: Address, amount: U256) {
        let balance = self.balance_of(*vault, from);
        if balance < amount {
            self.env().revert(VaultError::InsufficientShares);
        }
        self.balances.set(&(*vault, from), balance - amount);
        let supply = self.total_supply(*vault);
        self.supply.set(vault, supply - amount);

        self.env().emit_event(ShareTransfer {
            vault: *vault,
            from: Some(from),
            to: None,
            value: amount,
        });
    }

    /// Consumes `amount` of the allowance `owner` granted to `spender`
    pub fn spend_allowance(&mut self, vault: &VaultId, owner: Address, spender: Address, amount: U256) {
        let current = self.allowance(*vault, owner, spender);
        if current < amount {
            self.env().revert(VaultError::InsufficientAllowance);
        }
        if current != U256::MAX {
            self.set_allowance(vault, owner, spender, current - amount);
        }
    }

    fn move_shares(&mut self, vault: &VaultId, from: Address, to: Address, amount: U256) {
        let from_balance = self.balance_of(*vault, from);
        if from_balance < amount {
            self.env().revert(VaultError::InsufficientShares);
        }
        self.balances.set(&(*vault, from), from_balance - amount);
        let to_balance = self.balance_of(*vault, to);
        self.balances.set(&(*vault, to), to_balance + amount);

        self.env().emit_event(ShareTransfer {
            vault: *vault,
            from: Some(from),
            to: Some(to),
            value: amount,
        });
    }

    fn set_allowance(&mut self, vault: &VaultId, owner: Address, spender: Address, amount: U256) {
        self.allowances.set(&(*vault, owner, spender), amount);

        self.env().emit_event(ShareApproval {
            vault: *vault,
            owner,
            spender,
            value: amount,
        });
    }
}
