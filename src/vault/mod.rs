//! Shared vault machinery
//!
//! A factory contract hosts every instance of its vault kind. Instances are
//! addressed by a content-addressed [`VaultId`] and each one owns a share
//! ledger slice, an idle balance and whatever strategy state its kind needs.
//!
//! [`TokenizedVault`] carries the deposit / mint / withdraw / redeem flows.
//! A vault kind only provides the strategy hooks:
//! - `managed_assets`: gross value the shares are priced against
//! - `sync`: brings accrual-dependent state up to date before pricing
//! - `deploy`: puts freshly deposited assets to work
//! - `unwind`: releases the strategy position backing burned shares
use odra::prelude::*;
use odra::casper_types::U256;
use odra::module::Module;
use odra::{ContractEnv, ContractRef};

use crate::accounting::AccountingLedger;
use crate::errors::VaultError;
use crate::events::{Deposit, Withdraw};
use crate::math::{MathError, SafeMath};
use crate::token::Cep18TokenContractRef;

pub mod config;
pub mod registry;
pub mod shares;

pub use registry::{VaultRecord, VaultRegistry};
pub use shares::ShareLedger;

/// Content-addressed identifier of a vault instance
pub type VaultId = [u8; 32];

/// Template id every factory starts with
pub const INITIAL_TEMPLATE: u32 = 1;

/// Reverts the current call with the `VaultError` matching a failed computation
pub trait OrRevert<T> {
    fn or_revert(self, env: &ContractEnv) -> T;
}

impl<T, E: Into<VaultError>> OrRevert<T> for Result<T, E> {
    fn or_revert(self, env: &ContractEnv) -> T {
        match self {
            Ok(value) => value,
            Err(error) => env.revert(error.into()),
        }
    }
}

/// Fraction `part / whole` of `amount`, exact when the whole is taken
pub fn pro_rata(amount: U256, part: U256, whole: U256) -> Result<U256, MathError> {
    if part == whole {
        return Ok(amount);
    }
    SafeMath::mul_div_down(amount, part, whole)
}

pub trait TokenizedVault: Module {
    fn share_ledger(&self) -> &ShareLedger;

    fn share_ledger_mut(&mut self) -> &mut ShareLedger;

    fn vault_registry(&self) -> &VaultRegistry;

    /// Underlying asset held by the factory on behalf of the instance
    fn idle_assets(&self, vault: &VaultId) -> U256;

    fn set_idle_assets(&mut self, vault: &VaultId, amount: U256);

    fn managed_assets(&self, vault: &VaultId) -> U256;

    fn sync(&mut self, vault: &VaultId);

    /// `funder` is the account that supplied the assets
    fn deploy(&mut self, vault: &VaultId, assets: U256, shares: U256, supply_before: U256, funder: Address);

    /// Releases the position backing `shares` out of `supply_before` and
    /// returns the underlying asset it produced. `needed` is what the exit
    /// still has to pay after the idle share; `payer` settles liabilities.
    fn unwind(
        &mut self,
        vault: &VaultId,
        shares: U256,
        supply_before: U256,
        needed: U256,
        payer: Address,
    ) -> U256;

    fn vault_asset(&self, vault: &VaultId) -> Address {
        self.vault_registry().record(vault).asset
    }

    fn ledger(&self, vault: &VaultId) -> AccountingLedger {
        AccountingLedger::new(
            self.managed_assets(vault),
            self.share_ledger().total_supply(*vault),
        )
    }

    fn quote_deposit(&self, vault: &VaultId, assets: U256) -> U256 {
        self.ledger(vault).preview_deposit(assets).or_revert(&self.env())
    }

    fn quote_mint(&self, vault: &VaultId, shares: U256) -> U256 {
        self.ledger(vault).preview_mint(shares).or_revert(&self.env())
    }

    fn quote_withdraw(&self, vault: &VaultId, assets: U256) -> U256 {
        self.ledger(vault).preview_withdraw(assets).or_revert(&self.env())
    }

    fn quote_redeem(&self, vault: &VaultId, shares: U256) -> U256 {
        self.ledger(vault).preview_redeem(shares).or_revert(&self.env())
    }

    fn withdrawable(&self, vault: &VaultId, owner: Address) -> U256 {
        let shares = self.share_ledger().balance_of(*vault, owner);
        self.quote_redeem(vault, shares)
    }

    fn process_deposit(&mut self, vault: &VaultId, assets: U256, receiver: Address) -> U256 {
        self.vault_registry().record(vault);
        self.sync(vault);
        let shares = self.quote_deposit(vault, assets);
        self.settle_deposit(vault, assets, shares, receiver);
        shares
    }

    fn process_mint(&mut self, vault: &VaultId, shares: U256, receiver: Address) -> U256 {
        self.vault_registry().record(vault);
        self.sync(vault);
        let assets = self.quote_mint(vault, shares);
        self.settle_deposit(vault, assets, shares, receiver);
        assets
    }

    fn process_withdraw(&mut self, vault: &VaultId, assets: U256, receiver: Address, owner: Address) -> U256 {
        self.vault_registry().record(vault);
        self.sync(vault);
        let shares = self.quote_withdraw(vault, assets);
        self.settle_exit(vault, assets, shares, receiver, owner);
        shares
    }

    fn process_redeem(&mut self, vault: &VaultId, shares: U256, receiver: Address, owner: Address) -> U256 {
        self.vault_registry().record(vault);
        self.sync(vault);
        let assets = self.quote_redeem(vault, shares);
        self.settle_exit(vault, assets, shares, receiver, owner);
        assets
    }

    fn settle_deposit(&mut self, vault: &VaultId, assets: U256, shares: U256, receiver: Address) {
        let env = self.env();
        if assets.is_zero() {
            env.revert(VaultError::ZeroAmount);
        }
        if shares.is_zero() {
            env.revert(VaultError::ZeroShares);
        }

        let caller = env.caller();
        let asset = self.vault_asset(vault);
        Cep18TokenContractRef::new(env.clone(), asset).transfer_from(caller, env.self_address(), assets);

        let supply_before = self.share_ledger().total_supply(*vault);
        self.share_ledger_mut().mint(vault, receiver, shares);
        self.deploy(vault, assets, shares, supply_before, caller);

        env.emit_event(Deposit {
            vault: *vault,
            sender: caller,
            owner: receiver,
            assets,
            shares,
            timestamp: env.get_block_time(),
        });
    }

    fn settle_exit(&mut self, vault: &VaultId, assets: U256, shares: U256, receiver: Address, owner: Address) {
        let env = self.env();
        if shares.is_zero() {
            env.revert(VaultError::ZeroShares);
        }

        let caller = env.caller();
        if caller != owner {
            self.share_ledger_mut().spend_allowance(vault, owner, caller, shares);
        }
        let supply_before = self.share_ledger().total_supply(*vault);
        self.share_ledger_mut().burn(vault, owner, shares);

        let idle = self.idle_assets(vault);
        let idle_part = pro_rata(idle, shares, supply_before).or_revert(&env);
        let needed = SafeMath::saturating_sub(assets, idle_part);
        let proceeds = self.unwind(vault, shares, supply_before, needed, caller);

        let available = SafeMath::add(idle_part, proceeds).or_revert(&env);
        if available < assets {
            env.revert(VaultError::InsufficientLiquidity);
        }
        // Anything the strategy returned beyond the quote stays with the instance
        self.set_idle_assets(vault, idle - idle_part + (available - assets));

        if !assets.is_zero() {
            let asset = self.vault_asset(vault);
            Cep18TokenContractRef::new(env.clone(), asset).transfer(receiver, assets);
        }

        env.emit_event(Withdraw {
            vault: *vault,
            sender: caller,
            receiver,
            owner,
            assets,
            shares,
            timestamp: env.get_block_time(),
        });
    }
}
