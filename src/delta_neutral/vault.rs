//! Delta-neutral vault factory
//!
//! An instance holds shares of one lending instance and one staking
//! instance, both created through their own factories. A deposit supplies
//! the asset to the lending leg and stakes the borrowed asset through the
//! staking leg. An exit unstakes first, repays the lending leg's debt with
//! the proceeds, releases the collateral and swaps any borrow asset left
//! over back into the asset.
//!
//! Either leg failing reverts the whole operation.
use odra::prelude::*;
use odra::casper_types::bytesrepr::Bytes;
use odra::casper_types::U256;
use odra::ContractRef;

use crate::errors::VaultError;
use crate::events::MarketParametersChanged;
use crate::lending::vault::LendingVaultFactoryContractRef;
use crate::markets::SwapRouterContractRef;
use crate::math::{SafeMath, BPS};
use crate::staking::vault::StakingVaultFactoryContractRef;
use crate::token::Cep18TokenContractRef;
use crate::vault::config::{DeltaNeutralVaultConfig, LendingVaultConfig, VaultConfig};
use crate::vault::{
    OrRevert, ShareLedger, TokenizedVault, VaultId, VaultRecord, VaultRegistry, INITIAL_TEMPLATE,
};

/// Sub-instances an instance is built on
#[odra::odra_type]
pub struct Legs {
    pub lending_factory: Address,
    pub lending_vault: VaultId,
    pub staking_factory: Address,
    pub staking_vault: VaultId,
    pub borrow_asset: Address,
    /// Router of the staking leg, used to sell leftover borrow asset
    pub router: Address,
}

/// Sub-instance shares held for an instance
#[odra::odra_type]
pub struct Position {
    pub lending_shares: U256,
    pub staking_shares: U256,
}

#[odra::module]
pub struct DeltaNeutralVaultFactory {
    registry: SubModule<VaultRegistry>,
    shares: SubModule<ShareLedger>,
    max_slippage_bps: Var<u32>,
    legs: Mapping<VaultId, Legs>,
    positions: Mapping<VaultId, Position>,
    idle: Mapping<VaultId, U256>,
}

#[odra::module]
impl DeltaNeutralVaultFactory {
    pub fn init(&mut self, max_slippage_bps: u32) {
        if max_slippage_bps > BPS {
            self.env().revert(VaultError::InvalidSlippage);
        }
        let admin = self.env().caller();
        self.registry.init(admin, INITIAL_TEMPLATE);
        self.max_slippage_bps.set(max_slippage_bps);
    }

    delegate! {
        to self.registry {
            fn admin(&self) -> Address;
            fn template(&self) -> u32;
            fn vault_count(&self) -> u32;
            fn vault_at(&self, index: u32) -> Option<VaultId>;
            fn vault_exists(&self, vault: VaultId) -> bool;
            fn get_vault(&self, vault: VaultId) -> Option<VaultRecord>;
            fn compute_vault_id(&self, asset: Address, config: Bytes) -> VaultId;
            fn set_template(&mut self, template: u32);
            fn transfer_admin(&mut self, new_admin: Address);
        }

        to self.shares {
            fn total_supply(&self, vault: VaultId) -> U256;
            fn balance_of(&self, vault: VaultId, owner: Address) -> U256;
            fn allowance(&self, vault: VaultId, owner: Address, spender: Address) -> U256;
            fn transfer(&mut self, vault: VaultId, to: Address, amount: U256) -> bool;
            fn approve(&mut self, vault: VaultId, spender: Address, amount: U256) -> bool;
            fn transfer_from(&mut self, vault: VaultId, from: Address, to: Address, amount: U256) -> bool;
        }
    }

    // ========================================
    // Factory
    // ========================================

    /// Creates the instance and both of its legs, or returns the existing one
    pub fn create_vault(&mut self, asset: Address, config: Bytes) -> VaultId {
        let env = self.env();
        let parsed = DeltaNeutralVaultConfig::decode(&config).or_revert(&env);
        if parsed.lending_asset != asset {
            env.revert(VaultError::AssetMismatch);
        }
        let lending = LendingVaultConfig::decode(&parsed.lending_config).or_revert(&env);
        if parsed.staking_asset != lending.borrow_asset {
            env.revert(VaultError::AssetMismatch);
        }

        let vault = self.registry.compute_vault_id(asset, config.clone());
        if self.registry.vault_exists(vault) {
            return vault;
        }

        let lending_vault = LendingVaultFactoryContractRef::new(env.clone(), parsed.lending_factory)
            .create_vault(asset, parsed.lending_config.clone());
        let mut staking = StakingVaultFactoryContractRef::new(env.clone(), parsed.staking_factory);
        let staking_vault = staking.create_vault(parsed.staking_asset, parsed.staking_config.clone());

        let router = staking.router_of(staking_vault);
        if !SwapRouterContractRef::new(env.clone(), router).has_pool(lending.borrow_asset, asset) {
            env.revert(VaultError::SwapRouteUnavailable);
        }

        let owner = parsed.owner();
        self.legs.set(&vault, Legs {
            lending_factory: parsed.lending_factory,
            lending_vault,
            staking_factory: parsed.staking_factory,
            staking_vault,
            borrow_asset: lending.borrow_asset,
            router,
        });
        self.registry.register(vault, asset, config, owner);
        vault
    }

    pub fn max_slippage_bps(&self) -> u32 {
        self.max_slippage_bps.get_or_default()
    }

    /// Slippage tolerated when selling leftover borrow asset (admin only)
    pub fn set_max_slippage(&mut self, max_slippage_bps: u32) {
        self.registry.only_admin();
        if max_slippage_bps > BPS {
            self.env().revert(VaultError::InvalidSlippage);
        }
        self.max_slippage_bps.set(max_slippage_bps);

        self.env().emit_event(MarketParametersChanged {
            parameter: String::from("max_slippage_bps"),
            changed_by: self.env().caller(),
            timestamp: self.env().get_block_time(),
        });
    }

    // ========================================
    // Vault Flows
    // ========================================

    pub fn deposit(&mut self, vault: VaultId, assets: U256, receiver: Address) -> U256 {
        self.process_deposit(&vault, assets, receiver)
    }

    pub fn mint(&mut self, vault: VaultId, shares: U256, receiver: Address) -> U256 {
        self.process_mint(&vault, shares, receiver)
    }

    pub fn withdraw(&mut self, vault: VaultId, assets: U256, receiver: Address, owner: Address) -> U256 {
        self.process_withdraw(&vault, assets, receiver, owner)
    }

    pub fn redeem(&mut self, vault: VaultId, shares: U256, receiver: Address, owner: Address) -> U256 {
        self.process_redeem(&vault, shares, receiver, owner)
    }

    // ========================================
    // Vault Views
    // ========================================

    pub fn asset(&self, vault: VaultId) -> Address {
        self.vault_asset(&vault)
    }

    pub fn vault_owner(&self, vault: VaultId) -> Address {
        self.registry.record(&vault).owner
    }

    pub fn vault_config(&self, vault: VaultId) -> Bytes {
        self.registry.record(&vault).config
    }

    /// Claim on both legs net of the lending leg's debt, plus idle assets
    pub fn total_assets(&self, vault: VaultId) -> U256 {
        self.registry.record(&vault);
        self.managed_assets(&vault)
    }

    pub fn convert_to_shares(&self, vault: VaultId, assets: U256) -> U256 {
        self.quote_deposit(&vault, assets)
    }

    pub fn convert_to_assets(&self, vault: VaultId, shares: U256) -> U256 {
        self.quote_redeem(&vault, shares)
    }

    pub fn preview_deposit(&self, vault: VaultId, assets: U256) -> U256 {
        self.quote_deposit(&vault, assets)
    }

    pub fn preview_mint(&self, vault: VaultId, shares: U256) -> U256 {
        self.quote_mint(&vault, shares)
    }

    pub fn preview_withdraw(&self, vault: VaultId, assets: U256) -> U256 {
        self.quote_withdraw(&vault, assets)
    }

    pub fn preview_redeem(&self, vault: VaultId, shares: U256) -> U256 {
        self.quote_redeem(&vault, shares)
    }

    pub fn max_deposit(&self, _vault: VaultId, _receiver: Address) -> U256 {
        U256::MAX
    }

    pub fn max_mint(&self, _vault: VaultId, _receiver: Address) -> U256 {
        U256::MAX
    }

    pub fn max_withdraw(&self, vault: VaultId, owner: Address) -> U256 {
        self.withdrawable(&vault, owner)
    }

    pub fn max_redeem(&self, vault: VaultId, owner: Address) -> U256 {
        self.shares.balance_of(vault, owner)
    }

    pub fn legs_of(&self, vault: VaultId) -> Legs {
        self.legs_or_revert(&vault)
    }

    pub fn position_of(&self, vault: VaultId) -> Position {
        self.positions.get(&vault).unwrap_or(Position {
            lending_shares: U256::zero(),
            staking_shares: U256::zero(),
        })
    }
}

impl DeltaNeutralVaultFactory {
    fn legs_or_revert(&self, vault: &VaultId) -> Legs {
        self.legs
            .get(vault)
            .unwrap_or_revert_with(&self.env(), VaultError::VaultNotFound)
    }

    fn lending(&self, legs: &Legs) -> LendingVaultFactoryContractRef {
        LendingVaultFactoryContractRef::new(self.env(), legs.lending_factory)
    }

    fn staking(&self, legs: &Legs) -> StakingVaultFactoryContractRef {
        StakingVaultFactoryContractRef::new(self.env(), legs.staking_factory)
    }

    /// `part / whole` of `amount` rounded up, so an exit never takes less
    /// than its share of a leg
    fn leg_part(&self, amount: U256, part: U256, whole: U256) -> U256 {
        if part >= whole {
            return amount;
        }
        SafeMath::mul_div_up(amount, part, whole).or_revert(&self.env())
    }

    fn sell_borrow_asset(&mut self, legs: &Legs, asset: Address, amount: U256) -> U256 {
        if amount.is_zero() {
            return amount;
        }
        let env = self.env();
        let path = vec![legs.borrow_asset, asset];
        let mut router = SwapRouterContractRef::new(env.clone(), legs.router);
        let quoted = router.get_amounts_out(amount, path.clone()).last().copied().unwrap_or_default();
        if quoted.is_zero() {
            return quoted;
        }
        let min_out = SafeMath::bps(quoted, BPS - self.max_slippage_bps()).or_revert(&env);

        Cep18TokenContractRef::new(env.clone(), legs.borrow_asset).approve(legs.router, amount);
        router.swap(amount, path, min_out, env.get_block_time())
    }
}

impl TokenizedVault for DeltaNeutralVaultFactory {
    fn share_ledger(&self) -> &ShareLedger {
        &self.shares
    }

    fn share_ledger_mut(&mut self) -> &mut ShareLedger {
        &mut self.shares
    }

    fn vault_registry(&self) -> &VaultRegistry {
        &self.registry
    }

    fn idle_assets(&self, vault: &VaultId) -> U256 {
        self.idle.get(vault).unwrap_or_default()
    }

    fn set_idle_assets(&mut self, vault: &VaultId, amount: U256) {
        self.idle.set(vault, amount);
    }

    /// collateral claim + borrow asset surplus sold at the router quote,
    /// or minus a borrow asset shortfall at the oracle price
    fn managed_assets(&self, vault: &VaultId) -> U256 {
        let env = self.env();
        let legs = self.legs_or_revert(vault);
        let position = self.position_of(*vault);
        let idle = self.idle_assets(vault);
        if position.lending_shares.is_zero() && position.staking_shares.is_zero() {
            return idle;
        }

        let lending = self.lending(&legs);
        let collateral = lending.preview_redeem(legs.lending_vault, position.lending_shares);
        let debt = lending.debt_for_shares(legs.lending_vault, position.lending_shares);
        let staked = if position.staking_shares.is_zero() {
            U256::zero()
        } else {
            self.staking(&legs).preview_redeem(legs.staking_vault, position.staking_shares)
        };

        let gross = SafeMath::add(collateral, idle).or_revert(&env);
        if staked >= debt {
            let surplus = staked - debt;
            if surplus.is_zero() {
                return gross;
            }
            let asset = self.vault_asset(vault);
            let proceeds = SwapRouterContractRef::new(env.clone(), legs.router)
                .get_amounts_out(surplus, vec![legs.borrow_asset, asset])
                .last()
                .copied()
                .unwrap_or_default();
            SafeMath::add(gross, proceeds).or_revert(&env)
        } else {
            let shortfall = lending.borrow_asset_value(legs.lending_vault, debt - staked);
            SafeMath::saturating_sub(gross, shortfall)
        }
    }

    fn sync(&mut self, vault: &VaultId) {
        let legs = self.legs_or_revert(vault);
        self.lending(&legs).update_debt(legs.lending_vault);
        self.staking(&legs).harvest(legs.staking_vault);
    }

    fn deploy(&mut self, vault: &VaultId, assets: U256, _shares: U256, _supply_before: U256, _funder: Address) {
        let env = self.env();
        let this = env.self_address();
        let legs = self.legs_or_revert(vault);
        let asset = self.vault_asset(vault);
        let mut borrow_token = Cep18TokenContractRef::new(env.clone(), legs.borrow_asset);
        let borrowed_before = borrow_token.balance_of(this);

        Cep18TokenContractRef::new(env.clone(), asset).approve(legs.lending_factory, assets);
        let lending_shares = self.lending(&legs).deposit(legs.lending_vault, assets, this);

        let borrowed = borrow_token.balance_of(this) - borrowed_before;
        let staking_shares = if borrowed.is_zero() {
            U256::zero()
        } else {
            borrow_token.approve(legs.staking_factory, borrowed);
            self.staking(&legs).deposit(legs.staking_vault, borrowed, this)
        };

        let mut position = self.position_of(*vault);
        position.lending_shares = position.lending_shares + lending_shares;
        position.staking_shares = position.staking_shares + staking_shares;
        self.positions.set(vault, position);
    }

    fn unwind(
        &mut self,
        vault: &VaultId,
        shares: U256,
        supply_before: U256,
        _needed: U256,
        _payer: Address,
    ) -> U256 {
        let env = self.env();
        let this = env.self_address();
        let legs = self.legs_or_revert(vault);
        let asset = self.vault_asset(vault);
        let mut position = self.position_of(*vault);

        let staking_part = self.leg_part(position.staking_shares, shares, supply_before);
        let lending_part = self.leg_part(position.lending_shares, shares, supply_before);

        let unstaked = if staking_part.is_zero() {
            U256::zero()
        } else {
            self.staking(&legs).redeem(legs.staking_vault, staking_part, this, this)
        };

        let mut lending = self.lending(&legs);
        let debt_due = lending.debt_for_shares(legs.lending_vault, lending_part);
        if unstaked < debt_due {
            env.revert(VaultError::InsufficientBorrowBalance);
        }

        let released = if lending_part.is_zero() {
            U256::zero()
        } else {
            if !debt_due.is_zero() {
                Cep18TokenContractRef::new(env.clone(), legs.borrow_asset)
                    .approve(legs.lending_factory, debt_due);
            }
            lending.redeem(legs.lending_vault, lending_part, this, this)
        };

        position.lending_shares = position.lending_shares - lending_part;
        position.staking_shares = position.staking_shares - staking_part;
        self.positions.set(vault, position);

        let sold = self.sell_borrow_asset(&legs, asset, unstaked - debt_due);
        SafeMath::add(released, sold).or_revert(&env)
    }
}
