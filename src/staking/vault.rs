//! Staking vault factory
//!
//! Each instance swaps its asset into the pool's stake token when they
//! differ and stakes it. Instances staking in the same pool share the
//! factory's position through pool shares, so harvested rewards compound
//! for all of them.
use odra::prelude::*;
use odra::casper_types::bytesrepr::Bytes;
use odra::casper_types::U256;
use odra::ContractRef;

use crate::accounting::AccountingLedger;
use crate::errors::VaultError;
use crate::events::{Harvested, MarketParametersChanged};
use crate::markets::{StakingMarketContractRef, SwapRouterContractRef};
use crate::math::{SafeMath, BPS};
use crate::token::Cep18TokenContractRef;
use crate::vault::config::{StakingVaultConfig, VaultConfig};
use crate::vault::{
    OrRevert, ShareLedger, TokenizedVault, VaultId, VaultRecord, VaultRegistry, INITIAL_TEMPLATE,
};

/// Parameters an instance is pinned to at creation
#[odra::odra_type]
pub struct StakingInstance {
    pub router: Address,
    pub staking_pool: Address,
    pub reward_token: Address,
    pub config: StakingVaultConfig,
}

#[odra::module]
pub struct StakingVaultFactory {
    registry: SubModule<VaultRegistry>,
    shares: SubModule<ShareLedger>,
    router: Var<Address>,
    staking_pool: Var<Address>,
    max_slippage_bps: Var<u32>,
    instances: Mapping<VaultId, StakingInstance>,
    idle: Mapping<VaultId, U256>,
    /// Claim of each instance on the factory's stake in its pool
    pool_shares: Mapping<VaultId, U256>,
    total_pool_shares: Mapping<(Address, u32), U256>,
}

#[odra::module]
impl StakingVaultFactory {
    pub fn init(&mut self, router: Address, staking_pool: Address, max_slippage_bps: u32) {
        if max_slippage_bps > BPS {
            self.env().revert(VaultError::InvalidSlippage);
        }
        let admin = self.env().caller();
        self.registry.init(admin, INITIAL_TEMPLATE);
        self.router.set(router);
        self.staking_pool.set(staking_pool);
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

    /// Creates the instance for `(asset, config)` or returns the existing one
    pub fn create_vault(&mut self, asset: Address, config: Bytes) -> VaultId {
        let env = self.env();
        let parsed = StakingVaultConfig::decode(&config).or_revert(&env);

        let vault = self.registry.compute_vault_id(asset, config.clone());
        if self.registry.vault_exists(vault) {
            return vault;
        }

        let staking_pool = self.staking_pool();
        let router = self.router();
        let pool = StakingMarketContractRef::new(env.clone(), staking_pool);
        if pool.pool_token(parsed.pool_id) != Some(parsed.stake_token) {
            env.revert(VaultError::UnsupportedPool);
        }
        let reward_token = pool.reward_token();

        let swaps = SwapRouterContractRef::new(env.clone(), router);
        for token in [asset, reward_token] {
            if token != parsed.stake_token && !swaps.has_pool(token, parsed.stake_token) {
                env.revert(VaultError::SwapRouteUnavailable);
            }
        }

        let owner = parsed.owner();
        self.instances.set(&vault, StakingInstance {
            router,
            staking_pool,
            reward_token,
            config: parsed,
        });
        self.registry.register(vault, asset, config, owner);
        vault
    }

    pub fn router(&self) -> Address {
        self.router.get_or_revert_with(VaultError::SwapRouteUnavailable)
    }

    pub fn staking_pool(&self) -> Address {
        self.staking_pool.get_or_revert_with(VaultError::UnsupportedPool)
    }

    pub fn max_slippage_bps(&self) -> u32 {
        self.max_slippage_bps.get_or_default()
    }

    /// Router used by instances created from now on (admin only)
    pub fn set_router(&mut self, router: Address) {
        self.registry.only_admin();
        self.router.set(router);
        self.parameters_changed("router");
    }

    /// Staking pool used by instances created from now on (admin only)
    pub fn set_staking_pool(&mut self, staking_pool: Address) {
        self.registry.only_admin();
        self.staking_pool.set(staking_pool);
        self.parameters_changed("staking_pool");
    }

    /// Slippage tolerated on every swap, in bps (admin only)
    pub fn set_max_slippage(&mut self, max_slippage_bps: u32) {
        self.registry.only_admin();
        if max_slippage_bps > BPS {
            self.env().revert(VaultError::InvalidSlippage);
        }
        self.max_slippage_bps.set(max_slippage_bps);
        self.parameters_changed("max_slippage_bps");
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

    /// Claims pending rewards, converts them to the stake token and stakes
    /// them again. Returns the amount restaked. Open to anyone.
    pub fn harvest(&mut self, vault: VaultId) -> U256 {
        self.registry.record(&vault);
        self.compound(&vault)
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

    /// Idle assets plus the staked position valued in the asset.
    /// Unclaimed rewards count once harvested.
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

    /// Stake tokens backing the instance
    pub fn deployed_stake(&self, vault: VaultId) -> U256 {
        let instance = self.instance(&vault);
        let (held, total, staked) = self.position(&vault, &instance);
        if held.is_zero() {
            return held;
        }
        AccountingLedger::new(staked, total)
            .preview_redeem(held)
            .or_revert(&self.env())
    }

    pub fn router_of(&self, vault: VaultId) -> Address {
        self.instance(&vault).router
    }

    pub fn staking_pool_of(&self, vault: VaultId) -> Address {
        self.instance(&vault).staking_pool
    }
}

impl StakingVaultFactory {
    fn instance(&self, vault: &VaultId) -> StakingInstance {
        self.instances
            .get(vault)
            .unwrap_or_revert_with(&self.env(), VaultError::VaultNotFound)
    }

    /// (pool shares of the instance, pool shares of the pool, factory stake)
    fn position(&self, vault: &VaultId, instance: &StakingInstance) -> (U256, U256, U256) {
        let pool_id = instance.config.pool_id;
        let held = self.pool_shares.get(vault).unwrap_or_default();
        let total = self
            .total_pool_shares
            .get(&(instance.staking_pool, pool_id))
            .unwrap_or_default();
        let staked = StakingMarketContractRef::new(self.env(), instance.staking_pool)
            .staked_balance(pool_id, self.env().self_address());
        (held, total, staked)
    }

    fn set_pool_shares(&mut self, vault: &VaultId, instance: &StakingInstance, held: U256, total: U256) {
        self.pool_shares.set(vault, held);
        self.total_pool_shares
            .set(&(instance.staking_pool, instance.config.pool_id), total);
    }

    fn quote(&self, router: Address, amount: U256, from: Address, to: Address) -> U256 {
        if amount.is_zero() || from == to {
            return amount;
        }
        let amounts = SwapRouterContractRef::new(self.env(), router).get_amounts_out(amount, vec![from, to]);
        amounts.last().copied().unwrap_or_default()
    }

    /// Swaps through `router` accepting at most `max_slippage_bps` below the quote
    fn swap(&mut self, router: Address, amount: U256, from: Address, to: Address) -> U256 {
        if amount.is_zero() || from == to {
            return amount;
        }
        let env = self.env();
        let quoted = self.quote(router, amount, from, to);
        let min_out = SafeMath::bps(quoted, BPS - self.max_slippage_bps()).or_revert(&env);

        Cep18TokenContractRef::new(env.clone(), from).approve(router, amount);
        SwapRouterContractRef::new(env.clone(), router).swap(amount, vec![from, to], min_out, env.get_block_time())
    }

    fn stake(&mut self, instance: &StakingInstance, amount: U256) {
        let env = self.env();
        Cep18TokenContractRef::new(env.clone(), instance.config.stake_token).approve(instance.staking_pool, amount);
        StakingMarketContractRef::new(env, instance.staking_pool).stake(instance.config.pool_id, amount);
    }

    fn compound(&mut self, vault: &VaultId) -> U256 {
        let env = self.env();
        let instance = self.instance(vault);
        let pool_id = instance.config.pool_id;
        let mut pool = StakingMarketContractRef::new(env.clone(), instance.staking_pool);
        if pool.pending_rewards(pool_id, env.self_address()).is_zero() {
            return U256::zero();
        }

        let rewards = pool.claim_rewards(pool_id);
        let restaked = self.swap(instance.router, rewards, instance.reward_token, instance.config.stake_token);
        if !restaked.is_zero() {
            self.stake(&instance, restaked);
        }

        env.emit_event(Harvested {
            vault: *vault,
            rewards,
            restaked,
            timestamp: env.get_block_time(),
        });
        restaked
    }

    fn parameters_changed(&self, parameter: &str) {
        self.env().emit_event(MarketParametersChanged {
            parameter: String::from(parameter),
            changed_by: self.env().caller(),
            timestamp: self.env().get_block_time(),
        });
    }
}

impl TokenizedVault for StakingVaultFactory {
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

    fn managed_assets(&self, vault: &VaultId) -> U256 {
        let instance = self.instance(vault);
        let asset = self.vault_asset(vault);
        let stake = self.deployed_stake(*vault);
        let value = self.quote(instance.router, stake, instance.config.stake_token, asset);
        SafeMath::add(self.idle_assets(vault), value).or_revert(&self.env())
    }

    fn sync(&mut self, vault: &VaultId) {
        self.compound(vault);
    }

    fn deploy(&mut self, vault: &VaultId, assets: U256, _shares: U256, _supply_before: U256, _funder: Address) {
        let instance = self.instance(vault);
        let asset = self.vault_asset(vault);
        let amount = self.swap(instance.router, assets, asset, instance.config.stake_token);
        if amount.is_zero() {
            self.env().revert(VaultError::InsufficientLiquidity);
        }

        let (held, total, staked) = self.position(vault, &instance);
        let minted = AccountingLedger::new(staked, total)
            .preview_deposit(amount)
            .or_revert(&self.env());
        self.stake(&instance, amount);
        self.set_pool_shares(vault, &instance, held + minted, total + minted);
    }

    /// Unstakes what the exit still needs: the exact amount when the stake
    /// token is the asset, otherwise the burned shares' part of the stake
    /// rounded up and swapped back
    fn unwind(
        &mut self,
        vault: &VaultId,
        shares: U256,
        supply_before: U256,
        needed: U256,
        _payer: Address,
    ) -> U256 {
        let env = self.env();
        let instance = self.instance(vault);
        let asset = self.vault_asset(vault);
        let stake_token = instance.config.stake_token;
        let (held, total, staked) = self.position(vault, &instance);
        if held.is_zero() || needed.is_zero() {
            return U256::zero();
        }

        let slice = AccountingLedger::new(staked, total).preview_redeem(held).or_revert(&env);
        let wanted = if stake_token == asset {
            needed
        } else if shares >= supply_before {
            slice
        } else {
            SafeMath::mul_div_up(slice, shares, supply_before).or_revert(&env)
        };
        let (amount, burned) = if wanted >= slice {
            (slice, held)
        } else {
            let burned = AccountingLedger::new(staked, total)
                .preview_withdraw(wanted)
                .or_revert(&env);
            (wanted, SafeMath::min(burned, held))
        };
        if amount.is_zero() {
            return amount;
        }

        let unstaked = StakingMarketContractRef::new(env.clone(), instance.staking_pool)
            .unstake(instance.config.pool_id, amount);
        self.set_pool_shares(vault, &instance, held - burned, total - burned);

        self.swap(instance.router, unstaked, stake_token, asset)
    }
}
