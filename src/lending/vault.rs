//! Lending vault factory
//!
//! Each instance supplies its asset as collateral to the lending market and
//! borrows the configured borrow asset against it. Borrowed tokens go to the
//! depositor; redeeming shares requires paying back the debt those shares
//! carry before the collateral is released.
use odra::prelude::*;
use odra::casper_types::bytesrepr::Bytes;
use odra::casper_types::U256;
use odra::ContractRef;

use super::debt::{DebtRecord, DebtTracker};
use crate::errors::VaultError;
use crate::events::{MarketParametersChanged, StrategyBorrowed};
use crate::markets::{LendingMarketContractRef, PriceFeedContractRef};
use crate::math::{PriceMath, Rounding, SafeMath};
use crate::token::Cep18TokenContractRef;
use crate::vault::config::{LendingVaultConfig, VaultConfig};
use crate::vault::{
    OrRevert, ShareLedger, TokenizedVault, VaultId, VaultRecord, VaultRegistry, INITIAL_TEMPLATE,
};

/// Parameters an instance is pinned to at creation
#[odra::odra_type]
pub struct LendingInstance {
    pub market: Address,
    pub config: LendingVaultConfig,
    pub asset_decimals: u8,
    pub borrow_decimals: u8,
}

#[odra::module]
pub struct LendingVaultFactory {
    registry: SubModule<VaultRegistry>,
    shares: SubModule<ShareLedger>,
    debt: SubModule<DebtTracker>,
    /// Market new instances are created against
    lending_market: Var<Address>,
    instances: Mapping<VaultId, LendingInstance>,
    idle: Mapping<VaultId, U256>,
    /// Collateral supplied to the market per instance
    collateral: Mapping<VaultId, U256>,
}

#[odra::module]
impl LendingVaultFactory {
    pub fn init(&mut self, lending_market: Address) {
        let admin = self.env().caller();
        self.registry.init(admin, INITIAL_TEMPLATE);
        self.lending_market.set(lending_market);
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

        to self.debt {
            fn get_debt(&self, vault: VaultId) -> U256;
            fn debt_record(&self, vault: VaultId) -> Option<DebtRecord>;
        }
    }

    // ========================================
    // Factory
    // ========================================

    /// Creates the instance for `(asset, config)` or returns the existing one
    pub fn create_vault(&mut self, asset: Address, config: Bytes) -> VaultId {
        let env = self.env();
        let parsed = LendingVaultConfig::decode(&config).or_revert(&env);
        if parsed.borrow_asset == asset {
            env.revert(VaultError::AssetMismatch);
        }

        let vault = self.registry.compute_vault_id(asset, config.clone());
        if self.registry.vault_exists(vault) {
            return vault;
        }

        let market = self.lending_market();
        let market_ref = LendingMarketContractRef::new(env.clone(), market);
        if !market_ref.is_listed(asset) || !market_ref.is_listed(parsed.borrow_asset) {
            env.revert(VaultError::UnsupportedMarket);
        }
        // Instances share one market account, so none may target more than
        // the market itself lends against the asset.
        if parsed.target_ltv_bps > market_ref.collateral_factor_bps(asset) {
            env.revert(VaultError::InvalidLoanToValue);
        }

        let asset_decimals = Cep18TokenContractRef::new(env.clone(), asset).decimals();
        let borrow_decimals = Cep18TokenContractRef::new(env.clone(), parsed.borrow_asset).decimals();
        let owner = parsed.owner();
        self.instances.set(&vault, LendingInstance {
            market,
            config: parsed,
            asset_decimals,
            borrow_decimals,
        });
        self.registry.register(vault, asset, config, owner);
        vault
    }

    pub fn lending_market(&self) -> Address {
        self.lending_market.get_or_revert_with(VaultError::UnsupportedMarket)
    }

    /// Market used by instances created from now on (admin only)
    pub fn set_lending_market(&mut self, market: Address) {
        self.registry.only_admin();
        self.lending_market.set(market);

        self.env().emit_event(MarketParametersChanged {
            parameter: String::from("lending_market"),
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

    /// Gross figure: collateral plus idle assets, debt not subtracted.
    /// Redeemers settle the debt in the borrow asset, so share prices follow
    /// this value. Use `net_assets` for the instance's NAV.
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

    // ========================================
    // Debt
    // ========================================

    /// Persists the instance's debt as currently reported by the market.
    /// Open to anyone.
    pub fn update_debt(&mut self, vault: VaultId) -> U256 {
        let instance = self.instance(&vault);
        self.debt.refresh(&vault, instance.market, instance.config.borrow_asset)
    }

    /// Borrow asset owed when redeeming `shares`, interest included
    pub fn debt_for_shares(&self, vault: VaultId, shares: U256) -> U256 {
        let instance = self.instance(&vault);
        let supply = self.shares.total_supply(vault);
        self.debt_share(&vault, &instance, shares, supply)
    }

    /// `amount` of the borrow asset expressed in the vault asset, rounded up
    pub fn borrow_asset_value(&self, vault: VaultId, amount: U256) -> U256 {
        let instance = self.instance(&vault);
        self.borrow_in_asset(&instance, amount)
    }

    /// Live debt expressed in the vault asset
    pub fn borrow_value_in_asset(&self, vault: VaultId) -> U256 {
        let instance = self.instance(&vault);
        let debt = self.debt.current_debt(&vault, instance.market, instance.config.borrow_asset);
        self.borrow_in_asset(&instance, debt)
    }

    /// Collateral and idle assets minus the debt value
    pub fn net_assets(&self, vault: VaultId) -> U256 {
        let gross = self.total_assets(vault);
        SafeMath::saturating_sub(gross, self.borrow_value_in_asset(vault))
    }

    pub fn collateral_of(&self, vault: VaultId) -> U256 {
        self.collateral.get(&vault).unwrap_or_default()
    }

    pub fn market_of(&self, vault: VaultId) -> Address {
        self.instance(&vault).market
    }
}

impl LendingVaultFactory {
    fn instance(&self, vault: &VaultId) -> LendingInstance {
        self.instances
            .get(vault)
            .unwrap_or_revert_with(&self.env(), VaultError::VaultNotFound)
    }

    fn debt_share(&self, vault: &VaultId, instance: &LendingInstance, shares: U256, supply: U256) -> U256 {
        if shares.is_zero() || supply.is_zero() {
            return U256::zero();
        }
        let debt = self.debt.current_debt(vault, instance.market, instance.config.borrow_asset);
        if shares >= supply {
            return debt;
        }
        SafeMath::mul_div_up(debt, shares, supply).or_revert(&self.env())
    }

    fn latest_price(&self, feed: Address) -> (U256, u8) {
        let feed = PriceFeedContractRef::new(self.env(), feed);
        let answer = feed.latest_answer();
        if answer.is_zero() {
            self.env().revert(VaultError::PriceUnavailable);
        }
        (answer, feed.decimals())
    }

    fn borrow_in_asset(&self, instance: &LendingInstance, amount: U256) -> U256 {
        if amount.is_zero() {
            return amount;
        }
        let (borrow_price, borrow_feed_decimals) = self.latest_price(instance.config.borrow_price_feed);
        let (asset_price, asset_feed_decimals) = self.latest_price(instance.config.asset_price_feed);
        PriceMath::convert(
            amount,
            borrow_price,
            borrow_feed_decimals,
            instance.borrow_decimals,
            asset_price,
            asset_feed_decimals,
            instance.asset_decimals,
            Rounding::Up,
        )
        .or_revert(&self.env())
    }

    /// Reverts unless `debt` is covered by this instance's own collateral
    /// at the market's collateral factor
    fn ensure_within_collateral_factor(
        &self,
        instance: &LendingInstance,
        asset: Address,
        collateral: U256,
        debt: U256,
    ) {
        let env = self.env();
        let factor = LendingMarketContractRef::new(env.clone(), instance.market).collateral_factor_bps(asset);
        let limit = SafeMath::bps(collateral, factor).or_revert(&env);
        if self.borrow_in_asset(instance, debt) > limit {
            env.revert(VaultError::InsufficientCollateral);
        }
    }

    /// Borrow asset worth `target_ltv_bps` of `assets`
    fn target_borrow(&self, instance: &LendingInstance, assets: U256) -> U256 {
        let (asset_price, asset_feed_decimals) = self.latest_price(instance.config.asset_price_feed);
        let (borrow_price, borrow_feed_decimals) = self.latest_price(instance.config.borrow_price_feed);
        let value = PriceMath::convert(
            assets,
            asset_price,
            asset_feed_decimals,
            instance.asset_decimals,
            borrow_price,
            borrow_feed_decimals,
            instance.borrow_decimals,
            Rounding::Down,
        )
        .or_revert(&self.env());
        SafeMath::bps(value, instance.config.target_ltv_bps).or_revert(&self.env())
    }
}

impl TokenizedVault for LendingVaultFactory {
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
        SafeMath::add(self.collateral_of(*vault), self.idle_assets(vault)).or_revert(&self.env())
    }

    fn sync(&mut self, vault: &VaultId) {
        let instance = self.instance(vault);
        self.debt.refresh(vault, instance.market, instance.config.borrow_asset);
    }

    /// Supplies the deposit and borrows the slice of debt the new shares carry.
    /// The first deposit sets the debt per share from the target LTV.
    fn deploy(&mut self, vault: &VaultId, assets: U256, shares: U256, supply_before: U256, funder: Address) {
        let env = self.env();
        let instance = self.instance(vault);
        let asset = self.vault_asset(vault);

        Cep18TokenContractRef::new(env.clone(), asset).approve(instance.market, assets);
        LendingMarketContractRef::new(env.clone(), instance.market).supply(asset, assets);
        let collateral = self.collateral_of(*vault) + assets;
        self.collateral.set(vault, collateral);

        let borrow_asset = instance.config.borrow_asset;
        let debt = self.debt.current_debt(vault, instance.market, borrow_asset);
        let amount = if supply_before.is_zero() {
            self.target_borrow(&instance, assets)
        } else {
            SafeMath::mul_div_down(debt, shares, supply_before).or_revert(&env)
        };
        if amount.is_zero() {
            return;
        }
        self.ensure_within_collateral_factor(&instance, asset, collateral, debt + amount);

        self.debt.borrow(vault, instance.market, borrow_asset, amount);
        Cep18TokenContractRef::new(env.clone(), borrow_asset).transfer(funder, amount);

        env.emit_event(StrategyBorrowed {
            vault: *vault,
            borrow_asset,
            recipient: funder,
            amount,
            timestamp: env.get_block_time(),
        });
    }

    /// Collects the debt carried by the burned shares from `payer`, repays
    /// the market and releases `needed` collateral
    fn unwind(
        &mut self,
        vault: &VaultId,
        shares: U256,
        supply_before: U256,
        needed: U256,
        payer: Address,
    ) -> U256 {
        let env = self.env();
        let instance = self.instance(vault);
        let borrow_asset = instance.config.borrow_asset;

        let debt_due = self.debt_share(vault, &instance, shares, supply_before);
        if !debt_due.is_zero() {
            let mut borrow_token = Cep18TokenContractRef::new(env.clone(), borrow_asset);
            if borrow_token.balance_of(payer) < debt_due {
                env.revert(VaultError::InsufficientBorrowBalance);
            }
            borrow_token.transfer_from(payer, env.self_address(), debt_due);
            self.debt.repay(vault, instance.market, borrow_asset, debt_due, payer);
        }

        let collateral = self.collateral_of(*vault);
        if needed > collateral {
            env.revert(VaultError::InsufficientLiquidity);
        }
        if !needed.is_zero() {
            let asset = self.vault_asset(vault);
            LendingMarketContractRef::new(env.clone(), instance.market).redeem_supplied(asset, needed);
            self.collateral.set(vault, collateral - needed);
        }
        needed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{self, usdc_units, weth_units, Fixture};
    use odra::host::HostRef;

    fn create(f: &mut Fixture) -> VaultId {
        let config = f.lending_config().encode().unwrap();
        f.lending.create_vault(f.usdc.address().clone(), config)
    }

    #[test]
    fn test_first_deposit_borrows_at_target_ltv() {
        let mut f = testing::setup();
        let vault = create(&mut f);
        let alice = f.alice;

        let shares = f.deposit_lending(vault, alice, usdc_units(1_000));
        assert_eq!(shares, usdc_units(1_000));
        assert_eq!(f.lending.collateral_of(vault), usdc_units(1_000));
        assert_eq!(f.lending.total_assets(vault), usdc_units(1_000));

        // 1000 USD at 50% LTV is 0.25 WETH
        let borrowed = weth_units(1) / 4;
        assert_eq!(f.weth.balance_of(alice), borrowed);
        assert_eq!(f.lending.get_debt(vault), borrowed);
        assert_eq!(f.lending.borrow_value_in_asset(vault), usdc_units(500));
        assert_eq!(f.lending.net_assets(vault), usdc_units(500));
    }

    #[test]
    fn test_later_deposits_carry_the_same_debt_per_share() {
        let mut f = testing::setup();
        let vault = create(&mut f);
        f.deposit_lending(vault, f.alice, usdc_units(1_000));
        f.deposit_lending(vault, f.bob, usdc_units(500));

        assert_eq!(f.weth.balance_of(f.bob), weth_units(1) / 8);
        assert_eq!(
            f.lending.debt_for_shares(vault, usdc_units(500)),
            weth_units(1) / 8
        );
        assert_eq!(f.lending.get_debt(vault), weth_units(3) / 8);
    }

    #[test]
    fn test_redeem_requires_the_borrowed_asset() {
        let mut f = testing::setup();
        let vault = create(&mut f);
        let alice = f.alice;
        f.deposit_lending(vault, alice, usdc_units(1_000));

        // Alice spends the borrowed WETH elsewhere
        f.env.set_caller(alice);
        f.weth.transfer(f.bob, weth_units(1) / 8);

        assert_eq!(
            f.lending.try_redeem(vault, usdc_units(1_000), alice, alice),
            Err(VaultError::InsufficientBorrowBalance.into())
        );
        assert_eq!(f.lending.balance_of(vault, alice), usdc_units(1_000));
        assert_eq!(f.lending.collateral_of(vault), usdc_units(1_000));
    }

    #[test]
    fn test_partial_redeem_repays_proportional_debt() {
        let mut f = testing::setup();
        let vault = create(&mut f);
        let alice = f.alice;
        f.deposit_lending(vault, alice, usdc_units(1_000));

        f.env.set_caller(alice);
        f.weth.approve(f.lending.address().clone(), U256::MAX);
        let assets = f.lending.redeem(vault, usdc_units(400), alice, alice);

        assert_eq!(assets, usdc_units(400));
        assert_eq!(f.usdc.balance_of(alice), usdc_units(400));
        assert_eq!(f.weth.balance_of(alice), weth_units(15) / 100);
        assert_eq!(f.lending.get_debt(vault), weth_units(15) / 100);
        assert_eq!(f.lending.collateral_of(vault), usdc_units(600));
    }

    #[test]
    fn test_creation_checks() {
        let mut f = testing::setup();
        let usdc = f.usdc.address().clone();
        let weth = f.weth.address().clone();

        let config = f.lending_config().encode().unwrap();
        assert_eq!(
            f.lending.try_create_vault(weth, config),
            Err(VaultError::AssetMismatch.into())
        );

        let staking_payload = f.staking_config().encode().unwrap();
        assert_eq!(
            f.lending.try_create_vault(usdc, staking_payload),
            Err(VaultError::ConfigKindMismatch.into())
        );

        let unlisted = f.env.get_account(5);
        let mut config = f.lending_config();
        config.borrow_asset = unlisted;
        assert_eq!(
            f.lending.try_create_vault(usdc, config.encode().unwrap()),
            Err(VaultError::UnsupportedMarket.into())
        );

        assert_eq!(
            f.lending.try_deposit([7u8; 32], usdc_units(1), f.alice),
            Err(VaultError::VaultNotFound.into())
        );
    }

    #[test]
    fn test_target_ltv_is_capped_by_the_collateral_factor() {
        let mut f = testing::setup();
        let usdc = f.usdc.address().clone();

        // The market lends 80% against USDC
        for ltv in [8_001, 9_000] {
            let mut config = f.lending_config();
            config.target_ltv_bps = ltv;
            assert_eq!(
                f.lending.try_create_vault(usdc, config.encode().unwrap()),
                Err(VaultError::InvalidLoanToValue.into())
            );
        }
        assert_eq!(f.lending.vault_count(), 0);

        let mut config = f.lending_config();
        config.target_ltv_bps = 8_000;
        assert!(f.lending.try_create_vault(usdc, config.encode().unwrap()).is_ok());
    }

    #[test]
    fn test_high_ltv_instance_does_not_block_other_exits() {
        let mut f = testing::setup();
        let usdc = f.usdc.address().clone();
        let alice = f.alice;

        let mut aggressive = f.lending_config();
        aggressive.target_ltv_bps = 7_900;
        let high = f.lending.create_vault(usdc, aggressive.encode().unwrap());
        let low = create(&mut f);
        assert_ne!(high, low);

        f.deposit_lending(high, f.bob, usdc_units(1_000));
        f.deposit_lending(low, alice, usdc_units(1_000));
        assert_eq!(f.weth.balance_of(f.bob), weth_units(395) / 1_000);

        // Both instances sit on the factory's single market account
        let factory = f.lending.address().clone();
        assert_eq!(f.lending_pool.supplied_balance(usdc, factory), usdc_units(2_000));

        f.env.set_caller(alice);
        f.weth.approve(factory, U256::MAX);
        let assets = f.lending.redeem(low, usdc_units(1_000), alice, alice);

        assert_eq!(assets, usdc_units(1_000));
        assert_eq!(f.usdc.balance_of(alice), usdc_units(1_000));
        assert_eq!(f.weth.balance_of(alice), U256::zero());
        assert_eq!(f.lending.collateral_of(high), usdc_units(1_000));
        assert_eq!(f.lending_pool.supplied_balance(usdc, factory), usdc_units(1_000));
        assert_eq!(f.lending.get_debt(high), weth_units(395) / 1_000);
    }

    #[test]
    fn test_deposit_cannot_borrow_past_the_instance_collateral_factor() {
        let mut f = testing::setup();
        let usdc = f.usdc.address().clone();
        let bob = f.bob;

        let mut config = f.lending_config();
        config.target_ltv_bps = 7_500;
        let vault = f.lending.create_vault(usdc, config.encode().unwrap());
        f.deposit_lending(vault, f.alice, usdc_units(1_000));

        // WETH rallies; the debt per share now exceeds 80% of the collateral
        f.weth_feed.set_answer(U256::from(2_500u64) * U256::from(100_000_000u64));

        f.mint_usdc(bob, usdc_units(1_000));
        f.env.set_caller(bob);
        f.usdc.approve(f.lending.address().clone(), usdc_units(1_000));
        assert_eq!(
            f.lending.try_deposit(vault, usdc_units(1_000), bob),
            Err(VaultError::InsufficientCollateral.into())
        );
        assert_eq!(f.usdc.balance_of(bob), usdc_units(1_000));
        assert_eq!(f.lending.balance_of(vault, bob), U256::zero());
        assert_eq!(f.lending.collateral_of(vault), usdc_units(1_000));
    }

    #[test]
    fn test_market_setter_is_admin_only() {
        let mut f = testing::setup();
        let other = f.env.get_account(5);

        f.env.set_caller(f.alice);
        assert_eq!(
            f.lending.try_set_lending_market(other),
            Err(VaultError::Unauthorized.into())
        );

        f.env.set_caller(f.admin);
        f.lending.set_lending_market(other);
        assert_eq!(f.lending.lending_market(), other);
    }
}
