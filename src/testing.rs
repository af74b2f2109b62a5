//! Test fixture: two tokens, their feeds, the reference markets and all
//! three factories deployed on the MockVM.
//!
//! Account 0 deploys everything and mints, account 1 supplies WETH
//! liquidity to the lending pool, accounts 2 and 3 are depositors.
use odra::casper_types::U256;
use odra::host::{Deployer, HostEnv, HostRef, NoArgs};
use odra::prelude::*;

use crate::delta_neutral::vault::{
    DeltaNeutralVaultFactory, DeltaNeutralVaultFactoryHostRef, DeltaNeutralVaultFactoryInitArgs,
};
use crate::lending::vault::{
    LendingVaultFactory, LendingVaultFactoryHostRef, LendingVaultFactoryInitArgs,
};
use crate::markets::interest_rate::InterestRateModel;
use crate::markets::lending_pool::{LendingPool, LendingPoolHostRef};
use crate::markets::price_feed::{PriceOracle, PriceOracleHostRef, PriceOracleInitArgs};
use crate::markets::router::{AmmRouter, AmmRouterHostRef};
use crate::markets::staking_pool::{StakingPool, StakingPoolHostRef, StakingPoolInitArgs};
use crate::staking::vault::{
    StakingVaultFactory, StakingVaultFactoryHostRef, StakingVaultFactoryInitArgs,
};
use crate::token::{AssetToken, AssetTokenHostRef, AssetTokenInitArgs};
use crate::vault::config::{
    DeltaNeutralVaultConfig, LendingVaultConfig, StakingVaultConfig, VaultConfig,
};
use crate::vault::VaultId;

/// WETH emitted by the reward pool every second
pub const REWARD_RATE: u64 = 1_000_000_000;

pub const TARGET_LTV_BPS: u32 = 5_000;

pub const MAX_SLIPPAGE_BPS: u32 = 100;

pub fn usdc_units(amount: u64) -> U256 {
    U256::from(amount) * U256::exp10(6)
}

pub fn weth_units(amount: u64) -> U256 {
    U256::from(amount) * U256::exp10(18)
}

pub struct Fixture {
    pub env: HostEnv,
    pub admin: Address,
    pub supplier: Address,
    pub alice: Address,
    pub bob: Address,
    pub usdc: AssetTokenHostRef,
    pub weth: AssetTokenHostRef,
    pub usdc_feed: PriceOracleHostRef,
    pub weth_feed: PriceOracleHostRef,
    pub lending_pool: LendingPoolHostRef,
    pub staking_pool: StakingPoolHostRef,
    pub router: AmmRouterHostRef,
    pub pool_id: u32,
    pub lending: LendingVaultFactoryHostRef,
    pub staking: StakingVaultFactoryHostRef,
    pub delta: DeltaNeutralVaultFactoryHostRef,
}

pub fn setup() -> Fixture {
    let env = odra_test::env();
    let admin = env.get_account(0);
    let supplier = env.get_account(1);
    env.set_caller(admin);

    let mut usdc = AssetToken::deploy(&env, AssetTokenInitArgs {
        name: String::from("USD Coin"),
        symbol: String::from("USDC"),
        decimals: 6,
    });
    let mut weth = AssetToken::deploy(&env, AssetTokenInitArgs {
        name: String::from("Wrapped Ether"),
        symbol: String::from("WETH"),
        decimals: 18,
    });
    let usdc_feed = PriceOracle::deploy(&env, PriceOracleInitArgs {
        decimals: 8,
        answer: U256::from(100_000_000u64),
        max_staleness: 0,
    });
    let weth_feed = PriceOracle::deploy(&env, PriceOracleInitArgs {
        decimals: 8,
        answer: U256::from(200_000_000_000u64),
        max_staleness: 0,
    });

    // Money market with 100 WETH to borrow
    let mut lending_pool = LendingPool::deploy(&env, NoArgs);
    lending_pool.list_market(usdc.address().clone(), usdc_feed.address().clone(), 8_000, InterestRateModel::standard());
    lending_pool.list_market(weth.address().clone(), weth_feed.address().clone(), 8_000, InterestRateModel::standard());
    weth.mint(supplier, weth_units(100));
    env.set_caller(supplier);
    weth.approve(lending_pool.address().clone(), weth_units(100));
    lending_pool.supply(weth.address().clone(), weth_units(100));
    env.set_caller(admin);

    // 1,000,000 USDC / 500 WETH, i.e. 2000 USDC per WETH
    let mut router = AmmRouter::deploy(&env, NoArgs);
    usdc.mint(admin, usdc_units(1_000_000));
    weth.mint(admin, weth_units(500));
    usdc.approve(router.address().clone(), usdc_units(1_000_000));
    weth.approve(router.address().clone(), weth_units(500));
    router.add_liquidity(
        usdc.address().clone(),
        weth.address().clone(),
        usdc_units(1_000_000),
        weth_units(500),
    );

    // WETH staking paying WETH rewards
    let mut staking_pool = StakingPool::deploy(&env, StakingPoolInitArgs {
        reward_token: weth.address().clone(),
    });
    let pool_id = staking_pool.create_pool(weth.address().clone(), U256::from(REWARD_RATE));
    weth.mint(staking_pool.address().clone(), weth_units(1_000));

    let lending = LendingVaultFactory::deploy(&env, LendingVaultFactoryInitArgs {
        lending_market: lending_pool.address().clone(),
    });
    let staking = StakingVaultFactory::deploy(&env, StakingVaultFactoryInitArgs {
        router: router.address().clone(),
        staking_pool: staking_pool.address().clone(),
        max_slippage_bps: MAX_SLIPPAGE_BPS,
    });
    let delta = DeltaNeutralVaultFactory::deploy(&env, DeltaNeutralVaultFactoryInitArgs {
        max_slippage_bps: MAX_SLIPPAGE_BPS,
    });

    Fixture {
        alice: env.get_account(2),
        bob: env.get_account(3),
        env,
        admin,
        supplier,
        usdc,
        weth,
        usdc_feed,
        weth_feed,
        lending_pool,
        staking_pool,
        router,
        pool_id,
        lending,
        staking,
        delta,
    }
}

impl Fixture {
    /// USDC collateral, WETH debt
    pub fn lending_config(&self) -> LendingVaultConfig {
        LendingVaultConfig {
            borrow_asset: self.weth.address().clone(),
            asset_price_feed: self.usdc_feed.address().clone(),
            borrow_price_feed: self.weth_feed.address().clone(),
            target_ltv_bps: TARGET_LTV_BPS,
            owner: self.admin,
        }
    }

    pub fn staking_config(&self) -> StakingVaultConfig {
        StakingVaultConfig {
            stake_token: self.weth.address().clone(),
            pool_id: self.pool_id,
            owner: self.admin,
        }
    }

    pub fn delta_config(&self) -> DeltaNeutralVaultConfig {
        DeltaNeutralVaultConfig {
            lending_factory: self.lending.address().clone(),
            lending_asset: self.usdc.address().clone(),
            lending_config: self.lending_config().encode().unwrap(),
            staking_factory: self.staking.address().clone(),
            staking_asset: self.weth.address().clone(),
            staking_config: self.staking_config().encode().unwrap(),
            owner: self.admin,
        }
    }

    pub fn create_delta_vault(&mut self) -> VaultId {
        let config = self.delta_config().encode().unwrap();
        let usdc = self.usdc.address().clone();
        self.delta.create_vault(usdc, config)
    }

    pub fn mint_usdc(&mut self, to: Address, amount: U256) {
        self.env.set_caller(self.admin);
        self.usdc.mint(to, amount);
    }

    pub fn mint_weth(&mut self, to: Address, amount: U256) {
        self.env.set_caller(self.admin);
        self.weth.mint(to, amount);
    }

    pub fn deposit_lending(&mut self, vault: VaultId, who: Address, amount: U256) -> U256 {
        self.mint_usdc(who, amount);
        self.env.set_caller(who);
        self.usdc.approve(self.lending.address().clone(), amount);
        let shares = self.lending.deposit(vault, amount, who);
        self.env.set_caller(self.admin);
        shares
    }

    pub fn deposit_staking(&mut self, vault: VaultId, who: Address, amount: U256) -> U256 {
        self.mint_weth(who, amount);
        self.env.set_caller(who);
        self.weth.approve(self.staking.address().clone(), amount);
        let shares = self.staking.deposit(vault, amount, who);
        self.env.set_caller(self.admin);
        shares
    }

    pub fn deposit_staking_usdc(&mut self, vault: VaultId, who: Address, amount: U256) -> U256 {
        self.mint_usdc(who, amount);
        self.env.set_caller(who);
        self.usdc.approve(self.staking.address().clone(), amount);
        let shares = self.staking.deposit(vault, amount, who);
        self.env.set_caller(self.admin);
        shares
    }

    pub fn deposit_delta(&mut self, vault: VaultId, who: Address, amount: U256) -> U256 {
        self.mint_usdc(who, amount);
        self.env.set_caller(who);
        self.usdc.approve(self.delta.address().clone(), amount);
        let shares = self.delta.deposit(vault, amount, who);
        self.env.set_caller(self.admin);
        shares
    }
}
