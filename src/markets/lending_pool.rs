//! Lending Pool - Compound style money market
//!
//! Accounts supply listed assets as collateral and borrow listed assets
//! against them. Borrows accrue interest every second through a global
//! borrow index per asset; the rate follows the utilization of that asset.
//! Suppliers do not earn interest, accrued interest is kept as reserves.

use odra::prelude::*;
use odra::casper_types::U256;
use odra::ContractRef;
use crate::errors::MarketError;
use crate::math::{MathError, SafeMath, WAD};
use crate::token::Cep18TokenContractRef;
use super::events::*;
use super::interest_rate::InterestRateModel;
use super::interfaces::PriceFeedContractRef;

/// Highest collateral factor a market may be listed with (90%)
pub const MAX_COLLATERAL_FACTOR_BPS: u32 = 9_000;

/// Accrual period of the borrow index, in milliseconds of block time
pub const ACCRUAL_PERIOD_MS: u64 = 1_000;

/// Listing parameters of an asset
#[odra::odra_type]
pub struct MarketConfig {
    pub price_feed: Address,
    /// Share of the supplied value usable as borrowing power, in bps
    pub collateral_factor_bps: u32,
    pub decimals: u8,
    pub rate_model: InterestRateModel,
}

/// Aggregate accounting of one asset
#[odra::odra_type]
pub struct MarketState {
    /// Tokens held by the pool
    pub cash: U256,
    pub total_supplied: U256,
    pub total_borrows: U256,
    pub total_reserves: U256,
    /// Cumulative interest factor (scaled by 1e18)
    pub borrow_index: U256,
    /// Block time of the last accrual
    pub last_accrual: u64,
}

/// Borrow of one account, expressed at the index it was last touched
#[odra::odra_type]
pub struct BorrowSnapshot {
    pub principal: U256,
    pub index: U256,
}

/// Lending Pool contract
#[odra::module]
pub struct LendingPool {
    /// Listed assets
    markets: Mapping<Address, MarketConfig>,
    /// Per-asset accounting
    states: Mapping<Address, MarketState>,
    /// Supplied collateral: (asset, account) -> amount
    supplies: Mapping<(Address, Address), U256>,
    /// Borrows: (asset, account) -> snapshot
    borrows: Mapping<(Address, Address), BorrowSnapshot>,
    /// Assets an account supplied or borrowed
    account_assets: Mapping<Address, Vec<Address>>,
    /// Admin address
    admin: Var<Address>,
    /// Paused state
    paused: Var<bool>,
}

#[odra::module]
impl LendingPool {
    /// Initialize the lending pool
    pub fn init(&mut self) {
        self.admin.set(self.env().caller());
        self.paused.set(false);
    }

    // ========================================
    // Market Management (Admin)
    // ========================================

    /// List an asset so it can be supplied and borrowed
    pub fn list_market(
        &mut self,
        asset: Address,
        price_feed: Address,
        collateral_factor_bps: u32,
        rate_model: InterestRateModel,
    ) {
        self.only_admin();

        if self.markets.get(&asset).is_some() {
            self.env().revert(MarketError::MarketAlreadyListed);
        }
        if collateral_factor_bps > MAX_COLLATERAL_FACTOR_BPS || !rate_model.is_valid() {
            self.env().revert(MarketError::InvalidParameters);
        }

        let decimals = Cep18TokenContractRef::new(self.env(), asset).decimals();
        self.markets.set(&asset, MarketConfig {
            price_feed,
            collateral_factor_bps,
            decimals,
            rate_model,
        });
        self.states.set(&asset, MarketState {
            cash: U256::zero(),
            total_supplied: U256::zero(),
            total_borrows: U256::zero(),
            total_reserves: U256::zero(),
            borrow_index: U256::from(WAD),
            last_accrual: self.env().get_block_time(),
        });

        self.env().emit_event(MarketListed {
            asset,
            price_feed,
            collateral_factor_bps,
        });
    }

    pub fn set_paused(&mut self, paused: bool) {
        self.only_admin();
        self.paused.set(paused);

        self.env().emit_event(PauseChanged {
            paused,
            changed_by: self.env().caller(),
        });
    }

    // ========================================
    // Supply / Redeem
    // ========================================

    /// Supply collateral
    pub fn supply(&mut self, asset: Address, amount: U256) {
        self.ensure_not_paused();
        self.ensure_positive(amount);
        let mut state = self.accrue(asset);
        let caller = self.env().caller();

        let mut token = Cep18TokenContractRef::new(self.env(), asset);
        token.transfer_from(caller, self.env().self_address(), amount);

        let supplied = self.supplied_balance(asset, caller);
        self.supplies.set(&(asset, caller), supplied + amount);
        state.cash = state.cash + amount;
        state.total_supplied = state.total_supplied + amount;
        self.states.set(&asset, state);
        self.enter_market(caller, asset);

        self.env().emit_event(Supplied {
            account: caller,
            asset,
            amount,
            timestamp: self.env().get_block_time(),
        });
    }

    /// Withdraw supplied collateral, keeping the account healthy
    pub fn redeem_supplied(&mut self, asset: Address, amount: U256) {
        self.ensure_not_paused();
        self.ensure_positive(amount);
        let mut state = self.accrue(asset);
        let caller = self.env().caller();

        let supplied = self.supplied_balance(asset, caller);
        if supplied < amount {
            self.env().revert(MarketError::InsufficientSupply);
        }
        if state.cash < amount {
            self.env().revert(MarketError::InsufficientCash);
        }

        self.supplies.set(&(asset, caller), supplied - amount);
        state.cash = state.cash - amount;
        state.total_supplied = state.total_supplied - amount;
        self.states.set(&asset, state);
        self.ensure_healthy(caller);

        let mut token = Cep18TokenContractRef::new(self.env(), asset);
        token.transfer(caller, amount);

        self.env().emit_event(SupplyRedeemed {
            account: caller,
            asset,
            amount,
            timestamp: self.env().get_block_time(),
        });
    }

    // ========================================
    // Borrowing
    // ========================================

    /// Borrow against the caller's collateral
    pub fn borrow(&mut self, asset: Address, amount: U256) {
        self.ensure_not_paused();
        self.ensure_positive(amount);
        let mut state = self.accrue(asset);
        let caller = self.env().caller();

        if state.cash < amount {
            self.env().revert(MarketError::InsufficientCash);
        }

        let account_borrows = self.borrow_balance_at(asset, caller, &state) + amount;
        self.borrows.set(&(asset, caller), BorrowSnapshot {
            principal: account_borrows,
            index: state.borrow_index,
        });
        state.cash = state.cash - amount;
        state.total_borrows = state.total_borrows + amount;
        self.states.set(&asset, state);
        self.enter_market(caller, asset);
        self.ensure_healthy(caller);

        let mut token = Cep18TokenContractRef::new(self.env(), asset);
        token.transfer(caller, amount);

        self.env().emit_event(MarketBorrow {
            borrower: caller,
            asset,
            amount,
            account_borrows,
            timestamp: self.env().get_block_time(),
        });
    }

    /// Repay part of the caller's borrow
    pub fn repay_borrow(&mut self, asset: Address, amount: U256) {
        self.ensure_not_paused();
        self.ensure_positive(amount);
        let mut state = self.accrue(asset);
        let caller = self.env().caller();

        let debt = self.borrow_balance_at(asset, caller, &state);
        if amount > debt {
            self.env().revert(MarketError::RepayExceedsDebt);
        }

        let mut token = Cep18TokenContractRef::new(self.env(), asset);
        token.transfer_from(caller, self.env().self_address(), amount);

        let account_borrows = debt - amount;
        self.borrows.set(&(asset, caller), BorrowSnapshot {
            principal: account_borrows,
            index: state.borrow_index,
        });
        state.cash = state.cash + amount;
        state.total_borrows = SafeMath::saturating_sub(state.total_borrows, amount);
        self.states.set(&asset, state);

        self.env().emit_event(MarketRepay {
            payer: caller,
            asset,
            amount,
            account_borrows,
            timestamp: self.env().get_block_time(),
        });
    }

    // ========================================
    // View Functions
    // ========================================

    pub fn is_listed(&self, asset: Address) -> bool {
        self.markets.get(&asset).is_some()
    }

    pub fn is_paused(&self) -> bool {
        self.paused.get_or_default()
    }

    pub fn get_market(&self, asset: Address) -> Option<MarketConfig> {
        self.markets.get(&asset)
    }

    pub fn collateral_factor_bps(&self, asset: Address) -> u32 {
        self.market_config(asset).collateral_factor_bps
    }

    /// Market state with interest accrued up to the current block
    pub fn get_market_state(&self, asset: Address) -> MarketState {
        self.accrued_state(asset)
    }

    pub fn supplied_balance(&self, asset: Address, holder: Address) -> U256 {
        self.supplies.get(&(asset, holder)).unwrap_or_default()
    }

    pub fn borrow_balance_current(&self, asset: Address, holder: Address) -> U256 {
        let state = self.accrued_state(asset);
        self.borrow_balance_at(asset, holder, &state)
    }

    pub fn borrow_rate_per_period(&self, asset: Address) -> U256 {
        let config = self.market_config(asset);
        let state = self.accrued_state(asset);
        config
            .rate_model
            .borrow_rate_per_second(state.cash, state.total_borrows)
            .map_err(MarketError::from)
            .unwrap_or_revert(&self.env())
    }

    pub fn utilization(&self, asset: Address) -> U256 {
        let config = self.market_config(asset);
        let state = self.accrued_state(asset);
        config
            .rate_model
            .utilization(state.cash, state.total_borrows)
            .map_err(MarketError::from)
            .unwrap_or_revert(&self.env())
    }

    /// (borrowing power, debt value) of an account, in price units scaled by 1e18
    pub fn account_values(&self, account: Address) -> (U256, U256) {
        let mut borrowing_power = U256::zero();
        let mut debt_value = U256::zero();

        for asset in self.account_assets.get(&account).unwrap_or_default() {
            let config = self.market_config(asset);
            let supplied = self.supplied_balance(asset, account);
            let borrowed = self.borrow_balance_current(asset, account);
            if supplied.is_zero() && borrowed.is_zero() {
                continue;
            }
            if !supplied.is_zero() {
                let value = self.value_of(&config, supplied);
                borrowing_power = borrowing_power + self.checked(SafeMath::bps(value, config.collateral_factor_bps));
            }
            if !borrowed.is_zero() {
                debt_value = debt_value + self.value_of(&config, borrowed);
            }
        }

        (borrowing_power, debt_value)
    }

    // ========================================
    // Interest Accrual
    // ========================================

    /// Persists the accrued state of `asset` and returns it
    fn accrue(&mut self, asset: Address) -> MarketState {
        let before = self.market_state(asset);
        let state = self.accrued_state(asset);

        if state.total_borrows != before.total_borrows {
            self.env().emit_event(InterestAccrued {
                asset,
                interest: state.total_borrows - before.total_borrows,
                borrow_index: state.borrow_index,
                total_borrows: state.total_borrows,
                timestamp: self.env().get_block_time(),
            });
        }

        self.states.set(&asset, state.clone());
        state
    }

    /// Simple interest over whole elapsed periods, compounded at every accrual
    fn accrued_state(&self, asset: Address) -> MarketState {
        let config = self.market_config(asset);
        let mut state = self.market_state(asset);

        let now = self.env().get_block_time();
        let periods = now.saturating_sub(state.last_accrual) / ACCRUAL_PERIOD_MS;
        if periods == 0 {
            return state;
        }
        state.last_accrual = state.last_accrual + periods * ACCRUAL_PERIOD_MS;
        if state.total_borrows.is_zero() {
            return state;
        }

        let rate = self.checked(config.rate_model.borrow_rate_per_second(state.cash, state.total_borrows));
        let factor = self.checked(SafeMath::mul(rate, U256::from(periods)));
        let scale = U256::from(WAD);
        let interest = self.checked(SafeMath::mul_div_down(state.total_borrows, factor, scale));
        let index_increase = self.checked(SafeMath::mul_div_down(state.borrow_index, factor, scale));

        state.total_borrows = state.total_borrows + interest;
        state.total_reserves = state.total_reserves + interest;
        state.borrow_index = state.borrow_index + index_increase;
        state
    }

    fn borrow_balance_at(&self, asset: Address, account: Address, state: &MarketState) -> U256 {
        match self.borrows.get(&(asset, account)) {
            Some(snapshot) if !snapshot.principal.is_zero() => self.checked(SafeMath::mul_div_down(
                snapshot.principal,
                state.borrow_index,
                snapshot.index,
            )),
            _ => U256::zero(),
        }
    }

    // ========================================
    // Internal Functions
    // ========================================

    /// Price value of `amount`, scaled by 1e18
    fn value_of(&self, config: &MarketConfig, amount: U256) -> U256 {
        let feed = PriceFeedContractRef::new(self.env(), config.price_feed);
        let price = feed.latest_answer();
        if price.is_zero() {
            self.env().revert(MarketError::InvalidPrice);
        }
        let exponent = config.decimals as usize + feed.decimals() as usize;
        let priced = self.checked(SafeMath::mul(amount, price));
        self.checked(SafeMath::mul_div_down(priced, U256::from(WAD), U256::exp10(exponent)))
    }

    fn ensure_healthy(&self, account: Address) {
        let (borrowing_power, debt_value) = self.account_values(account);
        if debt_value > borrowing_power {
            self.env().revert(MarketError::InsufficientCollateral);
        }
    }

    fn enter_market(&mut self, account: Address, asset: Address) {
        let mut assets = self.account_assets.get(&account).unwrap_or_default();
        if !assets.contains(&asset) {
            assets.push(asset);
            self.account_assets.set(&account, assets);
        }
    }

    fn market_config(&self, asset: Address) -> MarketConfig {
        self.markets
            .get(&asset)
            .unwrap_or_revert_with(&self.env(), MarketError::MarketNotListed)
    }

    fn market_state(&self, asset: Address) -> MarketState {
        self.states
            .get(&asset)
            .unwrap_or_revert_with(&self.env(), MarketError::MarketNotListed)
    }

    fn checked(&self, result: Result<U256, MathError>) -> U256 {
        result.map_err(MarketError::from).unwrap_or_revert(&self.env())
    }

    fn ensure_positive(&self, amount: U256) {
        if amount.is_zero() {
            self.env().revert(MarketError::ZeroAmount);
        }
    }

    fn only_admin(&self) {
        let caller = self.env().caller();
        let admin = self.admin.get_or_revert_with(MarketError::Unauthorized);
        if caller != admin {
            self.env().revert(MarketError::Unauthorized);
        }
    }

    fn ensure_not_paused(&self) {
        if self.paused.get_or_default() {
            self.env().revert(MarketError::MarketPaused);
        }
    }
}
