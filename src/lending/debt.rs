//! Debt bookkeeping of lending instances
//!
//! All lending instances of a factory borrow through the factory's single
//! market account. Each instance owns debt shares of the factory's borrow
//! of a given (market, asset) pair, so its live debt is an exact slice of
//! the balance the market reports. The persisted figure only moves on
//! `refresh`, `borrow` and `repay`.
use odra::prelude::*;
use odra::casper_types::U256;
use odra::ContractRef;

use crate::accounting::AccountingLedger;
use crate::errors::VaultError;
use crate::events::{DebtRepaid, DebtUpdated};
use crate::markets::LendingMarketContractRef;
use crate::math::SafeMath;
use crate::token::Cep18TokenContractRef;
use crate::vault::{OrRevert, VaultId};

/// Last persisted debt of an instance
#[odra::odra_type]
pub struct DebtRecord {
    /// Debt in the borrowed asset
    pub debt: U256,
    /// Borrow rate per second reported by the market (scaled by 1e18)
    pub borrow_rate: U256,
    /// Block time of the last update
    pub last_accrual: u64,
}

#[odra::module]
pub struct DebtTracker {
    debt_shares: Mapping<VaultId, U256>,
    total_debt_shares: Mapping<(Address, Address), U256>,
    records: Mapping<VaultId, DebtRecord>,
}

#[odra::module]
impl DebtTracker {
    /// Persisted debt, possibly behind the market
    pub fn get_debt(&self, vault: VaultId) -> U256 {
        self.records
            .get(&vault)
            .map(|record| record.debt)
            .unwrap_or_default()
    }

    pub fn debt_record(&self, vault: VaultId) -> Option<DebtRecord> {
        self.records.get(&vault)
    }

    pub fn debt_shares_of(&self, vault: VaultId) -> U256 {
        self.debt_shares.get(&vault).unwrap_or_default()
    }
}

impl DebtTracker {
    /// Borrow balance of the factory account, interest included
    pub fn market_debt(&self, market: Address, asset: Address) -> U256 {
        LendingMarketContractRef::new(self.env(), market)
            .borrow_balance_current(asset, self.env().self_address())
    }

    /// Live debt of an instance, rounded up
    pub fn current_debt(&self, vault: &VaultId, market: Address, asset: Address) -> U256 {
        let shares = self.debt_shares_of(*vault);
        if shares.is_zero() {
            return U256::zero();
        }
        let total = self.total_shares(market, asset);
        let market_debt = self.market_debt(market, asset);
        if shares == total {
            return market_debt;
        }
        SafeMath::mul_div_up(market_debt, shares, total).or_revert(&self.env())
    }

    /// Pulls the live debt and borrow rate from the market and persists them.
    /// The persisted debt never decreases without a repayment.
    pub fn refresh(&mut self, vault: &VaultId, market: Address, asset: Address) -> U256 {
        let live = self.current_debt(vault, market, asset);
        let debt = SafeMath::max(live, self.get_debt(*vault));
        self.persist(vault, market, asset, debt);
        debt
    }

    /// Borrows `amount` for `vault` and mints the matching debt shares
    pub fn borrow(&mut self, vault: &VaultId, market: Address, asset: Address, amount: U256) {
        let before = self.market_debt(market, asset);
        let total = self.total_shares(market, asset);
        let minted = AccountingLedger::new(before, total)
            .preview_withdraw(amount)
            .or_revert(&self.env());

        LendingMarketContractRef::new(self.env(), market).borrow(asset, amount);

        let held = self.debt_shares_of(*vault);
        self.debt_shares.set(vault, held + minted);
        self.total_debt_shares.set(&(market, asset), total + minted);

        let debt = self.current_debt(vault, market, asset);
        self.persist(vault, market, asset, debt);
    }

    /// Repays `amount` of the instance's debt with tokens the factory holds.
    /// Paying the whole live debt clears every debt share of the instance.
    pub fn repay(&mut self, vault: &VaultId, market: Address, asset: Address, amount: U256, payer: Address) {
        if amount.is_zero() {
            return;
        }
        let market_debt = self.market_debt(market, asset);
        let owed = self.current_debt(vault, market, asset);
        if amount > owed || amount > market_debt {
            self.env().revert(VaultError::InsufficientLiquidity);
        }

        let shares = self.debt_shares_of(*vault);
        let total = self.total_shares(market, asset);
        let burned = if amount == owed {
            shares
        } else {
            let burned = AccountingLedger::new(market_debt, total)
                .preview_deposit(amount)
                .or_revert(&self.env());
            SafeMath::min(burned, shares)
        };

        Cep18TokenContractRef::new(self.env(), asset).approve(market, amount);
        LendingMarketContractRef::new(self.env(), market).repay_borrow(asset, amount);

        self.debt_shares.set(vault, shares - burned);
        self.total_debt_shares.set(&(market, asset), total - burned);

        let remaining_debt = self.current_debt(vault, market, asset);
        self.persist(vault, market, asset, remaining_debt);

        self.env().emit_event(DebtRepaid {
            vault: *vault,
            payer,
            amount,
            remaining_debt,
            timestamp: self.env().get_block_time(),
        });
    }

    fn total_shares(&self, market: Address, asset: Address) -> U256 {
        self.total_debt_shares.get(&(market, asset)).unwrap_or_default()
    }

    fn persist(&mut self, vault: &VaultId, market: Address, asset: Address, debt: U256) {
        let previous_debt = self.get_debt(*vault);
        let borrow_rate = LendingMarketContractRef::new(self.env(), market).borrow_rate_per_period(asset);
        let timestamp = self.env().get_block_time();
        self.records.set(vault, DebtRecord {
            debt,
            borrow_rate,
            last_accrual: timestamp,
        });

        self.env().emit_event(DebtUpdated {
            vault: *vault,
            previous_debt,
            debt,
            borrow_rate,
            timestamp,
        });
    }
}
