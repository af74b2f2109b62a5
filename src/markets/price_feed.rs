//! Price Oracle - Single-asset price feed
//!
//! One deployment publishes the price of one asset, Chainlink style:
//! an answer scaled by `decimals` plus the time it was published.

use odra::prelude::*;
use odra::casper_types::U256;
use crate::errors::MarketError;
use super::events::PriceUpdated;

/// Price Oracle contract
#[odra::module]
pub struct PriceOracle {
    /// Latest published answer
    answer: Var<U256>,

    /// Block time (ms) of the latest answer
    updated_at: Var<u64>,

    /// Decimals of the answer
    decimals: Var<u8>,

    /// Maximum answer age in seconds, 0 disables the check
    max_staleness: Var<u64>,

    /// Admin address
    admin: Var<Address>,
}

#[odra::module]
impl PriceOracle {
    /// Initialize the feed with its first answer
    pub fn init(&mut self, decimals: u8, answer: U256, max_staleness: u64) {
        self.admin.set(self.env().caller());
        self.decimals.set(decimals);
        self.max_staleness.set(max_staleness);
        self.publish(answer);
    }

    /// Publish a new answer (admin only)
    pub fn set_answer(&mut self, answer: U256) {
        self.only_admin();
        self.publish(answer);
    }

    /// Latest answer, reverts when it is older than the allowed staleness
    pub fn latest_answer(&self) -> U256 {
        let max_staleness = self.max_staleness.get_or_default();
        if max_staleness > 0 {
            let age = self.env().get_block_time().saturating_sub(self.latest_timestamp());
            if age / 1_000 > max_staleness {
                self.env().revert(MarketError::StalePrice);
            }
        }
        self.answer.get_or_revert_with(MarketError::InvalidPrice)
    }

    pub fn latest_timestamp(&self) -> u64 {
        self.updated_at.get_or_default()
    }

    pub fn decimals(&self) -> u8 {
        self.decimals.get_or_default()
    }

    /// Update max staleness period (admin only)
    pub fn set_max_staleness(&mut self, seconds: u64) {
        self.only_admin();
        self.max_staleness.set(seconds);
    }

    pub fn max_staleness(&self) -> u64 {
        self.max_staleness.get_or_default()
    }

    fn publish(&mut self, answer: U256) {
        if answer.is_zero() {
            self.env().revert(MarketError::InvalidPrice);
        }
        let timestamp = self.env().get_block_time();
        self.answer.set(answer);
        self.updated_at.set(timestamp);

        self.env().emit_event(PriceUpdated {
            answer,
            updated_by: self.env().caller(),
            timestamp,
        });
    }

    fn only_admin(&self) {
        let caller = self.env().caller();
        let admin = self.admin.get_or_revert_with(MarketError::Unauthorized);
        if caller != admin {
            self.env().revert(MarketError::Unauthorized);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use odra::host::{Deployer, HostRef};

    #[test]
    fn test_answer_and_staleness() {
        let env = odra_test::env();
        let mut feed = PriceOracle::deploy(&env, PriceOracleInitArgs {
            decimals: 8,
            answer: U256::from(2_000_0000_0000u64),
            max_staleness: 60,
        });
        assert_eq!(feed.decimals(), 8);
        assert_eq!(feed.latest_answer(), U256::from(2_000_0000_0000u64));

        env.advance_block_time(61_000);
        assert_eq!(feed.try_latest_answer(), Err(MarketError::StalePrice.into()));

        feed.set_answer(U256::from(1_900_0000_0000u64));
        assert_eq!(feed.latest_answer(), U256::from(1_900_0000_0000u64));

        feed.set_max_staleness(0);
        env.advance_block_time(1_000_000_000);
        assert_eq!(feed.latest_answer(), U256::from(1_900_0000_0000u64));
    }

    #[test]
    fn test_rejects_zero_and_strangers() {
        let env = odra_test::env();
        let mut feed = PriceOracle::deploy(&env, PriceOracleInitArgs {
            decimals: 8,
            answer: U256::from(100_000_000u64),
            max_staleness: 0,
        });
        assert_eq!(feed.try_set_answer(U256::zero()), Err(MarketError::InvalidPrice.into()));

        env.set_caller(env.get_account(1));
        assert_eq!(
            feed.try_set_answer(U256::one()),
            Err(MarketError::Unauthorized.into())
        );
    }
}
