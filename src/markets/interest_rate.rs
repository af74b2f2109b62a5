//! Interest Rate Model - Variable rate model based on utilization
//!
//! Implements a two-slope interest rate model:
//! - Base rate: Minimum interest rate
//! - Optimal utilization: Target utilization rate (e.g., 80%)
//! - Slope 1: Rate increase before optimal utilization
//! - Slope 2: Steep rate increase after optimal utilization

use odra::prelude::*;
use odra::casper_types::U256;
use crate::math::{MathError, SafeMath, WAD};

/// Seconds in a (non-leap) year, used to turn annual rates into per-second rates
pub const SECONDS_PER_YEAR: u64 = 31_536_000;

/// Interest rate model parameters
#[odra::odra_type]
pub struct InterestRateModel {
    /// Base interest rate (annual, scaled by 1e18)
    /// Example: 2% = 0.02 * 1e18 = 20000000000000000
    pub base_rate: U256,

    /// Optimal utilization rate (scaled by 1e18)
    /// Example: 80% = 0.80 * 1e18 = 800000000000000000
    pub optimal_utilization: U256,

    /// Slope 1: Rate increase per utilization before optimal (scaled by 1e18)
    pub slope1: U256,

    /// Slope 2: Rate increase per utilization after optimal (scaled by 1e18)
    pub slope2: U256,
}

impl InterestRateModel {
    /// 2% base, 80% kink, 4% and 75% slopes
    pub fn standard() -> Self {
        Self {
            base_rate: U256::from(20_000_000_000_000_000u128),
            optimal_utilization: U256::from(800_000_000_000_000_000u128),
            slope1: U256::from(40_000_000_000_000_000u128),
            slope2: U256::from(750_000_000_000_000_000u128),
        }
    }

    /// Optimal utilization must lie strictly between 0 and 100%
    pub fn is_valid(&self) -> bool {
        !self.optimal_utilization.is_zero() && self.optimal_utilization < U256::from(WAD)
    }

    /// utilization = borrows / (cash + borrows), scaled by 1e18
    pub fn utilization(&self, cash: U256, borrows: U256) -> Result<U256, MathError> {
        if borrows.is_zero() {
            return Ok(U256::zero());
        }
        let total = SafeMath::add(cash, borrows)?;
        SafeMath::mul_div_down(borrows, U256::from(WAD), total)
    }

    /// Annual borrow rate (scaled by 1e18)
    ///
    /// - If utilization <= optimal:
    ///   rate = base_rate + (utilization / optimal) * slope1
    /// - If utilization > optimal:
    ///   rate = base_rate + slope1 + ((utilization - optimal) / (1 - optimal)) * slope2
    pub fn borrow_rate(&self, cash: U256, borrows: U256) -> Result<U256, MathError> {
        let utilization = self.utilization(cash, borrows)?;
        let scale = U256::from(WAD);

        if utilization <= self.optimal_utilization {
            let increase = SafeMath::mul_div_down(utilization, self.slope1, self.optimal_utilization)?;
            SafeMath::add(self.base_rate, increase)
        } else {
            let excess = utilization - self.optimal_utilization;
            let excess_ratio = SafeMath::mul_div_down(excess, scale, scale - self.optimal_utilization)?;
            let excess_rate = SafeMath::mul_div_down(excess_ratio, self.slope2, scale)?;
            SafeMath::add(SafeMath::add(self.base_rate, self.slope1)?, excess_rate)
        }
    }

    /// Borrow rate per second (scaled by 1e18)
    pub fn borrow_rate_per_second(&self, cash: U256, borrows: U256) -> Result<U256, MathError> {
        SafeMath::div(self.borrow_rate(cash, borrows)?, U256::from(SECONDS_PER_YEAR))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn wad_percent(percent: u64) -> U256 {
        U256::from(WAD) * U256::from(percent) / U256::from(100)
    }

    #[test]
    fn test_utilization_calculation() {
        let model = InterestRateModel::standard();
        // borrows = 500, cash = 500 -> 50%
        assert_eq!(
            model.utilization(U256::from(500), U256::from(500)),
            Ok(wad_percent(50))
        );
        assert_eq!(model.utilization(U256::from(500), U256::zero()), Ok(U256::zero()));
    }

    #[test]
    fn test_borrow_rate_before_optimal() {
        let model = InterestRateModel::standard();
        // 40% utilization is half of the kink: 2% + 4% / 2
        let rate = model.borrow_rate(U256::from(600), U256::from(400)).unwrap();
        assert_eq!(rate, wad_percent(4));

        // Idle market pays the base rate
        assert_eq!(model.borrow_rate(U256::from(1), U256::zero()), Ok(wad_percent(2)));
    }

    #[test]
    fn test_borrow_rate_after_optimal() {
        let model = InterestRateModel::standard();
        // 90% utilization is half way into the steep slope: 2% + 4% + 75% / 2
        let rate = model.borrow_rate(U256::from(100), U256::from(900)).unwrap();
        assert_eq!(rate, U256::from(435_000_000_000_000_000u128));
    }

    #[test]
    fn test_per_second_rate() {
        let model = InterestRateModel::standard();
        let per_second = model.borrow_rate_per_second(U256::from(1), U256::zero()).unwrap();
        assert_eq!(per_second, wad_percent(2) / U256::from(SECONDS_PER_YEAR));
    }

    #[test]
    fn test_validity() {
        assert!(InterestRateModel::standard().is_valid());
        let mut model = InterestRateModel::standard();
        model.optimal_utilization = U256::from(WAD);
        assert!(!model.is_valid());
    }
}
