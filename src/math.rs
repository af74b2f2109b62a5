//! Mathematical utilities shared by the vaults and the reference markets
//! Implements checked U256 arithmetic, rounding-aware ratios and AMM formulas
use odra::casper_types::U256;

/// Fee denominator (0.3% fee = 3/1000)
pub const FEE_DENOMINATOR: u128 = 1000;

/// Fee numerator (0.3% fee)
pub const FEE_NUMERATOR: u128 = 3;

/// Basis points in one whole
pub const BPS: u32 = 10_000;

/// Fixed point scale used for rates and indices (1e18)
pub const WAD: u128 = 1_000_000_000_000_000_000;

/// Failures of the pure arithmetic helpers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MathError {
    Overflow,
    Underflow,
    DivisionByZero,
    InsufficientLiquidity,
    InsufficientAmount,
}

/// Direction in which a ratio is rounded
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rounding {
    Down,
    Up,
}

/// Safe math operations for U256
pub struct SafeMath;

impl SafeMath {
    /// Safe addition with overflow check
    pub fn add(a: U256, b: U256) -> Result<U256, MathError> {
        a.checked_add(b).ok_or(MathError::Overflow)
    }

    /// Safe subtraction with underflow check
    pub fn sub(a: U256, b: U256) -> Result<U256, MathError> {
        a.checked_sub(b).ok_or(MathError::Underflow)
    }

    /// Safe multiplication with overflow check
    pub fn mul(a: U256, b: U256) -> Result<U256, MathError> {
        a.checked_mul(b).ok_or(MathError::Overflow)
    }

    /// Safe division with zero check
    pub fn div(a: U256, b: U256) -> Result<U256, MathError> {
        if b.is_zero() {
            return Err(MathError::DivisionByZero);
        }
        Ok(a / b)
    }

    /// `a * b / c` rounded in the requested direction
    pub fn mul_div(a: U256, b: U256, c: U256, rounding: Rounding) -> Result<U256, MathError> {
        if c.is_zero() {
            return Err(MathError::DivisionByZero);
        }
        let product = Self::mul(a, b)?;
        let quotient = product / c;
        match rounding {
            Rounding::Up if !(product % c).is_zero() => Self::add(quotient, U256::one()),
            _ => Ok(quotient),
        }
    }

    pub fn mul_div_down(a: U256, b: U256, c: U256) -> Result<U256, MathError> {
        Self::mul_div(a, b, c, Rounding::Down)
    }

    pub fn mul_div_up(a: U256, b: U256, c: U256) -> Result<U256, MathError> {
        Self::mul_div(a, b, c, Rounding::Up)
    }

    /// Applies a basis-point fraction, rounding down
    pub fn bps(amount: U256, bps: u32) -> Result<U256, MathError> {
        Self::mul_div_down(amount, U256::from(bps), U256::from(BPS))
    }

    /// Saturating subtraction, used where a shortfall is handled by the caller
    pub fn saturating_sub(a: U256, b: U256) -> U256 {
        if a > b { a - b } else { U256::zero() }
    }

    /// Calculate square root using Newton's method (Babylonian method)
    pub fn sqrt(y: U256) -> U256 {
        if y > U256::from(3) {
            let mut z = y;
            let mut x = y / 2 + 1;
            while x < z {
                z = x;
                x = (y / x + x) / 2;
            }
            z
        } else if !y.is_zero() {
            U256::one()
        } else {
            U256::zero()
        }
    }

    /// Returns the minimum of two U256 values
    pub fn min(a: U256, b: U256) -> U256 {
        if a < b { a } else { b }
    }

    /// Returns the maximum of two U256 values
    pub fn max(a: U256, b: U256) -> U256 {
        if a > b { a } else { b }
    }
}

/// Conversions between two tokens priced by oracle feeds
pub struct PriceMath;

impl PriceMath {
    /// Converts `amount` of a token priced at `price_from` (feed with
    /// `feed_decimals_from`) into units of a token priced at `price_to`.
    ///
    /// value = amount * price_from * 10^dec_to * 10^feed_dec_to
    ///         / (price_to * 10^dec_from * 10^feed_dec_from)
    #[allow(clippy::too_many_arguments)]
    pub fn convert(
        amount: U256,
        price_from: U256,
        feed_decimals_from: u8,
        token_decimals_from: u8,
        price_to: U256,
        feed_decimals_to: u8,
        token_decimals_to: u8,
        rounding: Rounding,
    ) -> Result<U256, MathError> {
        let scale_num = Self::pow10(token_decimals_to as u32 + feed_decimals_to as u32)?;
        let scale_den = Self::pow10(token_decimals_from as u32 + feed_decimals_from as u32)?;
        let numerator = SafeMath::mul(SafeMath::mul(amount, price_from)?, scale_num)?;
        let denominator = SafeMath::mul(price_to, scale_den)?;
        SafeMath::mul_div(numerator, U256::one(), denominator, rounding)
    }

    fn pow10(exp: u32) -> Result<U256, MathError> {
        if exp > 76 {
            return Err(MathError::Overflow);
        }
        Ok(U256::exp10(exp as usize))
    }
}

/// AMM (Automated Market Maker) calculations
pub struct AmmMath;

impl AmmMath {
    /// Calculate the amount of output tokens for a given input amount
    /// Uses the constant product formula: x * y = k
    /// With 0.3% fee: amount_out = (amount_in * 997 * reserve_out) / (reserve_in * 1000 + amount_in * 997)
    pub fn get_amount_out(
        amount_in: U256,
        reserve_in: U256,
        reserve_out: U256,
    ) -> Result<U256, MathError> {
        if amount_in.is_zero() {
            return Err(MathError::InsufficientAmount);
        }
        if reserve_in.is_zero() || reserve_out.is_zero() {
            return Err(MathError::InsufficientLiquidity);
        }

        let amount_in_with_fee = SafeMath::mul(
            amount_in,
            U256::from(FEE_DENOMINATOR - FEE_NUMERATOR),
        )?;
        let numerator = SafeMath::mul(amount_in_with_fee, reserve_out)?;
        let denominator = SafeMath::add(
            SafeMath::mul(reserve_in, U256::from(FEE_DENOMINATOR))?,
            amount_in_with_fee,
        )?;

        SafeMath::div(numerator, denominator)
    }

    /// Calculate the optimal amount of token B given an amount of token A
    /// amount_b = amount_a * reserve_b / reserve_a
    pub fn quote(
        amount_a: U256,
        reserve_a: U256,
        reserve_b: U256,
    ) -> Result<U256, MathError> {
        if amount_a.is_zero() {
            return Err(MathError::InsufficientAmount);
        }
        if reserve_a.is_zero() || reserve_b.is_zero() {
            return Err(MathError::InsufficientLiquidity);
        }

        SafeMath::div(SafeMath::mul(amount_a, reserve_b)?, reserve_a)
    }

    /// Liquidity units for a deposit into a pool.
    /// First deposit: sqrt(amount0 * amount1)
    /// Later deposits: min(amount0 * supply / reserve0, amount1 * supply / reserve1)
    pub fn calculate_liquidity(
        amount0: U256,
        amount1: U256,
        reserve0: U256,
        reserve1: U256,
        total_supply: U256,
    ) -> Result<U256, MathError> {
        if total_supply.is_zero() {
            let liquidity = SafeMath::sqrt(SafeMath::mul(amount0, amount1)?);
            if liquidity.is_zero() {
                return Err(MathError::InsufficientAmount);
            }
            Ok(liquidity)
        } else {
            let liquidity0 = SafeMath::mul_div_down(amount0, total_supply, reserve0)?;
            let liquidity1 = SafeMath::mul_div_down(amount1, total_supply, reserve1)?;
            Ok(SafeMath::min(liquidity0, liquidity1))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sqrt() {
        assert_eq!(SafeMath::sqrt(U256::from(0)), U256::from(0));
        assert_eq!(SafeMath::sqrt(U256::from(1)), U256::from(1));
        assert_eq!(SafeMath::sqrt(U256::from(4)), U256::from(2));
        assert_eq!(SafeMath::sqrt(U256::from(10)), U256::from(3));
        assert_eq!(SafeMath::sqrt(U256::from(100)), U256::from(10));
    }

    #[test]
    fn test_mul_div_rounding() {
        let (a, b, c) = (U256::from(10), U256::from(10), U256::from(3));
        assert_eq!(SafeMath::mul_div_down(a, b, c), Ok(U256::from(33)));
        assert_eq!(SafeMath::mul_div_up(a, b, c), Ok(U256::from(34)));

        // Exact division rounds the same way in both directions
        let c = U256::from(4);
        assert_eq!(SafeMath::mul_div_down(a, b, c), Ok(U256::from(25)));
        assert_eq!(SafeMath::mul_div_up(a, b, c), Ok(U256::from(25)));

        assert_eq!(SafeMath::mul_div_up(a, b, U256::zero()), Err(MathError::DivisionByZero));
        assert_eq!(SafeMath::mul(U256::MAX, U256::from(2)), Err(MathError::Overflow));
    }

    #[test]
    fn test_bps() {
        assert_eq!(SafeMath::bps(U256::from(1_000), 5_000), Ok(U256::from(500)));
        assert_eq!(SafeMath::bps(U256::from(3), 5_000), Ok(U256::from(1)));
    }

    #[test]
    fn test_price_conversion_between_decimals() {
        // 1000 USDC (6 decimals, $1 with 8 feed decimals) into WETH (18 decimals, $2000)
        let usdc = U256::from(1_000_000_000u64);
        let weth = PriceMath::convert(
            usdc,
            U256::from(100_000_000u64),
            8,
            6,
            U256::from(200_000_000_000u64),
            8,
            18,
            Rounding::Down,
        )
        .unwrap();
        assert_eq!(weth, U256::from(500_000_000_000_000_000u128));

        // And back again
        let back = PriceMath::convert(
            weth,
            U256::from(200_000_000_000u64),
            8,
            18,
            U256::from(100_000_000u64),
            8,
            6,
            Rounding::Down,
        )
        .unwrap();
        assert_eq!(back, usdc);
    }

    #[test]
    fn test_get_amount_out() {
        let amount_out =
            AmmMath::get_amount_out(U256::from(1000), U256::from(10000), U256::from(10000))
                .unwrap();
        // With 0.3% fee, output should be slightly less than 1000
        assert!(amount_out < U256::from(1000));
        assert!(amount_out > U256::from(900));

        assert_eq!(
            AmmMath::get_amount_out(U256::from(1), U256::zero(), U256::from(1)),
            Err(MathError::InsufficientLiquidity)
        );
    }

    #[test]
    fn test_quote() {
        let amount_b =
            AmmMath::quote(U256::from(1000), U256::from(10000), U256::from(20000)).unwrap();
        assert_eq!(amount_b, U256::from(2000));
    }

    #[test]
    fn test_calculate_liquidity() {
        let first = AmmMath::calculate_liquidity(
            U256::from(10000),
            U256::from(10000),
            U256::zero(),
            U256::zero(),
            U256::zero(),
        )
        .unwrap();
        assert_eq!(first, U256::from(10000));

        let second = AmmMath::calculate_liquidity(
            U256::from(500),
            U256::from(2000),
            U256::from(10000),
            U256::from(10000),
            U256::from(10000),
        )
        .unwrap();
        assert_eq!(second, U256::from(500));
    }
}
