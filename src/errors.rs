//! Error definitions for the vault contracts and the reference markets
use odra::prelude::*;

use crate::math::MathError;
use crate::vault::config::ConfigError;

/// Errors raised by vault factories and vault instances
#[odra::odra_error]
pub enum VaultError {
    /// Configuration payload could not be decoded
    InvalidConfig = 1,

    /// Configuration payload carries an unknown version byte
    UnsupportedConfigVersion = 2,

    /// Configuration payload was built for another vault kind
    ConfigKindMismatch = 3,

    /// Asset does not match the one the configuration requires
    AssetMismatch = 4,

    /// Target loan-to-value outside of the accepted range
    InvalidLoanToValue = 5,

    /// Slippage tolerance outside of the accepted range
    InvalidSlippage = 6,

    /// No vault instance is registered under the given id
    VaultNotFound = 7,

    /// Staking pool does not exist or stakes another token
    UnsupportedPool = 8,

    /// Router has no pool for the required swap
    SwapRouteUnavailable = 9,

    /// Lending market does not list one of the assets
    UnsupportedMarket = 10,

    /// Caller lacks the required role
    Unauthorized = 11,

    /// Share allowance too small for the requested operation
    InsufficientAllowance = 12,

    /// Owner holds fewer shares than requested
    InsufficientShares = 20,

    /// Strategy could not return the requested assets
    InsufficientLiquidity = 21,

    /// Not enough of the borrowed asset to settle the debt
    InsufficientBorrowBalance = 22,

    /// Amount must be greater than zero
    ZeroAmount = 23,

    /// Operation would mint or burn zero shares
    ZeroShares = 24,

    /// Borrow would push the instance's debt past its collateral factor
    InsufficientCollateral = 25,

    /// Price feed returned a non-positive answer
    PriceUnavailable = 30,

    /// Overflow error
    Overflow = 40,

    /// Underflow error
    Underflow = 41,

    /// Division by zero
    DivisionByZero = 42,
}

/// Custom errors for the asset token contract
#[odra::odra_error]
pub enum TokenError {
    /// Insufficient allowance for transfer
    InsufficientAllowance = 100,

    /// Insufficient balance for transfer
    InsufficientBalance = 101,

    /// Only the minter may create new tokens
    Unauthorized = 102,
}

/// Errors raised by the reference lending, staking, swap and price markets
#[odra::odra_error]
pub enum MarketError {
    /// Caller is not the market administrator
    Unauthorized = 200,

    /// Market is paused
    MarketPaused = 201,

    /// Asset is not listed in the market
    MarketNotListed = 202,

    /// Asset is already listed
    MarketAlreadyListed = 203,

    /// Not enough cash in the market
    InsufficientCash = 204,

    /// Account would become undercollateralized
    InsufficientCollateral = 205,

    /// Repayment larger than the outstanding borrow
    RepayExceedsDebt = 206,

    /// Withdrawal larger than the supplied balance
    InsufficientSupply = 207,

    /// Amount must be greater than zero
    ZeroAmount = 208,

    /// Invalid market parameters
    InvalidParameters = 209,

    /// Staking pool does not exist
    PoolNotFound = 210,

    /// Staking pool is not active
    PoolNotActive = 211,

    /// Stake smaller than the requested amount
    InsufficientStake = 212,

    /// Swap deadline expired
    DeadlineExpired = 213,

    /// Swap output below the requested minimum
    InsufficientOutputAmount = 214,

    /// Swap path is invalid
    InvalidPath = 215,

    /// Not enough liquidity in the swap pool
    InsufficientLiquidity = 216,

    /// Price is zero or negative
    InvalidPrice = 217,

    /// Price is older than the allowed staleness
    StalePrice = 218,

    /// Overflow error
    Overflow = 219,

    /// Underflow error
    Underflow = 220,

    /// Division by zero
    DivisionByZero = 221,
}

impl From<MathError> for VaultError {
    fn from(error: MathError) -> Self {
        match error {
            MathError::Overflow => VaultError::Overflow,
            MathError::Underflow => VaultError::Underflow,
            MathError::DivisionByZero => VaultError::DivisionByZero,
            MathError::InsufficientLiquidity | MathError::InsufficientAmount => {
                VaultError::InsufficientLiquidity
            }
        }
    }
}

impl From<MathError> for MarketError {
    fn from(error: MathError) -> Self {
        match error {
            MathError::Overflow => MarketError::Overflow,
            MathError::Underflow => MarketError::Underflow,
            MathError::DivisionByZero => MarketError::DivisionByZero,
            MathError::InsufficientLiquidity => MarketError::InsufficientLiquidity,
            MathError::InsufficientAmount => MarketError::ZeroAmount,
        }
    }
}

impl From<ConfigError> for VaultError {
    fn from(error: ConfigError) -> Self {
        match error {
            ConfigError::Malformed => VaultError::InvalidConfig,
            ConfigError::KindMismatch => VaultError::ConfigKindMismatch,
            ConfigError::UnsupportedVersion => VaultError::UnsupportedConfigVersion,
            ConfigError::InvalidLoanToValue => VaultError::InvalidLoanToValue,
        }
    }
}
