//! AMM Router - Constant product pools behind a single contract
//!
//! The router keeps the reserves of every token pair itself instead of
//! deploying a pair contract per pool. It provides:
//! - Adding liquidity
//! - Multi-hop exact input swaps with deadline protection
//! - Quotes along a swap path
use odra::prelude::*;
use odra::casper_types::U256;
use odra::ContractRef;
use crate::errors::MarketError;
use crate::math::{AmmMath, MathError};
use crate::token::Cep18TokenContractRef;
use super::events::{LiquidityAdded, Swapped};

/// Reserves of a pool, tokens sorted by address
#[odra::odra_type]
pub struct PoolReserves {
    pub token0: Address,
    pub token1: Address,
    pub reserve0: U256,
    pub reserve1: U256,
    pub total_liquidity: U256,
}

/// Router contract for user interactions
#[odra::module]
pub struct AmmRouter {
    /// Pools keyed by sorted token pair
    pools: Mapping<(Address, Address), PoolReserves>,
    /// Liquidity units held by each provider
    liquidity: Mapping<(Address, Address, Address), U256>,
}

#[odra::module]
impl AmmRouter {
    pub fn init(&mut self) {}

    // ============ Liquidity Functions ============

    /// Add liquidity to a pair, creating the pool on first use.
    /// Amounts are trimmed to the current pool ratio.
    pub fn add_liquidity(
        &mut self,
        token_a: Address,
        token_b: Address,
        amount_a_desired: U256,
        amount_b_desired: U256,
    ) -> U256 {
        if token_a == token_b {
            self.env().revert(MarketError::InvalidPath);
        }
        if amount_a_desired.is_zero() || amount_b_desired.is_zero() {
            self.env().revert(MarketError::ZeroAmount);
        }

        let (token0, token1) = Self::sort_tokens(token_a, token_b);
        let mut pool = self.pools.get(&(token0, token1)).unwrap_or(PoolReserves {
            token0,
            token1,
            reserve0: U256::zero(),
            reserve1: U256::zero(),
            total_liquidity: U256::zero(),
        });

        let (reserve_a, reserve_b) = Self::oriented(&pool, token_a);
        let (amount_a, amount_b) = if reserve_a.is_zero() || reserve_b.is_zero() {
            (amount_a_desired, amount_b_desired)
        } else {
            let amount_b_optimal = self.checked(AmmMath::quote(amount_a_desired, reserve_a, reserve_b));
            if amount_b_optimal <= amount_b_desired {
                (amount_a_desired, amount_b_optimal)
            } else {
                let amount_a_optimal = self.checked(AmmMath::quote(amount_b_desired, reserve_b, reserve_a));
                (amount_a_optimal, amount_b_desired)
            }
        };

        let (amount0, amount1) = if token_a == token0 {
            (amount_a, amount_b)
        } else {
            (amount_b, amount_a)
        };
        let minted = self.checked(AmmMath::calculate_liquidity(
            amount0,
            amount1,
            pool.reserve0,
            pool.reserve1,
            pool.total_liquidity,
        ));
        if minted.is_zero() {
            self.env().revert(MarketError::InsufficientLiquidity);
        }

        let provider = self.env().caller();
        let this = self.env().self_address();
        Cep18TokenContractRef::new(self.env(), token0).transfer_from(provider, this, amount0);
        Cep18TokenContractRef::new(self.env(), token1).transfer_from(provider, this, amount1);

        pool.reserve0 = pool.reserve0 + amount0;
        pool.reserve1 = pool.reserve1 + amount1;
        pool.total_liquidity = pool.total_liquidity + minted;
        self.pools.set(&(token0, token1), pool);

        let held = self.liquidity_of(token0, token1, provider);
        self.liquidity.set(&(token0, token1, provider), held + minted);

        self.env().emit_event(LiquidityAdded {
            provider,
            token0,
            token1,
            amount0,
            amount1,
            liquidity: minted,
        });

        minted
    }

    // ============ Swap Functions ============

    /// Swap an exact input amount along `path`, returns the output amount
    pub fn swap(&mut self, amount_in: U256, path: Vec<Address>, min_out: U256, deadline: u64) -> U256 {
        if self.env().get_block_time() > deadline {
            self.env().revert(MarketError::DeadlineExpired);
        }

        let amounts = self.amounts_out(amount_in, &path);
        let amount_out = amounts.last().copied().unwrap_or_default();
        if amount_out < min_out {
            self.env().revert(MarketError::InsufficientOutputAmount);
        }

        let caller = self.env().caller();
        let this = self.env().self_address();
        Cep18TokenContractRef::new(self.env(), path[0]).transfer_from(caller, this, amount_in);

        for (hop, pair) in path.windows(2).enumerate() {
            let (token_in, token_out) = (pair[0], pair[1]);
            let key = Self::sort_tokens(token_in, token_out);
            let mut pool = self.pool_or_revert(token_in, token_out);
            if token_in == pool.token0 {
                pool.reserve0 = pool.reserve0 + amounts[hop];
                pool.reserve1 = pool.reserve1 - amounts[hop + 1];
            } else {
                pool.reserve1 = pool.reserve1 + amounts[hop];
                pool.reserve0 = pool.reserve0 - amounts[hop + 1];
            }
            self.pools.set(&key, pool);
        }

        let token_out = path[path.len() - 1];
        Cep18TokenContractRef::new(self.env(), token_out).transfer(caller, amount_out);

        self.env().emit_event(Swapped {
            sender: caller,
            token_in: path[0],
            token_out,
            amount_in,
            amount_out,
        });

        amount_out
    }

    // ============ Quote Functions ============

    /// Get output amounts for a swap path
    pub fn get_amounts_out(&self, amount_in: U256, path: Vec<Address>) -> Vec<U256> {
        self.amounts_out(amount_in, &path)
    }

    /// Get reserves for a token pair, in argument order
    pub fn get_reserves(&self, token_a: Address, token_b: Address) -> (U256, U256) {
        let pool = self.pool_or_revert(token_a, token_b);
        Self::oriented(&pool, token_a)
    }

    pub fn has_pool(&self, token_a: Address, token_b: Address) -> bool {
        self.pools
            .get(&Self::sort_tokens(token_a, token_b))
            .map(|pool| !pool.reserve0.is_zero() && !pool.reserve1.is_zero())
            .unwrap_or(false)
    }

    pub fn liquidity_of(&self, token_a: Address, token_b: Address, provider: Address) -> U256 {
        let (token0, token1) = Self::sort_tokens(token_a, token_b);
        self.liquidity.get(&(token0, token1, provider)).unwrap_or_default()
    }

    // ============ Internal Functions ============

    fn amounts_out(&self, amount_in: U256, path: &[Address]) -> Vec<U256> {
        if path.len() < 2 {
            self.env().revert(MarketError::InvalidPath);
        }

        let mut amounts = Vec::with_capacity(path.len());
        amounts.push(amount_in);
        for pair in path.windows(2) {
            if pair[0] == pair[1] {
                self.env().revert(MarketError::InvalidPath);
            }
            let pool = self.pool_or_revert(pair[0], pair[1]);
            let (reserve_in, reserve_out) = Self::oriented(&pool, pair[0]);
            let previous = amounts[amounts.len() - 1];
            amounts.push(self.checked(AmmMath::get_amount_out(previous, reserve_in, reserve_out)));
        }
        amounts
    }

    fn pool_or_revert(&self, token_a: Address, token_b: Address) -> PoolReserves {
        self.pools
            .get(&Self::sort_tokens(token_a, token_b))
            .unwrap_or_revert_with(&self.env(), MarketError::PoolNotFound)
    }

    /// Reserves as (reserve of `token_in`, reserve of the other token)
    fn oriented(pool: &PoolReserves, token_in: Address) -> (U256, U256) {
        if token_in == pool.token0 {
            (pool.reserve0, pool.reserve1)
        } else {
            (pool.reserve1, pool.reserve0)
        }
    }

    fn sort_tokens(token_a: Address, token_b: Address) -> (Address, Address) {
        if token_a < token_b {
            (token_a, token_b)
        } else {
            (token_b, token_a)
        }
    }

    fn checked(&self, result: Result<U256, MathError>) -> U256 {
        result.map_err(MarketError::from).unwrap_or_revert(&self.env())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::token::{AssetToken, AssetTokenHostRef, AssetTokenInitArgs};
    use odra::host::{Deployer, HostEnv, HostRef, NoArgs};

    fn token(env: &HostEnv, symbol: &str) -> AssetTokenHostRef {
        AssetToken::deploy(env, AssetTokenInitArgs {
            name: String::from(symbol),
            symbol: String::from(symbol),
            decimals: 18,
        })
    }

    fn setup() -> (HostEnv, AmmRouterHostRef, AssetTokenHostRef, AssetTokenHostRef) {
        let env = odra_test::env();
        let mut router = AmmRouter::deploy(&env, NoArgs);
        let mut a = token(&env, "AAA");
        let mut b = token(&env, "BBB");
        let owner = env.get_account(0);
        for t in [&mut a, &mut b] {
            t.mint(owner, U256::from(1_000_000u64));
            t.approve(router.address().clone(), U256::from(1_000_000u64));
        }
        router.add_liquidity(
            a.address().clone(),
            b.address().clone(),
            U256::from(10_000u64),
            U256::from(20_000u64),
        );
        (env, router, a, b)
    }

    #[test]
    fn test_add_liquidity_follows_ratio() {
        let (env, mut router, a, b) = setup();
        assert!(router.has_pool(b.address().clone(), a.address().clone()));
        assert_eq!(
            router.get_reserves(b.address().clone(), a.address().clone()),
            (U256::from(20_000u64), U256::from(10_000u64))
        );

        // Extra B beyond the 1:2 ratio is left with the provider
        router.add_liquidity(
            a.address().clone(),
            b.address().clone(),
            U256::from(1_000u64),
            U256::from(5_000u64),
        );
        assert_eq!(
            router.get_reserves(a.address().clone(), b.address().clone()),
            (U256::from(11_000u64), U256::from(22_000u64))
        );
        assert_eq!(b.balance_of(env.get_account(0)), U256::from(978_000u64));
    }

    #[test]
    fn test_swap_matches_quote() {
        let (env, mut router, a, b) = setup();
        let path = vec![a.address().clone(), b.address().clone()];
        let quoted = router.get_amounts_out(U256::from(1_000u64), path.clone());
        // 1000 * 997 * 20000 / (10000 * 1000 + 997000)
        assert_eq!(quoted[1], U256::from(1_813u64));

        let now = env.block_time();
        let out = router.swap(U256::from(1_000u64), path, U256::from(1_813u64), now);
        assert_eq!(out, U256::from(1_813u64));
        assert_eq!(
            router.get_reserves(a.address().clone(), b.address().clone()),
            (U256::from(11_000u64), U256::from(18_187u64))
        );
    }

    #[test]
    fn test_swap_guards() {
        let (env, mut router, a, b) = setup();
        let path = vec![a.address().clone(), b.address().clone()];
        let now = env.block_time();
        assert_eq!(
            router.try_swap(U256::from(1_000u64), path.clone(), U256::from(1_814u64), now),
            Err(MarketError::InsufficientOutputAmount.into())
        );
        env.advance_block_time(1);
        assert_eq!(
            router.try_swap(U256::from(1_000u64), path, U256::zero(), now),
            Err(MarketError::DeadlineExpired.into())
        );
        assert_eq!(
            router.try_get_amounts_out(U256::from(1u64), vec![a.address().clone()]),
            Err(MarketError::InvalidPath.into())
        );
    }
}
