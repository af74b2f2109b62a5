//! Staking Pool - Stake tokens to earn rewards
//!
//! Each pool emits `reward_rate` reward tokens per second, shared between
//! stakers in proportion to their stake.

use odra::prelude::*;
use odra::casper_types::U256;
use odra::ContractRef;
use crate::errors::MarketError;
use crate::math::{MathError, SafeMath, WAD};
use crate::token::Cep18TokenContractRef;
use super::events::*;

/// Pool information
#[odra::odra_type]
pub struct PoolInfo {
    /// Pool ID
    pub pool_id: u32,
    /// Token staked in the pool
    pub stake_token: Address,
    /// Reward tokens emitted per second to the whole pool
    pub reward_rate: U256,
    /// Total staked in pool
    pub total_staked: U256,
    /// Last update timestamp
    pub last_update: u64,
    /// Accumulated reward per staked token (scaled by 1e18)
    pub reward_per_token_stored: U256,
    /// Is pool active
    pub is_active: bool,
}

/// User stake information
#[odra::odra_type]
pub struct UserStake {
    /// Amount staked
    pub amount: U256,
    /// Reward per token already accounted for
    pub reward_debt: U256,
    /// Pending rewards
    pub pending_rewards: U256,
}

/// Staking Pool contract
#[odra::module]
pub struct StakingPool {
    /// Reward token address
    reward_token: Var<Address>,
    /// Pool information by pool ID
    pools: Mapping<u32, PoolInfo>,
    /// User stakes: (user, pool_id) -> UserStake
    user_stakes: Mapping<(Address, u32), UserStake>,
    /// Next pool ID
    next_pool_id: Var<u32>,
    /// Admin address
    admin: Var<Address>,
}

#[odra::module]
impl StakingPool {
    /// Initialize the staking pool
    pub fn init(&mut self, reward_token: Address) {
        self.reward_token.set(reward_token);
        self.next_pool_id.set(0);
        self.admin.set(self.env().caller());
    }

    // ========================================
    // Pool Management (Admin)
    // ========================================

    /// Create a new staking pool
    ///
    /// # Arguments
    /// * `stake_token` - Token to stake
    /// * `reward_rate` - Reward tokens per second for the whole pool
    pub fn create_pool(&mut self, stake_token: Address, reward_rate: U256) -> u32 {
        self.only_admin();

        if reward_rate.is_zero() {
            self.env().revert(MarketError::InvalidParameters);
        }

        let pool_id = self.next_pool_id.get_or_default();
        self.pools.set(&pool_id, PoolInfo {
            pool_id,
            stake_token,
            reward_rate,
            total_staked: U256::zero(),
            last_update: self.env().get_block_time(),
            reward_per_token_stored: U256::zero(),
            is_active: true,
        });
        self.next_pool_id.set(pool_id + 1);

        self.env().emit_event(PoolCreated {
            pool_id,
            stake_token,
            reward_rate,
            created_by: self.env().caller(),
        });

        pool_id
    }

    /// Update pool reward rate
    pub fn update_reward_rate(&mut self, pool_id: u32, new_rate: U256) {
        self.only_admin();

        let mut pool = self.update_pool_rewards(pool_id);
        let old_rate = pool.reward_rate;
        pool.reward_rate = new_rate;
        self.pools.set(&pool_id, pool);

        self.env().emit_event(RewardRateUpdated {
            pool_id,
            old_rate,
            new_rate,
            updated_by: self.env().caller(),
        });
    }

    /// Set pool active status
    pub fn set_pool_active(&mut self, pool_id: u32, active: bool) {
        self.only_admin();

        let mut pool = self.update_pool_rewards(pool_id);
        pool.is_active = active;
        self.pools.set(&pool_id, pool);
    }

    // ========================================
    // Staking Functions
    // ========================================

    /// Stake tokens
    pub fn stake(&mut self, pool_id: u32, amount: U256) {
        if amount.is_zero() {
            self.env().revert(MarketError::ZeroAmount);
        }

        let caller = self.env().caller();
        let mut pool = self.update_pool_rewards(pool_id);
        if !pool.is_active {
            self.env().revert(MarketError::PoolNotActive);
        }
        let mut user_stake = self.update_user_rewards(caller, &pool);

        let mut stake_token = Cep18TokenContractRef::new(self.env(), pool.stake_token);
        stake_token.transfer_from(caller, self.env().self_address(), amount);

        user_stake.amount = user_stake.amount + amount;
        self.user_stakes.set(&(caller, pool_id), user_stake);
        pool.total_staked = pool.total_staked + amount;
        self.pools.set(&pool_id, pool);

        self.env().emit_event(Staked {
            user: caller,
            pool_id,
            amount,
            timestamp: self.env().get_block_time(),
        });
    }

    /// Unstake tokens, returning the amount sent back
    pub fn unstake(&mut self, pool_id: u32, amount: U256) -> U256 {
        if amount.is_zero() {
            self.env().revert(MarketError::ZeroAmount);
        }

        let caller = self.env().caller();
        let mut pool = self.update_pool_rewards(pool_id);
        let mut user_stake = self.update_user_rewards(caller, &pool);

        if user_stake.amount < amount {
            self.env().revert(MarketError::InsufficientStake);
        }

        user_stake.amount = user_stake.amount - amount;
        self.user_stakes.set(&(caller, pool_id), user_stake);
        pool.total_staked = pool.total_staked - amount;
        let stake_token = pool.stake_token;
        self.pools.set(&pool_id, pool);

        let mut token = Cep18TokenContractRef::new(self.env(), stake_token);
        token.transfer(caller, amount);

        self.env().emit_event(Unstaked {
            user: caller,
            pool_id,
            amount,
            timestamp: self.env().get_block_time(),
        });

        amount
    }

    /// Claim pending rewards, returning the amount paid out
    pub fn claim_rewards(&mut self, pool_id: u32) -> U256 {
        let caller = self.env().caller();
        let pool = self.update_pool_rewards(pool_id);
        let mut user_stake = self.update_user_rewards(caller, &pool);

        let rewards = user_stake.pending_rewards;
        if rewards.is_zero() {
            return rewards;
        }

        user_stake.pending_rewards = U256::zero();
        self.user_stakes.set(&(caller, pool_id), user_stake);

        let reward_token_address = self.reward_token();
        let mut reward_token = Cep18TokenContractRef::new(self.env(), reward_token_address);
        reward_token.transfer(caller, rewards);

        self.env().emit_event(RewardsClaimed {
            user: caller,
            pool_id,
            reward_amount: rewards,
            timestamp: self.env().get_block_time(),
        });

        rewards
    }

    // ========================================
    // View Functions
    // ========================================

    pub fn reward_token(&self) -> Address {
        self.reward_token.get_or_revert_with(MarketError::InvalidParameters)
    }

    pub fn pool_token(&self, pool_id: u32) -> Option<Address> {
        self.pools.get(&pool_id).map(|pool| pool.stake_token)
    }

    pub fn get_pool_info(&self, pool_id: u32) -> Option<PoolInfo> {
        self.pools.get(&pool_id)
    }

    pub fn staked_balance(&self, pool_id: u32, holder: Address) -> U256 {
        self.user_stakes
            .get(&(holder, pool_id))
            .map(|stake| stake.amount)
            .unwrap_or_default()
    }

    /// Rewards claimable right now, including emissions since the last update
    pub fn pending_rewards(&self, pool_id: u32, holder: Address) -> U256 {
        let Some(pool) = self.pools.get(&pool_id) else {
            return U256::zero();
        };
        let pool = self.accrued_pool(pool);
        match self.user_stakes.get(&(holder, pool_id)) {
            Some(stake) => self.checked(Self::earned(&stake, &pool)),
            None => U256::zero(),
        }
    }

    // ========================================
    // Internal Functions
    // ========================================

    fn accrued_pool(&self, mut pool: PoolInfo) -> PoolInfo {
        let current_time = self.env().get_block_time();
        let elapsed_seconds = current_time.saturating_sub(pool.last_update) / 1_000;
        if elapsed_seconds == 0 {
            return pool;
        }
        pool.last_update = pool.last_update + elapsed_seconds * 1_000;
        if pool.total_staked.is_zero() || !pool.is_active {
            return pool;
        }

        let rewards = self.checked(SafeMath::mul(pool.reward_rate, U256::from(elapsed_seconds)));
        let increase = self.checked(SafeMath::mul_div_down(rewards, U256::from(WAD), pool.total_staked));
        pool.reward_per_token_stored = pool.reward_per_token_stored + increase;
        pool
    }

    fn update_pool_rewards(&mut self, pool_id: u32) -> PoolInfo {
        let pool = self.pools
            .get(&pool_id)
            .unwrap_or_revert_with(&self.env(), MarketError::PoolNotFound);
        let pool = self.accrued_pool(pool);
        self.pools.set(&pool_id, pool.clone());
        pool
    }

    fn update_user_rewards(&mut self, user: Address, pool: &PoolInfo) -> UserStake {
        let mut user_stake = self.user_stakes
            .get(&(user, pool.pool_id))
            .unwrap_or(UserStake {
                amount: U256::zero(),
                reward_debt: U256::zero(),
                pending_rewards: U256::zero(),
            });

        user_stake.pending_rewards = self.checked(Self::earned(&user_stake, pool));
        user_stake.reward_debt = pool.reward_per_token_stored;
        self.user_stakes.set(&(user, pool.pool_id), user_stake.clone());
        user_stake
    }

    fn earned(stake: &UserStake, pool: &PoolInfo) -> Result<U256, MathError> {
        let delta = SafeMath::sub(pool.reward_per_token_stored, stake.reward_debt)?;
        let new_rewards = SafeMath::mul_div_down(stake.amount, delta, U256::from(WAD))?;
        SafeMath::add(stake.pending_rewards, new_rewards)
    }

    fn checked(&self, result: Result<U256, MathError>) -> U256 {
        result.map_err(MarketError::from).unwrap_or_revert(&self.env())
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
    use crate::token::{AssetToken, AssetTokenHostRef, AssetTokenInitArgs};
    use odra::host::{Deployer, HostEnv, HostRef};

    fn setup() -> (HostEnv, StakingPoolHostRef, AssetTokenHostRef) {
        let env = odra_test::env();
        let mut token = AssetToken::deploy(&env, AssetTokenInitArgs {
            name: String::from("Wrapped Ether"),
            symbol: String::from("WETH"),
            decimals: 18,
        });
        let pool = StakingPool::deploy(&env, StakingPoolInitArgs {
            reward_token: token.address().clone(),
        });
        token.mint(pool.address().clone(), U256::from(1_000_000_000_000u64));
        (env, pool, token)
    }

    #[test]
    fn test_rewards_are_split_by_stake() {
        let (env, mut pool, mut token) = setup();
        let pool_id = pool.create_pool(token.address().clone(), U256::from(1_000u64));
        let alice = env.get_account(1);
        let bob = env.get_account(2);

        for (user, amount) in [(alice, 300u64), (bob, 100u64)] {
            env.set_caller(env.get_account(0));
            token.mint(user, U256::from(amount));
            env.set_caller(user);
            token.approve(pool.address().clone(), U256::from(amount));
            pool.stake(pool_id, U256::from(amount));
        }

        env.advance_block_time(10_000);
        assert_eq!(pool.pending_rewards(pool_id, alice), U256::from(7_500u64));
        assert_eq!(pool.pending_rewards(pool_id, bob), U256::from(2_500u64));

        env.set_caller(alice);
        assert_eq!(pool.claim_rewards(pool_id), U256::from(7_500u64));
        assert_eq!(pool.pending_rewards(pool_id, alice), U256::zero());
        assert_eq!(pool.claim_rewards(pool_id), U256::zero());

        assert_eq!(pool.unstake(pool_id, U256::from(300u64)), U256::from(300u64));
        assert_eq!(pool.staked_balance(pool_id, alice), U256::zero());
    }

    #[test]
    fn test_pool_queries_and_errors() {
        let (env, mut pool, token) = setup();
        assert_eq!(pool.pool_token(0), None);
        let pool_id = pool.create_pool(token.address().clone(), U256::from(1u64));
        assert_eq!(pool.pool_token(pool_id), Some(token.address().clone()));

        let user = env.get_account(1);
        env.set_caller(user);
        assert_eq!(
            pool.try_create_pool(token.address().clone(), U256::one()),
            Err(MarketError::Unauthorized.into())
        );
        assert_eq!(
            pool.try_unstake(pool_id, U256::one()),
            Err(MarketError::InsufficientStake.into())
        );
        assert_eq!(
            pool.try_stake(7, U256::one()),
            Err(MarketError::PoolNotFound.into())
        );
    }
}
