//! CEP-18 compatible fungible token
//!
//! `AssetToken` is the token vaults accept as underlying asset, borrow and
//! stake. The `Cep18Token` interface is how vaults and markets talk to any
//! CEP-18 token, including this one.
use odra::prelude::*;
use odra::casper_types::U256;
use crate::events::{Transfer, Approval};
use crate::errors::TokenError;

/// Mintable CEP-18 token
#[odra::module]
pub struct AssetToken {
    /// Token name
    name: Var<String>,
    /// Token symbol
    symbol: Var<String>,
    /// Token decimals
    decimals: Var<u8>,
    /// Total supply of tokens
    total_supply: Var<U256>,
    /// Balance mapping: owner -> balance
    balances: Mapping<Address, U256>,
    /// Allowance mapping: owner -> spender -> amount
    allowances: Mapping<(Address, Address), U256>,
    /// Only account allowed to mint
    minter: Var<Address>,
}

#[odra::module]
impl AssetToken {
    /// Initialize the token; the deployer becomes the minter
    pub fn init(&mut self, name: String, symbol: String, decimals: u8) {
        self.name.set(name);
        self.symbol.set(symbol);
        self.decimals.set(decimals);
        self.total_supply.set(U256::zero());
        self.minter.set(self.env().caller());
    }

    pub fn name(&self) -> String {
        self.name.get_or_default()
    }

    pub fn symbol(&self) -> String {
        self.symbol.get_or_default()
    }

    pub fn decimals(&self) -> u8 {
        self.decimals.get_or_default()
    }

    pub fn total_supply(&self) -> U256 {
        self.total_supply.get_or_default()
    }

    pub fn balance_of(&self, owner: Address) -> U256 {
        self.balances.get(&owner).unwrap_or_default()
    }

    pub fn allowance(&self, owner: Address, spender: Address) -> U256 {
        self.allowances.get(&(owner, spender)).unwrap_or_default()
    }

    /// Transfer tokens to another address
    pub fn transfer(&mut self, to: Address, amount: U256) -> bool {
        let caller = self.env().caller();
        self.transfer_internal(caller, to, amount);
        true
    }

    /// Approve a spender to spend tokens
    pub fn approve(&mut self, spender: Address, amount: U256) -> bool {
        let caller = self.env().caller();
        self.approve_internal(caller, spender, amount);
        true
    }

    /// Transfer tokens from one address to another (requires approval)
    pub fn transfer_from(&mut self, from: Address, to: Address, amount: U256) -> bool {
        let caller = self.env().caller();
        let current_allowance = self.allowance(from, caller);

        if current_allowance < amount {
            self.env().revert(TokenError::InsufficientAllowance);
        }

        self.approve_internal(from, caller, current_allowance - amount);
        self.transfer_internal(from, to, amount);
        true
    }

    /// Mint new tokens (minter only)
    pub fn mint(&mut self, to: Address, amount: U256) {
        let minter = self.minter.get_or_revert_with(TokenError::Unauthorized);
        if self.env().caller() != minter {
            self.env().revert(TokenError::Unauthorized);
        }

        self.total_supply.set(self.total_supply() + amount);
        self.balances.set(&to, self.balance_of(to) + amount);

        self.env().emit_event(Transfer {
            from: self.env().self_address(),
            to,
            value: amount,
        });
    }

    fn transfer_internal(&mut self, from: Address, to: Address, amount: U256) {
        let from_balance = self.balance_of(from);
        if from_balance < amount {
            self.env().revert(TokenError::InsufficientBalance);
        }

        self.balances.set(&from, from_balance - amount);
        let to_balance = self.balance_of(to);
        self.balances.set(&to, to_balance + amount);

        self.env().emit_event(Transfer {
            from,
            to,
            value: amount,
        });
    }

    fn approve_internal(&mut self, owner: Address, spender: Address, amount: U256) {
        self.allowances.set(&(owner, spender), amount);

        self.env().emit_event(Approval {
            owner,
            spender,
            value: amount,
        });
    }
}

/// External token interface for interacting with CEP-18 tokens
#[odra::external_contract]
pub trait Cep18Token {
    /// Get the balance of an address
    fn balance_of(&self, owner: Address) -> U256;

    /// Transfer tokens
    fn transfer(&mut self, to: Address, amount: U256) -> bool;

    /// Transfer tokens from another address
    fn transfer_from(&mut self, from: Address, to: Address, amount: U256) -> bool;

    /// Approve a spender
    fn approve(&mut self, spender: Address, amount: U256) -> bool;

    /// Get allowance
    fn allowance(&self, owner: Address, spender: Address) -> U256;

    /// Get token decimals
    fn decimals(&self) -> u8;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::TokenError;
    use odra::host::{Deployer, HostEnv};

    fn deploy(env: &HostEnv, symbol: &str, decimals: u8) -> AssetTokenHostRef {
        AssetToken::deploy(
            env,
            AssetTokenInitArgs {
                name: String::from(symbol),
                symbol: String::from(symbol),
                decimals,
            },
        )
    }

    #[test]
    fn decimals_follow_the_underlying_asset() {
        let env = odra_test::env();
        assert_eq!(deploy(&env, "USDC", 6).decimals(), 6);
        assert_eq!(deploy(&env, "WETH", 18).decimals(), 18);
    }

    #[test]
    fn only_the_deployer_mints() {
        let env = odra_test::env();
        let mut token = deploy(&env, "USDC", 6);
        let user = env.get_account(1);

        token.mint(user, U256::from(1000));
        assert_eq!(token.balance_of(user), U256::from(1000));
        assert_eq!(token.total_supply(), U256::from(1000));

        env.set_caller(user);
        assert_eq!(
            token.try_mint(user, U256::from(1)),
            Err(TokenError::Unauthorized.into())
        );
        assert_eq!(token.total_supply(), U256::from(1000));
    }
}
