//! Configuration payloads passed to `create_vault` / `compute_vault_id`.
//!
//! Wire layout: `[kind tag, version] ++ bytesrepr(struct)`, fields encoded
//! in declaration order. The payload is self-describing: a lending payload
//! handed to the staking factory is rejected, as is any payload with an
//! unknown version or with bytes left over after the struct.
use odra::prelude::*;
use odra::casper_types::bytesrepr::{Bytes, FromBytes, ToBytes};

/// Current layout version of every payload
pub const CONFIG_VERSION: u8 = 1;

/// Highest loan-to-value a lending instance may target (90%)
pub const MAX_TARGET_LTV_BPS: u32 = 9_000;

/// Payload decoding and validation failures
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigError {
    Malformed,
    KindMismatch,
    UnsupportedVersion,
    InvalidLoanToValue,
}

/// Tag identifying the vault kind a payload belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum VaultKind {
    Lending = 1,
    Staking = 2,
    DeltaNeutral = 3,
}

/// Shared codec of the per-kind configuration structs
pub trait VaultConfig: ToBytes + FromBytes + Sized {
    const KIND: VaultKind;

    /// Administrator identity of the instance
    fn owner(&self) -> Address;

    /// Semantic checks run after a successful decode
    fn validate(&self) -> Result<(), ConfigError> {
        Ok(())
    }

    fn encode(&self) -> Result<Bytes, ConfigError> {
        let body = self.to_bytes().map_err(|_| ConfigError::Malformed)?;
        let mut payload = Vec::with_capacity(body.len() + 2);
        payload.push(Self::KIND as u8);
        payload.push(CONFIG_VERSION);
        payload.extend_from_slice(&body);
        Ok(Bytes::from(payload))
    }

    fn decode(payload: &[u8]) -> Result<Self, ConfigError> {
        let (header, body) = match payload {
            [kind, version, body @ ..] => ((*kind, *version), body),
            _ => return Err(ConfigError::Malformed),
        };
        if header.0 != Self::KIND as u8 {
            return Err(ConfigError::KindMismatch);
        }
        if header.1 != CONFIG_VERSION {
            return Err(ConfigError::UnsupportedVersion);
        }
        let (config, rest) = Self::from_bytes(body).map_err(|_| ConfigError::Malformed)?;
        if !rest.is_empty() {
            return Err(ConfigError::Malformed);
        }
        config.validate()?;
        Ok(config)
    }
}

/// Supply `asset` as collateral and borrow `borrow_asset` against it
#[odra::odra_type]
pub struct LendingVaultConfig {
    /// Asset borrowed against the supplied collateral
    pub borrow_asset: Address,
    /// Feed pricing the collateral asset
    pub asset_price_feed: Address,
    /// Feed pricing the borrowed asset
    pub borrow_price_feed: Address,
    /// Share of the collateral value borrowed by the first deposit, in bps
    pub target_ltv_bps: u32,
    pub owner: Address,
}

impl VaultConfig for LendingVaultConfig {
    const KIND: VaultKind = VaultKind::Lending;

    fn owner(&self) -> Address {
        self.owner
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.target_ltv_bps == 0 || self.target_ltv_bps > MAX_TARGET_LTV_BPS {
            return Err(ConfigError::InvalidLoanToValue);
        }
        Ok(())
    }
}

/// Swap `asset` into `stake_token` when they differ, then stake in `pool_id`
#[odra::odra_type]
pub struct StakingVaultConfig {
    pub stake_token: Address,
    pub pool_id: u32,
    pub owner: Address,
}

impl VaultConfig for StakingVaultConfig {
    const KIND: VaultKind = VaultKind::Staking;

    fn owner(&self) -> Address {
        self.owner
    }
}

/// Lending leg plus staking leg, each created through its own factory
#[odra::odra_type]
pub struct DeltaNeutralVaultConfig {
    pub lending_factory: Address,
    pub lending_asset: Address,
    /// Encoded `LendingVaultConfig` of the lending leg
    pub lending_config: Bytes,
    pub staking_factory: Address,
    pub staking_asset: Address,
    /// Encoded `StakingVaultConfig` of the staking leg
    pub staking_config: Bytes,
    pub owner: Address,
}

impl VaultConfig for DeltaNeutralVaultConfig {
    const KIND: VaultKind = VaultKind::DeltaNeutral;

    fn owner(&self) -> Address {
        self.owner
    }

    fn validate(&self) -> Result<(), ConfigError> {
        LendingVaultConfig::decode(&self.lending_config)?;
        StakingVaultConfig::decode(&self.staking_config)?;
        Ok(())
    }
}
