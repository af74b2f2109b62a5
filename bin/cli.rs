//! CLI tool for deploying the vault factories and their reference markets.

use odra::casper_types::bytesrepr::Bytes;
use odra::host::HostEnv;
use odra::prelude::{Address, Addressable};
use odra::OdraError;
use odra::schema::casper_contract_schema::NamedCLType;
use odra_cli::{
    deploy::DeployScript,
    scenario::{Args, Error, Scenario, ScenarioMetadata},
    CommandArg, ContractProvider, DeployedContractsContainer, DeployerExt,
    OdraCli,
};
use yield_vaults::delta_neutral::DeltaNeutralVaultFactory;
use yield_vaults::errors::VaultError;
use yield_vaults::lending::LendingVaultFactory;
use yield_vaults::markets::{AmmRouter, LendingPool, StakingPool};
use yield_vaults::staking::StakingVaultFactory;
use yield_vaults::token::AssetToken;
use yield_vaults::vault::config::{LendingVaultConfig, StakingVaultConfig, VaultConfig};

/// Slippage applied to factory swaps on a fresh deployment (1%)
const DEFAULT_MAX_SLIPPAGE_BPS: u32 = 100;

/// Deploys the lending market, the swap router and a staking pool paying
/// rewards in a freshly deployed reward token.
pub struct MarketsDeployScript;

impl DeployScript for MarketsDeployScript {
    fn deploy(
        &self,
        env: &HostEnv,
        container: &mut DeployedContractsContainer
    ) -> Result<(), odra_cli::deploy::Error> {
        use odra::host::NoArgs;
        use yield_vaults::markets::staking_pool::StakingPoolInitArgs;
        use yield_vaults::token::AssetTokenInitArgs;

        let reward_token = AssetToken::load_or_deploy(
            &env,
            AssetTokenInitArgs {
                name: String::from("Vault Reward"),
                symbol: String::from("VRWD"),
                decimals: 18,
            },
            container,
            300_000_000_000
        )?;
        LendingPool::load_or_deploy(&env, NoArgs, container, 500_000_000_000)?;
        AmmRouter::load_or_deploy(&env, NoArgs, container, 500_000_000_000)?;
        StakingPool::load_or_deploy(
            &env,
            StakingPoolInitArgs {
                reward_token: reward_token.address().clone(),
            },
            container,
            400_000_000_000
        )?;

        Ok(())
    }
}

/// Deploys the three vault factories.
/// Requires the markets to be deployed first.
pub struct FactoriesDeployScript;

impl DeployScript for FactoriesDeployScript {
    fn deploy(
        &self,
        env: &HostEnv,
        container: &mut DeployedContractsContainer
    ) -> Result<(), odra_cli::deploy::Error> {
        use yield_vaults::delta_neutral::vault::DeltaNeutralVaultFactoryInitArgs;
        use yield_vaults::lending::vault::LendingVaultFactoryInitArgs;
        use yield_vaults::staking::vault::StakingVaultFactoryInitArgs;

        let lending_market = container.contract_ref::<LendingPool>(env)?.address().clone();
        let router = container.contract_ref::<AmmRouter>(env)?.address().clone();
        let staking_pool = container.contract_ref::<StakingPool>(env)?.address().clone();

        LendingVaultFactory::load_or_deploy(
            &env,
            LendingVaultFactoryInitArgs { lending_market },
            container,
            600_000_000_000
        )?;
        StakingVaultFactory::load_or_deploy(
            &env,
            StakingVaultFactoryInitArgs {
                router,
                staking_pool,
                max_slippage_bps: DEFAULT_MAX_SLIPPAGE_BPS,
            },
            container,
            600_000_000_000
        )?;
        DeltaNeutralVaultFactory::load_or_deploy(
            &env,
            DeltaNeutralVaultFactoryInitArgs {
                max_slippage_bps: DEFAULT_MAX_SLIPPAGE_BPS,
            },
            container,
            600_000_000_000
        )?;

        Ok(())
    }
}

/// Deploys markets and factories in one go.
pub struct FullDeployScript;

impl DeployScript for FullDeployScript {
    fn deploy(
        &self,
        env: &HostEnv,
        container: &mut DeployedContractsContainer
    ) -> Result<(), odra_cli::deploy::Error> {
        MarketsDeployScript.deploy(env, container)?;
        FactoriesDeployScript.deploy(env, container)?;
        Ok(())
    }
}

/// Scenario to create a lending vault owned by the caller.
pub struct CreateLendingVaultScenario;

impl Scenario for CreateLendingVaultScenario {
    fn args(&self) -> Vec<CommandArg> {
        vec![
            CommandArg::new("asset", "Collateral asset", NamedCLType::Key),
            CommandArg::new("borrow_asset", "Asset borrowed against the collateral", NamedCLType::Key),
            CommandArg::new("asset_price_feed", "Price feed of the collateral", NamedCLType::Key),
            CommandArg::new("borrow_price_feed", "Price feed of the borrowed asset", NamedCLType::Key),
            CommandArg::new("target_ltv_bps", "Loan-to-value of the first deposit", NamedCLType::U32),
        ]
    }

    fn run(
        &self,
        env: &HostEnv,
        container: &DeployedContractsContainer,
        args: Args
    ) -> Result<(), Error> {
        let mut factory = container.contract_ref::<LendingVaultFactory>(env)?;
        let asset = args.get_single::<Address>("asset")?;
        let config = LendingVaultConfig {
            borrow_asset: args.get_single::<Address>("borrow_asset")?,
            asset_price_feed: args.get_single::<Address>("asset_price_feed")?,
            borrow_price_feed: args.get_single::<Address>("borrow_price_feed")?,
            target_ltv_bps: args.get_single::<u32>("target_ltv_bps")?,
            owner: env.caller(),
        };
        let payload = encode(&config)?;

        env.set_gas(400_000_000_000);
        let vault = factory.try_create_vault(asset, payload)?;

        println!("Lending vault: {}", hex(&vault));
        Ok(())
    }
}

impl ScenarioMetadata for CreateLendingVaultScenario {
    const NAME: &'static str = "create-lending-vault";
    const DESCRIPTION: &'static str = "Creates (or finds) a lending vault for an asset pair";
}

/// Scenario to create a staking vault owned by the caller.
pub struct CreateStakingVaultScenario;

impl Scenario for CreateStakingVaultScenario {
    fn args(&self) -> Vec<CommandArg> {
        vec![
            CommandArg::new("asset", "Asset accepted by the vault", NamedCLType::Key),
            CommandArg::new("stake_token", "Token staked in the pool", NamedCLType::Key),
            CommandArg::new("pool_id", "Staking pool id", NamedCLType::U32),
        ]
    }

    fn run(
        &self,
        env: &HostEnv,
        container: &DeployedContractsContainer,
        args: Args
    ) -> Result<(), Error> {
        let mut factory = container.contract_ref::<StakingVaultFactory>(env)?;
        let asset = args.get_single::<Address>("asset")?;
        let config = StakingVaultConfig {
            stake_token: args.get_single::<Address>("stake_token")?,
            pool_id: args.get_single::<u32>("pool_id")?,
            owner: env.caller(),
        };
        let payload = encode(&config)?;

        env.set_gas(400_000_000_000);
        let vault = factory.try_create_vault(asset, payload)?;

        println!("Staking vault: {}", hex(&vault));
        Ok(())
    }
}

impl ScenarioMetadata for CreateStakingVaultScenario {
    const NAME: &'static str = "create-staking-vault";
    const DESCRIPTION: &'static str = "Creates (or finds) a staking vault for a pool";
}

/// Lists the instances registered in every factory.
pub struct ListVaultsScenario;

impl Scenario for ListVaultsScenario {
    fn args(&self) -> Vec<CommandArg> {
        vec![]
    }

    fn run(
        &self,
        env: &HostEnv,
        container: &DeployedContractsContainer,
        _args: Args
    ) -> Result<(), Error> {
        let lending = container.contract_ref::<LendingVaultFactory>(env)?;
        for index in 0..lending.vault_count() {
            if let Some(vault) = lending.vault_at(index) {
                println!("lending #{} {} assets={}", index, hex(&vault), lending.total_assets(vault));
            }
        }

        let staking = container.contract_ref::<StakingVaultFactory>(env)?;
        for index in 0..staking.vault_count() {
            if let Some(vault) = staking.vault_at(index) {
                println!("staking #{} {} assets={}", index, hex(&vault), staking.total_assets(vault));
            }
        }

        let delta = container.contract_ref::<DeltaNeutralVaultFactory>(env)?;
        for index in 0..delta.vault_count() {
            if let Some(vault) = delta.vault_at(index) {
                println!("delta-neutral #{} {} assets={}", index, hex(&vault), delta.total_assets(vault));
            }
        }

        Ok(())
    }
}

impl ScenarioMetadata for ListVaultsScenario {
    const NAME: &'static str = "list-vaults";
    const DESCRIPTION: &'static str = "Prints every vault instance with its total assets";
}

fn encode<C: VaultConfig>(config: &C) -> Result<Bytes, Error> {
    config
        .encode()
        .map_err(|error| Error::from(OdraError::from(VaultError::from(error))))
}

fn hex(id: &[u8; 32]) -> String {
    id.iter().map(|byte| format!("{:02x}", byte)).collect()
}

/// Main function to run the CLI tool.
pub fn main() {
    OdraCli::new()
        .about("CLI tool for tokenized yield vault contracts")
        // Deploy scripts
        .deploy(MarketsDeployScript)
        .deploy(FactoriesDeployScript)
        .deploy(FullDeployScript)
        // Contract references
        .contract::<LendingVaultFactory>()
        .contract::<StakingVaultFactory>()
        .contract::<DeltaNeutralVaultFactory>()
        .contract::<LendingPool>()
        .contract::<StakingPool>()
        .contract::<AmmRouter>()
        .contract::<AssetToken>()
        // Scenarios
        .scenario(CreateLendingVaultScenario)
        .scenario(CreateStakingVaultScenario)
        .scenario(ListVaultsScenario)
        .build()
        .run();
}
