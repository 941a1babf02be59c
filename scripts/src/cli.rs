//! Definitions of CLI arguments and commands for deploy scripts

use std::{
    fmt::{self, Display},
    path::PathBuf,
};

use alloy::primitives::{Address, B256, U256};
use clap::{Args, Parser, Subcommand, ValueEnum};

use crate::{
    commands::{
        deploy, deploy_test_token, mint_test_token, publish, register_metadata,
        upgrade_gatekeeper,
    },
    constants::{
        ARTIFACTS_DIR_ENV_VAR, DEFAULT_ARTIFACTS_DIR, DEFAULT_DEPLOYMENTS_PATH, DEFAULT_ETH_NETWORK,
        DEFAULT_GAS_LIMIT, DEFAULT_MINT_AMOUNT, DEFAULT_RPC_URL, DEFAULT_SOURCES_DIR,
        DEFAULT_TESSERACTS_URL, DEFAULT_TEST_TOKEN_DECIMALS, DEFAULT_TEST_TOKEN_NAME,
        DEFAULT_TEST_TOKEN_SYMBOL, ETHERSCAN_API_KEY_ENV_VAR, ETH_NETWORK_ENV_VAR,
        GENESIS_ROOT_ENV_VAR, GOVERNOR_ADDRESS_ENV_VAR, OPERATOR_ENV_VAR, PRIV_KEY_ENV_VAR,
        SOURCES_DIR_ENV_VAR, TESSERACTS_URL_ENV_VAR, WEB3_URL_ENV_VAR,
    },
    deployer::{DeployParams, TokenParams},
    errors::ScriptError,
    types::{AddressBook, ContractName},
};

/// Deploy and manage the Franklin rollup contracts
#[derive(Parser)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Arguments shared by all commands
    #[command(flatten)]
    pub globals: GlobalArgs,

    /// The command to run
    #[command(subcommand)]
    pub command: Command,
}

/// Arguments shared by all commands
#[derive(Args, Clone)]
pub struct GlobalArgs {
    /// Private key of the deployer
    #[arg(short, long, env = PRIV_KEY_ENV_VAR, hide_env_values = true, global = true)]
    pub priv_key: Option<String>,

    /// Network RPC URL
    #[arg(short, long, env = WEB3_URL_ENV_VAR, default_value = DEFAULT_RPC_URL, global = true)]
    pub rpc_url: String,

    /// Directory holding the compiled contract artifacts
    #[arg(long, env = ARTIFACTS_DIR_ENV_VAR, default_value = DEFAULT_ARTIFACTS_DIR, global = true)]
    pub artifacts_dir: PathBuf,

    /// Directory holding the Solidity sources
    #[arg(long, env = SOURCES_DIR_ENV_VAR, default_value = DEFAULT_SOURCES_DIR, global = true)]
    pub sources_dir: PathBuf,

    /// Path to the file in which contract addresses are recorded
    #[arg(short, long, default_value = DEFAULT_DEPLOYMENTS_PATH, global = true)]
    pub deployments_path: PathBuf,

    /// Log debug output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Addresses of contracts deployed in earlier runs
    #[command(flatten)]
    pub addresses: DeployedAddresses,
}

/// Addresses of contracts deployed in earlier runs.
///
/// Contracts deployed during a run take precedence over these.
#[derive(Args, Clone, Default)]
pub struct DeployedAddresses {
    /// Governance implementation contract
    #[arg(long, env = "GOVERNANCE_TARGET_ADDR", global = true)]
    pub governance_target: Option<Address>,

    /// Governance proxy contract
    #[arg(long, env = "GOVERNANCE_ADDR", global = true)]
    pub governance: Option<Address>,

    /// Verifier implementation contract
    #[arg(long, env = "VERIFIER_TARGET_ADDR", global = true)]
    pub verifier_target: Option<Address>,

    /// Verifier proxy contract
    #[arg(long, env = "VERIFIER_ADDR", global = true)]
    pub verifier: Option<Address>,

    /// Franklin implementation contract
    #[arg(long, env = "CONTRACT_TARGET_ADDR", global = true)]
    pub franklin_target: Option<Address>,

    /// Franklin proxy contract
    #[arg(long, env = "CONTRACT_ADDR", global = true)]
    pub franklin: Option<Address>,

    /// Upgrade gatekeeper contract
    #[arg(long, env = "UPGRADE_GATEKEEPER_ADDR", global = true)]
    pub upgrade_gatekeeper: Option<Address>,

    /// Test ERC20 token contract
    #[arg(long, env = "TEST_ERC20", global = true)]
    pub test_erc20: Option<Address>,
}

impl DeployedAddresses {
    /// The configured address of a contract
    pub fn get(&self, name: ContractName) -> Option<Address> {
        match name {
            ContractName::GovernanceTarget => self.governance_target,
            ContractName::Governance => self.governance,
            ContractName::VerifierTarget => self.verifier_target,
            ContractName::Verifier => self.verifier,
            ContractName::FranklinTarget => self.franklin_target,
            ContractName::Franklin => self.franklin,
            ContractName::UpgradeGatekeeper => self.upgrade_gatekeeper,
            ContractName::TestErc20 => self.test_erc20,
        }
    }

    /// An address book holding the configured addresses
    pub fn to_book(&self) -> AddressBook {
        let mut book = AddressBook::default();
        for name in ContractName::ALL {
            book.set_address_if_missing(name, self.get(name));
        }

        book
    }
}

/// The available commands
#[derive(Subcommand)]
pub enum Command {
    /// Deploy the contracts, their proxies and the upgrade gatekeeper
    Deploy(DeployArgs),
    /// Deploy the upgrade gatekeeper and hand it mastership of existing proxies
    UpgradeGatekeeper(UpgradeGatekeeperArgs),
    /// Deploy a test ERC20 token, mint it and list it in governance
    DeployTestToken(TestTokenArgs),
    /// Mint an existing test ERC20 token
    MintTestToken(MintTestTokenArgs),
    /// Verify contract sources on Etherscan
    Publish(PublishArgs),
    /// Register contract sources with a Tesseracts explorer
    RegisterMetadata(RegisterMetadataArgs),
}

impl Command {
    /// Run the command
    pub async fn run(self, globals: GlobalArgs) -> Result<(), ScriptError> {
        match self {
            Command::Deploy(args) => deploy(args, globals).await,
            Command::UpgradeGatekeeper(args) => upgrade_gatekeeper(args, globals).await,
            Command::DeployTestToken(args) => deploy_test_token(args, globals).await,
            Command::MintTestToken(args) => mint_test_token(args, globals).await,
            Command::Publish(args) => publish(args, globals).await,
            Command::RegisterMetadata(args) => register_metadata(args, globals).await,
        }
    }
}

/// The parameters the contracts are initialized with
#[derive(Args, Clone)]
pub struct InitArgs {
    /// Address of the network governor, defaults to the deployer
    #[arg(long, env = GOVERNOR_ADDRESS_ENV_VAR)]
    pub governor: Option<Address>,

    /// Root of the rollup genesis state
    #[arg(long, env = GENESIS_ROOT_ENV_VAR)]
    pub genesis_root: Option<B256>,

    /// Parameters of the test token
    #[command(flatten)]
    pub token: TokenArgs,
}

impl InitArgs {
    /// Resolve the deploy parameters, falling back to `deployer` as governor
    pub fn resolve(&self, deployer: Option<Address>) -> Result<DeployParams, ScriptError> {
        let governor = self.governor.or(deployer).ok_or_else(|| {
            ScriptError::CalldataConstruction(format!(
                "no governor given, set {GOVERNOR_ADDRESS_ENV_VAR} or {PRIV_KEY_ENV_VAR}"
            ))
        })?;

        Ok(DeployParams {
            governor,
            genesis_root: self.genesis_root,
            token: self.token.params(),
        })
    }
}

/// Parameters of the test ERC20 token
#[derive(Args, Clone)]
pub struct TokenArgs {
    /// Name of the test token
    #[arg(long, default_value = DEFAULT_TEST_TOKEN_NAME)]
    pub token_name: String,

    /// Symbol of the test token
    #[arg(long, default_value = DEFAULT_TEST_TOKEN_SYMBOL)]
    pub token_symbol: String,

    /// Decimals of the test token
    #[arg(long, default_value_t = DEFAULT_TEST_TOKEN_DECIMALS)]
    pub token_decimals: u8,
}

impl TokenArgs {
    /// The token parameters
    pub fn params(&self) -> TokenParams {
        TokenParams {
            name: self.token_name.clone(),
            symbol: self.token_symbol.clone(),
            decimals: self.token_decimals,
        }
    }
}

/// Which part of the deployment to run
#[derive(ValueEnum, Copy, Clone, Debug, PartialEq, Eq)]
pub enum DeployStage {
    /// The governance target and proxy
    Governance,
    /// The verifier target and proxy
    Verifier,
    /// The Franklin target and proxy
    Franklin,
    /// The upgrade gatekeeper and the mastership transfers
    Gatekeeper,
}

impl Display for DeployStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DeployStage::Governance => write!(f, "governance"),
            DeployStage::Verifier => write!(f, "verifier"),
            DeployStage::Franklin => write!(f, "franklin"),
            DeployStage::Gatekeeper => write!(f, "gatekeeper"),
        }
    }
}

/// Deploy the Franklin contracts.
///
/// Each of `Governance`, `Verifier` and `Franklin` is deployed as an
/// implementation contract behind a `Proxy`. Calls made to the proxy are
/// delegated to the implementation. The proxies are then handed over to an
/// `UpgradeGatekeeper`, through which all upgrades must go.
#[derive(Args)]
pub struct DeployArgs {
    /// Deploy only one part of the system, taking the other addresses
    /// from the environment
    #[arg(long)]
    pub only: Option<DeployStage>,

    /// Deploy the test variants of the implementation contracts
    #[arg(long)]
    pub test: bool,

    /// Address of the operator to register as validator
    #[arg(long, env = OPERATOR_ENV_VAR)]
    pub operator: Option<Address>,

    /// Gas limit of the deployment transactions
    #[arg(long, default_value_t = DEFAULT_GAS_LIMIT)]
    pub gas_limit: u64,

    /// Constructor and initialization parameters
    #[command(flatten)]
    pub init: InitArgs,

    /// Also deploy, mint and list a test ERC20 token
    #[arg(long)]
    pub test_token: bool,

    /// Amount of test tokens minted to the deployer, in base units
    #[arg(long, default_value = DEFAULT_MINT_AMOUNT)]
    pub mint_amount: U256,

    /// Also verify the deployed sources on Etherscan
    #[arg(long)]
    pub publish: bool,

    /// Etherscan settings
    #[command(flatten)]
    pub etherscan: EtherscanArgs,

    /// Also register the deployed sources with Tesseracts
    #[arg(long)]
    pub register_metadata: bool,

    /// Tesseracts settings
    #[command(flatten)]
    pub tesseracts: TesseractsArgs,
}

/// Deploy the upgrade gatekeeper for already deployed proxies
#[derive(Args)]
pub struct UpgradeGatekeeperArgs {
    /// Address of the network governor, defaults to the deployer
    #[arg(long, env = GOVERNOR_ADDRESS_ENV_VAR)]
    pub governor: Option<Address>,

    /// Gas limit of the deployment transaction
    #[arg(long, default_value_t = DEFAULT_GAS_LIMIT)]
    pub gas_limit: u64,
}

/// Deploy a test ERC20 token
#[derive(Args)]
pub struct TestTokenArgs {
    /// Parameters of the test token
    #[command(flatten)]
    pub token: TokenArgs,

    /// Amount minted to the deployer, in base units
    #[arg(long, default_value = DEFAULT_MINT_AMOUNT)]
    pub mint_amount: U256,

    /// Gas limit of the deployment transaction
    #[arg(long, default_value_t = DEFAULT_GAS_LIMIT)]
    pub gas_limit: u64,
}

/// Mint an existing test ERC20 token
#[derive(Args)]
pub struct MintTestTokenArgs {
    /// Recipient of the tokens, defaults to the deployer
    #[arg(long)]
    pub recipient: Option<Address>,

    /// Amount to mint, in base units
    #[arg(long, default_value = DEFAULT_MINT_AMOUNT)]
    pub amount: U256,
}

/// Etherscan settings
#[derive(Args, Clone)]
pub struct EtherscanArgs {
    /// Etherscan API key
    #[arg(long, env = ETHERSCAN_API_KEY_ENV_VAR, hide_env_values = true)]
    pub etherscan_api_key: Option<String>,

    /// Name of the Ethereum network the contracts live on
    #[arg(long, env = ETH_NETWORK_ENV_VAR, default_value = DEFAULT_ETH_NETWORK)]
    pub network: String,

    /// Override of the Etherscan API URL derived from the network
    #[arg(long)]
    pub etherscan_api_url: Option<String>,
}

/// Tesseracts settings
#[derive(Args, Clone)]
pub struct TesseractsArgs {
    /// Base URL of the Tesseracts explorer
    #[arg(long, env = TESSERACTS_URL_ENV_VAR, default_value = DEFAULT_TESSERACTS_URL)]
    pub tesseracts_url: String,
}

/// Verify contract sources on Etherscan
#[derive(Args)]
pub struct PublishArgs {
    /// The contracts to verify, defaults to every contract with a known address
    #[arg(short, long, value_delimiter = ',')]
    pub contracts: Vec<ContractName>,

    /// Constructor and initialization parameters the contracts were deployed with
    #[command(flatten)]
    pub init: InitArgs,

    /// Etherscan settings
    #[command(flatten)]
    pub etherscan: EtherscanArgs,
}

/// Register contract sources with a Tesseracts explorer
#[derive(Args)]
pub struct RegisterMetadataArgs {
    /// The contracts to register, defaults to every contract with a known address
    #[arg(short, long, value_delimiter = ',')]
    pub contracts: Vec<ContractName>,

    /// Tesseracts settings
    #[command(flatten)]
    pub tesseracts: TesseractsArgs,
}

#[cfg(test)]
mod tests {
    use alloy::primitives::{address, U256};
    use clap::Parser;

    use super::{Cli, Command, DeployStage, InitArgs, TokenArgs};
    use crate::types::ContractName;

    #[test]
    fn test_parse_deploy() {
        let cli = Cli::try_parse_from([
            "franklin-scripts",
            "deploy",
            "--only",
            "gatekeeper",
            "--governor",
            "0x1111111111111111111111111111111111111111",
            "--test",
            "--governance",
            "0x2222222222222222222222222222222222222222",
        ])
        .unwrap();

        let Command::Deploy(args) = cli.command else {
            panic!("expected deploy command");
        };
        assert_eq!(args.only, Some(DeployStage::Gatekeeper));
        assert!(args.test);
        assert_eq!(
            args.init.governor,
            Some(address!("1111111111111111111111111111111111111111"))
        );
        assert_eq!(
            cli.globals.addresses.to_book().get(ContractName::Governance),
            Some(address!("2222222222222222222222222222222222222222"))
        );
    }

    #[test]
    fn test_parse_publish_contract_list() {
        let cli = Cli::try_parse_from([
            "franklin-scripts",
            "publish",
            "--contracts",
            "governance-target,franklin",
        ])
        .unwrap();

        let Command::Publish(args) = cli.command else {
            panic!("expected publish command");
        };
        assert_eq!(
            args.contracts,
            vec![ContractName::GovernanceTarget, ContractName::Franklin]
        );
    }

    #[test]
    fn test_parse_mint_amount() {
        let cli = Cli::try_parse_from([
            "franklin-scripts",
            "mint-test-token",
            "--amount",
            "1000",
        ])
        .unwrap();

        let Command::MintTestToken(args) = cli.command else {
            panic!("expected mint command");
        };
        assert_eq!(args.amount, U256::from(1000));
    }

    #[test]
    fn test_init_args_governor_fallback() {
        let deployer = address!("3333333333333333333333333333333333333333");
        let governor = address!("4444444444444444444444444444444444444444");

        let mut init = InitArgs {
            governor: None,
            genesis_root: None,
            token: TokenArgs {
                token_name: "Token".to_string(),
                token_symbol: "TKN".to_string(),
                token_decimals: 18,
            },
        };
        assert_eq!(init.resolve(Some(deployer)).unwrap().governor, deployer);
        assert!(init.resolve(None).is_err());

        init.governor = Some(governor);
        assert_eq!(init.resolve(Some(deployer)).unwrap().governor, governor);
    }
}
