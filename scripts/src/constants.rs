//! Constants used in the deploy scripts

use std::time::Duration;

// ----------------------------
// | Environment & CLI defaults |
// ----------------------------

/// The environment variable pointing to an alternative dotenv file
pub const ENV_FILE_ENV_VAR: &str = "FRANKLIN_ENV_FILE";

/// The dotenv file loaded when no alternative is given
pub const DEFAULT_ENV_FILE: &str = ".env";

/// The environment variable holding the network RPC URL
pub const WEB3_URL_ENV_VAR: &str = "WEB3_URL";

/// The environment variable holding the deployer's private key
pub const PRIV_KEY_ENV_VAR: &str = "GOVERNOR_PRIVATE_KEY";

/// The environment variable holding the network governor address
pub const GOVERNOR_ADDRESS_ENV_VAR: &str = "GOVERNOR_ADDRESS";

/// The environment variable holding the rollup genesis root
pub const GENESIS_ROOT_ENV_VAR: &str = "GENESIS_ROOT";

/// The environment variable holding the operator (validator) address
pub const OPERATOR_ENV_VAR: &str = "OPERATOR_COMMIT_ETH_ADDRESS";

/// The environment variable holding the contract artifacts directory
pub const ARTIFACTS_DIR_ENV_VAR: &str = "CONTRACTS_BUILD_DIR";

/// The environment variable holding the Solidity sources directory
pub const SOURCES_DIR_ENV_VAR: &str = "CONTRACTS_SOURCE_DIR";

/// The environment variable holding the Etherscan API key
pub const ETHERSCAN_API_KEY_ENV_VAR: &str = "ETHERSCAN_API_KEY";

/// The environment variable holding the name of the Ethereum network
pub const ETH_NETWORK_ENV_VAR: &str = "ETH_NETWORK";

/// The environment variable holding the Tesseracts explorer URL
pub const TESSERACTS_URL_ENV_VAR: &str = "TESSERACTS_URL";

/// The environment variable under which the genesis transaction hash is exported
pub const GENESIS_TX_HASH_ENV_VAR: &str = "CONTRACT_GENESIS_TX_HASH";

/// The default network RPC URL
pub const DEFAULT_RPC_URL: &str = "http://localhost:8545";

/// The default directory containing the compiled contract artifacts
pub const DEFAULT_ARTIFACTS_DIR: &str = "contracts/build";

/// The default directory containing the Solidity sources
pub const DEFAULT_SOURCES_DIR: &str = "contracts/contracts";

/// The default path of the deployments file
pub const DEFAULT_DEPLOYMENTS_PATH: &str = "deployments.json";

/// The default Ethereum network name
pub const DEFAULT_ETH_NETWORK: &str = "mainnet";

/// The default Tesseracts explorer URL
pub const DEFAULT_TESSERACTS_URL: &str = "http://localhost:8000";

// ----------
// | Deploy |
// ----------

/// The default gas limit attached to deployment transactions
pub const DEFAULT_GAS_LIMIT: u64 = 5_000_000;

/// The extension of a compiled contract artifact
pub const ARTIFACT_EXTENSION: &str = "json";

/// The suffix appended to target artifact names when deploying test contracts
pub const TEST_ARTIFACT_SUFFIX: &str = "Test";

/// The deployments key in the `deployments.json` file
pub const DEPLOYMENTS_KEY: &str = "deployments";

/// The default name of the test ERC20 token
pub const DEFAULT_TEST_TOKEN_NAME: &str = "Test Token";

/// The default symbol of the test ERC20 token
pub const DEFAULT_TEST_TOKEN_SYMBOL: &str = "TEST";

/// The default number of decimals of the test ERC20 token
pub const DEFAULT_TEST_TOKEN_DECIMALS: u8 = 18;

/// The default amount of test tokens minted to the deployer, in base units
pub const DEFAULT_MINT_AMOUNT: &str = "1000000000000000000000000";

// -------------
// | Etherscan |
// -------------

/// The Etherscan API URL on mainnet
pub const ETHERSCAN_MAINNET_API_URL: &str = "https://api.etherscan.io/api";

/// The compiler version the contracts are built with, as Etherscan expects it
pub const SOLC_COMPILER_VERSION: &str = "v0.5.16+commit.9c3226ce";

/// The number of optimizer runs the contracts are built with
pub const SOLC_OPTIMIZER_RUNS: u32 = 200;

/// The code format of a flattened source submission
pub const ETHERSCAN_CODE_FORMAT: &str = "solidity-single-file";

/// The Etherscan error returned while a freshly deployed contract is not yet indexed
pub const CONTRACT_NOT_INDEXED_ERROR: &str = "Unable to locate ContractCode";

/// The Etherscan status returned while a verification is queued
pub const VERIFICATION_PENDING_STATUS: &str = "Pending in queue";

/// The Etherscan status returned for an already verified contract
pub const ALREADY_VERIFIED_STATUS: &str = "already verified";

/// The number of times a submission is retried while the contract is not yet indexed
pub const VERIFY_SUBMIT_RETRIES: usize = 20;

/// The delay between submissions while the contract is not yet indexed
pub const VERIFY_SUBMIT_DELAY: Duration = Duration::from_secs(15);

/// The number of times the verification status is polled
pub const VERIFY_POLL_RETRIES: usize = 10;

/// The delay between verification status polls
pub const VERIFY_POLL_DELAY: Duration = Duration::from_secs(5);

// --------------
// | Tesseracts |
// --------------

/// The compiler identifier registered with Tesseracts
pub const TESSERACTS_COMPILER: &str = "solc-0.5.16";
