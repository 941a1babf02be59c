//! Implementations of the various deploy scripts

use std::path::Path;

use alloy::primitives::{Address, U256};
use tracing::{debug, error, info, warn};

use crate::{
    artifacts::ArtifactStore,
    cli::{
        DeployArgs, DeployStage, EtherscanArgs, GlobalArgs, MintTestTokenArgs, PublishArgs,
        RegisterMetadataArgs, TesseractsArgs, TestTokenArgs, UpgradeGatekeeperArgs,
    },
    constants::{DEFAULT_GAS_LIMIT, ETHERSCAN_API_KEY_ENV_VAR},
    deployer::{constructor_args, DeployParams, Deployer, TokenParams},
    errors::ScriptError,
    etherscan::{
        etherscan_address_url, etherscan_api_url, EtherscanClient, VerificationRequest,
    },
    flatten::flatten,
    tesseracts::TesseractsClient,
    types::{AddressBook, ContractName, VerificationStatus},
    utils::{seed_from_deployments_file, setup_client, signer_address, write_deployments},
};

/// Deploy the contracts, wire up the gatekeeper, and run the requested
/// follow-up steps
pub async fn deploy(args: DeployArgs, globals: GlobalArgs) -> Result<(), ScriptError> {
    let (provider, sender) = setup_client(globals.priv_key.as_deref(), &globals.rpc_url).await?;
    let params = args.init.resolve(Some(sender))?;
    let book = load_address_book(&globals)?;
    let artifacts = ArtifactStore::new(&globals.artifacts_dir, args.test);

    let deployer = Deployer::new(
        provider,
        sender,
        artifacts,
        params.clone(),
        book,
        args.gas_limit,
    );

    let stages = DeployStages {
        only: args.only,
        operator: args.operator,
        test_token: args.test_token.then_some(args.mint_amount),
    };
    let book = deploy_and_report(deployer, &stages, &globals.deployments_path).await?;

    // Only the contracts deployed in this run are published
    let deployed: Vec<ContractName> = book
        .known()
        .map(|(name, _)| name)
        .filter(|name| book.tx_hash(*name).is_some())
        .collect();

    if args.publish {
        verify_contracts(&deployed, &book, &params, &args.etherscan, &globals.sources_dir).await;
    }

    if args.register_metadata {
        register_contracts(&deployed, &book, &args.tesseracts, &globals.sources_dir).await;
    }

    Ok(())
}

/// Deploy the upgrade gatekeeper and hand it mastership of the proxies
/// already deployed
pub async fn upgrade_gatekeeper(
    args: UpgradeGatekeeperArgs,
    globals: GlobalArgs,
) -> Result<(), ScriptError> {
    let (provider, sender) = setup_client(globals.priv_key.as_deref(), &globals.rpc_url).await?;
    let params = DeployParams {
        governor: args.governor.unwrap_or(sender),
        genesis_root: None,
        token: TokenParams::default(),
    };
    let book = load_address_book(&globals)?;
    let artifacts = ArtifactStore::new(&globals.artifacts_dir, false /* test */);

    let deployer = Deployer::new(provider, sender, artifacts, params, book, args.gas_limit);
    let stages = DeployStages {
        only: Some(DeployStage::Gatekeeper),
        operator: None,
        test_token: None,
    };
    deploy_and_report(deployer, &stages, &globals.deployments_path).await?;

    Ok(())
}

/// Deploy the test token, mint it to the deployer and list it in
/// governance. Failures are logged.
pub async fn deploy_test_token(
    args: TestTokenArgs,
    globals: GlobalArgs,
) -> Result<(), ScriptError> {
    let (provider, sender) = setup_client(globals.priv_key.as_deref(), &globals.rpc_url).await?;
    let params = DeployParams {
        governor: sender,
        genesis_root: None,
        token: args.token.params(),
    };
    let book = load_address_book(&globals)?;
    let artifacts = ArtifactStore::new(&globals.artifacts_dir, false /* test */);

    let mut deployer = Deployer::new(provider, sender, artifacts, params, book, args.gas_limit);
    match deployer.deploy_test_token(args.mint_amount).await {
        Ok(token) => info!("Test token ready at {token}"),
        Err(e) => error!("Failed to set up the test token: {e}"),
    }

    report(deployer.book(), &globals.deployments_path)
}

/// Mint the test token. Failures are logged.
pub async fn mint_test_token(
    args: MintTestTokenArgs,
    globals: GlobalArgs,
) -> Result<(), ScriptError> {
    let (provider, sender) = setup_client(globals.priv_key.as_deref(), &globals.rpc_url).await?;
    let params = DeployParams {
        governor: sender,
        genesis_root: None,
        token: TokenParams::default(),
    };
    let book = load_address_book(&globals)?;
    let artifacts = ArtifactStore::new(&globals.artifacts_dir, false /* test */);

    let deployer = Deployer::new(provider, sender, artifacts, params, book, DEFAULT_GAS_LIMIT);
    let recipient = args.recipient.unwrap_or(sender);
    if let Err(e) = deployer.mint_test_token(recipient, args.amount).await {
        error!("Failed to mint test tokens: {e}");
    }

    Ok(())
}

/// Verify the sources of deployed contracts on Etherscan
pub async fn publish(args: PublishArgs, globals: GlobalArgs) -> Result<(), ScriptError> {
    let book = load_address_book(&globals)?;
    let params = args
        .init
        .resolve(signer_address(globals.priv_key.as_deref())?)?;

    let contracts = requested_contracts(&args.contracts, &book);
    verify_contracts(&contracts, &book, &params, &args.etherscan, &globals.sources_dir).await;

    Ok(())
}

/// Register the sources of deployed contracts with Tesseracts
pub async fn register_metadata(
    args: RegisterMetadataArgs,
    globals: GlobalArgs,
) -> Result<(), ScriptError> {
    let book = load_address_book(&globals)?;

    let contracts = requested_contracts(&args.contracts, &book);
    register_contracts(&contracts, &book, &args.tesseracts, &globals.sources_dir).await;

    Ok(())
}

// -----------
// | HELPERS |
// -----------

/// The steps of a `deploy` run
struct DeployStages {
    /// The only stage to run, all of them if unset
    only: Option<DeployStage>,
    /// The operator to register as validator
    operator: Option<Address>,
    /// The amount of test tokens to mint, if a test token is deployed
    test_token: Option<U256>,
}

/// Run the deploy stages, then report the contracts known at the end.
///
/// The report is written even when a stage fails, so the contracts already
/// on chain are known to the next run.
async fn deploy_and_report(
    mut deployer: Deployer,
    stages: &DeployStages,
    deployments_path: &Path,
) -> Result<AddressBook, ScriptError> {
    let result = run_stages(&mut deployer, stages).await;
    let book = deployer.into_book();

    match (result, report(&book, deployments_path)) {
        (Ok(()), Ok(())) => Ok(book),
        (Err(e), Ok(())) | (Ok(()), Err(e)) => Err(e),
        (Err(e), Err(report_err)) => {
            error!("Failed to record deployments: {report_err}");
            Err(e)
        }
    }
}

/// Run the deploy stages in order
async fn run_stages(deployer: &mut Deployer, stages: &DeployStages) -> Result<(), ScriptError> {
    match stages.only {
        None => deployer.deploy_all().await?,
        Some(DeployStage::Governance) => {
            deployer.deploy_proxied(ContractName::Governance).await?;
        }
        Some(DeployStage::Verifier) => {
            deployer.deploy_proxied(ContractName::Verifier).await?;
        }
        Some(DeployStage::Franklin) => {
            deployer.deploy_proxied(ContractName::Franklin).await?;
        }
        Some(DeployStage::Gatekeeper) => {
            deployer.deploy_upgrade_gatekeeper().await?;
            deployer.transfer_mastership_to_gatekeeper().await?;
        }
    }

    // The validator can only be set once governance exists
    if let Some(operator) = stages.operator {
        if matches!(stages.only, None | Some(DeployStage::Governance)) {
            deployer.set_validator(operator).await?;
        }
    }

    if let Some(amount) = stages.test_token {
        if let Err(e) = deployer.deploy_test_token(amount).await {
            error!("Failed to set up the test token: {e}");
        }
    }

    Ok(())
}

/// Collect the known addresses: those given on the command line or in the
/// environment first, then those recorded in the deployments file
fn load_address_book(globals: &GlobalArgs) -> Result<AddressBook, ScriptError> {
    let mut book = globals.addresses.to_book();
    seed_from_deployments_file(&mut book, &globals.deployments_path)?;

    Ok(book)
}

/// Log the deployments, print the env lines to stdout and update the
/// deployments file
fn report(book: &AddressBook, deployments_path: &Path) -> Result<(), ScriptError> {
    for (name, address) in book.known() {
        match book.tx_hash(name) {
            Some(tx_hash) => info!("{name}: {address} (deployed in {tx_hash})"),
            None => debug!("{name}: {address}"),
        }
    }

    for line in book.env_lines() {
        println!("{line}");
    }

    write_deployments(deployments_path, book)
}

/// The contracts a command should act on, defaulting to every contract
/// with a known address
fn requested_contracts(requested: &[ContractName], book: &AddressBook) -> Vec<ContractName> {
    if requested.is_empty() {
        book.known().map(|(name, _)| name).collect()
    } else {
        requested.to_vec()
    }
}

/// Flatten the source file of a contract
fn contract_source(name: ContractName, sources_dir: &Path) -> Result<String, ScriptError> {
    let entry = sources_dir.join(format!("{}.sol", name.source_name()));
    flatten(&entry, sources_dir)
}

/// Verify each contract on Etherscan, logging the outcome
async fn verify_contracts(
    contracts: &[ContractName],
    book: &AddressBook,
    params: &DeployParams,
    etherscan: &EtherscanArgs,
    sources_dir: &Path,
) {
    let Some(api_key) = etherscan.etherscan_api_key.clone() else {
        error!("Cannot publish sources, {ETHERSCAN_API_KEY_ENV_VAR} is not set");
        return;
    };

    let api_url = etherscan
        .etherscan_api_url
        .clone()
        .unwrap_or_else(|| etherscan_api_url(&etherscan.network));
    let client = EtherscanClient::new(api_url, api_key);

    for name in contracts.iter().copied() {
        let address = match book.address(name) {
            Ok(address) => address,
            Err(e) => {
                warn!("Skipping publication: {e}");
                continue;
            }
        };

        match verify_contract(&client, name, address, book, params, sources_dir).await {
            Ok(VerificationStatus::Failed(msg)) => {
                error!("Verification of {name} failed: {msg}");
            }
            Ok(status) => info!(
                "{name} {status}: {}",
                etherscan_address_url(&etherscan.network, address)
            ),
            Err(e) => error!("Failed to publish {name}: {e}"),
        }
    }
}

/// Verify a single contract on Etherscan
async fn verify_contract(
    client: &EtherscanClient,
    name: ContractName,
    address: Address,
    book: &AddressBook,
    params: &DeployParams,
    sources_dir: &Path,
) -> Result<VerificationStatus, ScriptError> {
    let source_code = contract_source(name, sources_dir)?;

    // Contracts deployed in an earlier run have their arguments recomputed
    let args = match book.constructor_args(name) {
        Some(args) => args.clone(),
        None => constructor_args(name, book, params)?,
    };

    let request = VerificationRequest {
        address,
        contract_name: name.source_name().to_string(),
        source_code,
        constructor_args: args,
    };

    client.verify(&request).await
}

/// Register each contract with Tesseracts, logging the outcome
async fn register_contracts(
    contracts: &[ContractName],
    book: &AddressBook,
    tesseracts: &TesseractsArgs,
    sources_dir: &Path,
) {
    let client = TesseractsClient::new(tesseracts.tesseracts_url.clone());

    for name in contracts.iter().copied() {
        let result = match book.address(name) {
            Ok(address) => register_contract(&client, name, address, sources_dir).await,
            Err(e) => Err(e),
        };

        match result {
            Ok(()) => info!("Registered {name} with tesseracts"),
            Err(e) => error!("Failed to register {name} with tesseracts: {e}"),
        }
    }
}

/// Register a single contract with Tesseracts
async fn register_contract(
    client: &TesseractsClient,
    name: ContractName,
    address: Address,
    sources_dir: &Path,
) -> Result<(), ScriptError> {
    let source_code = contract_source(name, sources_dir)?;
    client
        .register_contract(address, name.source_name(), &source_code)
        .await
}

#[cfg(test)]
mod tests {
    use std::fs;

    use alloy::{
        primitives::address,
        providers::{DynProvider, ProviderBuilder},
        transports::http::reqwest::Url,
    };

    use super::{deploy_and_report, DeployStages};
    use crate::{
        artifacts::ArtifactStore,
        cli::DeployStage,
        deployer::{DeployParams, Deployer, TokenParams},
        errors::ScriptError,
        types::{AddressBook, ContractName},
        utils::parse_addr_from_deployments_file,
    };

    /// An artifact whose constructor takes the main contract address
    const GATEKEEPER_ARTIFACT: &str = r#"{
        "abi": [{
            "type": "constructor",
            "inputs": [{ "name": "mainContract", "type": "address", "internalType": "address" }],
            "stateMutability": "nonpayable"
        }],
        "bytecode": "0x00"
    }"#;

    #[tokio::test]
    async fn test_failed_stage_still_records_deployments() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("UpgradeGatekeeper.json"), GATEKEEPER_ARTIFACT).unwrap();
        let deployments_path = dir.path().join("deployments.json");

        // Never contacted, the stage fails before sending anything
        let url: Url = "http://127.0.0.1:1".parse().unwrap();
        let provider = DynProvider::new(ProviderBuilder::new().on_http(url));

        let governor = address!("9999999999999999999999999999999999999999");
        let governance = address!("1111111111111111111111111111111111111111");
        let mut book = AddressBook::default();
        book.set_address(ContractName::Governance, governance);

        let params = DeployParams {
            governor,
            genesis_root: None,
            token: TokenParams::default(),
        };
        let deployer = Deployer::new(
            provider,
            governor,
            ArtifactStore::new(dir.path(), false /* test */),
            params,
            book,
            1_000_000,
        );
        let stages = DeployStages {
            only: Some(DeployStage::Gatekeeper),
            operator: None,
            test_token: None,
        };

        // The gatekeeper needs the Franklin proxy, which is unknown
        let err = deploy_and_report(deployer, &stages, &deployments_path)
            .await
            .unwrap_err();
        assert!(
            matches!(err, ScriptError::MissingAddress(ref msg) if msg.contains("CONTRACT_ADDR"))
        );

        let recorded =
            parse_addr_from_deployments_file(&deployments_path, "governance_contract").unwrap();
        assert_eq!(recorded, Some(governance));
    }
}
