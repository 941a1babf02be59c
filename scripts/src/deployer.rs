//! Sequential deployment of the Franklin contracts.
//!
//! Each implementation ("target") contract is deployed first, then a
//! `Proxy` delegating to it and initializing it. Once all proxies exist,
//! an `UpgradeGatekeeper` is deployed and made master of every proxy, and
//! its own mastership is handed to the network governor.
//!
//! Every transaction is awaited until its receipt is available before the
//! next one is sent.

use alloy::{
    network::TransactionBuilder,
    primitives::{Address, Bytes, B256, U256},
    providers::{DynProvider, Provider},
    rpc::types::TransactionRequest,
};
use tracing::{debug, info};

use crate::{
    artifacts::ArtifactStore,
    constants::{DEFAULT_TEST_TOKEN_DECIMALS, DEFAULT_TEST_TOKEN_NAME, DEFAULT_TEST_TOKEN_SYMBOL},
    errors::ScriptError,
    solidity::{
        franklin_init_params, gatekeeper_constructor_args, governance_init_params,
        proxy_constructor_args, test_token_constructor_args, verifier_init_params, Governance,
        Proxy, TestnetERC20Token, UpgradeGatekeeper,
    },
    types::{AddressBook, ContractName},
    utils::send_tx,
};

/// The parameters of the test ERC20 token
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenParams {
    /// The token name
    pub name: String,
    /// The token symbol
    pub symbol: String,
    /// The token decimals
    pub decimals: u8,
}

impl Default for TokenParams {
    fn default() -> Self {
        Self {
            name: DEFAULT_TEST_TOKEN_NAME.to_string(),
            symbol: DEFAULT_TEST_TOKEN_SYMBOL.to_string(),
            decimals: DEFAULT_TEST_TOKEN_DECIMALS,
        }
    }
}

/// The parameters the contracts are constructed and initialized with
#[derive(Debug, Clone)]
pub struct DeployParams {
    /// The network governor, master of the gatekeeper once deployed
    pub governor: Address,
    /// The root of the rollup genesis state
    pub genesis_root: Option<B256>,
    /// The parameters of the test token
    pub token: TokenParams,
}

/// The number of constructor arguments of a contract
pub fn constructor_arity(name: ContractName) -> usize {
    match name {
        ContractName::GovernanceTarget
        | ContractName::VerifierTarget
        | ContractName::FranklinTarget => 0,
        ContractName::Governance | ContractName::Verifier | ContractName::Franklin => 2,
        ContractName::UpgradeGatekeeper => 1,
        ContractName::TestErc20 => 3,
    }
}

/// The parameters a proxy initializes its target with
pub fn proxy_init_params(
    proxy: ContractName,
    book: &AddressBook,
    params: &DeployParams,
) -> Result<Bytes, ScriptError> {
    match proxy {
        ContractName::Governance => Ok(governance_init_params(params.governor)),
        ContractName::Verifier => Ok(verifier_init_params()),
        ContractName::Franklin => {
            let genesis_root = params.genesis_root.ok_or_else(|| {
                ScriptError::CalldataConstruction("no genesis root given".to_string())
            })?;

            Ok(franklin_init_params(
                book.address(ContractName::Governance)?,
                book.address(ContractName::Verifier)?,
                genesis_root,
            ))
        }
        name => Err(ScriptError::CalldataConstruction(format!(
            "{name} is not a proxy"
        ))),
    }
}

/// The ABI-encoded constructor arguments of a contract, derived from the
/// addresses already known and the deploy parameters
pub fn constructor_args(
    name: ContractName,
    book: &AddressBook,
    params: &DeployParams,
) -> Result<Bytes, ScriptError> {
    match name {
        ContractName::GovernanceTarget
        | ContractName::VerifierTarget
        | ContractName::FranklinTarget => Ok(Bytes::new()),
        ContractName::Governance | ContractName::Verifier | ContractName::Franklin => {
            let target = name.proxy_target().ok_or_else(|| {
                ScriptError::CalldataConstruction(format!("{name} has no target"))
            })?;
            let target = book.address(target)?;
            let init_params = proxy_init_params(name, book, params)?;
            Ok(proxy_constructor_args(target, init_params))
        }
        ContractName::UpgradeGatekeeper => Ok(gatekeeper_constructor_args(
            book.address(ContractName::Franklin)?,
        )),
        ContractName::TestErc20 => Ok(test_token_constructor_args(
            &params.token.name,
            &params.token.symbol,
            params.token.decimals,
        )),
    }
}

/// Deploys the contracts and records their addresses
pub struct Deployer {
    /// The signing client
    provider: DynProvider,
    /// The address transactions are sent from
    sender: Address,
    /// The compiled artifacts
    artifacts: ArtifactStore,
    /// The construction parameters
    params: DeployParams,
    /// The contracts known so far
    book: AddressBook,
    /// The gas limit of deployment transactions
    gas_limit: u64,
}

impl Deployer {
    /// Create a deployer starting from the given known contracts
    pub fn new(
        provider: DynProvider,
        sender: Address,
        artifacts: ArtifactStore,
        params: DeployParams,
        book: AddressBook,
        gas_limit: u64,
    ) -> Self {
        Self {
            provider,
            sender,
            artifacts,
            params,
            book,
            gas_limit,
        }
    }

    /// The contracts known so far
    pub fn book(&self) -> &AddressBook {
        &self.book
    }

    /// Consume the deployer, returning the contracts known so far
    pub fn into_book(self) -> AddressBook {
        self.book
    }

    /// Deploy every proxied contract, then the gatekeeper, and hand the
    /// gatekeeper mastership of the proxies
    pub async fn deploy_all(&mut self) -> Result<(), ScriptError> {
        for proxy in ContractName::PROXIES {
            self.deploy_proxied(proxy).await?;
        }

        self.deploy_upgrade_gatekeeper().await?;
        self.transfer_mastership_to_gatekeeper().await
    }

    /// Deploy the target of a proxy, then the proxy itself
    pub async fn deploy_proxied(&mut self, proxy: ContractName) -> Result<Address, ScriptError> {
        let target = proxy
            .proxy_target()
            .ok_or_else(|| ScriptError::ContractDeployment(format!("{proxy} is not a proxy")))?;

        self.deploy_contract(target).await?;
        self.deploy_contract(proxy).await
    }

    /// Deploy the upgrade gatekeeper for the Franklin proxy
    pub async fn deploy_upgrade_gatekeeper(&mut self) -> Result<Address, ScriptError> {
        self.deploy_contract(ContractName::UpgradeGatekeeper).await
    }

    /// Make the gatekeeper master of every proxy and register the proxies
    /// with it, then transfer the gatekeeper to the network governor
    pub async fn transfer_mastership_to_gatekeeper(&self) -> Result<(), ScriptError> {
        let gatekeeper_address = self.book.address(ContractName::UpgradeGatekeeper)?;
        let gatekeeper = UpgradeGatekeeper::new(gatekeeper_address, self.provider.clone());

        for name in ContractName::PROXIES {
            let proxy_address = self.book.address(name)?;
            let proxy = Proxy::new(proxy_address, self.provider.clone());

            send_tx(proxy.transferMastership(gatekeeper_address)).await?;
            send_tx(gatekeeper.addUpgradeable(proxy_address)).await?;
            info!("{name} proxy is now upgradeable through the gatekeeper");
        }

        send_tx(gatekeeper.transferMastership(self.params.governor)).await?;
        info!(
            "Gatekeeper mastership transferred to governor {}",
            self.params.governor
        );

        Ok(())
    }

    /// Allow the operator to commit and verify blocks
    pub async fn set_validator(&self, operator: Address) -> Result<(), ScriptError> {
        let governance = Governance::new(
            self.book.address(ContractName::Governance)?,
            self.provider.clone(),
        );

        send_tx(governance.setValidator(operator, true)).await?;
        info!("Operator {operator} set as validator");

        Ok(())
    }

    /// Deploy the test ERC20 token, mint `amount` to the sender and list the
    /// token in governance
    pub async fn deploy_test_token(&mut self, amount: U256) -> Result<Address, ScriptError> {
        let token = self.deploy_contract(ContractName::TestErc20).await?;
        self.mint_test_token(self.sender, amount).await?;
        self.add_token(token).await?;

        Ok(token)
    }

    /// Mint test tokens to `recipient`
    pub async fn mint_test_token(
        &self,
        recipient: Address,
        amount: U256,
    ) -> Result<(), ScriptError> {
        let token = TestnetERC20Token::new(
            self.book.address(ContractName::TestErc20)?,
            self.provider.clone(),
        );

        send_tx(token.mint(recipient, amount)).await?;
        info!("Minted {amount} test tokens to {recipient}");

        Ok(())
    }

    /// List a token in governance
    pub async fn add_token(&self, token: Address) -> Result<(), ScriptError> {
        let governance = Governance::new(
            self.book.address(ContractName::Governance)?,
            self.provider.clone(),
        );

        send_tx(governance.addToken(token)).await?;
        info!("Token {token} added to governance");

        Ok(())
    }

    /// Deploy a single contract from its artifact and record it
    async fn deploy_contract(&mut self, name: ContractName) -> Result<Address, ScriptError> {
        let artifact = self.artifacts.load(name)?;
        artifact.check_constructor_arity(name, constructor_arity(name))?;

        let args = constructor_args(name, &self.book, &self.params)?;
        let tx = TransactionRequest::default()
            .with_deploy_code(artifact.deploy_code(&args))
            .with_gas_limit(self.gas_limit);

        debug!(
            "Deploying {name} from {}",
            self.artifacts.path(name).display()
        );
        let receipt = self
            .provider
            .send_transaction(tx)
            .await
            .map_err(|e| ScriptError::ContractDeployment(format!("{name}: {e}")))?
            .get_receipt()
            .await
            .map_err(|e| ScriptError::ContractDeployment(format!("{name}: {e}")))?;

        if !receipt.status() {
            return Err(ScriptError::ContractDeployment(format!(
                "{name}: transaction {} reverted",
                receipt.transaction_hash
            )));
        }

        let address = receipt.contract_address.ok_or_else(|| {
            ScriptError::ContractDeployment(format!("{name}: receipt has no contract address"))
        })?;

        info!(
            "{name} deployed at {address} (tx {})",
            receipt.transaction_hash
        );
        self.book
            .record_deployment(name, address, receipt.transaction_hash, args);

        Ok(address)
    }
}

#[cfg(test)]
mod tests {
    use alloy::primitives::{address, b256, Address};

    use super::{constructor_args, proxy_init_params, DeployParams, TokenParams};
    use crate::{
        solidity::{franklin_init_params, proxy_constructor_args},
        types::{AddressBook, ContractName},
    };

    const GOVERNOR: Address = address!("9999999999999999999999999999999999999999");

    fn params() -> DeployParams {
        DeployParams {
            governor: GOVERNOR,
            genesis_root: Some(b256!(
                "0202020202020202020202020202020202020202020202020202020202020202"
            )),
            token: TokenParams::default(),
        }
    }

    #[test]
    fn test_targets_take_no_args() {
        let book = AddressBook::default();
        for name in ContractName::ALL.into_iter().filter(ContractName::is_target) {
            assert!(constructor_args(name, &book, &params()).unwrap().is_empty());
        }
    }

    #[test]
    fn test_proxy_requires_target() {
        let book = AddressBook::default();
        let err = constructor_args(ContractName::Governance, &book, &params()).unwrap_err();
        assert!(err.to_string().contains("GOVERNANCE_TARGET_ADDR"));
    }

    #[test]
    fn test_franklin_proxy_args() {
        let governance = address!("1111111111111111111111111111111111111111");
        let verifier = address!("2222222222222222222222222222222222222222");
        let target = address!("3333333333333333333333333333333333333333");

        let mut book = AddressBook::default();
        book.set_address(ContractName::Governance, governance);
        book.set_address(ContractName::Verifier, verifier);
        book.set_address(ContractName::FranklinTarget, target);

        let params = params();
        let args = constructor_args(ContractName::Franklin, &book, &params).unwrap();
        let expected = proxy_constructor_args(
            target,
            franklin_init_params(governance, verifier, params.genesis_root.unwrap()),
        );
        assert_eq!(args, expected);
    }

    #[test]
    fn test_franklin_requires_genesis_root() {
        let mut book = AddressBook::default();
        book.set_address(ContractName::Governance, Address::repeat_byte(1));
        book.set_address(ContractName::Verifier, Address::repeat_byte(2));

        let params = DeployParams {
            genesis_root: None,
            ..params()
        };
        let err = proxy_init_params(ContractName::Franklin, &book, &params).unwrap_err();
        assert!(err.to_string().contains("genesis root"));
    }

    #[test]
    fn test_gatekeeper_points_at_franklin() {
        let franklin = address!("4444444444444444444444444444444444444444");
        let mut book = AddressBook::default();
        book.set_address(ContractName::Franklin, franklin);

        let args = constructor_args(ContractName::UpgradeGatekeeper, &book, &params()).unwrap();
        assert_eq!(&args[12..], franklin.as_slice());
    }

    #[test]
    fn test_only_proxies_have_init_params() {
        let book = AddressBook::default();
        assert!(proxy_init_params(ContractName::UpgradeGatekeeper, &book, &params()).is_err());
        assert!(proxy_init_params(ContractName::Verifier, &book, &params())
            .unwrap()
            .is_empty());
    }
}
