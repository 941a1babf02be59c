//! Type definitions used throughout the scripts

use std::{
    collections::BTreeMap,
    fmt::{self, Display},
};

use alloy::primitives::{Address, Bytes, TxHash};
use clap::ValueEnum;

use crate::{
    constants::{GENESIS_TX_HASH_ENV_VAR, TEST_ARTIFACT_SUFFIX},
    errors::ScriptError,
};

/// The contracts managed by the deploy scripts.
///
/// Variants are declared in deployment order, which is also the order
/// in which they are reported.
#[derive(ValueEnum, Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ContractName {
    /// The governance implementation contract
    GovernanceTarget,
    /// The governance proxy contract
    Governance,
    /// The verifier implementation contract
    VerifierTarget,
    /// The verifier proxy contract
    Verifier,
    /// The Franklin rollup implementation contract
    FranklinTarget,
    /// The Franklin rollup proxy contract
    Franklin,
    /// The upgrade gatekeeper, master of all proxies
    UpgradeGatekeeper,
    /// The mintable ERC20 token used on test networks
    TestErc20,
}

impl ContractName {
    /// Every contract, in deployment order
    pub const ALL: [ContractName; 8] = [
        ContractName::GovernanceTarget,
        ContractName::Governance,
        ContractName::VerifierTarget,
        ContractName::Verifier,
        ContractName::FranklinTarget,
        ContractName::Franklin,
        ContractName::UpgradeGatekeeper,
        ContractName::TestErc20,
    ];

    /// The proxy contracts, in deployment order
    pub const PROXIES: [ContractName; 3] = [
        ContractName::Governance,
        ContractName::Verifier,
        ContractName::Franklin,
    ];

    /// The environment variable carrying the address of the contract
    pub fn env_var(&self) -> &'static str {
        match self {
            ContractName::GovernanceTarget => "GOVERNANCE_TARGET_ADDR",
            ContractName::Governance => "GOVERNANCE_ADDR",
            ContractName::VerifierTarget => "VERIFIER_TARGET_ADDR",
            ContractName::Verifier => "VERIFIER_ADDR",
            ContractName::FranklinTarget => "CONTRACT_TARGET_ADDR",
            ContractName::Franklin => "CONTRACT_ADDR",
            ContractName::UpgradeGatekeeper => "UPGRADE_GATEKEEPER_ADDR",
            ContractName::TestErc20 => "TEST_ERC20",
        }
    }

    /// The name of the Solidity contract, used to locate its source file
    /// and to identify it to block explorers
    pub fn source_name(&self) -> &'static str {
        match self {
            ContractName::GovernanceTarget => "Governance",
            ContractName::VerifierTarget => "Verifier",
            ContractName::FranklinTarget => "Franklin",
            ContractName::Governance | ContractName::Verifier | ContractName::Franklin => "Proxy",
            ContractName::UpgradeGatekeeper => "UpgradeGatekeeper",
            ContractName::TestErc20 => "TestnetERC20Token",
        }
    }

    /// The name of the compiled artifact to deploy for the contract.
    ///
    /// Test deployments swap the implementation contracts for their
    /// `*Test` counterparts; proxies and the gatekeeper are unchanged.
    pub fn artifact_name(&self, test: bool) -> String {
        let name = self.source_name();
        if test && self.is_target() {
            format!("{name}{TEST_ARTIFACT_SUFFIX}")
        } else {
            name.to_string()
        }
    }

    /// The key of the contract in the `deployments.json` file
    pub fn deployments_key(&self) -> &'static str {
        match self {
            ContractName::GovernanceTarget => "governance_target_contract",
            ContractName::Governance => "governance_contract",
            ContractName::VerifierTarget => "verifier_target_contract",
            ContractName::Verifier => "verifier_contract",
            ContractName::FranklinTarget => "franklin_target_contract",
            ContractName::Franklin => "franklin_contract",
            ContractName::UpgradeGatekeeper => "upgrade_gatekeeper_contract",
            ContractName::TestErc20 => "test_erc20_contract",
        }
    }

    /// The implementation contract a proxy points at, if this is a proxy
    pub fn proxy_target(&self) -> Option<ContractName> {
        match self {
            ContractName::Governance => Some(ContractName::GovernanceTarget),
            ContractName::Verifier => Some(ContractName::VerifierTarget),
            ContractName::Franklin => Some(ContractName::FranklinTarget),
            _ => None,
        }
    }

    /// Whether this is an implementation contract sitting behind a proxy
    pub fn is_target(&self) -> bool {
        matches!(
            self,
            ContractName::GovernanceTarget
                | ContractName::VerifierTarget
                | ContractName::FranklinTarget
        )
    }
}

impl Display for ContractName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ContractName::GovernanceTarget => write!(f, "governance-target"),
            ContractName::Governance => write!(f, "governance"),
            ContractName::VerifierTarget => write!(f, "verifier-target"),
            ContractName::Verifier => write!(f, "verifier"),
            ContractName::FranklinTarget => write!(f, "franklin-target"),
            ContractName::Franklin => write!(f, "franklin"),
            ContractName::UpgradeGatekeeper => write!(f, "upgrade-gatekeeper"),
            ContractName::TestErc20 => write!(f, "test-erc20"),
        }
    }
}

/// Bookkeeping of the contracts known to the scripts: their addresses,
/// the hashes of the transactions that deployed them during this run,
/// and the constructor arguments they were deployed with.
#[derive(Debug, Default, Clone)]
pub struct AddressBook {
    /// The contract addresses
    addresses: BTreeMap<ContractName, Address>,
    /// The deployment transaction hashes
    tx_hashes: BTreeMap<ContractName, TxHash>,
    /// The ABI-encoded constructor arguments
    constructor_args: BTreeMap<ContractName, Bytes>,
}

impl AddressBook {
    /// Set the address of a contract, overwriting any previous value
    pub fn set_address(&mut self, name: ContractName, address: Address) {
        self.addresses.insert(name, address);
    }

    /// Set the address of a contract only if none is known yet
    pub fn set_address_if_missing(&mut self, name: ContractName, address: Option<Address>) {
        if let Some(address) = address {
            self.addresses.entry(name).or_insert(address);
        }
    }

    /// Record a deployment made during this run
    pub fn record_deployment(
        &mut self,
        name: ContractName,
        address: Address,
        tx_hash: TxHash,
        constructor_args: Bytes,
    ) {
        self.addresses.insert(name, address);
        self.tx_hashes.insert(name, tx_hash);
        self.constructor_args.insert(name, constructor_args);
    }

    /// The address of a contract, if known
    pub fn get(&self, name: ContractName) -> Option<Address> {
        self.addresses.get(&name).copied()
    }

    /// The address of a contract, erroring if it is unknown
    pub fn address(&self, name: ContractName) -> Result<Address, ScriptError> {
        self.get(name).ok_or_else(|| {
            ScriptError::MissingAddress(format!("{name} (set {})", name.env_var()))
        })
    }

    /// The hash of the transaction that deployed a contract during this run
    pub fn tx_hash(&self, name: ContractName) -> Option<TxHash> {
        self.tx_hashes.get(&name).copied()
    }

    /// The constructor arguments a contract was deployed with during this run
    pub fn constructor_args(&self, name: ContractName) -> Option<&Bytes> {
        self.constructor_args.get(&name)
    }

    /// All contracts with a known address, in deployment order
    pub fn known(&self) -> impl Iterator<Item = (ContractName, Address)> + '_ {
        self.addresses.iter().map(|(name, address)| (*name, *address))
    }

    /// Render the known addresses as `NAME=value` environment lines.
    ///
    /// The hash of the Franklin proxy deployment is exported as well, since
    /// it marks the block from which the rollup state is replayed.
    pub fn env_lines(&self) -> Vec<String> {
        let mut lines: Vec<String> = self
            .known()
            .map(|(name, address)| format!("{}={address}", name.env_var()))
            .collect();

        if let Some(tx_hash) = self.tx_hash(ContractName::Franklin) {
            lines.push(format!("{GENESIS_TX_HASH_ENV_VAR}={tx_hash}"));
        }

        lines
    }
}

/// The outcome of a source code verification on a block explorer
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VerificationStatus {
    /// The explorer verified the source code
    Verified(String),
    /// The explorer was still processing the submission when polling stopped
    Pending(String),
    /// The explorer rejected the submission or the verification failed
    Failed(String),
}

impl Display for VerificationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            VerificationStatus::Verified(msg) => write!(f, "verified ({msg})"),
            VerificationStatus::Pending(msg) => write!(f, "pending ({msg})"),
            VerificationStatus::Failed(msg) => write!(f, "failed ({msg})"),
        }
    }
}

#[cfg(test)]
mod tests {
    use alloy::primitives::{address, b256, Bytes};

    use super::{AddressBook, ContractName};

    #[test]
    fn test_artifact_names() {
        assert_eq!(ContractName::GovernanceTarget.artifact_name(false), "Governance");
        assert_eq!(ContractName::GovernanceTarget.artifact_name(true), "GovernanceTest");
        assert_eq!(ContractName::FranklinTarget.artifact_name(true), "FranklinTest");
        // Proxies and the gatekeeper never swap artifacts
        assert_eq!(ContractName::Franklin.artifact_name(true), "Proxy");
        assert_eq!(ContractName::UpgradeGatekeeper.artifact_name(true), "UpgradeGatekeeper");
    }

    #[test]
    fn test_proxy_targets() {
        for proxy in ContractName::PROXIES {
            let target = proxy.proxy_target().unwrap();
            assert!(target.is_target());
            // Targets are deployed before the proxies pointing at them
            assert!(target < proxy);
        }
        assert_eq!(ContractName::UpgradeGatekeeper.proxy_target(), None);
    }

    #[test]
    fn test_missing_address_names_env_var() {
        let book = AddressBook::default();
        let err = book.address(ContractName::Verifier).unwrap_err();
        assert!(err.to_string().contains("VERIFIER_ADDR"));
    }

    #[test]
    fn test_set_if_missing_keeps_existing() {
        let first = address!("1111111111111111111111111111111111111111");
        let second = address!("2222222222222222222222222222222222222222");

        let mut book = AddressBook::default();
        book.set_address_if_missing(ContractName::Governance, Some(first));
        book.set_address_if_missing(ContractName::Governance, Some(second));
        book.set_address_if_missing(ContractName::Verifier, None);

        assert_eq!(book.get(ContractName::Governance), Some(first));
        assert_eq!(book.get(ContractName::Verifier), None);
    }

    #[test]
    fn test_env_lines_in_deployment_order() {
        let gatekeeper = address!("3333333333333333333333333333333333333333");
        let franklin = address!("4444444444444444444444444444444444444444");
        let tx_hash = b256!("00000000000000000000000000000000000000000000000000000000000000aa");

        let mut book = AddressBook::default();
        book.set_address(ContractName::UpgradeGatekeeper, gatekeeper);
        book.record_deployment(ContractName::Franklin, franklin, tx_hash, Bytes::new());

        let lines = book.env_lines();
        assert_eq!(
            lines,
            vec![
                format!("CONTRACT_ADDR={franklin}"),
                format!("UPGRADE_GATEKEEPER_ADDR={gatekeeper}"),
                format!("CONTRACT_GENESIS_TX_HASH={tx_hash}"),
            ]
        );
    }
}
