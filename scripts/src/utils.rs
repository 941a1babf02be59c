//! Utilities for the deploy scripts.

use std::{
    fs::{self, File},
    io::{ErrorKind, Read},
    path::Path,
    str::FromStr,
};

use alloy::{
    contract::{CallBuilder, CallDecoder},
    network::{Ethereum, EthereumWallet},
    primitives::Address,
    providers::{DynProvider, Provider, ProviderBuilder},
    rpc::types::TransactionReceipt,
    signers::local::PrivateKeySigner,
    transports::http::reqwest::Url,
};
use json::JsonValue;
use tracing::info;

use crate::{
    constants::{DEPLOYMENTS_KEY, PRIV_KEY_ENV_VAR},
    errors::ScriptError,
    types::{AddressBook, ContractName},
};

/// Load the variables of a dotenv file into the environment, without
/// overriding those already set. Returns whether the file exists.
///
/// A malformed file is an error: variables after the bad line would
/// otherwise be silently missing.
pub fn load_env_file(path: &Path) -> Result<bool, ScriptError> {
    match dotenvy::from_path(path) {
        Ok(()) => Ok(true),
        Err(dotenvy::Error::Io(e)) if e.kind() == ErrorKind::NotFound => Ok(false),
        Err(e) => Err(ScriptError::ReadFile(format!("{}: {e}", path.display()))),
    }
}

/// The call builder type used by the scripts
pub type ScriptCallBuilder<'a, C> = CallBuilder<(), &'a DynProvider, C, Ethereum>;

/// Sets up the signing client with which contracts are deployed and called,
/// returning it along with the address of the signer.
pub async fn setup_client(
    priv_key: Option<&str>,
    rpc_url: &str,
) -> Result<(DynProvider, Address), ScriptError> {
    let priv_key = priv_key.ok_or_else(|| {
        ScriptError::ClientInitialization(format!("no private key given, set {PRIV_KEY_ENV_VAR}"))
    })?;

    let signer = PrivateKeySigner::from_str(priv_key)
        .map_err(|e| ScriptError::ClientInitialization(e.to_string()))?;
    let signer_address = signer.address();

    let url = Url::parse(rpc_url).map_err(|e| ScriptError::ClientInitialization(e.to_string()))?;
    let provider = ProviderBuilder::new()
        .wallet(EthereumWallet::from(signer))
        .on_http(url);

    let chain_id = provider
        .get_chain_id()
        .await
        .map_err(|e| ScriptError::ClientInitialization(e.to_string()))?;
    info!("Connected to chain {chain_id} as {signer_address}");

    Ok((DynProvider::new(provider), signer_address))
}

/// The address of the signer with the given private key, if one is given
pub fn signer_address(priv_key: Option<&str>) -> Result<Option<Address>, ScriptError> {
    priv_key
        .map(|key| {
            PrivateKeySigner::from_str(key)
                .map(|signer| signer.address())
                .map_err(|e| ScriptError::ClientInitialization(e.to_string()))
        })
        .transpose()
}

/// Send a transaction and wait for its receipt, erroring if it reverted
pub async fn send_tx<C: CallDecoder>(
    tx: ScriptCallBuilder<'_, C>,
) -> Result<TransactionReceipt, ScriptError> {
    let receipt = tx
        .send()
        .await
        .map_err(|e| ScriptError::ContractInteraction(e.to_string()))?
        .get_receipt()
        .await
        .map_err(|e| ScriptError::ContractInteraction(e.to_string()))?;

    if !receipt.status() {
        return Err(ScriptError::ContractInteraction(format!(
            "transaction {} reverted",
            receipt.transaction_hash
        )));
    }

    Ok(receipt)
}

/// Read and parse a JSON file
pub fn get_json_from_file(file_path: &Path) -> Result<JsonValue, ScriptError> {
    let mut file_contents = String::new();
    File::open(file_path)
        .map_err(|e| ScriptError::ReadFile(e.to_string()))?
        .read_to_string(&mut file_contents)
        .map_err(|e| ScriptError::ReadFile(e.to_string()))?;

    json::parse(&file_contents).map_err(|e| ScriptError::ReadFile(e.to_string()))
}

/// Read a contract address from the deployments file, if the file and
/// the entry exist
pub fn parse_addr_from_deployments_file(
    file_path: &Path,
    contract_key: &str,
) -> Result<Option<Address>, ScriptError> {
    if !file_path.exists() {
        return Ok(None);
    }
    let parsed_json = get_json_from_file(file_path)?;

    parsed_json[DEPLOYMENTS_KEY][contract_key]
        .as_str()
        .map(|addr| Address::from_str(addr).map_err(|e| ScriptError::ReadFile(e.to_string())))
        .transpose()
}

/// Fill in the addresses the book is missing from the deployments file
pub fn seed_from_deployments_file(
    book: &mut AddressBook,
    file_path: &Path,
) -> Result<(), ScriptError> {
    for name in ContractName::ALL {
        let address = parse_addr_from_deployments_file(file_path, name.deployments_key())?;
        book.set_address_if_missing(name, address);
    }

    Ok(())
}

/// Write every known address to the deployments file, keeping the entries
/// of contracts the book does not know about
pub fn write_deployments(file_path: &Path, book: &AddressBook) -> Result<(), ScriptError> {
    // If the file doesn't exist, create it
    if !file_path.exists() {
        fs::write(file_path, "{}").map_err(|e| ScriptError::WriteFile(e.to_string()))?;
    }
    let mut parsed_json = get_json_from_file(file_path)?;

    for (name, address) in book.known() {
        parsed_json[DEPLOYMENTS_KEY][name.deployments_key()] =
            JsonValue::String(format!("{address}"));
    }

    fs::write(file_path, json::stringify_pretty(parsed_json, 4))
        .map_err(|e| ScriptError::WriteFile(e.to_string()))?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use std::fs;

    use alloy::primitives::address;

    use super::{
        load_env_file, parse_addr_from_deployments_file, seed_from_deployments_file, signer_address,
        write_deployments,
    };
    use crate::types::{AddressBook, ContractName};

    #[test]
    fn test_deployments_roundtrip_keeps_foreign_keys() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("deployments.json");
        fs::write(&path, r#"{ "deployments": { "other_contract": "0x01" } }"#).unwrap();

        let governance = address!("1111111111111111111111111111111111111111");
        let mut book = AddressBook::default();
        book.set_address(ContractName::Governance, governance);
        write_deployments(&path, &book).unwrap();

        let parsed = parse_addr_from_deployments_file(&path, "governance_contract").unwrap();
        assert_eq!(parsed, Some(governance));

        let written = fs::read_to_string(&path).unwrap();
        assert!(written.contains("other_contract"));
    }

    #[test]
    fn test_load_env_file() {
        let dir = tempfile::tempdir().unwrap();

        assert!(!load_env_file(&dir.path().join("absent.env")).unwrap());

        let valid = dir.path().join("valid.env");
        fs::write(&valid, "FRANKLIN_SCRIPTS_TEST_LOADED=1\n").unwrap();
        assert!(load_env_file(&valid).unwrap());
        assert_eq!(std::env::var("FRANKLIN_SCRIPTS_TEST_LOADED").unwrap(), "1");
    }

    #[test]
    fn test_malformed_env_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("broken.env");
        fs::write(
            &path,
            "FRANKLIN_SCRIPTS_TEST_BEFORE=1\nthis line is broken\nFRANKLIN_SCRIPTS_TEST_AFTER=1\n",
        )
        .unwrap();

        let err = load_env_file(&path).unwrap_err();
        assert!(err.to_string().contains("broken.env"));
        assert!(std::env::var("FRANKLIN_SCRIPTS_TEST_AFTER").is_err());
    }

    #[test]
    fn test_signer_address() {
        // Well-known first dev account of anvil and hardhat
        let key = "0xac0974bec39a17e36ba4a6b4d238ff944bacb478cbed5efcae784d7bf4f2ff80";
        assert_eq!(
            signer_address(Some(key)).unwrap(),
            Some(address!("f39Fd6e51aad88F6F4ce6aB8827279cffFb92266"))
        );
        assert_eq!(signer_address(None).unwrap(), None);
        assert!(signer_address(Some("not a key")).is_err());
    }

    #[test]
    fn test_missing_deployments_file_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("absent.json");

        let mut book = AddressBook::default();
        seed_from_deployments_file(&mut book, &path).unwrap();
        assert_eq!(book.known().count(), 0);
    }

    #[test]
    fn test_seed_does_not_override_env() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("deployments.json");

        let from_env = address!("1111111111111111111111111111111111111111");
        let from_file = address!("2222222222222222222222222222222222222222");
        let verifier = address!("3333333333333333333333333333333333333333");

        let mut file_book = AddressBook::default();
        file_book.set_address(ContractName::Governance, from_file);
        file_book.set_address(ContractName::Verifier, verifier);
        write_deployments(&path, &file_book).unwrap();

        let mut book = AddressBook::default();
        book.set_address(ContractName::Governance, from_env);
        seed_from_deployments_file(&mut book, &path).unwrap();

        assert_eq!(book.get(ContractName::Governance), Some(from_env));
        assert_eq!(book.get(ContractName::Verifier), Some(verifier));
    }
}
