//! Loading of precompiled contract artifacts.
//!
//! Artifacts are the JSON files emitted by the Solidity toolchain, one per
//! contract. The bytecode is accepted either at the top level (waffle,
//! hardhat and foundry layouts) or nested under `evm.bytecode.object`
//! (raw solc standard JSON output).

use std::{
    fs,
    path::{Path, PathBuf},
};

use alloy::{json_abi::JsonAbi, primitives::Bytes};
use serde::Deserialize;

use crate::{constants::ARTIFACT_EXTENSION, errors::ScriptError, types::ContractName};

/// A compiled contract: its ABI and creation bytecode
#[derive(Debug, Clone)]
pub struct ContractArtifact {
    /// The contract ABI
    pub abi: JsonAbi,
    /// The contract creation bytecode
    pub bytecode: Bytes,
}

/// The bytecode field of an artifact, either a bare hex string or an
/// object holding the hex string
#[derive(Deserialize)]
#[serde(untagged)]
enum RawBytecode {
    /// `"bytecode": "0x..."`
    Hex(String),
    /// `"bytecode": { "object": "0x..." }`
    Object {
        /// The hex-encoded bytecode
        object: String,
    },
}

/// The `evm` section of a solc standard JSON artifact
#[derive(Deserialize)]
struct RawEvm {
    /// The creation bytecode
    bytecode: RawBytecode,
}

/// An artifact as it is laid out on disk
#[derive(Deserialize)]
struct RawArtifact {
    /// The contract ABI
    abi: JsonAbi,
    /// The top-level bytecode, if present
    #[serde(default)]
    bytecode: Option<RawBytecode>,
    /// The solc `evm` section, if present
    #[serde(default)]
    evm: Option<RawEvm>,
}

impl RawBytecode {
    /// The hex string held by the field
    fn into_hex(self) -> String {
        match self {
            RawBytecode::Hex(hex) | RawBytecode::Object { object: hex } => hex,
        }
    }
}

impl ContractArtifact {
    /// Parse an artifact from its JSON representation
    pub fn from_json(json: &str) -> Result<Self, ScriptError> {
        let raw: RawArtifact =
            serde_json::from_str(json).map_err(|e| ScriptError::ArtifactParsing(e.to_string()))?;

        let hex_bytecode = raw
            .bytecode
            .or(raw.evm.map(|evm| evm.bytecode))
            .map(RawBytecode::into_hex)
            .ok_or_else(|| ScriptError::ArtifactParsing("artifact has no bytecode".to_string()))?;

        let hex_bytecode = hex_bytecode.trim();
        let bytecode = hex::decode(hex_bytecode.strip_prefix("0x").unwrap_or(hex_bytecode))
            .map_err(|e| ScriptError::ArtifactParsing(e.to_string()))?;

        if bytecode.is_empty() {
            return Err(ScriptError::ArtifactParsing(
                "artifact bytecode is empty, is the contract abstract?".to_string(),
            ));
        }

        Ok(Self {
            abi: raw.abi,
            bytecode: bytecode.into(),
        })
    }

    /// Read and parse an artifact file
    pub fn from_file(path: &Path) -> Result<Self, ScriptError> {
        let json = fs::read_to_string(path)
            .map_err(|e| ScriptError::ReadFile(format!("{}: {e}", path.display())))?;

        Self::from_json(&json).map_err(|e| match e {
            ScriptError::ArtifactParsing(msg) => {
                ScriptError::ArtifactParsing(format!("{}: {msg}", path.display()))
            }
            e => e,
        })
    }

    /// The number of arguments the contract constructor takes
    pub fn constructor_arity(&self) -> usize {
        self.abi.constructor().map_or(0, |c| c.inputs.len())
    }

    /// Check that the constructor takes the expected number of arguments.
    ///
    /// Catches a wrong artifact being picked up before any gas is spent.
    pub fn check_constructor_arity(
        &self,
        name: ContractName,
        expected: usize,
    ) -> Result<(), ScriptError> {
        let arity = self.constructor_arity();
        if arity != expected {
            return Err(ScriptError::ArtifactParsing(format!(
                "{name}: constructor takes {arity} arguments, expected {expected}"
            )));
        }

        Ok(())
    }

    /// The creation code for a deployment: the bytecode followed by the
    /// ABI-encoded constructor arguments
    pub fn deploy_code(&self, constructor_args: &Bytes) -> Bytes {
        let mut code = Vec::with_capacity(self.bytecode.len() + constructor_args.len());
        code.extend_from_slice(&self.bytecode);
        code.extend_from_slice(constructor_args);
        code.into()
    }
}

/// A directory of compiled artifacts
#[derive(Debug, Clone)]
pub struct ArtifactStore {
    /// The directory holding the artifacts
    dir: PathBuf,
    /// Whether the test variants of the implementation contracts are used
    test: bool,
}

impl ArtifactStore {
    /// Create a store reading from the given directory
    pub fn new(dir: impl Into<PathBuf>, test: bool) -> Self {
        Self {
            dir: dir.into(),
            test,
        }
    }

    /// The path of the artifact deployed for the given contract
    pub fn path(&self, name: ContractName) -> PathBuf {
        self.dir
            .join(name.artifact_name(self.test))
            .with_extension(ARTIFACT_EXTENSION)
    }

    /// Load the artifact deployed for the given contract
    pub fn load(&self, name: ContractName) -> Result<ContractArtifact, ScriptError> {
        ContractArtifact::from_file(&self.path(name))
    }
}

#[cfg(test)]
mod tests {
    use std::fs;

    use alloy::primitives::Bytes;

    use super::{ArtifactStore, ContractArtifact};
    use crate::types::ContractName;

    const PROXY_ABI: &str = r#"[
        {
            "type": "constructor",
            "inputs": [
                { "name": "target", "type": "address", "internalType": "address" },
                { "name": "targetInitializationParameters", "type": "bytes", "internalType": "bytes" }
            ],
            "stateMutability": "nonpayable"
        },
        {
            "type": "function",
            "name": "transferMastership",
            "inputs": [{ "name": "newMaster", "type": "address", "internalType": "address" }],
            "outputs": [],
            "stateMutability": "nonpayable"
        }
    ]"#;

    fn waffle_artifact(bytecode: &str) -> String {
        format!(r#"{{ "abi": {PROXY_ABI}, "bytecode": "{bytecode}" }}"#)
    }

    #[test]
    fn test_parse_waffle_layout() {
        let artifact = ContractArtifact::from_json(&waffle_artifact("0x6080604052")).unwrap();

        assert_eq!(artifact.bytecode.as_ref(), &[0x60, 0x80, 0x60, 0x40, 0x52]);
        assert_eq!(artifact.constructor_arity(), 2);
        assert!(artifact.abi.function("transferMastership").is_some());
    }

    #[test]
    fn test_parse_solc_layout_without_prefix() {
        let json = r#"{ "abi": [], "evm": { "bytecode": { "object": "6080" } } }"#;
        let artifact = ContractArtifact::from_json(json).unwrap();

        assert_eq!(artifact.bytecode.as_ref(), &[0x60, 0x80]);
        assert_eq!(artifact.constructor_arity(), 0);
    }

    #[test]
    fn test_parse_foundry_layout() {
        let json = r#"{ "abi": [], "bytecode": { "object": "0x00ff" } }"#;
        let artifact = ContractArtifact::from_json(json).unwrap();
        assert_eq!(artifact.bytecode.as_ref(), &[0x00, 0xff]);
    }

    #[test]
    fn test_reject_empty_or_missing_bytecode() {
        assert!(ContractArtifact::from_json(&waffle_artifact("0x")).is_err());
        assert!(ContractArtifact::from_json(r#"{ "abi": [] }"#).is_err());
        assert!(ContractArtifact::from_json(&waffle_artifact("0xzz")).is_err());
    }

    #[test]
    fn test_constructor_arity_check() {
        let artifact = ContractArtifact::from_json(&waffle_artifact("0x60")).unwrap();

        assert!(artifact.check_constructor_arity(ContractName::Governance, 2).is_ok());
        let err = artifact
            .check_constructor_arity(ContractName::UpgradeGatekeeper, 1)
            .unwrap_err();
        assert!(err.to_string().contains("upgrade-gatekeeper"));
    }

    #[test]
    fn test_deploy_code_appends_args() {
        let artifact = ContractArtifact::from_json(&waffle_artifact("0x6080")).unwrap();
        let code = artifact.deploy_code(&Bytes::from(vec![0xaa, 0xbb]));
        assert_eq!(code.as_ref(), &[0x60, 0x80, 0xaa, 0xbb]);
    }

    #[test]
    fn test_store_selects_test_artifacts() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("Governance.json"), waffle_artifact("0x01")).unwrap();
        fs::write(dir.path().join("GovernanceTest.json"), waffle_artifact("0x02")).unwrap();

        let production = ArtifactStore::new(dir.path(), false);
        let test = ArtifactStore::new(dir.path(), true);

        let prod_code = production.load(ContractName::GovernanceTarget).unwrap().bytecode;
        let test_code = test.load(ContractName::GovernanceTarget).unwrap().bytecode;
        assert_eq!(prod_code.as_ref(), &[0x01]);
        assert_eq!(test_code.as_ref(), &[0x02]);

        let err = test.load(ContractName::VerifierTarget).unwrap_err();
        assert!(err.to_string().contains("VerifierTest.json"));
    }
}
