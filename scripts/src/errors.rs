//! Definitions of errors that can occur during the execution of the deploy scripts

use std::{
    error::Error,
    fmt::{self, Display, Formatter},
};

/// Errors that can occur during the execution of the deploy scripts
#[derive(Debug)]
pub enum ScriptError {
    /// Error reading a file from disk
    ReadFile(String),
    /// Error writing a file to disk
    WriteFile(String),
    /// Error parsing a Solidity compilation artifact
    ArtifactParsing(String),
    /// Error initializing the RPC client
    ClientInitialization(String),
    /// Error constructing calldata for a contract method or constructor
    CalldataConstruction(String),
    /// Error deploying a contract
    ContractDeployment(String),
    /// Error calling a contract method
    ContractInteraction(String),
    /// A contract address was needed but never deployed nor configured
    MissingAddress(String),
    /// Error talking to a block explorer API
    ExplorerRequest(String),
    /// Error flattening Solidity sources
    SourceFlattening(String),
}

impl Display for ScriptError {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            ScriptError::ReadFile(s) => write!(f, "error reading file: {}", s),
            ScriptError::WriteFile(s) => write!(f, "error writing file: {}", s),
            ScriptError::ArtifactParsing(s) => write!(f, "error parsing artifact: {}", s),
            ScriptError::ClientInitialization(s) => write!(f, "error initializing client: {}", s),
            ScriptError::CalldataConstruction(s) => write!(f, "error constructing calldata: {}", s),
            ScriptError::ContractDeployment(s) => write!(f, "error deploying contract: {}", s),
            ScriptError::ContractInteraction(s) => {
                write!(f, "error interacting with contract: {}", s)
            }
            ScriptError::MissingAddress(s) => write!(f, "missing contract address: {}", s),
            ScriptError::ExplorerRequest(s) => write!(f, "error querying explorer: {}", s),
            ScriptError::SourceFlattening(s) => write!(f, "error flattening sources: {}", s),
        }
    }
}

impl Error for ScriptError {}
