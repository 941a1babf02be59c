//! Scripts for deploying and wiring up the Franklin rollup contracts.

#![deny(missing_docs)]
#![deny(clippy::missing_docs_in_private_items)]

pub mod artifacts;
pub mod cli;
mod commands;
pub mod constants;
pub mod deployer;
pub mod errors;
pub mod etherscan;
pub mod flatten;
mod solidity;
pub mod tesseracts;
pub mod types;
pub mod utils;
