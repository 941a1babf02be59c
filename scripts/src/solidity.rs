//! Definitions of Solidity functions called during deployment, and the
//! encoders for the constructor and initialization parameters

use alloy::{
    primitives::{Address, Bytes, B256},
    sol,
    sol_types::{sol_data, SolType, SolValue},
};

sol! {
    /// The upgradeable proxy fronting each of the Franklin contracts
    #[sol(rpc)]
    contract Proxy {
        function transferMastership(address newMaster) external;
    }

    /// The gatekeeper coordinating upgrades of the proxies it masters
    #[sol(rpc)]
    contract UpgradeGatekeeper {
        function addUpgradeable(address addr) external;
        function transferMastership(address newMaster) external;
    }

    /// The network governance contract
    #[sol(rpc)]
    contract Governance {
        function setValidator(address validator, bool active) external;
        function addToken(address token) external;
    }

    /// The mintable ERC20 token deployed on test networks
    #[sol(rpc)]
    contract TestnetERC20Token {
        function mint(address to, uint256 amount) external;
    }
}

/// Initialization parameters of the `Governance` target: the network governor
pub fn governance_init_params(governor: Address) -> Bytes {
    governor.abi_encode().into()
}

/// Initialization parameters of the `Verifier` target, which takes none
pub fn verifier_init_params() -> Bytes {
    Bytes::new()
}

/// Initialization parameters of the `Franklin` target: the governance and
/// verifier proxies, and the root of the genesis state
pub fn franklin_init_params(
    governance: Address,
    verifier: Address,
    genesis_root: B256,
) -> Bytes {
    (governance, verifier, genesis_root).abi_encode_params().into()
}

/// Constructor arguments of a `Proxy`: its target and the parameters the
/// target is initialized with
pub fn proxy_constructor_args(target: Address, init_params: Bytes) -> Bytes {
    (target, init_params).abi_encode_params().into()
}

/// Constructor arguments of the `UpgradeGatekeeper`: the main contract whose
/// upgrade notice period it enforces
pub fn gatekeeper_constructor_args(main_contract: Address) -> Bytes {
    main_contract.abi_encode().into()
}

/// Constructor arguments of the test ERC20 token
pub fn test_token_constructor_args(name: &str, symbol: &str, decimals: u8) -> Bytes {
    <(sol_data::String, sol_data::String, sol_data::Uint<8>)>::abi_encode_params(&(
        name.to_string(),
        symbol.to_string(),
        decimals,
    ))
    .into()
}
