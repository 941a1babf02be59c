//! Client registering contract metadata with a local Tesseracts explorer

use alloy::primitives::Address;

use crate::{constants::TESSERACTS_COMPILER, errors::ScriptError};

/// HTTP client for a Tesseracts instance
#[derive(Debug, Clone)]
pub struct TesseractsClient {
    /// The HTTP client
    client: reqwest::Client,
    /// The base URL of the explorer
    base_url: String,
}

impl TesseractsClient {
    /// Create a client for the explorer at `base_url`
    pub fn new(base_url: String) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url,
        }
    }

    /// The registration endpoint of a contract, keyed by its lowercase address
    pub fn contract_url(&self, address: Address) -> String {
        format!("{}/{address:#x}/contract", self.base_url.trim_end_matches('/'))
    }

    /// Register the source of a deployed contract
    pub async fn register_contract(
        &self,
        address: Address,
        contract_name: &str,
        source_code: &str,
    ) -> Result<(), ScriptError> {
        let form = [
            ("contract_source", source_code),
            ("contract_compiler", TESSERACTS_COMPILER),
            ("contract_name", contract_name),
            ("contract_optimized", "true"),
        ];

        let response = self
            .client
            .post(self.contract_url(address))
            .form(&form)
            .send()
            .await
            .map_err(|e| ScriptError::ExplorerRequest(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ScriptError::ExplorerRequest(format!(
                "tesseracts returned HTTP {status}: {body}"
            )));
        }

        Ok(())
    }
}
