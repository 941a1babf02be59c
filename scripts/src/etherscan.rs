//! Client for the Etherscan source code verification API.
//!
//! Verification is a two step process: the flattened source is submitted
//! through `verifysourcecode`, which answers with a GUID, and the GUID is
//! then polled through `checkverifystatus` until the explorer is done.
//! A contract deployed moments ago may not be indexed by the explorer yet,
//! in which case the submission is retried after a delay.

use std::time::Duration;

use alloy::primitives::{Address, Bytes};
use serde::Deserialize;
use tracing::{debug, info, warn};

use crate::{
    constants::{
        ALREADY_VERIFIED_STATUS, CONTRACT_NOT_INDEXED_ERROR, ETHERSCAN_CODE_FORMAT,
        ETHERSCAN_MAINNET_API_URL, SOLC_COMPILER_VERSION, SOLC_OPTIMIZER_RUNS,
        VERIFICATION_PENDING_STATUS, VERIFY_POLL_DELAY, VERIFY_POLL_RETRIES, VERIFY_SUBMIT_DELAY,
        VERIFY_SUBMIT_RETRIES,
    },
    errors::ScriptError,
    types::VerificationStatus,
};

/// The `status` field of a successful Etherscan response
const STATUS_OK: &str = "1";

/// The name of the Ethereum mainnet
const MAINNET: &str = "mainnet";

/// The Etherscan API URL for the given network
pub fn etherscan_api_url(network: &str) -> String {
    if network == MAINNET {
        ETHERSCAN_MAINNET_API_URL.to_string()
    } else {
        format!("https://api-{network}.etherscan.io/api")
    }
}

/// The Etherscan page of an address on the given network
pub fn etherscan_address_url(network: &str, address: Address) -> String {
    if network == MAINNET {
        format!("https://etherscan.io/address/{address}")
    } else {
        format!("https://{network}.etherscan.io/address/{address}")
    }
}

/// The retry policy of the verification flow
#[derive(Debug, Clone, Copy)]
pub struct RetryConfig {
    /// How many times a submission is retried while the contract is not indexed
    pub submit_retries: usize,
    /// The delay between such submissions
    pub submit_delay: Duration,
    /// How many times the verification status is polled
    pub poll_retries: usize,
    /// The delay between status polls
    pub poll_delay: Duration,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            submit_retries: VERIFY_SUBMIT_RETRIES,
            submit_delay: VERIFY_SUBMIT_DELAY,
            poll_retries: VERIFY_POLL_RETRIES,
            poll_delay: VERIFY_POLL_DELAY,
        }
    }
}

/// A source code verification request
#[derive(Debug, Clone)]
pub struct VerificationRequest {
    /// The address of the deployed contract
    pub address: Address,
    /// The name of the Solidity contract
    pub contract_name: String,
    /// The flattened source code
    pub source_code: String,
    /// The ABI-encoded constructor arguments
    pub constructor_args: Bytes,
}

impl VerificationRequest {
    /// The form fields of the `verifysourcecode` call
    pub fn form(&self, api_key: &str) -> Vec<(&'static str, String)> {
        vec![
            ("apikey", api_key.to_string()),
            ("module", "contract".to_string()),
            ("action", "verifysourcecode".to_string()),
            ("contractaddress", format!("{}", self.address)),
            ("sourceCode", self.source_code.clone()),
            ("codeformat", ETHERSCAN_CODE_FORMAT.to_string()),
            ("contractname", self.contract_name.clone()),
            ("compilerversion", SOLC_COMPILER_VERSION.to_string()),
            ("optimizationUsed", "1".to_string()),
            ("runs", SOLC_OPTIMIZER_RUNS.to_string()),
            // Sic, this is the field name the API expects
            ("constructorArguements", hex::encode(&self.constructor_args)),
        ]
    }
}

/// A response of the Etherscan API
#[derive(Debug, Clone, Deserialize)]
pub struct EtherscanResponse {
    /// `"1"` on success, `"0"` otherwise
    pub status: String,
    /// A short description of the status
    #[serde(default)]
    pub message: String,
    /// The payload: a GUID, a status string or an error description
    pub result: String,
}

/// The interpretation of a `verifysourcecode` response
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Submission {
    /// The submission was queued under the given GUID
    Accepted(String),
    /// The source of the contract was verified in an earlier submission
    AlreadyVerified(String),
    /// The explorer has not indexed the contract yet
    NotIndexed,
    /// The explorer refused the submission
    Rejected(String),
}

impl EtherscanResponse {
    /// Interpret the response to a `verifysourcecode` call
    pub fn submission(&self) -> Submission {
        if self.status == STATUS_OK {
            Submission::Accepted(self.result.clone())
        } else if self.is_already_verified() {
            Submission::AlreadyVerified(self.result.clone())
        } else if self.result.contains(CONTRACT_NOT_INDEXED_ERROR) {
            Submission::NotIndexed
        } else {
            Submission::Rejected(self.result.clone())
        }
    }

    /// Whether the response reports a source verified in an earlier submission.
    ///
    /// Submissions say "already verified", status checks "Already Verified".
    pub fn is_already_verified(&self) -> bool {
        self.result.to_lowercase().contains(ALREADY_VERIFIED_STATUS)
    }

    /// Whether a `checkverifystatus` response reports a queued verification
    pub fn is_pending(&self) -> bool {
        self.result.contains(VERIFICATION_PENDING_STATUS)
    }

    /// Interpret the response to a `checkverifystatus` call
    pub fn verification_status(&self) -> VerificationStatus {
        if self.is_pending() {
            VerificationStatus::Pending(self.result.clone())
        } else if self.status == STATUS_OK || self.is_already_verified() {
            VerificationStatus::Verified(self.result.clone())
        } else {
            VerificationStatus::Failed(self.result.clone())
        }
    }
}

/// HTTP client for the Etherscan API of a single network
#[derive(Debug, Clone)]
pub struct EtherscanClient {
    /// The HTTP client
    client: reqwest::Client,
    /// The API endpoint
    api_url: String,
    /// The API key
    api_key: String,
    /// The retry policy
    retries: RetryConfig,
}

impl EtherscanClient {
    /// Create a client for the given API endpoint
    pub fn new(api_url: String, api_key: String) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_url,
            api_key,
            retries: RetryConfig::default(),
        }
    }

    /// Replace the retry policy
    pub fn with_retries(mut self, retries: RetryConfig) -> Self {
        self.retries = retries;
        self
    }

    /// Submit a contract for verification and wait for the outcome.
    ///
    /// Explorer-side failures are reported through the returned status;
    /// only transport and decoding failures are errors.
    pub async fn verify(
        &self,
        request: &VerificationRequest,
    ) -> Result<VerificationStatus, ScriptError> {
        let mut retries_left = self.retries.submit_retries;
        let guid = loop {
            let response = self.submit(request).await?;
            match response.submission() {
                Submission::Accepted(guid) => break guid,
                Submission::AlreadyVerified(result) => {
                    info!("{} is already verified", request.contract_name);
                    return Ok(VerificationStatus::Verified(result));
                }
                Submission::NotIndexed if retries_left > 0 => {
                    retries_left -= 1;
                    debug!(
                        "{} not indexed yet, retrying ({retries_left} retries left)",
                        request.contract_name
                    );
                    tokio::time::sleep(self.retries.submit_delay).await;
                }
                Submission::NotIndexed => {
                    return Ok(VerificationStatus::Failed(response.result));
                }
                Submission::Rejected(result) => {
                    warn!(
                        "Problem publishing {}: status={} message={} result={}",
                        request.contract_name, response.status, response.message, result
                    );
                    return Ok(VerificationStatus::Failed(result));
                }
            }
        };

        info!("{} submitted for verification, guid {guid}", request.contract_name);
        self.poll_status(&guid).await
    }

    /// Poll the status of a verification until it leaves the queue or the
    /// poll budget is exhausted.
    ///
    /// Each poll waits `poll_delay` first, a fresh submission is never
    /// processed right away.
    pub async fn poll_status(&self, guid: &str) -> Result<VerificationStatus, ScriptError> {
        let mut status = VerificationStatus::Pending(VERIFICATION_PENDING_STATUS.to_string());
        for _ in 0..self.retries.poll_retries {
            tokio::time::sleep(self.retries.poll_delay).await;

            let response = self.check_status(guid).await?;
            status = response.verification_status();
            if !response.is_pending() {
                break;
            }
        }

        Ok(status)
    }

    /// Make a single `verifysourcecode` call
    async fn submit(
        &self,
        request: &VerificationRequest,
    ) -> Result<EtherscanResponse, ScriptError> {
        let response = self
            .client
            .post(&self.api_url)
            .form(&request.form(&self.api_key))
            .send()
            .await
            .map_err(|e| ScriptError::ExplorerRequest(e.to_string()))?;

        Self::parse_response(response).await
    }

    /// Make a single `checkverifystatus` call
    async fn check_status(&self, guid: &str) -> Result<EtherscanResponse, ScriptError> {
        let response = self
            .client
            .get(&self.api_url)
            .query(&[
                ("apikey", self.api_key.as_str()),
                ("module", "contract"),
                ("action", "checkverifystatus"),
                ("guid", guid),
            ])
            .send()
            .await
            .map_err(|e| ScriptError::ExplorerRequest(e.to_string()))?;

        Self::parse_response(response).await
    }

    /// Check the HTTP status and decode the body of a response
    async fn parse_response(response: reqwest::Response) -> Result<EtherscanResponse, ScriptError> {
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ScriptError::ExplorerRequest(format!("HTTP {status}: {body}")));
        }

        response
            .json()
            .await
            .map_err(|e| ScriptError::ExplorerRequest(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use alloy::primitives::{address, Bytes};

    use super::{
        etherscan_address_url, etherscan_api_url, EtherscanResponse, Submission,
        VerificationRequest,
    };
    use crate::types::VerificationStatus;

    fn response(status: &str, result: &str) -> EtherscanResponse {
        EtherscanResponse {
            status: status.to_string(),
            message: String::new(),
            result: result.to_string(),
        }
    }

    #[test]
    fn test_urls_per_network() {
        let addr = address!("1111111111111111111111111111111111111111");

        assert_eq!(etherscan_api_url("mainnet"), "https://api.etherscan.io/api");
        assert_eq!(etherscan_api_url("rinkeby"), "https://api-rinkeby.etherscan.io/api");
        assert_eq!(
            etherscan_address_url("mainnet", addr),
            format!("https://etherscan.io/address/{addr}")
        );
        assert_eq!(
            etherscan_address_url("ropsten", addr),
            format!("https://ropsten.etherscan.io/address/{addr}")
        );
    }

    #[test]
    fn test_form_fields() {
        let request = VerificationRequest {
            address: address!("1111111111111111111111111111111111111111"),
            contract_name: "Proxy".to_string(),
            source_code: "contract Proxy {}".to_string(),
            constructor_args: Bytes::from(vec![0xab, 0xcd]),
        };

        let form = request.form("key");
        let field = |name: &str| {
            form.iter()
                .find(|(k, _)| *k == name)
                .map(|(_, v)| v.clone())
                .unwrap()
        };

        assert_eq!(field("action"), "verifysourcecode");
        assert_eq!(field("apikey"), "key");
        assert_eq!(field("contractname"), "Proxy");
        // Hex without the `0x` prefix
        assert_eq!(field("constructorArguements"), "abcd");
        assert_eq!(field("compilerversion"), "v0.5.16+commit.9c3226ce");
    }

    #[test]
    fn test_submission_classification() {
        assert_eq!(
            response("1", "guid-123").submission(),
            Submission::Accepted("guid-123".to_string())
        );
        assert_eq!(
            response("0", "Unable to locate ContractCode at 0x11").submission(),
            Submission::NotIndexed
        );
        assert_eq!(
            response("0", "Invalid API Key").submission(),
            Submission::Rejected("Invalid API Key".to_string())
        );
        assert_eq!(
            response("0", "Contract source code already verified").submission(),
            Submission::AlreadyVerified("Contract source code already verified".to_string())
        );
    }

    #[test]
    fn test_status_classification() {
        assert_eq!(
            response("0", "Pending in queue").verification_status(),
            VerificationStatus::Pending("Pending in queue".to_string())
        );
        assert_eq!(
            response("1", "Pass - Verified").verification_status(),
            VerificationStatus::Verified("Pass - Verified".to_string())
        );
        assert_eq!(
            response("0", "Already Verified").verification_status(),
            VerificationStatus::Verified("Already Verified".to_string())
        );
        assert_eq!(
            response("0", "Fail - Unable to verify").verification_status(),
            VerificationStatus::Failed("Fail - Unable to verify".to_string())
        );
    }
}
