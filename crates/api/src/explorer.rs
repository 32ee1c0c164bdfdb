//! Block-explorer API client (Etherscan-style).
//!
//! Two endpoints are used: internal transfers for a transaction hash (builder
//! payment tracing) and block-number-by-timestamp with "closest before"
//! semantics (primary-chain block resolution for remote-chain events).

use alloy::primitives::{B256, U256};
use anyhow::{anyhow, bail, Result};
use serde::Deserialize;
use tracing::{debug, instrument};

const DEFAULT_BASE_URL: &str = "https://api.etherscan.io/api";

/// An internal (trace-level) value transfer within a transaction.
#[derive(Debug, Clone, Deserialize)]
pub struct InternalTransfer {
    pub from: String,
    pub to: String,
    /// Transfer value in wei, decimal string.
    pub value: String,
}

impl InternalTransfer {
    /// Parse the transfer value into wei.
    pub fn value_wei(&self) -> Result<U256> {
        self.value
            .parse()
            .map_err(|e| anyhow!("invalid transfer value {}: {}", self.value, e))
    }
}

/// Block-explorer client.
#[derive(Debug, Clone)]
pub struct ExplorerClient {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
}

impl ExplorerClient {
    /// Create a client against the mainnet explorer.
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: DEFAULT_BASE_URL.to_string(),
            api_key: api_key.into(),
        }
    }

    /// Create a client with a custom base URL.
    pub fn with_base_url(base_url: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.into(),
            api_key: api_key.into(),
        }
    }

    /// Fetch internal transfers of a transaction, in trace order.
    #[instrument(skip(self), fields(hash = %hash))]
    pub async fn internal_transfers(&self, hash: B256) -> Result<Vec<InternalTransfer>> {
        let response = self
            .client
            .get(&self.base_url)
            .query(&[
                ("module", "account"),
                ("action", "txlistinternal"),
                ("txhash", &format!("{hash}")),
                ("apikey", &self.api_key),
            ])
            .send()
            .await?
            .error_for_status()?;

        let envelope: Envelope = response.json().await?;

        // Status "0" with this message means an empty result, not a failure.
        if envelope.status != "1" {
            if envelope.message.contains("No transactions found") {
                return Ok(Vec::new());
            }
            bail!("explorer txlistinternal failed: {}", envelope.message);
        }

        let transfers: Vec<InternalTransfer> = serde_json::from_value(envelope.result)?;
        debug!(count = transfers.len(), "Fetched internal transfers");

        Ok(transfers)
    }

    /// Resolve the block number closest before `timestamp` on the explorer's
    /// chain.
    #[instrument(skip(self))]
    pub async fn block_by_timestamp(&self, timestamp: u64) -> Result<u64> {
        let response = self
            .client
            .get(&self.base_url)
            .query(&[
                ("module", "block"),
                ("action", "getblocknobytime"),
                ("timestamp", &timestamp.to_string()),
                ("closest", "before"),
                ("apikey", &self.api_key),
            ])
            .send()
            .await?
            .error_for_status()?;

        let envelope: Envelope = response.json().await?;

        if envelope.status != "1" {
            bail!("explorer getblocknobytime failed: {}", envelope.message);
        }

        let block: String = serde_json::from_value(envelope.result)?;
        let block = block
            .parse()
            .map_err(|e| anyhow!("invalid block number {block}: {e}"))?;

        debug!(block, "Resolved block by timestamp");

        Ok(block)
    }
}

/// Etherscan response envelope; `result` is a list or a string depending on
/// the action and on whether the call failed.
#[derive(Debug, Deserialize)]
struct Envelope {
    status: String,
    message: String,
    result: serde_json::Value,
}
