//! Protocol configuration for multi-protocol liquidation indexing.

use alloy::primitives::Address;
use anyhow::{anyhow, Result};
use chrono::NaiveDate;
use serde::Deserialize;
use std::path::Path;
use tracing::info;

use crate::error::PipelineError;

/// Chain id of the primary chain (Ethereum mainnet). Builder-payment tracing
/// and the shared reference-asset oracle live here.
pub const PRIMARY_CHAIN_ID: u64 = 1;

/// Valuation family of a protocol deployment.
///
/// Each family selects one enrichment strategy: how the liquidation incentive
/// is obtained and which oracle prices the reference asset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize)]
#[serde(try_from = "String")]
pub enum ProtocolFamily {
    /// Incentive decoded from the packed pool configuration; reference price
    /// read from a ratio oracle (stablecoin units per reference asset,
    /// inverted).
    CollateralFactorInverseOracle,
    /// Incentive decoded from the packed pool configuration; reference price
    /// read directly from a 1e8-scaled oracle.
    CollateralFactorDirectOracle,
    /// Protocol-reported profit, deployment on the primary chain. Incentive
    /// is reconstructed as reported profit plus the builder payment.
    ReportedProfitPrimary,
    /// Protocol-reported profit on a non-primary chain; reference price taken
    /// from the primary chain at the nearest-preceding block.
    ReportedProfitRemote,
    /// Chain-native asset priced by a fixed external feed (Venus-style).
    NativeFeedOracle,
}

impl ProtocolFamily {
    /// Parse a protocol tag (e.g. from config) into its family.
    pub fn from_tag(tag: &str) -> Option<Self> {
        match tag.to_lowercase().as_str() {
            "aavev2" | "aave-v2" | "aave_v2" => Some(Self::CollateralFactorInverseOracle),
            "aavev3" | "aave-v3" | "aave_v3" | "aavev3arb" | "aavev3avl" | "aavev3op"
            | "aavev3pol" => Some(Self::CollateralFactorDirectOracle),
            "compoundv2" | "compoundv3" | "compound-v2" | "compound-v3" | "makerdao"
            | "morphoaavev2" | "morphocomp" => Some(Self::ReportedProfitPrimary),
            "compoundv3arb" | "compoundv3base" | "compoundv3pol" => {
                Some(Self::ReportedProfitRemote)
            }
            "venusbsc" => Some(Self::NativeFeedOracle),
            _ => None,
        }
    }

    /// Whether enrichment relies on the protocol-reported profit figure.
    pub fn uses_reported_profit(&self) -> bool {
        matches!(
            self,
            Self::ReportedProfitPrimary | Self::ReportedProfitRemote | Self::NativeFeedOracle
        )
    }

    /// Whether the incentive percentage is read from the pool configuration.
    pub fn reads_incentive_configuration(&self) -> bool {
        matches!(
            self,
            Self::CollateralFactorInverseOracle | Self::CollateralFactorDirectOracle
        )
    }
}

impl TryFrom<String> for ProtocolFamily {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::from_tag(&value).ok_or_else(|| format!("unknown protocol family tag: {value}"))
    }
}

/// Static descriptor of one protocol deployment. Immutable for the duration
/// of a run; passed explicitly to every component.
#[derive(Debug, Clone, Deserialize)]
pub struct ProtocolConfig {
    /// Protocol identifier (e.g. "aave-v3-ethereum").
    pub id: String,
    /// Human-readable name.
    pub name: String,
    /// Valuation family tag.
    pub family: ProtocolFamily,
    /// Chain id this deployment lives on.
    pub chain_id: u64,
    /// Subgraph endpoint serving liquidation events.
    pub subgraph: String,
    /// RPC endpoints; the first entry is used.
    pub rpcs: Vec<String>,
    /// Lending pool address (incentive-configuration families).
    #[serde(default)]
    pub lending_pool: Option<Address>,
    /// Oracle address (families with a local oracle).
    #[serde(default)]
    pub oracle: Option<Address>,
    /// Wrapped-native reference asset address.
    #[serde(default)]
    pub reference_asset: Option<Address>,
    /// Extraction lower bound, `YYYY-MM-DD`.
    pub start_date: String,
    /// Block-explorer API key (primary chain tracing, remote block lookup).
    #[serde(default)]
    pub explorer_api_key: Option<String>,
    /// Whether this protocol participates in runs.
    #[serde(default = "default_active")]
    pub active: bool,
}

fn default_active() -> bool {
    true
}

impl ProtocolConfig {
    /// First configured RPC endpoint.
    pub fn rpc(&self) -> Result<&str> {
        self.rpcs
            .first()
            .map(String::as_str)
            .ok_or_else(|| anyhow!("protocol {} has no RPC endpoints", self.id))
    }

    /// Extraction start time: the configured start date at midnight UTC.
    pub fn start_timestamp(&self) -> Result<u64> {
        let date = NaiveDate::parse_from_str(&self.start_date, "%Y-%m-%d")
            .map_err(|e| anyhow!("invalid start_date {} for {}: {}", self.start_date, self.id, e))?;
        let timestamp = date
            .and_hms_opt(0, 0, 0)
            .ok_or_else(|| anyhow!("invalid start_date {}", self.start_date))?
            .and_utc()
            .timestamp();
        u64::try_from(timestamp).map_err(|_| anyhow!("start_date {} before epoch", self.start_date))
    }
}

/// Pick the first active protocol starting from `start_index`, wrapping
/// around the list. Errors when every entry is inactive.
pub fn select_active(
    protocols: &[ProtocolConfig],
    start_index: usize,
) -> Result<usize, PipelineError> {
    if protocols.is_empty() {
        return Err(PipelineError::NoActiveProtocol);
    }

    let mut index = start_index % protocols.len();
    for _ in 0..protocols.len() {
        if protocols[index].active {
            return Ok(index);
        }
        info!(protocol = %protocols[index].name, "Inactive protocol, skipping");
        index = (index + 1) % protocols.len();
    }

    Err(PipelineError::NoActiveProtocol)
}

/// Protocol list as loaded from a TOML descriptor file.
#[derive(Debug, Clone, Deserialize)]
pub struct ProtocolSet {
    pub protocols: Vec<ProtocolConfig>,
}

impl ProtocolSet {
    /// Load the protocol set from a TOML file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())?;
        let set: ProtocolSet = toml::from_str(&content)?;
        Ok(set)
    }
}
