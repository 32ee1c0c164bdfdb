//! Valuation strategies, one per protocol family.
//!
//! The dispatcher selects a strategy by the active protocol's
//! [`ProtocolFamily`] tag and produces a [`StrategyQuote`]: reference-asset
//! price, gas cost in USD, and (for collateral-factor families) the
//! liquidation incentive in USD. Every external read goes through the retry
//! wrapper.

use alloy::primitives::{address, Address, U256};
use anyhow::Result;
use oev_api::{ExplorerClient, RawLiquidationEvent};
use oev_chain::ChainClient;
use rust_decimal::Decimal;
use tracing::debug;

use crate::config::{ProtocolConfig, ProtocolFamily, PRIMARY_CHAIN_ID};
use crate::error::PipelineError;
use crate::retry::{with_retries, RetryPolicy};
use crate::types::{scaled_units, wei_to_ether, StrategyQuote};

/// USDC on the primary chain; priced on the ratio oracle to recover the
/// reference-asset price by inversion.
pub const USDC_PRIMARY: Address = address!("A0b86991c6218b36c1d19D4a2e9Eb0cE3606eB48");

/// Wrapped native asset of the primary chain.
pub const WETH_PRIMARY: Address = address!("C02aaA39b223FE8D0A0e5C4F27eAD9083C756Cc2");

/// Wrapped native asset for the native-feed family's chain.
pub const WBNB: Address = address!("bb4CdB9CBd36B01bD1cBaEBF2De08d9173bc095c");

/// Fixed feed contract used by the native-feed family.
pub const NATIVE_FEED: Address = address!("1B2103441A0A108daD8848D8F5d790e4D402921F");

/// Decode the liquidation incentive percentage from the packed reserve
/// configuration: bits 32..48 hold the bonus scaled by 100 and offset by
/// 10000 (e.g. 10800 -> 8%).
pub fn decode_liquidation_incentive(data: U256) -> Decimal {
    let bits: U256 = (data >> 32) & U256::from(0xffffu64);
    Decimal::from(bits.to::<u64>()) / Decimal::ONE_HUNDRED - Decimal::ONE_HUNDRED
}

/// Primary-chain oracle context for remote-chain pricing.
#[derive(Debug, Clone)]
pub struct PrimaryOracle {
    pub chain: ChainClient,
    pub oracle: Address,
}

impl PrimaryOracle {
    /// Locate the primary-chain direct-oracle deployment in the protocol
    /// list. Remote-chain families price their gas against it.
    pub fn locate(protocols: &[ProtocolConfig]) -> Option<Self> {
        protocols.iter().find_map(|p| {
            if p.chain_id != PRIMARY_CHAIN_ID
                || p.family != ProtocolFamily::CollateralFactorDirectOracle
            {
                return None;
            }
            let oracle = p.oracle?;
            let rpc = p.rpcs.first()?;
            Some(Self {
                chain: ChainClient::new(PRIMARY_CHAIN_ID, rpc.clone()),
                oracle,
            })
        })
    }
}

/// Strategy dispatcher for one protocol.
pub struct Valuer<'a> {
    config: &'a ProtocolConfig,
    chain: ChainClient,
    primary: Option<PrimaryOracle>,
    explorer: Option<&'a ExplorerClient>,
}

impl<'a> Valuer<'a> {
    /// Build a valuer for `config`. `primary` and `explorer` are only
    /// required by the remote reported-profit family.
    pub fn new(
        config: &'a ProtocolConfig,
        primary: Option<PrimaryOracle>,
        explorer: Option<&'a ExplorerClient>,
    ) -> Result<Self> {
        let chain = ChainClient::new(config.chain_id, config.rpc()?.to_string());
        Ok(Self {
            config,
            chain,
            primary,
            explorer,
        })
    }

    /// Compute the strategy quote for one event.
    pub async fn quote(&self, event: &RawLiquidationEvent) -> Result<StrategyQuote> {
        let hash = event.tx_hash()?;
        let chain = &self.chain;

        let receipt = with_retries(RetryPolicy::standard(), "transaction receipt", || {
            chain.receipt(hash)
        })
        .await?;
        let gas_native = wei_to_ether(receipt.cost_wei())?;

        let (reference_price_usd, incentive_usd) = match self.config.family {
            ProtocolFamily::CollateralFactorInverseOracle => {
                let pct = self.incentive_percentage(receipt.block_number).await?;
                let price = self.inverse_oracle_price(receipt.block_number).await?;
                (price, Some(incentive_usd(event, pct)))
            }
            ProtocolFamily::CollateralFactorDirectOracle => {
                let pct = self.incentive_percentage(receipt.block_number).await?;
                let price = self.direct_oracle_price(receipt.block_number).await?;
                (price, Some(incentive_usd(event, pct)))
            }
            ProtocolFamily::ReportedProfitPrimary => {
                let price = self.inverse_oracle_price(receipt.block_number).await?;
                (price, None)
            }
            ProtocolFamily::ReportedProfitRemote => {
                let price = self.remote_reference_price(event.timestamp).await?;
                (price, None)
            }
            ProtocolFamily::NativeFeedOracle => {
                let price = self.native_feed_price(receipt.block_number).await?;
                (price, None)
            }
        };

        let tx_cost_usd = gas_native * reference_price_usd;

        debug!(
            hash = %event.hash,
            block = receipt.block_number,
            reference_price = %reference_price_usd,
            tx_cost_usd = %tx_cost_usd,
            "Strategy quote prepared"
        );

        Ok(StrategyQuote {
            reference_price_usd,
            incentive_usd,
            tx_cost_usd,
        })
    }

    /// Read the `LiquidationCall` log at `block` and decode the incentive
    /// percentage for its collateral asset from the pool configuration.
    async fn incentive_percentage(&self, block: u64) -> Result<Decimal> {
        let pool = self.config.lending_pool.ok_or_else(|| {
            PipelineError::MissingData(format!("protocol {} has no lending pool", self.config.id))
        })?;
        let chain = &self.chain;

        let call = with_retries(RetryPolicy::standard(), "liquidation call log", || {
            chain.liquidation_call(pool, block)
        })
        .await?;

        let collateral = call.collateral_asset;
        let data = with_retries(RetryPolicy::standard(), "reserve configuration", || {
            chain.reserve_configuration(pool, collateral)
        })
        .await?;

        if data.is_zero() {
            return Err(PipelineError::MissingData(format!(
                "empty reserve configuration for collateral {collateral}"
            ))
            .into());
        }

        Ok(decode_liquidation_incentive(data))
    }

    /// Reference price from the ratio oracle: stablecoin units per reference
    /// asset, inverted, rounded to 8 places.
    async fn inverse_oracle_price(&self, block: u64) -> Result<Decimal> {
        let oracle = self.oracle_address()?;
        let chain = &self.chain;

        let raw = with_retries(RetryPolicy::slow_oracle(), "inverse oracle price", || {
            chain.asset_price(oracle, USDC_PRIMARY, block)
        })
        .await?;

        let stable_per_reference = wei_to_ether(raw)?;
        if stable_per_reference.is_zero() {
            return Err(
                PipelineError::MissingData(format!("zero oracle price at block {block}")).into(),
            );
        }

        Ok((Decimal::ONE / stable_per_reference).round_dp(8))
    }

    /// Reference price from a 1e8-scaled oracle on the protocol's own chain.
    ///
    /// The reference asset differs per deployment, so it must be configured;
    /// guessing one would query the oracle for an asset it may not list.
    async fn direct_oracle_price(&self, block: u64) -> Result<Decimal> {
        let oracle = self.oracle_address()?;
        let asset = self.config.reference_asset.ok_or_else(|| {
            PipelineError::MissingData(format!(
                "protocol {} has no reference asset",
                self.config.id
            ))
        })?;
        direct_price(&self.chain, oracle, asset, block).await
    }

    /// Remote family: find the nearest-preceding primary-chain block for the
    /// event timestamp and price the reference asset there.
    async fn remote_reference_price(&self, timestamp: u64) -> Result<Decimal> {
        let explorer = self.explorer.ok_or_else(|| {
            PipelineError::MissingData(
                "remote-chain pricing requires an explorer API key".to_string(),
            )
        })?;
        let primary = self.primary.as_ref().ok_or_else(|| {
            PipelineError::MissingData(
                "remote-chain pricing requires a primary-chain oracle deployment".to_string(),
            )
        })?;

        let block = with_retries(RetryPolicy::standard(), "block by timestamp", || {
            explorer.block_by_timestamp(timestamp)
        })
        .await?;

        direct_price(&primary.chain, primary.oracle, WETH_PRIMARY, block).await
    }

    /// Native-feed family: fixed feed contract, 18-decimal output.
    async fn native_feed_price(&self, block: u64) -> Result<Decimal> {
        let token = self.config.reference_asset.unwrap_or(WBNB);
        let chain = &self.chain;

        let raw = with_retries(RetryPolicy::standard(), "native feed price", || {
            chain.feed_price(NATIVE_FEED, token, block)
        })
        .await?;

        wei_to_ether(raw)
    }

    fn oracle_address(&self) -> Result<Address> {
        self.config.oracle.ok_or_else(|| {
            PipelineError::MissingData(format!("protocol {} has no oracle", self.config.id)).into()
        })
    }
}

/// Incentive in USD: liquidated collateral USD times the decoded percentage.
fn incentive_usd(event: &RawLiquidationEvent, percentage: Decimal) -> Decimal {
    event.amount_usd * percentage / Decimal::ONE_HUNDRED
}

/// Reference price from a 1e8-scaled `getAssetPrice` oracle.
async fn direct_price(
    chain: &ChainClient,
    oracle: Address,
    asset: Address,
    block: u64,
) -> Result<Decimal> {
    let raw = with_retries(RetryPolicy::standard(), "direct oracle price", || {
        chain.asset_price(oracle, asset, block)
    })
    .await?;
    scaled_units(raw, 8)
}
