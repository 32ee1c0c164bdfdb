//! Pipeline data types and decimal conversion helpers.
//!
//! Monetary values are carried as [`rust_decimal::Decimal`] end to end and
//! serialized as decimal strings; raw chain integers only cross into decimal
//! space through the helpers here.

use alloy::primitives::{
    utils::format_units,
    Address, U256,
};
use anyhow::{anyhow, Result};
use rust_decimal::Decimal;
use serde::Serialize;
use std::str::FromStr;

/// Sentinel builder address emitted when no builder payment was found.
pub const BUILDER_NONE: Address = Address::ZERO;

/// Output of one valuation strategy for one event.
#[derive(Debug, Clone, PartialEq)]
pub struct StrategyQuote {
    /// Reference-asset price in USD at the event block.
    pub reference_price_usd: Decimal,
    /// Liquidation incentive in USD; `None` for reported-profit families,
    /// where the reconciler derives it.
    pub incentive_usd: Option<Decimal>,
    /// Transaction gas cost in USD.
    pub tx_cost_usd: Decimal,
}

/// Value routed to a block builder within one transaction trace.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BuilderTransfer {
    /// Matched builder address, or `None` when no allowlisted destination
    /// appears in the trace.
    pub builder: Option<Address>,
    /// Transferred amount in wei.
    pub amount_wei: U256,
}

impl BuilderTransfer {
    /// The defined no-match fallback: no builder, zero amount.
    pub fn none() -> Self {
        Self {
            builder: None,
            amount_wei: U256::ZERO,
        }
    }

    /// Transferred amount in native-currency units.
    pub fn amount_native(&self) -> Result<Decimal> {
        wei_to_ether(self.amount_wei)
    }
}

/// Terminal, emitted artifact for one liquidation event.
///
/// Field names mirror the consumer-facing record layout; monetary fields
/// serialize as decimal strings.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EnrichedLiquidation {
    /// Event date, `YYYY-MM-DD` UTC.
    pub date: String,
    pub timestamp: u64,
    /// Liquidated user.
    pub user: String,
    /// Liquidation transaction hash.
    pub hash: String,
    #[serde(rename = "liquidatedCollateralUSD")]
    pub liquidated_collateral_usd: Decimal,
    /// Raw collateral amount in native asset units.
    pub liquidated_collateral: String,
    /// Builder payment in native currency.
    pub sent_to_builder: Decimal,
    #[serde(rename = "sentToBuilderUSD")]
    pub sent_to_builder_usd: Decimal,
    pub collateral_asset: String,
    pub block_number: u64,
    #[serde(rename = "madeBySearcherUSD")]
    pub made_by_searcher_usd: Decimal,
    #[serde(rename = "incentiveUSD")]
    pub incentive_usd: Decimal,
    #[serde(rename = "txCostUSD")]
    pub tx_cost_usd: Decimal,
    /// Resolved builder address, or the zero-address sentinel.
    pub builder: String,
}

/// Convert a raw chain integer with the given decimals into a decimal value.
pub fn scaled_units(value: U256, decimals: u8) -> Result<Decimal> {
    let formatted = format_units(value, decimals)
        .map_err(|e| anyhow!("failed to format {value} with {decimals} decimals: {e}"))?;
    Decimal::from_str(&formatted)
        .map_err(|e| anyhow!("value {formatted} does not fit a decimal: {e}"))
}

/// Convert wei into ether units.
pub fn wei_to_ether(value: U256) -> Result<Decimal> {
    scaled_units(value, 18)
}
