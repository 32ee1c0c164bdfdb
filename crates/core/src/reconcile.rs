//! Reconciliation of strategy and tracer outputs into the final record.
//!
//! Formula selection mirrors the family split:
//! - collateral-factor families: `profit = incentive - sentToBuilder - gas`
//! - reported-profit on the primary chain: `incentive = reported +
//!   sentToBuilder`, same profit formula
//! - reported-profit remote and native-feed: `profit = reported - gas`, no
//!   builder payment
//!
//! All arithmetic is decimal-exact; identical inputs always produce an
//! identical record.

use anyhow::Result;
use chrono::DateTime;
use rust_decimal::Decimal;

use crate::config::{ProtocolConfig, ProtocolFamily};
use crate::error::PipelineError;
use crate::types::{BuilderTransfer, EnrichedLiquidation, StrategyQuote, BUILDER_NONE};

use oev_api::RawLiquidationEvent;

/// Combine one event with its strategy quote and builder transfer.
pub fn reconcile(
    config: &ProtocolConfig,
    event: &RawLiquidationEvent,
    quote: &StrategyQuote,
    transfer: &BuilderTransfer,
) -> Result<EnrichedLiquidation> {
    let sent_native = transfer.amount_native()?;
    let sent_usd = sent_native * quote.reference_price_usd;

    let (incentive_usd, sent_to_builder, sent_to_builder_usd, made_by_searcher_usd) =
        match config.family {
            ProtocolFamily::CollateralFactorInverseOracle
            | ProtocolFamily::CollateralFactorDirectOracle => {
                let incentive = quote.incentive_usd.ok_or_else(|| {
                    PipelineError::MissingData(format!(
                        "strategy produced no incentive for {}",
                        config.id
                    ))
                })?;
                let profit = incentive - sent_usd - quote.tx_cost_usd;
                (incentive, sent_native, sent_usd, profit)
            }
            ProtocolFamily::ReportedProfitPrimary => {
                let reported = reported_profit(config, event)?;
                // Reported profit already nets out the builder payment.
                let incentive = reported + sent_usd;
                let profit = incentive - sent_usd - quote.tx_cost_usd;
                (incentive, sent_native, sent_usd, profit)
            }
            ProtocolFamily::ReportedProfitRemote | ProtocolFamily::NativeFeedOracle => {
                let reported = reported_profit(config, event)?;
                let profit = reported - quote.tx_cost_usd;
                (reported, Decimal::ZERO, Decimal::ZERO, profit)
            }
        };

    let builder = transfer
        .builder
        .map(|b| b.to_string())
        .unwrap_or_else(|| BUILDER_NONE.to_string());

    Ok(EnrichedLiquidation {
        date: date_string(event.timestamp)?,
        timestamp: event.timestamp,
        user: event.liquidatee.id.clone(),
        hash: event.hash.clone(),
        liquidated_collateral_usd: event.amount_usd,
        liquidated_collateral: event.amount.clone(),
        sent_to_builder,
        sent_to_builder_usd,
        collateral_asset: event.asset.id.clone(),
        block_number: event.block_number,
        made_by_searcher_usd,
        incentive_usd,
        tx_cost_usd: quote.tx_cost_usd,
        builder,
    })
}

fn reported_profit(config: &ProtocolConfig, event: &RawLiquidationEvent) -> Result<Decimal> {
    event.profit_usd.ok_or_else(|| {
        PipelineError::MissingData(format!(
            "event {} has no reported profit but family {:?} requires it",
            event.id, config.family
        ))
        .into()
    })
}

/// Locale-free `YYYY-MM-DD` date for the event timestamp.
fn date_string(timestamp: u64) -> Result<String> {
    let datetime = DateTime::from_timestamp(timestamp as i64, 0).ok_or_else(|| {
        PipelineError::MissingData(format!("timestamp {timestamp} out of range"))
    })?;
    Ok(datetime.format("%Y-%m-%d").to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::BUILDER_ALLOWLIST;
    use alloy::primitives::U256;

    fn test_config(family: ProtocolFamily) -> ProtocolConfig {
        ProtocolConfig {
            id: "test".to_string(),
            name: "Test".to_string(),
            family,
            chain_id: 1,
            subgraph: "http://localhost".to_string(),
            rpcs: vec!["http://localhost:8545".to_string()],
            lending_pool: None,
            oracle: None,
            reference_asset: None,
            start_date: "2023-01-01".to_string(),
            explorer_api_key: None,
            active: true,
        }
    }

    fn test_event(profit_usd: Option<Decimal>) -> RawLiquidationEvent {
        let json = serde_json::json!({
            "id": "0x1-17",
            "amount": "1250000000000000000",
            "amountUSD": "10000",
            "blockNumber": 1000,
            "hash": "0xabc",
            "timestamp": 1_700_000_000u64,
            "liquidator": { "id": "0x1111111111111111111111111111111111111111" },
            "liquidatee": { "id": "0x2222222222222222222222222222222222222222" },
            "asset": {
                "decimals": 18,
                "id": "0x3333333333333333333333333333333333333333",
                "name": "Wrapped Ether",
                "symbol": "WETH"
            },
            "profitUSD": profit_usd,
        });
        serde_json::from_value(json).unwrap()
    }

    fn quote(reference: i64, incentive: Option<i64>, gas: i64) -> StrategyQuote {
        StrategyQuote {
            reference_price_usd: Decimal::from(reference),
            incentive_usd: incentive.map(Decimal::from),
            tx_cost_usd: Decimal::from(gas),
        }
    }

    // 0.01 native units
    fn builder_transfer() -> BuilderTransfer {
        BuilderTransfer {
            builder: Some(BUILDER_ALLOWLIST[0]),
            amount_wei: U256::from(10_000_000_000_000_000u64),
        }
    }

    #[test]
    fn collateral_factor_worked_example() {
        // amountUSD 10000, incentive 8% = 800, ref price 2000, builder 0.01
        // native, gas 10 USD -> profit 770.
        let config = test_config(ProtocolFamily::CollateralFactorDirectOracle);
        let record = reconcile(
            &config,
            &test_event(None),
            &quote(2000, Some(800), 10),
            &builder_transfer(),
        )
        .unwrap();

        assert_eq!(record.incentive_usd, Decimal::from(800));
        assert_eq!(record.sent_to_builder_usd, Decimal::from(20));
        assert_eq!(record.tx_cost_usd, Decimal::from(10));
        assert_eq!(record.made_by_searcher_usd, Decimal::from(770));
        assert_eq!(record.sent_to_builder, Decimal::new(1, 2));
        assert_eq!(record.builder, BUILDER_ALLOWLIST[0].to_string());
        assert_eq!(record.date, "2023-11-14");

        // Invariant: profit + sentToBuilderUSD + gas == incentive, exactly.
        assert_eq!(
            record.made_by_searcher_usd + record.sent_to_builder_usd + record.tx_cost_usd,
            record.incentive_usd
        );
    }

    #[test]
    fn reported_profit_primary_reconstructs_incentive() {
        let config = test_config(ProtocolFamily::ReportedProfitPrimary);
        let reported = Decimal::from(100);
        let record = reconcile(
            &config,
            &test_event(Some(reported)),
            &quote(2000, None, 10),
            &builder_transfer(),
        )
        .unwrap();

        // incentive = reported + builder payment
        assert_eq!(record.incentive_usd, Decimal::from(120));
        assert_eq!(record.sent_to_builder_usd, Decimal::from(20));
        assert_eq!(record.made_by_searcher_usd, Decimal::from(90));

        // Invariant: incentive - sentToBuilderUSD == reportedProfitUSD.
        assert_eq!(record.incentive_usd - record.sent_to_builder_usd, reported);
    }

    #[test]
    fn remote_families_have_no_builder_payment() {
        for family in [
            ProtocolFamily::ReportedProfitRemote,
            ProtocolFamily::NativeFeedOracle,
        ] {
            let config = test_config(family);
            let record = reconcile(
                &config,
                &test_event(Some(Decimal::from(50))),
                &quote(300, None, 10),
                &BuilderTransfer::none(),
            )
            .unwrap();

            assert_eq!(record.sent_to_builder_usd, Decimal::ZERO);
            assert_eq!(record.sent_to_builder, Decimal::ZERO);
            assert_eq!(record.made_by_searcher_usd, Decimal::from(40));
            assert_eq!(record.incentive_usd, Decimal::from(50));
            assert_eq!(record.builder, BUILDER_NONE.to_string());
        }
    }

    #[test]
    fn missing_reported_profit_is_an_error() {
        let config = test_config(ProtocolFamily::ReportedProfitPrimary);
        let result = reconcile(
            &config,
            &test_event(None),
            &quote(2000, None, 10),
            &BuilderTransfer::none(),
        );
        assert!(result.is_err());
    }

    #[test]
    fn missing_incentive_for_collateral_family_is_an_error() {
        let config = test_config(ProtocolFamily::CollateralFactorInverseOracle);
        let result = reconcile(
            &config,
            &test_event(None),
            &quote(2000, None, 10),
            &BuilderTransfer::none(),
        );
        assert!(result.is_err());
    }

    #[test]
    fn no_builder_match_yields_zero_downstream() {
        let config = test_config(ProtocolFamily::CollateralFactorDirectOracle);
        let record = reconcile(
            &config,
            &test_event(None),
            &quote(2000, Some(800), 10),
            &BuilderTransfer::none(),
        )
        .unwrap();

        assert_eq!(record.sent_to_builder_usd, Decimal::ZERO);
        assert_eq!(
            record.builder,
            "0x0000000000000000000000000000000000000000"
        );
        assert_eq!(record.made_by_searcher_usd, Decimal::from(790));
    }

    #[test]
    fn reconciliation_is_deterministic() {
        let config = test_config(ProtocolFamily::CollateralFactorDirectOracle);
        let event = test_event(None);
        let q = quote(2000, Some(800), 10);
        let t = builder_transfer();

        let first = reconcile(&config, &event, &q, &t).unwrap();
        let second = reconcile(&config, &event, &q, &t).unwrap();

        assert_eq!(first, second);
        assert_eq!(
            serde_json::to_string(&first).unwrap(),
            serde_json::to_string(&second).unwrap()
        );
    }
}
