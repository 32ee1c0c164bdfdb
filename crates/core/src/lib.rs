//! Liquidation enrichment and reconciliation pipeline.
//!
//! This crate provides the core of the OEV indexer:
//! - Protocol configuration and family dispatch
//! - Bounded retry wrapper for every external read
//! - Valuation strategies (incentive, reference price, gas cost)
//! - Builder-payment tracing against a known-builder allowlist
//! - Decimal-exact profit reconciliation per liquidation
//! - The sequential pipeline orchestrator

mod builder;
mod config;
mod error;
mod indexer;
mod reconcile;
mod retry;
mod strategy;
mod types;

pub use builder::{BuilderTracer, InternalTransferSource, BUILDER_ALLOWLIST};
pub use config::{
    select_active, ProtocolConfig, ProtocolFamily, ProtocolSet, PRIMARY_CHAIN_ID,
};
pub use error::PipelineError;
pub use indexer::{Indexer, PaginationMode, RunStatus, RunSummary};
pub use reconcile::reconcile;
pub use retry::{with_retries, RetryPolicy, MAX_ATTEMPTS};
pub use strategy::{
    decode_liquidation_incentive, PrimaryOracle, Valuer, NATIVE_FEED, USDC_PRIMARY, WBNB,
    WETH_PRIMARY,
};
pub use types::{
    scaled_units, wei_to_ether, BuilderTransfer, EnrichedLiquidation, StrategyQuote, BUILDER_NONE,
};

// Wire types from the event source are part of the pipeline's public surface.
pub use oev_api::{LiquidationPage, RawLiquidationEvent, PAGE_SIZE};
