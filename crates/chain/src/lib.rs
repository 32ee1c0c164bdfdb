//! Read-only chain access layer.
//!
//! This crate provides:
//! - Provider construction over HTTP RPC endpoints
//! - Typed contract bindings for the price oracles, the lending pool
//!   configuration read, and the `LiquidationCall` event
//! - Transaction-receipt and single-block log reads
//!
//! All reads are point-in-time: oracle calls accept a block number so prices
//! are taken at the liquidation block, not at head.

mod contracts;
mod provider;

pub use contracts::{IAaveOracle, ILendingPool, INativePriceFeed};
pub use provider::{ChainClient, LiquidationCallInfo, ReceiptInfo};
