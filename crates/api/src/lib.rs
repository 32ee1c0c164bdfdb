//! HTTP clients for the external services the indexer reads from.
//!
//! This crate provides:
//! - Subgraph client: paginated liquidation-event extraction
//! - Block-explorer client: internal transfers and block-by-timestamp lookups

mod explorer;
mod subgraph;

pub use explorer::{ExplorerClient, InternalTransfer};
pub use subgraph::{
    AssetInfo, LiquidationPage, Participant, RawLiquidationEvent, SubgraphClient, PAGE_SIZE,
};
