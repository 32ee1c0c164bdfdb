//! OEV Liquidation Indexer
//!
//! Pulls liquidation events for the active protocol, enriches each with
//! point-in-time pricing, gas cost and builder-payment data, and emits the
//! reconciled records as JSON lines. One invocation processes one extraction
//! window; scheduling and cursor persistence live outside this binary.

use anyhow::Result;
use tracing::{info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use oev_core::{Indexer, PaginationMode, ProtocolSet, RunStatus};

/// Environment variable names.
mod env {
    pub const PROTOCOLS_FILE: &str = "OEV_PROTOCOLS";
    pub const PROTOCOL_INDEX: &str = "OEV_PROTOCOL_INDEX";
    pub const CURSOR: &str = "OEV_CURSOR";
    pub const DRAIN_ALL: &str = "OEV_DRAIN_ALL";
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,oev_core=debug")),
        )
        .init();

    let path = std::env::var(env::PROTOCOLS_FILE).unwrap_or_else(|_| "protocols.toml".to_string());
    let set = ProtocolSet::from_file(&path)?;
    info!(path = %path, protocols = set.protocols.len(), "Loaded protocol configuration");

    let start_index: usize = std::env::var(env::PROTOCOL_INDEX)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(0);
    let cursor = std::env::var(env::CURSOR).ok();
    let mode = if std::env::var(env::DRAIN_ALL).is_ok_and(|v| v == "1") {
        PaginationMode::DrainAll
    } else {
        PaginationMode::SinglePage
    };

    let indexer = Indexer::new(set.protocols).with_mode(mode);
    let summary = indexer.run(start_index, cursor).await?;

    match summary.status {
        RunStatus::UpToDate => info!(protocol = %summary.protocol, "Liquidations already up to date"),
        RunStatus::SourceUnavailable(prepared) => {
            warn!(
                protocol = %summary.protocol,
                prepared,
                "Event source unavailable, keeping records prepared before the failure"
            )
        }
        RunStatus::Prepared(count) => {
            info!(protocol = %summary.protocol, prepared = count, "Prepared liquidations")
        }
    }

    for record in &summary.records {
        println!("{}", serde_json::to_string(record)?);
    }

    if let Some(cursor) = &summary.next_cursor {
        info!(cursor = %cursor, "Resume cursor for next invocation");
    }

    Ok(())
}
