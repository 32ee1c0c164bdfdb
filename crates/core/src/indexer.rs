//! Pipeline orchestration.
//!
//! One run: select the active protocol, pull liquidation pages from its
//! subgraph, and for each event in page order run the valuation strategy,
//! the builder tracer and the reconciler, strictly sequentially. Cursor
//! persistence is external; re-running without a cursor reprocesses the same
//! window.

use anyhow::Result;
use oev_api::{ExplorerClient, SubgraphClient, PAGE_SIZE};
use tracing::{debug, info, warn};

use crate::builder::BuilderTracer;
use crate::config::{select_active, ProtocolConfig, PRIMARY_CHAIN_ID};
use crate::error::PipelineError;
use crate::reconcile::reconcile;
use crate::strategy::{PrimaryOracle, Valuer};
use crate::types::{BuilderTransfer, EnrichedLiquidation};

/// How far one invocation pulls from the event source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PaginationMode {
    /// One page per invocation; external scheduling drives progress.
    #[default]
    SinglePage,
    /// Keep paging until a short or empty page.
    DrainAll,
}

/// Outcome of a run, distinguishing "caught up" from "source unreachable".
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunStatus {
    /// The source returned no new events.
    UpToDate,
    /// Records were prepared.
    Prepared(usize),
    /// The event source could not be reached; nothing can be said about new
    /// events. Carries the count of records prepared from pages fetched
    /// before the failure.
    SourceUnavailable(usize),
}

/// Result of one orchestrator run.
#[derive(Debug)]
pub struct RunSummary {
    /// Id of the protocol that was indexed.
    pub protocol: String,
    pub status: RunStatus,
    /// Enriched records in input event order.
    pub records: Vec<EnrichedLiquidation>,
    /// Cursor to resume from, when the source yielded events.
    pub next_cursor: Option<String>,
}

/// Drives extraction and per-event enrichment for the configured protocols.
pub struct Indexer {
    protocols: Vec<ProtocolConfig>,
    subgraph: SubgraphClient,
    explorer: Option<ExplorerClient>,
    mode: PaginationMode,
}

impl Indexer {
    /// Build an indexer over `protocols`. The explorer client is created
    /// from the first configured API key.
    pub fn new(protocols: Vec<ProtocolConfig>) -> Self {
        let explorer = protocols
            .iter()
            .find_map(|p| p.explorer_api_key.clone())
            .map(ExplorerClient::new);

        Self {
            protocols,
            subgraph: SubgraphClient::new(),
            explorer,
            mode: PaginationMode::default(),
        }
    }

    /// Set the pagination mode.
    pub fn with_mode(mut self, mode: PaginationMode) -> Self {
        self.mode = mode;
        self
    }

    /// Whether an explorer client is configured.
    pub fn has_explorer(&self) -> bool {
        self.explorer.is_some()
    }

    /// Run the pipeline once, starting protocol selection at `start_index`
    /// and extraction at `cursor`.
    pub async fn run(&self, start_index: usize, cursor: Option<String>) -> Result<RunSummary> {
        let index = select_active(&self.protocols, start_index)?;
        let config = &self.protocols[index];

        info!(
            protocol = %config.name,
            chain = config.chain_id,
            family = ?config.family,
            "Indexing protocol"
        );

        let start_time = config.start_timestamp()?;

        // Primary-chain liquidations must be traced for builder payments;
        // refusing up front beats silently reporting zero diverted value.
        if config.chain_id == PRIMARY_CHAIN_ID && self.explorer.is_none() {
            return Err(PipelineError::MissingData(
                "primary-chain tracing requires an explorer API key".to_string(),
            )
            .into());
        }

        let primary = PrimaryOracle::locate(&self.protocols);
        let valuer = Valuer::new(config, primary, self.explorer.as_ref())?;
        let tracer = self.explorer.clone().map(BuilderTracer::new);

        let mut cursor = cursor;
        let mut records = Vec::new();
        let mut source_failed = false;

        loop {
            let page = match self
                .subgraph
                .liquidations(&config.subgraph, start_time, cursor.as_deref())
                .await
            {
                Ok(page) => page,
                Err(error) => {
                    warn!(error = %error, "Event source unavailable");
                    source_failed = true;
                    break;
                }
            };

            if page.is_empty() {
                break;
            }

            let page_len = page.events.len();
            info!(fetched = page_len, "Processing liquidation page");

            for event in &page.events {
                let quote = valuer.quote(event).await?;
                let transfer = match &tracer {
                    Some(tracer) => tracer.trace(config.chain_id, event.tx_hash()?).await?,
                    None => BuilderTransfer::none(),
                };
                let record = reconcile(config, event, &quote, &transfer)?;
                debug!(hash = %event.hash, profit = %record.made_by_searcher_usd, "Prepared liquidation");
                records.push(record);
            }

            cursor = page.next_cursor;

            if self.mode == PaginationMode::SinglePage || page_len < PAGE_SIZE {
                break;
            }
        }

        let status = if source_failed {
            RunStatus::SourceUnavailable(records.len())
        } else if records.is_empty() {
            RunStatus::UpToDate
        } else {
            RunStatus::Prepared(records.len())
        };

        info!(
            protocol = %config.id,
            prepared = records.len(),
            status = ?status,
            "Run complete"
        );

        Ok(RunSummary {
            protocol: config.id.clone(),
            status,
            records,
            next_cursor: cursor,
        })
    }
}
