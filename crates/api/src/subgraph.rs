//! Subgraph client for paginated liquidation-event extraction.
//!
//! Events are pulled in pages of [`PAGE_SIZE`], ordered by block number. The
//! first page filters by `timestamp_gte`; once a cursor exists, subsequent
//! pages filter by `id_gt` and a strictly-greater `timestamp_gt`. A transport
//! or GraphQL-level failure surfaces as an error so the caller can tell
//! "source unreachable" apart from "no new events".

use alloy::primitives::B256;
use anyhow::{anyhow, bail, Result};
use rust_decimal::Decimal;
use serde::Deserialize;
use tracing::{debug, instrument};

/// Fixed page size for event extraction.
pub const PAGE_SIZE: usize = 100;

/// One page of liquidation events.
#[derive(Debug, Clone)]
pub struct LiquidationPage {
    /// Events in block-number order.
    pub events: Vec<RawLiquidationEvent>,
    /// Id of the last event in the page, `None` when the page is empty.
    pub next_cursor: Option<String>,
}

impl LiquidationPage {
    /// Whether this page signals exhaustion for the invocation.
    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }
}

/// One liquidation as reported by the event source. Never mutated; consumed
/// once by reconciliation.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawLiquidationEvent {
    /// Source document id, used as the pagination cursor.
    pub id: String,
    /// Liquidated collateral in native asset units (raw integer string).
    pub amount: String,
    /// Liquidated collateral in USD.
    #[serde(rename = "amountUSD")]
    pub amount_usd: Decimal,
    #[serde(deserialize_with = "deserialize_u64_from_string")]
    pub block_number: u64,
    /// Liquidation transaction hash.
    pub hash: String,
    #[serde(deserialize_with = "deserialize_u64_from_string")]
    pub timestamp: u64,
    pub liquidator: Participant,
    pub liquidatee: Participant,
    pub asset: AssetInfo,
    /// Protocol-reported searcher profit; only present for some families.
    #[serde(rename = "profitUSD")]
    pub profit_usd: Option<Decimal>,
}

impl RawLiquidationEvent {
    /// Parse the transaction hash into a typed 32-byte hash.
    pub fn tx_hash(&self) -> Result<B256> {
        self.hash
            .parse()
            .map_err(|e| anyhow!("invalid tx hash {}: {}", self.hash, e))
    }
}

/// Address wrapper for liquidator/liquidatee references.
#[derive(Debug, Clone, Deserialize)]
pub struct Participant {
    pub id: String,
}

/// Collateral asset descriptor attached to each event.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssetInfo {
    #[serde(deserialize_with = "deserialize_u64_from_string")]
    pub decimals: u64,
    pub id: String,
    pub name: String,
    pub symbol: String,
    #[serde(rename = "lastPriceUSD", default)]
    pub last_price_usd: Option<Decimal>,
    #[serde(default, deserialize_with = "deserialize_optional_u64")]
    pub last_price_block_number: Option<u64>,
}

/// Subgraph client.
#[derive(Debug, Clone)]
pub struct SubgraphClient {
    client: reqwest::Client,
}

impl SubgraphClient {
    /// Create a new subgraph client.
    pub fn new() -> Self {
        Self {
            client: reqwest::Client::new(),
        }
    }

    /// Fetch one page of liquidations from `endpoint`.
    ///
    /// `start_time` is the inclusive lower bound on the first page; with a
    /// `cursor` present the filter becomes strictly greater-than for both id
    /// and timestamp.
    #[instrument(skip(self, endpoint))]
    pub async fn liquidations(
        &self,
        endpoint: &str,
        start_time: u64,
        cursor: Option<&str>,
    ) -> Result<LiquidationPage> {
        let query = build_query(start_time, cursor);

        let response = self
            .client
            .post(endpoint)
            .json(&serde_json::json!({ "query": query }))
            .send()
            .await?
            .error_for_status()?;

        let body: GraphResponse = response.json().await?;

        if let Some(errors) = body.errors {
            let messages: Vec<_> = errors.into_iter().map(|e| e.message).collect();
            bail!("subgraph query failed: {}", messages.join("; "));
        }

        let events = body
            .data
            .ok_or_else(|| anyhow!("subgraph response missing data"))?
            .liquidates;

        let next_cursor = events.last().map(|e| e.id.clone());

        debug!(fetched = events.len(), "Fetched liquidation page");

        Ok(LiquidationPage {
            events,
            next_cursor,
        })
    }
}

impl Default for SubgraphClient {
    fn default() -> Self {
        Self::new()
    }
}

/// Build the liquidation page query for the given window.
fn build_query(start_time: u64, cursor: Option<&str>) -> String {
    let filter = match cursor {
        None => format!(r#"{{ timestamp_gte: "{start_time}" }}"#),
        Some(id) => format!(r#"{{ id_gt: "{id}", timestamp_gt: "{start_time}" }}"#),
    };

    format!(
        r#"query {{
  liquidates(first: {PAGE_SIZE}, where: {filter}, orderBy: blockNumber) {{
    id
    amount
    amountUSD
    blockNumber
    hash
    timestamp
    liquidator {{ id }}
    liquidatee {{ id }}
    asset {{
      decimals
      id
      name
      symbol
      lastPriceUSD
      lastPriceBlockNumber
    }}
    profitUSD
  }}
}}"#
    )
}

#[derive(Debug, Deserialize)]
struct GraphResponse {
    data: Option<LiquidatesData>,
    errors: Option<Vec<GraphError>>,
}

#[derive(Debug, Deserialize)]
struct LiquidatesData {
    liquidates: Vec<RawLiquidationEvent>,
}

#[derive(Debug, Deserialize)]
struct GraphError {
    message: String,
}

// Custom deserializers; subgraphs encode BigInt fields as strings.

fn deserialize_u64_from_string<'de, D>(deserializer: D) -> Result<u64, D::Error>
where
    D: serde::Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum StringOrNumber {
        String(String),
        Number(u64),
    }

    match StringOrNumber::deserialize(deserializer)? {
        StringOrNumber::String(s) => s.parse().map_err(serde::de::Error::custom),
        StringOrNumber::Number(n) => Ok(n),
    }
}

fn deserialize_optional_u64<'de, D>(deserializer: D) -> Result<Option<u64>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum StringOrNumber {
        String(String),
        Number(u64),
    }

    match Option::<StringOrNumber>::deserialize(deserializer)? {
        Some(StringOrNumber::String(s)) => {
            if s.is_empty() {
                Ok(None)
            } else {
                s.parse().map(Some).map_err(serde::de::Error::custom)
            }
        }
        Some(StringOrNumber::Number(n)) => Ok(Some(n)),
        None => Ok(None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_page_filters_by_inclusive_timestamp() {
        let query = build_query(1_700_000_000, None);
        assert!(query.contains(r#"timestamp_gte: "1700000000""#));
        assert!(!query.contains("id_gt"));
        assert!(query.contains("first: 100"));
        assert!(query.contains("orderBy: blockNumber"));
    }

    #[test]
    fn cursor_page_filters_strictly_greater() {
        let query = build_query(1_700_000_000, Some("0xabc-42"));
        assert!(query.contains(r#"id_gt: "0xabc-42""#));
        assert!(query.contains(r#"timestamp_gt: "1700000000""#));
        assert!(!query.contains("timestamp_gte"));
    }

    #[test]
    fn deserialize_event() {
        // Field shapes match a Messari-style lending subgraph response.
        let json = r#"{
            "id": "0x1-17",
            "amount": "1250000000000000000",
            "amountUSD": "10000.5",
            "blockNumber": "18000000",
            "hash": "0x0101010101010101010101010101010101010101010101010101010101010101",
            "timestamp": "1700000000",
            "liquidator": { "id": "0x1111111111111111111111111111111111111111" },
            "liquidatee": { "id": "0x2222222222222222222222222222222222222222" },
            "asset": {
                "decimals": 18,
                "id": "0x3333333333333333333333333333333333333333",
                "name": "Wrapped Ether",
                "symbol": "WETH",
                "lastPriceUSD": "2000.12",
                "lastPriceBlockNumber": "17999999"
            },
            "profitUSD": null
        }"#;

        let event: RawLiquidationEvent = serde_json::from_str(json).unwrap();
        assert_eq!(event.block_number, 18_000_000);
        assert_eq!(event.timestamp, 1_700_000_000);
        assert_eq!(event.amount_usd, Decimal::new(100005, 1));
        assert!(event.profit_usd.is_none());
        assert_eq!(event.asset.symbol, "WETH");
        assert!(event.tx_hash().is_ok());
    }

    #[test]
    fn deserialize_page_cursor_is_last_id() {
        let json = r#"{
            "data": {
                "liquidates": [
                    {
                        "id": "a-1",
                        "amount": "1",
                        "amountUSD": "1",
                        "blockNumber": 100,
                        "hash": "0x00",
                        "timestamp": 1,
                        "liquidator": { "id": "0x01" },
                        "liquidatee": { "id": "0x02" },
                        "asset": { "decimals": 18, "id": "0x03", "name": "t", "symbol": "T" },
                        "profitUSD": "5"
                    },
                    {
                        "id": "a-2",
                        "amount": "1",
                        "amountUSD": "1",
                        "blockNumber": 101,
                        "hash": "0x00",
                        "timestamp": 2,
                        "liquidator": { "id": "0x01" },
                        "liquidatee": { "id": "0x02" },
                        "asset": { "decimals": 18, "id": "0x03", "name": "t", "symbol": "T" },
                        "profitUSD": null
                    }
                ]
            }
        }"#;

        let body: GraphResponse = serde_json::from_str(json).unwrap();
        let events = body.data.unwrap().liquidates;
        let next_cursor = events.last().map(|e| e.id.clone());
        assert_eq!(next_cursor.as_deref(), Some("a-2"));
        assert_eq!(events[0].profit_usd, Some(Decimal::from(5)));
    }
}
