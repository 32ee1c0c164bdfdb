//! Builder-transfer tracing.
//!
//! Determines whether a liquidation transaction routed value to a known
//! block builder. Primary chain only: other chains have no builder market
//! relevant here and yield the zero fallback without a lookup.

use alloy::primitives::{address, Address, B256};
use anyhow::Result;
use async_trait::async_trait;
use oev_api::{ExplorerClient, InternalTransfer};
use tracing::info;

use crate::config::PRIMARY_CHAIN_ID;
use crate::retry::{with_retries, RetryPolicy};
use crate::types::BuilderTransfer;

/// Known builder payout addresses on the primary chain.
pub const BUILDER_ALLOWLIST: [Address; 6] = [
    // beaverbuild
    address!("95222290DD7278Aa3Ddd389Cc1E1d165CC4BAfe5"),
    // Titan Builder
    address!("4838B106FCe9647Bdf1E7877BF73cE8B0BAD5f97"),
    // rsync-builder
    address!("1f9090aaE28b8a3dCeaDf281B0F12828e676c326"),
    // Flashbots builder
    address!("DAFEA492D9c6733ae3d56b7Ed1ADB60692c98Bc5"),
    // builder0x69
    address!("690B9A9E9aa1C9dB991C7721a92d351Db4FaC990"),
    // bloXroute max-profit
    address!("f573d99385C05c23B24ed33De616ad16a43a0919"),
];

/// Source of internal transfers for a transaction. Implemented by the
/// explorer client; tests substitute a fixed list.
#[async_trait]
pub trait InternalTransferSource: Send + Sync {
    async fn internal_transfers(&self, hash: B256) -> Result<Vec<InternalTransfer>>;
}

#[async_trait]
impl InternalTransferSource for ExplorerClient {
    async fn internal_transfers(&self, hash: B256) -> Result<Vec<InternalTransfer>> {
        ExplorerClient::internal_transfers(self, hash).await
    }
}

/// Traces builder payments within liquidation transactions.
pub struct BuilderTracer<S> {
    source: S,
    allowlist: Vec<Address>,
    retry: RetryPolicy,
}

impl<S: InternalTransferSource> BuilderTracer<S> {
    /// Create a tracer over `source` with the default allowlist.
    pub fn new(source: S) -> Self {
        Self {
            source,
            allowlist: BUILDER_ALLOWLIST.to_vec(),
            retry: RetryPolicy::standard(),
        }
    }

    /// Extend the allowlist with additional builder addresses.
    pub fn with_builders(mut self, builders: impl IntoIterator<Item = Address>) -> Self {
        self.allowlist.extend(builders);
        self
    }

    /// Override the retry policy.
    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Find the builder payment within the transaction's trace.
    ///
    /// Address comparison is case-insensitive (addresses are parsed before
    /// matching). Only the first matching transfer in trace order is
    /// reported; multiple builder payments in one transaction are not
    /// aggregated.
    pub async fn trace(&self, chain_id: u64, hash: B256) -> Result<BuilderTransfer> {
        if chain_id != PRIMARY_CHAIN_ID {
            return Ok(BuilderTransfer::none());
        }

        let source = &self.source;
        let transfers = with_retries(self.retry, "internal transfers", || {
            source.internal_transfers(hash)
        })
        .await?;

        for transfer in &transfers {
            let Ok(to) = transfer.to.parse::<Address>() else {
                continue;
            };
            if self.allowlist.contains(&to) {
                let amount_wei = transfer.value_wei()?;
                info!(
                    from = %transfer.from,
                    to = %transfer.to,
                    value = %transfer.value,
                    "Funds moved to builder"
                );
                return Ok(BuilderTransfer {
                    builder: Some(to),
                    amount_wei,
                });
            }
        }

        Ok(BuilderTransfer::none())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy::primitives::U256;

    struct StaticTransfers(Vec<InternalTransfer>);

    #[async_trait]
    impl InternalTransferSource for StaticTransfers {
        async fn internal_transfers(&self, _hash: B256) -> Result<Vec<InternalTransfer>> {
            Ok(self.0.clone())
        }
    }

    struct PanicSource;

    #[async_trait]
    impl InternalTransferSource for PanicSource {
        async fn internal_transfers(&self, _hash: B256) -> Result<Vec<InternalTransfer>> {
            panic!("non-primary chains must not hit the transfer source");
        }
    }

    fn transfer(to: &str, value: &str) -> InternalTransfer {
        InternalTransfer {
            from: "0xaaa0000000000000000000000000000000000001".to_string(),
            to: to.to_string(),
            value: value.to_string(),
        }
    }

    #[tokio::test]
    async fn non_primary_chain_short_circuits() {
        let tracer = BuilderTracer::new(PanicSource);
        let result = tracer.trace(8453, B256::ZERO).await.unwrap();
        assert_eq!(result, BuilderTransfer::none());
    }

    #[tokio::test]
    async fn matches_builder_case_insensitively() {
        // beaverbuild, lowercased
        let tracer = BuilderTracer::new(StaticTransfers(vec![
            transfer("0xbbb0000000000000000000000000000000000002", "7"),
            transfer(
                "0x95222290dd7278aa3ddd389cc1e1d165cc4bafe5",
                "10000000000000000",
            ),
        ]));

        let result = tracer.trace(1, B256::ZERO).await.unwrap();
        assert_eq!(result.builder, Some(BUILDER_ALLOWLIST[0]));
        assert_eq!(result.amount_wei, U256::from(10_000_000_000_000_000u64));
    }

    #[tokio::test]
    async fn first_match_wins_over_later_builders() {
        // Titan first, beaverbuild second; the Titan payment is reported.
        let tracer = BuilderTracer::new(StaticTransfers(vec![
            transfer("0x4838B106FCe9647Bdf1E7877BF73cE8B0BAD5f97", "100"),
            transfer("0x95222290DD7278Aa3Ddd389Cc1E1d165CC4BAfe5", "200"),
        ]));

        let result = tracer.trace(1, B256::ZERO).await.unwrap();
        assert_eq!(result.builder, Some(BUILDER_ALLOWLIST[1]));
        assert_eq!(result.amount_wei, U256::from(100));
    }

    #[tokio::test]
    async fn no_match_yields_zero_fallback() {
        let tracer = BuilderTracer::new(StaticTransfers(vec![transfer(
            "0xccc0000000000000000000000000000000000003",
            "500",
        )]));

        let result = tracer.trace(1, B256::ZERO).await.unwrap();
        assert_eq!(result, BuilderTransfer::none());
    }

    #[tokio::test]
    async fn extended_allowlist_is_honored() {
        let custom = "0xddd0000000000000000000000000000000000004"
            .parse::<Address>()
            .unwrap();
        let tracer = BuilderTracer::new(StaticTransfers(vec![transfer(
            "0xDDD0000000000000000000000000000000000004",
            "42",
        )]))
        .with_builders([custom]);

        let result = tracer.trace(1, B256::ZERO).await.unwrap();
        assert_eq!(result.builder, Some(custom));
        assert_eq!(result.amount_wei, U256::from(42));
    }
}
