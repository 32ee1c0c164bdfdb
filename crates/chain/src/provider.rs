//! Chain read client built on Alloy typed providers.

use alloy::eips::BlockId;
use alloy::primitives::{Address, B256, U256};
use alloy::providers::{Provider, ProviderBuilder};
use alloy::rpc::types::Filter;
use alloy::sol_types::SolEvent;
use anyhow::{anyhow, Result};
use tracing::debug;

use crate::contracts::{IAaveOracle, ILendingPool, INativePriceFeed};

/// Receipt fields needed for gas-cost reconciliation.
#[derive(Debug, Clone, Copy)]
pub struct ReceiptInfo {
    pub gas_used: u64,
    pub effective_gas_price: u128,
    pub block_number: u64,
}

impl ReceiptInfo {
    /// Total transaction cost in wei.
    pub fn cost_wei(&self) -> U256 {
        U256::from(self.gas_used) * U256::from(self.effective_gas_price)
    }
}

/// Decoded `LiquidationCall` event fields.
#[derive(Debug, Clone, Copy)]
pub struct LiquidationCallInfo {
    pub collateral_asset: Address,
    pub debt_asset: Address,
    pub user: Address,
}

/// Read-only client for one chain. Providers are constructed per call from
/// the configured endpoint, matching Alloy's cheap-builder model.
#[derive(Debug, Clone)]
pub struct ChainClient {
    chain_id: u64,
    rpc_url: String,
}

impl ChainClient {
    /// Create a client for `chain_id` backed by `rpc_url`.
    pub fn new(chain_id: u64, rpc_url: impl Into<String>) -> Self {
        Self {
            chain_id,
            rpc_url: rpc_url.into(),
        }
    }

    /// Chain id this client reads from.
    pub fn chain_id(&self) -> u64 {
        self.chain_id
    }

    fn provider(&self) -> Result<impl Provider> {
        Ok(ProviderBuilder::new().on_http(self.rpc_url.parse()?))
    }

    /// Fetch the receipt of a transaction.
    pub async fn receipt(&self, hash: B256) -> Result<ReceiptInfo> {
        let provider = self.provider()?;
        let receipt = provider
            .get_transaction_receipt(hash)
            .await?
            .ok_or_else(|| anyhow!("no receipt for transaction {hash}"))?;

        let block_number = receipt
            .block_number
            .ok_or_else(|| anyhow!("receipt for {hash} not yet included in a block"))?;

        let info = ReceiptInfo {
            gas_used: receipt.gas_used,
            effective_gas_price: receipt.effective_gas_price,
            block_number,
        };

        debug!(
            hash = %hash,
            gas_used = info.gas_used,
            effective_gas_price = info.effective_gas_price,
            block = info.block_number,
            "Fetched receipt"
        );

        Ok(info)
    }

    /// Read the `LiquidationCall` log emitted by `pool` at exactly `block`.
    ///
    /// An absent log is an error: a liquidation event without its pool log
    /// means the source and the chain disagree.
    pub async fn liquidation_call(
        &self,
        pool: Address,
        block: u64,
    ) -> Result<LiquidationCallInfo> {
        let provider = self.provider()?;

        let filter = Filter::new()
            .address(pool)
            .event_signature(ILendingPool::LiquidationCall::SIGNATURE_HASH)
            .from_block(block)
            .to_block(block);

        let logs = provider.get_logs(&filter).await?;
        let log = logs
            .first()
            .ok_or_else(|| anyhow!("no LiquidationCall log from {pool} at block {block}"))?;

        let decoded = ILendingPool::LiquidationCall::decode_log(&log.inner, true)?;

        Ok(LiquidationCallInfo {
            collateral_asset: decoded.data.collateralAsset,
            debt_asset: decoded.data.debtAsset,
            user: decoded.data.user,
        })
    }

    /// Read the packed reserve configuration for `asset` from `pool`.
    pub async fn reserve_configuration(&self, pool: Address, asset: Address) -> Result<U256> {
        let provider = self.provider()?;
        let contract = ILendingPool::new(pool, &provider);
        let configuration = contract.getConfiguration(asset).call().await?;
        Ok(configuration.data)
    }

    /// Read `getAssetPrice(asset)` from an Aave-style oracle at `block`.
    pub async fn asset_price(&self, oracle: Address, asset: Address, block: u64) -> Result<U256> {
        let provider = self.provider()?;
        let contract = IAaveOracle::new(oracle, &provider);
        let price = contract
            .getAssetPrice(asset)
            .block(BlockId::number(block))
            .call()
            .await?;
        Ok(price._0)
    }

    /// Read `getPrice(token)` from a fixed-decimals feed at `block`.
    pub async fn feed_price(&self, feed: Address, token: Address, block: u64) -> Result<U256> {
        let provider = self.provider()?;
        let contract = INativePriceFeed::new(feed, &provider);
        let price = contract
            .getPrice(token)
            .block(BlockId::number(block))
            .call()
            .await?;
        Ok(price._0)
    }
}
