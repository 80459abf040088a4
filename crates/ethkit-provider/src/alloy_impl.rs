use std::str::FromStr;

use alloy_eips::BlockNumberOrTag;
use alloy_primitives::{Address, Bytes, B256};
use alloy_provider::{Provider, ProviderBuilder, RootProvider};
use alloy_rpc_types_eth::Filter as AlloyFilter;
use alloy_transport::BoxTransport;
use async_trait::async_trait;
use ethkit_primitives::{ChainBlock, Header};
use futures::stream::{BoxStream, StreamExt};

use crate::{chain_api::ChainApi, convert, error::ProviderError, filter::FeeHistory, LogFilter};

/// [`ChainApi`] backed by a live `alloy` provider. Constructible over HTTP or
/// WebSocket; the monitor itself only ever polls, but `subscribe_new_heads`
/// needs a push-capable (WS/IPC) transport underneath.
pub struct AlloyChainApi<P> {
    provider: P
}

impl AlloyChainApi<RootProvider<BoxTransport>> {
    /// Connects over plain HTTP JSON-RPC. Subscriptions are unavailable on
    /// this transport; callers that need `subscribe_new_heads` should use
    /// [`Self::connect_ws`] instead.
    pub async fn connect_http(url: &str) -> Result<Self, ProviderError> {
        let url = url::Url::from_str(url).map_err(|e| ProviderError::Transport(e.to_string()))?;
        let provider = ProviderBuilder::new().on_http(url).boxed();
        Ok(Self { provider })
    }

    /// Connects over WebSocket, enabling push subscriptions.
    pub async fn connect_ws(url: &str) -> Result<Self, ProviderError> {
        let connect = alloy_provider::WsConnect::new(url);
        let provider = ProviderBuilder::new()
            .on_ws(connect)
            .await
            .map_err(|e| ProviderError::Transport(e.to_string()))?
            .boxed();
        Ok(Self { provider })
    }
}

impl<P> AlloyChainApi<P> {
    pub fn from_provider(provider: P) -> Self {
        Self { provider }
    }
}

fn map_transport_err<E: std::fmt::Display>(e: E) -> ProviderError {
    ProviderError::Transport(e.to_string())
}

#[async_trait]
impl<P> ChainApi for AlloyChainApi<P>
where
    P: Provider + Send + Sync + 'static
{
    async fn chain_id(&self) -> Result<u64, ProviderError> {
        self.provider.get_chain_id().await.map_err(map_transport_err)
    }

    async fn block_number(&self) -> Result<u64, ProviderError> {
        self.provider.get_block_number().await.map_err(map_transport_err)
    }

    async fn block_by_number(&self, number: BlockNumberOrTag, with_txs: bool) -> Result<Option<ChainBlock>, ProviderError> {
        let block = self
            .provider
            .get_block_by_number(number, with_txs)
            .await
            .map_err(map_transport_err)?;
        Ok(block.as_ref().map(convert::block_from_alloy))
    }

    async fn block_by_hash(&self, hash: B256, with_txs: bool) -> Result<Option<ChainBlock>, ProviderError> {
        let block = self
            .provider
            .get_block_by_hash(hash, with_txs)
            .await
            .map_err(map_transport_err)?;
        Ok(block.as_ref().map(convert::block_from_alloy))
    }

    async fn header_by_number(&self, number: BlockNumberOrTag) -> Result<Option<Header>, ProviderError> {
        let block = self
            .provider
            .get_block_by_number(number, false)
            .await
            .map_err(map_transport_err)?;
        Ok(block.as_ref().map(|b| convert::header_from_alloy(&b.header)))
    }

    async fn header_by_hash(&self, hash: B256) -> Result<Option<Header>, ProviderError> {
        let block = self
            .provider
            .get_block_by_hash(hash, false)
            .await
            .map_err(map_transport_err)?;
        Ok(block.as_ref().map(|b| convert::header_from_alloy(&b.header)))
    }

    async fn get_logs(&self, filter: &LogFilter) -> Result<Vec<ethkit_primitives::Log>, ProviderError> {
        let mut alloy_filter = AlloyFilter::new();
        if let Some(from) = filter.from_block {
            alloy_filter = alloy_filter.from_block(from);
        }
        if let Some(to) = filter.to_block {
            alloy_filter = alloy_filter.to_block(to);
        }
        if !filter.address.is_empty() {
            alloy_filter = alloy_filter.address(filter.address.clone());
        }
        if let Some(topics) = &filter.topics[0] {
            alloy_filter = alloy_filter.topic0(topics.clone());
        }
        if let Some(topics) = &filter.topics[1] {
            alloy_filter = alloy_filter.topic1(topics.clone());
        }
        if let Some(topics) = &filter.topics[2] {
            alloy_filter = alloy_filter.topic2(topics.clone());
        }
        if let Some(topics) = &filter.topics[3] {
            alloy_filter = alloy_filter.topic3(topics.clone());
        }
        let logs = self.provider.get_logs(&alloy_filter).await.map_err(map_transport_err)?;
        Ok(logs.iter().map(convert::log_from_alloy).collect())
    }

    async fn transaction_receipt(&self, hash: B256) -> Result<Option<ethkit_primitives::TransactionReceipt>, ProviderError> {
        let receipt = self.provider.get_transaction_receipt(hash).await.map_err(map_transport_err)?;
        Ok(receipt.as_ref().map(convert::receipt_from_alloy))
    }

    async fn nonce_at(&self, address: Address, block: BlockNumberOrTag) -> Result<u64, ProviderError> {
        self.provider
            .get_transaction_count(address)
            .block_id(block.into())
            .await
            .map_err(map_transport_err)
    }

    async fn pending_nonce(&self, address: Address) -> Result<u64, ProviderError> {
        self.provider
            .get_transaction_count(address)
            .block_id(BlockNumberOrTag::Pending.into())
            .await
            .map_err(map_transport_err)
    }

    async fn send_raw_transaction(&self, raw: &Bytes) -> Result<B256, ProviderError> {
        let pending = self.provider.send_raw_transaction(raw).await.map_err(map_transport_err)?;
        Ok(*pending.tx_hash())
    }

    async fn suggest_gas_price(&self) -> Result<u128, ProviderError> {
        self.provider.get_gas_price().await.map_err(map_transport_err)
    }

    async fn max_priority_fee_per_gas(&self) -> Result<u128, ProviderError> {
        self.provider.get_max_priority_fee_per_gas().await.map_err(map_transport_err)
    }

    async fn fee_history(&self, block_count: u64, newest_block: BlockNumberOrTag, reward_percentiles: &[f64]) -> Result<FeeHistory, ProviderError> {
        let history = self
            .provider
            .get_fee_history(block_count, newest_block, reward_percentiles)
            .await
            .map_err(map_transport_err)?;
        Ok(FeeHistory {
            base_fee_per_gas: history.base_fee_per_gas.clone(),
            gas_used_ratio: history.gas_used_ratio.clone(),
            reward: history.reward.clone()
        })
    }

    async fn subscribe_new_heads(&self) -> Result<BoxStream<'static, Header>, ProviderError> {
        let subscription = self.provider.subscribe_blocks().await.map_err(map_transport_err)?;
        let stream = subscription.into_stream().map(|h| convert::header_from_alloy(&h));
        Ok(stream.boxed())
    }

    async fn subscribe_pending_transactions(&self) -> Result<BoxStream<'static, B256>, ProviderError> {
        let subscription = self.provider.subscribe_pending_transactions().await.map_err(map_transport_err)?;
        Ok(subscription.into_stream().boxed())
    }
}
