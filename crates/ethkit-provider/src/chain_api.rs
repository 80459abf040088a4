use alloy_eips::BlockNumberOrTag;
use alloy_primitives::{Address, Bytes, B256};
use async_trait::async_trait;
use ethkit_primitives::{ChainBlock, Header, Log, TransactionReceipt};
use futures::stream::BoxStream;

use crate::{FeeHistory, LogFilter, ProviderError};

/// The request/response + push surface the core consumes from a remote node
/// (spec §1, §6). This is the "RPC Client" collaborator boundary: the
/// monitor, listener, and finalizer are written only against this trait, so
/// any JSON-RPC transport (HTTP, WS, IPC) or a deterministic test double can
/// stand in for it.
#[async_trait]
pub trait ChainApi: Send + Sync + 'static {
    async fn chain_id(&self) -> Result<u64, ProviderError>;

    async fn block_number(&self) -> Result<u64, ProviderError>;

    /// `Ok(None)` signals `NotFound` — the remote doesn't have this block
    /// yet, which spec §4.1 step 2 treats as a transient, non-fatal
    /// condition.
    async fn block_by_number(&self, number: BlockNumberOrTag, with_txs: bool) -> Result<Option<ChainBlock>, ProviderError>;

    async fn block_by_hash(&self, hash: B256, with_txs: bool) -> Result<Option<ChainBlock>, ProviderError>;

    async fn header_by_number(&self, number: BlockNumberOrTag) -> Result<Option<Header>, ProviderError>;

    async fn header_by_hash(&self, hash: B256) -> Result<Option<Header>, ProviderError>;

    async fn get_logs(&self, filter: &LogFilter) -> Result<Vec<Log>, ProviderError>;

    async fn transaction_receipt(&self, hash: B256) -> Result<Option<TransactionReceipt>, ProviderError>;

    /// Confirmed nonce as of `block` (typically `Latest`).
    async fn nonce_at(&self, address: Address, block: BlockNumberOrTag) -> Result<u64, ProviderError>;

    /// Nonce including the remote node's own mempool view
    /// (`eth_getTransactionCount(address, "pending")`).
    async fn pending_nonce(&self, address: Address) -> Result<u64, ProviderError>;

    async fn send_raw_transaction(&self, raw: &Bytes) -> Result<B256, ProviderError>;

    async fn suggest_gas_price(&self) -> Result<u128, ProviderError>;

    async fn max_priority_fee_per_gas(&self) -> Result<u128, ProviderError>;

    async fn fee_history(&self, block_count: u64, newest_block: BlockNumberOrTag, reward_percentiles: &[f64]) -> Result<FeeHistory, ProviderError>;

    /// Push facility backing `eth_subscribe("newHeads")`.
    async fn subscribe_new_heads(&self) -> Result<BoxStream<'static, Header>, ProviderError>;

    /// Push facility backing `eth_subscribe("newPendingTransactions")`. Per
    /// spec §9, dedup of repeated hash notifications is left to subscribers
    /// (the Finalizer's diff sweep, or a Receipt Listener filter), not
    /// centralized here.
    async fn subscribe_pending_transactions(&self) -> Result<BoxStream<'static, B256>, ProviderError>;
}
