//! A scriptable in-memory [`ChainApi`] for unit tests across the workspace,
//! modeled on the teacher's `TestnetBlockProvider` broadcast-based test
//! double (`testing-tools/src/anvil_state_provider/block_provider.rs`) but
//! shaped to the request/response + subscribe surface of `ChainApi`.

use std::collections::{HashMap, HashSet};

use alloy_eips::BlockNumberOrTag;
use alloy_primitives::{Address, Bytes, B256};
use async_trait::async_trait;
use ethkit_primitives::{ChainBlock, Header, Log, TransactionReceipt};
use futures::stream::{BoxStream, StreamExt};
use parking_lot::Mutex;
use tokio::sync::broadcast;
use tokio_stream::wrappers::BroadcastStream;

use crate::{chain_api::ChainApi, error::ProviderError, filter::FeeHistory, LogFilter};

struct State {
    chain_id: u64,
    by_number: HashMap<u64, ChainBlock>,
    by_hash: HashMap<B256, ChainBlock>,
    receipts: HashMap<B256, TransactionReceipt>,
    head: Option<u64>,
    nonce_at: HashMap<Address, u64>,
    pending_nonce: HashMap<Address, u64>,
    gas_price: u128,
    priority_fee: u128,
    base_fee_history: Vec<u128>,
    sent: Vec<Bytes>,
    not_found: bool,
    logs_failing_at: HashSet<u64>
}

/// A `ChainApi` double a test drives explicitly: push blocks, move the head,
/// set nonces/gas prices, then hand an `Arc<MockChainApi>` to the component
/// under test.
pub struct MockChainApi {
    state: Mutex<State>,
    new_heads: broadcast::Sender<Header>,
    pending_txs: broadcast::Sender<B256>
}

impl MockChainApi {
    pub fn new(chain_id: u64) -> Self {
        let (new_heads, _) = broadcast::channel(256);
        let (pending_txs, _) = broadcast::channel(256);
        Self {
            state: Mutex::new(State {
                chain_id,
                by_number: HashMap::new(),
                by_hash: HashMap::new(),
                receipts: HashMap::new(),
                head: None,
                nonce_at: HashMap::new(),
                pending_nonce: HashMap::new(),
                gas_price: 10,
                priority_fee: 1,
                base_fee_history: Vec::new(),
                sent: Vec::new(),
                not_found: false,
                logs_failing_at: HashSet::new()
            }),
            new_heads,
            pending_txs
        }
    }

    /// Inserts/overwrites a block and, if it's the highest number seen,
    /// advances the mock's notion of "head".
    pub fn push_block(&self, block: ChainBlock) {
        let mut state = self.state.lock();
        let number = block.number();
        let hash = block.hash();
        state.head = Some(state.head.map_or(number, |h| h.max(number)));
        state.by_hash.insert(hash, block.clone());
        state.by_number.insert(number, block.clone());
        let header = block.header.clone();
        drop(state);
        let _ = self.new_heads.send(header);
    }

    /// Replaces whatever block was at `number` without touching `head`,
    /// used to script a reorg's replacement chain.
    pub fn set_block_at(&self, number: u64, block: ChainBlock) {
        let mut state = self.state.lock();
        state.by_hash.insert(block.hash(), block.clone());
        state.by_number.insert(number, block);
    }

    pub fn remove_block_at(&self, number: u64) {
        let mut state = self.state.lock();
        if let Some(block) = state.by_number.remove(&number) {
            state.by_hash.remove(&block.hash());
        }
    }

    pub fn set_head(&self, number: u64) {
        self.state.lock().head = Some(number);
    }

    pub fn insert_receipt(&self, receipt: TransactionReceipt) {
        self.state.lock().receipts.insert(receipt.transaction_hash, receipt);
    }

    pub fn set_nonce_at(&self, address: Address, nonce: u64) {
        self.state.lock().nonce_at.insert(address, nonce);
    }

    pub fn set_pending_nonce(&self, address: Address, nonce: u64) {
        self.state.lock().pending_nonce.insert(address, nonce);
    }

    pub fn set_gas_price(&self, gas_price: u128, priority_fee: u128) {
        let mut state = self.state.lock();
        state.gas_price = gas_price;
        state.priority_fee = priority_fee;
    }

    pub fn set_base_fee_history(&self, fees: Vec<u128>) {
        self.state.lock().base_fee_history = fees;
    }

    /// Forces the next `block_by_number`/`block_by_hash` miss to return
    /// `Ok(None)` instead of a real lookup, scripting the `NotFound` tick
    /// (spec §4.1 step 2).
    pub fn set_not_found(&self, not_found: bool) {
        self.state.lock().not_found = not_found;
    }

    /// Scripts `get_logs` to fail with [`ProviderError::Transport`] for the
    /// given block number until cleared with [`Self::clear_fail_logs_at`] —
    /// used to exercise the monitor's deferred re-augmentation retry.
    pub fn fail_logs_at(&self, number: u64) {
        self.state.lock().logs_failing_at.insert(number);
    }

    pub fn clear_fail_logs_at(&self, number: u64) {
        self.state.lock().logs_failing_at.remove(&number);
    }

    pub fn sent_transactions(&self) -> Vec<Bytes> {
        self.state.lock().sent.clone()
    }

    pub fn notify_pending_tx(&self, hash: B256) {
        let _ = self.pending_txs.send(hash);
    }
}

#[async_trait]
impl ChainApi for MockChainApi {
    async fn chain_id(&self) -> Result<u64, ProviderError> {
        Ok(self.state.lock().chain_id)
    }

    async fn block_number(&self) -> Result<u64, ProviderError> {
        self.state.lock().head.ok_or(ProviderError::NotFound)
    }

    async fn block_by_number(&self, number: BlockNumberOrTag, _with_txs: bool) -> Result<Option<ChainBlock>, ProviderError> {
        let state = self.state.lock();
        if state.not_found {
            return Ok(None)
        }
        let number = match number {
            BlockNumberOrTag::Number(n) => n,
            BlockNumberOrTag::Latest | BlockNumberOrTag::Pending => state.head.unwrap_or_default(),
            _ => return Ok(None)
        };
        Ok(state.by_number.get(&number).cloned())
    }

    async fn block_by_hash(&self, hash: B256, _with_txs: bool) -> Result<Option<ChainBlock>, ProviderError> {
        let state = self.state.lock();
        if state.not_found {
            return Ok(None)
        }
        Ok(state.by_hash.get(&hash).cloned())
    }

    async fn header_by_number(&self, number: BlockNumberOrTag) -> Result<Option<Header>, ProviderError> {
        Ok(self.block_by_number(number, false).await?.map(|b| b.header))
    }

    async fn header_by_hash(&self, hash: B256) -> Result<Option<Header>, ProviderError> {
        Ok(self.block_by_hash(hash, false).await?.map(|b| b.header))
    }

    async fn get_logs(&self, filter: &LogFilter) -> Result<Vec<Log>, ProviderError> {
        let state = self.state.lock();
        if let Some(BlockNumberOrTag::Number(number)) = filter.from_block {
            if state.logs_failing_at.contains(&number) {
                return Err(ProviderError::Transport(format!("mock: scripted get_logs failure at block {number}")))
            }
        }
        let mut out = Vec::new();
        for block in state.by_number.values() {
            if let Some(logs) = &block.logs {
                for log in logs {
                    if !filter.address.is_empty() && !filter.address.contains(&log.address) {
                        continue
                    }
                    out.push(log.clone());
                }
            }
        }
        Ok(out)
    }

    async fn transaction_receipt(&self, hash: B256) -> Result<Option<TransactionReceipt>, ProviderError> {
        Ok(self.state.lock().receipts.get(&hash).cloned())
    }

    async fn nonce_at(&self, address: Address, _block: BlockNumberOrTag) -> Result<u64, ProviderError> {
        Ok(self.state.lock().nonce_at.get(&address).copied().unwrap_or(0))
    }

    async fn pending_nonce(&self, address: Address) -> Result<u64, ProviderError> {
        Ok(self.state.lock().pending_nonce.get(&address).copied().unwrap_or(0))
    }

    async fn send_raw_transaction(&self, raw: &Bytes) -> Result<B256, ProviderError> {
        let mut state = self.state.lock();
        state.sent.push(raw.clone());
        Ok(alloy_primitives::keccak256(raw))
    }

    async fn suggest_gas_price(&self) -> Result<u128, ProviderError> {
        Ok(self.state.lock().gas_price)
    }

    async fn max_priority_fee_per_gas(&self) -> Result<u128, ProviderError> {
        Ok(self.state.lock().priority_fee)
    }

    async fn fee_history(&self, block_count: u64, _newest_block: BlockNumberOrTag, _reward_percentiles: &[f64]) -> Result<FeeHistory, ProviderError> {
        let state = self.state.lock();
        let mut fees = state.base_fee_history.clone();
        if fees.is_empty() {
            fees = vec![state.gas_price; (block_count + 1) as usize];
        }
        Ok(FeeHistory { base_fee_per_gas: fees, gas_used_ratio: Vec::new(), reward: None })
    }

    async fn subscribe_new_heads(&self) -> Result<BoxStream<'static, Header>, ProviderError> {
        let rx = self.new_heads.subscribe();
        Ok(BroadcastStream::new(rx).filter_map(|r| async move { r.ok() }).boxed())
    }

    async fn subscribe_pending_transactions(&self) -> Result<BoxStream<'static, B256>, ProviderError> {
        let rx = self.pending_txs.subscribe();
        Ok(BroadcastStream::new(rx).filter_map(|r| async move { r.ok() }).boxed())
    }
}
