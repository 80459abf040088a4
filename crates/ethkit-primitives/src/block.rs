//! Canonical block/transaction/log/receipt data model (spec §3).
//!
//! These types are transport-agnostic: they are populated by a `ChainApi`
//! implementation (see `ethkit-provider`) from whatever wire format the
//! collaborator speaks, and consumed by the monitor/listener/finalizer
//! without any further dependency on the RPC crate's exact field layout.

use alloy_primitives::{Address, Bloom, Bytes, B256, U256};

/// One on-chain log entry, already decoded from the RPC wire format.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Log {
    pub address: Address,
    pub topics: Vec<B256>,
    pub data: Bytes,
    pub block_hash: Option<B256>,
    pub block_number: Option<u64>,
    pub transaction_hash: Option<B256>,
    pub log_index: Option<u64>,
    pub removed: bool
}

/// A mined transaction's receipt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransactionReceipt {
    pub transaction_hash: B256,
    pub transaction_index: Option<u64>,
    pub block_hash: Option<B256>,
    pub block_number: Option<u64>,
    pub from: Address,
    pub to: Option<Address>,
    pub contract_address: Option<Address>,
    pub status: bool,
    pub gas_used: u64,
    pub cumulative_gas_used: u64,
    pub effective_gas_price: u128,
    pub logs: Vec<Log>
}

/// A transaction as it appears inside a fetched block body. Carries enough
/// of the uniform polymorphic-transaction read interface (spec §9) for
/// filter matching; the Finalizer works with its own `UnsignedTx`/`SignedTx`
/// (see [`crate::tx`]) when it needs to rebuild one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlockTransaction {
    pub hash: B256,
    pub nonce: u64,
    pub from: Address,
    pub to: Option<Address>,
    pub value: U256,
    pub input: Bytes,
    pub gas: u64,
    pub gas_price: Option<u128>,
    pub max_fee_per_gas: Option<u128>,
    pub max_priority_fee_per_gas: Option<u128>
}

/// Block header fields the core cares about.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Header {
    pub hash: B256,
    pub parent_hash: B256,
    pub number: u64,
    pub timestamp: u64,
    pub logs_bloom: Bloom,
    pub base_fee_per_gas: Option<u64>
}

/// Canonical block value (spec §3): header, body, derived receipts, derived
/// logs. `receipts`/`logs` are `None` until augmentation completes (see
/// `WithLogs` in the monitor config and the `ok` flag on [`BlockEvent`]).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChainBlock {
    pub header: Header,
    pub transactions: Vec<BlockTransaction>,
    pub receipts: Option<Vec<TransactionReceipt>>,
    pub logs: Option<Vec<Log>>
}

impl ChainBlock {
    pub fn hash(&self) -> B256 {
        self.header.hash
    }

    pub fn parent_hash(&self) -> B256 {
        self.header.parent_hash
    }

    pub fn number(&self) -> u64 {
        self.header.number
    }
}

/// Role a [`ChainBlock`] plays in the current emission (spec §3).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    Added,
    Removed
}

/// The monitor's emission unit: one block tagged with its role plus whether
/// its auxiliary data (logs/receipts) has finished fetching.
#[derive(Debug, Clone)]
pub struct BlockEvent {
    pub kind: EventKind,
    pub block: ChainBlock,
    /// `false` while auxiliary data (logs) is still being fetched; such a
    /// block is provisional and may be re-emitted as `Added` once
    /// augmentation completes (spec §4.1 step 6).
    pub ok: bool
}

impl BlockEvent {
    pub fn added(block: ChainBlock, ok: bool) -> Self {
        Self { kind: EventKind::Added, block, ok }
    }

    pub fn removed(block: ChainBlock) -> Self {
        Self { kind: EventKind::Removed, block, ok: true }
    }
}

/// A batch of block events as emitted by one poll tick (spec §3: "Event /
/// Blocks batch"). Removed entries appear tip-downward, followed by Added
/// entries ascending (spec §4.1 step 5).
pub type BlockEventBatch = Vec<BlockEvent>;
