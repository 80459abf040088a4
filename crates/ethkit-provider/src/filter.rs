use alloy_eips::BlockNumberOrTag;
use alloy_primitives::{Address, B256};

/// A transport-agnostic `eth_getLogs` filter. Kept distinct from
/// `alloy_rpc_types_eth::Filter` so the `ChainApi` trait doesn't force every
/// implementation (including test mocks) to depend on the exact wire type.
#[derive(Debug, Clone, Default)]
pub struct LogFilter {
    pub from_block: Option<BlockNumberOrTag>,
    pub to_block: Option<BlockNumberOrTag>,
    pub address: Vec<Address>,
    /// Up to four topic slots; `None` means "any" at that position, an empty
    /// inner `Vec` would mean "none" and is never constructed by this crate.
    pub topics: [Option<Vec<B256>>; 4]
}

impl LogFilter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn at_block(number: u64) -> Self {
        Self {
            from_block: Some(BlockNumberOrTag::Number(number)),
            to_block: Some(BlockNumberOrTag::Number(number)),
            ..Default::default()
        }
    }

    pub fn address(mut self, address: Address) -> Self {
        self.address.push(address);
        self
    }

    pub fn topic0(mut self, topics: Vec<B256>) -> Self {
        self.topics[0] = Some(topics);
        self
    }
}

/// Response to `eth_feeHistory`, trimmed to the fields the Finalizer's fee
/// policy needs (spec §4.3).
#[derive(Debug, Clone, Default)]
pub struct FeeHistory {
    pub base_fee_per_gas: Vec<u128>,
    pub gas_used_ratio: Vec<f64>,
    pub reward: Option<Vec<Vec<u128>>>
}

impl FeeHistory {
    /// The base fee for the block *after* the newest block in this history,
    /// which is what a sender wants to price against.
    pub fn next_base_fee(&self) -> Option<u128> {
        self.base_fee_per_gas.last().copied()
    }
}
