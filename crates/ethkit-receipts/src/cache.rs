//! The past-receipts cache (spec §3, §4.2, §8 invariant 8): a hash-keyed LRU
//! populated on every successful RPC receipt fetch, also indexable by block
//! number so a reorg's retraction sweep can find and evict the receipts of a
//! removed block.

use std::collections::HashMap;

use alloy_primitives::B256;
use ethkit_primitives::TransactionReceipt;
use lru::LruCache;

pub struct ReceiptCache {
    by_hash: LruCache<B256, TransactionReceipt>,
    by_block: HashMap<u64, Vec<B256>>
}

impl ReceiptCache {
    pub fn new(capacity: usize) -> Self {
        let capacity = std::num::NonZeroUsize::new(capacity).unwrap_or(std::num::NonZeroUsize::new(1).unwrap());
        Self { by_hash: LruCache::new(capacity), by_block: HashMap::new() }
    }

    pub fn get(&mut self, hash: &B256) -> Option<TransactionReceipt> {
        self.by_hash.get(hash).cloned()
    }

    pub fn insert(&mut self, receipt: TransactionReceipt) {
        if let Some(number) = receipt.block_number {
            self.by_block.entry(number).or_default().push(receipt.transaction_hash);
        }
        self.by_hash.put(receipt.transaction_hash, receipt);
        metrics::gauge!("ethkit_receipts_cache_len", self.by_hash.len() as f64);
    }

    /// Evicts every cached receipt belonging to a block that was reorged
    /// away, since the cache's content must track the canonical chain.
    pub fn evict_block(&mut self, number: u64) {
        if let Some(hashes) = self.by_block.remove(&number) {
            for hash in hashes {
                self.by_hash.pop(&hash);
            }
        }
    }

    /// Tests `predicate` against every cached receipt, oldest access order
    /// unspecified — used for `SearchCache(true)` at subscribe time.
    pub fn find(&self, mut predicate: impl FnMut(&TransactionReceipt) -> bool) -> Vec<TransactionReceipt> {
        self.by_hash.iter().filter(|(_, r)| predicate(r)).map(|(_, r)| r.clone()).collect()
    }
}

#[cfg(test)]
mod tests {
    use alloy_primitives::{Address, B256};

    use super::*;

    fn receipt(hash: u8, block: u64) -> TransactionReceipt {
        TransactionReceipt {
            transaction_hash: B256::repeat_byte(hash),
            transaction_index: Some(0),
            block_hash: Some(B256::repeat_byte(block as u8)),
            block_number: Some(block),
            from: Address::ZERO,
            to: None,
            contract_address: None,
            status: true,
            gas_used: 21000,
            cumulative_gas_used: 21000,
            effective_gas_price: 1,
            logs: Vec::new()
        }
    }

    #[test]
    fn evicts_by_block_number() {
        let mut cache = ReceiptCache::new(16);
        cache.insert(receipt(1, 10));
        cache.insert(receipt(2, 10));
        cache.insert(receipt(3, 11));
        cache.evict_block(10);
        assert!(cache.get(&B256::repeat_byte(1)).is_none());
        assert!(cache.get(&B256::repeat_byte(2)).is_none());
        assert!(cache.get(&B256::repeat_byte(3)).is_some());
    }
}
