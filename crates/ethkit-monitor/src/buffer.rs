use std::collections::VecDeque;

use alloy_primitives::B256;
use ethkit_primitives::ChainBlock;

use crate::error::MonitorError;

/// Block Chain Buffer (spec §3, §8 invariant 1): an ordered, ascending
/// sequence of [`ChainBlock`]s capped at `retention`, oldest evicted first.
/// Mutated only by the monitor's single poll-loop task.
#[derive(Debug, Default)]
pub struct ChainBuffer {
    retention: usize,
    blocks: VecDeque<ChainBlock>
}

impl ChainBuffer {
    pub fn new(retention: usize) -> Self {
        Self { retention: retention.max(1), blocks: VecDeque::new() }
    }

    pub fn tip(&self) -> Option<&ChainBlock> {
        self.blocks.back()
    }

    pub fn len(&self) -> usize {
        self.blocks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }

    pub fn snapshot(&self) -> Vec<ChainBlock> {
        self.blocks.iter().cloned().collect()
    }

    pub fn get_by_number(&self, number: u64) -> Option<&ChainBlock> {
        self.blocks.iter().find(|b| b.number() == number)
    }

    pub fn index_of_hash(&self, hash: B256) -> Option<usize> {
        self.blocks.iter().position(|b| b.hash() == hash)
    }

    pub fn contains_hash_at(&self, number: u64, hash: B256) -> bool {
        self.get_by_number(number).is_some_and(|b| b.hash() == hash)
    }

    /// Appends `block`, enforcing the parent-linkage and monotonic-number
    /// invariants (spec §3, §8 invariant 1). Evicts from the oldest end once
    /// over `retention` (spec §4.1 step 7).
    pub fn push(&mut self, block: ChainBlock) -> Result<(), MonitorError> {
        if let Some(tip) = self.tip() {
            if block.parent_hash() != tip.hash() {
                return Err(MonitorError::Invariant(format!(
                    "block {} parent {:#x} does not match buffer tip hash {:#x}",
                    block.number(),
                    block.parent_hash(),
                    tip.hash()
                )))
            }
            if block.number() != tip.number() + 1 {
                return Err(MonitorError::Invariant(format!("block number {} is not tip+1 ({})", block.number(), tip.number() + 1)))
            }
        }
        self.blocks.push_back(block);
        while self.blocks.len() > self.retention {
            self.blocks.pop_front();
        }
        Ok(())
    }

    /// Removes and returns every block strictly above `idx`, tip-down
    /// (descending by number) — the order spec §4.1 step 5 requires for
    /// `Removed` emission.
    pub fn truncate_after(&mut self, idx: usize) -> Vec<ChainBlock> {
        let mut removed: Vec<ChainBlock> = self.blocks.split_off(idx + 1).into_iter().collect();
        removed.reverse();
        removed
    }

    /// Empties the buffer, returning its former contents tip-down — used for
    /// the deep-reorg-exceeding-retention path (spec §4.1 tie-break, S3).
    pub fn clear_and_return(&mut self) -> Vec<ChainBlock> {
        let mut removed: Vec<ChainBlock> = self.blocks.drain(..).collect();
        removed.reverse();
        removed
    }

    /// Replaces the stored block with the same (number, hash) with `block`
    /// — used when augmentation (e.g. logs) finishes after the provisional
    /// `ok=false` emission. Returns `false` if the block is no longer
    /// present (it was reorged away before augmentation completed).
    pub fn update_in_place(&mut self, block: ChainBlock) -> bool {
        if let Some(slot) = self.blocks.iter_mut().find(|b| b.number() == block.number() && b.hash() == block.hash()) {
            *slot = block;
            true
        } else {
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use alloy_primitives::B256;
    use ethkit_primitives::Header;

    use super::*;

    fn block(number: u64, hash: u8, parent_hash: u8) -> ChainBlock {
        ChainBlock {
            header: Header {
                hash: B256::repeat_byte(hash),
                parent_hash: B256::repeat_byte(parent_hash),
                number,
                timestamp: number,
                logs_bloom: Default::default(),
                base_fee_per_gas: None
            },
            transactions: Vec::new(),
            receipts: None,
            logs: None
        }
    }

    #[test]
    fn rejects_broken_parent_linkage() {
        let mut buffer = ChainBuffer::new(10);
        buffer.push(block(1, 1, 0)).unwrap();
        let err = buffer.push(block(2, 2, 99)).unwrap_err();
        assert!(matches!(err, MonitorError::Invariant(_)));
    }

    #[test]
    fn evicts_oldest_past_retention() {
        let mut buffer = ChainBuffer::new(2);
        buffer.push(block(1, 1, 0)).unwrap();
        buffer.push(block(2, 2, 1)).unwrap();
        buffer.push(block(3, 3, 2)).unwrap();
        assert_eq!(buffer.len(), 2);
        assert!(buffer.get_by_number(1).is_none());
        assert_eq!(buffer.tip().unwrap().number(), 3);
    }

    #[test]
    fn truncate_after_returns_tip_down() {
        let mut buffer = ChainBuffer::new(10);
        for n in 1..=4u64 {
            buffer.push(block(n, n as u8, (n - 1) as u8)).unwrap();
        }
        let removed = buffer.truncate_after(1); // keep blocks 1,2; remove 3,4
        assert_eq!(removed.iter().map(|b| b.number()).collect::<Vec<_>>(), vec![4, 3]);
        assert_eq!(buffer.len(), 2);
    }
}
