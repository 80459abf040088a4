/// Receipt Listener configuration (spec §4.2, ENUMERATED).
#[derive(Debug, Clone)]
pub struct ListenerConfig {
    /// Depth in blocks past a receipt's own block at which it is considered
    /// final and surfaced to subscribers.
    pub num_blocks_to_finality: u64,
    /// Default wait budget in blocks for a filter with no explicit `max_wait`.
    pub filter_max_wait_num_blocks: u64,
    /// Capacity of the past-receipts LRU used for `search_cache`.
    pub past_receipts_cache_size: usize,
    /// Per-subscriber bounded channel capacity.
    pub subscription_buffer: usize
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self { num_blocks_to_finality: 12, filter_max_wait_num_blocks: 256, past_receipts_cache_size: 4096, subscription_buffer: 256 }
    }
}

impl ListenerConfig {
    pub fn with_num_blocks_to_finality(mut self, blocks: u64) -> Self {
        self.num_blocks_to_finality = blocks;
        self
    }

    pub fn with_filter_max_wait_num_blocks(mut self, blocks: u64) -> Self {
        self.filter_max_wait_num_blocks = blocks;
        self
    }

    pub fn with_past_receipts_cache_size(mut self, size: usize) -> Self {
        self.past_receipts_cache_size = size.max(1);
        self
    }
}
