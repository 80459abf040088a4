use std::time::Duration;

/// Chain Monitor configuration (spec §4.1, ENUMERATED).
#[derive(Debug, Clone)]
pub struct MonitorConfig {
    /// Minimum delay between head polls.
    pub polling_interval: Duration,
    /// Starting block; `None` means track the current head.
    pub start_block_number: Option<u64>,
    /// Maximum buffer depth; governs the deepest reorg the monitor can
    /// resolve without falling back to a deep-reorg rebuild.
    pub block_retention_limit: usize,
    /// If true, fetch `eth_getLogs` per block and attach to the block.
    pub with_logs: bool,
    /// If set, lag emission this many blocks behind the remote head.
    pub trail_num_blocks_behind_head: Option<u64>,
    pub debug_logging: bool,
    /// Per-subscriber bounded channel capacity (spec §5 default 1024).
    pub subscription_buffer: usize
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            polling_interval: Duration::from_secs(1),
            start_block_number: None,
            block_retention_limit: 64,
            with_logs: false,
            trail_num_blocks_behind_head: None,
            debug_logging: false,
            subscription_buffer: 1024
        }
    }
}

impl MonitorConfig {
    pub fn with_polling_interval(mut self, interval: Duration) -> Self {
        self.polling_interval = interval;
        self
    }

    pub fn with_start_block_number(mut self, number: u64) -> Self {
        self.start_block_number = Some(number);
        self
    }

    pub fn with_block_retention_limit(mut self, limit: usize) -> Self {
        self.block_retention_limit = limit.max(1);
        self
    }

    pub fn with_logs(mut self, enabled: bool) -> Self {
        self.with_logs = enabled;
        self
    }

    pub fn with_trail_num_blocks_behind_head(mut self, blocks: u64) -> Self {
        self.trail_num_blocks_behind_head = Some(blocks);
        self
    }

    pub fn with_debug_logging(mut self, enabled: bool) -> Self {
        self.debug_logging = enabled;
        self
    }
}
