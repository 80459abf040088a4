use std::sync::Arc;
use std::time::Duration;

/// Information passed to the `on_stuck`/`on_unstuck` callbacks: the lowest
/// unmined nonce and how long its earliest-seen attempt has been pending.
#[derive(Debug, Clone, Copy)]
pub struct StuckInfo {
    pub nonce: u64,
    pub pending_for: Duration
}

pub type StuckCallback = Arc<dyn Fn(StuckInfo) + Send + Sync>;

/// Finalizer configuration (spec §4.3, ENUMERATED).
#[derive(Clone)]
pub struct FinalizerConfig {
    pub poll_interval: Duration,
    pub poll_timeout: Duration,
    /// Minimum age (from latest-seen timestamp) before a transaction is
    /// considered stuck and eligible for resend/replacement.
    pub retry_delay: Duration,
    /// Percent headroom added on top of estimated gas prices.
    pub fee_margin_pct: u32,
    /// Percent minimum increase required to replace an existing transaction.
    pub price_bump_pct: u32,
    pub nonce_stuck_timeout: Duration,
    pub transaction_stuck_timeout: Duration,
    pub subscription_buffer: usize,
    pub on_stuck: Option<StuckCallback>,
    pub on_unstuck: Option<StuckCallback>
}

impl std::fmt::Debug for FinalizerConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FinalizerConfig")
            .field("poll_interval", &self.poll_interval)
            .field("poll_timeout", &self.poll_timeout)
            .field("retry_delay", &self.retry_delay)
            .field("fee_margin_pct", &self.fee_margin_pct)
            .field("price_bump_pct", &self.price_bump_pct)
            .field("nonce_stuck_timeout", &self.nonce_stuck_timeout)
            .field("transaction_stuck_timeout", &self.transaction_stuck_timeout)
            .field("subscription_buffer", &self.subscription_buffer)
            .finish_non_exhaustive()
    }
}

impl Default for FinalizerConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(4),
            poll_timeout: Duration::from_secs(10),
            retry_delay: Duration::from_secs(60),
            fee_margin_pct: 20,
            price_bump_pct: 10,
            nonce_stuck_timeout: Duration::from_secs(300),
            transaction_stuck_timeout: Duration::from_secs(300),
            subscription_buffer: 1024,
            on_stuck: None,
            on_unstuck: None
        }
    }
}

impl FinalizerConfig {
    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    pub fn with_poll_timeout(mut self, timeout: Duration) -> Self {
        self.poll_timeout = timeout;
        self
    }

    pub fn with_retry_delay(mut self, delay: Duration) -> Self {
        self.retry_delay = delay;
        self
    }

    pub fn with_fee_margin_pct(mut self, margin: u32) -> Self {
        self.fee_margin_pct = margin;
        self
    }

    pub fn with_price_bump_pct(mut self, bump: u32) -> Self {
        self.price_bump_pct = bump.max(10);
        self
    }

    pub fn with_nonce_stuck_timeout(mut self, timeout: Duration) -> Self {
        self.nonce_stuck_timeout = timeout;
        self
    }

    pub fn with_transaction_stuck_timeout(mut self, timeout: Duration) -> Self {
        self.transaction_stuck_timeout = timeout;
        self
    }

    pub fn with_on_stuck(mut self, callback: impl Fn(StuckInfo) + Send + Sync + 'static) -> Self {
        self.on_stuck = Some(Arc::new(callback));
        self
    }

    pub fn with_on_unstuck(mut self, callback: impl Fn(StuckInfo) + Send + Sync + 'static) -> Self {
        self.on_unstuck = Some(Arc::new(callback));
        self
    }
}
