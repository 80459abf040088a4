//! Filter query and policies a subscriber attaches to the Receipt Listener
//! (spec §4.2: "Filter policies").

use alloy_primitives::{Address, B256};
use ethkit_primitives::TransactionReceipt;

/// A user-supplied log predicate, checked only once a matched transaction's
/// full receipt (and therefore its logs) is available.
pub type LogPredicate = std::sync::Arc<dyn Fn(&TransactionReceipt) -> bool + Send + Sync>;

/// One filter query plus its policies (spec §4.2 ENUMERATED + policies).
#[derive(Clone)]
pub struct FilterQuery {
    pub transaction_hash: Option<B256>,
    pub address: Vec<Address>,
    pub topics: [Option<Vec<B256>>; 4],
    pub predicate: Option<LogPredicate>,
    /// Subscription slot is freed after the first match.
    pub limit_one: bool,
    /// Drop the filter after this many blocks past subscribe time with no
    /// match. `None` means "use the listener's configured
    /// `FilterMaxWaitNumBlocks` default"; `Some(0)` means never drop — these
    /// are distinct per spec §4.2, not the same sentinel.
    pub max_wait: Option<u64>,
    /// Also test against the past-receipts cache at subscribe time.
    pub search_cache: bool,
    /// Hold a match until finality depth is reached (implicit default true).
    pub finalize: bool
}

impl Default for FilterQuery {
    fn default() -> Self {
        Self {
            transaction_hash: None,
            address: Vec::new(),
            topics: [None, None, None, None],
            predicate: None,
            limit_one: false,
            max_wait: None,
            search_cache: false,
            finalize: true
        }
    }
}

impl FilterQuery {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn transaction_hash(mut self, hash: B256) -> Self {
        self.transaction_hash = Some(hash);
        self
    }

    pub fn address(mut self, address: Address) -> Self {
        self.address.push(address);
        self
    }

    pub fn topic0(mut self, topics: Vec<B256>) -> Self {
        self.topics[0] = Some(topics);
        self
    }

    pub fn predicate(mut self, predicate: impl Fn(&TransactionReceipt) -> bool + Send + Sync + 'static) -> Self {
        self.predicate = Some(std::sync::Arc::new(predicate));
        self
    }

    pub fn limit_one(mut self, enabled: bool) -> Self {
        self.limit_one = enabled;
        self
    }

    /// `0` means never drop this filter (spec §4.2); any other value is the
    /// filter's own wait budget, overriding `FilterMaxWaitNumBlocks`.
    pub fn max_wait(mut self, blocks: u64) -> Self {
        self.max_wait = Some(blocks);
        self
    }

    pub fn search_cache(mut self, enabled: bool) -> Self {
        self.search_cache = enabled;
        self
    }

    pub fn finalize(mut self, enabled: bool) -> Self {
        self.finalize = enabled;
        self
    }

    /// Cheap pre-check against fields known without a full receipt (spec
    /// §4.2 step 1's "hash equality, topic set" pass over a block body tx).
    pub fn matches_hash(&self, hash: B256) -> bool {
        self.transaction_hash.map_or(true, |h| h == hash)
    }

    /// Full predicate over a fetched receipt: address/topic filters plus any
    /// user log predicate.
    pub fn matches_receipt(&self, receipt: &TransactionReceipt) -> bool {
        if let Some(expected) = self.transaction_hash {
            if expected != receipt.transaction_hash {
                return false
            }
        }
        if !self.address.is_empty() {
            let hit = receipt.logs.iter().any(|log| self.address.contains(&log.address)) || receipt.to.is_some_and(|to| self.address.contains(&to));
            if !hit {
                return false
            }
        }
        if self.topics.iter().any(Option::is_some) {
            let topic_hit = receipt.logs.iter().any(|log| self.log_matches_topics(log));
            if !topic_hit {
                return false
            }
        }
        self.predicate.as_ref().map_or(true, |p| p(receipt))
    }

    fn log_matches_topics(&self, log: &ethkit_primitives::Log) -> bool {
        self.topics.iter().enumerate().all(|(i, wanted)| match wanted {
            None => true,
            Some(set) => log.topics.get(i).is_some_and(|t| set.contains(t))
        })
    }

    /// Whether this filter depends on logs at all; if not, it can be fully
    /// evaluated against a provisional (`ok=false`) block.
    pub fn needs_logs(&self) -> bool {
        !self.address.is_empty() || self.topics.iter().any(Option::is_some) || self.predicate.is_some()
    }
}
