//! The Receipt Listener actor (spec §4.2): consumes a Chain Monitor's block
//! event stream, matches in-flight filters against new blocks, holds matches
//! until finality, and retracts held matches whose block is reorged away.
//! Structurally this follows the same single-task-owns-its-state shape as
//! [`ethkit_monitor::ChainMonitor`] (command channel + event stream consumed
//! inside one `tokio::select!` loop).

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use alloy_primitives::B256;
use ethkit_primitives::{BlockEventBatch, ChainBlock, EventKind, Subscription, TransactionReceipt};
use ethkit_provider::ChainApi;
use tokio::sync::{mpsc, oneshot};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::cache::ReceiptCache;
use crate::config::ListenerConfig;
use crate::error::ListenerError;
use crate::filter::FilterQuery;

/// One surfaced match: which filter produced it and the matched receipt.
#[derive(Debug, Clone)]
pub struct ReceiptMatch {
    pub filter_id: u64,
    pub receipt: TransactionReceipt
}

struct PendingFilter {
    id: u64,
    subscriber: u64,
    query: FilterQuery,
    entered_at_block: u64
}

struct HeldMatch {
    filter_id: u64,
    subscriber: u64,
    block_number: u64,
    ready_at: u64,
    receipt: TransactionReceipt
}

struct SubscriberState {
    tx: mpsc::Sender<ReceiptMatch>,
    done_tx: Option<oneshot::Sender<()>>,
    filter_ids: std::collections::HashSet<u64>
}

enum Command {
    Subscribe(Vec<FilterQuery>, oneshot::Sender<(u64, Vec<u64>, mpsc::Receiver<ReceiptMatch>, oneshot::Receiver<()>)>),
    AddFilter(u64, FilterQuery, oneshot::Sender<Option<u64>>)
}

/// A handle to a running [`ReceiptListener`] task.
#[derive(Clone)]
pub struct ListenerHandle {
    commands: mpsc::Sender<Command>,
    cancel: CancellationToken
}

impl ListenerHandle {
    /// Idempotent; cancels the listener's internal token and returns once the
    /// poller has observed it. Repeated calls after the first are no-ops.
    pub fn stop(&self) {
        self.cancel.cancel();
    }

    pub async fn subscribe(&self, filters: Vec<FilterQuery>) -> Result<ReceiptSubscription, ListenerError> {
        let (tx, rx) = oneshot::channel();
        self.commands.send(Command::Subscribe(filters, tx)).await.map_err(|_| ListenerError::Cancelled)?;
        let (subscriber, filter_ids, matches, done) = rx.await.map_err(|_| ListenerError::Cancelled)?;
        Ok(ReceiptSubscription { subscriber, filter_ids, matches, done, handle: self.clone() })
    }

    pub async fn add_filter(&self, subscriber: u64, filter: FilterQuery) -> Result<u64, ListenerError> {
        let (tx, rx) = oneshot::channel();
        self.commands.send(Command::AddFilter(subscriber, filter, tx)).await.map_err(|_| ListenerError::Cancelled)?;
        rx.await.map_err(|_| ListenerError::Cancelled)?.ok_or(ListenerError::NotFound)
    }

    /// One-shot convenience wrapping `subscribe` with a single `limit_one`
    /// filter, returning `NotFound` if `ctx_timeout` elapses first (spec
    /// §4.2 `FetchTransactionReceiptWithFilter`).
    pub async fn fetch_transaction_receipt_with_filter(&self, filter: FilterQuery, ctx_timeout: Duration) -> Result<TransactionReceipt, ListenerError> {
        let mut sub = self.subscribe(vec![filter.limit_one(true)]).await?;
        match tokio::time::timeout(ctx_timeout, sub.recv()).await {
            Ok(Some(m)) => Ok(m.receipt),
            _ => Err(ListenerError::NotFound)
        }
    }
}

/// A subscriber's view: a receipt-match channel, a `Done()` signal fired
/// only once every one of its filters has matched (when `limit_one`) or
/// expired, and the ability to add further filters later.
pub struct ReceiptSubscription {
    subscriber: u64,
    pub filter_ids: Vec<u64>,
    matches: mpsc::Receiver<ReceiptMatch>,
    done: oneshot::Receiver<()>,
    handle: ListenerHandle
}

impl ReceiptSubscription {
    pub async fn recv(&mut self) -> Option<ReceiptMatch> {
        self.matches.recv().await
    }

    pub async fn done(&mut self) {
        let _ = (&mut self.done).await;
    }

    pub async fn add_filter(&mut self, filter: FilterQuery) -> Result<u64, ListenerError> {
        let id = self.handle.add_filter(self.subscriber, filter).await?;
        self.filter_ids.push(id);
        Ok(id)
    }
}

/// The Receipt Listener (spec §4.2). Owns its filter set, held-match queue,
/// and past-receipts cache; spawned via [`ReceiptListener::spawn`].
pub struct ReceiptListener<C: ChainApi> {
    api: Arc<C>,
    config: ListenerConfig,
    cache: ReceiptCache,
    filters: Vec<PendingFilter>,
    held: Vec<HeldMatch>,
    subscribers: HashMap<u64, SubscriberState>,
    next_filter_id: u64,
    next_subscriber_id: u64,
    tip: u64,
    started: Arc<AtomicBool>
}

impl<C: ChainApi> ReceiptListener<C> {
    pub fn new(api: Arc<C>, config: ListenerConfig) -> Self {
        let cache = ReceiptCache::new(config.past_receipts_cache_size);
        Self {
            api,
            config,
            cache,
            filters: Vec::new(),
            held: Vec::new(),
            subscribers: HashMap::new(),
            next_filter_id: 0,
            next_subscriber_id: 0,
            tip: 0,
            started: Arc::new(AtomicBool::new(false))
        }
    }

    /// Spawns the listener loop, consuming `block_events` (typically a
    /// [`ethkit_monitor::MonitorHandle::subscribe`] subscription).
    pub fn spawn(mut self, mut block_events: Subscription<BlockEventBatch>) -> Result<ListenerHandle, ListenerError> {
        if self.started.swap(true, Ordering::SeqCst) {
            return Err(ListenerError::AlreadyStarted)
        }
        let (commands, mut command_rx) = mpsc::channel(128);
        let cancel = CancellationToken::new();
        let task_cancel = cancel.clone();

        tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = task_cancel.cancelled() => {
                        debug!("receipt listener stopped");
                        break
                    }
                    batch = block_events.recv() => {
                        match batch {
                            Some(batch) => self.on_batch(batch).await,
                            None => {
                                debug!("receipt listener's block event stream ended");
                                break
                            }
                        }
                    }
                    Some(command) = command_rx.recv() => {
                        self.on_command(command);
                    }
                }
            }
        });

        Ok(ListenerHandle { commands, cancel })
    }

    fn on_command(&mut self, command: Command) {
        match command {
            Command::Subscribe(queries, reply) => {
                let subscriber_id = self.next_subscriber_id;
                self.next_subscriber_id += 1;
                let (tx, rx) = mpsc::channel(self.config.subscription_buffer);
                let (done_tx, done_rx) = oneshot::channel();
                let mut filter_ids = Vec::new();
                let mut state = SubscriberState { tx: tx.clone(), done_tx: Some(done_tx), filter_ids: std::collections::HashSet::new() };
                for query in queries {
                    let id = self.register_filter(subscriber_id, query, &tx);
                    filter_ids.push(id);
                    state.filter_ids.insert(id);
                }
                self.subscribers.insert(subscriber_id, state);
                let _ = reply.send((subscriber_id, filter_ids, rx, done_rx));
            }
            Command::AddFilter(subscriber_id, query, reply) => {
                let tx = self.subscribers.get(&subscriber_id).map(|s| s.tx.clone());
                let id = tx.map(|tx| {
                    let id = self.register_filter(subscriber_id, query, &tx);
                    if let Some(state) = self.subscribers.get_mut(&subscriber_id) {
                        state.filter_ids.insert(id);
                    }
                    id
                });
                let _ = reply.send(id);
            }
        }
    }

    fn register_filter(&mut self, subscriber: u64, query: FilterQuery, _tx: &mpsc::Sender<ReceiptMatch>) -> u64 {
        let id = self.next_filter_id;
        self.next_filter_id += 1;
        if query.search_cache {
            let matches = self.cache.find(|r| query.matches_receipt(r));
            for receipt in matches {
                self.deliver_or_hold(id, subscriber, &query, receipt);
            }
        }
        self.filters.push(PendingFilter { id, subscriber, query, entered_at_block: self.tip });
        id
    }

    async fn on_batch(&mut self, batch: BlockEventBatch) {
        for event in &batch {
            match event.kind {
                EventKind::Added => self.handle_added(&event.block, event.ok).await,
                EventKind::Removed => self.handle_removed(&event.block)
            }
        }
        if let Some(last) = batch.iter().rev().find(|e| e.kind == EventKind::Added) {
            self.tip = self.tip.max(last.block.number());
        }
        self.release_finalized();
        self.expire_stale_filters();
    }

    async fn handle_added(&mut self, block: &ChainBlock, ok: bool) {
        self.tip = self.tip.max(block.number());
        let candidates: Vec<(u64, u64, FilterQuery)> =
            self.filters.iter().filter(|f| ok || !f.query.needs_logs()).map(|f| (f.id, f.subscriber, f.query.clone())).collect();

        for (filter_id, subscriber, query) in candidates {
            for tx in &block.transactions {
                if !query.matches_hash(tx.hash) {
                    continue
                }
                let receipt = match self.fetch_receipt(tx.hash).await {
                    Some(r) => r,
                    None => continue
                };
                if !query.matches_receipt(&receipt) {
                    continue
                }
                self.deliver_or_hold(filter_id, subscriber, &query, receipt);
            }
        }
    }

    fn handle_removed(&mut self, block: &ChainBlock) {
        self.cache.evict_block(block.number());
        let before = self.held.len();
        self.held.retain(|h| h.block_number != block.number());
        if self.held.len() != before {
            debug!(number = block.number(), "retracted held receipt match on removed block, no event emitted");
        }
    }

    async fn fetch_receipt(&mut self, hash: B256) -> Option<TransactionReceipt> {
        if let Some(receipt) = self.cache.get(&hash) {
            return Some(receipt)
        }
        match self.api.transaction_receipt(hash).await {
            Ok(Some(receipt)) => {
                self.cache.insert(receipt.clone());
                Some(receipt)
            }
            Ok(None) => None,
            Err(err) => {
                warn!(error = %err, "failed to fetch transaction receipt");
                None
            }
        }
    }

    fn deliver_or_hold(&mut self, filter_id: u64, subscriber: u64, query: &FilterQuery, receipt: TransactionReceipt) {
        let block_number = receipt.block_number.unwrap_or(self.tip);
        if query.finalize {
            self.held.push(HeldMatch { filter_id, subscriber, block_number, ready_at: block_number + self.config.num_blocks_to_finality, receipt });
        } else {
            self.publish(filter_id, subscriber, receipt);
        }
        if query.limit_one {
            self.filters.retain(|f| f.id != filter_id);
        }
    }

    fn release_finalized(&mut self) {
        let (ready, pending): (Vec<_>, Vec<_>) = std::mem::take(&mut self.held).into_iter().partition(|h| h.ready_at <= self.tip);
        self.held = pending;
        for held in ready {
            self.publish(held.filter_id, held.subscriber, held.receipt);
        }
    }

    fn publish(&mut self, filter_id: u64, subscriber: u64, receipt: TransactionReceipt) {
        let mut drop_subscriber = false;
        if let Some(state) = self.subscribers.get_mut(&subscriber) {
            if state.tx.try_send(ReceiptMatch { filter_id, receipt }).is_err() {
                drop_subscriber = true;
            }
        }
        if drop_subscriber {
            self.remove_subscriber(subscriber);
        } else {
            metrics::counter!("ethkit_receipts_matches_delivered_total", 1);
        }
    }

    fn expire_stale_filters(&mut self) {
        let tip = self.tip;
        let mut expired_by_subscriber: HashMap<u64, Vec<u64>> = HashMap::new();
        self.filters.retain(|f| {
            let budget = f.query.max_wait.unwrap_or(self.config.filter_max_wait_num_blocks);
            let expired = budget != 0 && tip.saturating_sub(f.entered_at_block) > budget;
            if expired {
                expired_by_subscriber.entry(f.subscriber).or_default().push(f.id);
            }
            !expired
        });
        for (subscriber, ids) in expired_by_subscriber {
            if let Some(state) = self.subscribers.get_mut(&subscriber) {
                for id in ids {
                    state.filter_ids.remove(&id);
                }
                if state.filter_ids.is_empty() {
                    if let Some(done_tx) = state.done_tx.take() {
                        let _ = done_tx.send(());
                    }
                }
            }
        }
    }

    fn remove_subscriber(&mut self, subscriber: u64) {
        self.subscribers.remove(&subscriber);
        self.filters.retain(|f| f.subscriber != subscriber);
    }
}
