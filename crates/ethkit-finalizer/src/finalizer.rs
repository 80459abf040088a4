//! The Finalizer actor (spec §4.3): given a wallet and a chain, ensures
//! every submitted transaction is eventually mined regardless of reorgs,
//! nonce drift, fee spikes, or transient send failures.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

use alloy_eips::BlockNumberOrTag;
use alloy_primitives::B256;
use ethkit_primitives::{apply_margin_ceil, bumped_at_least, BlockEventBatch, EventKind, FanOut, SignedTx, Subscription, TxKind, UnsignedTx};
use ethkit_provider::ChainApi;
use ethkit_wallet::Wallet;
use tokio::sync::{mpsc, oneshot};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::clock::Clock;
use crate::config::{FinalizerConfig, StuckInfo};
use crate::error::FinalizerError;
use crate::mempool::{InMemoryMempool, MempoolEntry, MempoolStore};

/// A mining/reorg notification for one tracked transaction (spec §4.3
/// `Subscribe`).
#[derive(Debug, Clone)]
pub enum FinalizerEvent<M> {
    Added { tx: SignedTx, metadata: M },
    Removed { tx: SignedTx, metadata: M }
}

enum Command<M> {
    Subscribe(oneshot::Sender<Subscription<FinalizerEvent<M>>>)
}

#[derive(Clone)]
pub struct FinalizerHandle<M: Clone + Send + Sync + 'static> {
    commands: mpsc::Sender<Command<M>>,
    cancel: CancellationToken
}

impl<M: Clone + Send + Sync + 'static> FinalizerHandle<M> {
    pub async fn subscribe(&self) -> Result<Subscription<FinalizerEvent<M>>, FinalizerError> {
        let (tx, rx) = oneshot::channel();
        self.commands.send(Command::Subscribe(tx)).await.map_err(|_| FinalizerError::Cancelled)?;
        rx.await.map_err(|_| FinalizerError::Cancelled)
    }

    pub fn stop(&self) {
        self.cancel.cancel();
    }
}

/// Fee targets computed for the current chain state (spec §4.3 "Send fee
/// policy" and run-loop step 3).
#[derive(Debug, Clone, Copy, Default)]
struct FeeTarget {
    gas_price: Option<u128>,
    max_fee_per_gas: Option<u128>,
    max_priority_fee_per_gas: Option<u128>
}

pub struct Finalizer<C: ChainApi, W: Wallet, M: Clone + Send + Sync + 'static> {
    api: Arc<C>,
    wallet: Arc<W>,
    mempool: Arc<InMemoryMempool<M>>,
    config: FinalizerConfig,
    clock: Arc<dyn Clock>,
    events: FanOut<FinalizerEvent<M>>,
    send_lock: Arc<tokio::sync::Mutex<()>>,
    mined: std::collections::HashMap<u64, B256>,
    stuck: bool,
    started: Arc<AtomicBool>
}

impl<C: ChainApi, W: Wallet, M: Clone + Send + Sync + 'static> Finalizer<C, W, M> {
    pub fn new(api: Arc<C>, wallet: Arc<W>, config: FinalizerConfig) -> Self {
        let subscription_buffer = config.subscription_buffer;
        Self {
            api,
            wallet,
            mempool: Arc::new(InMemoryMempool::new()),
            config,
            clock: Arc::new(crate::clock::SystemClock),
            events: FanOut::new(subscription_buffer),
            send_lock: Arc::new(tokio::sync::Mutex::new(())),
            mined: std::collections::HashMap::new(),
            stuck: false,
            started: Arc::new(AtomicBool::new(false))
        }
    }

    /// Overrides the real clock, for deterministic `RetryDelay`/
    /// `NonceStuckTimeout` tests.
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn mempool(&self) -> Arc<InMemoryMempool<M>> {
        self.mempool.clone()
    }

    /// *Send* (spec §4.3): serialized nonce assignment, fee-clamped to never
    /// go below the caller's own values, signed, committed, transmitted.
    pub async fn send(&self, tx: UnsignedTx, metadata: M) -> Result<SignedTx, FinalizerError> {
        if tx.to.is_none() && tx.input.is_empty() {
            return Err(FinalizerError::Validation("contract-creation transaction must carry non-empty data".into()))
        }

        let _guard = self.send_lock.lock().await;

        let pending_nonce = self.api.pending_nonce(self.wallet.address()).await?;
        let nonce = self.mempool.nonce().max(pending_nonce);

        let target = self.fee_target(tx.kind).await?;
        let gas_price = match tx.gas_price {
            Some(user) => Some(user.max(target.gas_price.unwrap_or(user))),
            None => target.gas_price
        };
        let max_fee = match tx.max_fee_per_gas {
            Some(user) => Some(user.max(target.max_fee_per_gas.unwrap_or(user))),
            None => target.max_fee_per_gas
        };
        let max_tip = match tx.max_priority_fee_per_gas {
            Some(user) => Some(user.max(target.max_priority_fee_per_gas.unwrap_or(user))),
            None => target.max_priority_fee_per_gas
        };

        let prepared = tx.with_fees(nonce, gas_price, max_fee, max_tip);
        let signed = self.wallet.sign_transaction(prepared).await?;

        self.mempool.commit(signed.clone(), metadata, self.clock.now());
        self.api.send_raw_transaction(&signed.raw).await?;
        Ok(signed)
    }

    /// Fee targets under the current chain pricing (spec §4.3 "Send fee
    /// policy"): EIP-1559 `BaseFee*(1+margin)+PriorityFee` for 1559-priced
    /// kinds, `SuggestGasPrice*(1+margin)` otherwise.
    async fn fee_target(&self, kind: TxKind) -> Result<FeeTarget, FinalizerError> {
        if kind.is_eip1559_priced() {
            let history = self.api.fee_history(1, BlockNumberOrTag::Latest, &[]).await?;
            let base_fee = history.next_base_fee().unwrap_or_default();
            let priority_fee = self.api.max_priority_fee_per_gas().await?;
            let fee_cap = apply_margin_ceil(base_fee, self.config.fee_margin_pct) + priority_fee;
            Ok(FeeTarget { gas_price: None, max_fee_per_gas: Some(fee_cap), max_priority_fee_per_gas: Some(priority_fee) })
        } else {
            let suggested = self.api.suggest_gas_price().await?;
            let gas_price = apply_margin_ceil(suggested, self.config.fee_margin_pct);
            Ok(FeeTarget { gas_price: Some(gas_price), max_fee_per_gas: None, max_priority_fee_per_gas: None })
        }
    }

    /// Spawns the run loop (spec §4.3 `Run`), consuming block events from a
    /// monitor subscription for the diff-subscription mining/reorg signal.
    pub fn spawn(mut self, mut block_events: Subscription<BlockEventBatch>) -> Result<FinalizerHandle<M>, FinalizerError> {
        if self.started.swap(true, Ordering::SeqCst) {
            return Err(FinalizerError::AlreadyStarted)
        }
        let (commands, mut command_rx) = mpsc::channel(64);
        let cancel = CancellationToken::new();
        let task_cancel = cancel.clone();

        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(self.config.poll_interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

            loop {
                tokio::select! {
                    _ = task_cancel.cancelled() => {
                        info!("finalizer stopping");
                        break
                    }
                    _ = ticker.tick() => {
                        match tokio::time::timeout(self.config.poll_timeout, self.poll_tick()).await {
                            Ok(Err(err)) => warn!(error = %err, "finalizer poll tick failed"),
                            Err(_) => warn!(timeout = ?self.config.poll_timeout, "finalizer poll tick timed out"),
                            Ok(Ok(())) => {}
                        }
                    }
                    batch = block_events.recv() => {
                        match batch {
                            Some(batch) => self.on_batch(batch),
                            None => {
                                debug!("finalizer's block event stream ended");
                            }
                        }
                    }
                    Some(command) = command_rx.recv() => {
                        match command {
                            Command::Subscribe(reply) => {
                                let _ = reply.send(self.events.subscribe());
                            }
                        }
                    }
                }
            }
        });

        Ok(FinalizerHandle { commands, cancel })
    }

    /// One run-loop tick (spec §4.3 steps 1-6).
    async fn poll_tick(&mut self) -> Result<(), FinalizerError> {
        let chain_nonce = self.api.nonce_at(self.wallet.address(), BlockNumberOrTag::Latest).await?;
        let before = self.clock.now().checked_sub(self.config.retry_delay).unwrap_or_else(Instant::now);
        let priciest = self.mempool.priciest_transactions(chain_nonce, before);

        if priciest.is_empty() && self.mempool.nonce() > chain_nonce {
            debug!(chain_nonce, mempool_nonce = self.mempool.nonce(), "nonce gap relative to mempool, not stalling");
        }

        metrics::gauge!("ethkit_finalizer_pending_nonces", priciest.len() as f64);
        for entry in &priciest {
            self.resend_or_replace(entry).await;
        }

        self.check_stuck(chain_nonce);
        Ok(())
    }

    async fn resend_or_replace(&self, entry: &MempoolEntry<M>) {
        let target = match self.fee_target(entry.tx.unsigned.kind).await {
            Ok(target) => target,
            Err(err) => {
                warn!(error = %err, nonce = entry.nonce(), "failed to read fee state, retrying next tick");
                return
            }
        };
        let target_fee_cap = target.max_fee_per_gas.or(target.gas_price).unwrap_or_default();
        let target_tip_cap = target.max_priority_fee_per_gas.or(target.gas_price).unwrap_or_default();

        if entry.tx.fee_cap() >= target_fee_cap && entry.tx.tip_cap() >= target_tip_cap {
            if let Err(err) = self.api.send_raw_transaction(&entry.tx.raw).await {
                warn!(error = %err, nonce = entry.nonce(), "resend failed, retrying next tick");
                return
            }
            self.mempool.commit(entry.tx.clone(), entry.metadata.clone(), self.clock.now());
            return
        }

        let new_fee_cap = bumped_at_least(entry.tx.fee_cap(), self.config.price_bump_pct, target_fee_cap);
        let new_tip_cap = bumped_at_least(entry.tx.tip_cap(), self.config.price_bump_pct, target_tip_cap);
        let (gas_price, max_fee, max_tip) = if entry.tx.unsigned.kind.is_eip1559_priced() {
            (None, Some(new_fee_cap), Some(new_tip_cap))
        } else {
            (Some(new_fee_cap), None, None)
        };
        let rebuilt = entry.tx.unsigned.with_fees(entry.nonce(), gas_price, max_fee, max_tip);

        let signed = match self.wallet.sign_transaction(rebuilt).await {
            Ok(signed) => signed,
            Err(err) => {
                warn!(error = %err, nonce = entry.nonce(), "replacement signing failed, retrying next tick");
                return
            }
        };

        self.mempool.commit(signed.clone(), entry.metadata.clone(), self.clock.now());
        metrics::counter!("ethkit_finalizer_replacements_total", 1);
        if let Err(err) = self.api.send_raw_transaction(&signed.raw).await {
            warn!(error = %err, nonce = entry.nonce(), "replacement send failed; mempool is the source of truth, retrying next tick");
        }
    }

    fn check_stuck(&mut self, chain_nonce: u64) {
        let Some(first) = self.mempool.entry_at_nonce(chain_nonce) else {
            if self.stuck {
                self.stuck = false;
            }
            return
        };
        let now = self.clock.now();
        // The nonce itself has been unmined since its first attempt
        // (`NonceStuckTimeout`), or the designated-latest attempt hasn't
        // landed since it was last (re)sent (`TransactionStuckTimeout`).
        let nonce_pending_for = now.saturating_duration_since(first.first_seen);
        let transaction_pending_for = now.saturating_duration_since(first.last_seen);
        let pending_for = nonce_pending_for.max(transaction_pending_for);
        let is_stuck = nonce_pending_for >= self.config.nonce_stuck_timeout || transaction_pending_for >= self.config.transaction_stuck_timeout;

        if is_stuck && !self.stuck {
            self.stuck = true;
            if let Some(on_stuck) = &self.config.on_stuck {
                on_stuck(StuckInfo { nonce: chain_nonce, pending_for });
            }
        } else if !is_stuck && self.stuck {
            self.stuck = false;
            if let Some(on_unstuck) = &self.config.on_unstuck {
                on_unstuck(StuckInfo { nonce: chain_nonce, pending_for });
            }
        }
    }

    /// Diff-subscription handling (spec §4.3): derive `Added`/`Removed` tx
    /// hash sets from the monitor's block event batch, coalesce a hash that
    /// is both removed and re-added within the same batch as a no-op, and
    /// emit mined/reorg events for every hash the mempool recognizes.
    fn on_batch(&mut self, batch: BlockEventBatch) {
        let mut removed_hashes = std::collections::HashSet::new();
        let mut added_hashes = std::collections::HashSet::new();
        for event in &batch {
            let hashes = event.block.transactions.iter().map(|t| t.hash);
            match event.kind {
                EventKind::Added => added_hashes.extend(hashes),
                EventKind::Removed => removed_hashes.extend(hashes)
            }
        }
        let coalesced: std::collections::HashSet<_> = removed_hashes.intersection(&added_hashes).copied().collect();

        for hash in removed_hashes.difference(&coalesced) {
            if let Some(entry) = self.mempool.find_by_hash(*hash) {
                if self.mined.remove(&entry.nonce()).is_some() {
                    self.events.publish(FinalizerEvent::Removed { tx: entry.tx, metadata: entry.metadata });
                }
            }
        }
        for hash in added_hashes.difference(&coalesced) {
            if let Some(entry) = self.mempool.find_by_hash(*hash) {
                if self.mined.insert(entry.nonce(), *hash) != Some(*hash) {
                    self.events.publish(FinalizerEvent::Added { tx: entry.tx, metadata: entry.metadata });
                }
            }
        }
    }
}
