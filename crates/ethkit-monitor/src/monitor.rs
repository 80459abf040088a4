//! The Chain Monitor actor (spec §4.1): a single poll-loop task that walks a
//! `ChainApi`'s notion of "latest" forward, detects reorgs by walking parent
//! hashes back into its own buffer, and fans out `Added`/`Removed` events.
//! Structurally this mirrors the teacher's state manager
//! (`crates/eth/src/manager.rs`): an `AtomicBool` start guard, a
//! `tokio::select!` loop over a command channel plus a timer, and a
//! `Vec`-of-senders fan-out reached through `FanOut` instead of
//! `retain`-by-hand.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use alloy_eips::BlockNumberOrTag;
use ethkit_primitives::{BlockEvent, BlockEventBatch, ChainBlock, FanOut, Subscription};
use ethkit_provider::{ChainApi, LogFilter};
use tokio::sync::{mpsc, oneshot};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::buffer::ChainBuffer;
use crate::config::MonitorConfig;
use crate::error::MonitorError;

/// A diagnostic signal distinct from block events (spec SPEC_FULL §6
/// supplement): emitted once per poll tick the monitor determines it is
/// trailing the remote head by more than `trail_num_blocks_behind_head`.
#[derive(Debug, Clone, Copy)]
pub struct Lagging {
    pub by: u64
}

enum Command {
    Subscribe(oneshot::Sender<Subscription<BlockEventBatch>>),
    SubscribeLagging(oneshot::Sender<Subscription<Lagging>>),
    ChainSnapshot(oneshot::Sender<Vec<ChainBlock>>),
    LatestBlock(oneshot::Sender<Option<ChainBlock>>)
}

/// A cheaply-cloneable handle to a running [`ChainMonitor`]. Talking to the
/// monitor task is the only way to subscribe or read its state; there is no
/// shared-lock snapshot outside the task (spec §5 single-writer model).
#[derive(Clone)]
pub struct MonitorHandle {
    commands: mpsc::Sender<Command>,
    cancel: CancellationToken
}

impl MonitorHandle {
    pub async fn subscribe(&self) -> Result<Subscription<BlockEventBatch>, MonitorError> {
        let (tx, rx) = oneshot::channel();
        self.commands.send(Command::Subscribe(tx)).await.map_err(|_| MonitorError::Cancelled)?;
        rx.await.map_err(|_| MonitorError::Cancelled)
    }

    pub async fn subscribe_lagging(&self) -> Result<Subscription<Lagging>, MonitorError> {
        let (tx, rx) = oneshot::channel();
        self.commands.send(Command::SubscribeLagging(tx)).await.map_err(|_| MonitorError::Cancelled)?;
        rx.await.map_err(|_| MonitorError::Cancelled)
    }

    pub async fn chain_snapshot(&self) -> Result<Vec<ChainBlock>, MonitorError> {
        let (tx, rx) = oneshot::channel();
        self.commands.send(Command::ChainSnapshot(tx)).await.map_err(|_| MonitorError::Cancelled)?;
        rx.await.map_err(|_| MonitorError::Cancelled)
    }

    pub async fn latest_block(&self) -> Result<Option<ChainBlock>, MonitorError> {
        let (tx, rx) = oneshot::channel();
        self.commands.send(Command::LatestBlock(tx)).await.map_err(|_| MonitorError::Cancelled)?;
        rx.await.map_err(|_| MonitorError::Cancelled)
    }

    /// Stops the monitor's poll loop. Idempotent.
    pub fn stop(&self) {
        self.cancel.cancel();
    }
}

/// Reorg-aware canonical chain tracker (spec §4.1). Owns its [`ChainBuffer`]
/// and [`FanOut`]s; spawned as a task via [`ChainMonitor::spawn`], which
/// returns a [`MonitorHandle`].
pub struct ChainMonitor<C: ChainApi> {
    api: Arc<C>,
    config: MonitorConfig,
    buffer: ChainBuffer,
    events: FanOut<BlockEventBatch>,
    lagging: FanOut<Lagging>,
    started: Arc<AtomicBool>,
    /// Blocks emitted with `ok=false`, awaiting a retried log fetch on a
    /// later poll tick (spec §4.1 step 6).
    pending: Vec<ChainBlock>
}

impl<C: ChainApi> ChainMonitor<C> {
    pub fn new(api: Arc<C>, config: MonitorConfig) -> Self {
        let buffer = ChainBuffer::new(config.block_retention_limit);
        let events = FanOut::new(config.subscription_buffer);
        let lagging = FanOut::new(config.subscription_buffer);
        Self { api, config, buffer, events, lagging, started: Arc::new(AtomicBool::new(false)), pending: Vec::new() }
    }

    /// Per-poll-tick detail, gated by `DebugLogging` (spec §4.1 ENUMERATED).
    fn debug_tick(&self, f: impl FnOnce()) {
        if self.config.debug_logging {
            f();
        }
    }

    /// Spawns the poll loop on the current Tokio runtime and returns a
    /// handle. Returns [`MonitorError::AlreadyStarted`] if called twice on
    /// monitors sharing the same start flag (not possible through the public
    /// API today, guarded defensively per spec §7).
    pub fn spawn(mut self) -> Result<MonitorHandle, MonitorError> {
        if self.started.swap(true, Ordering::SeqCst) {
            return Err(MonitorError::AlreadyStarted)
        }
        let (commands, mut command_rx) = mpsc::channel(64);
        let cancel = CancellationToken::new();
        let task_cancel = cancel.clone();

        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(self.config.polling_interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

            if let Some(start) = self.config.start_block_number {
                if let Err(err) = self.bootstrap(start).await {
                    warn!(error = %err, "chain monitor failed to bootstrap at configured start block");
                }
            }

            loop {
                tokio::select! {
                    _ = task_cancel.cancelled() => {
                        info!("chain monitor stopping");
                        break
                    }
                    _ = ticker.tick() => {
                        if let Err(err) = self.poll_tick().await {
                            if err.is_transient() {
                                self.debug_tick(|| debug!(error = %err, "chain monitor poll tick failed transiently"));
                            } else {
                                warn!(error = %err, "chain monitor poll tick failed");
                            }
                        }
                    }
                    Some(command) = command_rx.recv() => {
                        self.handle_command(command);
                    }
                }
            }
        });

        Ok(MonitorHandle { commands, cancel })
    }

    fn handle_command(&mut self, command: Command) {
        match command {
            Command::Subscribe(reply) => {
                let _ = reply.send(self.events.subscribe());
            }
            Command::SubscribeLagging(reply) => {
                let _ = reply.send(self.lagging.subscribe());
            }
            Command::ChainSnapshot(reply) => {
                let _ = reply.send(self.buffer.snapshot());
            }
            Command::LatestBlock(reply) => {
                let _ = reply.send(self.buffer.tip().cloned());
            }
        }
    }

    /// Seeds the buffer with a single block at `number` so the first poll
    /// tick has a tip to extend from (spec §4.1 step 1, "Start" case).
    async fn bootstrap(&mut self, number: u64) -> Result<(), MonitorError> {
        let block = self.api.block_by_number(BlockNumberOrTag::Number(number), false).await?;
        if let Some(block) = block {
            let block = self.augment(block).await;
            self.buffer.push(block.0)?;
        }
        Ok(())
    }

    /// One full poll tick (spec §4.1 steps 1-7).
    async fn poll_tick(&mut self) -> Result<(), MonitorError> {
        self.retry_pending_augmentation().await;

        let remote_head = self.api.block_number().await?;

        if let Some(trail) = self.config.trail_num_blocks_behind_head {
            let local = self.buffer.tip().map(|b| b.number()).unwrap_or(0);
            if remote_head > local && remote_head - local > trail {
                self.lagging.publish(Lagging { by: remote_head - local });
            }
        }

        let Some(tip) = self.buffer.tip().cloned() else {
            // No seed yet: take the remote head as the starting point.
            return self.bootstrap(remote_head).await
        };

        if tip.number() >= remote_head {
            return Ok(())
        }

        let next = self.api.block_by_number(BlockNumberOrTag::Number(tip.number() + 1), false).await?;
        let Some(next) = next else {
            // NotFound: remote reported a head it hasn't fully indexed yet (step 2).
            return Ok(())
        };

        if next.parent_hash() == tip.hash() {
            self.apply_advance(next).await?;
            return Ok(())
        }

        // parentHash=0x0 mid-stream is a transient indexing artifact, not a
        // genuine reorg signal (SPEC_FULL §6 supplement); retry next tick.
        if next.parent_hash().is_zero() {
            self.debug_tick(|| debug!(number = next.number(), "observed zero parent hash, treating as transient"));
            return Ok(())
        }

        self.resolve_reorg(next).await
    }

    /// Appends a simple, non-reorg extension (spec §4.1 step 3).
    async fn apply_advance(&mut self, block: ChainBlock) -> Result<(), MonitorError> {
        let (block, ok) = self.augment(block).await;
        self.buffer.push(block.clone())?;
        metrics::counter!("ethkit_monitor_blocks_added_total", 1);
        metrics::gauge!("ethkit_monitor_buffer_len", self.buffer.len() as f64);
        self.events.publish(vec![BlockEvent::added(block.clone(), ok)]);
        if !ok {
            self.pending.push(block);
        }
        Ok(())
    }

    /// Walks parent hashes back from `candidate` into the buffer to find the
    /// common ancestor, truncates the divergent tip, and replays the new
    /// chain forward (spec §4.1 step 4, S2/S3).
    async fn resolve_reorg(&mut self, candidate: ChainBlock) -> Result<(), MonitorError> {
        let mut chain = vec![candidate];
        loop {
            let head = chain.last().unwrap();
            if let Some(idx) = self.buffer.index_of_hash(head.parent_hash()) {
                let removed = self.buffer.truncate_after(idx);
                if !removed.is_empty() {
                    metrics::counter!("ethkit_monitor_reorgs_total", 1);
                    metrics::gauge!("ethkit_monitor_reorg_depth", removed.len() as f64);
                    self.events.publish(removed.into_iter().map(BlockEvent::removed).collect());
                }
                chain.reverse();
                for block in chain {
                    let (block, ok) = self.augment(block).await;
                    self.buffer.push(block.clone())?;
                    self.events.publish(vec![BlockEvent::added(block.clone(), ok)]);
                    if !ok {
                        self.pending.push(block);
                    }
                }
                return Ok(())
            }

            if self.buffer.len() == 0 || chain.len() > self.config.block_retention_limit {
                // Reorg depth exceeds what the buffer retains: no common
                // ancestor can be found locally. Drop the whole local view
                // and rebuild from the candidate's chain alone (S3).
                warn!(candidate = ?head.hash(), "reorg exceeds retention, rebuilding buffer from new chain");
                let removed = self.buffer.clear_and_return();
                if !removed.is_empty() {
                    self.events.publish(removed.into_iter().map(BlockEvent::removed).collect());
                }
                chain.reverse();
                for block in chain {
                    let (block, ok) = self.augment(block).await;
                    self.buffer.push(block.clone())?;
                    self.events.publish(vec![BlockEvent::added(block.clone(), ok)]);
                    if !ok {
                        self.pending.push(block);
                    }
                }
                return Ok(())
            }

            let parent = self.api.block_by_hash(head.parent_hash(), false).await?;
            match parent {
                Some(parent) => chain.push(parent),
                None => {
                    // Can't walk further back right now; try again next tick.
                    self.debug_tick(|| debug!("reorg ancestor walk-back stalled on a missing parent block"));
                    return Ok(())
                }
            }
        }
    }

    /// Fetches logs for `block` when `with_logs` is configured, returning the
    /// block plus whether augmentation succeeded (the `ok` flag, spec §4.1
    /// step 6).
    async fn augment(&self, mut block: ChainBlock) -> (ChainBlock, bool) {
        if !self.config.with_logs {
            return (block, true)
        }
        let filter = LogFilter::at_block(block.number());
        match self.api.get_logs(&filter).await {
            Ok(logs) => {
                block.logs = Some(logs);
                (block, true)
            }
            Err(err) => {
                self.debug_tick(|| debug!(error = %err, number = block.number(), "failed to fetch logs for block, emitting provisionally"));
                (block, false)
            }
        }
    }

    /// Retries augmentation for every block still awaiting logs, once per
    /// poll tick (spec §4.1 step 6). A block that succeeds and is still
    /// canonical is re-emitted as `Added` with `ok=true` and dropped from
    /// `pending`; one that's been reorged away is dropped without
    /// re-emitting; one whose fetch fails again stays pending for the next
    /// tick.
    async fn retry_pending_augmentation(&mut self) {
        if self.pending.is_empty() {
            return
        }
        let pending = std::mem::take(&mut self.pending);
        for block in pending {
            if !self.buffer.contains_hash_at(block.number(), block.hash()) {
                continue
            }
            let filter = LogFilter::at_block(block.number());
            match self.api.get_logs(&filter).await {
                Ok(logs) => {
                    let mut block = block;
                    block.logs = Some(logs);
                    if self.buffer.update_in_place(block.clone()) {
                        self.events.publish(vec![BlockEvent::added(block, true)]);
                    }
                }
                Err(err) => {
                    self.debug_tick(|| debug!(error = %err, number = block.number(), "retry of pending log augmentation failed again"));
                    self.pending.push(block);
                }
            }
        }
    }
}
