//! Generic non-blocking subscriber fan-out (spec §5, §9: "Subscriber fan-out
//! with backpressure").
//!
//! Every long-running component (Monitor, Receipt Listener, Finalizer) is a
//! single task that owns one [`FanOut`] and calls [`FanOut::publish`] from
//! inside its own poll loop — there is never more than one writer, matching
//! the teacher's `event_listeners: Vec<UnboundedSender<_>>` plus
//! `retain(|e| e.send(event.clone()).is_ok())` pattern
//! (`bin/testnet/src/anvil_utils/anvil_eth_data_cleanser.rs`), generalized to
//! bounded channels plus an explicit "done" signal so a
//! dropped subscriber is observable rather than silently discarded.

use tokio::sync::{mpsc, oneshot};

/// A single subscriber's outbound channel plus a one-shot fired when the
/// publisher removes it (full buffer, closed receiver, or explicit purge).
struct Subscriber<T> {
    tx: mpsc::Sender<T>,
    done_tx: Option<oneshot::Sender<()>>
}

/// Owns the subscriber list for one component. Not `Sync` by design: only
/// the component's single poll-loop task should ever call `publish`.
pub struct FanOut<T> {
    buffer: usize,
    subscribers: Vec<Subscriber<T>>
}

impl<T: Clone> FanOut<T> {
    pub fn new(buffer: usize) -> Self {
        Self { buffer, subscribers: Vec::new() }
    }

    /// Number of currently live subscribers.
    pub fn len(&self) -> usize {
        self.subscribers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.subscribers.is_empty()
    }

    /// Registers a new subscriber and returns its handle.
    pub fn subscribe(&mut self) -> Subscription<T> {
        let (tx, rx) = mpsc::channel(self.buffer);
        let (done_tx, done_rx) = oneshot::channel();
        self.subscribers.push(Subscriber { tx, done_tx: Some(done_tx) });
        Subscription { rx, done: done_rx }
    }

    /// Attempts to enqueue `value` to every subscriber without blocking. A
    /// subscriber whose buffer is full or whose receiver has been dropped is
    /// removed, which drops its `done_tx` and so resolves its `Done()`
    /// future — it must call `subscribe` again to keep receiving events.
    pub fn publish(&mut self, value: T) {
        self.subscribers.retain_mut(|s| s.tx.try_send(value.clone()).is_ok());
    }
}

/// A subscriber's view of a [`FanOut`]: an event channel and a done signal.
/// Dropping a `Subscription` is the unsubscribe operation — it is therefore
/// idempotent by construction (you cannot drop the same value twice) and
/// takes effect for the publisher the next time it calls `publish` and
/// observes the closed channel.
pub struct Subscription<T> {
    rx: mpsc::Receiver<T>,
    done: oneshot::Receiver<()>
}

impl<T> Subscription<T> {
    /// Receives the next event, or `None` once the publisher has dropped
    /// this subscription (backpressure or explicit purge).
    pub async fn recv(&mut self) -> Option<T> {
        self.rx.recv().await
    }

    /// Resolves once the publisher has removed this subscription for a
    /// reason other than the caller dropping it themselves (e.g. the
    /// component purged it for exceeding its wait budget).
    pub async fn closed(&mut self) {
        let _ = (&mut self.done).await;
    }

    /// Explicit, self-documenting alternative to letting the value drop.
    pub fn unsubscribe(self) {
        drop(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn publish_reaches_subscriber() {
        let mut fan_out = FanOut::new(4);
        let mut sub = fan_out.subscribe();
        fan_out.publish(7u32);
        assert_eq!(sub.recv().await, Some(7));
    }

    #[tokio::test]
    async fn full_buffer_drops_subscriber() {
        let mut fan_out = FanOut::new(1);
        let mut sub = fan_out.subscribe();
        fan_out.publish(1u32);
        // buffer now full (subscriber hasn't drained); next publish can't enqueue and drops it.
        fan_out.publish(2u32);
        assert_eq!(fan_out.len(), 0);
        assert_eq!(sub.recv().await, Some(1));
        assert_eq!(sub.recv().await, None);
    }

    #[tokio::test]
    async fn unsubscribe_is_idempotent_by_construction() {
        let mut fan_out = FanOut::new(4);
        let sub = fan_out.subscribe();
        sub.unsubscribe();
        fan_out.publish(1u32);
        assert_eq!(fan_out.len(), 0);
    }
}
