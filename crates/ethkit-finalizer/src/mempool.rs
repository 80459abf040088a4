//! The Mempool Store (spec §3, §4.3, §8 invariants 4-6): per-wallet,
//! per-nonce bookkeeping of every signed transaction attempt, so the
//! Finalizer can decide what to resend, replace, or consider mined.
//!
//! Metadata is generic (`M`) per spec §9's "generic transaction metadata"
//! design note, so a caller can attach arbitrary application data (a job id,
//! a UI label) to a tracked transaction without the core knowing its shape.
//! The reference implementation, like spec §6 describes, holds everything
//! in memory for the life of the process; [`MempoolStore`] is a trait so a
//! persistent backend could be substituted.

use std::collections::HashMap;
use std::time::Instant;

use alloy_primitives::B256;
use ethkit_primitives::SignedTx;
use parking_lot::Mutex;

/// One tracked signed-transaction attempt at a given nonce.
#[derive(Debug, Clone)]
pub struct MempoolEntry<M> {
    pub tx: SignedTx,
    pub metadata: M,
    /// Updated every time this exact entry is re-committed (e.g. a resend),
    /// used to gate `RetryDelay`.
    pub last_seen: Instant,
    /// When the nonce's bucket first saw an attempt, carried forward across
    /// replacements — gates `NonceStuckTimeout` (the nonce itself has been
    /// unmined this long), distinct from `last_seen` which gates
    /// `TransactionStuckTimeout` (this exact attempt hasn't landed since).
    pub first_seen: Instant
}

impl<M> MempoolEntry<M> {
    pub fn nonce(&self) -> u64 {
        self.tx.nonce()
    }
}

/// Storage contract the Finalizer depends on (spec §9). `M` must be cheap to
/// clone since multiple attempts per nonce, and multiple reads, share it.
pub trait MempoolStore<M: Clone + Send + Sync + 'static>: Send + Sync + 'static {
    /// High-watermark: `max(committed nonce) + 1`, or `0` if empty (spec §8
    /// invariant 6).
    fn nonce(&self) -> u64;

    /// Idempotent per (nonce, hash): a repeat commit refreshes `last_seen`
    /// without duplicating the entry.
    fn commit(&self, tx: SignedTx, metadata: M, now: Instant);

    /// One entry per nonce starting at `from_nonce`, ascending, stopping at
    /// the first nonce with no entry or whose most-recent attempt is not yet
    /// older than `before` (spec §4.3 step 2). The returned entry per nonce
    /// is the "designated latest": highest fee cap, tie-broken by highest
    /// tip cap (spec §9).
    fn priciest_transactions(&self, from_nonce: u64, before: Instant) -> Vec<MempoolEntry<M>>;

    fn find_by_hash(&self, hash: B256) -> Option<MempoolEntry<M>>;

    fn entry_at_nonce(&self, nonce: u64) -> Option<MempoolEntry<M>>;
}

/// The reference in-memory mempool (spec §6): all attempts for all nonces
/// held until process exit.
pub struct InMemoryMempool<M> {
    // nonce -> every signed attempt seen at that nonce, insertion order.
    by_nonce: Mutex<HashMap<u64, Vec<MempoolEntry<M>>>>
}

impl<M> Default for InMemoryMempool<M> {
    fn default() -> Self {
        Self { by_nonce: Mutex::new(HashMap::new()) }
    }
}

impl<M: Clone> InMemoryMempool<M> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Highest-fee-cap, tie-broken by highest-tip-cap entry in `bucket`
    /// (spec §9 "designated latest").
    fn latest(bucket: &[MempoolEntry<M>]) -> Option<&MempoolEntry<M>> {
        bucket.iter().max_by(|a, b| a.tx.fee_cap().cmp(&b.tx.fee_cap()).then(a.tx.tip_cap().cmp(&b.tx.tip_cap())))
    }
}

impl<M: Clone + Send + Sync + 'static> MempoolStore<M> for InMemoryMempool<M> {
    fn nonce(&self) -> u64 {
        self.by_nonce.lock().keys().max().map_or(0, |n| n + 1)
    }

    fn commit(&self, tx: SignedTx, metadata: M, now: Instant) {
        let mut store = self.by_nonce.lock();
        let bucket = store.entry(tx.nonce()).or_default();
        if let Some(existing) = bucket.iter_mut().find(|e| e.tx.hash == tx.hash) {
            existing.last_seen = now;
            return
        }
        let first_seen = bucket.iter().map(|e| e.first_seen).min().unwrap_or(now);
        bucket.push(MempoolEntry { tx, metadata, last_seen: now, first_seen });
    }

    fn priciest_transactions(&self, from_nonce: u64, before: Instant) -> Vec<MempoolEntry<M>> {
        let store = self.by_nonce.lock();
        let mut out = Vec::new();
        let mut nonce = from_nonce;
        loop {
            let Some(bucket) = store.get(&nonce) else { break };
            let most_recent = bucket.iter().map(|e| e.last_seen).max().expect("non-empty bucket");
            if most_recent >= before {
                break
            }
            let Some(best) = Self::latest(bucket) else { break };
            out.push(best.clone());
            nonce += 1;
        }
        out
    }

    fn find_by_hash(&self, hash: B256) -> Option<MempoolEntry<M>> {
        let store = self.by_nonce.lock();
        store.values().flat_map(|bucket| bucket.iter()).find(|e| e.tx.hash == hash).cloned()
    }

    fn entry_at_nonce(&self, nonce: u64) -> Option<MempoolEntry<M>> {
        let store = self.by_nonce.lock();
        store.get(&nonce).and_then(|bucket| Self::latest(bucket)).cloned()
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use alloy_primitives::{Address, Bytes};
    use ethkit_primitives::{TxKind, UnsignedTx};
    use proptest::prelude::*;

    use super::*;

    fn signed(nonce: u64, fee_cap: u128, byte: u8) -> SignedTx {
        let unsigned = UnsignedTx {
            kind: TxKind::DynamicFee,
            chain_id: 1,
            nonce,
            to: Some(Address::ZERO),
            value: Default::default(),
            input: Bytes::new(),
            gas_limit: 21000,
            gas_price: None,
            max_fee_per_gas: Some(fee_cap),
            max_priority_fee_per_gas: Some(1),
            access_list: Vec::new(),
            max_fee_per_blob_gas: None,
            blob_versioned_hashes: Vec::new(),
            authorization_list: Vec::new()
        };
        SignedTx { hash: B256::repeat_byte(byte), raw: Bytes::new(), unsigned }
    }

    #[test]
    fn nonce_is_max_plus_one_or_zero() {
        let mempool: InMemoryMempool<()> = InMemoryMempool::new();
        assert_eq!(mempool.nonce(), 0);
        mempool.commit(signed(0, 10, 1), (), Instant::now());
        mempool.commit(signed(3, 10, 2), (), Instant::now());
        assert_eq!(mempool.nonce(), 4);
    }

    #[test]
    fn commit_is_idempotent_by_hash() {
        let mempool: InMemoryMempool<()> = InMemoryMempool::new();
        let tx = signed(0, 10, 1);
        mempool.commit(tx.clone(), (), Instant::now());
        mempool.commit(tx, (), Instant::now());
        assert_eq!(mempool.entry_at_nonce(0).is_some(), true);
        let bucket_len = mempool.by_nonce.lock().get(&0).unwrap().len();
        assert_eq!(bucket_len, 1);
    }

    #[test]
    fn priciest_transactions_picks_highest_fee_cap() {
        let mempool: InMemoryMempool<()> = InMemoryMempool::new();
        let base = Instant::now();
        mempool.commit(signed(0, 10, 1), (), base);
        mempool.commit(signed(0, 30, 2), (), base);
        let priciest = mempool.priciest_transactions(0, base + Duration::from_secs(100));
        assert_eq!(priciest.len(), 1);
        assert_eq!(priciest[0].tx.hash, B256::repeat_byte(2));
    }

    proptest! {
        // Spec §8 invariant 6: `Nonce()` is always `max(committed nonce) + 1`,
        // regardless of commit order, for any set of distinct nonces.
        #[test]
        fn nonce_is_max_committed_plus_one(mut nonces in proptest::collection::hash_set(0u64..500, 1..30)) {
            let mempool: InMemoryMempool<()> = InMemoryMempool::new();
            let base = Instant::now();
            let expected_max = *nonces.iter().max().unwrap();
            for (i, nonce) in nonces.drain().enumerate() {
                mempool.commit(signed(nonce, 10, i as u8), (), base);
            }
            prop_assert_eq!(mempool.nonce(), expected_max + 1);
        }

        // Spec §9 "designated latest": of any set of attempts at one nonce,
        // `entry_at_nonce` always returns the one with the highest fee cap.
        #[test]
        fn entry_at_nonce_is_always_highest_fee_cap(fee_caps in proptest::collection::vec(1u128..1_000_000, 1..20)) {
            let mempool: InMemoryMempool<()> = InMemoryMempool::new();
            let base = Instant::now();
            let expected_max = *fee_caps.iter().max().unwrap();
            for (i, fee_cap) in fee_caps.iter().enumerate() {
                mempool.commit(signed(0, *fee_cap, i as u8), (), base);
            }
            prop_assert_eq!(mempool.entry_at_nonce(0).unwrap().tx.fee_cap(), expected_max);
        }
    }
}
