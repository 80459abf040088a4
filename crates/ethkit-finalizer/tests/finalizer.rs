use std::sync::Arc;
use std::time::{Duration, Instant};

use alloy_primitives::{Address, Bytes, U256};
use alloy_signer_local::PrivateKeySigner;
use ethkit_finalizer::{AdvanceableClock, Finalizer, FinalizerConfig, MempoolStore};
use ethkit_primitives::{FanOut, TxKind, UnsignedTx};
use ethkit_provider::MockChainApi;
use ethkit_wallet::LocalWallet;

fn unsigned(to: Address) -> UnsignedTx {
    UnsignedTx {
        kind: TxKind::Legacy,
        chain_id: 1,
        nonce: 0,
        to: Some(to),
        value: U256::ZERO,
        input: Bytes::new(),
        gas_limit: 21000,
        gas_price: None,
        max_fee_per_gas: None,
        max_priority_fee_per_gas: None,
        access_list: Vec::new(),
        max_fee_per_blob_gas: None,
        blob_versioned_hashes: Vec::new(),
        authorization_list: Vec::new()
    }
}

#[tokio::test]
async fn send_fills_sequential_nonces_with_no_gap() {
    let wallet = Arc::new(LocalWallet::from_signer(PrivateKeySigner::random()));
    let api = Arc::new(MockChainApi::new(1));
    api.set_pending_nonce(wallet.address(), 5);
    api.set_nonce_at(wallet.address(), 5);
    api.set_gas_price(10, 1);

    let finalizer: Finalizer<_, _, ()> = Finalizer::new(api.clone(), wallet.clone(), FinalizerConfig::default());
    let mempool = finalizer.mempool();

    for _ in 0..3 {
        finalizer.send(unsigned(wallet.address()), ()).await.unwrap();
    }

    assert_eq!(mempool.nonce(), 8);
    let priciest = mempool.priciest_transactions(5, Instant::now() + Duration::from_secs(3600));
    assert_eq!(priciest.len(), 3);
    assert_eq!(priciest.iter().map(|e| e.nonce()).collect::<Vec<_>>(), vec![5, 6, 7]);
}

#[tokio::test(start_paused = true)]
async fn stuck_transaction_is_replaced_at_the_higher_fee() {
    let wallet = Arc::new(LocalWallet::from_signer(PrivateKeySigner::random()));
    let api = Arc::new(MockChainApi::new(1));
    api.set_pending_nonce(wallet.address(), 0);
    api.set_nonce_at(wallet.address(), 0);
    api.set_gas_price(10, 1);

    let clock = Arc::new(AdvanceableClock::new(Instant::now()));
    let config = FinalizerConfig::default()
        .with_poll_interval(Duration::from_millis(10))
        .with_retry_delay(Duration::from_secs(60))
        .with_fee_margin_pct(0)
        .with_price_bump_pct(10);

    let finalizer: Finalizer<_, _, ()> = Finalizer::new(api.clone(), wallet.clone(), config).with_clock(clock.clone());
    let mempool = finalizer.mempool();

    let signed = finalizer.send(unsigned(wallet.address()), ()).await.unwrap();
    assert_eq!(signed.fee_cap(), 10);

    let mut fan_out = FanOut::new(16);
    let feed = fan_out.subscribe();
    let handle = finalizer.spawn(feed).unwrap();

    clock.advance(Duration::from_secs(61));
    api.set_gas_price(30, 1);

    tokio::time::advance(Duration::from_millis(15)).await;
    // Let the spawned poll loop observe the advanced clock/time.
    tokio::task::yield_now().await;
    tokio::time::advance(Duration::from_millis(15)).await;
    tokio::task::yield_now().await;

    let best = mempool.entry_at_nonce(0).expect("nonce 0 still tracked");
    assert_eq!(best.tx.fee_cap(), 30, "replacement must match the new chain target (S5: max(10*1.10, 30)=30)");
    assert!(api.sent_transactions().len() >= 2, "both the original send and the replacement must reach the transport");

    handle.stop();
}
