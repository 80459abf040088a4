use std::sync::Arc;
use std::time::Duration;

use alloy_primitives::{Address, B256};
use ethkit_primitives::{BlockEvent, BlockTransaction, ChainBlock, Header};
use ethkit_provider::MockChainApi;
use ethkit_receipts::{FilterQuery, ListenerConfig, ReceiptListener};

fn block(number: u64, hash: u8, parent_hash: u8, txs: Vec<BlockTransaction>) -> ChainBlock {
    ChainBlock {
        header: Header {
            hash: B256::repeat_byte(hash),
            parent_hash: B256::repeat_byte(parent_hash),
            number,
            timestamp: number,
            logs_bloom: Default::default(),
            base_fee_per_gas: None
        },
        transactions: txs,
        receipts: None,
        logs: None
    }
}

fn tx(hash: u8) -> BlockTransaction {
    BlockTransaction {
        hash: B256::repeat_byte(hash),
        nonce: 0,
        from: Address::ZERO,
        to: None,
        value: Default::default(),
        input: Default::default(),
        gas: 21000,
        gas_price: Some(1),
        max_fee_per_gas: None,
        max_priority_fee_per_gas: None
    }
}

fn receipt(hash: u8, block_number: u64) -> ethkit_primitives::TransactionReceipt {
    ethkit_primitives::TransactionReceipt {
        transaction_hash: B256::repeat_byte(hash),
        transaction_index: Some(0),
        block_hash: Some(B256::repeat_byte(block_number as u8)),
        block_number: Some(block_number),
        from: Address::ZERO,
        to: None,
        contract_address: None,
        status: true,
        gas_used: 21000,
        cumulative_gas_used: 21000,
        effective_gas_price: 1,
        logs: Vec::new()
    }
}

#[tokio::test]
async fn holds_match_until_finality_then_delivers() {
    let api = Arc::new(MockChainApi::new(1));
    api.insert_receipt(receipt(0xaa, 50));

    let mut fan_out = ethkit_primitives::FanOut::new(16);
    let feed = fan_out.subscribe();

    let listener = ReceiptListener::new(api.clone(), ListenerConfig::default().with_num_blocks_to_finality(3));
    let handle = listener.spawn(feed).unwrap();

    let mut sub = handle.subscribe(vec![FilterQuery::new().transaction_hash(B256::repeat_byte(0xaa))]).await.unwrap();

    fan_out.publish(vec![BlockEvent::added(block(50, 50, 49, vec![tx(0xaa)]), true)]);
    tokio::time::sleep(Duration::from_millis(20)).await;
    assert!(tokio::time::timeout(Duration::from_millis(20), sub.recv()).await.is_err());

    fan_out.publish(vec![BlockEvent::added(block(51, 51, 50, vec![]), true)]);
    fan_out.publish(vec![BlockEvent::added(block(52, 52, 51, vec![]), true)]);
    tokio::time::sleep(Duration::from_millis(20)).await;
    assert!(tokio::time::timeout(Duration::from_millis(20), sub.recv()).await.is_err());

    fan_out.publish(vec![BlockEvent::added(block(53, 53, 52, vec![]), true)]);
    let matched = tokio::time::timeout(Duration::from_millis(200), sub.recv()).await.unwrap().unwrap();
    assert_eq!(matched.receipt.transaction_hash, B256::repeat_byte(0xaa));
}

#[tokio::test]
async fn removed_block_retracts_held_match_silently() {
    let api = Arc::new(MockChainApi::new(1));
    api.insert_receipt(receipt(0xbb, 50));

    let mut fan_out = ethkit_primitives::FanOut::new(16);
    let feed = fan_out.subscribe();

    let listener = ReceiptListener::new(api.clone(), ListenerConfig::default().with_num_blocks_to_finality(3));
    let handle = listener.spawn(feed).unwrap();
    let mut sub = handle.subscribe(vec![FilterQuery::new().transaction_hash(B256::repeat_byte(0xbb))]).await.unwrap();

    fan_out.publish(vec![BlockEvent::added(block(50, 50, 49, vec![tx(0xbb)]), true)]);
    tokio::time::sleep(Duration::from_millis(20)).await;

    fan_out.publish(vec![BlockEvent::removed(block(50, 50, 49, vec![tx(0xbb)]))]);
    tokio::time::sleep(Duration::from_millis(20)).await;

    fan_out.publish(vec![BlockEvent::added(block(51, 51, 49, vec![]), true)]);
    fan_out.publish(vec![BlockEvent::added(block(52, 52, 51, vec![]), true)]);
    fan_out.publish(vec![BlockEvent::added(block(53, 53, 52, vec![]), true)]);

    let result = tokio::time::timeout(Duration::from_millis(100), sub.recv()).await;
    assert!(result.is_err(), "retracted match must never be delivered");
}
