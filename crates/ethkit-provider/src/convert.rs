//! Conversions from `alloy`'s wire types into the core's transport-agnostic
//! data model (`ethkit_primitives::block`). Keeping these in one place means
//! an upgrade to a new `alloy` release, or swapping in a different RPC
//! crate entirely, only touches this file.

use alloy_rpc_types_eth::{Block as AlloyBlock, Header as AlloyHeader, Log as AlloyLog, Transaction as AlloyTransaction, TransactionReceipt as AlloyReceipt};
use ethkit_primitives::{BlockTransaction, ChainBlock, Header, Log, TransactionReceipt};

pub fn header_from_alloy(header: &AlloyHeader) -> Header {
    Header {
        hash: header.hash,
        parent_hash: header.inner.parent_hash,
        number: header.inner.number,
        timestamp: header.inner.timestamp,
        logs_bloom: header.inner.logs_bloom,
        base_fee_per_gas: header.inner.base_fee_per_gas
    }
}

pub fn tx_from_alloy(tx: &AlloyTransaction) -> BlockTransaction {
    BlockTransaction {
        hash: tx.inner.tx_hash(),
        nonce: tx.inner.nonce(),
        from: tx.from,
        to: tx.inner.to(),
        value: tx.inner.value(),
        input: tx.inner.input().clone(),
        gas: tx.inner.gas_limit(),
        gas_price: tx.inner.gas_price(),
        max_fee_per_gas: Some(tx.inner.max_fee_per_gas()),
        max_priority_fee_per_gas: tx.inner.max_priority_fee_per_gas()
    }
}

pub fn log_from_alloy(log: &AlloyLog) -> Log {
    Log {
        address: log.address(),
        topics: log.topics().to_vec(),
        data: log.data().data.clone(),
        block_hash: log.block_hash,
        block_number: log.block_number,
        transaction_hash: log.transaction_hash,
        log_index: log.log_index,
        removed: log.removed
    }
}

pub fn receipt_from_alloy(receipt: &AlloyReceipt) -> TransactionReceipt {
    TransactionReceipt {
        transaction_hash: receipt.transaction_hash,
        transaction_index: receipt.transaction_index,
        block_hash: receipt.block_hash,
        block_number: receipt.block_number,
        from: receipt.from,
        to: receipt.to,
        contract_address: receipt.contract_address,
        status: receipt.status(),
        gas_used: receipt.gas_used,
        cumulative_gas_used: receipt.cumulative_gas_used,
        effective_gas_price: receipt.effective_gas_price,
        logs: receipt.inner.logs().iter().map(log_from_alloy).collect()
    }
}

/// `full` controls whether `block.transactions` came back as full bodies or
/// bare hashes; a `Hashes` variant yields an empty transaction list here
/// (the monitor always requests full bodies, so this is mostly defensive).
pub fn block_from_alloy(block: &AlloyBlock) -> ChainBlock {
    let transactions = block
        .transactions
        .as_transactions()
        .map(|txs| txs.iter().map(tx_from_alloy).collect())
        .unwrap_or_default();

    ChainBlock { header: header_from_alloy(&block.header), transactions, receipts: None, logs: None }
}
