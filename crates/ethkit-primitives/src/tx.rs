//! Polymorphic transaction model (spec §9: "Polymorphic transaction shapes").
//!
//! Legacy/AccessList/DynamicFee/Blob/SetCode transactions share a common read
//! contract (nonce, to, value, data, gas, fee caps) but distinct constructor
//! fields. We model this as one struct carrying a [`TxKind`] tag plus the
//! union of fields any variant may use; per-variant fields that don't apply
//! to a given `kind` are simply left at their default. The conversion to the
//! wire-exact alloy envelope lives in `ethkit-wallet` (signing) and
//! `ethkit-provider` (decoding already-mined transactions), keeping the exact
//! RLP/wire shape out of the core crates.

use alloy_primitives::{Address, Bytes, B256, U256};

/// The five transaction type-bytes on the wire (spec §6).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TxKind {
    /// No type byte.
    Legacy,
    /// 0x01
    AccessList,
    /// 0x02
    DynamicFee,
    /// 0x03
    Blob,
    /// 0x04
    SetCode
}

impl TxKind {
    pub fn is_eip1559_priced(self) -> bool {
        matches!(self, TxKind::DynamicFee | TxKind::Blob | TxKind::SetCode)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccessListItem {
    pub address: Address,
    pub storage_keys: Vec<B256>
}

/// A 7702 (SetCode) authorization tuple, carried opaquely: the core never
/// inspects its contents, only preserves it across a rebuild.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SetCodeAuthorization {
    pub chain_id: u64,
    pub address: Address,
    pub nonce: u64,
    pub y_parity: u8,
    pub r: U256,
    pub s: U256
}

/// An unsigned transaction ready for a [`crate::Wallet`]-like collaborator to
/// sign. `To`/`Value`/`Data`/`Gas`/`AccessList`/`Blob` fields are preserved
/// verbatim by the Finalizer across a fee-bump rebuild (spec §4.3 step 4);
/// only `nonce`, the fee-cap fields, and the signature change.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnsignedTx {
    pub kind: TxKind,
    pub chain_id: u64,
    pub nonce: u64,
    pub to: Option<Address>,
    pub value: U256,
    pub input: Bytes,
    pub gas_limit: u64,
    /// Legacy / AccessList gas price.
    pub gas_price: Option<u128>,
    /// EIP-1559 fee cap (Dynamic/Blob/SetCode).
    pub max_fee_per_gas: Option<u128>,
    /// EIP-1559 tip cap (Dynamic/Blob/SetCode).
    pub max_priority_fee_per_gas: Option<u128>,
    pub access_list: Vec<AccessListItem>,
    pub max_fee_per_blob_gas: Option<u128>,
    pub blob_versioned_hashes: Vec<B256>,
    pub authorization_list: Vec<SetCodeAuthorization>
}

impl UnsignedTx {
    /// Gas fee cap under either pricing model, used uniformly by replacement
    /// dominance checks (spec §8 invariant 5).
    pub fn fee_cap(&self) -> u128 {
        if self.kind.is_eip1559_priced() {
            self.max_fee_per_gas.unwrap_or_default()
        } else {
            self.gas_price.unwrap_or_default()
        }
    }

    /// Tip cap under either pricing model. Legacy/AccessList transactions
    /// have no separate tip; their whole gas price is their tip for the
    /// purpose of the dominance comparison.
    pub fn tip_cap(&self) -> u128 {
        if self.kind.is_eip1559_priced() {
            self.max_priority_fee_per_gas.unwrap_or_default()
        } else {
            self.gas_price.unwrap_or_default()
        }
    }

    /// Returns a copy with `nonce` and fee-cap fields overwritten, preserving
    /// everything else — the rebuild step of spec §4.3's replacement policy.
    pub fn with_fees(&self, nonce: u64, gas_price: Option<u128>, max_fee: Option<u128>, max_tip: Option<u128>) -> Self {
        let mut next = self.clone();
        next.nonce = nonce;
        if next.kind.is_eip1559_priced() {
            next.max_fee_per_gas = max_fee;
            next.max_priority_fee_per_gas = max_tip;
        } else {
            next.gas_price = gas_price;
        }
        next
    }
}

/// A signed transaction: the raw bytes ready for `eth_sendRawTransaction`
/// plus the unsigned fields it was built from (needed to rebuild a
/// replacement later).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignedTx {
    pub hash: B256,
    pub raw: Bytes,
    pub unsigned: UnsignedTx
}

impl SignedTx {
    pub fn nonce(&self) -> u64 {
        self.unsigned.nonce
    }

    pub fn fee_cap(&self) -> u128 {
        self.unsigned.fee_cap()
    }

    pub fn tip_cap(&self) -> u128 {
        self.unsigned.tip_cap()
    }
}
