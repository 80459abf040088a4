use alloy_consensus::{SignableTransaction, TxEip1559, TxEip2930, TxEip4844, TxEip7702, TxLegacy};
use alloy_eips::eip2718::Encodable2718;
use alloy_eips::eip2930::AccessList as AlloyAccessList;
use alloy_eips::eip2930::AccessListItem as AlloyAccessListItem;
use alloy_eips::eip7702::{Authorization as AlloyAuthorization, SignedAuthorization};
use alloy_primitives::{Address, Bytes, Signature};
use alloy_signer::Signer;
use alloy_signer_local::PrivateKeySigner;
use async_trait::async_trait;
use ethkit_primitives::{SignedTx, TxKind, UnsignedTx};

use crate::error::WalletError;
use crate::wallet::Wallet;

/// A [`Wallet`] backed by a single in-process private key, via `alloy`'s
/// local signer — the teacher's own dependency (`alloy-signer-local`) for
/// anything that isn't a hardware/remote signer.
pub struct LocalWallet {
    signer: PrivateKeySigner
}

impl LocalWallet {
    pub fn from_signer(signer: PrivateKeySigner) -> Self {
        Self { signer }
    }

    pub fn from_hex(private_key_hex: &str) -> Result<Self, WalletError> {
        let signer: PrivateKeySigner = private_key_hex.parse().map_err(|e: alloy_signer_local::LocalSignerError| WalletError::Validation(e.to_string()))?;
        Ok(Self { signer })
    }

    fn access_list(tx: &UnsignedTx) -> AlloyAccessList {
        AlloyAccessList(
            tx.access_list
                .iter()
                .map(|item| AlloyAccessListItem { address: item.address, storage_keys: item.storage_keys.clone() })
                .collect()
        )
    }

    /// Rebuilds each already-signed 7702 authorization tuple. The core never
    /// issues its own authorizations; it only ever preserves ones the caller
    /// already signed (`y_parity`/`r`/`s` carried verbatim on
    /// [`ethkit_primitives::SetCodeAuthorization`]), so this reattaches the
    /// existing signature rather than asking the wallet to sign again.
    fn authorization_list(tx: &UnsignedTx) -> Vec<SignedAuthorization> {
        tx.authorization_list
            .iter()
            .map(|auth| {
                let inner = AlloyAuthorization { chain_id: auth.chain_id, address: auth.address, nonce: auth.nonce };
                let signature = Signature::new(auth.r, auth.s, auth.y_parity != 0);
                inner.into_signed(signature)
            })
            .collect()
    }

    async fn sign_and_encode<T>(&self, tx: T) -> Result<(Bytes, alloy_primitives::B256, T::Signed), WalletError>
    where
        T: SignableTransaction<Signature> + Clone
    {
        let signature_hash = tx.signature_hash();
        let signature = self.signer.sign_hash(&signature_hash).await.map_err(|e| WalletError::Signing(e.to_string()))?;
        let signed = tx.into_signed(signature);
        let hash = *signed.hash();
        let mut raw = Vec::new();
        signed.encode_2718(&mut raw);
        Ok((raw.into(), hash, signed))
    }
}

#[async_trait]
impl Wallet for LocalWallet {
    fn address(&self) -> Address {
        self.signer.address()
    }

    async fn sign_transaction(&self, tx: UnsignedTx) -> Result<SignedTx, WalletError> {
        if tx.kind != TxKind::SetCode && tx.to.is_none() && tx.input.is_empty() {
            return Err(WalletError::Validation("contract-create transaction has empty data".into()))
        }

        let (raw, hash) = match tx.kind {
            TxKind::Legacy => {
                let legacy = TxLegacy {
                    chain_id: Some(tx.chain_id),
                    nonce: tx.nonce,
                    gas_price: tx.gas_price.unwrap_or_default(),
                    gas_limit: tx.gas_limit,
                    to: tx.to.map(alloy_primitives::TxKind::Call).unwrap_or(alloy_primitives::TxKind::Create),
                    value: tx.value,
                    input: tx.input.clone()
                };
                let (raw, hash, _) = self.sign_and_encode(legacy).await?;
                (raw, hash)
            }
            TxKind::AccessList => {
                let access_list_tx = TxEip2930 {
                    chain_id: tx.chain_id,
                    nonce: tx.nonce,
                    gas_price: tx.gas_price.unwrap_or_default(),
                    gas_limit: tx.gas_limit,
                    to: tx.to.map(alloy_primitives::TxKind::Call).unwrap_or(alloy_primitives::TxKind::Create),
                    value: tx.value,
                    access_list: Self::access_list(&tx),
                    input: tx.input.clone()
                };
                let (raw, hash, _) = self.sign_and_encode(access_list_tx).await?;
                (raw, hash)
            }
            TxKind::DynamicFee => {
                let dynamic_fee_tx = TxEip1559 {
                    chain_id: tx.chain_id,
                    nonce: tx.nonce,
                    gas_limit: tx.gas_limit,
                    max_fee_per_gas: tx.max_fee_per_gas.unwrap_or_default(),
                    max_priority_fee_per_gas: tx.max_priority_fee_per_gas.unwrap_or_default(),
                    to: tx.to.map(alloy_primitives::TxKind::Call).unwrap_or(alloy_primitives::TxKind::Create),
                    value: tx.value,
                    access_list: Self::access_list(&tx),
                    input: tx.input.clone()
                };
                let (raw, hash, _) = self.sign_and_encode(dynamic_fee_tx).await?;
                (raw, hash)
            }
            TxKind::Blob => {
                let Some(to) = tx.to else {
                    return Err(WalletError::Validation("blob transaction must have a recipient".into()))
                };
                let blob_tx = TxEip4844 {
                    chain_id: tx.chain_id,
                    nonce: tx.nonce,
                    gas_limit: tx.gas_limit,
                    max_fee_per_gas: tx.max_fee_per_gas.unwrap_or_default(),
                    max_priority_fee_per_gas: tx.max_priority_fee_per_gas.unwrap_or_default(),
                    to,
                    value: tx.value,
                    access_list: Self::access_list(&tx),
                    blob_versioned_hashes: tx.blob_versioned_hashes.clone(),
                    max_fee_per_blob_gas: tx.max_fee_per_blob_gas.unwrap_or_default(),
                    input: tx.input.clone()
                };
                let (raw, hash, _) = self.sign_and_encode(blob_tx).await?;
                (raw, hash)
            }
            TxKind::SetCode => {
                let Some(to) = tx.to else {
                    return Err(WalletError::Validation("set-code transaction must have a recipient".into()))
                };
                let set_code_tx = TxEip7702 {
                    chain_id: tx.chain_id,
                    nonce: tx.nonce,
                    gas_limit: tx.gas_limit,
                    max_fee_per_gas: tx.max_fee_per_gas.unwrap_or_default(),
                    max_priority_fee_per_gas: tx.max_priority_fee_per_gas.unwrap_or_default(),
                    to,
                    value: tx.value,
                    access_list: Self::access_list(&tx),
                    authorization_list: Self::authorization_list(&tx),
                    input: tx.input.clone()
                };
                let (raw, hash, _) = self.sign_and_encode(set_code_tx).await?;
                (raw, hash)
            }
        };

        Ok(SignedTx { hash, raw, unsigned: tx })
    }
}
