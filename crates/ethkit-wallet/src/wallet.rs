use alloy_primitives::Address;
use async_trait::async_trait;
use ethkit_primitives::{SignedTx, UnsignedTx};

use crate::error::WalletError;

/// The "Wallet" collaborator (spec §1): supplies an address and signs a
/// prepared transaction under a given chain id. The Finalizer is the only
/// caller in this core; it never inspects key material directly.
#[async_trait]
pub trait Wallet: Send + Sync + 'static {
    fn address(&self) -> Address;

    async fn sign_transaction(&self, tx: UnsignedTx) -> Result<SignedTx, WalletError>;
}
