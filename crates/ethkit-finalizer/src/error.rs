use ethkit_provider::ProviderError;
use ethkit_wallet::WalletError;
use thiserror::Error;

/// Error kinds for the Finalizer (spec §7).
#[derive(Debug, Error)]
pub enum FinalizerError {
    #[error("finalizer already started")]
    AlreadyStarted,
    #[error("finalizer cancelled")]
    Cancelled,
    #[error("provider error: {0}")]
    Provider(#[from] ProviderError),
    #[error("wallet error: {0}")]
    Wallet(#[from] WalletError),
    #[error("invalid transaction: {0}")]
    Validation(String)
}
