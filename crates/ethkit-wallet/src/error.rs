use thiserror::Error;

/// Errors surfaced by a [`crate::Wallet`] (spec §7: `Signing`/`Validation`
/// kinds live here).
#[derive(Debug, Error)]
pub enum WalletError {
    #[error("signer refused to sign: {0}")]
    Signing(String),
    #[error("transaction missing a required field: {0}")]
    Validation(String)
}
