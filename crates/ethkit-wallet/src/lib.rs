//! The "Wallet" collaborator (spec §1): address + transaction signing under
//! a chain id, kept behind a trait so the Finalizer never depends on a
//! specific key-management scheme.

mod error;
mod local;
mod wallet;

pub use error::WalletError;
pub use local::LocalWallet;
pub use wallet::Wallet;
