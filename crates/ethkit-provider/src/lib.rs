//! The "RPC Client" collaborator (spec §1, §6): a narrow `ChainApi` trait
//! naming exactly the methods the core consumes, a live implementation
//! backed by `alloy`, and (behind `test-util`) a scriptable mock used by the
//! monitor/listener/finalizer test suites.

mod alloy_impl;
mod chain_api;
mod convert;
mod error;
mod filter;
#[cfg(any(test, feature = "test-util"))]
mod mock;

pub use alloy_impl::AlloyChainApi;
pub use chain_api::ChainApi;
pub use error::ProviderError;
pub use filter::{FeeHistory, LogFilter};
#[cfg(any(test, feature = "test-util"))]
pub use mock::MockChainApi;
