//! The Receipt Cache and Receipt Listener (spec §4.2): matches in-flight
//! filters against a [`ethkit_monitor::ChainMonitor`]'s block event stream,
//! holding matches until finality and retracting them on reorg.

mod cache;
mod config;
mod error;
mod filter;
mod listener;

pub use cache::ReceiptCache;
pub use config::ListenerConfig;
pub use error::ListenerError;
pub use filter::{FilterQuery, LogPredicate};
pub use listener::{ListenerHandle, ReceiptListener, ReceiptMatch, ReceiptSubscription};
