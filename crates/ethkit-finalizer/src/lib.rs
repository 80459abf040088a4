//! The Finalizer and Mempool Store (spec §4.3): a nonce-sequenced send/replace
//! loop that guarantees inclusion of a wallet's transactions on a chain
//! despite reorgs, mempool eviction, and fee spikes.

mod clock;
mod config;
mod error;
mod finalizer;
mod mempool;

pub use clock::{AdvanceableClock, Clock, SystemClock};
pub use config::{FinalizerConfig, StuckCallback, StuckInfo};
pub use error::FinalizerError;
pub use finalizer::{Finalizer, FinalizerEvent, FinalizerHandle};
pub use mempool::{InMemoryMempool, MempoolEntry, MempoolStore};
