//! Shared data model and concurrency primitives for the chain-observation and
//! transaction-finalization core (see `SPEC_FULL.md` §2).

pub mod block;
pub mod fee;
pub mod subscription;
pub mod tx;

pub use block::{BlockEvent, BlockEventBatch, BlockTransaction, ChainBlock, EventKind, Header, Log, TransactionReceipt};
pub use fee::{apply_margin_ceil, bumped_at_least};
pub use subscription::{FanOut, Subscription};
pub use tx::{AccessListItem, SetCodeAuthorization, SignedTx, TxKind, UnsignedTx};
