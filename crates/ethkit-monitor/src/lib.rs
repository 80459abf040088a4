//! The Chain Monitor (spec §4.1): a reorg-aware canonical chain tracker that
//! polls a [`ethkit_provider::ChainApi`] and fans out `Added`/`Removed`
//! block events.

mod buffer;
mod config;
mod error;
mod monitor;

pub use buffer::ChainBuffer;
pub use config::MonitorConfig;
pub use error::MonitorError;
pub use monitor::{ChainMonitor, Lagging, MonitorHandle};
