//! Module runtime: handles, worker threads and fan-out.
//!
//! ## Components
//!
//! - [`handle`]: [`ModuleHandle`], the lifecycle API and connections
//! - [`worker`]: per-module thread loops
//! - [`fanout`]: reference-counted delivery to destinations
//! - [`message`]: the queued unit and its release guard
//! - [`stats`]: per-handle counters

pub mod handle;
pub mod message;
pub mod stats;

mod fanout;
mod worker;

pub use handle::{connect, data_tx_rx, disconnect, ModuleHandle, ThreadConfig};
pub use message::{Message, ResponseCallback};
pub use stats::ModuleStats;

#[cfg(test)]
mod integration_tests;
