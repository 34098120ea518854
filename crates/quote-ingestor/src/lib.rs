//! # Quote Ingestor Crate
//!
//! Maintains one persistent logical order-book subscription per
//! (exchange, symbol) pair, normalizes every received quote, and appends it
//! to the shared price ledger. Each pair recovers from failures
//! independently with bounded retry, so one dead stream never affects its
//! siblings.

pub mod archive;
pub mod provider;
pub mod replay;
pub mod supervisor;

pub use archive::{load_archive, ArchiveWriter};
pub use provider::{BookTop, OrderBookProvider};
pub use replay::ReplayProvider;
pub use supervisor::{StreamState, StreamSupervisor, SupervisorSettings};
