//! # Quote Monitor Common Crate
//!
//! This crate provides the data types, error definitions, and the shared
//! price ledger used across the `quote-monitor` workspace.

/// Module for common error types.
pub mod errors;

/// Module for the shared append-only price ledger.
pub mod ledger;

/// Module for common data structures and types.
pub mod types;

// Re-export key items for easier access.
pub use errors::ArtifactError;
pub use ledger::{LedgerCursor, PriceLedger};
pub use types::{ArchiveLine, ExchangeId, PriceLevel, QuoteRecord, StreamErrorRecord};
