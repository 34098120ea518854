//! # Arbitrage Detector Crate
//!
//! Converts ledger state into dated cross-exchange arbitrage results: the
//! freshest futures quote per exchange is snapshotted once per second, the
//! best bid is matched against the best ask, and distinct results are
//! appended idempotently to a JSON result log.

pub mod analyzer;
pub mod deduplicator;
pub mod evaluate;
pub mod result_log;

pub use analyzer::ArbitrageAnalyzer;
pub use deduplicator::{DedupKey, ResultDeduplicator};
pub use evaluate::{evaluate, latest_per_exchange, ArbitrageResult, Evaluation, ExchangeQuote};
