//! # Token Analytics Crate
//!
//! Maintains rolling per-(exchange, token) windows fed incrementally from
//! the shared ledger, computes six market-quality metrics per window, and
//! periodically persists the tokens that clear every configured threshold.

pub mod analyzer;
pub mod metrics;
pub mod window;

pub use analyzer::{MetricPeriods, TokenAnalyzer};
pub use metrics::{MetricThresholds, TokenMetrics};
pub use window::{extract_token, TokenWindows, WindowRegistry};
