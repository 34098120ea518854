//! Configuration surface for the quote monitor.
//!
//! All tunables are plain scalars and maps loaded from a single YAML file,
//! with documented defaults matching the shipped behavior.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;

/// Metric names recognised by the token analyzer configuration.
pub const METRIC_NAMES: [&str; 6] = ["delta", "vol", "trade", "NATR", "spread", "activity"];

/// Parses a period string ("1m", "5m", "15m", "1h", "4h", "1d") into seconds.
pub fn parse_period(period: &str) -> Option<u64> {
    match period {
        "1m" => Some(60),
        "5m" => Some(300),
        "15m" => Some(900),
        "1h" => Some(3_600),
        "4h" => Some(14_400),
        "1d" => Some(86_400),
        _ => None,
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct MonitorConfig {
    pub symbols: SymbolsConfig,
    pub exchanges: ExchangesConfig,
    #[serde(default)]
    pub arbitrage: ArbitrageConfig,
    #[serde(default)]
    pub tokens: TokensConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SymbolsConfig {
    /// Spot market symbol, e.g. `BTC/USDT`.
    pub spot: String,
    /// Futures market symbol, e.g. `BTC/USDT:USDT`.
    pub future: String,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ExchangesConfig {
    /// Exchange ids to subscribe to.
    pub list: Vec<String>,
    /// Seconds to sleep between reconnect attempts.
    #[serde(default = "default_reconnect_interval")]
    pub reconnect_interval_secs: u64,
    /// Consecutive failures tolerated before a stream pair stops permanently.
    #[serde(default = "default_max_reconnect_attempts")]
    pub max_reconnect_attempts: u32,
    /// Newline-delimited JSON archive of every received quote and stream error.
    #[serde(default = "default_archive_file")]
    pub archive_file: String,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ArbitrageConfig {
    /// JSON-array result log, rewritten wholesale on each change.
    #[serde(default = "default_arbitrage_output")]
    pub output_file: String,
    /// Seconds between evaluation cycles.
    #[serde(default = "default_arbitrage_interval")]
    pub interval_secs: u64,
    /// Fixed notional used by the profit model.
    #[serde(default = "default_volume_trade")]
    pub volume_trade: f64,
}

impl Default for ArbitrageConfig {
    fn default() -> Self {
        Self {
            output_file: default_arbitrage_output(),
            interval_secs: default_arbitrage_interval(),
            volume_trade: default_volume_trade(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TokensConfig {
    /// Filtered metrics artifact, rewritten wholesale each cycle.
    #[serde(default = "default_tokens_output")]
    pub output_file: String,
    /// Artifact produced by the one-time replay pass over the quote archive.
    #[serde(default = "default_tokens_replay_output")]
    pub replay_output_file: String,
    /// Seconds between evaluation cycles.
    #[serde(default = "default_tokens_interval")]
    pub interval_secs: u64,
    /// When set, windows are evaluated relative to the newest timestamp seen
    /// instead of the wall clock.
    #[serde(default)]
    pub test_mode: bool,
    /// Sliding-window period per metric.
    #[serde(default = "default_periods")]
    pub periods: HashMap<String, String>,
    /// Minimum value per metric for a token to be retained.
    #[serde(default = "default_thresholds")]
    pub thresholds: HashMap<String, f64>,
}

impl Default for TokensConfig {
    fn default() -> Self {
        Self {
            output_file: default_tokens_output(),
            replay_output_file: default_tokens_replay_output(),
            interval_secs: default_tokens_interval(),
            test_mode: false,
            periods: default_periods(),
            thresholds: default_thresholds(),
        }
    }
}

fn default_reconnect_interval() -> u64 {
    5
}

fn default_max_reconnect_attempts() -> u32 {
    10
}

fn default_archive_file() -> String {
    "data/last_prices_ws.json".to_string()
}

fn default_arbitrage_output() -> String {
    "data/arbitrage_analysis.json".to_string()
}

fn default_arbitrage_interval() -> u64 {
    1
}

fn default_volume_trade() -> f64 {
    100.0
}

fn default_tokens_output() -> String {
    "data/tokens_analyzer.json".to_string()
}

fn default_tokens_replay_output() -> String {
    "data/tokens_analyzer_replay.json".to_string()
}

fn default_tokens_interval() -> u64 {
    60
}

fn default_periods() -> HashMap<String, String> {
    METRIC_NAMES
        .iter()
        .map(|m| (m.to_string(), "1h".to_string()))
        .collect()
}

fn default_thresholds() -> HashMap<String, f64> {
    METRIC_NAMES.iter().map(|m| (m.to_string(), 0.0)).collect()
}

impl MonitorConfig {
    /// Load configuration from a YAML file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path.as_ref())?;
        let config: MonitorConfig =
            serde_yaml::from_str(&content).map_err(|e| ConfigError::Parse(e.to_string()))?;
        Ok(config)
    }

    /// Save configuration to a YAML file.
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<(), ConfigError> {
        let content =
            serde_yaml::to_string(self).map_err(|e| ConfigError::Parse(e.to_string()))?;
        std::fs::write(path.as_ref(), content)?;
        Ok(())
    }

    /// Validate configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.symbols.spot.is_empty() || self.symbols.future.is_empty() {
            return Err(ConfigError::Validation(
                "spot and future symbols must be set".to_string(),
            ));
        }

        if self.exchanges.list.is_empty() {
            return Err(ConfigError::Validation(
                "No exchanges configured".to_string(),
            ));
        }

        for exchange in &self.exchanges.list {
            if exchange.is_empty() {
                return Err(ConfigError::Validation(
                    "Exchange id cannot be empty".to_string(),
                ));
            }
        }

        if self.exchanges.reconnect_interval_secs == 0 {
            return Err(ConfigError::Validation(
                "Reconnect interval must be greater than 0".to_string(),
            ));
        }

        if self.arbitrage.interval_secs == 0 {
            return Err(ConfigError::Validation(
                "Arbitrage interval must be greater than 0".to_string(),
            ));
        }

        if self.arbitrage.volume_trade < 0.0 {
            return Err(ConfigError::Validation(
                "Notional trade volume cannot be negative".to_string(),
            ));
        }

        if self.tokens.interval_secs == 0 {
            return Err(ConfigError::Validation(
                "Tokens interval must be greater than 0".to_string(),
            ));
        }

        for (metric, period) in &self.tokens.periods {
            if parse_period(period).is_none() {
                return Err(ConfigError::Validation(format!(
                    "Unknown period '{period}' for metric '{metric}'"
                )));
            }
        }

        for (metric, threshold) in &self.tokens.thresholds {
            if *threshold < 0.0 {
                return Err(ConfigError::Validation(format!(
                    "Threshold for metric '{metric}' cannot be negative"
                )));
            }
        }

        Ok(())
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("Validation error: {0}")]
    Validation(String),
}
