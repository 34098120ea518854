use crate::deduplicator::ResultDeduplicator;
use crate::evaluate::{evaluate, latest_per_exchange, ArbitrageResult, Evaluation};
use crate::result_log::{load_results, save_results};
use chrono::Utc;
use common::{ArtifactError, PriceLedger};
use config::ArbitrageConfig;
use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tracing::{error, info};

/// Long-running arbitrage analysis over the shared ledger.
///
/// On construction the persisted result log seeds the dedup set. A replay
/// pass covers historical data once, then the live loop evaluates the
/// current second on every interval tick. A failing cycle is logged and the
/// loop continues; the task only exits on shutdown.
pub struct ArbitrageAnalyzer {
    ledger: Arc<PriceLedger>,
    symbol: String,
    settings: ArbitrageConfig,
    results: Vec<ArbitrageResult>,
    dedup: ResultDeduplicator,
}

impl ArbitrageAnalyzer {
    pub fn new(ledger: Arc<PriceLedger>, symbol: String, settings: ArbitrageConfig) -> Self {
        let results = load_results(&settings.output_file);
        let mut dedup = ResultDeduplicator::new();
        dedup.seed(&results);
        if !results.is_empty() {
            info!(
                count = results.len(),
                path = %settings.output_file,
                "Seeded dedup set from existing result log"
            );
        }
        Self {
            ledger,
            symbol,
            settings,
            results,
            dedup,
        }
    }

    pub fn results(&self) -> &[ArbitrageResult] {
        &self.results
    }

    /// Backfills results for every distinct second present in the ledger.
    /// Only runs when no prior results were loaded.
    pub fn replay(&mut self) -> Result<usize, ArtifactError> {
        if !self.results.is_empty() {
            return Ok(0);
        }
        let entries = self.ledger.snapshot();
        let seconds: BTreeSet<i64> = entries
            .iter()
            .filter(|e| e.timestamp != 0)
            .map(|e| e.timestamp / 1000 * 1000)
            .collect();

        let mut appended = 0;
        for second in seconds {
            let snapshot = latest_per_exchange(&entries, second);
            if let Evaluation::Opportunity(result) =
                evaluate(&snapshot, &self.symbol, second, false, self.settings.volume_trade)
            {
                if !self.dedup.is_duplicate(&result) {
                    self.results.push(*result);
                    appended += 1;
                }
            }
        }

        save_results(&self.settings.output_file, &self.results)?;
        info!(appended, "Replay pass over historical quotes complete");
        Ok(appended)
    }

    /// Evaluates the ledger once against the given wall-clock time floored to
    /// the second. Returns whether a new result was appended.
    pub fn tick(&mut self, now_ms: i64) -> Result<bool, ArtifactError> {
        let now_sec = now_ms / 1000 * 1000;
        let entries = self.ledger.snapshot();
        let snapshot = latest_per_exchange(&entries, now_sec);
        match evaluate(&snapshot, &self.symbol, now_sec, true, self.settings.volume_trade) {
            Evaluation::Opportunity(result) => {
                if self.dedup.is_duplicate(&result) {
                    return Ok(false);
                }
                info!(
                    datetime = %result.datetime,
                    price_diff = result.price_diff,
                    pls = result.pls,
                    "Arbitrage opportunity recorded"
                );
                self.results.push(*result);
                save_results(&self.settings.output_file, &self.results)?;
                Ok(true)
            }
            Evaluation::NoOpportunity => Ok(false),
        }
    }

    /// Runs the analyzer until shutdown.
    pub async fn run(mut self, mut shutdown: watch::Receiver<bool>) {
        if let Err(e) = self.replay() {
            error!(error = %e, "Failed to persist replay results");
        }

        let interval = Duration::from_secs(self.settings.interval_secs);
        loop {
            tokio::select! {
                _ = shutdown.changed() => {
                    info!("Arbitrage analyzer shutting down");
                    break;
                }
                _ = tokio::time::sleep(interval) => {
                    if let Err(e) = self.tick(Utc::now().timestamp_millis()) {
                        error!(error = %e, "Error in arbitrage analysis cycle");
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use common::{PriceLevel, QuoteRecord};

    fn future_quote(exchange: &str, ts: i64, bid: (f64, f64), ask: (f64, f64)) -> QuoteRecord {
        QuoteRecord {
            exchange: exchange.to_string(),
            symbol: "BTC/USDT:USDT".to_string(),
            label: format!("future_{exchange}"),
            timestamp: ts,
            datetime: None,
            ask: Some(PriceLevel::new(ask.0, ask.1)),
            bid: Some(PriceLevel::new(bid.0, bid.1)),
        }
    }

    fn settings(dir: &tempfile::TempDir) -> ArbitrageConfig {
        ArbitrageConfig {
            output_file: dir
                .path()
                .join("arbitrage_analysis.json")
                .to_string_lossy()
                .into_owned(),
            interval_secs: 1,
            volume_trade: 100.0,
        }
    }

    fn seeded_ledger() -> Arc<PriceLedger> {
        let ledger = Arc::new(PriceLedger::new());
        // Two distinct seconds across two exchanges.
        ledger.append(future_quote("binance", 1_000, (100.0, 5.0), (100.5, 2.0)));
        ledger.append(future_quote("okx", 1_200, (101.0, 1.0), (98.0, 3.0)));
        ledger.append(future_quote("binance", 2_100, (102.0, 4.0), (102.5, 2.0)));
        ledger
    }

    #[test]
    fn test_replay_covers_each_distinct_second() {
        let dir = tempfile::tempdir().unwrap();
        let mut analyzer =
            ArbitrageAnalyzer::new(seeded_ledger(), "BTC/USDT:USDT".to_string(), settings(&dir));

        let appended = analyzer.replay().unwrap();
        assert_eq!(appended, 2);
        assert_eq!(analyzer.results()[0].datetime, "1970-01-01 00:00:01");
        assert_eq!(analyzer.results()[1].datetime, "1970-01-01 00:00:02");
    }

    #[test]
    fn test_replay_is_idempotent_across_restarts() {
        let dir = tempfile::tempdir().unwrap();
        let ledger = seeded_ledger();

        let mut first =
            ArbitrageAnalyzer::new(ledger.clone(), "BTC/USDT:USDT".to_string(), settings(&dir));
        assert_eq!(first.replay().unwrap(), 2);

        // A fresh analyzer loads the persisted log and appends nothing.
        let mut second =
            ArbitrageAnalyzer::new(ledger, "BTC/USDT:USDT".to_string(), settings(&dir));
        assert_eq!(second.replay().unwrap(), 0);
        assert_eq!(second.results().len(), 2);
    }

    #[test]
    fn test_tick_appends_and_persists() {
        let dir = tempfile::tempdir().unwrap();
        let cfg = settings(&dir);
        let mut analyzer =
            ArbitrageAnalyzer::new(seeded_ledger(), "BTC/USDT:USDT".to_string(), cfg.clone());

        assert!(analyzer.tick(5_000).unwrap());
        assert_eq!(analyzer.results().len(), 1);
        // The log on disk matches the in-memory state.
        assert_eq!(
            crate::result_log::load_results(&cfg.output_file),
            analyzer.results()
        );
        // A target before any quote yields an empty snapshot.
        assert!(!analyzer.tick(500).unwrap());
    }

    #[test]
    fn test_tick_with_empty_ledger_is_no_opportunity() {
        let dir = tempfile::tempdir().unwrap();
        let mut analyzer = ArbitrageAnalyzer::new(
            Arc::new(PriceLedger::new()),
            "BTC/USDT:USDT".to_string(),
            settings(&dir),
        );
        assert!(!analyzer.tick(5_000).unwrap());
        assert!(analyzer.results().is_empty());
    }
}
