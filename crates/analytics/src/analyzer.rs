use crate::metrics::{self, MetricThresholds, TokenMetrics, NATR_LOOKBACK};
use crate::window::WindowRegistry;
use chrono::Utc;
use common::{ArtifactError, LedgerCursor, PriceLedger};
use config::{parse_period, TokensConfig};
use std::collections::{BTreeMap, HashMap};
use std::fs::File;
use std::io::BufWriter;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tracing::{error, info};

const DEFAULT_PERIOD_SECS: u64 = 3_600;

/// Sliding-window length per metric, in milliseconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MetricPeriods {
    pub delta: i64,
    pub vol: i64,
    pub trade: i64,
    pub natr: i64,
    pub spread: i64,
    pub activity: i64,
}

impl MetricPeriods {
    /// Resolves configured period strings, falling back to one hour for any
    /// metric that is absent or unparseable.
    pub fn from_config(periods: &HashMap<String, String>) -> Self {
        let get = |metric: &str| -> i64 {
            periods
                .get(metric)
                .and_then(|p| parse_period(p))
                .unwrap_or(DEFAULT_PERIOD_SECS) as i64
                * 1_000
        };
        Self {
            delta: get("delta"),
            vol: get("vol"),
            trade: get("trade"),
            natr: get("NATR"),
            spread: get("spread"),
            activity: get("activity"),
        }
    }
}

impl MetricThresholds {
    pub fn from_config(thresholds: &HashMap<String, f64>) -> Self {
        let get = |metric: &str| thresholds.get(metric).copied().unwrap_or(0.0);
        Self {
            delta: get("delta"),
            vol: get("vol"),
            trade: get("trade"),
            natr: get("NATR"),
            spread: get("spread"),
            activity: get("activity"),
        }
    }
}

fn round4(value: f64) -> f64 {
    (value * 10_000.0).round() / 10_000.0
}

/// Metrics artifact shape: exchange -> token -> metrics.
pub type MetricsReport = BTreeMap<String, BTreeMap<String, TokenMetrics>>;

/// Periodic token-quality evaluation over the shared ledger.
///
/// New ledger entries are folded into per-(exchange, token) windows via a
/// cursor, so each record is ingested at most once. Every cycle computes the
/// six metrics per window, keeps only tokens clearing every threshold, and
/// rewrites the artifact file.
pub struct TokenAnalyzer {
    cursor: LedgerCursor,
    registry: WindowRegistry,
    periods: MetricPeriods,
    thresholds: MetricThresholds,
    settings: TokensConfig,
}

impl TokenAnalyzer {
    pub fn new(ledger: Arc<PriceLedger>, settings: TokensConfig) -> Self {
        Self {
            cursor: LedgerCursor::new(ledger),
            registry: WindowRegistry::new(),
            periods: MetricPeriods::from_config(&settings.periods),
            thresholds: MetricThresholds::from_config(&settings.thresholds),
            settings,
        }
    }

    /// Folds ledger entries appended since the last call into the windows.
    pub fn ingest_new(&mut self) -> usize {
        let entries = self.cursor.poll_new();
        for record in &entries {
            self.registry.process(record);
        }
        entries.len()
    }

    /// Evaluation reference point: the wall clock normally, the newest
    /// observed timestamp when replaying a fixed dataset.
    fn reference_timestamp(&self) -> i64 {
        if self.settings.test_mode {
            self.registry.latest_timestamp().unwrap_or(0)
        } else {
            Utc::now().timestamp_millis()
        }
    }

    /// Computes metrics for every window and drops tokens that miss any
    /// threshold.
    pub fn compute(&self, now_ms: i64) -> MetricsReport {
        let mut report = MetricsReport::new();
        for ((exchange, token), windows) in self.registry.iter() {
            let cutoff = |period_ms: i64| now_ms - period_ms;

            let delta_prices: Vec<_> = windows
                .price
                .iter()
                .filter(|p| p.timestamp >= cutoff(self.periods.delta))
                .cloned()
                .collect();
            let natr_prices: Vec<_> = windows
                .price
                .iter()
                .filter(|p| p.timestamp >= cutoff(self.periods.natr))
                .cloned()
                .collect();
            let spread_prices: Vec<_> = windows
                .price
                .iter()
                .filter(|p| p.timestamp >= cutoff(self.periods.spread))
                .cloned()
                .collect();
            let activity_prices: Vec<_> = windows
                .price
                .iter()
                .filter(|p| p.timestamp >= cutoff(self.periods.activity))
                .cloned()
                .collect();
            let volumes: Vec<_> = windows
                .volume
                .iter()
                .filter(|v| v.timestamp >= cutoff(self.periods.vol))
                .cloned()
                .collect();
            let trades: Vec<_> = windows
                .trade
                .iter()
                .filter(|t| t.timestamp >= cutoff(self.periods.trade))
                .cloned()
                .collect();

            // Thresholds compare against exact values; rounding happens
            // only on the way into the report.
            let computed = TokenMetrics {
                delta: metrics::delta(&delta_prices),
                vol: metrics::volume_sum(&volumes),
                trade: metrics::trade_count(&trades),
                natr: metrics::natr(&natr_prices, NATR_LOOKBACK),
                spread: metrics::spread(&spread_prices),
                activity: metrics::activity(&activity_prices),
            };

            if computed.passes(&self.thresholds) {
                let rounded = TokenMetrics {
                    delta: round4(computed.delta),
                    vol: round4(computed.vol),
                    trade: computed.trade,
                    natr: round4(computed.natr),
                    spread: round4(computed.spread),
                    activity: round4(computed.activity),
                };
                report
                    .entry(exchange.clone())
                    .or_default()
                    .insert(token.clone(), rounded);
            }
        }
        report
    }

    fn persist(path: &str, report: &MetricsReport) -> Result<(), ArtifactError> {
        let file = File::create(path)?;
        serde_json::to_writer_pretty(BufWriter::new(file), report)?;
        Ok(())
    }

    /// One full cycle: ingest, compute, rewrite the artifact. Returns the
    /// number of retained tokens.
    pub fn evaluate_once(&mut self) -> Result<usize, ArtifactError> {
        self.ingest_new();
        let report = self.compute(self.reference_timestamp());
        let retained: usize = report.values().map(|tokens| tokens.len()).sum();
        Self::persist(&self.settings.output_file, &report)?;
        Ok(retained)
    }

    /// One-time pass over everything already in the ledger, evaluated
    /// relative to the newest timestamp in the data and written to the
    /// replay artifact.
    pub fn replay(&mut self) -> Result<usize, ArtifactError> {
        let ingested = self.ingest_new();
        if ingested == 0 {
            return Ok(0);
        }
        let now_ms = self.registry.latest_timestamp().unwrap_or(0);
        let report = self.compute(now_ms);
        let retained: usize = report.values().map(|tokens| tokens.len()).sum();
        Self::persist(&self.settings.replay_output_file, &report)?;
        info!(ingested, retained, "Token metrics replay pass complete");
        Ok(retained)
    }

    /// Runs the analyzer until shutdown. A failing cycle is logged and the
    /// loop continues.
    pub async fn run(mut self, mut shutdown: watch::Receiver<bool>) {
        if let Err(e) = self.replay() {
            error!(error = %e, "Failed to persist token metrics replay artifact");
        }

        let interval = Duration::from_secs(self.settings.interval_secs);
        loop {
            tokio::select! {
                _ = shutdown.changed() => {
                    info!("Token analyzer shutting down");
                    break;
                }
                _ = tokio::time::sleep(interval) => {
                    match self.evaluate_once() {
                        Ok(retained) => info!(retained, "Token metrics artifact refreshed"),
                        Err(e) => error!(error = %e, "Error in token metrics cycle"),
                    }
                }
            }
        }
    }
}
