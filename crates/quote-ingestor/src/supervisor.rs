use crate::archive::ArchiveWriter;
use crate::provider::{BookTop, OrderBookProvider};
use chrono::Utc;
use common::{ArchiveLine, ExchangeId, PriceLedger, PriceLevel, QuoteRecord, StreamErrorRecord};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

/// Retry policy for one stream pair.
#[derive(Debug, Clone, Copy)]
pub struct SupervisorSettings {
    pub reconnect_interval: Duration,
    pub max_reconnect_attempts: u32,
}

impl Default for SupervisorSettings {
    fn default() -> Self {
        Self {
            reconnect_interval: Duration::from_secs(5),
            max_reconnect_attempts: 10,
        }
    }
}

/// Lifecycle of a single (exchange, symbol) stream.
///
/// `Connected` and `Retrying(n)` are transient; `Failed` is permanent and
/// isolated to the pair that exhausted its attempts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamState {
    Connected,
    Retrying(u32),
    Failed,
}

/// Coerces a raw provider payload into a ledger record. Only the best level
/// of each side is kept; an empty side passes through as `None`.
pub fn normalize(exchange: &ExchangeId, symbol: &str, label: &str, book: BookTop) -> QuoteRecord {
    QuoteRecord {
        exchange: exchange.0.clone(),
        symbol: symbol.to_string(),
        label: label.to_string(),
        timestamp: book.timestamp.unwrap_or(0),
        datetime: book.datetime,
        ask: book.asks.first().map(|&(p, v)| PriceLevel::new(p, v)),
        bid: book.bids.first().map(|&(p, v)| PriceLevel::new(p, v)),
    }
}

/// Runs one cooperative task per (exchange, symbol) pair, appending every
/// received quote to the shared ledger and the quote archive.
pub struct StreamSupervisor {
    provider: Arc<dyn OrderBookProvider>,
    ledger: Arc<PriceLedger>,
    archive: ArchiveWriter,
    settings: SupervisorSettings,
}

impl StreamSupervisor {
    pub fn new(
        provider: Arc<dyn OrderBookProvider>,
        ledger: Arc<PriceLedger>,
        archive: ArchiveWriter,
        settings: SupervisorSettings,
    ) -> Self {
        Self {
            provider,
            ledger,
            archive,
            settings,
        }
    }

    /// Drives one stream pair until shutdown or permanent failure.
    ///
    /// The reconnect counter resets on every successful quote, so only
    /// `max_reconnect_attempts` consecutive failures are terminal.
    pub async fn run_pair(
        &self,
        exchange: ExchangeId,
        symbol: String,
        label: String,
        mut shutdown: watch::Receiver<bool>,
    ) -> StreamState {
        let mut attempts = 0u32;
        let mut state = StreamState::Connected;

        while attempts < self.settings.max_reconnect_attempts {
            let next = tokio::select! {
                _ = shutdown.changed() => {
                    info!(exchange = %exchange, symbol = %symbol, "Stream shutting down");
                    return state;
                }
                result = self.provider.subscribe_order_book(&exchange, &symbol) => result,
            };

            match next {
                Ok(book) => {
                    let record = normalize(&exchange, &symbol, &label, book);
                    info!(
                        exchange = %exchange,
                        symbol = %symbol,
                        label = %label,
                        timestamp = record.timestamp,
                        "Quote received"
                    );
                    self.ledger.append(record.clone());
                    if let Err(e) = self.archive.append(&ArchiveLine::Quote(record)) {
                        warn!(exchange = %exchange, error = %e, "Failed to append quote to archive");
                    }
                    attempts = 0;
                    state = StreamState::Connected;
                }
                Err(e) => {
                    attempts += 1;
                    state = StreamState::Retrying(attempts);
                    let err_record = StreamErrorRecord {
                        error: e.to_string(),
                        exchange: exchange.0.clone(),
                        symbol: symbol.clone(),
                        label: label.clone(),
                        timestamp: Utc::now().to_rfc3339(),
                        reconnect_attempt: attempts,
                    };
                    error!(
                        exchange = %exchange,
                        symbol = %symbol,
                        attempt = attempts,
                        error = %e,
                        "Order book subscription failed"
                    );
                    if let Err(e) = self.archive.append(&ArchiveLine::Error(err_record)) {
                        warn!(exchange = %exchange, error = %e, "Failed to append error record to archive");
                    }

                    if attempts < self.settings.max_reconnect_attempts {
                        info!(
                            exchange = %exchange,
                            attempt = attempts,
                            max = self.settings.max_reconnect_attempts,
                            "Reconnecting in {}s",
                            self.settings.reconnect_interval.as_secs()
                        );
                        tokio::select! {
                            _ = shutdown.changed() => return state,
                            _ = tokio::time::sleep(self.settings.reconnect_interval) => {}
                        }
                    }
                }
            }
        }

        error!(
            exchange = %exchange,
            symbol = %symbol,
            "Max reconnection attempts reached, stopping stream"
        );
        StreamState::Failed
    }

    /// Spawns a spot and a futures stream task for every exchange.
    /// Tasks are independent; no ordering is guaranteed between pairs.
    pub fn spawn_all(
        self: &Arc<Self>,
        exchanges: &[ExchangeId],
        spot_symbol: &str,
        future_symbol: &str,
        shutdown: watch::Receiver<bool>,
    ) -> Vec<JoinHandle<StreamState>> {
        let mut handles = Vec::with_capacity(exchanges.len() * 2);
        for exchange in exchanges {
            for (symbol, role) in [(spot_symbol, "spot"), (future_symbol, "future")] {
                let supervisor = Arc::clone(self);
                let exchange = exchange.clone();
                let symbol = symbol.to_string();
                let label = format!("{role}_{exchange}");
                let shutdown = shutdown.clone();
                handles.push(tokio::spawn(async move {
                    supervisor.run_pair(exchange, symbol, label, shutdown).await
                }));
            }
        }
        handles
    }

    /// Closes every exchange subscription. Called once on shutdown so the
    /// connectivity provider can release its resources.
    pub async fn close_all(&self, exchanges: &[ExchangeId]) {
        for exchange in exchanges {
            if let Err(e) = self.provider.close(exchange).await {
                warn!(exchange = %exchange, error = %e, "Failed to close exchange connection");
            }
        }
    }
}
