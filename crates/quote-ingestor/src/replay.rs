use crate::archive::load_archive;
use crate::provider::{BookTop, OrderBookProvider};
use anyhow::{anyhow, Result};
use async_trait::async_trait;
use common::{ExchangeId, QuoteRecord};
use std::collections::{HashMap, VecDeque};
use std::path::Path;
use std::sync::Mutex;
use std::time::Instant;
use tokio::time::{sleep_until, Duration};

struct Pacing {
    first_timestamp_ms: Option<i64>,
    start_instant: Instant,
}

/// Connectivity provider that replays a recorded quote archive.
///
/// Each (exchange, symbol) pair is served its recorded quotes in FIFO
/// order, paced by the recorded timestamps scaled by `replay_speed`
/// (1.0 = real time). A pair whose recording is exhausted reports an error,
/// which the supervisor treats like any other stream failure.
pub struct ReplayProvider {
    queues: Mutex<HashMap<(String, String), VecDeque<QuoteRecord>>>,
    pacing: Mutex<Pacing>,
    replay_speed: f64,
}

impl ReplayProvider {
    pub fn from_archive<P: AsRef<Path>>(path: P, replay_speed: f64) -> Result<Self> {
        let records = load_archive(path.as_ref());
        if records.is_empty() {
            return Err(anyhow!(
                "no quotes found in replay archive {}",
                path.as_ref().display()
            ));
        }
        Ok(Self::from_records(records, replay_speed))
    }

    pub fn from_records(records: Vec<QuoteRecord>, replay_speed: f64) -> Self {
        let mut queues: HashMap<(String, String), VecDeque<QuoteRecord>> = HashMap::new();
        for record in records {
            queues
                .entry((record.exchange.clone(), record.symbol.clone()))
                .or_default()
                .push_back(record);
        }
        Self {
            queues: Mutex::new(queues),
            pacing: Mutex::new(Pacing {
                first_timestamp_ms: None,
                start_instant: Instant::now(),
            }),
            replay_speed,
        }
    }

    /// Computes the deadline for a record, anchoring the clock to the first
    /// timestamp handed out.
    fn deadline_for(&self, timestamp_ms: i64) -> Option<Instant> {
        if self.replay_speed <= 0.0 {
            return None;
        }
        let mut pacing = self.pacing.lock().expect("pacing lock poisoned");
        let first = match pacing.first_timestamp_ms {
            Some(first) => first,
            None => {
                pacing.first_timestamp_ms = Some(timestamp_ms);
                pacing.start_instant = Instant::now();
                timestamp_ms
            }
        };
        let elapsed_ms = (timestamp_ms - first).max(0) as u64;
        let delay = Duration::from_millis((elapsed_ms as f64 / self.replay_speed) as u64);
        Some(pacing.start_instant + delay)
    }
}

#[async_trait]
impl OrderBookProvider for ReplayProvider {
    async fn subscribe_order_book(
        &self,
        exchange: &ExchangeId,
        symbol: &str,
    ) -> Result<BookTop> {
        let record = {
            let mut queues = self.queues.lock().expect("replay queue lock poisoned");
            queues
                .get_mut(&(exchange.0.clone(), symbol.to_string()))
                .and_then(|queue| queue.pop_front())
        }
        .ok_or_else(|| anyhow!("replay exhausted for {exchange} {symbol}"))?;

        if let Some(deadline) = self.deadline_for(record.timestamp) {
            sleep_until(deadline.into()).await;
        }

        Ok(BookTop {
            timestamp: Some(record.timestamp),
            datetime: record.datetime,
            asks: record.ask.map(|l| vec![(l.price, l.volume)]).unwrap_or_default(),
            bids: record.bid.map(|l| vec![(l.price, l.volume)]).unwrap_or_default(),
        })
    }

    async fn close(&self, _exchange: &ExchangeId) -> Result<()> {
        Ok(())
    }
}
