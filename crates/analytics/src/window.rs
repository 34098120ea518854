use common::QuoteRecord;
use std::collections::{HashMap, VecDeque};

/// Retention cap per buffer: one entry per second over 24 hours.
pub const MAX_WINDOW_ENTRIES: usize = 86_400;

/// Extracts the base-asset token from a symbol, lowercased:
/// `BTC/USDT:USDT` -> `btc`.
pub fn extract_token(symbol: &str) -> String {
    match symbol.split_once('/') {
        Some((base, _)) => base.to_lowercase(),
        None => symbol.to_lowercase(),
    }
}

/// One observation in the price window.
#[derive(Debug, Clone, PartialEq)]
pub struct PricePoint {
    pub timestamp: i64,
    /// Mid price when both sides are present, else the present side.
    pub price: f64,
    pub ask_price: f64,
    pub bid_price: f64,
    pub high: f64,
    pub low: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct VolumePoint {
    pub timestamp: i64,
    pub volume: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TradePoint {
    pub timestamp: i64,
}

/// Fixed shape of the three bounded buffers kept per (exchange, token).
/// Owned exclusively by the analyzer; mutated only by ingestion.
#[derive(Debug, Default)]
pub struct TokenWindows {
    pub price: VecDeque<PricePoint>,
    pub volume: VecDeque<VolumePoint>,
    pub trade: VecDeque<TradePoint>,
}

fn push_capped<T>(buffer: &mut VecDeque<T>, item: T) {
    buffer.push_back(item);
    while buffer.len() > MAX_WINDOW_ENTRIES {
        buffer.pop_front();
    }
}

/// Registry of window buffers keyed by (exchange, token), created lazily on
/// first observation.
#[derive(Debug, Default)]
pub struct WindowRegistry {
    windows: HashMap<(String, String), TokenWindows>,
}

impl WindowRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, exchange: &str, token: &str) -> Option<&TokenWindows> {
        self.windows
            .get(&(exchange.to_string(), token.to_string()))
    }

    pub fn iter(&self) -> impl Iterator<Item = (&(String, String), &TokenWindows)> {
        self.windows.iter()
    }

    pub fn len(&self) -> usize {
        self.windows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.windows.is_empty()
    }

    /// Newest timestamp across every buffer, for the dataset-relative clock.
    pub fn latest_timestamp(&self) -> Option<i64> {
        self.windows
            .values()
            .flat_map(|w| w.price.back().map(|p| p.timestamp))
            .max()
    }

    /// Ingests one ledger record into the pair's buffers.
    ///
    /// A record with neither side carries no price and is skipped. Volume is
    /// taken from the bid side when present, else the ask side, else zero;
    /// every accepted record counts as one trade tick.
    pub fn process(&mut self, record: &QuoteRecord) {
        if record.exchange.is_empty() {
            return;
        }
        let token = extract_token(&record.symbol);
        if token.is_empty() {
            return;
        }

        let ask_price = record.ask.map(|l| l.price).unwrap_or(0.0);
        let bid_price = record.bid.map(|l| l.price).unwrap_or(0.0);
        let price = if ask_price > 0.0 && bid_price > 0.0 {
            (ask_price + bid_price) / 2.0
        } else if ask_price > 0.0 {
            ask_price
        } else if bid_price > 0.0 {
            bid_price
        } else {
            return;
        };

        let volume = record
            .bid
            .map(|l| l.volume)
            .or_else(|| record.ask.map(|l| l.volume))
            .unwrap_or(0.0);

        let windows = self
            .windows
            .entry((record.exchange.clone(), token))
            .or_default();

        push_capped(
            &mut windows.price,
            PricePoint {
                timestamp: record.timestamp,
                price,
                ask_price,
                bid_price,
                high: ask_price.max(bid_price),
                low: ask_price.min(bid_price),
            },
        );
        push_capped(
            &mut windows.volume,
            VolumePoint {
                timestamp: record.timestamp,
                volume,
            },
        );
        push_capped(
            &mut windows.trade,
            TradePoint {
                timestamp: record.timestamp,
            },
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use common::PriceLevel;

    fn quote(
        exchange: &str,
        symbol: &str,
        ts: i64,
        ask: Option<(f64, f64)>,
        bid: Option<(f64, f64)>,
    ) -> QuoteRecord {
        QuoteRecord {
            exchange: exchange.to_string(),
            symbol: symbol.to_string(),
            label: format!("future_{exchange}"),
            timestamp: ts,
            datetime: None,
            ask: ask.map(|(p, v)| PriceLevel::new(p, v)),
            bid: bid.map(|(p, v)| PriceLevel::new(p, v)),
        }
    }

    #[test]
    fn test_extract_token() {
        assert_eq!(extract_token("BTC/USDT:USDT"), "btc");
        assert_eq!(extract_token("ETH/USDT"), "eth");
        assert_eq!(extract_token("DOGE"), "doge");
    }

    #[test]
    fn test_process_mid_price_and_sides() {
        let mut registry = WindowRegistry::new();
        registry.process(&quote(
            "binance",
            "BTC/USDT",
            1,
            Some((101.0, 2.0)),
            Some((99.0, 3.0)),
        ));

        let windows = registry.get("binance", "btc").unwrap();
        let point = &windows.price[0];
        assert_eq!(point.price, 100.0);
        assert_eq!(point.high, 101.0);
        assert_eq!(point.low, 99.0);
        // Bid volume is preferred.
        assert_eq!(windows.volume[0].volume, 3.0);
        assert_eq!(windows.trade.len(), 1);
    }

    #[test]
    fn test_process_one_sided_quotes() {
        let mut registry = WindowRegistry::new();
        registry.process(&quote("binance", "BTC/USDT", 1, Some((101.0, 2.0)), None));
        registry.process(&quote("binance", "BTC/USDT", 2, None, Some((99.0, 3.0))));
        // Neither side: skipped entirely.
        registry.process(&quote("binance", "BTC/USDT", 3, None, None));

        let windows = registry.get("binance", "btc").unwrap();
        assert_eq!(windows.price.len(), 2);
        assert_eq!(windows.price[0].price, 101.0);
        assert_eq!(windows.price[1].price, 99.0);
        // Ask volume is the fallback when there is no bid.
        assert_eq!(windows.volume[0].volume, 2.0);
    }

    #[test]
    fn test_window_eviction_drops_oldest_first() {
        let mut registry = WindowRegistry::new();
        for i in 0..(MAX_WINDOW_ENTRIES + 10) {
            registry.process(&quote(
                "binance",
                "BTC/USDT",
                i as i64,
                Some((100.0, 1.0)),
                Some((99.0, 1.0)),
            ));
        }
        let windows = registry.get("binance", "btc").unwrap();
        assert_eq!(windows.price.len(), MAX_WINDOW_ENTRIES);
        assert_eq!(windows.price.front().unwrap().timestamp, 10);
        assert_eq!(windows.volume.len(), MAX_WINDOW_ENTRIES);
        assert_eq!(windows.trade.len(), MAX_WINDOW_ENTRIES);
    }

    #[test]
    fn test_registry_lazy_creation_and_latest_timestamp() {
        let mut registry = WindowRegistry::new();
        assert!(registry.is_empty());
        registry.process(&quote("binance", "BTC/USDT", 5, Some((1.0, 1.0)), None));
        registry.process(&quote("okx", "ETH/USDT", 9, Some((1.0, 1.0)), None));
        assert_eq!(registry.len(), 2);
        assert_eq!(registry.latest_timestamp(), Some(9));
    }
}
