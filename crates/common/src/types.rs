use serde::{Deserialize, Serialize};
use std::fmt;

/// Represents a unique identifier for an exchange.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ExchangeId(pub String);

impl fmt::Display for ExchangeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for ExchangeId {
    fn from(s: &str) -> Self {
        ExchangeId(s.to_lowercase())
    }
}

/// One side of the top of an order book, serialized as `[price, volume]`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(from = "(f64, f64)", into = "(f64, f64)")]
pub struct PriceLevel {
    pub price: f64,
    pub volume: f64,
}

impl PriceLevel {
    pub fn new(price: f64, volume: f64) -> Self {
        PriceLevel { price, volume }
    }
}

impl From<(f64, f64)> for PriceLevel {
    fn from((price, volume): (f64, f64)) -> Self {
        PriceLevel { price, volume }
    }
}

impl From<PriceLevel> for (f64, f64) {
    fn from(level: PriceLevel) -> Self {
        (level.price, level.volume)
    }
}

/// A normalized top-of-book quote, immutable once appended to the ledger.
///
/// Either side may be absent; a record with neither carries no tradable
/// information but is still a valid ledger entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuoteRecord {
    pub exchange: String,
    pub symbol: String,
    /// Market-role tag, e.g. `future_binance` or `spot_binance`.
    pub label: String,
    /// Milliseconds since epoch. Not monotonic across the whole ledger.
    pub timestamp: i64,
    pub datetime: Option<String>,
    pub ask: Option<PriceLevel>,
    pub bid: Option<PriceLevel>,
}

impl QuoteRecord {
    /// Returns true if the label marks this record as a futures quote.
    pub fn is_future(&self) -> bool {
        self.label.starts_with("future")
    }
}

/// Structured record written to the error sink when a stream pair fails.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StreamErrorRecord {
    pub error: String,
    pub exchange: String,
    pub symbol: String,
    pub label: String,
    /// ISO-8601 wall-clock time of the failure.
    pub timestamp: String,
    pub reconnect_attempt: u32,
}

/// One line of the newline-delimited quote archive.
///
/// Error records carry an `error` field and a string timestamp, so the
/// untagged representation is unambiguous.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ArchiveLine {
    Error(StreamErrorRecord),
    Quote(QuoteRecord),
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_quote() -> QuoteRecord {
        QuoteRecord {
            exchange: "binance".to_string(),
            symbol: "BTC/USDT:USDT".to_string(),
            label: "future_binance".to_string(),
            timestamp: 1_700_000_000_000,
            datetime: Some("2023-11-14T22:13:20.000Z".to_string()),
            ask: Some(PriceLevel::new(100.5, 2.0)),
            bid: Some(PriceLevel::new(100.0, 1.5)),
        }
    }

    #[test]
    fn test_exchange_id_display_and_from_str() {
        let id = ExchangeId::from("Binance");
        assert_eq!(id, ExchangeId("binance".to_string()));
        assert_eq!(format!("{}", id), "binance");
    }

    #[test]
    fn test_price_level_serializes_as_pair() {
        let level = PriceLevel::new(100.5, 2.0);
        let json = serde_json::to_string(&level).unwrap();
        assert_eq!(json, "[100.5,2.0]");
        let back: PriceLevel = serde_json::from_str(&json).unwrap();
        assert_eq!(back, level);
    }

    #[test]
    fn test_quote_record_round_trip() {
        let record = sample_quote();
        let json = serde_json::to_string(&record).unwrap();
        let back: QuoteRecord = serde_json::from_str(&json).unwrap();
        assert_eq!(back, record);
    }

    #[test]
    fn test_quote_record_missing_sides() {
        let json = r#"{"exchange":"okx","symbol":"BTC/USDT","label":"spot_okx","timestamp":1,"datetime":null,"ask":null,"bid":null}"#;
        let record: QuoteRecord = serde_json::from_str(json).unwrap();
        assert!(record.ask.is_none());
        assert!(record.bid.is_none());
    }

    #[test]
    fn test_is_future_label() {
        let mut record = sample_quote();
        assert!(record.is_future());
        record.label = "spot_binance".to_string();
        assert!(!record.is_future());
    }

    #[test]
    fn test_archive_line_disambiguates_error_records() {
        let quote_json = serde_json::to_string(&sample_quote()).unwrap();
        let err_json = r#"{"error":"connection reset","exchange":"okx","symbol":"BTC/USDT","label":"future_okx","timestamp":"2023-11-14T22:13:20","reconnect_attempt":3}"#;

        match serde_json::from_str::<ArchiveLine>(&quote_json).unwrap() {
            ArchiveLine::Quote(q) => assert_eq!(q.exchange, "binance"),
            other => panic!("expected quote line, got {:?}", other),
        }
        match serde_json::from_str::<ArchiveLine>(err_json).unwrap() {
            ArchiveLine::Error(e) => assert_eq!(e.reconnect_attempt, 3),
            other => panic!("expected error line, got {:?}", other),
        }
    }
}
