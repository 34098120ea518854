use chrono::{DateTime, Utc};
use common::{PriceLevel, QuoteRecord};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Datetime format used in result records and dedup keys.
pub const DATETIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Rounds to a fixed number of decimal places, matching the precision
/// persisted in the result log.
pub fn round_to(value: f64, decimals: i32) -> f64 {
    let factor = 10f64.powi(decimals);
    (value * factor).round() / factor
}

/// Per-exchange quote embedded in a result record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExchangeQuote {
    pub exchange: String,
    pub timestamp: i64,
    pub ask: Option<PriceLevel>,
    pub bid: Option<PriceLevel>,
}

/// A dated arbitrage opportunity. Immutable once appended to the result log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArbitrageResult {
    pub symbol: String,
    pub datetime: String,
    pub exchange_future: Vec<ExchangeQuote>,
    pub bid: PriceLevel,
    pub ask: PriceLevel,
    pub price_diff: f64,
    pub price_diff_perc: f64,
    pub max_volume: f64,
    pub medium_price: f64,
    pub volume_trade: f64,
    pub bid_profit: f64,
    pub ask_profit: f64,
    pub pls: f64,
}

/// Outcome of one evaluation: either a priced opportunity or an explicit
/// "nothing tradable in this snapshot".
#[derive(Debug, Clone, PartialEq)]
pub enum Evaluation {
    NoOpportunity,
    Opportunity(Box<ArbitrageResult>),
}

/// Reduces ledger entries to the freshest futures quote per exchange at or
/// before `target_ts`.
///
/// Equal timestamps keep the earlier-appended entry. The sorted map makes
/// downstream tie-breaks deterministic: lexicographically smaller exchange
/// ids are considered first.
pub fn latest_per_exchange(
    entries: &[QuoteRecord],
    target_ts: i64,
) -> BTreeMap<String, QuoteRecord> {
    let mut last: BTreeMap<String, QuoteRecord> = BTreeMap::new();
    for entry in entries {
        if entry.exchange.is_empty() || !entry.is_future() {
            continue;
        }
        if entry.timestamp == 0 || entry.timestamp > target_ts {
            continue;
        }
        let newer = last
            .get(&entry.exchange)
            .map_or(true, |prev| prev.timestamp < entry.timestamp);
        if newer {
            last.insert(entry.exchange.clone(), entry.clone());
        }
    }
    last
}

/// Evaluates one snapshot into an arbitrage result.
///
/// The best bid is the highest bid price across exchanges, the best ask the
/// lowest ask price; ties keep the lexicographically smallest exchange id.
/// Profit is modelled for the fixed notional `volume_trade` against the
/// midpoint of best bid and best ask.
pub fn evaluate(
    snapshot: &BTreeMap<String, QuoteRecord>,
    symbol: &str,
    target_ts: i64,
    is_realtime: bool,
    volume_trade: f64,
) -> Evaluation {
    if snapshot.is_empty() {
        return Evaluation::NoOpportunity;
    }

    let bids: Vec<(&String, &QuoteRecord, PriceLevel)> = snapshot
        .iter()
        .filter_map(|(exchange, entry)| entry.bid.map(|bid| (exchange, entry, bid)))
        .collect();
    let asks: Vec<(&String, &QuoteRecord, PriceLevel)> = snapshot
        .iter()
        .filter_map(|(exchange, entry)| entry.ask.map(|ask| (exchange, entry, ask)))
        .collect();

    if bids.is_empty() || asks.is_empty() {
        return Evaluation::NoOpportunity;
    }

    let mut best_bid = bids[0].2;
    for (_, _, bid) in &bids[1..] {
        if bid.price > best_bid.price {
            best_bid = *bid;
        }
    }
    let mut best_ask = asks[0].2;
    for (_, _, ask) in &asks[1..] {
        if ask.price < best_ask.price {
            best_ask = *ask;
        }
    }

    let datetime = if is_realtime {
        Utc::now().format(DATETIME_FORMAT).to_string()
    } else {
        DateTime::<Utc>::from_timestamp(target_ts / 1000, 0)
            .map(|dt| dt.format(DATETIME_FORMAT).to_string())
            .unwrap_or_default()
    };

    let price_diff = best_bid.price - best_ask.price;
    let price_diff_perc = if best_ask.price != 0.0 {
        price_diff / best_ask.price
    } else {
        0.0
    };
    let max_volume = best_bid.volume.min(best_ask.volume);
    let medium_price = (best_bid.price + best_ask.price) / 2.0;

    let bid_profit = volume_trade * ((best_bid.price - medium_price) / medium_price);
    let ask_profit = volume_trade * ((medium_price - best_ask.price) / best_ask.price);
    let pls = bid_profit + ask_profit;

    let exchange_future = snapshot
        .iter()
        .filter(|(_, entry)| entry.bid.is_some() && entry.ask.is_some())
        .map(|(exchange, entry)| ExchangeQuote {
            exchange: exchange.clone(),
            timestamp: entry.timestamp,
            ask: entry.ask,
            bid: entry.bid,
        })
        .collect();

    Evaluation::Opportunity(Box::new(ArbitrageResult {
        symbol: symbol.to_string(),
        datetime,
        exchange_future,
        bid: PriceLevel::new(round_to(best_bid.price, 2), round_to(best_bid.volume, 4)),
        ask: PriceLevel::new(round_to(best_ask.price, 2), round_to(best_ask.volume, 4)),
        price_diff: round_to(price_diff, 4),
        price_diff_perc: round_to(price_diff_perc, 4),
        max_volume: round_to(max_volume, 4),
        medium_price: round_to(medium_price, 2),
        volume_trade: round_to(volume_trade, 4),
        bid_profit: round_to(bid_profit, 4),
        ask_profit: round_to(ask_profit, 4),
        pls: round_to(pls, 4),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn future_quote(
        exchange: &str,
        ts: i64,
        bid: Option<(f64, f64)>,
        ask: Option<(f64, f64)>,
    ) -> QuoteRecord {
        QuoteRecord {
            exchange: exchange.to_string(),
            symbol: "BTC/USDT:USDT".to_string(),
            label: format!("future_{exchange}"),
            timestamp: ts,
            datetime: None,
            ask: ask.map(|(p, v)| PriceLevel::new(p, v)),
            bid: bid.map(|(p, v)| PriceLevel::new(p, v)),
        }
    }

    #[test]
    fn test_snapshot_keeps_latest_at_or_before_target() {
        let entries = vec![
            future_quote("a", 100, Some((10.0, 1.0)), None),
            future_quote("a", 200, Some((12.0, 1.0)), None),
            future_quote("b", 150, Some((11.0, 1.0)), None),
        ];
        let snapshot = latest_per_exchange(&entries, 200);
        assert_eq!(snapshot.len(), 2);
        assert_eq!(snapshot["a"].timestamp, 200);
        assert_eq!(snapshot["b"].timestamp, 150);
    }

    #[test]
    fn test_snapshot_excludes_spot_and_too_new_entries() {
        let mut spot = future_quote("a", 100, Some((10.0, 1.0)), None);
        spot.label = "spot_a".to_string();
        let entries = vec![
            spot,
            future_quote("a", 300, Some((12.0, 1.0)), None),
            future_quote("b", 150, Some((11.0, 1.0)), None),
        ];
        let snapshot = latest_per_exchange(&entries, 200);
        assert_eq!(snapshot.len(), 1);
        assert_eq!(snapshot["b"].timestamp, 150);
    }

    #[test]
    fn test_snapshot_timestamp_tie_keeps_earlier_entry() {
        let entries = vec![
            future_quote("a", 100, Some((10.0, 1.0)), None),
            future_quote("a", 100, Some((99.0, 1.0)), None),
        ];
        let snapshot = latest_per_exchange(&entries, 200);
        assert_eq!(snapshot["a"].bid.unwrap().price, 10.0);
    }

    #[test]
    fn test_evaluate_arithmetic() {
        let mut snapshot = BTreeMap::new();
        snapshot.insert(
            "x".to_string(),
            future_quote("x", 1_000, Some((100.0, 5.0)), None),
        );
        snapshot.insert(
            "y".to_string(),
            future_quote("y", 1_000, None, Some((98.0, 3.0))),
        );

        let result = match evaluate(&snapshot, "BTC/USDT:USDT", 1_000, false, 100.0) {
            Evaluation::Opportunity(result) => result,
            Evaluation::NoOpportunity => panic!("expected an opportunity"),
        };

        assert_eq!(result.price_diff, 2.0);
        assert_eq!(result.price_diff_perc, 0.0204);
        assert_eq!(result.max_volume, 3.0);
        assert_eq!(result.medium_price, 99.0);
        assert_eq!(result.bid_profit, 1.0101);
        assert_eq!(result.ask_profit, 1.0204);
        assert_eq!(result.pls, 2.0305);
        assert_eq!(result.bid, PriceLevel::new(100.0, 5.0));
        assert_eq!(result.ask, PriceLevel::new(98.0, 3.0));
        // One-sided entries are excluded from the exchange_future listing.
        assert!(result.exchange_future.is_empty());
    }

    #[test]
    fn test_evaluate_requires_both_sides_somewhere() {
        let mut snapshot = BTreeMap::new();
        snapshot.insert(
            "x".to_string(),
            future_quote("x", 1_000, Some((100.0, 5.0)), None),
        );
        assert_eq!(
            evaluate(&snapshot, "BTC/USDT:USDT", 1_000, false, 100.0),
            Evaluation::NoOpportunity
        );
        assert_eq!(
            evaluate(&BTreeMap::new(), "BTC/USDT:USDT", 1_000, false, 100.0),
            Evaluation::NoOpportunity
        );
    }

    #[test]
    fn test_evaluate_tie_break_is_lexicographic() {
        // Both exchanges quote the identical best bid; the result must be
        // deterministic regardless of insertion order.
        let mut snapshot = BTreeMap::new();
        snapshot.insert(
            "zeta".to_string(),
            future_quote("zeta", 1_000, Some((100.0, 9.0)), Some((101.0, 1.0))),
        );
        snapshot.insert(
            "alpha".to_string(),
            future_quote("alpha", 1_000, Some((100.0, 2.0)), Some((101.0, 4.0))),
        );

        let result = match evaluate(&snapshot, "BTC/USDT:USDT", 1_000, false, 100.0) {
            Evaluation::Opportunity(result) => result,
            Evaluation::NoOpportunity => panic!("expected an opportunity"),
        };
        // alpha's volumes win both sides of the tie.
        assert_eq!(result.bid.volume, 2.0);
        assert_eq!(result.ask.volume, 4.0);
    }

    #[test]
    fn test_evaluate_zero_ask_price() {
        let mut snapshot = BTreeMap::new();
        snapshot.insert(
            "x".to_string(),
            future_quote("x", 1_000, Some((10.0, 1.0)), Some((0.0, 1.0))),
        );
        let result = match evaluate(&snapshot, "BTC/USDT:USDT", 1_000, false, 100.0) {
            Evaluation::Opportunity(result) => result,
            Evaluation::NoOpportunity => panic!("expected an opportunity"),
        };
        assert_eq!(result.price_diff_perc, 0.0);
    }

    #[test]
    fn test_replay_datetime_derives_from_target_second() {
        let mut snapshot = BTreeMap::new();
        snapshot.insert(
            "x".to_string(),
            future_quote("x", 1_700_000_000_123, Some((100.0, 1.0)), Some((99.0, 1.0))),
        );
        let result = match evaluate(
            &snapshot,
            "BTC/USDT:USDT",
            1_700_000_000_000,
            false,
            100.0,
        ) {
            Evaluation::Opportunity(result) => result,
            Evaluation::NoOpportunity => panic!("expected an opportunity"),
        };
        assert_eq!(result.datetime, "2023-11-14 22:13:20");
    }
}
