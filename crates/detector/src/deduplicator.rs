use crate::evaluate::ArbitrageResult;
use std::collections::HashSet;

fn scaled(value: f64, factor: f64) -> i64 {
    (value * factor).round() as i64
}

/// Identity of a result for deduplication purposes.
///
/// Prices are held as scaled integers (2dp for prices, 6dp for the notional)
/// so the key is hashable and insensitive to float formatting.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DedupKey {
    symbol: String,
    datetime: String,
    medium_price_2dp: i64,
    price_diff_2dp: i64,
    volume_trade_6dp: i64,
}

impl DedupKey {
    pub fn of(result: &ArbitrageResult) -> Self {
        Self {
            symbol: result.symbol.clone(),
            datetime: result.datetime.clone(),
            medium_price_2dp: scaled(result.medium_price, 100.0),
            price_diff_2dp: scaled(result.price_diff, 100.0),
            volume_trade_6dp: scaled(result.volume_trade, 1_000_000.0),
        }
    }
}

/// Tracks result keys already appended to the log.
#[derive(Debug, Default)]
pub struct ResultDeduplicator {
    seen: HashSet<DedupKey>,
}

impl ResultDeduplicator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seeds the set from previously persisted results.
    pub fn seed<'a>(&mut self, results: impl IntoIterator<Item = &'a ArbitrageResult>) {
        for result in results {
            self.seen.insert(DedupKey::of(result));
        }
    }

    /// Checks whether a result is a duplicate. If not, it is recorded.
    pub fn is_duplicate(&mut self, result: &ArbitrageResult) -> bool {
        !self.seen.insert(DedupKey::of(result))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use common::PriceLevel;

    fn result(datetime: &str, medium_price: f64) -> ArbitrageResult {
        ArbitrageResult {
            symbol: "BTC/USDT:USDT".to_string(),
            datetime: datetime.to_string(),
            exchange_future: Vec::new(),
            bid: PriceLevel::new(100.0, 5.0),
            ask: PriceLevel::new(98.0, 3.0),
            price_diff: 2.0,
            price_diff_perc: 0.0204,
            max_volume: 3.0,
            medium_price,
            volume_trade: 100.0,
            bid_profit: 1.0101,
            ask_profit: 1.0204,
            pls: 2.0305,
        }
    }

    #[test]
    fn test_same_key_is_duplicate() {
        let mut dedup = ResultDeduplicator::new();
        let r = result("2023-11-14 22:13:20", 99.0);
        assert!(!dedup.is_duplicate(&r));
        assert!(dedup.is_duplicate(&r.clone()));
    }

    #[test]
    fn test_distinct_datetime_or_price_is_not_duplicate() {
        let mut dedup = ResultDeduplicator::new();
        assert!(!dedup.is_duplicate(&result("2023-11-14 22:13:20", 99.0)));
        assert!(!dedup.is_duplicate(&result("2023-11-14 22:13:21", 99.0)));
        assert!(!dedup.is_duplicate(&result("2023-11-14 22:13:20", 99.01)));
    }

    #[test]
    fn test_sub_precision_differences_collapse() {
        let mut dedup = ResultDeduplicator::new();
        let mut a = result("2023-11-14 22:13:20", 99.0);
        assert!(!dedup.is_duplicate(&a));
        // Below the 2dp precision of the key.
        a.medium_price = 99.001;
        assert!(dedup.is_duplicate(&a));
    }

    #[test]
    fn test_seed_from_persisted_results() {
        let existing = vec![result("2023-11-14 22:13:20", 99.0)];
        let mut dedup = ResultDeduplicator::new();
        dedup.seed(&existing);
        assert!(dedup.is_duplicate(&existing[0]));
    }
}
