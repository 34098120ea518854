use crate::window::{PricePoint, TradePoint, VolumePoint};
use serde::{Deserialize, Serialize};

/// True-range lookback for the NATR calculation.
pub const NATR_LOOKBACK: usize = 14;

/// The six market-quality metrics for one (exchange, token) window.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TokenMetrics {
    pub delta: f64,
    pub vol: f64,
    pub trade: u64,
    #[serde(rename = "NATR")]
    pub natr: f64,
    pub spread: f64,
    pub activity: f64,
}

/// Minimum value per metric for a token to be retained.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct MetricThresholds {
    pub delta: f64,
    pub vol: f64,
    pub trade: f64,
    pub natr: f64,
    pub spread: f64,
    pub activity: f64,
}

impl TokenMetrics {
    /// Every metric must meet its threshold, except that a NATR of exactly
    /// zero always passes: insufficient history is not penalized.
    pub fn passes(&self, thresholds: &MetricThresholds) -> bool {
        self.delta >= thresholds.delta
            && self.vol >= thresholds.vol
            && self.trade as f64 >= thresholds.trade
            && (self.natr >= thresholds.natr || self.natr == 0.0)
            && self.spread >= thresholds.spread
            && self.activity >= thresholds.activity
    }
}

/// Relative price change between the oldest and newest entry in the window.
/// A single entry yields the 0.0001 sentinel, not a real measurement.
pub fn delta(prices: &[PricePoint]) -> f64 {
    match prices {
        [] => 0.0,
        [_] => 0.0001,
        [first, .., last] => {
            if first.price == 0.0 {
                0.0
            } else {
                (last.price - first.price).abs() / first.price
            }
        }
    }
}

pub fn volume_sum(volumes: &[VolumePoint]) -> f64 {
    volumes.iter().map(|v| v.volume).sum()
}

pub fn trade_count(trades: &[TradePoint]) -> u64 {
    trades.len() as u64
}

/// Normalized Average True Range over the window.
///
/// Requires at least `lookback + 1` entries, else 0. True ranges are taken
/// between time-adjacent entries and averaged over the most recent
/// `lookback` of them, normalized by the newest price.
pub fn natr(prices: &[PricePoint], lookback: usize) -> f64 {
    if prices.len() < lookback + 1 {
        return 0.0;
    }

    let mut sorted: Vec<&PricePoint> = prices.iter().collect();
    sorted.sort_by_key(|p| p.timestamp);

    let true_ranges: Vec<f64> = sorted
        .windows(2)
        .map(|pair| {
            let prev_close = pair[0].price;
            let (high, low) = (pair[1].high, pair[1].low);
            (high - low)
                .max((high - prev_close).abs())
                .max((low - prev_close).abs())
        })
        .collect();

    let tail = &true_ranges[true_ranges.len().saturating_sub(lookback)..];
    let atr = tail.iter().sum::<f64>() / tail.len() as f64;

    let current_price = sorted[sorted.len() - 1].price;
    if current_price > 0.0 {
        atr / current_price
    } else {
        0.0
    }
}

/// Relative ask/bid gap of the single most recent entry, 0 when either side
/// is missing or zero.
pub fn spread(prices: &[PricePoint]) -> f64 {
    let last = match prices.last() {
        Some(last) => last,
        None => return 0.0,
    };
    if last.ask_price == 0.0 || last.bid_price == 0.0 {
        return 0.0;
    }
    (last.ask_price - last.bid_price) / last.ask_price
}

/// Inverse of the mean inter-update interval in seconds.
pub fn activity(prices: &[PricePoint]) -> f64 {
    if prices.len() < 2 {
        return 0.0;
    }

    let mut timestamps: Vec<i64> = prices.iter().map(|p| p.timestamp).collect();
    timestamps.sort_unstable();

    let total_gap: i64 = timestamps.windows(2).map(|pair| pair[1] - pair[0]).sum();
    let mean_interval_secs = total_gap as f64 / (timestamps.len() - 1) as f64 / 1000.0;
    if mean_interval_secs > 0.0 {
        1.0 / mean_interval_secs
    } else {
        0.0
    }
}
