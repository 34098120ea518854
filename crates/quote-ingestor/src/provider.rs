use anyhow::Result;
use async_trait::async_trait;
use common::ExchangeId;

/// Raw top-of-book payload delivered by a connectivity provider, one per
/// await. Levels are `(price, volume)` pairs, best first.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BookTop {
    /// Milliseconds since epoch, when the provider reports one.
    pub timestamp: Option<i64>,
    pub datetime: Option<String>,
    pub asks: Vec<(f64, f64)>,
    pub bids: Vec<(f64, f64)>,
}

/// Exchange connectivity, supplied by an external provider.
///
/// The core never speaks a wire protocol itself: it awaits one order-book
/// update at a time and closes the underlying connection on shutdown.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait OrderBookProvider: Send + Sync {
    /// Awaits the next order-book update for the given pair.
    async fn subscribe_order_book(&self, exchange: &ExchangeId, symbol: &str)
        -> Result<BookTop>;

    /// Closes the connection to the given exchange.
    async fn close(&self, exchange: &ExchangeId) -> Result<()>;
}
