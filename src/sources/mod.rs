//! Historical candle sources.

pub mod binance;
pub mod synthetic;

pub use binance::BinanceClient;
pub use synthetic::SyntheticFeed;

use crate::types::Candle;
use std::future::Future;
use std::pin::Pin;

/// Provider of historical candles, oldest first. No retries.
pub trait MarketData: Send + Sync {
    fn fetch_historical(
        &self,
        days: u32,
    ) -> Pin<Box<dyn Future<Output = anyhow::Result<Vec<Candle>>> + Send + '_>>;
}
