use super::MarketData;
use crate::types::Candle;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::future::Future;
use std::pin::Pin;
use tracing::info;

/// Offline candle feed: a seeded random walk at one-minute spacing.
#[derive(Debug, Clone)]
pub struct SyntheticFeed {
    seed: u64,
    start_price: f64,
    /// Maximum per-candle move as a fraction of price.
    volatility: f64,
    interval_ms: i64,
    /// Upper bound on generated candles, whatever the requested span.
    max_candles: usize,
}

impl Default for SyntheticFeed {
    fn default() -> Self {
        Self {
            seed: 42,
            start_price: 250.0,
            volatility: 0.004,
            interval_ms: 60_000,
            max_candles: 20_000,
        }
    }
}

impl SyntheticFeed {
    pub fn new(seed: u64) -> Self {
        Self {
            seed,
            ..Self::default()
        }
    }

    pub fn with_max_candles(mut self, max_candles: usize) -> Self {
        self.max_candles = max_candles;
        self
    }

    /// Generate `count` candles ending now.
    pub fn generate(&self, count: usize) -> Vec<Candle> {
        let mut rng = StdRng::seed_from_u64(self.seed);
        let now = chrono::Utc::now().timestamp_millis();
        let start = now - count as i64 * self.interval_ms;
        let mut price = self.start_price;

        (0..count)
            .map(|i| {
                let open = price;
                let change = rng.gen_range(-self.volatility..self.volatility);
                price = (price * (1.0 + change)).max(0.01);
                let wick = open.max(price) * rng.gen_range(0.0..self.volatility / 2.0);
                Candle {
                    time: start + i as i64 * self.interval_ms,
                    open,
                    high: open.max(price) + wick,
                    low: (open.min(price) - wick).max(0.005),
                    close: price,
                    volume: rng.gen_range(10.0..1_000.0),
                }
            })
            .collect()
    }
}

impl MarketData for SyntheticFeed {
    fn fetch_historical(
        &self,
        days: u32,
    ) -> Pin<Box<dyn Future<Output = anyhow::Result<Vec<Candle>>> + Send + '_>> {
        Box::pin(async move {
            let span = i64::from(days) * 86_400_000 / self.interval_ms;
            let count = (span.max(0) as usize).min(self.max_candles);
            let candles = self.generate(count);
            info!("Generated {} synthetic candles", candles.len());
            Ok(candles)
        })
    }
}
