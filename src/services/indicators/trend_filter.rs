//! RSI trend filter.
//!
//! Shifts each price by a volatility-scaled RSI term and compares the result
//! against its own long EMA to get a trend direction per candle.

use super::ema::Ema;
use super::rsi::Rsi;
use crate::types::TrendFilter;

/// RSI trend filter with an ATR-like volatility series.
#[derive(Debug, Clone, Copy)]
pub struct RsiTrendFilter {
    rsi_period: usize,
    atr_period: usize,
    ma_period: usize,
    trend_period: usize,
}

impl Default for RsiTrendFilter {
    fn default() -> Self {
        Self {
            rsi_period: 14,
            atr_period: 100,
            ma_period: 100,
            trend_period: 20,
        }
    }
}

impl RsiTrendFilter {
    /// EMA(atr_period) of the absolute close-to-close range; 0 at the first candle.
    fn average_range(&self, prices: &[f64]) -> Vec<f64> {
        let ranges: Vec<f64> = prices
            .iter()
            .enumerate()
            .map(|(i, &p)| match i {
                0 => 0.0,
                _ => {
                    let prev = prices[i - 1];
                    p.max(prev) - p.min(prev)
                }
            })
            .collect();
        Ema::seeded_with_first(self.atr_period).smooth_from_first(&ranges)
    }

    /// Every returned array has `prices.len()` entries.
    ///
    /// Index alignment is positional: `adjusted_rsi[i]` is the raw price for
    /// `i < rsi.len()` and reads `rsi[i - rsi.len()]` afterwards (the raw price
    /// again when that index is past the end), and `trend` follows the same
    /// rule against `rsi_ma`.
    pub fn calculate(&self, prices: &[f64]) -> TrendFilter {
        if prices.is_empty() {
            return TrendFilter::default();
        }

        let raw_rsi = Rsi::new(self.rsi_period).calculate(prices).values;
        let atr = self.average_range(prices);

        let adjusted_rsi: Vec<f64> = prices
            .iter()
            .enumerate()
            .map(|(i, &price)| {
                if i < raw_rsi.len() {
                    return price;
                }
                // Short series have no RSI at this offset; keep the raw price
                raw_rsi
                    .get(i - raw_rsi.len())
                    .map_or(price, |rsi| price + atr[i] * rsi / 100.0)
            })
            .collect();

        let rsi_ma = Ema::seeded_with_first(self.ma_period).smooth_from_first(&adjusted_rsi);
        let rsi_trend_ema =
            Ema::seeded_with_first(self.trend_period).smooth_from_first(&adjusted_rsi);

        let trend = adjusted_rsi
            .iter()
            .enumerate()
            .map(|(i, &value)| {
                if i < rsi_ma.len() {
                    0
                } else {
                    let diff = value - rsi_ma[i - rsi_ma.len()];
                    if diff > 0.0 {
                        1
                    } else if diff < 0.0 {
                        -1
                    } else {
                        0
                    }
                }
            })
            .collect();

        TrendFilter {
            adjusted_rsi,
            rsi_ma,
            rsi_trend_ema,
            trend,
        }
    }
}
