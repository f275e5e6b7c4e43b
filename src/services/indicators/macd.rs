//! MACD (Moving Average Convergence Divergence) indicator.

use super::ema::Ema;
use crate::types::{AlignedSeries, MacdPoint};

/// MACD indicator.
///
/// - MACD Line = EMA(12) - EMA(26)
/// - Signal Line = EMA(9) of MACD Line
/// - Histogram = MACD Line - Signal Line
///
/// Every EMA is seeded with the SMA of its first `period` values. The MACD
/// line starts at candle `slow_period - 1`; signal and histogram stay `None`
/// for the first `signal_period - 1` MACD points.
#[derive(Debug, Clone, Copy)]
pub struct Macd {
    fast_period: usize,
    slow_period: usize,
    signal_period: usize,
}

impl Default for Macd {
    fn default() -> Self {
        Self {
            fast_period: 12,
            slow_period: 26,
            signal_period: 9,
        }
    }
}

impl Macd {
    pub fn new(fast_period: usize, slow_period: usize, signal_period: usize) -> Self {
        Self {
            fast_period,
            slow_period,
            signal_period,
        }
    }

    pub fn min_periods(&self) -> usize {
        self.slow_period
    }

    pub fn calculate(&self, values: &[f64]) -> AlignedSeries<MacdPoint> {
        let fast = Ema::new(self.fast_period).calculate(values);
        let slow = Ema::new(self.slow_period).calculate(values);
        if slow.is_empty() {
            return AlignedSeries::empty();
        }

        let macd_line: Vec<f64> = slow
            .values
            .iter()
            .enumerate()
            .filter_map(|(k, slow_value)| {
                fast.at(slow.offset + k)
                    .map(|fast_value| fast_value - slow_value)
            })
            .collect();

        let signal = Ema::new(self.signal_period).calculate(&macd_line);

        let points = macd_line
            .iter()
            .enumerate()
            .map(|(k, &macd)| {
                let signal = signal.at(k).copied();
                MacdPoint {
                    macd,
                    signal,
                    histogram: signal.map(|s| macd - s),
                }
            })
            .collect();

        AlignedSeries::new(slow.offset, points)
    }
}
