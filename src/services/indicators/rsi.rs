//! Relative Strength Index (RSI) indicator.

use crate::types::AlignedSeries;

/// RSI with Wilder smoothing.
///
/// Values range from 0-100. The first value belongs to candle `period`, so a
/// series of `n` closes yields `n - period` values.
#[derive(Debug, Clone, Copy)]
pub struct Rsi {
    period: usize,
}

impl Default for Rsi {
    fn default() -> Self {
        Self { period: 14 }
    }
}

impl Rsi {
    pub fn new(period: usize) -> Self {
        Self { period: period.max(1) }
    }

    pub fn min_periods(&self) -> usize {
        self.period + 1
    }

    fn to_rsi(avg_gain: f64, avg_loss: f64) -> f64 {
        if avg_loss == 0.0 {
            return 100.0;
        }
        let rs = avg_gain / avg_loss;
        100.0 - (100.0 / (1.0 + rs))
    }

    pub fn calculate(&self, values: &[f64]) -> AlignedSeries<f64> {
        if values.len() < self.min_periods() {
            return AlignedSeries::empty();
        }

        let mut gains = Vec::with_capacity(values.len() - 1);
        let mut losses = Vec::with_capacity(values.len() - 1);
        for pair in values.windows(2) {
            let change = pair[1] - pair[0];
            gains.push(change.max(0.0));
            losses.push((-change).max(0.0));
        }

        let period = self.period as f64;
        let mut avg_gain = gains.iter().take(self.period).sum::<f64>() / period;
        let mut avg_loss = losses.iter().take(self.period).sum::<f64>() / period;

        let mut out = Vec::with_capacity(values.len() - self.period);
        out.push(Self::to_rsi(avg_gain, avg_loss));

        for i in self.period..gains.len() {
            avg_gain = (avg_gain * (period - 1.0) + gains[i]) / period;
            avg_loss = (avg_loss * (period - 1.0) + losses[i]) / period;
            out.push(Self::to_rsi(avg_gain, avg_loss));
        }

        AlignedSeries::new(self.period, out)
    }
}
