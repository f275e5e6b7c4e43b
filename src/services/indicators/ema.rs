//! Exponential Moving Average (EMA) indicator.

use crate::types::AlignedSeries;

/// How the first EMA value is chosen.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EmaSeed {
    /// First EMA is the SMA of the first `period` values.
    Sma,
    /// First EMA is the first value; output has the input's length.
    FirstValue,
}

/// EMA with smoothing factor `k = 2 / (period + 1)`.
#[derive(Debug, Clone, Copy)]
pub struct Ema {
    period: usize,
    seed: EmaSeed,
}

impl Ema {
    pub fn new(period: usize) -> Self {
        Self {
            period: period.max(1),
            seed: EmaSeed::Sma,
        }
    }

    pub fn seeded_with_first(period: usize) -> Self {
        Self {
            period: period.max(1),
            seed: EmaSeed::FirstValue,
        }
    }

    fn multiplier(&self) -> f64 {
        2.0 / (self.period as f64 + 1.0)
    }

    pub fn calculate(&self, values: &[f64]) -> AlignedSeries<f64> {
        match self.seed {
            EmaSeed::Sma => self.calculate_sma_seeded(values),
            EmaSeed::FirstValue => AlignedSeries::new(0, self.smooth_from_first(values)),
        }
    }

    fn calculate_sma_seeded(&self, values: &[f64]) -> AlignedSeries<f64> {
        if values.len() < self.period {
            return AlignedSeries::empty();
        }

        let k = self.multiplier();
        let mut ema = Vec::with_capacity(values.len() - self.period + 1);
        let mut prev = values.iter().take(self.period).sum::<f64>() / self.period as f64;
        ema.push(prev);

        for value in &values[self.period..] {
            prev = (value - prev) * k + prev;
            ema.push(prev);
        }

        AlignedSeries::new(self.period - 1, ema)
    }

    /// Smooth every value, starting from the first one.
    pub fn smooth_from_first(&self, values: &[f64]) -> Vec<f64> {
        let Some(&first) = values.first() else {
            return Vec::new();
        };

        let k = self.multiplier();
        let mut prev = first;
        values
            .iter()
            .map(|value| {
                prev = value * k + prev * (1.0 - k);
                prev
            })
            .collect()
    }
}
