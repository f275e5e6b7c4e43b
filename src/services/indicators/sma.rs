//! Simple Moving Average (SMA) indicator.

use crate::types::AlignedSeries;

/// SMA over a rolling window of closes.
///
/// The first value belongs to candle `period - 1`.
#[derive(Debug, Clone, Copy)]
pub struct Sma {
    period: usize,
}

impl Default for Sma {
    fn default() -> Self {
        Self { period: 14 }
    }
}

impl Sma {
    pub fn new(period: usize) -> Self {
        Self { period: period.max(1) }
    }

    pub fn min_periods(&self) -> usize {
        self.period
    }

    pub fn calculate(&self, values: &[f64]) -> AlignedSeries<f64> {
        if values.len() < self.period {
            return AlignedSeries::empty();
        }

        let period = self.period as f64;
        let mut sum: f64 = values.iter().take(self.period).sum();
        let mut out = Vec::with_capacity(values.len() - self.period + 1);
        out.push(sum / period);

        for i in self.period..values.len() {
            sum += values[i] - values[i - self.period];
            out.push(sum / period);
        }

        AlignedSeries::new(self.period - 1, out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sma_values_and_offset() {
        let sma = Sma::new(3).calculate(&[1.0, 2.0, 3.0, 4.0, 5.0]);
        assert_eq!(sma.offset, 2);
        assert_eq!(sma.values, vec![2.0, 3.0, 4.0]);
        assert_eq!(sma.at(4), Some(&4.0));
    }

    #[test]
    fn test_sma_insufficient_data() {
        assert!(Sma::default().calculate(&[1.0; 10]).is_empty());
        assert_eq!(Sma::default().min_periods(), 14);
    }
}
