//! Scalar statistics over a price series: volatility, momentum and VWAP.

use crate::types::AlignedSeries;

/// Population standard deviation of simple returns. Not annualized.
///
/// Fewer than two prices yield 0.
pub fn volatility(prices: &[f64]) -> f64 {
    if prices.len() < 2 {
        return 0.0;
    }

    let returns: Vec<f64> = prices.windows(2).map(|w| (w[1] - w[0]) / w[0]).collect();
    let n = returns.len() as f64;
    let mean = returns.iter().sum::<f64>() / n;
    let variance = returns.iter().map(|r| (r - mean).powi(2)).sum::<f64>() / n;
    variance.sqrt()
}

/// Simple return over `period` candles. The first value belongs to candle `period`.
pub fn momentum(prices: &[f64], period: usize) -> AlignedSeries<f64> {
    if period == 0 || prices.len() <= period {
        return AlignedSeries::empty();
    }

    let values = (period..prices.len())
        .map(|i| (prices[i] - prices[i - period]) / prices[i - period])
        .collect();
    AlignedSeries::new(period, values)
}

/// Volume-weighted average price. 0 when there is no volume.
pub fn volume_profile(prices: &[f64], volumes: &[f64]) -> f64 {
    let (weighted, total) = prices
        .iter()
        .zip(volumes)
        .fold((0.0, 0.0), |(weighted, total), (p, v)| (weighted + p * v, total + v));

    if total == 0.0 {
        0.0
    } else {
        weighted / total
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_volatility_constant_returns_is_zero() {
        // Every step is +10%
        let prices = [100.0, 110.0, 121.0, 133.1];
        assert!(volatility(&prices) < 1e-12);
        assert_eq!(volatility(&[100.0]), 0.0);
    }

    #[test]
    fn test_volatility_alternating() {
        // Returns +0.1, -0.1 -> mean 0, stdev 0.1 (approximately)
        let prices = [100.0, 110.0, 99.0];
        let v = volatility(&prices);
        assert!((v - 0.1).abs() < 1e-9);
    }

    #[test]
    fn test_momentum_offset() {
        let prices: Vec<f64> = (0..15).map(|i| 100.0 + i as f64).collect();
        let m = momentum(&prices, 10);
        assert_eq!(m.offset, 10);
        assert_eq!(m.len(), 5);
        assert!((m.values[0] - 0.1).abs() < 1e-12);
        assert!(momentum(&prices[..10], 10).is_empty());
    }

    #[test]
    fn test_volume_profile() {
        assert_eq!(volume_profile(&[10.0, 20.0], &[1.0, 3.0]), 17.5);
        assert_eq!(volume_profile(&[10.0, 20.0], &[0.0, 0.0]), 0.0);
    }
}
