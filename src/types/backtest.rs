use serde::{Deserialize, Serialize};

/// Class scores emitted by a predictor (softmax semantics).
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct SignalScores {
    pub buy: f64,
    pub sell: f64,
    pub hold: f64,
}

impl SignalScores {
    pub fn new(buy: f64, sell: f64, hold: f64) -> Self {
        Self { buy, sell, hold }
    }

    /// Scores from a buy/sell pair, the remainder assigned to hold.
    pub fn from_pair(buy: f64, sell: f64) -> Self {
        Self {
            buy,
            sell,
            hold: (1.0 - buy - sell).max(0.0),
        }
    }
}

/// Aggregate backtest performance.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BacktestMetrics {
    /// Winning trades as a percentage, 0-100.
    pub win_rate: f64,
    /// Summed winning moves over summed losing moves; 0 without losses.
    pub profit_factor: f64,
    /// Cumulative-loss high-water mark, in percent. Never reset by wins.
    pub max_drawdown: f64,
    /// Unannualized mean/stdev of per-trade returns.
    pub sharpe_ratio: f64,
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

impl BacktestMetrics {
    /// Approximate metrics derived from training statistics.
    ///
    /// Only a stand-in while no live trade history exists.
    pub fn from_training(accuracy: f64, loss: f64, validation_score: f64) -> Self {
        Self {
            win_rate: accuracy * 100.0,
            profit_factor: round2(1.0 / loss.max(0.01)),
            sharpe_ratio: round2(validation_score),
            max_drawdown: round2((loss * 100.0).min(100.0)),
        }
    }
}

/// Partial update for the metric store. `None` leaves a field unchanged.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BacktestMetricsUpdate {
    pub win_rate: Option<f64>,
    pub profit_factor: Option<f64>,
    pub max_drawdown: Option<f64>,
    pub sharpe_ratio: Option<f64>,
}

impl From<BacktestMetrics> for BacktestMetricsUpdate {
    fn from(m: BacktestMetrics) -> Self {
        Self {
            win_rate: Some(m.win_rate),
            profit_factor: Some(m.profit_factor),
            max_drawdown: Some(m.max_drawdown),
            sharpe_ratio: Some(m.sharpe_ratio),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_training_mapping() {
        let m = BacktestMetrics::from_training(0.62, 0.5, 0.551);
        assert!((m.win_rate - 62.0).abs() < 1e-9);
        assert_eq!(m.profit_factor, 2.0);
        assert_eq!(m.sharpe_ratio, 0.55);
        assert_eq!(m.max_drawdown, 50.0);
    }

    #[test]
    fn test_from_training_clamps_loss() {
        let tiny = BacktestMetrics::from_training(0.9, 0.0001, 0.0);
        assert_eq!(tiny.profit_factor, 100.0);

        let huge = BacktestMetrics::from_training(0.1, 3.0, 0.0);
        assert_eq!(huge.max_drawdown, 100.0);
    }
}
