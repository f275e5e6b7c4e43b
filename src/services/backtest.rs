//! Backtest evaluation and the metric store fed by training.

use crate::error::AppError;
use crate::types::{BacktestMetrics, BacktestMetricsUpdate, SignalScores, TrainingMetrics};
use std::future::Future;
use std::pin::Pin;
use tokio::sync::RwLock;
use tracing::{debug, info};

/// Score above which a class counts as a trade signal.
const TRADE_THRESHOLD: f64 = 0.5;

/// Evaluate paired predictions and prices.
///
/// Prediction `i` is judged on the move from `prices[i]` to `prices[i + 1]`.
/// Empty or unpaired input gives all-zero metrics.
pub fn evaluate(predictions: &[SignalScores], prices: &[f64]) -> BacktestMetrics {
    let mut wins = 0usize;
    let mut trades = 0usize;
    let mut total_profit = 0.0;
    let mut total_loss = 0.0;
    let mut drawdown = 0.0;
    let mut max_drawdown: f64 = 0.0;
    let mut returns = Vec::new();

    for (i, prediction) in predictions.iter().enumerate() {
        if i + 1 >= prices.len() {
            break;
        }
        if prediction.buy <= TRADE_THRESHOLD && prediction.sell <= TRADE_THRESHOLD {
            continue;
        }

        let change = (prices[i + 1] - prices[i]) / prices[i];
        trades += 1;

        let is_win = (prediction.buy > prediction.sell && change > 0.0)
            || (prediction.sell > prediction.buy && change < 0.0);
        if is_win {
            wins += 1;
            total_profit += change.abs();
        } else {
            total_loss += change.abs();
            // Cumulative loss, wins never reset it
            drawdown += change.abs();
            max_drawdown = max_drawdown.max(drawdown);
        }

        returns.push(change);
    }

    let win_rate = if trades > 0 {
        wins as f64 / trades as f64 * 100.0
    } else {
        0.0
    };
    let profit_factor = if total_loss > 0.0 {
        total_profit / total_loss
    } else {
        0.0
    };

    BacktestMetrics {
        win_rate,
        profit_factor,
        max_drawdown: max_drawdown * 100.0,
        sharpe_ratio: sharpe(&returns),
    }
}

/// Unannualized mean over population stdev; 0 when undefined.
fn sharpe(returns: &[f64]) -> f64 {
    if returns.is_empty() {
        return 0.0;
    }
    let n = returns.len() as f64;
    let mean = returns.iter().sum::<f64>() / n;
    let std_dev = (returns.iter().map(|r| (r - mean).powi(2)).sum::<f64>() / n).sqrt();
    if std_dev == 0.0 || !std_dev.is_finite() {
        0.0
    } else {
        mean / std_dev
    }
}

/// Receives per-epoch training metrics. Failures are reported, never fatal.
pub trait MetricsSink: Send + Sync {
    fn record_training(
        &self,
        metrics: TrainingMetrics,
    ) -> Pin<Box<dyn Future<Output = Result<(), AppError>> + Send + '_>>;
}

/// Latest backtest metrics, updated field by field.
#[derive(Debug, Default)]
pub struct BacktestStore {
    metrics: RwLock<BacktestMetrics>,
}

impl BacktestStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn metrics(&self) -> BacktestMetrics {
        *self.metrics.read().await
    }

    /// Overwrite only the fields present in `update`. Non-finite values store 0.
    pub async fn update(&self, update: BacktestMetricsUpdate) {
        fn finite(v: f64) -> f64 {
            if v.is_finite() {
                v
            } else {
                0.0
            }
        }

        let mut metrics = self.metrics.write().await;
        if let Some(v) = update.win_rate {
            metrics.win_rate = finite(v);
        }
        if let Some(v) = update.profit_factor {
            metrics.profit_factor = finite(v);
        }
        if let Some(v) = update.max_drawdown {
            metrics.max_drawdown = finite(v);
        }
        if let Some(v) = update.sharpe_ratio {
            metrics.sharpe_ratio = finite(v);
        }
        debug!("Backtest metrics now {:?}", *metrics);
    }

    /// Evaluate predictions against prices and store the result.
    pub async fn record_evaluation(
        &self,
        predictions: &[SignalScores],
        prices: &[f64],
    ) -> BacktestMetrics {
        let metrics = evaluate(predictions, prices);
        info!(
            "Backtest: win rate {:.1}%, profit factor {:.2}, max drawdown {:.2}%, sharpe {:.3}",
            metrics.win_rate, metrics.profit_factor, metrics.max_drawdown, metrics.sharpe_ratio
        );
        self.update(metrics.into()).await;
        metrics
    }
}

impl MetricsSink for BacktestStore {
    fn record_training(
        &self,
        metrics: TrainingMetrics,
    ) -> Pin<Box<dyn Future<Output = Result<(), AppError>> + Send + '_>> {
        Box::pin(async move {
            let proxy =
                BacktestMetrics::from_training(metrics.accuracy, metrics.loss, metrics.validation_score);
            self.update(proxy.into()).await;
            Ok(())
        })
    }
}
