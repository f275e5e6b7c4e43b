//! Feature and label construction for the signal classifier.

use crate::error::ValidationError;
use crate::services::indicators::IndicatorEngine;
use crate::types::{
    Candle, FeatureVector, IndicatorSet, Label, SignalClass, TrainingData, FEATURE_WIDTH,
};
use tracing::debug;

/// Minimum candles accepted by any pipeline call.
pub const MIN_CANDLES: usize = 100;

/// First candle index that gets a feature row.
pub const WINDOW_SIZE: usize = 20;

/// Candles covered by the normalization look-back and the adjusted RSI block.
pub const LOOKBACK: usize = 15;

const RSI_FALLBACK: f64 = 50.0;

/// Min-max normalize a slice. A zero-range (or single-element) slice maps to 0.5.
pub fn normalize_slice(values: &[f64]) -> Vec<f64> {
    let min = values.iter().copied().fold(f64::INFINITY, f64::min);
    let max = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    let range = max - min;

    values
        .iter()
        .map(|v| {
            if range > 0.0 && range.is_finite() {
                (v - min) / range
            } else {
                0.5
            }
        })
        .collect()
}

/// Normalize `value` against the look-back it came from.
fn normalize_within(value: f64, lookback: &[f64]) -> f64 {
    let min = lookback.iter().copied().fold(value, f64::min);
    let max = lookback.iter().copied().fold(value, f64::max);
    let range = max - min;
    if range > 0.0 && range.is_finite() {
        (value - min) / range
    } else {
        0.5
    }
}

/// Reject series the indicators cannot be trusted on.
pub fn validate_candles(candles: &[Candle]) -> Result<(), ValidationError> {
    if candles.len() < MIN_CANDLES {
        return Err(ValidationError::InsufficientData {
            len: candles.len(),
            min: MIN_CANDLES,
        });
    }

    for (index, candle) in candles.iter().enumerate() {
        if !candle.close.is_finite() || candle.close <= 0.0 {
            return Err(ValidationError::InvalidField {
                field: "close",
                index,
                value: candle.close,
            });
        }
        if !candle.volume.is_finite() || candle.volume < 0.0 {
            return Err(ValidationError::InvalidField {
                field: "volume",
                index,
                value: candle.volume,
            });
        }
        if index > 0 && candle.time <= candles[index - 1].time {
            return Err(ValidationError::InvalidField {
                field: "time",
                index,
                value: candle.time as f64,
            });
        }
    }

    Ok(())
}

/// Turns candles into normalized feature rows and one-hot labels.
#[derive(Debug, Clone, Default)]
pub struct FeaturePipeline {
    engine: IndicatorEngine,
}

impl FeaturePipeline {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build training data: one row per candle in `[WINDOW_SIZE, n - 1)`.
    pub fn prepare(&self, candles: &[Candle]) -> Result<TrainingData, ValidationError> {
        validate_candles(candles)?;

        let indicators = self.engine.compute(candles);
        let last = candles.len() - 1;

        let mut features = Vec::with_capacity(last - WINDOW_SIZE);
        let mut labels = Vec::with_capacity(last - WINDOW_SIZE);

        for i in WINDOW_SIZE..last {
            features.push(feature_row(&indicators, i)?);

            let change = (candles[i + 1].close - candles[i].close) / candles[i].close;
            labels.push(Label::new(SignalClass::from_return(change)));
        }

        let data = TrainingData::new(features, labels)?;
        debug!(
            "Prepared {} training rows from {} candles",
            data.len(),
            candles.len()
        );
        Ok(data)
    }

    /// Feature vector for the most recent candle.
    pub fn latest_features(&self, candles: &[Candle]) -> Result<FeatureVector, ValidationError> {
        validate_candles(candles)?;
        let indicators = self.engine.compute(candles);
        feature_row(&indicators, candles.len() - 1)
    }
}

/// Assemble and normalize the feature vector for candle `i`.
fn feature_row(indicators: &IndicatorSet, i: usize) -> Result<FeatureVector, ValidationError> {
    let start = i.saturating_sub(LOOKBACK - 1);

    let sma = match indicators.sma.at(i) {
        Some(&v) => normalize_within(v, indicators.sma.window(start, i)),
        None => normalize_within(0.0, &[]),
    };

    let rsi = match indicators.rsi.at(i) {
        Some(&v) => normalize_within(v, indicators.rsi.window(start, i)),
        None => normalize_within(RSI_FALLBACK, &[]),
    };

    let volatility = normalize_within(indicators.volatility, &[]);

    let macd_window = indicators.macd.window(start, i);
    let macd = match indicators.macd.at(i) {
        Some(point) => {
            let history: Vec<f64> = macd_window.iter().map(|p| p.macd).collect();
            normalize_within(point.macd, &history)
        }
        None => normalize_within(0.0, &[]),
    };

    let signal = match indicators.macd.at(i).and_then(|p| p.signal) {
        Some(v) => {
            let history: Vec<f64> = macd_window.iter().filter_map(|p| p.signal).collect();
            normalize_within(v, &history)
        }
        None => normalize_within(0.0, &[]),
    };

    let adjusted = &indicators.rsi_trend_filter.adjusted_rsi;
    let block_start = i.saturating_sub(LOOKBACK);
    let block: Vec<f64> = adjusted[block_start.min(adjusted.len())..i.min(adjusted.len())]
        .iter()
        .map(|v| if v.is_nan() { 0.0 } else { *v })
        .collect();

    let mut row = Vec::with_capacity(FEATURE_WIDTH);
    row.extend([sma, rsi, volatility, macd, signal]);
    row.extend(normalize_slice(&block));
    row.resize(FEATURE_WIDTH, 0.0);

    FeatureVector::try_from(row)
}
