//! Feature Pipeline Tests
//!
//! Indicator alignment, feature/label shapes and candle validation through
//! the public API.

use augur::services::features::{normalize_slice, validate_candles};
use augur::services::{FeaturePipeline, IndicatorEngine};
use augur::sources::SyntheticFeed;
use augur::{Candle, SignalClass, ValidationError, FEATURE_WIDTH, LABEL_WIDTH};

fn walk(count: usize, seed: u64) -> Vec<Candle> {
    SyntheticFeed::new(seed).generate(count)
}

// ============================================================================
// Shapes
// ============================================================================

#[test]
fn test_prepare_shapes_hold_for_many_lengths() {
    let pipeline = FeaturePipeline::new();
    for (count, seed) in [(100, 1), (101, 2), (257, 3), (1_000, 4)] {
        let data = pipeline.prepare(&walk(count, seed)).unwrap();
        assert_eq!(data.features().len(), data.labels().len());
        assert_eq!(data.len(), count - 21);
        for row in data.features() {
            assert_eq!(row.as_slice().len(), FEATURE_WIDTH);
            assert!(row
                .as_slice()
                .iter()
                .all(|v| v.is_finite() && *v >= -1.0 && *v <= 1.0));
        }
        for label in data.labels() {
            assert_eq!(label.as_slice().len(), LABEL_WIDTH);
            assert_eq!(label.as_slice().iter().sum::<f64>(), 1.0);
        }
    }
}

#[test]
fn test_labels_follow_next_close() {
    let candles = walk(300, 8);
    let data = FeaturePipeline::new().prepare(&candles).unwrap();
    for (k, label) in data.labels().iter().enumerate() {
        let i = k + 20;
        let change = (candles[i + 1].close - candles[i].close) / candles[i].close;
        assert_eq!(label.class(), SignalClass::from_return(change));
    }
}

#[test]
fn test_flat_series_normalizes_to_half() {
    let candles: Vec<Candle> = (0..120)
        .map(|i| Candle::flat(i as i64 * 60_000, 50.0, 1.0))
        .collect();
    let data = FeaturePipeline::new().prepare(&candles).unwrap();
    for row in data.features() {
        assert!(row.as_slice().iter().all(|&v| v == 0.5));
    }
    assert!(data
        .labels()
        .iter()
        .all(|l| l.class() == SignalClass::Hold));
}

#[test]
fn test_zero_range_slice() {
    let out = normalize_slice(&[3.25; 15]);
    assert!(out.iter().all(|&v| v == 0.5));
}

// ============================================================================
// Validation
// ============================================================================

#[test]
fn test_minimum_candles() {
    let err = FeaturePipeline::new().prepare(&walk(99, 1)).unwrap_err();
    assert_eq!(err, ValidationError::InsufficientData { len: 99, min: 100 });
    assert!(validate_candles(&walk(100, 1)).is_ok());
}

#[test]
fn test_invalid_fields_name_index() {
    let mut candles = walk(150, 5);
    candles[77].close = 0.0;
    let err = FeaturePipeline::new().prepare(&candles).unwrap_err();
    assert!(matches!(
        err,
        ValidationError::InvalidField {
            field: "close",
            index: 77,
            ..
        }
    ));

    let mut candles = walk(150, 5);
    candles[3].volume = f64::INFINITY;
    let err = FeaturePipeline::new().latest_features(&candles).unwrap_err();
    assert!(matches!(
        err,
        ValidationError::InvalidField {
            field: "volume",
            index: 3,
            ..
        }
    ));
}

// ============================================================================
// Indicators
// ============================================================================

#[test]
fn test_indicator_offsets_on_real_shaped_series() {
    let candles = walk(500, 11);
    let set = IndicatorEngine::new().compute(&candles);

    assert_eq!(set.sma.offset + set.sma.len(), 500);
    assert_eq!(set.rsi.offset + set.rsi.len(), 500);
    assert_eq!(set.macd.offset + set.macd.len(), 500);
    assert_eq!(set.momentum.offset + set.momentum.len(), 500);
    assert!(set.rsi.values.iter().all(|v| (0.0..=100.0).contains(v)));

    // Signal appears with the 9th MACD point
    assert!(set.macd.at(32).unwrap().signal.is_none());
    assert!(set.macd.at(33).unwrap().signal.is_some());

    let filter = &set.rsi_trend_filter;
    assert_eq!(filter.adjusted_rsi.len(), 500);
    assert_eq!(filter.trend.len(), 500);
}
