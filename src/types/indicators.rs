use serde::{Deserialize, Serialize};

/// An indicator series aligned to its source candles by a warm-up offset.
///
/// `values[k]` belongs to candle `offset + k`. Candles before the offset (or
/// past the end) have no value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlignedSeries<T> {
    pub offset: usize,
    pub values: Vec<T>,
}

impl<T> AlignedSeries<T> {
    pub fn new(offset: usize, values: Vec<T>) -> Self {
        Self { offset, values }
    }

    pub fn empty() -> Self {
        Self {
            offset: 0,
            values: Vec::new(),
        }
    }

    /// Value for the candle at `index`, if the series covers it.
    pub fn at(&self, index: usize) -> Option<&T> {
        index
            .checked_sub(self.offset)
            .and_then(|k| self.values.get(k))
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Values covering candles in `[start, end]`, clipped to what exists.
    pub fn window(&self, start: usize, end: usize) -> &[T] {
        if self.values.is_empty() || end < self.offset {
            return &[];
        }
        let lo = start.saturating_sub(self.offset);
        let hi = (end - self.offset + 1).min(self.values.len());
        if lo >= hi {
            return &[];
        }
        &self.values[lo..hi]
    }
}

/// One MACD observation. Signal and histogram need the signal EMA warm-up.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MacdPoint {
    pub macd: f64,
    pub signal: Option<f64>,
    pub histogram: Option<f64>,
}

/// Output of the RSI trend filter. Every array has the candle series' length.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrendFilter {
    #[serde(rename = "adjustedRSI")]
    pub adjusted_rsi: Vec<f64>,
    #[serde(rename = "rsiMA")]
    pub rsi_ma: Vec<f64>,
    #[serde(rename = "rsiTrendEMA")]
    pub rsi_trend_ema: Vec<f64>,
    pub trend: Vec<i8>,
}

/// Every indicator the feature pipeline consumes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IndicatorSet {
    pub sma: AlignedSeries<f64>,
    pub rsi: AlignedSeries<f64>,
    pub macd: AlignedSeries<MacdPoint>,
    /// Population standard deviation of simple returns.
    pub volatility: f64,
    pub momentum: AlignedSeries<f64>,
    /// Volume-weighted average price over the whole series.
    pub volume_profile: f64,
    pub rsi_trend_filter: TrendFilter,
}
