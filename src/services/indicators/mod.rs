//! Technical indicator implementations.

pub mod ema;
pub mod macd;
pub mod rsi;
pub mod sma;
pub mod stats;
pub mod trend_filter;

pub use ema::{Ema, EmaSeed};
pub use macd::Macd;
pub use rsi::Rsi;
pub use sma::Sma;
pub use trend_filter::RsiTrendFilter;

use crate::types::{closes, volumes, Candle, IndicatorSet};
use tracing::debug;

/// Momentum look-back in candles.
pub const MOMENTUM_PERIOD: usize = 10;

/// Computes the full indicator set the feature pipeline consumes.
#[derive(Debug, Clone, Default)]
pub struct IndicatorEngine {
    sma: Sma,
    rsi: Rsi,
    macd: Macd,
    trend_filter: RsiTrendFilter,
}

impl IndicatorEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Compute every indicator over the close series.
    ///
    /// Short input never fails; series come back shorter or empty.
    pub fn compute(&self, candles: &[Candle]) -> IndicatorSet {
        let prices = closes(candles);
        let volumes = volumes(candles);

        let set = IndicatorSet {
            sma: self.sma.calculate(&prices),
            rsi: self.rsi.calculate(&prices),
            macd: self.macd.calculate(&prices),
            volatility: stats::volatility(&prices),
            momentum: stats::momentum(&prices, MOMENTUM_PERIOD),
            volume_profile: stats::volume_profile(&prices, &volumes),
            rsi_trend_filter: self.trend_filter.calculate(&prices),
        };

        debug!(
            "Computed indicators over {} candles (sma {}, rsi {}, macd {})",
            candles.len(),
            set.sma.len(),
            set.rsi.len(),
            set.macd.len()
        );

        set
    }
}
