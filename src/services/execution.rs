//! Hand-off of fitted predictors to the trading side.

use crate::error::{AppError, Result};
use crate::services::features::FeaturePipeline;
use crate::services::indicators::stats;
use crate::services::model_store::ModelStore;
use crate::services::risk::RiskEngine;
use crate::services::training::Predictor;
use crate::types::{closes, Candle, PositionSide, RiskParameters, SignalScores};
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, RwLock};
use tracing::{debug, info};

/// Receives the predictor at the end of a successful session.
pub trait PredictorSink: Send + Sync {
    fn install(
        &self,
        predictor: Arc<dyn Predictor>,
    ) -> Pin<Box<dyn Future<Output = Result<()>> + Send + '_>>;
}

/// Model output plus the risk plan for acting on it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LiveSignal {
    pub time: i64,
    pub price: f64,
    pub signals: SignalScores,
    /// Volatility of the window, used as the risk level.
    pub risk_level: f64,
    /// `None` when neither buy nor sell clears 0.5.
    pub side: Option<PositionSide>,
    pub risk: Option<RiskParameters>,
}

/// Keeps the active predictor and turns recent candles into signals.
///
/// Order placement is not part of this crate.
pub struct TradingDesk {
    store: Arc<dyn ModelStore>,
    pipeline: FeaturePipeline,
    risk: RiskEngine,
    predictor: RwLock<Option<Arc<dyn Predictor>>>,
}

impl TradingDesk {
    pub fn new(store: Arc<dyn ModelStore>, risk: RiskEngine) -> Self {
        Self {
            store,
            pipeline: FeaturePipeline::new(),
            risk,
            predictor: RwLock::new(None),
        }
    }

    /// Install a predictor without persisting it (e.g. one loaded from disk).
    pub fn set_predictor(&self, predictor: Arc<dyn Predictor>) {
        *self.predictor.write().unwrap_or_else(|e| e.into_inner()) = Some(predictor);
    }

    pub fn predictor(&self) -> Option<Arc<dyn Predictor>> {
        self.predictor
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    pub fn is_ready(&self) -> bool {
        self.predictor().is_some()
    }

    /// Score the latest candle and size a position for it.
    pub fn signal_for(&self, candles: &[Candle]) -> Result<LiveSignal> {
        let predictor = self
            .predictor()
            .ok_or_else(|| AppError::NotFound("no predictor installed".to_string()))?;

        let features = self.pipeline.latest_features(candles)?;
        let signals = predictor.predict(&features);

        // latest_features guarantees a non-empty series
        let last = candles[candles.len() - 1];
        let risk_level = stats::volatility(&closes(candles));

        let side = if signals.buy > 0.5 && signals.buy > signals.sell {
            Some(PositionSide::Long)
        } else if signals.sell > 0.5 {
            Some(PositionSide::Short)
        } else {
            None
        };

        let risk = side
            .map(|side| self.risk.plan(last.close, side, risk_level, risk_level))
            .transpose()?;

        debug!(
            "Live signal at {}: buy {:.3} sell {:.3} hold {:.3} -> {:?}",
            last.time, signals.buy, signals.sell, signals.hold, side
        );

        Ok(LiveSignal {
            time: last.time,
            price: last.close,
            signals,
            risk_level,
            side,
            risk,
        })
    }
}

impl PredictorSink for TradingDesk {
    fn install(
        &self,
        predictor: Arc<dyn Predictor>,
    ) -> Pin<Box<dyn Future<Output = Result<()>> + Send + '_>> {
        Box::pin(async move {
            let snapshot = predictor.snapshot()?;
            let stored = self.store.save(snapshot)?;
            self.set_predictor(predictor);
            info!("Switched to trading mode (model trained at {})", stored.trained_at);
            Ok(())
        })
    }
}
