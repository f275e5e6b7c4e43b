pub mod backtest;
pub mod execution;
pub mod features;
pub mod indicators;
pub mod model_store;
pub mod risk;
pub mod training;

pub use backtest::{evaluate, BacktestStore, MetricsSink};
pub use execution::{LiveSignal, PredictorSink, TradingDesk};
pub use features::FeaturePipeline;
pub use indicators::IndicatorEngine;
pub use model_store::{JsonModelStore, ModelStore, StoredModel};
pub use risk::RiskEngine;
pub use training::{
    Collaborators, ComputeRuntime, Predictor, SoftmaxModel, SoftmaxTrainer, Trainer,
    TrainingOrchestrator,
};
