//! Model training: numeric runtime, trainer capability and the session
//! orchestrator that sequences a training run.

pub mod orchestrator;
pub mod runtime;
pub mod trainer;

pub use orchestrator::{Collaborators, TrainingOrchestrator};
pub use runtime::{ComputeRuntime, RuntimeStats};
pub use trainer::{
    EpochChannel, EpochDirective, EpochReport, Predictor, SoftmaxModel, SoftmaxTrainer, Trainer,
};
