//! Trainer and predictor capabilities, plus a softmax regression baseline.

use super::runtime::ComputeRuntime;
use crate::error::{AppError, TrainingError};
use crate::types::{
    FeatureVector, FitConfig, SignalScores, TrainingData, TrainingMetrics, FEATURE_WIDTH,
    LABEL_WIDTH,
};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use tokio::sync::{mpsc, oneshot};
use tracing::debug;

/// What the trainer should do after an epoch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EpochDirective {
    Continue,
    Stop,
}

/// End-of-epoch message from the trainer, answered by the session owner.
#[derive(Debug)]
pub struct EpochReport {
    /// Zero-based epoch index.
    pub epoch: usize,
    pub total: usize,
    pub metrics: TrainingMetrics,
    reply: oneshot::Sender<EpochDirective>,
}

impl EpochReport {
    pub fn reply(self, directive: EpochDirective) {
        // Trainer gone means nothing left to steer
        let _ = self.reply.send(directive);
    }
}

/// Trainer side of the epoch handshake.
#[derive(Debug, Clone)]
pub struct EpochChannel {
    tx: mpsc::Sender<EpochReport>,
}

impl EpochChannel {
    pub fn new(tx: mpsc::Sender<EpochReport>) -> Self {
        Self { tx }
    }

    /// Create a channel pair with room for one pending report.
    pub fn pair() -> (Self, mpsc::Receiver<EpochReport>) {
        let (tx, rx) = mpsc::channel(1);
        (Self::new(tx), rx)
    }

    /// Report an epoch and block until the owner answers.
    ///
    /// Blocks the calling thread; call it from a blocking worker. A closed
    /// channel reads as `Stop`.
    pub fn epoch_end(
        &self,
        epoch: usize,
        total: usize,
        metrics: TrainingMetrics,
    ) -> EpochDirective {
        let (reply, response) = oneshot::channel();
        let report = EpochReport {
            epoch,
            total,
            metrics,
            reply,
        };
        if self.tx.blocking_send(report).is_err() {
            return EpochDirective::Stop;
        }
        response.blocking_recv().unwrap_or(EpochDirective::Stop)
    }
}

/// A fitted model.
pub trait Predictor: Send + Sync {
    /// Class scores for one feature vector (softmax semantics).
    fn predict(&self, features: &FeatureVector) -> SignalScores;

    /// Serializable form of the model for persistence.
    fn snapshot(&self) -> Result<serde_json::Value, AppError>;
}

/// Builds and fits models. `fit` runs on a blocking worker.
pub trait Trainer: Send + Sync + 'static {
    type Model: Predictor + 'static;

    fn create_model(&self, input_width: usize) -> Result<Self::Model, TrainingError>;

    /// Fit `model`, reporting every epoch on `epochs`.
    ///
    /// Returns `TrainingError::Cancelled` when told to stop.
    fn fit(
        &self,
        model: &mut Self::Model,
        data: &TrainingData,
        config: &FitConfig,
        runtime: &ComputeRuntime,
        epochs: &EpochChannel,
    ) -> Result<(), TrainingError>;
}

/// Multinomial logistic regression over the feature vector.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SoftmaxModel {
    weights: Vec<[f64; FEATURE_WIDTH]>,
    bias: [f64; LABEL_WIDTH],
}

impl SoftmaxModel {
    fn logits(&self, x: &[f64]) -> [f64; LABEL_WIDTH] {
        let mut out = self.bias;
        for (class, row) in self.weights.iter().enumerate() {
            out[class] += row.iter().zip(x).map(|(w, v)| w * v).sum::<f64>();
        }
        out
    }

    fn probabilities(&self, x: &[f64]) -> [f64; LABEL_WIDTH] {
        let logits = self.logits(x);
        let max = logits.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        let exp = logits.map(|l| (l - max).exp());
        let sum: f64 = exp.iter().sum();
        exp.map(|e| e / sum)
    }

    pub fn from_snapshot(value: serde_json::Value) -> Result<Self, AppError> {
        Ok(serde_json::from_value(value)?)
    }
}

impl Predictor for SoftmaxModel {
    fn predict(&self, features: &FeatureVector) -> SignalScores {
        let [buy, sell, hold] = self.probabilities(features.as_slice());
        SignalScores::new(buy, sell, hold)
    }

    fn snapshot(&self) -> Result<serde_json::Value, AppError> {
        Ok(serde_json::to_value(self)?)
    }
}

fn argmax(values: &[f64]) -> usize {
    values
        .iter()
        .enumerate()
        .fold((0, f64::NEG_INFINITY), |best, (i, &v)| if v > best.1 { (i, v) } else { best })
        .0
}

/// Mini-batch gradient descent trainer for [`SoftmaxModel`].
#[derive(Debug, Clone, Default)]
pub struct SoftmaxTrainer {
    seed: Option<u64>,
}

impl SoftmaxTrainer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Deterministic initialization and shuffling.
    pub fn with_seed(seed: u64) -> Self {
        Self { seed: Some(seed) }
    }

    fn rng(&self) -> StdRng {
        match self.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        }
    }

    /// Loss and accuracy over `rows`.
    fn score(model: &SoftmaxModel, data: &TrainingData, rows: &[usize]) -> (f64, f64) {
        if rows.is_empty() {
            return (0.0, 0.0);
        }
        let mut loss = 0.0;
        let mut correct = 0usize;
        for &row in rows {
            let probs = model.probabilities(data.features()[row].as_slice());
            let target = data.labels()[row].class().index();
            loss -= probs[target].max(1e-12).ln();
            if argmax(&probs) == target {
                correct += 1;
            }
        }
        let n = rows.len() as f64;
        (loss / n, correct as f64 / n)
    }
}

impl Trainer for SoftmaxTrainer {
    type Model = SoftmaxModel;

    fn create_model(&self, input_width: usize) -> Result<SoftmaxModel, TrainingError> {
        if input_width != FEATURE_WIDTH {
            return Err(TrainingError::trainer(format!(
                "softmax model expects {} inputs, got {}",
                FEATURE_WIDTH, input_width
            )));
        }
        let mut rng = self.rng();
        let weights: Vec<[f64; FEATURE_WIDTH]> = (0..LABEL_WIDTH)
            .map(|_| std::array::from_fn(|_| rng.gen_range(-0.05..0.05)))
            .collect();
        Ok(SoftmaxModel {
            weights,
            bias: [0.0; LABEL_WIDTH],
        })
    }

    fn fit(
        &self,
        model: &mut SoftmaxModel,
        data: &TrainingData,
        config: &FitConfig,
        runtime: &ComputeRuntime,
        epochs: &EpochChannel,
    ) -> Result<(), TrainingError> {
        let rows = data.len();
        let split = config.validation_split.clamp(0.0, 0.9);
        // Validation rows come off the end, before shuffling
        let val_rows = ((rows as f64) * split).floor() as usize;
        let train_rows = rows - val_rows;
        if train_rows == 0 {
            return Err(TrainingError::trainer("no rows left for training"));
        }

        let mut train: Vec<usize> = (0..train_rows).collect();
        let validation: Vec<usize> = (train_rows..rows).collect();
        let batch_size = config.batch_size.max(1);
        let mut rng = self.rng();

        for epoch in 0..config.epochs {
            if config.shuffle {
                train.shuffle(&mut rng);
            }

            for batch in train.chunks(batch_size) {
                let mut grad_w = runtime.acquire(LABEL_WIDTH * FEATURE_WIDTH)?;
                let mut grad_b = runtime.acquire(LABEL_WIDTH)?;

                for &row in batch {
                    let x = data.features()[row].as_slice();
                    let y = data.labels()[row].as_slice();
                    let probs = model.probabilities(x);
                    for class in 0..LABEL_WIDTH {
                        let err = probs[class] - y[class];
                        grad_b[class] += err;
                        for (j, v) in x.iter().enumerate() {
                            grad_w[class * FEATURE_WIDTH + j] += err * v;
                        }
                    }
                }

                let scale = config.learning_rate / batch.len() as f64;
                for class in 0..LABEL_WIDTH {
                    model.bias[class] -= scale * grad_b[class];
                    for j in 0..FEATURE_WIDTH {
                        model.weights[class][j] -= scale * grad_w[class * FEATURE_WIDTH + j];
                    }
                }

                runtime.release(grad_w);
                runtime.release(grad_b);
            }

            let (loss, accuracy) = Self::score(model, data, &train);
            let (_, val_accuracy) = Self::score(model, data, &validation);
            let metrics = TrainingMetrics {
                accuracy,
                loss,
                validation_score: val_accuracy,
            };
            debug!(
                "Epoch {} done: loss {:.4}, accuracy {:.3}, val {:.3}",
                epoch + 1,
                loss,
                accuracy,
                val_accuracy
            );

            if epochs.epoch_end(epoch, config.epochs, metrics) == EpochDirective::Stop {
                return Err(TrainingError::Cancelled);
            }
        }

        Ok(())
    }
}
