use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Lifecycle of a training session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrainingState {
    #[default]
    Idle,
    Initializing,
    Training,
    Completed,
    Aborted,
    Failed,
}

impl TrainingState {
    /// True while a session holds the orchestrator.
    pub fn is_active(&self) -> bool {
        matches!(self, TrainingState::Initializing | TrainingState::Training)
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            TrainingState::Completed | TrainingState::Aborted | TrainingState::Failed
        )
    }

    /// Whether the state machine allows moving from `self` to `next`.
    pub fn can_transition_to(&self, next: TrainingState) -> bool {
        use TrainingState::*;
        match (self, next) {
            (Idle, Initializing) => true,
            (Initializing, Training) => true,
            (Initializing | Training, next) if next.is_terminal() => true,
            // abort() with nothing running still records Aborted -> Idle
            (Idle, Aborted) => true,
            (current, Idle) => current.is_terminal(),
            _ => false,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            TrainingState::Idle => "Idle",
            TrainingState::Initializing => "Initializing",
            TrainingState::Training => "Training",
            TrainingState::Completed => "Completed",
            TrainingState::Aborted => "Aborted",
            TrainingState::Failed => "Failed",
        }
    }
}

/// Per-epoch training statistics.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrainingMetrics {
    pub accuracy: f64,
    pub loss: f64,
    pub validation_score: f64,
}

/// Current metrics plus the values they replaced.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionMetrics {
    pub accuracy: f64,
    pub loss: f64,
    pub validation_score: f64,
    pub previous_accuracy: f64,
    pub previous_loss: f64,
    pub previous_validation_score: f64,
}

impl SessionMetrics {
    /// Shift the current values into `previous_*` and store `next`.
    pub fn record(&mut self, next: TrainingMetrics) {
        self.previous_accuracy = self.accuracy;
        self.previous_loss = self.loss;
        self.previous_validation_score = self.validation_score;
        self.accuracy = next.accuracy;
        self.loss = next.loss;
        self.validation_score = next.validation_score;
    }

    pub fn current(&self) -> TrainingMetrics {
        TrainingMetrics {
            accuracy: self.accuracy,
            loss: self.loss,
            validation_score: self.validation_score,
        }
    }
}

/// The orchestrator's session context.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrainingSession {
    pub id: Option<Uuid>,
    pub state: TrainingState,
    /// 0-100.
    pub progress: f64,
    pub logs: Vec<String>,
    pub metrics: SessionMetrics,
    pub abort_requested: bool,
    pub started_at: Option<DateTime<Utc>>,
}

impl Default for TrainingSession {
    fn default() -> Self {
        Self {
            id: None,
            state: TrainingState::Idle,
            progress: 0.0,
            logs: Vec::new(),
            metrics: SessionMetrics::default(),
            abort_requested: false,
            started_at: None,
        }
    }
}

impl TrainingSession {
    pub fn status(&self) -> SessionStatus {
        SessionStatus {
            id: self.id,
            state: self.state,
        }
    }

    /// Fresh session entering `Initializing`.
    pub fn begin() -> Self {
        Self {
            id: Some(Uuid::new_v4()),
            state: TrainingState::Initializing,
            started_at: Some(Utc::now()),
            logs: vec!["Training starting".to_string()],
            ..Self::default()
        }
    }
}

/// Which session a published state belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionStatus {
    pub id: Option<Uuid>,
    pub state: TrainingState,
}

/// Outbound progress message for the UI/log sink.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrainingProgress {
    pub state: TrainingState,
    pub progress: f64,
    pub log: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metrics: Option<TrainingMetrics>,
}

/// Result of a `start_training` call that did not fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StartOutcome {
    /// The session ran to completion and the predictor was handed off.
    Completed,
    /// Another session was active; nothing happened.
    AlreadyRunning,
}

/// Options passed to the trainer.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FitConfig {
    pub epochs: usize,
    pub batch_size: usize,
    pub validation_split: f64,
    pub shuffle: bool,
    pub learning_rate: f64,
}

impl Default for FitConfig {
    fn default() -> Self {
        Self {
            epochs: 100,
            batch_size: 32,
            validation_split: 0.2,
            shuffle: true,
            learning_rate: 0.0005,
        }
    }
}
