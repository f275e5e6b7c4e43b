use thiserror::Error;

/// Malformed or insufficient input. Fatal to the call that raised it.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ValidationError {
    #[error("Insufficient data points: got {len}, minimum {min} required")]
    InsufficientData { len: usize, min: usize },

    #[error("Invalid {field} at index {index}: {value}")]
    InvalidField {
        field: &'static str,
        index: usize,
        value: f64,
    },

    #[error("Invalid {field}: {value}")]
    InvalidInput { field: &'static str, value: f64 },

    #[error("Shape mismatch: {what} expected {expected}, got {actual}")]
    ShapeMismatch {
        what: &'static str,
        expected: usize,
        actual: usize,
    },
}

/// Failures surfaced by a training session.
#[derive(Error, Debug)]
pub enum TrainingError {
    #[error("Training data invalid: {0}")]
    Validation(#[from] ValidationError),

    #[error("Market data unavailable: {message}")]
    MarketData {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    #[error("Numeric runtime error: {0}")]
    Runtime(String),

    #[error("Trainer failed: {message}")]
    Trainer {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    #[error("Predictor hand-off failed: {source}")]
    Handoff {
        #[source]
        source: Box<AppError>,
    },

    #[error("Training cancelled by user")]
    Cancelled,
}

impl TrainingError {
    pub fn trainer(message: impl Into<String>) -> Self {
        TrainingError::Trainer {
            message: message.into(),
            source: None,
        }
    }

    pub fn trainer_with_source(
        message: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        TrainingError::Trainer {
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }

    /// Wrap a market data failure, keeping its context chain in the message.
    pub fn market_data(source: anyhow::Error) -> Self {
        TrainingError::MarketData {
            message: format!("{:#}", source),
            source: Some(source.into()),
        }
    }

    pub fn handoff(source: AppError) -> Self {
        TrainingError::Handoff {
            source: Box::new(source),
        }
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, TrainingError::Cancelled)
    }
}

/// Application error types.
#[derive(Error, Debug)]
pub enum AppError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Internal error: {0}")]
    Internal(String),

    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Training(#[from] TrainingError),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Reqwest(#[from] reqwest::Error),

    #[error(transparent)]
    SerdeJson(#[from] serde_json::Error),

    #[error(transparent)]
    Anyhow(#[from] anyhow::Error),
}

pub type Result<T> = std::result::Result<T, AppError>;
