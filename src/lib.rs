//! Augur - candle features, risk sizing, backtest metrics and a single-flight
//! model training session.

pub mod config;
pub mod error;
pub mod services;
pub mod sources;
pub mod types;

pub use config::Config;
pub use error::{AppError, Result, TrainingError, ValidationError};
pub use types::*;
