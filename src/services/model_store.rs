//! On-disk model persistence with a retraining policy.

use crate::error::{AppError, Result};
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Stored models older than this are retrained.
pub const RETRAIN_AFTER_HOURS: i64 = 24;

/// A persisted model and when it was trained.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoredModel {
    pub trained_at: DateTime<Utc>,
    pub model: serde_json::Value,
}

/// Persistence for fitted models.
pub trait ModelStore: Send + Sync {
    fn save(&self, model: serde_json::Value) -> Result<StoredModel>;

    fn load(&self) -> Result<Option<StoredModel>>;

    fn clear(&self) -> Result<()>;

    fn last_trained_at(&self) -> Option<DateTime<Utc>> {
        match self.load() {
            Ok(stored) => stored.map(|s| s.trained_at),
            Err(e) => {
                warn!("Failed to read stored model: {}", e);
                None
            }
        }
    }

    /// True when nothing is stored or the stored model is at least a day old.
    fn needs_retraining(&self, now: DateTime<Utc>) -> bool {
        match self.last_trained_at() {
            Some(trained_at) => now - trained_at >= Duration::hours(RETRAIN_AFTER_HOURS),
            None => true,
        }
    }
}

/// Single JSON file holding the latest model.
pub struct JsonModelStore {
    path: PathBuf,
}

impl JsonModelStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Write a model with an explicit timestamp.
    pub fn save_at(&self, model: serde_json::Value, trained_at: DateTime<Utc>) -> Result<StoredModel> {
        if let Some(dir) = self.path.parent() {
            if !dir.as_os_str().is_empty() {
                fs::create_dir_all(dir)?;
            }
        }

        let stored = StoredModel { trained_at, model };
        let content = serde_json::to_string(&stored)?;
        fs::write(&self.path, content)?;
        info!("Saved model to {}", self.path.display());
        Ok(stored)
    }
}

impl ModelStore for JsonModelStore {
    fn save(&self, model: serde_json::Value) -> Result<StoredModel> {
        self.save_at(model, Utc::now())
    }

    fn load(&self) -> Result<Option<StoredModel>> {
        let content = match fs::read_to_string(&self.path) {
            Ok(c) => c,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!("No stored model at {}", self.path.display());
                return Ok(None);
            }
            Err(e) => return Err(AppError::Io(e)),
        };
        Ok(Some(serde_json::from_str(&content)?))
    }

    fn clear(&self) -> Result<()> {
        match fs::remove_file(&self.path) {
            Ok(()) => {
                info!("Removed stored model {}", self.path.display());
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(AppError::Io(e)),
        }
    }
}
