//! Lifecycle state persisted between short-lived processes.
//!
//! The backend has no endpoint that lists breaks, so a front end that exits
//! between intents saves the store's snapshot here and restores it on start.
//! Only the shift buckets, breaks and statistics are kept; loading flags are
//! transient.

use std::path::{Path, PathBuf};

use super::data_dir;
use crate::error::ConfigError;
use crate::lifecycle::ShiftState;

pub struct SnapshotFile {
    path: PathBuf,
}

impl SnapshotFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// `state.json` in the data directory.
    pub fn default_location() -> Result<Self, ConfigError> {
        Ok(Self::new(data_dir()?.join("state.json")))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Saved state, or empty state when there is none or it is unreadable.
    pub fn load(&self) -> ShiftState {
        let content = match std::fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(_) => return ShiftState::default(),
        };
        match serde_json::from_str::<ShiftState>(&content) {
            Ok(state) => state.restored(),
            Err(e) => {
                tracing::warn!(path = %self.path.display(), error = %e, "discarding unreadable state snapshot");
                ShiftState::default()
            }
        }
    }

    pub fn save(&self, state: &ShiftState) -> Result<(), ConfigError> {
        let save_failed = |message: String| ConfigError::SaveFailed {
            path: self.path.clone(),
            message,
        };
        let content = serde_json::to_string_pretty(state).map_err(|e| save_failed(e.to_string()))?;
        std::fs::write(&self.path, content).map_err(|e| save_failed(e.to_string()))
    }

    /// Remove the snapshot. Missing files are fine.
    pub fn clear(&self) -> Result<(), ConfigError> {
        match std::fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(ConfigError::SaveFailed {
                path: self.path.clone(),
                message: e.to_string(),
            }),
        }
    }
}
