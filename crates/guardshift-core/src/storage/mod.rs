mod config;
pub mod snapshot;

pub use config::{ApiConfig, Config, CredentialsConfig, LocationConfig};
pub use snapshot::SnapshotFile;

use std::path::PathBuf;

use crate::error::ConfigError;

/// Returns `~/.config/guardshift[-dev]/` based on GUARDSHIFT_ENV.
///
/// Set GUARDSHIFT_ENV=dev to use development data directory.
///
/// # Errors
/// Returns an error if creating the config directory fails.
pub fn data_dir() -> Result<PathBuf, ConfigError> {
    let base_dir = dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".config");

    let env = std::env::var("GUARDSHIFT_ENV").unwrap_or_else(|_| "production".to_string());

    let dir = if env == "dev" {
        base_dir.join("guardshift-dev")
    } else {
        base_dir.join("guardshift")
    };

    std::fs::create_dir_all(&dir)
        .map_err(|e| ConfigError::DataDir(format!("{}: {e}", dir.display())))?;
    Ok(dir)
}
