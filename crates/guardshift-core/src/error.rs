//! Error types for Guardshift core.
//!
//! Each subsystem tags its failures where they originate so callers never have
//! to classify an error by inspecting its message:
//!
//! - [`CredentialError`]: key-value storage and credential encryption
//! - [`LocationError`]: permission, positioning and fix validation
//! - [`GatewayError`]: HTTP transport, auth and response envelopes
//! - [`LifecycleError`]: what a lifecycle intent reports to its caller
//! - [`ConfigError`]: loading and editing `config.toml`

use std::path::PathBuf;
use thiserror::Error;

use crate::lifecycle::SyncSlice;

/// Main error type for Guardshift core operations.
#[derive(Error, Debug)]
pub enum CoreError {
    #[error("Credential error: {0}")]
    Credential(#[from] CredentialError),

    #[error("Location error: {0}")]
    Location(#[from] LocationError),

    #[error("Gateway error: {0}")]
    Gateway(#[from] GatewayError),

    #[error("{0}")]
    Lifecycle(#[from] LifecycleError),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Credential storage errors. None of these ever escape as a panic.
#[derive(Error, Debug)]
pub enum CredentialError {
    /// The underlying key-value store refused a read, write or delete.
    #[error("Credential storage failed for '{key}': {message}")]
    Storage { key: String, message: String },

    /// No usable cipher; the credential is not written rather than stored in clear.
    #[error("Credential encryption unavailable: {0}")]
    EncryptionUnavailable(String),

    #[error("Credential serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Location acquisition errors.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum LocationError {
    /// Terminal: the user has to change device settings.
    #[error("Location permission denied")]
    PermissionDenied,

    #[error("Position unavailable: {0}")]
    PositionUnavailable(String),

    #[error("Location request timed out after {timeout_secs}s")]
    Timeout { timeout_secs: u64 },

    /// The platform produced a fix that is structurally unusable.
    #[error("Invalid location fix: {0}")]
    InvalidFix(String),
}

impl LocationError {
    /// Whether another attempt may succeed. A denied permission never does.
    pub fn is_retryable(&self) -> bool {
        !matches!(self, LocationError::PermissionDenied)
    }
}

/// Shift gateway errors.
#[derive(Error, Debug)]
pub enum GatewayError {
    /// HTTP 401, or no valid credential at call time.
    #[error("Not authenticated; sign in again")]
    Unauthenticated,

    /// No response received: connect failure, dropped connection or client timeout.
    #[error("Network unavailable: {0}")]
    NetworkUnavailable(String),

    /// The backend answered `{ success: false }`.
    #[error("Request rejected: {message}")]
    Rejected { message: String },

    /// Any other non-success status with its error body.
    #[error("Server error ({status}): {message}")]
    Server { status: u16, message: String },

    /// Body did not match any known envelope or payload shape.
    #[error("Malformed response: {0}")]
    Malformed(String),

    #[error("Invalid payload: {0}")]
    Invalid(#[from] ValidationError),

    #[error("Invalid URL: {0}")]
    InvalidUrl(String),
}

impl From<url::ParseError> for GatewayError {
    fn from(err: url::ParseError) -> Self {
        GatewayError::InvalidUrl(err.to_string())
    }
}

impl From<reqwest::Error> for GatewayError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() || err.is_connect() || err.is_request() || err.is_body() {
            GatewayError::NetworkUnavailable(err.to_string())
        } else if err.is_decode() {
            GatewayError::Malformed(err.to_string())
        } else {
            GatewayError::Server {
                status: err.status().map(|s| s.as_u16()).unwrap_or(0),
                message: err.to_string(),
            }
        }
    }
}

/// Validation errors raised while admitting values from an external boundary.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ValidationError {
    #[error("Invalid time range: end ({end}) is before start ({start})")]
    InvalidTimeRange {
        start: chrono::DateTime<chrono::Utc>,
        end: chrono::DateTime<chrono::Utc>,
    },

    #[error("Invalid value for '{field}': {message}")]
    InvalidValue { field: String, message: String },
}

/// One failed slice of a multi-endpoint refresh.
#[derive(Debug, Clone, PartialEq)]
pub struct SliceFailure {
    pub slice: SyncSlice,
    pub message: String,
}

/// Failure reported by a lifecycle intent.
#[derive(Error, Debug)]
pub enum LifecycleError {
    #[error("Could not determine your location: {0}")]
    Location(#[from] LocationError),

    #[error("{0}")]
    Gateway(#[from] GatewayError),

    /// A local invariant would be violated; no request was sent.
    #[error("Precondition failed: {0}")]
    PreconditionFailed(String),

    /// Some refresh slices failed; the others were applied.
    #[error("Partial sync: {}", describe_failures(.failures))]
    PartialSync { failures: Vec<SliceFailure> },
}

fn describe_failures(failures: &[SliceFailure]) -> String {
    failures
        .iter()
        .map(|f| format!("{} failed ({})", f.slice.label(), f.message))
        .collect::<Vec<_>>()
        .join("; ")
}

/// What the UI should offer after a failed intent.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryAffordance {
    /// Acquire the location again before resubmitting.
    RetryLocation,
    /// The fix was fine; resubmit to the server.
    RetrySubmit,
    /// Prompt for a fresh sign-in.
    Relogin,
    /// Suggest checking the connection.
    CheckConnection,
    /// Location permission must be granted in device settings.
    OpenSettings,
    None,
}

impl LifecycleError {
    pub fn retry_affordance(&self) -> RetryAffordance {
        match self {
            LifecycleError::Location(LocationError::PermissionDenied) => {
                RetryAffordance::OpenSettings
            }
            LifecycleError::Location(_) => RetryAffordance::RetryLocation,
            LifecycleError::Gateway(GatewayError::Unauthenticated) => RetryAffordance::Relogin,
            LifecycleError::Gateway(GatewayError::NetworkUnavailable(_)) => {
                RetryAffordance::CheckConnection
            }
            LifecycleError::Gateway(_) => RetryAffordance::RetrySubmit,
            LifecycleError::PreconditionFailed(_) => RetryAffordance::None,
            LifecycleError::PartialSync { .. } => RetryAffordance::RetrySubmit,
        }
    }

    /// Slices that failed, for a partial sync; empty otherwise.
    pub fn failed_slices(&self) -> Vec<SyncSlice> {
        match self {
            LifecycleError::PartialSync { failures } => failures.iter().map(|f| f.slice).collect(),
            _ => Vec::new(),
        }
    }
}

/// Configuration-specific errors.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to load configuration from {path}: {message}")]
    LoadFailed { path: PathBuf, message: String },

    #[error("Failed to save configuration to {path}: {message}")]
    SaveFailed { path: PathBuf, message: String },

    #[error("Invalid configuration value for '{key}': {message}")]
    InvalidValue { key: String, message: String },

    #[error("Unknown configuration key: {0}")]
    UnknownKey(String),

    #[error("Could not resolve data directory: {0}")]
    DataDir(String),
}

/// Result type alias for CoreError
pub type Result<T, E = CoreError> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn permission_denied_is_not_retryable() {
        assert!(!LocationError::PermissionDenied.is_retryable());
        assert!(LocationError::Timeout { timeout_secs: 15 }.is_retryable());
        assert!(LocationError::PositionUnavailable("no signal".into()).is_retryable());
        assert!(LocationError::InvalidFix("NaN".into()).is_retryable());
    }

    #[test]
    fn location_and_server_failures_offer_different_retries() {
        let loc = LifecycleError::Location(LocationError::Timeout { timeout_secs: 15 });
        let srv = LifecycleError::Gateway(GatewayError::Server {
            status: 422,
            message: "outside geofence".into(),
        });
        assert_eq!(loc.retry_affordance(), RetryAffordance::RetryLocation);
        assert_eq!(srv.retry_affordance(), RetryAffordance::RetrySubmit);
    }

    #[test]
    fn auth_and_network_failures_are_distinct() {
        let auth = LifecycleError::Gateway(GatewayError::Unauthenticated);
        let net = LifecycleError::Gateway(GatewayError::NetworkUnavailable("refused".into()));
        assert_eq!(auth.retry_affordance(), RetryAffordance::Relogin);
        assert_eq!(net.retry_affordance(), RetryAffordance::CheckConnection);
    }

    #[test]
    fn partial_sync_message_names_only_failed_slices() {
        let err = LifecycleError::PartialSync {
            failures: vec![SliceFailure {
                slice: SyncSlice::Upcoming,
                message: "Server error (500): boom".into(),
            }],
        };
        let msg = err.to_string();
        assert!(msg.contains("upcoming shifts"));
        assert!(!msg.contains("active shift"));
        assert_eq!(err.failed_slices(), vec![SyncSlice::Upcoming]);
    }
}
