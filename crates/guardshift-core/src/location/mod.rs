//! Location pipeline: permission, timeout, and a two-tier accuracy/retry policy.
//!
//! ## Acquisition
//!
//! ```text
//! permission? --denied--> PermissionDenied (no retry)
//!     |
//!     v
//! attempt(high accuracy, timeout, max age)
//!     |-- ok + valid ------------------------> fix
//!     |-- failure, budget left --> backoff --> attempt(low accuracy, relaxed max age)
//!     `-- failure, budget spent -------------> last error
//! ```
//!
//! Check-in and check-out never proceed without a fresh, valid fix. The
//! emergency path instead degrades to the last known position, stamped with a
//! sentinel accuracy, when acquisition fails.

pub mod manual;

use std::future::Future;
use std::sync::Mutex;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub use manual::ManualLocation;

use crate::error::LocationError;

/// A single resolved device position.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LocationFix {
    pub latitude: f64,
    pub longitude: f64,
    /// Radius of uncertainty in meters.
    pub accuracy: f64,
    pub timestamp: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
}

impl LocationFix {
    pub fn new(latitude: f64, longitude: f64, accuracy: f64) -> Self {
        Self {
            latitude,
            longitude,
            accuracy,
            timestamp: Utc::now(),
            address: None,
        }
    }

    pub fn with_address(mut self, address: impl Into<String>) -> Self {
        self.address = Some(address.into());
        self
    }

    pub fn validate(&self) -> Result<(), LocationError> {
        if !self.latitude.is_finite() || !self.longitude.is_finite() {
            return Err(LocationError::InvalidFix(format!(
                "non-finite coordinates ({}, {})",
                self.latitude, self.longitude
            )));
        }
        if !(-90.0..=90.0).contains(&self.latitude) || !(-180.0..=180.0).contains(&self.longitude) {
            return Err(LocationError::InvalidFix(format!(
                "coordinates out of range ({}, {})",
                self.latitude, self.longitude
            )));
        }
        if !self.accuracy.is_finite() || self.accuracy < 0.0 {
            return Err(LocationError::InvalidFix(format!(
                "invalid accuracy {}",
                self.accuracy
            )));
        }
        Ok(())
    }
}

/// Parameters for one platform position request.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PositionRequest {
    pub high_accuracy: bool,
    pub timeout: Duration,
    /// Oldest cached position the platform may return.
    pub max_age: Duration,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PermissionStatus {
    Granted,
    Denied,
}

/// The device's positioning capability.
pub trait LocationSource: Send + Sync {
    fn request_permission(&self) -> impl Future<Output = PermissionStatus> + Send;

    fn current_position(
        &self,
        request: PositionRequest,
    ) -> impl Future<Output = Result<LocationFix, LocationError>> + Send;

    /// Platform-cached position, if any, without a new request.
    fn last_known(&self) -> Option<LocationFix> {
        None
    }
}

/// Timeouts, ages and retry budget for acquisition.
#[derive(Debug, Clone, PartialEq)]
pub struct LocationPolicy {
    pub timeout: Duration,
    pub max_age: Duration,
    pub relaxed_max_age: Duration,
    pub retry_backoff: Duration,
    pub retries: u32,
    /// Accuracy stamped on a degraded emergency fix.
    pub emergency_accuracy_m: f64,
}

impl Default for LocationPolicy {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(15),
            max_age: Duration::from_secs(60),
            relaxed_max_age: Duration::from_secs(300),
            retry_backoff: Duration::from_secs(2),
            retries: 2,
            emergency_accuracy_m: 1000.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AcquireOptions {
    pub high_accuracy_first: bool,
}

impl Default for AcquireOptions {
    fn default() -> Self {
        Self {
            high_accuracy_first: true,
        }
    }
}

pub struct LocationProvider<S> {
    source: S,
    policy: LocationPolicy,
    last_fix: Mutex<Option<LocationFix>>,
}

impl<S: LocationSource> LocationProvider<S> {
    pub fn new(source: S, policy: LocationPolicy) -> Self {
        Self {
            source,
            policy,
            last_fix: Mutex::new(None),
        }
    }

    pub fn policy(&self) -> &LocationPolicy {
        &self.policy
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    /// Acquire a validated fix, retrying up to `retries` more times.
    ///
    /// Total wall time is bounded by `(timeout + backoff) * (retries + 1)`.
    pub async fn acquire(
        &self,
        retries: u32,
        options: AcquireOptions,
    ) -> Result<LocationFix, LocationError> {
        if self.source.request_permission().await == PermissionStatus::Denied {
            tracing::debug!("location permission denied");
            return Err(LocationError::PermissionDenied);
        }

        let mut budget = retries;
        let mut high_accuracy = options.high_accuracy_first;
        let mut attempt = 1u32;
        loop {
            let request = PositionRequest {
                high_accuracy,
                timeout: self.policy.timeout,
                max_age: if high_accuracy {
                    self.policy.max_age
                } else {
                    self.policy.relaxed_max_age
                },
            };

            match self.attempt(request).await {
                Ok(fix) => {
                    tracing::debug!(attempt, accuracy = fix.accuracy, "location acquired");
                    self.remember(&fix);
                    return Ok(fix);
                }
                Err(LocationError::PermissionDenied) => return Err(LocationError::PermissionDenied),
                Err(e) if budget == 0 => {
                    tracing::warn!(attempt, error = %e, "location acquisition failed");
                    return Err(e);
                }
                Err(e) => {
                    tracing::debug!(attempt, error = %e, "retrying location with lower accuracy");
                    budget -= 1;
                    attempt += 1;
                    high_accuracy = false;
                    tokio::time::sleep(self.policy.retry_backoff).await;
                }
            }
        }
    }

    /// Best-effort fix for safety-critical actions.
    ///
    /// Falls back to the last known position with the emergency accuracy
    /// sentinel when acquisition fails for any reason other than permission.
    pub async fn acquire_for_emergency(&self) -> Result<LocationFix, LocationError> {
        match self
            .acquire(self.policy.retries, AcquireOptions::default())
            .await
        {
            Ok(fix) => Ok(fix),
            Err(LocationError::PermissionDenied) => Err(LocationError::PermissionDenied),
            Err(e) => match self.last_known() {
                Some(mut fix) => {
                    tracing::warn!(error = %e, "using degraded fix for emergency");
                    fix.accuracy = self.policy.emergency_accuracy_m;
                    Ok(fix)
                }
                None => Err(e),
            },
        }
    }

    /// Last fix this provider produced, or the platform's cached one.
    pub fn last_known(&self) -> Option<LocationFix> {
        let remembered = self.last_fix.lock().ok().and_then(|g| g.clone());
        remembered.or_else(|| {
            self.source
                .last_known()
                .filter(|fix| fix.validate().is_ok())
        })
    }

    async fn attempt(&self, request: PositionRequest) -> Result<LocationFix, LocationError> {
        let fix = tokio::time::timeout(request.timeout, self.source.current_position(request))
            .await
            .map_err(|_| LocationError::Timeout {
                timeout_secs: request.timeout.as_secs(),
            })??;
        fix.validate()?;
        Ok(fix)
    }

    fn remember(&self, fix: &LocationFix) {
        if let Ok(mut last) = self.last_fix.lock() {
            *last = Some(fix.clone());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::VecDeque;

    enum Step {
        Reply(Result<LocationFix, LocationError>),
        Hang,
    }

    struct ScriptedSource {
        permission: PermissionStatus,
        steps: Mutex<VecDeque<Step>>,
        requests: Mutex<Vec<PositionRequest>>,
        cached: Option<LocationFix>,
    }

    impl ScriptedSource {
        fn new(steps: Vec<Step>) -> Self {
            Self {
                permission: PermissionStatus::Granted,
                steps: Mutex::new(steps.into()),
                requests: Mutex::new(Vec::new()),
                cached: None,
            }
        }

        fn requests(&self) -> Vec<PositionRequest> {
            self.requests.lock().unwrap().clone()
        }
    }

    impl LocationSource for ScriptedSource {
        async fn request_permission(&self) -> PermissionStatus {
            self.permission
        }

        async fn current_position(
            &self,
            request: PositionRequest,
        ) -> Result<LocationFix, LocationError> {
            self.requests.lock().unwrap().push(request);
            let step = self.steps.lock().unwrap().pop_front();
            match step {
                Some(Step::Reply(result)) => result,
                Some(Step::Hang) => std::future::pending().await,
                None => Err(LocationError::PositionUnavailable("script exhausted".into())),
            }
        }

        fn last_known(&self) -> Option<LocationFix> {
            self.cached.clone()
        }
    }

    fn unavailable() -> Step {
        Step::Reply(Err(LocationError::PositionUnavailable("no satellites".into())))
    }

    fn provider(source: ScriptedSource) -> LocationProvider<ScriptedSource> {
        LocationProvider::new(source, LocationPolicy::default())
    }

    #[tokio::test(start_paused = true)]
    async fn second_attempt_at_lower_accuracy_succeeds() {
        let p = provider(ScriptedSource::new(vec![
            unavailable(),
            Step::Reply(Ok(LocationFix::new(51.5, -0.12, 45.0))),
        ]));

        let fix = p.acquire(2, AcquireOptions::default()).await.unwrap();
        assert_eq!(fix.accuracy, 45.0);

        let requests = p.source().requests();
        assert_eq!(requests.len(), 2);
        assert!(requests[0].high_accuracy);
        assert_eq!(requests[0].max_age, Duration::from_secs(60));
        assert!(!requests[1].high_accuracy);
        assert_eq!(requests[1].max_age, Duration::from_secs(300));
    }

    #[tokio::test(start_paused = true)]
    async fn denied_permission_fails_without_attempts() {
        let mut source = ScriptedSource::new(vec![Step::Reply(Ok(LocationFix::new(1.0, 1.0, 5.0)))]);
        source.permission = PermissionStatus::Denied;
        let p = provider(source);

        assert_eq!(
            p.acquire(3, AcquireOptions::default()).await,
            Err(LocationError::PermissionDenied)
        );
        assert!(p.source().requests().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn budget_exhaustion_returns_last_error() {
        let p = provider(ScriptedSource::new(vec![
            unavailable(),
            unavailable(),
            Step::Reply(Err(LocationError::PositionUnavailable("indoors".into()))),
        ]));

        let err = p.acquire(2, AcquireOptions::default()).await.unwrap_err();
        assert_eq!(err, LocationError::PositionUnavailable("indoors".into()));
        assert_eq!(p.source().requests().len(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn hanging_platform_times_out_then_retries() {
        let p = provider(ScriptedSource::new(vec![
            Step::Hang,
            Step::Reply(Ok(LocationFix::new(10.0, 20.0, 80.0))),
        ]));
        let started = tokio::time::Instant::now();

        let fix = p.acquire(1, AcquireOptions::default()).await.unwrap();
        assert_eq!(fix.accuracy, 80.0);
        assert!(started.elapsed() >= Duration::from_secs(17));
    }

    #[tokio::test(start_paused = true)]
    async fn timeout_is_reported_when_no_budget() {
        let p = provider(ScriptedSource::new(vec![Step::Hang]));
        assert_eq!(
            p.acquire(0, AcquireOptions::default()).await,
            Err(LocationError::Timeout { timeout_secs: 15 })
        );
    }

    #[tokio::test(start_paused = true)]
    async fn invalid_fix_is_never_forwarded() {
        let p = provider(ScriptedSource::new(vec![
            Step::Reply(Ok(LocationFix::new(f64::NAN, 3.0, 5.0))),
            Step::Reply(Ok(LocationFix::new(4.0, 3.0, 5.0))),
        ]));

        let fix = p.acquire(1, AcquireOptions::default()).await.unwrap();
        assert_eq!(fix.latitude, 4.0);

        let p = provider(ScriptedSource::new(vec![Step::Reply(Ok(LocationFix::new(
            95.0, 3.0, 5.0,
        )))]));
        assert!(matches!(
            p.acquire(0, AcquireOptions::default()).await,
            Err(LocationError::InvalidFix(_))
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn low_accuracy_first_when_requested() {
        let p = provider(ScriptedSource::new(vec![Step::Reply(Ok(LocationFix::new(
            1.0, 2.0, 300.0,
        )))]));
        p.acquire(0, AcquireOptions { high_accuracy_first: false })
            .await
            .unwrap();
        assert!(!p.source().requests()[0].high_accuracy);
    }

    #[tokio::test(start_paused = true)]
    async fn emergency_degrades_to_last_known_fix() {
        let mut source = ScriptedSource::new(vec![unavailable(), unavailable(), unavailable()]);
        source.cached = Some(LocationFix::new(-33.86, 151.2, 12.0));
        let p = provider(source);

        let fix = p.acquire_for_emergency().await.unwrap();
        assert_eq!(fix.latitude, -33.86);
        assert_eq!(fix.accuracy, 1000.0);
    }

    #[tokio::test(start_paused = true)]
    async fn emergency_without_any_position_fails() {
        let p = provider(ScriptedSource::new(vec![]));
        assert!(matches!(
            p.acquire_for_emergency().await,
            Err(LocationError::PositionUnavailable(_))
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn provider_remembers_its_last_fix() {
        let p = provider(ScriptedSource::new(vec![Step::Reply(Ok(LocationFix::new(
            7.0, 8.0, 20.0,
        )))]));
        assert!(p.last_known().is_none());
        p.acquire(0, AcquireOptions::default()).await.unwrap();
        assert_eq!(p.last_known().unwrap().longitude, 8.0);
    }
}
