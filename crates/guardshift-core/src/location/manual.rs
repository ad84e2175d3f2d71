//! Location source fed from explicit coordinates (CLI flags, kiosk config).

use super::{LocationFix, LocationSource, PermissionStatus, PositionRequest};
use crate::error::LocationError;

#[derive(Debug, Clone, Default)]
pub struct ManualLocation {
    fix: Option<LocationFix>,
}

impl ManualLocation {
    pub fn new(fix: Option<LocationFix>) -> Self {
        Self { fix }
    }

    /// Build from optional coordinates; both must be present to yield a fix.
    pub fn from_coordinates(
        latitude: Option<f64>,
        longitude: Option<f64>,
        accuracy: f64,
        address: Option<String>,
    ) -> Self {
        let fix = match (latitude, longitude) {
            (Some(lat), Some(lon)) => {
                let fix = LocationFix::new(lat, lon, accuracy);
                Some(match address {
                    Some(addr) => fix.with_address(addr),
                    None => fix,
                })
            }
            _ => None,
        };
        Self { fix }
    }
}

impl LocationSource for ManualLocation {
    async fn request_permission(&self) -> PermissionStatus {
        PermissionStatus::Granted
    }

    async fn current_position(&self, _request: PositionRequest) -> Result<LocationFix, LocationError> {
        self.fix
            .clone()
            .ok_or_else(|| LocationError::PositionUnavailable("no coordinates supplied".into()))
    }

    fn last_known(&self) -> Option<LocationFix> {
        self.fix.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::location::{AcquireOptions, LocationPolicy, LocationProvider};

    #[tokio::test(start_paused = true)]
    async fn coordinates_produce_a_fix() {
        let source = ManualLocation::from_coordinates(Some(40.7), Some(-74.0), 8.0, Some("Pier 17".into()));
        let provider = LocationProvider::new(source, LocationPolicy::default());
        let fix = provider.acquire(0, AcquireOptions::default()).await.unwrap();
        assert_eq!(fix.address.as_deref(), Some("Pier 17"));
        assert_eq!(fix.accuracy, 8.0);
    }

    #[tokio::test(start_paused = true)]
    async fn missing_coordinate_is_unavailable() {
        let source = ManualLocation::from_coordinates(Some(40.7), None, 8.0, None);
        let provider = LocationProvider::new(source, LocationPolicy::default());
        assert!(matches!(
            provider.acquire(1, AcquireOptions::default()).await,
            Err(LocationError::PositionUnavailable(_))
        ));
    }
}
