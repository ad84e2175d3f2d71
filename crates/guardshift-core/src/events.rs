use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::lifecycle::SyncSlice;
use crate::model::BreakType;

/// Every applied lifecycle transition produces an Event.
/// Consumers drain them from the store; telemetry sinks subscribe to them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Event {
    CheckedIn {
        shift_id: String,
        at: DateTime<Utc>,
    },
    CheckedOut {
        shift_id: String,
        at: DateTime<Utc>,
    },
    BreakStarted {
        shift_id: String,
        break_id: String,
        break_type: BreakType,
        at: DateTime<Utc>,
    },
    BreakEnded {
        shift_id: String,
        break_id: String,
        at: DateTime<Utc>,
    },
    /// A refresh settled; `failed` lists the slices that did not apply.
    Synced {
        failed: Vec<SyncSlice>,
        at: DateTime<Utc>,
    },
    /// A fix was obtained and forwarded with a lifecycle request.
    LocationAcquired {
        latitude: f64,
        longitude: f64,
        accuracy: f64,
        at: DateTime<Utc>,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn events_serialize_with_type_tag() {
        let event = Event::BreakStarted {
            shift_id: "S1".into(),
            break_id: "B1".into(),
            break_type: BreakType::Rest,
            at: Utc::now(),
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "BreakStarted");
        assert_eq!(json["break_type"], "REST");

        let back: Event = serde_json::from_value(json).unwrap();
        assert_eq!(back, event);
    }
}
