//! Attendance domain types: shifts, breaks and statistics.
//!
//! These are the canonical in-memory shapes. Values arriving from the backend
//! are deserialized into them and then checked with `validate()` before the
//! lifecycle store ever sees them.

use chrono::{DateTime, Duration, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::ValidationError;

/// Shift lifecycle status.
///
/// ```text
/// Scheduled -> InProgress -> (Completed | Missed | Cancelled)
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ShiftStatus {
    Scheduled,
    InProgress,
    Completed,
    Missed,
    Cancelled,
}

impl ShiftStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            ShiftStatus::Completed | ShiftStatus::Missed | ShiftStatus::Cancelled
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ShiftStatus::Scheduled => "SCHEDULED",
            ShiftStatus::InProgress => "IN_PROGRESS",
            ShiftStatus::Completed => "COMPLETED",
            ShiftStatus::Missed => "MISSED",
            ShiftStatus::Cancelled => "CANCELLED",
        }
    }
}

impl fmt::Display for ShiftStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A scheduled work assignment at a site.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Shift {
    #[serde(alias = "_id")]
    pub id: String,
    #[serde(default)]
    pub guard_id: String,
    #[serde(default)]
    pub location_name: String,
    #[serde(default)]
    pub location_address: String,
    pub scheduled_start: DateTime<Utc>,
    pub scheduled_end: DateTime<Utc>,
    pub status: ShiftStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub check_in_time: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub check_out_time: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

impl Shift {
    /// Reject shapes the backend should never send.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.id.trim().is_empty() {
            return Err(ValidationError::InvalidValue {
                field: "id".into(),
                message: "shift id must not be empty".into(),
            });
        }
        if self.scheduled_end < self.scheduled_start {
            return Err(ValidationError::InvalidTimeRange {
                start: self.scheduled_start,
                end: self.scheduled_end,
            });
        }
        if let (Some(check_in), Some(check_out)) = (self.check_in_time, self.check_out_time) {
            if check_out < check_in {
                return Err(ValidationError::InvalidTimeRange {
                    start: check_in,
                    end: check_out,
                });
            }
        }
        Ok(())
    }

    pub fn is_in_progress(&self) -> bool {
        self.status == ShiftStatus::InProgress
    }

    pub fn scheduled_duration(&self) -> Duration {
        self.scheduled_end - self.scheduled_start
    }
}

/// Break category. Each carries a maximum-duration policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BreakType {
    Lunch,
    Rest,
    Bathroom,
    Emergency,
    Other,
}

impl BreakType {
    pub const ALL: [BreakType; 5] = [
        BreakType::Lunch,
        BreakType::Rest,
        BreakType::Bathroom,
        BreakType::Emergency,
        BreakType::Other,
    ];

    pub fn max_duration(&self) -> Duration {
        match self {
            BreakType::Lunch => Duration::minutes(60),
            BreakType::Rest => Duration::minutes(15),
            BreakType::Bathroom => Duration::minutes(10),
            BreakType::Emergency => Duration::minutes(30),
            BreakType::Other => Duration::minutes(20),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            BreakType::Lunch => "LUNCH",
            BreakType::Rest => "REST",
            BreakType::Bathroom => "BATHROOM",
            BreakType::Emergency => "EMERGENCY",
            BreakType::Other => "OTHER",
        }
    }
}

impl fmt::Display for BreakType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BreakType {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        BreakType::ALL
            .into_iter()
            .find(|t| t.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| ValidationError::InvalidValue {
                field: "breakType".into(),
                message: format!("unknown break type '{s}'"),
            })
    }
}

/// A bounded pause within the active shift.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Break {
    #[serde(alias = "_id")]
    pub id: String,
    #[serde(default)]
    pub shift_id: String,
    #[serde(rename = "breakType", alias = "type")]
    pub break_type: BreakType,
    pub start_time: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_time: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

impl Break {
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.id.trim().is_empty() {
            return Err(ValidationError::InvalidValue {
                field: "id".into(),
                message: "break id must not be empty".into(),
            });
        }
        if let Some(end) = self.end_time {
            if end < self.start_time {
                return Err(ValidationError::InvalidTimeRange {
                    start: self.start_time,
                    end,
                });
            }
        }
        Ok(())
    }

    pub fn is_open(&self) -> bool {
        self.end_time.is_none()
    }

    /// Time spent on break, measured to `now` while still open.
    pub fn duration(&self, now: DateTime<Utc>) -> Duration {
        let end = self.end_time.unwrap_or(now);
        (end - self.start_time).max(Duration::zero())
    }

    /// Whether the break has gone past its type's maximum duration.
    pub fn is_overrun(&self, now: DateTime<Utc>) -> bool {
        self.duration(now) > self.break_type.max_duration()
    }
}

/// Attendance counters for the signed-in guard.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ShiftStatistics {
    #[serde(default)]
    pub completed_shifts: u32,
    #[serde(default)]
    pub missed_shifts: u32,
    #[serde(default)]
    pub total_sites: u32,
    #[serde(default)]
    pub incident_reports: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total_hours: Option<f64>,
}

/// Inclusive date window for a statistics query.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StatisticsRange {
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
}

impl StatisticsRange {
    pub fn new(start_date: NaiveDate, end_date: NaiveDate) -> Result<Self, ValidationError> {
        if end_date < start_date {
            return Err(ValidationError::InvalidValue {
                field: "endDate".into(),
                message: format!("{end_date} is before {start_date}"),
            });
        }
        Ok(Self {
            start_date,
            end_date,
        })
    }

    pub fn query(&self) -> [(&'static str, String); 2] {
        [
            ("startDate", self.start_date.format("%Y-%m-%d").to_string()),
            ("endDate", self.end_date.format("%Y-%m-%d").to_string()),
        ]
    }
}
