//! Break sub-state: at most one open break, only under the active shift.

use chrono::{DateTime, Utc};

use super::ShiftState;
use crate::error::LifecycleError;
use crate::model::Break;

impl ShiftState {
    pub fn open_break(&self) -> Option<&Break> {
        self.breaks.iter().find(|b| b.is_open())
    }

    /// Local check before a start-break request is sent. Returns the active shift id.
    pub fn check_can_start_break(&self) -> Result<String, LifecycleError> {
        let Some(active) = &self.active else {
            return Err(LifecycleError::PreconditionFailed(
                "no active shift to take a break from".into(),
            ));
        };
        if let Some(open) = self.open_break() {
            return Err(LifecycleError::PreconditionFailed(format!(
                "break {} is already open",
                open.id
            )));
        }
        Ok(active.id.clone())
    }

    /// Local check before an end-break request. Returns `(shift_id, break_id)`.
    ///
    /// `break_id` defaults to the open break; a mismatching id is rejected.
    pub fn check_can_end_break(
        &self,
        break_id: Option<&str>,
    ) -> Result<(String, String), LifecycleError> {
        let Some(open) = self.open_break() else {
            return Err(LifecycleError::PreconditionFailed(
                "no break is currently open".into(),
            ));
        };
        match break_id {
            Some(id) if id != open.id => Err(LifecycleError::PreconditionFailed(format!(
                "break {id} is not the open break ({})",
                open.id
            ))),
            _ => Ok((open.shift_id.clone(), open.id.clone())),
        }
    }

    pub(super) fn accepts_break(&self, brk: &Break) -> bool {
        self.active_id() == Some(brk.shift_id.as_str())
            && !self.breaks.iter().any(|b| b.id == brk.id)
            && !(brk.is_open() && self.open_break().is_some())
    }

    /// Close the open break at `at`, never before its start.
    pub(super) fn close_open_break(&mut self, at: DateTime<Utc>) -> Option<Break> {
        let open = self.breaks.iter_mut().find(|b| b.is_open())?;
        open.end_time = Some(at.max(open.start_time));
        Some(open.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lifecycle::{reduce, Action};
    use crate::model::{BreakType, Shift, ShiftStatus};
    use chrono::TimeZone;

    fn active_state() -> ShiftState {
        let start = Utc.with_ymd_and_hms(2026, 3, 2, 8, 0, 0).unwrap();
        let mut state = ShiftState::default();
        reduce(
            &mut state,
            Action::ActiveLoaded(Some(Shift {
                id: "S1".into(),
                guard_id: "G1".into(),
                location_name: String::new(),
                location_address: String::new(),
                scheduled_start: start,
                scheduled_end: start + chrono::Duration::hours(8),
                status: ShiftStatus::InProgress,
                check_in_time: Some(start),
                check_out_time: None,
                description: None,
                notes: None,
            })),
        );
        state
    }

    fn lunch(start: DateTime<Utc>) -> Break {
        Break {
            id: "B1".into(),
            shift_id: "S1".into(),
            break_type: BreakType::Lunch,
            start_time: start,
            end_time: None,
            notes: None,
        }
    }

    #[test]
    fn no_active_shift_blocks_break() {
        let state = ShiftState::default();
        assert!(matches!(
            state.check_can_start_break(),
            Err(LifecycleError::PreconditionFailed(_))
        ));
    }

    #[test]
    fn open_break_blocks_another() {
        let mut state = active_state();
        assert_eq!(state.check_can_start_break().unwrap(), "S1");
        reduce(&mut state, Action::BreakStarted(lunch(Utc::now())));
        assert!(state.check_can_start_break().is_err());
    }

    #[test]
    fn end_break_requires_matching_open_break() {
        let mut state = active_state();
        assert!(state.check_can_end_break(None).is_err());

        reduce(&mut state, Action::BreakStarted(lunch(Utc::now())));
        assert_eq!(
            state.check_can_end_break(None).unwrap(),
            ("S1".to_string(), "B1".to_string())
        );
        assert!(state.check_can_end_break(Some("B7")).is_err());
        assert!(state.check_can_end_break(Some("B1")).is_ok());
    }

    #[test]
    fn closing_never_precedes_start() {
        let start = Utc.with_ymd_and_hms(2026, 3, 2, 12, 0, 0).unwrap();
        let mut state = active_state();
        reduce(&mut state, Action::BreakStarted(lunch(start)));
        let closed = state
            .close_open_break(start - chrono::Duration::minutes(5))
            .unwrap();
        assert_eq!(closed.end_time, Some(start));
        assert!(state.open_break().is_none());
    }
}
