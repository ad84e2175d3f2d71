//! The only code that mutates [`ShiftState`].

use chrono::{DateTime, Utc};

use super::{Operation, ShiftState};
use crate::events::Event;
use crate::model::{Break, Shift, ShiftStatistics, ShiftStatus};

/// A resolved intent outcome, or a loading-flag transition.
#[derive(Debug, Clone, PartialEq)]
pub enum Action {
    Begin(Operation),
    Finish(Operation),
    TodayLoaded(Vec<Shift>),
    UpcomingLoaded(Vec<Shift>),
    PastLoaded(Vec<Shift>),
    ActiveLoaded(Option<Shift>),
    StatisticsLoaded(ShiftStatistics),
    CheckedIn { shift: Shift, at: DateTime<Utc> },
    CheckedOut { shift: Shift, at: DateTime<Utc> },
    BreakStarted(Break),
    BreakEnded { brk: Break, at: DateTime<Utc> },
    Failed(String),
    ClearError,
    Reset,
}

/// Apply `action` and return the events it produced.
///
/// `Begin` on an exclusive operation that is already in flight leaves the
/// state untouched; callers check [`super::LoadingFlags`] first.
pub fn reduce(state: &mut ShiftState, action: Action) -> Vec<Event> {
    let mut events = Vec::new();
    match action {
        Action::Begin(op) => begin(state, op),
        Action::Finish(op) => finish(state, op),
        Action::TodayLoaded(shifts) => state.today = shifts,
        Action::UpcomingLoaded(shifts) => state.upcoming = shifts,
        Action::PastLoaded(shifts) => state.past = shifts,
        Action::ActiveLoaded(shift) => set_active(state, shift.filter(Shift::is_in_progress)),
        Action::StatisticsLoaded(stats) => {
            state.statistics = stats;
            state.statistics_loaded = true;
        }
        Action::CheckedIn { mut shift, at } => {
            shift.status = ShiftStatus::InProgress;
            shift.check_out_time = None;
            let check_in = *shift.check_in_time.get_or_insert(at);
            events.push(Event::CheckedIn {
                shift_id: shift.id.clone(),
                at: check_in,
            });
            set_active(state, Some(shift));
        }
        Action::CheckedOut { mut shift, at } => {
            shift.status = ShiftStatus::Completed;
            let held = state
                .active
                .as_ref()
                .filter(|active| active.id == shift.id)
                .and_then(|active| active.check_in_time);
            if shift.check_in_time.is_none() {
                shift.check_in_time = held;
            }
            let mut check_out = shift.check_out_time.unwrap_or(at);
            if let Some(check_in) = shift.check_in_time {
                check_out = check_out.max(check_in);
            }
            shift.check_out_time = Some(check_out);
            if state.active_id() == Some(shift.id.as_str()) {
                if let Some(closed) = state.close_open_break(check_out) {
                    events.push(Event::BreakEnded {
                        shift_id: closed.shift_id,
                        break_id: closed.id,
                        at: check_out,
                    });
                }
                state.active = None;
                state.breaks.clear();
            }
            events.push(Event::CheckedOut {
                shift_id: shift.id.clone(),
                at: check_out,
            });
            state.past.retain(|s| s.id != shift.id);
            state.past.insert(0, shift);
        }
        Action::BreakStarted(brk) => {
            if state.accepts_break(&brk) {
                events.push(Event::BreakStarted {
                    shift_id: brk.shift_id.clone(),
                    break_id: brk.id.clone(),
                    break_type: brk.break_type,
                    at: brk.start_time,
                });
                state.breaks.push(brk);
            } else {
                tracing::warn!(break_id = %brk.id, "dropping break outside the active shift");
            }
        }
        Action::BreakEnded { mut brk, at } => {
            let end = *brk.end_time.get_or_insert(at);
            let slot = state
                .breaks
                .iter_mut()
                .find(|b| b.id == brk.id && b.shift_id == brk.shift_id && b.is_open());
            if let Some(slot) = slot {
                events.push(Event::BreakEnded {
                    shift_id: brk.shift_id.clone(),
                    break_id: brk.id.clone(),
                    at: end,
                });
                *slot = brk;
            }
        }
        Action::Failed(message) => state.error = Some(message),
        Action::ClearError => state.error = None,
        Action::Reset => *state = ShiftState::default(),
    }
    normalize(state);
    events
}

fn begin(state: &mut ShiftState, op: Operation) {
    if op.is_exclusive() && state.loading.get(op) {
        return;
    }
    match op {
        Operation::Bulk => state.in_flight.bulk += 1,
        Operation::Statistics => state.in_flight.statistics += 1,
        _ => {}
    }
    state.loading.set(op, true);
    state.error = None;
}

fn finish(state: &mut ShiftState, op: Operation) {
    let still_running = match op {
        Operation::Bulk => {
            state.in_flight.bulk = state.in_flight.bulk.saturating_sub(1);
            state.in_flight.bulk > 0
        }
        Operation::Statistics => {
            state.in_flight.statistics = state.in_flight.statistics.saturating_sub(1);
            state.in_flight.statistics > 0
        }
        _ => false,
    };
    state.loading.set(op, still_running);
}

fn set_active(state: &mut ShiftState, shift: Option<Shift>) {
    let same_shift = match (&state.active, &shift) {
        (Some(current), Some(next)) => current.id == next.id,
        _ => false,
    };
    if !same_shift {
        state.breaks.clear();
    }
    state.active = shift;
}

/// Restore the bucket invariants after any mutation.
///
/// Bucket precedence is active > today > upcoming > past; a shift that
/// appears in more than one keeps only its highest-precedence copy.
pub(super) fn normalize(state: &mut ShiftState) {
    if state.active.as_ref().is_some_and(|s| !s.is_in_progress()) {
        state.active = None;
    }
    if let Some(active_id) = state.active.as_ref().map(|s| s.id.clone()) {
        state.today.retain(|s| s.id != active_id);
        state.upcoming.retain(|s| s.id != active_id);
        state.past.retain(|s| s.id != active_id);
        state.breaks.retain(|b| b.shift_id == active_id);
    } else {
        state.breaks.clear();
    }

    let today = state.today.clone();
    state
        .upcoming
        .retain(|s| !today.iter().any(|t| t.id == s.id));
    let upcoming = state.upcoming.clone();
    state.past.retain(|s| {
        !today.iter().any(|t| t.id == s.id) && !upcoming.iter().any(|u| u.id == s.id)
    });

    dedupe(&mut state.today);
    dedupe(&mut state.upcoming);
    dedupe(&mut state.past);
}

fn dedupe(shifts: &mut Vec<Shift>) {
    let mut seen = std::collections::HashSet::new();
    shifts.retain(|s| seen.insert(s.id.clone()));
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::BreakType;
    use chrono::TimeZone;
    use proptest::prelude::*;

    fn at(h: u32, m: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 2, h, m, 0).unwrap()
    }

    fn shift(id: &str, status: ShiftStatus) -> Shift {
        Shift {
            id: id.into(),
            guard_id: "G1".into(),
            location_name: "Depot".into(),
            location_address: "4 Quay St".into(),
            scheduled_start: at(8, 0),
            scheduled_end: at(16, 0),
            status,
            check_in_time: None,
            check_out_time: None,
            description: None,
            notes: None,
        }
    }

    fn open_break(id: &str, shift_id: &str, start: DateTime<Utc>) -> Break {
        Break {
            id: id.into(),
            shift_id: shift_id.into(),
            break_type: BreakType::Rest,
            start_time: start,
            end_time: None,
            notes: None,
        }
    }

    #[test]
    fn check_in_moves_shift_from_today_to_active() {
        let mut state = ShiftState::default();
        reduce(
            &mut state,
            Action::TodayLoaded(vec![shift("S1", ShiftStatus::Scheduled), shift("S2", ShiftStatus::Scheduled)]),
        );
        let events = reduce(
            &mut state,
            Action::CheckedIn {
                shift: shift("S1", ShiftStatus::Scheduled),
                at: at(7, 58),
            },
        );

        let active = state.active.as_ref().unwrap();
        assert_eq!(active.status, ShiftStatus::InProgress);
        assert_eq!(active.check_in_time, Some(at(7, 58)));
        assert_eq!(state.today.len(), 1);
        assert_eq!(state.today[0].id, "S2");
        assert!(matches!(events.as_slice(), [Event::CheckedIn { shift_id, .. }] if shift_id == "S1"));
    }

    #[test]
    fn check_out_reply_without_check_in_time_keeps_the_local_one() {
        let mut state = ShiftState::default();
        reduce(
            &mut state,
            Action::CheckedIn {
                shift: shift("S1", ShiftStatus::Scheduled),
                at: at(8, 0),
            },
        );
        reduce(
            &mut state,
            Action::CheckedOut {
                shift: shift("S1", ShiftStatus::InProgress),
                at: at(16, 0),
            },
        );

        let done = &state.past[0];
        assert_eq!(done.check_in_time, Some(at(8, 0)));
        assert_eq!(done.check_out_time, Some(at(16, 0)));
        assert!(state.active.is_none());
    }

    #[test]
    fn check_out_time_never_precedes_check_in() {
        let mut state = ShiftState::default();
        reduce(
            &mut state,
            Action::CheckedIn {
                shift: shift("S1", ShiftStatus::Scheduled),
                at: at(9, 0),
            },
        );
        let mut reply = shift("S1", ShiftStatus::InProgress);
        reply.check_out_time = Some(at(8, 30));
        reduce(&mut state, Action::CheckedOut { shift: reply, at: at(16, 0) });

        let done = &state.past[0];
        assert_eq!(done.check_in_time, Some(at(9, 0)));
        assert_eq!(done.check_out_time, Some(at(9, 0)));
    }

    #[test]
    fn check_out_completes_closes_break_and_files_into_past() {
        let mut state = ShiftState::default();
        reduce(
            &mut state,
            Action::CheckedIn {
                shift: shift("S1", ShiftStatus::InProgress),
                at: at(8, 0),
            },
        );
        reduce(&mut state, Action::BreakStarted(open_break("B1", "S1", at(12, 0))));
        reduce(&mut state, Action::PastLoaded(vec![shift("S0", ShiftStatus::Completed)]));

        let events = reduce(
            &mut state,
            Action::CheckedOut {
                shift: shift("S1", ShiftStatus::InProgress),
                at: at(16, 5),
            },
        );

        assert!(state.active.is_none());
        assert!(state.breaks.is_empty());
        assert_eq!(state.past[0].id, "S1");
        assert_eq!(state.past[0].status, ShiftStatus::Completed);
        assert_eq!(state.past[0].check_out_time, Some(at(16, 5)));
        assert_eq!(state.past[1].id, "S0");
        assert!(matches!(events[0], Event::BreakEnded { .. }));
        assert!(matches!(events[1], Event::CheckedOut { .. }));
    }

    #[test]
    fn break_for_another_shift_is_dropped() {
        let mut state = ShiftState::default();
        reduce(
            &mut state,
            Action::ActiveLoaded(Some(shift("S1", ShiftStatus::InProgress))),
        );
        let events = reduce(&mut state, Action::BreakStarted(open_break("B1", "S9", at(12, 0))));
        assert!(events.is_empty());
        assert!(state.breaks.is_empty());
    }

    #[test]
    fn second_open_break_is_dropped() {
        let mut state = ShiftState::default();
        reduce(
            &mut state,
            Action::ActiveLoaded(Some(shift("S1", ShiftStatus::InProgress))),
        );
        reduce(&mut state, Action::BreakStarted(open_break("B1", "S1", at(12, 0))));
        reduce(&mut state, Action::BreakStarted(open_break("B2", "S1", at(12, 5))));
        assert_eq!(state.breaks.len(), 1);
    }

    #[test]
    fn refetched_active_keeps_its_breaks_but_a_new_one_does_not() {
        let mut state = ShiftState::default();
        reduce(
            &mut state,
            Action::ActiveLoaded(Some(shift("S1", ShiftStatus::InProgress))),
        );
        reduce(&mut state, Action::BreakStarted(open_break("B1", "S1", at(12, 0))));

        reduce(
            &mut state,
            Action::ActiveLoaded(Some(shift("S1", ShiftStatus::InProgress))),
        );
        assert_eq!(state.breaks.len(), 1);

        reduce(
            &mut state,
            Action::ActiveLoaded(Some(shift("S2", ShiftStatus::InProgress))),
        );
        assert!(state.breaks.is_empty());
    }

    #[test]
    fn active_that_is_not_in_progress_is_not_held() {
        let mut state = ShiftState::default();
        reduce(
            &mut state,
            Action::ActiveLoaded(Some(shift("S1", ShiftStatus::Completed))),
        );
        assert!(state.active.is_none());
    }

    #[test]
    fn shared_loading_flags_stay_set_until_last_finish() {
        let mut state = ShiftState::default();
        reduce(&mut state, Action::Begin(Operation::Bulk));
        reduce(&mut state, Action::Begin(Operation::Bulk));
        reduce(&mut state, Action::Finish(Operation::Bulk));
        assert!(state.loading.loading);
        reduce(&mut state, Action::Finish(Operation::Bulk));
        assert!(!state.loading.loading);
    }

    #[test]
    fn begin_clears_previous_error() {
        let mut state = ShiftState::default();
        reduce(&mut state, Action::Failed("no signal".into()));
        reduce(&mut state, Action::Begin(Operation::CheckIn));
        assert!(state.error.is_none());
        assert!(state.loading.check_in);
        assert!(!state.loading.check_out);
    }

    fn status_strategy() -> impl Strategy<Value = ShiftStatus> + Clone {
        prop_oneof![
            Just(ShiftStatus::Scheduled),
            Just(ShiftStatus::InProgress),
            Just(ShiftStatus::Completed),
            Just(ShiftStatus::Missed),
            Just(ShiftStatus::Cancelled),
        ]
    }

    fn shift_strategy() -> impl Strategy<Value = Shift> + Clone {
        (0u8..4, status_strategy()).prop_map(|(n, status)| shift(&format!("S{n}"), status))
    }

    fn action_strategy() -> impl Strategy<Value = Action> {
        let shifts = prop::collection::vec(shift_strategy(), 0..4);
        prop_oneof![
            shifts.clone().prop_map(Action::TodayLoaded),
            shifts.clone().prop_map(Action::UpcomingLoaded),
            shifts.prop_map(Action::PastLoaded),
            prop::option::of(shift_strategy()).prop_map(Action::ActiveLoaded),
            shift_strategy().prop_map(|shift| Action::CheckedIn { shift, at: at(8, 0) }),
            shift_strategy().prop_map(|shift| Action::CheckedOut { shift, at: at(16, 0) }),
            (0u8..3, 0u8..4).prop_map(|(b, s)| Action::BreakStarted(open_break(
                &format!("B{b}"),
                &format!("S{s}"),
                at(12, 0)
            ))),
            (0u8..3, 0u8..4).prop_map(|(b, s)| Action::BreakEnded {
                brk: open_break(&format!("B{b}"), &format!("S{s}"), at(12, 0)),
                at: at(12, 10),
            }),
            Just(Action::Reset),
        ]
    }

    proptest! {
        #[test]
        fn invariants_hold_for_any_action_sequence(actions in prop::collection::vec(action_strategy(), 0..40)) {
            let mut state = ShiftState::default();
            for action in actions {
                reduce(&mut state, action);

                if let Some(active) = &state.active {
                    prop_assert_eq!(active.status, ShiftStatus::InProgress);
                    prop_assert!(active.check_out_time.is_none() || active.check_in_time.is_some());
                }
                for brk in &state.breaks {
                    prop_assert_eq!(Some(brk.shift_id.as_str()), state.active_id());
                }
                prop_assert!(state.breaks.iter().filter(|b| b.is_open()).count() <= 1);

                let mut ids: Vec<&str> = state
                    .active
                    .iter()
                    .chain(&state.today)
                    .chain(&state.upcoming)
                    .chain(&state.past)
                    .map(|s| s.id.as_str())
                    .collect();
                let total = ids.len();
                ids.sort_unstable();
                ids.dedup();
                prop_assert_eq!(ids.len(), total);
            }
        }
    }
}
