//! Shift lifecycle commands: refresh, list, check in/out and the shift clock.

use std::io::Write;
use std::time::Duration as StdDuration;

use chrono::Utc;
use clap::Subcommand;
use guardshift_core::clock::{self, Ticker};
use guardshift_core::lifecycle::Dispatch;
use guardshift_core::location::ManualLocation;
use guardshift_core::{LifecycleError, Shift, ShiftGateway, ShiftState};

use crate::app::{block_on, ensure_active, report, App, CliResult, LocationArgs};

#[derive(Subcommand)]
pub enum ShiftAction {
    /// Refresh active, today, upcoming and statistics
    Sync,
    /// Today's shifts
    Today,
    /// Upcoming shifts
    Upcoming,
    /// Completed and missed shifts, newest first
    Past {
        /// Maximum number of shifts (defaults to api.past_limit)
        #[arg(long)]
        limit: Option<u32>,
    },
    /// This week's shifts
    Week,
    /// The shift currently in progress
    Active,
    /// Check in to a shift at the given location
    CheckIn {
        shift_id: String,
        #[command(flatten)]
        location: LocationArgs,
    },
    /// Check out of the active shift at the given location
    CheckOut {
        shift_id: String,
        #[arg(long)]
        notes: Option<String>,
        #[command(flatten)]
        location: LocationArgs,
    },
    /// Time on shift, remaining and overtime for the active shift
    Elapsed {
        /// Keep printing once per second for this many ticks
        #[arg(long)]
        follow: Option<u64>,
    },
}

pub fn run(action: ShiftAction, app: &App) -> CliResult {
    match action {
        ShiftAction::Sync => {
            let store = app.store(ManualLocation::default())?;
            let outcome = block_on(store.sync_all())?;
            app.finish(&store)?;
            settle_sync(outcome, &store.snapshot(), app.opts.json, &mut std::io::stdout())?;
        }
        ShiftAction::Today => {
            let store = app.store(ManualLocation::default())?;
            let outcome = block_on(store.fetch_today())?;
            app.finish(&store)?;
            expect_applied(outcome)?;
            print_shifts(&store.snapshot().today, app.opts.json)?;
        }
        ShiftAction::Upcoming => {
            let store = app.store(ManualLocation::default())?;
            let outcome = block_on(store.fetch_upcoming())?;
            app.finish(&store)?;
            expect_applied(outcome)?;
            print_shifts(&store.snapshot().upcoming, app.opts.json)?;
        }
        ShiftAction::Past { limit } => {
            let store = app.store(ManualLocation::default())?;
            let outcome = block_on(store.fetch_past(limit))?;
            app.finish(&store)?;
            expect_applied(outcome)?;
            print_shifts(&store.snapshot().past, app.opts.json)?;
        }
        ShiftAction::Week => {
            if !app.credentials.is_valid() {
                return Err("not signed in; run `guardshift session login`".into());
            }
            let store = app.store(ManualLocation::default())?;
            let shifts = block_on(store.gateway().fetch_weekly_summary())??;
            print_shifts(&shifts, app.opts.json)?;
        }
        ShiftAction::Active => {
            let store = app.store(ManualLocation::default())?;
            let outcome = block_on(store.fetch_active())?;
            app.finish(&store)?;
            expect_applied(outcome)?;
            match store.snapshot().active {
                Some(shift) if app.opts.json => println!("{}", serde_json::to_string_pretty(&shift)?),
                Some(shift) => println!("{}", shift_line(&shift)),
                None if app.opts.json => println!("null"),
                None => println!("no active shift"),
            }
        }
        ShiftAction::CheckIn { shift_id, location } => {
            let store = app.store(location.source())?;
            let outcome = block_on(store.check_in(&shift_id))?;
            app.finish(&store)?;
            report(outcome, &format!("checked in to {shift_id}"))?;
        }
        ShiftAction::CheckOut {
            shift_id,
            notes,
            location,
        } => {
            let store = app.store(location.source())?;
            ensure_active(&store)?;
            let outcome = block_on(store.check_out(&shift_id, notes.as_deref()))?;
            app.finish(&store)?;
            report(outcome, &format!("checked out of {shift_id}"))?;
        }
        ShiftAction::Elapsed { follow } => {
            let state = app.snapshot.load();
            if state.active.is_none() {
                return Err("no active shift; run `guardshift shift sync` first".into());
            }
            print_clock(&state);
            if let Some(ticks) = follow {
                block_on(async {
                    let ticker = Ticker::start(StdDuration::from_secs(1));
                    let mut rx = ticker.subscribe();
                    while rx.changed().await.is_ok() {
                        print_clock(&state);
                        if *rx.borrow() >= ticks {
                            break;
                        }
                    }
                })?;
            }
        }
    }
    Ok(())
}

/// Fetches are silent when nothing was applied; the CLI is not.
fn expect_applied(outcome: Result<Dispatch, LifecycleError>) -> CliResult {
    match outcome? {
        Dispatch::Skipped => Err("not signed in; run `guardshift session login`".into()),
        Dispatch::Applied | Dispatch::Ignored => Ok(()),
    }
}

pub(crate) fn shift_line(shift: &Shift) -> String {
    format!(
        "{:<10} {:<11} {} - {}  {} ({})",
        shift.id,
        shift.status.as_str(),
        shift.scheduled_start.format("%Y-%m-%d %H:%M"),
        shift.scheduled_end.format("%H:%M"),
        shift.location_name,
        shift.location_address,
    )
}

fn print_shifts(shifts: &[Shift], json: bool) -> CliResult {
    if json {
        println!("{}", serde_json::to_string_pretty(shifts)?);
    } else if shifts.is_empty() {
        println!("no shifts");
    } else {
        for shift in shifts {
            println!("{}", shift_line(shift));
        }
    }
    Ok(())
}

/// A partial sync still shows the slices that landed before failing.
fn settle_sync(
    outcome: Result<Dispatch, LifecycleError>,
    state: &ShiftState,
    json: bool,
    out: &mut impl Write,
) -> CliResult {
    if let Err(LifecycleError::PartialSync { failures }) = &outcome {
        for failure in failures {
            eprintln!("warning: {} failed: {}", failure.slice, failure.message);
        }
        write_overview(out, state, json)?;
        return report(outcome, "synced");
    }
    report(outcome, "synced")?;
    write_overview(out, state, json)
}

fn write_overview(out: &mut impl Write, state: &ShiftState, json: bool) -> CliResult {
    if json {
        writeln!(out, "{}", serde_json::to_string_pretty(state)?)?;
        return Ok(());
    }
    match &state.active {
        Some(shift) => writeln!(out, "active:   {}", shift_line(shift))?,
        None => writeln!(out, "active:   none")?,
    }
    writeln!(out, "today:    {}", state.today.len())?;
    writeln!(out, "upcoming: {}", state.upcoming.len())?;
    writeln!(
        out,
        "stats:    {} completed, {} missed",
        state.statistics.completed_shifts, state.statistics.missed_shifts
    )?;
    Ok(())
}

fn print_clock(state: &ShiftState) {
    let Some(shift) = &state.active else {
        return;
    };
    let now = Utc::now();
    let mut line = format!(
        "{}  elapsed {}  remaining {}",
        shift.id,
        clock::format_duration(clock::elapsed_on_shift(shift, &state.breaks, now)),
        clock::format_duration(clock::remaining(shift, now)),
    );
    let overtime = clock::overtime(shift, now);
    if overtime > chrono::Duration::zero() {
        line.push_str(&format!("  overtime {}", clock::format_duration(overtime)));
    }
    if let Some(brk) = state.open_break() {
        line.push_str(&format!(
            "  on {} break, {} left",
            brk.break_type,
            clock::format_duration(clock::break_remaining(brk, now))
        ));
    }
    println!("{line}");
}

#[cfg(test)]
mod tests {
    use super::*;
    use guardshift_core::error::SliceFailure;
    use guardshift_core::SyncSlice;

    #[test]
    fn partial_sync_prints_what_was_applied_then_fails() {
        let mut state = ShiftState::default();
        state.statistics.completed_shifts = 4;
        let outcome = Err(LifecycleError::PartialSync {
            failures: vec![SliceFailure {
                slice: SyncSlice::Upcoming,
                message: "upcoming exploded".into(),
            }],
        });

        let mut out = Vec::new();
        let result = settle_sync(outcome, &state, false, &mut out);

        assert!(result.is_err());
        let printed = String::from_utf8(out).unwrap();
        assert!(printed.contains("active:   none"));
        assert!(printed.contains("stats:    4 completed, 0 missed"));
    }

    #[test]
    fn skipped_sync_prints_nothing() {
        let mut out = Vec::new();
        let result = settle_sync(Ok(Dispatch::Skipped), &ShiftState::default(), false, &mut out);
        assert!(result.is_err());
        assert!(out.is_empty());
    }
}
