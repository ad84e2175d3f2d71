//! Shift clock: elapsed and remaining time as pure functions of `(now, shift)`.
//!
//! Presentation code recomputes these on a [`Ticker`]; the lifecycle store
//! never reads the wall clock for display purposes.

use std::time::Duration as StdDuration;

use chrono::{DateTime, Duration, Utc};
use tokio::sync::watch;
use tokio::task::JoinHandle;

use crate::model::{Break, Shift};

/// Time on shift since check-in, minus completed and open breaks.
pub fn elapsed_on_shift(shift: &Shift, breaks: &[Break], now: DateTime<Utc>) -> Duration {
    let Some(check_in) = shift.check_in_time else {
        return Duration::zero();
    };
    let end = shift.check_out_time.unwrap_or(now);
    let gross = (end - check_in).max(Duration::zero());
    let on_break = breaks
        .iter()
        .filter(|b| b.shift_id == shift.id)
        .fold(Duration::zero(), |acc, b| acc + b.duration(end));
    (gross - on_break).max(Duration::zero())
}

/// Time left until the scheduled end; zero once it has passed.
pub fn remaining(shift: &Shift, now: DateTime<Utc>) -> Duration {
    (shift.scheduled_end - now).max(Duration::zero())
}

/// Time worked past the scheduled end.
pub fn overtime(shift: &Shift, now: DateTime<Utc>) -> Duration {
    let end = shift.check_out_time.unwrap_or(now);
    (end - shift.scheduled_end).max(Duration::zero())
}

pub fn break_elapsed(brk: &Break, now: DateTime<Utc>) -> Duration {
    brk.duration(now)
}

/// Allowance left for a break of this type; zero once overrun.
pub fn break_remaining(brk: &Break, now: DateTime<Utc>) -> Duration {
    (brk.break_type.max_duration() - brk.duration(now)).max(Duration::zero())
}

/// `H:MM:SS` for display.
pub fn format_duration(d: Duration) -> String {
    let secs = d.num_seconds().max(0);
    format!("{}:{:02}:{:02}", secs / 3600, (secs % 3600) / 60, secs % 60)
}

/// Periodic tick owned by the presentation layer.
///
/// Receivers observe a monotonically increasing tick count. The background
/// task stops on [`Ticker::cancel`] or when the ticker is dropped.
pub struct Ticker {
    handle: Option<JoinHandle<()>>,
    ticks: watch::Receiver<u64>,
}

impl Ticker {
    /// Must be called from within a tokio runtime.
    pub fn start(period: StdDuration) -> Self {
        let (tx, rx) = watch::channel(0u64);
        let handle = tokio::spawn(async move {
            let mut interval = tokio::time::interval(period);
            interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
            // The first tick completes immediately.
            interval.tick().await;
            let mut count = 0u64;
            loop {
                interval.tick().await;
                count += 1;
                if tx.send(count).is_err() {
                    break;
                }
            }
        });
        Self {
            handle: Some(handle),
            ticks: rx,
        }
    }

    pub fn subscribe(&self) -> watch::Receiver<u64> {
        self.ticks.clone()
    }

    pub fn ticks(&self) -> u64 {
        *self.ticks.borrow()
    }

    pub fn is_running(&self) -> bool {
        self.handle.as_ref().is_some_and(|h| !h.is_finished())
    }

    pub fn cancel(&mut self) {
        if let Some(handle) = self.handle.take() {
            handle.abort();
        }
    }
}

impl Drop for Ticker {
    fn drop(&mut self) {
        self.cancel();
    }
}
