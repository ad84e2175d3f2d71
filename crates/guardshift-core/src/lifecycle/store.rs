//! Lifecycle store: intents in, reduced state out.
//!
//! Every network-bound intent follows the same path:
//!
//! ```text
//! credential valid? --no--> Skipped (nothing sent, no error)
//!     |
//! precondition? --violated--> PreconditionFailed (nothing sent)
//!     |
//! flag already set? --yes--> Ignored
//!     |
//! location (if required) -> gateway -> reduce
//! ```
//!
//! The state mutex is never held across an await; outcomes are applied in
//! the order they resolve.

use std::sync::{Arc, Mutex, MutexGuard};

use chrono::Utc;

use super::reducer::{reduce, Action};
use super::{Dispatch, Operation, ShiftState, SyncSlice};
use crate::credential::CredentialGate;
use crate::error::{LifecycleError, SliceFailure};
use crate::events::Event;
use crate::gateway::ShiftGateway;
use crate::location::{AcquireOptions, LocationFix, LocationProvider, LocationSource};
use crate::model::{BreakType, StatisticsRange};

pub const DEFAULT_PAST_LIMIT: u32 = 20;

pub struct LifecycleStore<G, L> {
    gateway: G,
    location: LocationProvider<L>,
    credentials: Arc<CredentialGate>,
    state: Mutex<ShiftState>,
    events: Mutex<Vec<Event>>,
    past_limit: u32,
}

impl<G: ShiftGateway, L: LocationSource> LifecycleStore<G, L> {
    pub fn new(gateway: G, location: LocationProvider<L>, credentials: Arc<CredentialGate>) -> Self {
        Self {
            gateway,
            location,
            credentials,
            state: Mutex::new(ShiftState::default()),
            events: Mutex::new(Vec::new()),
            past_limit: DEFAULT_PAST_LIMIT,
        }
    }

    /// Start from a previously saved snapshot.
    pub fn with_state(self, state: ShiftState) -> Self {
        *self.lock() = state.restored();
        self
    }

    pub fn with_past_limit(mut self, limit: u32) -> Self {
        self.past_limit = limit;
        self
    }

    pub fn gateway(&self) -> &G {
        &self.gateway
    }

    pub fn location(&self) -> &LocationProvider<L> {
        &self.location
    }

    /// Copy of the current state for display.
    pub fn snapshot(&self) -> ShiftState {
        self.lock().clone()
    }

    /// Take the events produced since the last drain.
    pub fn drain_events(&self) -> Vec<Event> {
        match self.events.lock() {
            Ok(mut events) => std::mem::take(&mut *events),
            Err(poisoned) => std::mem::take(&mut *poisoned.into_inner()),
        }
    }

    pub fn clear_error(&self) {
        self.apply(Action::ClearError);
    }

    /// Drop all shift state, e.g. after logout.
    pub fn reset(&self) {
        self.apply(Action::Reset);
        self.drain_events();
    }

    // ── Lifecycle intents ────────────────────────────────────────────

    /// Check in to `shift_id` with a freshly acquired location fix.
    pub async fn check_in(&self, shift_id: &str) -> Result<Dispatch, LifecycleError> {
        if !self.authorized("check-in") {
            return Ok(Dispatch::Skipped);
        }
        {
            let mut state = self.lock();
            if let Some(active) = state.active_id() {
                return Err(LifecycleError::PreconditionFailed(if active == shift_id {
                    format!("already checked in to shift {shift_id}")
                } else {
                    format!("shift {active} is still in progress; check out first")
                }));
            }
            if !begin_exclusive(&mut state, Operation::CheckIn) {
                tracing::debug!(shift_id, "check-in already in flight; ignoring");
                return Ok(Dispatch::Ignored);
            }
        }

        let result = async {
            let fix = self.acquire_fix().await?;
            let shift = self.gateway.check_in(shift_id, &fix).await?;
            tracing::info!(shift_id = %shift.id, "checked in");
            self.apply(Action::CheckedIn {
                shift,
                at: Utc::now(),
            });
            Ok::<_, LifecycleError>(Dispatch::Applied)
        }
        .await;
        self.settle(Operation::CheckIn, result)
    }

    /// Check out of the active shift. An open break is closed locally.
    pub async fn check_out(
        &self,
        shift_id: &str,
        notes: Option<&str>,
    ) -> Result<Dispatch, LifecycleError> {
        if !self.authorized("check-out") {
            return Ok(Dispatch::Skipped);
        }
        {
            let mut state = self.lock();
            if state.active_id() != Some(shift_id) {
                return Err(LifecycleError::PreconditionFailed(format!(
                    "shift {shift_id} is not the active shift"
                )));
            }
            if !begin_exclusive(&mut state, Operation::CheckOut) {
                tracing::debug!(shift_id, "check-out already in flight; ignoring");
                return Ok(Dispatch::Ignored);
            }
        }

        let result = async {
            let fix = self.acquire_fix().await?;
            let shift = self.gateway.check_out(shift_id, &fix, notes).await?;
            tracing::info!(shift_id = %shift.id, "checked out");
            self.apply(Action::CheckedOut {
                shift,
                at: Utc::now(),
            });
            Ok::<_, LifecycleError>(Dispatch::Applied)
        }
        .await;
        self.settle(Operation::CheckOut, result)
    }

    /// Open a break under the active shift.
    ///
    /// Emergency breaks take the best available fix, degraded if needed;
    /// other types attach the last known fix when there is one.
    pub async fn start_break(
        &self,
        break_type: BreakType,
        notes: Option<&str>,
    ) -> Result<Dispatch, LifecycleError> {
        if !self.authorized("start-break") {
            return Ok(Dispatch::Skipped);
        }
        let shift_id = {
            let mut state = self.lock();
            let shift_id = state.check_can_start_break()?;
            if !begin_exclusive(&mut state, Operation::Break) {
                return Ok(Dispatch::Ignored);
            }
            shift_id
        };

        let result = async {
            let fix = self.break_fix(break_type).await;
            let brk = self
                .gateway
                .start_break(&shift_id, break_type, fix.as_ref(), notes)
                .await?;
            tracing::info!(shift_id = %shift_id, break_id = %brk.id, %break_type, "break started");
            self.apply(Action::BreakStarted(brk));
            Ok::<_, LifecycleError>(Dispatch::Applied)
        }
        .await;
        self.settle(Operation::Break, result)
    }

    /// Close the open break. `break_id`, when given, must name it.
    pub async fn end_break(
        &self,
        break_id: Option<&str>,
        notes: Option<&str>,
    ) -> Result<Dispatch, LifecycleError> {
        if !self.authorized("end-break") {
            return Ok(Dispatch::Skipped);
        }
        let (shift_id, break_id) = {
            let mut state = self.lock();
            let ids = state.check_can_end_break(break_id)?;
            if !begin_exclusive(&mut state, Operation::Break) {
                return Ok(Dispatch::Ignored);
            }
            ids
        };

        let result = async {
            let fix = self.location.last_known();
            let mut brk = self
                .gateway
                .end_break(&shift_id, &break_id, fix.as_ref(), notes)
                .await?;
            brk.shift_id = shift_id.clone();
            tracing::info!(shift_id = %shift_id, break_id = %brk.id, "break ended");
            self.apply(Action::BreakEnded {
                brk,
                at: Utc::now(),
            });
            Ok::<_, LifecycleError>(Dispatch::Applied)
        }
        .await;
        self.settle(Operation::Break, result)
    }

    // ── Refresh intents ──────────────────────────────────────────────

    /// Refresh active, upcoming, today and statistics concurrently.
    ///
    /// Each slice is applied as soon as it resolves. Failed slices are listed
    /// in [`LifecycleError::PartialSync`]; the others stay applied.
    pub async fn sync_all(&self) -> Result<Dispatch, LifecycleError> {
        if !self.authorized("sync") {
            return Ok(Dispatch::Skipped);
        }
        self.apply(Action::Begin(Operation::Bulk));
        self.apply(Action::Begin(Operation::Statistics));

        let active = async {
            let result = self.gateway.fetch_active().await;
            self.apply_slice(SyncSlice::Active, result.map(Action::ActiveLoaded))
        };
        let upcoming = async {
            let result = self.gateway.fetch_upcoming().await;
            self.apply_slice(SyncSlice::Upcoming, result.map(Action::UpcomingLoaded))
        };
        let today = async {
            let result = self.gateway.fetch_today().await;
            self.apply_slice(SyncSlice::Today, result.map(Action::TodayLoaded))
        };
        let statistics = async {
            let result = self.gateway.fetch_statistics(None).await;
            let failure =
                self.apply_slice(SyncSlice::Statistics, result.map(Action::StatisticsLoaded));
            self.apply(Action::Finish(Operation::Statistics));
            failure
        };

        let (active, upcoming, today, statistics) = tokio::join!(active, upcoming, today, statistics);
        let failures: Vec<SliceFailure> = [active, upcoming, today, statistics]
            .into_iter()
            .flatten()
            .collect();

        self.apply(Action::Finish(Operation::Bulk));
        self.record(Event::Synced {
            failed: failures.iter().map(|f| f.slice).collect(),
            at: Utc::now(),
        });

        if failures.is_empty() {
            tracing::info!("sync complete");
            return Ok(Dispatch::Applied);
        }
        let err = LifecycleError::PartialSync { failures };
        tracing::warn!(error = %err, "partial sync");
        self.apply(Action::Failed(err.to_string()));
        Err(err)
    }

    pub async fn fetch_today(&self) -> Result<Dispatch, LifecycleError> {
        if !self.authorized("fetch today") {
            return Ok(Dispatch::Skipped);
        }
        self.apply(Action::Begin(Operation::Bulk));
        let result = self.gateway.fetch_today().await.map(Action::TodayLoaded);
        self.settle_fetch(Operation::Bulk, result)
    }

    pub async fn fetch_upcoming(&self) -> Result<Dispatch, LifecycleError> {
        if !self.authorized("fetch upcoming") {
            return Ok(Dispatch::Skipped);
        }
        self.apply(Action::Begin(Operation::Bulk));
        let result = self.gateway.fetch_upcoming().await.map(Action::UpcomingLoaded);
        self.settle_fetch(Operation::Bulk, result)
    }

    /// Past shifts, newest first. `None` uses the configured limit.
    pub async fn fetch_past(&self, limit: Option<u32>) -> Result<Dispatch, LifecycleError> {
        if !self.authorized("fetch past") {
            return Ok(Dispatch::Skipped);
        }
        self.apply(Action::Begin(Operation::Bulk));
        let result = self
            .gateway
            .fetch_past(limit.unwrap_or(self.past_limit))
            .await
            .map(Action::PastLoaded);
        self.settle_fetch(Operation::Bulk, result)
    }

    /// Refresh the active shift. "No active shift" is a successful empty result.
    pub async fn fetch_active(&self) -> Result<Dispatch, LifecycleError> {
        if !self.authorized("fetch active") {
            return Ok(Dispatch::Skipped);
        }
        self.apply(Action::Begin(Operation::Bulk));
        let result = self.gateway.fetch_active().await.map(Action::ActiveLoaded);
        self.settle_fetch(Operation::Bulk, result)
    }

    /// Replace statistics. On failure the previous values stay in place.
    pub async fn fetch_statistics(
        &self,
        range: Option<StatisticsRange>,
    ) -> Result<Dispatch, LifecycleError> {
        if !self.authorized("fetch statistics") {
            return Ok(Dispatch::Skipped);
        }
        self.apply(Action::Begin(Operation::Statistics));
        let result = self
            .gateway
            .fetch_statistics(range)
            .await
            .map(Action::StatisticsLoaded);
        self.settle_fetch(Operation::Statistics, result)
    }

    // ── Internals ────────────────────────────────────────────────────

    fn lock(&self) -> MutexGuard<'_, ShiftState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn apply(&self, action: Action) {
        let events = reduce(&mut self.lock(), action);
        for event in events {
            self.record(event);
        }
    }

    fn record(&self, event: Event) {
        match self.events.lock() {
            Ok(mut events) => events.push(event),
            Err(poisoned) => poisoned.into_inner().push(event),
        }
    }

    fn authorized(&self, intent: &str) -> bool {
        let valid = self.credentials.is_valid();
        if !valid {
            tracing::debug!(intent, "no valid credential; skipping");
        }
        valid
    }

    async fn acquire_fix(&self) -> Result<LocationFix, LifecycleError> {
        let retries = self.location.policy().retries;
        let fix = self
            .location
            .acquire(retries, AcquireOptions::default())
            .await?;
        self.record_fix(&fix);
        Ok(fix)
    }

    async fn break_fix(&self, break_type: BreakType) -> Option<LocationFix> {
        let fix = if break_type == BreakType::Emergency {
            match self.location.acquire_for_emergency().await {
                Ok(fix) => Some(fix),
                Err(e) => {
                    tracing::warn!(error = %e, "emergency break without location");
                    None
                }
            }
        } else {
            self.location.last_known()
        };
        if let Some(fix) = &fix {
            self.record_fix(fix);
        }
        fix
    }

    fn record_fix(&self, fix: &LocationFix) {
        self.record(Event::LocationAcquired {
            latitude: fix.latitude,
            longitude: fix.longitude,
            accuracy: fix.accuracy,
            at: fix.timestamp,
        });
    }

    /// Clear the operation's flag and record a failure for display.
    fn settle(
        &self,
        op: Operation,
        result: Result<Dispatch, LifecycleError>,
    ) -> Result<Dispatch, LifecycleError> {
        if let Err(e) = &result {
            tracing::warn!(error = %e, ?op, "intent failed");
            self.apply(Action::Failed(e.to_string()));
        }
        self.apply(Action::Finish(op));
        result
    }

    fn settle_fetch(
        &self,
        op: Operation,
        result: Result<Action, crate::error::GatewayError>,
    ) -> Result<Dispatch, LifecycleError> {
        let result = result
            .map(|action| {
                self.apply(action);
                Dispatch::Applied
            })
            .map_err(LifecycleError::from);
        self.settle(op, result)
    }

    fn apply_slice(
        &self,
        slice: SyncSlice,
        result: Result<Action, crate::error::GatewayError>,
    ) -> Option<SliceFailure> {
        match result {
            Ok(action) => {
                self.apply(action);
                None
            }
            Err(e) => {
                tracing::debug!(%slice, error = %e, "slice failed");
                Some(SliceFailure {
                    slice,
                    message: e.to_string(),
                })
            }
        }
    }
}

/// Set an exclusive flag unless it is already set.
fn begin_exclusive(state: &mut ShiftState, op: Operation) -> bool {
    if state.loading.get(op) {
        return false;
    }
    reduce(state, Action::Begin(op));
    true
}
