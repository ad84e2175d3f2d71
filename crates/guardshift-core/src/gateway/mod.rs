//! Shift gateway: lifecycle intents as HTTP calls.
//!
//! [`ShiftGateway`] is the seam the lifecycle store talks through;
//! [`HttpShiftGateway`] is the backend implementation.

pub mod envelope;
pub mod http;

use std::future::Future;

pub use envelope::Envelope;
pub use http::HttpShiftGateway;

use crate::error::GatewayError;
use crate::location::LocationFix;
use crate::model::{Break, BreakType, Shift, ShiftStatistics, StatisticsRange};

pub trait ShiftGateway: Send + Sync {
    fn fetch_today(&self) -> impl Future<Output = Result<Vec<Shift>, GatewayError>> + Send;

    fn fetch_upcoming(&self) -> impl Future<Output = Result<Vec<Shift>, GatewayError>> + Send;

    fn fetch_past(&self, limit: u32)
        -> impl Future<Output = Result<Vec<Shift>, GatewayError>> + Send;

    fn fetch_weekly_summary(
        &self,
    ) -> impl Future<Output = Result<Vec<Shift>, GatewayError>> + Send;

    /// `Ok(None)` when the guard has no shift in progress.
    fn fetch_active(&self) -> impl Future<Output = Result<Option<Shift>, GatewayError>> + Send;

    fn fetch_statistics(
        &self,
        range: Option<StatisticsRange>,
    ) -> impl Future<Output = Result<ShiftStatistics, GatewayError>> + Send;

    fn check_in(
        &self,
        shift_id: &str,
        fix: &LocationFix,
    ) -> impl Future<Output = Result<Shift, GatewayError>> + Send;

    fn check_out(
        &self,
        shift_id: &str,
        fix: &LocationFix,
        notes: Option<&str>,
    ) -> impl Future<Output = Result<Shift, GatewayError>> + Send;

    fn start_break(
        &self,
        shift_id: &str,
        break_type: BreakType,
        fix: Option<&LocationFix>,
        notes: Option<&str>,
    ) -> impl Future<Output = Result<Break, GatewayError>> + Send;

    fn end_break(
        &self,
        shift_id: &str,
        break_id: &str,
        fix: Option<&LocationFix>,
        notes: Option<&str>,
    ) -> impl Future<Output = Result<Break, GatewayError>> + Send;
}
