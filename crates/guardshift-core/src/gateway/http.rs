//! reqwest-backed implementation of [`ShiftGateway`].
//!
//! Every request reads a fresh bearer header from the credential gate; nothing
//! is cached here. A 404 on the active-shift fetch is the normal "no active
//! shift" answer, and statistics fall back to the legacy `/shifts/stats` path.

use std::sync::Arc;
use std::time::Duration;

use reqwest::header::AUTHORIZATION;
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde::Serialize;
use serde_json::Value;
use url::Url;
use uuid::Uuid;

use super::envelope::Envelope;
use super::ShiftGateway;
use crate::credential::CredentialGate;
use crate::error::GatewayError;
use crate::location::LocationFix;
use crate::model::{Break, BreakType, Shift, ShiftStatistics, StatisticsRange};

pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(15);
/// Tighter bound for the opportunistic active-shift fetch.
pub const ACTIVE_SHIFT_TIMEOUT: Duration = Duration::from_secs(10);

pub struct HttpShiftGateway {
    http: Client,
    base_url: Url,
    timeout: Duration,
    active_timeout: Duration,
    credentials: Arc<CredentialGate>,
}

impl HttpShiftGateway {
    pub fn new(base_url: &str, credentials: Arc<CredentialGate>) -> Result<Self, GatewayError> {
        let base_url = Url::parse(base_url)?;
        if base_url.cannot_be_a_base() {
            return Err(GatewayError::InvalidUrl(format!(
                "{base_url} cannot be used as a base URL"
            )));
        }
        Ok(Self {
            http: Client::new(),
            base_url,
            timeout: DEFAULT_TIMEOUT,
            active_timeout: ACTIVE_SHIFT_TIMEOUT,
            credentials,
        })
    }

    pub fn with_timeouts(mut self, timeout: Duration, active_timeout: Duration) -> Self {
        self.timeout = timeout;
        self.active_timeout = active_timeout;
        self
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Incident list for a shift, passed through untouched.
    pub async fn fetch_incidents(&self, shift_id: &str) -> Result<Vec<Value>, GatewayError> {
        let response = self
            .get(&["shifts", shift_id, "incidents"], &[], self.timeout)
            .await?;
        read_envelope(response).await?.into_items()
    }

    /// File an incident report; the report body is opaque to this crate.
    pub async fn report_incident(&self, shift_id: &str, report: &Value) -> Result<Value, GatewayError> {
        let response = self
            .post(&["shifts", shift_id, "report-incident"], report)
            .await?;
        Ok(read_envelope(response).await?.into_single()?.unwrap_or(Value::Null))
    }

    fn endpoint(&self, segments: &[&str]) -> Result<Url, GatewayError> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| GatewayError::InvalidUrl(self.base_url.to_string()))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    async fn send(&self, request: RequestBuilder, timeout: Duration) -> Result<Response, GatewayError> {
        let authorization = self
            .credentials
            .bearer()
            .ok_or(GatewayError::Unauthenticated)?;
        let response = request
            .header(AUTHORIZATION, authorization)
            .timeout(timeout)
            .send()
            .await?;
        Ok(response)
    }

    async fn get(
        &self,
        segments: &[&str],
        query: &[(&str, String)],
        timeout: Duration,
    ) -> Result<Response, GatewayError> {
        let url = self.endpoint(segments)?;
        tracing::debug!(%url, "GET");
        self.send(self.http.get(url).query(query), timeout).await
    }

    async fn post<B: Serialize + Sync + ?Sized>(
        &self,
        segments: &[&str],
        body: &B,
    ) -> Result<Response, GatewayError> {
        let url = self.endpoint(segments)?;
        tracing::debug!(%url, "POST");
        let request = self
            .http
            .post(url)
            .header("Idempotency-Key", Uuid::new_v4().to_string())
            .json(body);
        self.send(request, self.timeout).await
    }

    async fn fetch_shifts(
        &self,
        segments: &[&str],
        query: &[(&str, String)],
    ) -> Result<Vec<Shift>, GatewayError> {
        let response = self.get(segments, query, self.timeout).await?;
        let items = read_envelope(response).await?.into_items()?;
        Ok(parse_shifts(items))
    }
}

impl ShiftGateway for HttpShiftGateway {
    async fn fetch_today(&self) -> Result<Vec<Shift>, GatewayError> {
        self.fetch_shifts(&["shifts", "today"], &[]).await
    }

    async fn fetch_upcoming(&self) -> Result<Vec<Shift>, GatewayError> {
        self.fetch_shifts(&["shifts", "upcoming"], &[]).await
    }

    async fn fetch_past(&self, limit: u32) -> Result<Vec<Shift>, GatewayError> {
        self.fetch_shifts(&["shifts", "past"], &[("limit", limit.to_string())])
            .await
    }

    async fn fetch_weekly_summary(&self) -> Result<Vec<Shift>, GatewayError> {
        self.fetch_shifts(&["shifts", "weekly-summary"], &[]).await
    }

    async fn fetch_active(&self) -> Result<Option<Shift>, GatewayError> {
        let response = self
            .get(&["shifts", "active"], &[], self.active_timeout)
            .await?;
        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        read_envelope(response)
            .await?
            .into_single()?
            .map(parse_shift)
            .transpose()
    }

    async fn fetch_statistics(
        &self,
        range: Option<StatisticsRange>,
    ) -> Result<ShiftStatistics, GatewayError> {
        let query: Vec<(&str, String)> = range.map(|r| r.query().to_vec()).unwrap_or_default();
        let response = self
            .get(&["shifts", "statistics"], &query, self.timeout)
            .await?;
        let response = if response.status() == StatusCode::NOT_FOUND {
            tracing::debug!("statistics endpoint missing; using legacy /shifts/stats");
            self.get(&["shifts", "stats"], &[], self.timeout).await?
        } else {
            response
        };

        match read_envelope(response).await?.into_single()? {
            Some(value) => serde_json::from_value(value)
                .map_err(|e| GatewayError::Malformed(format!("statistics: {e}"))),
            None => Ok(ShiftStatistics::default()),
        }
    }

    async fn check_in(&self, shift_id: &str, fix: &LocationFix) -> Result<Shift, GatewayError> {
        let body = CheckInBody {
            location: LocationBody::from(fix),
        };
        let response = self.post(&["shifts", shift_id, "check-in"], &body).await?;
        let value = read_envelope(response)
            .await?
            .into_single()?
            .ok_or_else(|| GatewayError::Malformed("empty check-in response".into()))?;
        parse_shift(value)
    }

    async fn check_out(
        &self,
        shift_id: &str,
        fix: &LocationFix,
        notes: Option<&str>,
    ) -> Result<Shift, GatewayError> {
        let body = CheckOutBody {
            location: LocationBody::from(fix),
            notes,
        };
        let response = self.post(&["shifts", shift_id, "check-out"], &body).await?;
        let value = read_envelope(response)
            .await?
            .into_single()?
            .ok_or_else(|| GatewayError::Malformed("empty check-out response".into()))?;
        parse_shift(value)
    }

    async fn start_break(
        &self,
        shift_id: &str,
        break_type: BreakType,
        fix: Option<&LocationFix>,
        notes: Option<&str>,
    ) -> Result<Break, GatewayError> {
        let body = StartBreakBody {
            break_type,
            location: fix.map(LocationBody::from),
            notes,
        };
        let response = self
            .post(&["shifts", shift_id, "start-break"], &body)
            .await?;
        let value = read_envelope(response)
            .await?
            .into_single()?
            .ok_or_else(|| GatewayError::Malformed("empty start-break response".into()))?;
        parse_break(value, shift_id)
    }

    async fn end_break(
        &self,
        shift_id: &str,
        break_id: &str,
        fix: Option<&LocationFix>,
        notes: Option<&str>,
    ) -> Result<Break, GatewayError> {
        let body = EndBreakBody {
            location: fix.map(LocationBody::from),
            notes,
        };
        let response = self
            .post(&["shifts", shift_id, "end-break", break_id], &body)
            .await?;
        let value = read_envelope(response)
            .await?
            .into_single()?
            .ok_or_else(|| GatewayError::Malformed("empty end-break response".into()))?;
        parse_break(value, shift_id)
    }
}

async fn read_envelope(response: Response) -> Result<Envelope, GatewayError> {
    let status = response.status();
    if status == StatusCode::UNAUTHORIZED {
        return Err(GatewayError::Unauthenticated);
    }
    let text = response.text().await?;
    if !status.is_success() {
        return Err(GatewayError::Server {
            status: status.as_u16(),
            message: error_message(status, &text),
        });
    }
    if text.trim().is_empty() {
        return Ok(Envelope::Bare(Value::Null));
    }
    let body: Value =
        serde_json::from_str(&text).map_err(|e| GatewayError::Malformed(e.to_string()))?;
    Ok(Envelope::classify(body))
}

fn error_message(status: StatusCode, text: &str) -> String {
    let from_body = serde_json::from_str::<Value>(text).ok().and_then(|v| {
        v.get("message")
            .or_else(|| v.get("error"))
            .and_then(Value::as_str)
            .map(String::from)
    });
    from_body.unwrap_or_else(|| {
        let trimmed = text.trim();
        if trimmed.is_empty() {
            status.canonical_reason().unwrap_or("request failed").to_string()
        } else {
            trimmed.chars().take(200).collect()
        }
    })
}

fn parse_shift(value: Value) -> Result<Shift, GatewayError> {
    let shift: Shift =
        serde_json::from_value(value).map_err(|e| GatewayError::Malformed(format!("shift: {e}")))?;
    shift.validate()?;
    Ok(shift)
}

/// Keep every well-formed shift; one bad record does not sink the list.
fn parse_shifts(items: Vec<Value>) -> Vec<Shift> {
    items
        .into_iter()
        .filter_map(|item| match parse_shift(item) {
            Ok(shift) => Some(shift),
            Err(e) => {
                tracing::warn!(error = %e, "dropping invalid shift record");
                None
            }
        })
        .collect()
}

fn parse_break(value: Value, shift_id: &str) -> Result<Break, GatewayError> {
    let mut brk: Break =
        serde_json::from_value(value).map_err(|e| GatewayError::Malformed(format!("break: {e}")))?;
    if brk.shift_id.is_empty() {
        brk.shift_id = shift_id.to_string();
    }
    brk.validate()?;
    Ok(brk)
}

#[derive(Debug, Serialize)]
struct LocationBody<'a> {
    latitude: f64,
    longitude: f64,
    accuracy: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    address: Option<&'a str>,
}

impl<'a> From<&'a LocationFix> for LocationBody<'a> {
    fn from(fix: &'a LocationFix) -> Self {
        Self {
            latitude: fix.latitude,
            longitude: fix.longitude,
            accuracy: fix.accuracy,
            address: fix.address.as_deref(),
        }
    }
}

#[derive(Debug, Serialize)]
struct CheckInBody<'a> {
    location: LocationBody<'a>,
}

#[derive(Debug, Serialize)]
struct CheckOutBody<'a> {
    location: LocationBody<'a>,
    #[serde(skip_serializing_if = "Option::is_none")]
    notes: Option<&'a str>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct StartBreakBody<'a> {
    break_type: BreakType,
    #[serde(skip_serializing_if = "Option::is_none")]
    location: Option<LocationBody<'a>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    notes: Option<&'a str>,
}

#[derive(Debug, Serialize)]
struct EndBreakBody<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    location: Option<LocationBody<'a>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    notes: Option<&'a str>,
}
