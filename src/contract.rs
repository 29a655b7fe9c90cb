//! Shape and validation rules for the analysis service's response.
//!
//! Wire data only becomes an [`AnalysisResult`] through [`validate`], which
//! rejects missing or mistyped fields and violation lists whose length
//! disagrees with the reported exceedance count.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, warn};

/// A day whose extraction exceeded the daily (KLD) limit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DailyViolation {
    pub date: NaiveDate,
    pub value: f64,
}

/// A year whose summed extraction exceeded the annual (KLY) limit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnnualViolation {
    pub year: i32,
    pub total: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AnalysisResult {
    pub average_kld: f64,
    pub daily_exceed_count: u64,
    pub daily_violation_details: Vec<DailyViolation>,
    pub average_kly: f64,
    pub annual_exceed_count: u64,
    pub annual_violation_details: Vec<AnnualViolation>,
    pub trend_slope: f64,
}

// Mirror of the wire format. Kept private so the length checks in
// `validate` cannot be bypassed by deserializing straight into
// `AnalysisResult`.
#[derive(Deserialize)]
struct WireResult {
    average_kld: f64,
    daily_exceed_count: u64,
    daily_violation_details: Vec<DailyViolation>,
    average_kly: f64,
    annual_exceed_count: u64,
    annual_violation_details: Vec<AnnualViolation>,
    trend_slope: f64,
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ValidationError {
    #[error("response body is not valid JSON: {0}")]
    NotJson(String),
    #[error("result has missing or mistyped fields: {0}")]
    Shape(String),
    #[error("{field} has {actual} entries but {count_field} is {expected}")]
    LengthMismatch {
        field: &'static str,
        count_field: &'static str,
        expected: u64,
        actual: usize,
    },
    #[error("{0}")]
    ServiceReported(String),
}

/// Validate a parsed JSON value against the result contract.
pub fn validate(raw: &Value) -> Result<AnalysisResult, ValidationError> {
    if let Some(message) = service_error_message(raw) {
        warn!("Analysis service reported an error instead of a result: {}", message);
        return Err(ValidationError::ServiceReported(message));
    }

    let wire = WireResult::deserialize(raw).map_err(|e| {
        debug!("Result failed shape validation: {}", e);
        ValidationError::Shape(e.to_string())
    })?;

    check_length(
        "daily_violation_details",
        "daily_exceed_count",
        wire.daily_exceed_count,
        wire.daily_violation_details.len(),
    )?;
    check_length(
        "annual_violation_details",
        "annual_exceed_count",
        wire.annual_exceed_count,
        wire.annual_violation_details.len(),
    )?;

    Ok(AnalysisResult {
        average_kld: wire.average_kld,
        daily_exceed_count: wire.daily_exceed_count,
        daily_violation_details: wire.daily_violation_details,
        average_kly: wire.average_kly,
        annual_exceed_count: wire.annual_exceed_count,
        annual_violation_details: wire.annual_violation_details,
        trend_slope: wire.trend_slope,
    })
}

/// Parse a raw response body and validate it.
pub fn validate_bytes(body: &[u8]) -> Result<AnalysisResult, ValidationError> {
    let raw: Value =
        serde_json::from_slice(body).map_err(|e| ValidationError::NotJson(e.to_string()))?;
    validate(&raw)
}

fn check_length(
    field: &'static str,
    count_field: &'static str,
    expected: u64,
    actual: usize,
) -> Result<(), ValidationError> {
    if actual as u64 == expected {
        Ok(())
    } else {
        warn!(
            "Rejecting result: {} has {} entries, {} is {}",
            field, actual, count_field, expected
        );
        Err(ValidationError::LengthMismatch {
            field,
            count_field,
            expected,
            actual,
        })
    }
}

// The service answers `{"error": "..."}` with a 200 when the upload holds no
// readings in its analysis window.
fn service_error_message(raw: &Value) -> Option<String> {
    let object = raw.as_object()?;
    if object.contains_key("average_kld") {
        return None;
    }
    match object.get("error")? {
        Value::String(message) => Some(message.clone()),
        other => Some(other.to_string()),
    }
}
