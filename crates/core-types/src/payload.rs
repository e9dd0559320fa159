use crate::enums::MetricCode;
use crate::error::CoreError;
use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

/// A single day's measurement: an optional calendar date plus a sparse
/// mapping from metric key to raw value.
///
/// Reference-window rows usually carry no date; current-window rows must
/// carry one before they can be split at an initiative's launch instant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricRow {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date: Option<String>,

    /// All remaining keys of the row. Values stay as raw JSON here so that
    /// unrecognized keys pass through untouched; recognized codes are
    /// checked for numeric-ness at extraction time.
    #[serde(flatten)]
    pub values: BTreeMap<String, Value>,
}

impl MetricRow {
    /// Extracts the value recorded under `code`, if any.
    ///
    /// Returns `Ok(None)` when the row simply does not carry the metric
    /// (sparse tolerance). A present but non-numeric value is an input
    /// error, not something to coerce.
    pub fn value(&self, code: MetricCode) -> Result<Option<f64>, CoreError> {
        match self.values.get(code.as_str()) {
            None => Ok(None),
            Some(Value::Number(n)) => {
                n.as_f64().map(Some).ok_or_else(|| CoreError::NonNumericValue {
                    metric: code.as_str().to_string(),
                    value: n.to_string(),
                })
            }
            Some(other) => Err(CoreError::NonNumericValue {
                metric: code.as_str().to_string(),
                value: other.to_string(),
            }),
        }
    }

    /// Parses this row's date. Fails if the date is absent or unparsable.
    pub fn instant(&self) -> Result<NaiveDateTime, CoreError> {
        match &self.date {
            Some(raw) => parse_instant(raw),
            None => Err(CoreError::MissingRowDate),
        }
    }
}

/// A marketing/product initiative whose launch splits the current window.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Initiative {
    pub initiative_id: String,
    pub initiative_name: String,
    pub launch_timestamp: String,
}

impl Initiative {
    pub fn launch_instant(&self) -> Result<NaiveDateTime, CoreError> {
        parse_instant(&self.launch_timestamp)
    }
}

/// The raw input payload handed to the engine.
///
/// `start_date`, `end_date` and the two row collections are required;
/// a payload without initiatives is valid and falls back to the
/// `NO_INITIATIVE` branch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisPayload {
    pub start_date: String,
    pub end_date: String,
    pub reference_metrics: Vec<MetricRow>,
    pub current_metrics: Vec<MetricRow>,
    #[serde(default)]
    pub initiatives: Vec<Initiative>,
}

impl AnalysisPayload {
    /// Parses the inclusive reporting window.
    pub fn window(&self) -> Result<(NaiveDateTime, NaiveDateTime), CoreError> {
        Ok((parse_instant(&self.start_date)?, parse_instant(&self.end_date)?))
    }
}

/// Parses an ISO-8601 date or datetime string into a naive instant.
///
/// Accepts `YYYY-MM-DD`, `YYYY-MM-DDTHH:MM`, and `T`- or space-separated
/// datetimes with optional fractional seconds. A bare date maps to midnight.
pub fn parse_instant(raw: &str) -> Result<NaiveDateTime, CoreError> {
    const FORMATS: [&str; 3] = [
        "%Y-%m-%dT%H:%M:%S%.f",
        "%Y-%m-%d %H:%M:%S%.f",
        "%Y-%m-%dT%H:%M",
    ];

    for format in FORMATS {
        if let Ok(instant) = NaiveDateTime::parse_from_str(raw, format) {
            return Ok(instant);
        }
    }

    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .map(|date| date.and_time(NaiveTime::MIN))
        .map_err(|_| CoreError::InvalidTimestamp(raw.to_string()))
}
