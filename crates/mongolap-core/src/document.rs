//! Documents and timestamp encoding
//!
//! Documents are JSON objects. Instants travel in MongoDB extended-JSON form
//! (`{"$date": "2024-03-01T12:00:00.000Z"}`) unless the store keeps dates as
//! RFC 3339 strings, see [`DateEncoding`].

use crate::error::{Error, Result};
use chrono::{DateTime, NaiveDate, NaiveDateTime, SecondsFormat, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// A schemaless document
pub type Document = Map<String, Value>;

/// Extended-JSON key marking a date value
pub const DATE_KEY: &str = "$date";

/// How instants are written into documents and filters
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DateEncoding {
    /// Native store dates (`{"$date": ...}`)
    #[default]
    Extended,
    /// RFC 3339 strings
    String,
}

impl DateEncoding {
    /// Encoding selected by the `datesAsStrings` flag
    #[must_use]
    pub fn from_flag(dates_as_strings: bool) -> Self {
        if dates_as_strings {
            Self::String
        } else {
            Self::Extended
        }
    }

    /// Encode an instant as a document value
    #[must_use]
    pub fn encode(&self, at: DateTime<Utc>) -> Value {
        let text = at.to_rfc3339_opts(SecondsFormat::Millis, true);
        match self {
            Self::Extended => {
                let mut obj = Map::new();
                obj.insert(DATE_KEY.to_string(), Value::String(text));
                Value::Object(obj)
            }
            Self::String => Value::String(text),
        }
    }

    /// Read an instant previously written with this encoding
    #[must_use]
    pub fn decode(&self, value: &Value) -> Option<DateTime<Utc>> {
        match self {
            Self::Extended => as_date(value),
            Self::String => value.as_str().and_then(|s| parse_timestamp(s).ok()),
        }
    }
}

/// Interpret an extended-JSON date value
///
/// Accepts `{"$date": "<rfc3339>"}`, `{"$date": <millis>}` and the canonical
/// `{"$date": {"$numberLong": "<millis>"}}`.
#[must_use]
pub fn as_date(value: &Value) -> Option<DateTime<Utc>> {
    let obj = value.as_object()?;
    if obj.len() != 1 {
        return None;
    }
    match obj.get(DATE_KEY)? {
        Value::String(s) => DateTime::parse_from_rfc3339(s)
            .ok()
            .map(|dt| dt.with_timezone(&Utc)),
        Value::Number(n) => n.as_i64().and_then(from_millis),
        Value::Object(inner) => inner
            .get("$numberLong")
            .and_then(Value::as_str)
            .and_then(|s| s.parse::<i64>().ok())
            .and_then(from_millis),
        _ => None,
    }
}

fn from_millis(millis: i64) -> Option<DateTime<Utc>> {
    Utc.timestamp_millis_opt(millis).single()
}

/// Parse a textual timestamp
///
/// Accepts RFC 3339, a naive `YYYY-MM-DDTHH:MM:SS[.fff]` (read as UTC) and a
/// bare `YYYY-MM-DD` (midnight UTC).
pub fn parse_timestamp(text: &str) -> Result<DateTime<Utc>> {
    let trimmed = text.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(trimmed) {
        return Ok(dt.with_timezone(&Utc));
    }
    for format in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(trimmed, format) {
            return Ok(Utc.from_utc_datetime(&naive));
        }
    }
    if let Ok(date) = NaiveDate::parse_from_str(trimmed, "%Y-%m-%d") {
        if let Some(naive) = date.and_hms_opt(0, 0, 0) {
            return Ok(Utc.from_utc_datetime(&naive));
        }
    }
    Err(Error::timestamp(text, "not an RFC 3339 or ISO 8601 date"))
}

/// Coerce a date-like value to an instant
///
/// Strings are parsed, numbers are epoch milliseconds, extended-JSON dates
/// are read as-is.
pub fn coerce_instant(value: &Value) -> Result<DateTime<Utc>> {
    match value {
        Value::String(s) => parse_timestamp(s),
        Value::Number(n) => n
            .as_i64()
            .or_else(|| n.as_f64().map(|f| f as i64))
            .and_then(from_millis)
            .ok_or_else(|| Error::timestamp(n, "epoch milliseconds out of range")),
        Value::Object(_) => {
            as_date(value).ok_or_else(|| Error::timestamp(value, "not an extended-JSON date"))
        }
        other => Err(Error::timestamp(other, "expected a date string or number")),
    }
}
