//! Insert normalization - ensure every stored document carries an event time

use crate::document::{as_date, coerce_instant, DateEncoding, Document};
use crate::error::{Error, Result};
use crate::field::FieldName;
use chrono::{DateTime, Utc};
use serde_json::Value;

/// Default or canonicalize the timestamp field of a document
pub fn normalize(
    doc: Document,
    timestamp_field: &FieldName,
    encoding: DateEncoding,
) -> Result<Document> {
    normalize_at(doc, timestamp_field, encoding, Utc::now())
}

/// [`normalize`] with an explicit "now"
///
/// - absent or `null`: set to `now`
/// - string: parsed, re-encoded canonically
/// - number: epoch milliseconds
/// - extended-JSON date: re-encoded canonically
/// - anything else: [`Error::TimestampParse`]
pub fn normalize_at(
    mut doc: Document,
    timestamp_field: &FieldName,
    encoding: DateEncoding,
    now: DateTime<Utc>,
) -> Result<Document> {
    let at = match doc.get(timestamp_field.as_str()) {
        None | Some(Value::Null) => now,
        Some(value @ (Value::String(_) | Value::Number(_))) => coerce_instant(value)?,
        Some(value @ Value::Object(_)) => as_date(value).ok_or_else(|| {
            Error::timestamp(value, "object is not an extended-JSON date")
        })?,
        Some(other) => {
            return Err(Error::timestamp(other, "expected a date, string or number"));
        }
    };
    doc.insert(timestamp_field.to_string(), encoding.encode(at));
    Ok(doc)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use serde_json::json;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, 15, 12, 0, 0).unwrap()
    }

    fn ts() -> FieldName {
        FieldName::parse("ts").unwrap()
    }

    fn doc(value: Value) -> Document {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn test_missing_timestamp_defaults_to_now() {
        let out = normalize_at(doc(json!({"value": 1})), &ts(), DateEncoding::Extended, now())
            .unwrap();
        assert_eq!(out["ts"], json!({"$date": "2024-06-15T12:00:00.000Z"}));
        assert_eq!(out["value"], json!(1));
    }

    #[test]
    fn test_null_timestamp_defaults_to_now() {
        let out =
            normalize_at(doc(json!({"ts": null})), &ts(), DateEncoding::String, now()).unwrap();
        assert_eq!(out["ts"], json!("2024-06-15T12:00:00.000Z"));
    }

    #[test]
    fn test_text_timestamp_parsed() {
        let out = normalize_at(
            doc(json!({"ts": "2021-02-17T00:28:58.131Z"})),
            &ts(),
            DateEncoding::Extended,
            now(),
        )
        .unwrap();
        assert_eq!(out["ts"], json!({"$date": "2021-02-17T00:28:58.131Z"}));
    }

    #[test]
    fn test_numeric_and_extended_timestamps() {
        let out =
            normalize_at(doc(json!({"ts": 0})), &ts(), DateEncoding::String, now()).unwrap();
        assert_eq!(out["ts"], json!("1970-01-01T00:00:00.000Z"));

        let out = normalize_at(
            doc(json!({"ts": {"$date": 0}})),
            &ts(),
            DateEncoding::Extended,
            now(),
        )
        .unwrap();
        assert_eq!(out["ts"], json!({"$date": "1970-01-01T00:00:00.000Z"}));
    }

    #[test]
    fn test_malformed_timestamps_rejected() {
        for bad in [json!("not a date"), json!(true), json!([1]), json!({"at": 1})] {
            let err = normalize_at(doc(json!({"ts": bad})), &ts(), DateEncoding::Extended, now())
                .unwrap_err();
            assert!(matches!(err, Error::TimestampParse { .. }));
        }
    }

    #[test]
    fn test_custom_timestamp_field() {
        let field = FieldName::parse("created").unwrap();
        let out = normalize_at(doc(json!({"ts": "keep"})), &field, DateEncoding::String, now())
            .unwrap();
        assert_eq!(out["ts"], json!("keep"));
        assert_eq!(out["created"], json!("2024-06-15T12:00:00.000Z"));
    }
}
