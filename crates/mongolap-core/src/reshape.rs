//! Result reshaping
//!
//! Inverts the binning and grouping of a compiled pipeline: the bucket's
//! calendar parts become one timestamp, dimension values move from the
//! grouping key to the top level and the grouping key is dropped.

use crate::document::{DateEncoding, Document};
use crate::field::{FieldName, GROUP_KEY};
use crate::granularity::{bucket_start, Granularity};
use serde_json::Value;
use tracing::warn;

/// Flatten grouped rows, preserving their order
///
/// A bucket whose calendar parts cannot form a valid instant gets a `null`
/// timestamp rather than a shifted one.
#[must_use]
pub fn reshape(
    granularity: Granularity,
    dimensions: &[FieldName],
    timestamp_field: &FieldName,
    encoding: DateEncoding,
    rows: Vec<Document>,
) -> Vec<Document> {
    rows.into_iter()
        .map(|row| reshape_row(granularity, dimensions, timestamp_field, encoding, row))
        .collect()
}

fn reshape_row(
    granularity: Granularity,
    dimensions: &[FieldName],
    timestamp_field: &FieldName,
    encoding: DateEncoding,
    mut row: Document,
) -> Document {
    let key = match row.remove(GROUP_KEY) {
        Some(Value::Object(key)) => key,
        Some(_) | None => Document::new(),
    };

    if granularity.is_binned() {
        let parts: Option<Vec<i64>> = granularity
            .date_parts()
            .iter()
            .map(|part| key.get(part.key()).and_then(as_integer))
            .collect();
        let timestamp = match parts.as_deref().and_then(bucket_start) {
            Some(at) => encoding.encode(at),
            None => {
                warn!(granularity = %granularity, "grouping key has no valid calendar parts");
                Value::Null
            }
        };
        row.insert(timestamp_field.to_string(), timestamp);
    }

    for field in dimensions {
        let value = key.get(field.as_str()).cloned().unwrap_or(Value::Null);
        row.insert(field.to_string(), value);
    }

    row
}

fn as_integer(value: &Value) -> Option<i64> {
    value.as_i64().or_else(|| {
        value
            .as_f64()
            .filter(|f| f.fract() == 0.0)
            .map(|f| f as i64)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn doc(value: Value) -> Document {
        match value {
            Value::Object(map) => map,
            _ => panic!("not an object"),
        }
    }

    fn fields(names: &[&str]) -> Vec<FieldName> {
        names.iter().map(|n| FieldName::parse(n).unwrap()).collect()
    }

    fn ts() -> FieldName {
        FieldName::parse("ts").unwrap()
    }

    #[test]
    fn test_hour_bucket_rebuilt() {
        let rows = vec![doc(json!({
            "_id": {"year": 2024, "month": 3, "day": 9, "hour": 14, "region": "us"},
            "count": 2
        }))];
        let out = reshape(
            Granularity::Hour,
            &fields(&["region"]),
            &ts(),
            DateEncoding::Extended,
            rows,
        );
        assert_eq!(
            out,
            vec![doc(json!({
                "count": 2,
                "ts": {"$date": "2024-03-09T14:00:00.000Z"},
                "region": "us"
            }))]
        );
    }

    #[test]
    fn test_month_is_not_shifted() {
        let rows = vec![doc(json!({"_id": {"year": 2024, "month": 12, "day": 31}}))];
        let out = reshape(Granularity::Day, &[], &ts(), DateEncoding::String, rows);
        assert_eq!(out[0]["ts"], json!("2024-12-31T00:00:00.000Z"));
    }

    #[test]
    fn test_second_bucket_and_float_parts() {
        let rows = vec![doc(json!({
            "_id": {"year": 2023.0, "month": 1, "day": 2, "hour": 3, "minute": 4, "second": 5}
        }))];
        let out = reshape(Granularity::Second, &[], &ts(), DateEncoding::String, rows);
        assert_eq!(out[0]["ts"], json!("2023-01-02T03:04:05.000Z"));
    }

    #[test]
    fn test_all_granularity_only_promotes() {
        let rows = vec![
            doc(json!({"_id": {"host": "a"}, "value": 10, "count": 3})),
            doc(json!({"_id": {"host": "b"}, "value": 4, "count": 1})),
        ];
        let out = reshape(
            Granularity::All,
            &fields(&["host"]),
            &ts(),
            DateEncoding::Extended,
            rows,
        );
        assert_eq!(out.len(), 2);
        assert_eq!(out[0], doc(json!({"value": 10, "count": 3, "host": "a"})));
        assert_eq!(out[1]["host"], json!("b"));
        assert!(out.iter().all(|r| !r.contains_key("_id") && !r.contains_key("ts")));
    }

    #[test]
    fn test_missing_dimension_becomes_null() {
        let rows = vec![doc(json!({"_id": {}, "count": 1}))];
        let out = reshape(
            Granularity::All,
            &fields(&["region"]),
            &ts(),
            DateEncoding::Extended,
            rows,
        );
        assert_eq!(out[0]["region"], Value::Null);
    }

    #[test]
    fn test_invalid_calendar_parts_give_null_timestamp() {
        let rows = vec![doc(json!({"_id": {"year": 2024, "month": 2, "day": 30}}))];
        let out = reshape(Granularity::Day, &[], &ts(), DateEncoding::Extended, rows);
        assert_eq!(out[0]["ts"], Value::Null);
    }
}
