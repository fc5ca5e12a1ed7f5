//! Value ordering and filter evaluation

use crate::document::{as_date, parse_timestamp, Document};
use crate::error::{Error, Result};
use crate::operator::FilterOperator;
use crate::pipeline::{Condition, MatchStage, ValueType};
use serde_json::Value;
use std::cmp::Ordering;

/// Rank of a value's type in the store's cross-type sort order
fn type_rank(value: &Value) -> u8 {
    match value {
        Value::Null => 1,
        Value::Number(_) => 2,
        Value::String(_) => 3,
        Value::Object(_) if as_date(value).is_some() => 9,
        Value::Object(_) => 4,
        Value::Array(_) => 5,
        Value::Bool(_) => 8,
    }
}

/// Total order over values: by type rank, then within the type
pub(crate) fn compare_values(a: &Value, b: &Value) -> Ordering {
    let (ra, rb) = (type_rank(a), type_rank(b));
    if ra != rb {
        return ra.cmp(&rb);
    }
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => {
            let (x, y) = (x.as_f64().unwrap_or(0.0), y.as_f64().unwrap_or(0.0));
            x.partial_cmp(&y).unwrap_or(Ordering::Equal)
        }
        (Value::String(x), Value::String(y)) => x.cmp(y),
        (Value::Bool(x), Value::Bool(y)) => x.cmp(y),
        (Value::Array(x), Value::Array(y)) => x
            .iter()
            .zip(y)
            .map(|(l, r)| compare_values(l, r))
            .find(|o| o.is_ne())
            .unwrap_or_else(|| x.len().cmp(&y.len())),
        (Value::Object(x), Value::Object(y)) => {
            if let (Some(l), Some(r)) = (as_date(a), as_date(b)) {
                return l.cmp(&r);
            }
            x.iter()
                .zip(y)
                .map(|((lk, lv), (rk, rv))| lk.cmp(rk).then_with(|| compare_values(lv, rv)))
                .find(|o| o.is_ne())
                .unwrap_or_else(|| x.len().cmp(&y.len()))
        }
        _ => Ordering::Equal,
    }
}

fn values_equal(a: &Value, b: &Value) -> bool {
    type_rank(a) == type_rank(b) && compare_values(a, b) == Ordering::Equal
}

/// Equality as a filter sees it: arrays match if any element matches
fn matches_eq(field: Option<&Value>, operand: &Value) -> bool {
    match field {
        None => operand.is_null(),
        Some(Value::Array(items)) if !operand.is_array() => {
            items.iter().any(|item| values_equal(item, operand))
        }
        Some(value) => values_equal(value, operand),
    }
}

fn matches_in(field: Option<&Value>, operand: &Value) -> bool {
    operand
        .as_array()
        .is_some_and(|candidates| candidates.iter().any(|c| matches_eq(field, c)))
}

/// Ordered comparison only applies within one type bracket
fn matches_range(field: Option<&Value>, operand: &Value, accept: fn(Ordering) -> bool) -> bool {
    match field {
        Some(value) if type_rank(value) == type_rank(operand) => {
            accept(compare_values(value, operand))
        }
        _ => false,
    }
}

fn matches_condition(field: Option<&Value>, condition: &Condition) -> Result<bool> {
    let matched = match condition {
        Condition::TypeIs(ValueType::Date) => field.and_then(as_date).is_some(),
        Condition::TypeIs(ValueType::String) => field.is_some_and(Value::is_string),
        Condition::Compare(op, operand) => match op {
            FilterOperator::Eq => matches_eq(field, operand),
            FilterOperator::Ne => !matches_eq(field, operand),
            FilterOperator::Gt => matches_range(field, operand, Ordering::is_gt),
            FilterOperator::Gte => matches_range(field, operand, Ordering::is_ge),
            FilterOperator::Lt => matches_range(field, operand, Ordering::is_lt),
            FilterOperator::Lte => matches_range(field, operand, Ordering::is_le),
            FilterOperator::In => matches_in(field, operand),
            FilterOperator::Nin => !matches_in(field, operand),
            FilterOperator::Exists => field.is_some() == operand.as_bool().unwrap_or(true),
            FilterOperator::Regex => {
                let pattern = operand
                    .as_str()
                    .ok_or_else(|| Error::Store("$regex needs a string".to_string()))?;
                let re = regex::Regex::new(pattern)
                    .map_err(|e| Error::Store(format!("invalid $regex: {e}")))?;
                field.and_then(Value::as_str).is_some_and(|s| re.is_match(s))
            }
        },
    };
    Ok(matched)
}

/// Whether a document passes every predicate of the filter
pub(crate) fn matches(filter: &MatchStage, doc: &Document) -> Result<bool> {
    for predicate in filter.predicates() {
        let field = doc.get(predicate.field.as_str());
        for condition in &predicate.conditions {
            if !matches_condition(field, condition)? {
                return Ok(false);
            }
        }
    }
    Ok(true)
}

/// Read a timestamp value for date-part extraction
pub(crate) fn read_instant(
    value: Option<&Value>,
    from_string: bool,
) -> Result<chrono::DateTime<chrono::Utc>> {
    match value {
        Some(Value::String(s)) if from_string => parse_timestamp(s)
            .map_err(|e| Error::Store(format!("$dateFromString failed: {e}"))),
        Some(v) if !from_string => as_date(v)
            .ok_or_else(|| Error::Store(format!("can't convert {v} to a date"))),
        Some(v) => Err(Error::Store(format!("can't parse {v} as a date string"))),
        None => Err(Error::Store("can't convert a missing value to a date".to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::field::FieldName;
    use serde_json::json;

    fn doc(value: Value) -> Document {
        value.as_object().cloned().unwrap()
    }

    fn filter(field: &str, conditions: Vec<Condition>) -> MatchStage {
        let name = FieldName::parse(field).unwrap();
        let mut stage = MatchStage::new();
        for c in conditions {
            stage.push(&name, c);
        }
        stage
    }

    #[test]
    fn test_cross_type_order() {
        let mut values = vec![
            json!(true),
            json!({"$date": 0}),
            json!("b"),
            json!(2),
            Value::Null,
            json!([1]),
            json!({"a": 1}),
            json!(1.5),
        ];
        values.sort_by(compare_values);
        assert_eq!(
            values,
            vec![
                Value::Null,
                json!(1.5),
                json!(2),
                json!("b"),
                json!({"a": 1}),
                json!([1]),
                json!(true),
                json!({"$date": 0}),
            ]
        );
    }

    #[test]
    fn test_dates_compare_by_instant() {
        let early = json!({"$date": "2024-01-01T00:00:00Z"});
        let late = json!({"$date": 1_800_000_000_000i64});
        assert_eq!(compare_values(&early, &late), Ordering::Less);
    }

    #[test]
    fn test_grouping_keys_compare_fieldwise() {
        let a = json!({"year": 2024, "month": 2, "day": 1});
        let b = json!({"year": 2024, "month": 10, "day": 1});
        assert_eq!(compare_values(&a, &b), Ordering::Less);
    }

    #[test]
    fn test_filter_operators() {
        let d = doc(json!({"region": "us-east", "n": 5, "tags": ["a", "b"]}));
        let cases = vec![
            ("region", Condition::Compare(FilterOperator::Eq, json!("us-east")), true),
            ("region", Condition::Compare(FilterOperator::Ne, json!("eu")), true),
            ("n", Condition::Compare(FilterOperator::Gt, json!(4)), true),
            ("n", Condition::Compare(FilterOperator::Lt, json!(5)), false),
            ("n", Condition::Compare(FilterOperator::Lte, json!(5)), true),
            ("n", Condition::Compare(FilterOperator::Gte, json!("5")), false),
            ("region", Condition::Compare(FilterOperator::In, json!(["eu", "us-east"])), true),
            ("region", Condition::Compare(FilterOperator::Nin, json!(["us-east"])), false),
            ("region", Condition::Compare(FilterOperator::Regex, json!("^us-")), true),
            ("tags", Condition::Compare(FilterOperator::Eq, json!("b")), true),
            ("missing", Condition::Compare(FilterOperator::Exists, json!(false)), true),
            ("missing", Condition::Compare(FilterOperator::Eq, Value::Null), true),
            ("n", Condition::TypeIs(ValueType::String), false),
        ];
        for (field, condition, expected) in cases {
            let stage = filter(field, vec![condition.clone()]);
            assert_eq!(matches(&stage, &d).unwrap(), expected, "{field} {condition:?}");
        }
    }

    #[test]
    fn test_time_window_conditions() {
        let stage = filter(
            "ts",
            vec![
                Condition::Compare(FilterOperator::Gte, json!({"$date": 1_000})),
                Condition::Compare(FilterOperator::Lte, json!({"$date": 2_000})),
                Condition::TypeIs(ValueType::Date),
            ],
        );
        assert!(matches(&stage, &doc(json!({"ts": {"$date": 1_500}}))).unwrap());
        assert!(!matches(&stage, &doc(json!({"ts": {"$date": 2_500}}))).unwrap());
        assert!(!matches(&stage, &doc(json!({"ts": "1970-01-01T00:00:01.5Z"}))).unwrap());
        assert!(!matches(&stage, &doc(json!({}))).unwrap());
    }

    #[test]
    fn test_read_instant() {
        assert!(read_instant(Some(&json!({"$date": 0})), false).is_ok());
        assert!(read_instant(Some(&json!("2024-01-01T00:00:00Z")), true).is_ok());
        assert!(read_instant(Some(&json!("2024-01-01T00:00:00Z")), false).is_err());
        assert!(read_instant(None, false).is_err());
    }
}
