//! Tests for the compiler against a mocked store

use super::*;
use crate::error::Error;
use crate::granularity::Granularity;
use crate::operator::SortDirection;
use crate::pipeline::Stage;
use crate::query::{Dimension, Measure, TimeRange};
use crate::store::MockDocumentStore;
use serde_json::json;

fn doc(value: Value) -> Document {
    value.as_object().cloned().unwrap()
}

fn restricted() -> CompilerConfig {
    CompilerConfig::default().with_allowed_namespaces(["events"])
}

fn compiler(config: CompilerConfig, store: MockDocumentStore) -> QueryCompiler {
    QueryCompiler::new(config, Arc::new(store)).unwrap()
}

#[tokio::test]
async fn test_disallowed_namespace_never_reaches_store() {
    let mut store = MockDocumentStore::new();
    store.expect_aggregate().never();
    store.expect_insert_one().never();
    store.expect_find().never();
    let compiler = compiler(restricted(), store);

    let spec = QuerySpec::new("secrets").measure(Measure::new("count"));
    assert!(matches!(
        compiler.query(&spec).await,
        Err(Error::NamespaceNotAllowed(ns)) if ns == "secrets"
    ));
    assert!(matches!(
        compiler.insert("secrets", doc(json!({"a": 1}))).await,
        Err(Error::NamespaceNotAllowed(_))
    ));
    assert!(matches!(
        compiler.scan(&ScanRequest::new("secrets")).await,
        Err(Error::NamespaceNotAllowed(_))
    ));
    assert!(matches!(
        compiler.query_body("secrets", QueryBody::default()).await,
        Err(Error::NamespaceNotAllowed(_))
    ));
}

#[tokio::test]
async fn test_validation_errors_never_reach_store() {
    let mut store = MockDocumentStore::new();
    store.expect_aggregate().never();
    let compiler = compiler(CompilerConfig::default(), store);

    let injected = QuerySpec::new("events").dimension(Dimension::new("$where"));
    assert!(matches!(
        compiler.query(&injected).await,
        Err(Error::InvalidFieldName { .. })
    ));

    let unknown = QuerySpec::new("events").with_range(TimeRange::preset("2 Eons"));
    assert!(matches!(
        compiler.query(&unknown).await,
        Err(Error::UnknownRangePreset(_))
    ));
}

#[tokio::test]
async fn test_query_runs_pipeline_and_reshapes() {
    let mut store = MockDocumentStore::new();
    store
        .expect_aggregate()
        .withf(|namespace, pipeline| {
            namespace.to_string() == "events"
                && pipeline.len() == 4
                && matches!(pipeline.stages()[3], Stage::Sort(_))
        })
        .times(1)
        .returning(|_, _| {
            Ok(vec![doc(json!({
                "_id": {"year": 2024, "month": 5, "day": 1, "hour": 9, "region": "us"},
                "count": 2
            }))])
        });
    let compiler = compiler(restricted(), store);

    let spec = QuerySpec::new("events")
        .with_range(TimeRange::preset("1 Hour"))
        .dimension(Dimension::new("region"))
        .measure(Measure::new("count"))
        .with_granularity(Granularity::Hour);
    let rows = compiler.query(&spec).await.unwrap();

    assert_eq!(
        rows,
        vec![doc(json!({
            "region": "us",
            "ts": {"$date": "2024-05-01T09:00:00.000Z"},
            "count": 2
        }))]
    );
}

#[tokio::test]
async fn test_store_error_propagates_unchanged() {
    let mut store = MockDocumentStore::new();
    store
        .expect_aggregate()
        .times(1)
        .returning(|_, _| Err(Error::Store("connection reset".to_string())));
    let compiler = compiler(CompilerConfig::default(), store);

    let spec = QuerySpec::new("events")
        .measure(Measure::new("value"))
        .with_debug(true);
    match compiler.query(&spec).await {
        Err(Error::Store(message)) => assert_eq!(message, "connection reset"),
        other => panic!("unexpected result {other:?}"),
    }
}

#[tokio::test]
async fn test_query_body_uses_request_shape() {
    let mut store = MockDocumentStore::new();
    store
        .expect_aggregate()
        .withf(|_, pipeline| pipeline.limit() == Some(5))
        .times(1)
        .returning(|_, _| Ok(vec![doc(json!({"_id": {"host": "a"}, "value": 3}))]));
    let compiler = compiler(CompilerConfig::default(), store);

    let body = QueryBody::from_json(json!({
        "dimensions": ["host"],
        "measures": [{"field": "value", "sort": "descending"}],
        "limit": "5"
    }))
    .unwrap();
    let rows = compiler.query_body("events", body).await.unwrap();
    assert_eq!(rows, vec![doc(json!({"value": 3, "host": "a"}))]);
}

#[tokio::test]
async fn test_insert_defaults_timestamp() {
    let mut store = MockDocumentStore::new();
    store
        .expect_insert_one()
        .withf(|namespace, document| {
            namespace.to_string() == "events"
                && document.get("ts").and_then(crate::document::as_date).is_some()
                && document["value"] == json!(7)
        })
        .times(1)
        .returning(|_, _| Ok(json!("id-1")));
    let compiler = compiler(restricted(), store);

    let id = compiler
        .insert("events", doc(json!({"value": 7})))
        .await
        .unwrap();
    assert_eq!(id, json!("id-1"));
}

#[tokio::test]
async fn test_insert_with_bad_timestamp_is_rejected() {
    let mut store = MockDocumentStore::new();
    store.expect_insert_one().never();
    let compiler = compiler(CompilerConfig::default(), store);

    let err = compiler
        .insert("events", doc(json!({"ts": "half past nine"})))
        .await
        .unwrap_err();
    assert!(matches!(err, Error::TimestampParse { .. }));
}

#[tokio::test]
async fn test_insert_detached_completes_in_background() {
    let mut store = MockDocumentStore::new();
    store
        .expect_insert_one()
        .times(1)
        .returning(|_, _| Err(Error::Store("disk full".to_string())));
    let compiler = compiler(CompilerConfig::default(), store);

    let handle = compiler.insert_detached("events", doc(json!({"value": 1})));
    handle.await.unwrap();
}

#[tokio::test]
async fn test_scan_defaults() {
    let mut store = MockDocumentStore::new();
    store
        .expect_find()
        .withf(|namespace, filter, options| {
            namespace.to_string() == "events"
                && filter.is_empty()
                && options.limit == Some(100)
                && options.sort.len() == 1
                && options.sort[0].0.as_str() == "ts"
                && options.sort[0].1 == SortDirection::Ascending
        })
        .times(1)
        .returning(|_, _, _| Ok(vec![doc(json!({"a": 1}))]));
    let compiler = compiler(CompilerConfig::default(), store);

    let docs = compiler.scan(&ScanRequest::new("events")).await.unwrap();
    assert_eq!(docs, vec![doc(json!({"a": 1}))]);
}

#[tokio::test]
async fn test_scan_with_range_and_unbounded_limit() {
    let mut store = MockDocumentStore::new();
    store
        .expect_find()
        .withf(|_, filter, options| {
            let conditions = filter.conditions_on("at").map(<[_]>::len);
            conditions == Some(3)
                && options.limit.is_none()
                && options.sort[0].1 == SortDirection::Descending
        })
        .times(1)
        .returning(|_, _, _| Ok(Vec::new()));
    let compiler = compiler(CompilerConfig::default(), store);

    let request = ScanRequest::new("events")
        .with_range(TimeRange::preset("24 Hours"))
        .with_limit(None)
        .with_order(SortDirection::Descending)
        .with_timestamp_field("at");
    assert!(compiler.scan(&request).await.unwrap().is_empty());
}

#[test]
fn test_invalid_config_rejected() {
    let config = CompilerConfig::default().with_count_measure("$count");
    let result = QueryCompiler::new(config, Arc::new(MockDocumentStore::new()));
    assert!(matches!(result, Err(Error::InvalidFieldName { .. })));
}

#[test]
fn test_preset_names_exposed() {
    let compiler = compiler(CompilerConfig::default(), MockDocumentStore::new());
    let names = compiler.preset_names();
    assert!(names.contains(&"1 Minute"));
    assert!(names.contains(&"All Time"));
}
