//! `mongolap demo` - metrics producer and periodic query over an in-memory store

use crate::runtime::{load_config, DemoConfig};
use anyhow::Result;
use mongolap_core::{
    Dimension, Document, Granularity, Measure, MemoryStore, QueryCompiler, QuerySpec,
    SortDirection, TimeRange,
};
use rand::Rng;
use serde_json::Value;
use std::sync::Arc;
use tracing::{error, info};

/// Run the demo loop until `ticks` queries ran or Ctrl-C
pub async fn run(ticks: Option<u32>) -> Result<()> {
    let config = load_config()?;
    let compiler = QueryCompiler::new(config.compiler, Arc::new(MemoryStore::new()))?;
    let demo = config.demo;
    info!(presets = ?compiler.preset_names(), "Range presets");

    let spec = metrics_query(&demo);
    let mut inserts = tokio::time::interval(demo.insert_interval());
    let mut queries = tokio::time::interval(demo.query_interval());
    // The first tick fires immediately; start querying one period in.
    queries.tick().await;
    let mut remaining = ticks;

    loop {
        tokio::select! {
            _ = inserts.tick() => {
                info!("sending metric");
                compiler.insert_detached(demo.namespace.clone(), sample_metric());
            }
            _ = queries.tick() => {
                info!("querying metrics");
                match compiler.query(&spec).await {
                    Ok(rows) => {
                        let results = Value::Array(rows.into_iter().map(Value::Object).collect());
                        info!(%results, "query results");
                    }
                    Err(e) => error!(error = %e, "query failed"),
                }
                if let Some(n) = remaining.as_mut() {
                    *n = n.saturating_sub(1);
                    if *n == 0 {
                        break;
                    }
                }
            }
            _ = tokio::signal::ctrl_c() => {
                info!("interrupted");
                break;
            }
        }
    }
    Ok(())
}

fn metrics_query(demo: &DemoConfig) -> QuerySpec {
    QuerySpec::new(demo.namespace.clone())
        .with_range(TimeRange::preset(demo.range.clone()))
        .dimension(Dimension::new("example"))
        .measure(Measure::new("value").sorted(SortDirection::Descending))
        .measure(Measure::new("count"))
        .with_granularity(Granularity::All)
        .with_debug(true)
}

/// A metric without a timestamp; the compiler stamps it on insert
fn sample_metric() -> Document {
    let mut doc = Document::new();
    doc.insert("example".to_string(), Value::from("hello world 1"));
    doc.insert(
        "value".to_string(),
        Value::from(rand::thread_rng().gen_range(0..1000_i64)),
    );
    doc
}
