//! MemoryStore - in-process document store
//!
//! Evaluates the typed pipeline directly, with the store's semantics for
//! filters, date parts, accumulators and cross-type ordering. Backs the demo
//! binary and end-to-end tests, and doubles as the reference behaviour for
//! driver adapters.

mod aggregate;
mod eval;


use crate::document::Document;
use crate::error::Result;
use crate::field::GROUP_KEY;
use crate::pipeline::{FindOptions, MatchStage, Pipeline};
use crate::store::DocumentStore;
use aggregate::{filter_docs, limit_docs, run_pipeline, sort_by_keys};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, info, instrument};
use uuid::Uuid;

/// Namespaced collections of documents held in memory
#[derive(Clone, Default)]
pub struct MemoryStore {
    collections: Arc<RwLock<HashMap<String, Vec<Document>>>>,
}

impl MemoryStore {
    /// Create an empty store
    #[must_use]
    pub fn new() -> Self {
        info!("In-memory document store initialized");
        Self::default()
    }

    /// Number of documents in a namespace
    pub async fn len(&self, namespace: &str) -> usize {
        self.collections
            .read()
            .await
            .get(namespace)
            .map_or(0, Vec::len)
    }

    /// Whether a namespace holds no documents
    pub async fn is_empty(&self, namespace: &str) -> bool {
        self.len(namespace).await == 0
    }

    /// Snapshot of a namespace in insertion order
    pub async fn documents(&self, namespace: &str) -> Vec<Document> {
        self.collections
            .read()
            .await
            .get(namespace)
            .cloned()
            .unwrap_or_default()
    }

    /// Drop a namespace, returning how many documents it held
    pub async fn clear(&self, namespace: &str) -> usize {
        self.collections
            .write()
            .await
            .remove(namespace)
            .map_or(0, |docs| docs.len())
    }
}

#[async_trait::async_trait]
impl DocumentStore for MemoryStore {
    #[instrument(skip(self, document))]
    async fn insert_one(&self, namespace: &str, mut document: Document) -> Result<Value> {
        let id = match document.get(GROUP_KEY) {
            Some(id) => id.clone(),
            None => {
                let id = Value::String(Uuid::new_v4().to_string());
                document.insert(GROUP_KEY.to_string(), id.clone());
                id
            }
        };
        self.collections
            .write()
            .await
            .entry(namespace.to_string())
            .or_default()
            .push(document);
        Ok(id)
    }

    #[instrument(skip(self, pipeline), fields(stages = pipeline.len()))]
    async fn aggregate(&self, namespace: &str, pipeline: &Pipeline) -> Result<Vec<Document>> {
        let docs = self.documents(namespace).await;
        let rows = run_pipeline(pipeline, docs)?;
        debug!(rows = rows.len(), "aggregate finished");
        Ok(rows)
    }

    #[instrument(skip(self, filter, options))]
    async fn find(
        &self,
        namespace: &str,
        filter: &MatchStage,
        options: &FindOptions,
    ) -> Result<Vec<Document>> {
        let mut docs = filter_docs(filter, self.documents(namespace).await)?;
        sort_by_keys(
            &mut docs,
            options.sort.iter().map(|(f, d)| (f.as_str(), *d)),
        );
        Ok(limit_docs(docs, options.limit))
    }
}
