//! Trait for document store backends
//!
//! The compiler only ever needs three independent calls; a production
//! adapter maps them onto its driver, [`MemoryStore`](crate::MemoryStore)
//! evaluates them in process.

use crate::document::Document;
use crate::error::Result;
use crate::pipeline::{FindOptions, MatchStage, Pipeline};
use serde_json::Value;

/// Store capability consumed by the compiler
#[cfg_attr(test, mockall::automock)]
#[async_trait::async_trait]
pub trait DocumentStore: Send + Sync {
    /// Insert one document, returning the id the store assigned
    async fn insert_one(&self, namespace: &str, document: Document) -> Result<Value>;

    /// Run an aggregation pipeline
    async fn aggregate(&self, namespace: &str, pipeline: &Pipeline) -> Result<Vec<Document>>;

    /// Filtered, sorted, limited read of raw documents
    async fn find(
        &self,
        namespace: &str,
        filter: &MatchStage,
        options: &FindOptions,
    ) -> Result<Vec<Document>>;
}
