//! QueryCompiler - allow-list, compile, execute, reshape
//!
//! Every call is an independent request/response cycle. Validation failures
//! return before the store is touched; store failures are surfaced once, with
//! no retry.

#[cfg(test)]
mod tests;

use crate::config::CompilerConfig;
use crate::document::Document;
use crate::error::Result;
use crate::field::FieldName;
use crate::normalize::normalize;
use crate::pipeline::{CompiledQuery, FindOptions, MatchStage, PipelineBuilder};
use crate::presets::RangePresets;
use crate::query::{QueryBody, QuerySpec, ScanRequest};
use crate::store::DocumentStore;
use chrono::Utc;
use serde_json::Value;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::{debug, error, instrument, warn};

/// Analytics query compiler bound to one store and one configuration
#[derive(Clone)]
pub struct QueryCompiler {
    config: Arc<CompilerConfig>,
    timestamp_field: FieldName,
    presets: RangePresets,
    store: Arc<dyn DocumentStore>,
}

impl std::fmt::Debug for QueryCompiler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QueryCompiler")
            .field("config", &self.config)
            .field("presets", &self.presets)
            .finish_non_exhaustive()
    }
}

impl QueryCompiler {
    /// Create a compiler; fails if the configured field names are unusable
    pub fn new(config: CompilerConfig, store: Arc<dyn DocumentStore>) -> Result<Self> {
        config.validate()?;
        let timestamp_field = FieldName::parse(&config.timestamp_field)?;
        debug!(
            allowed_namespaces = config.allowed_namespaces.len(),
            timestamp_field = %timestamp_field,
            "query compiler initialized"
        );
        Ok(Self {
            config: Arc::new(config),
            timestamp_field,
            presets: RangePresets::standard(),
            store,
        })
    }

    /// Replace the preset table
    #[must_use]
    pub fn with_presets(mut self, presets: RangePresets) -> Self {
        self.presets = presets;
        self
    }

    /// Active configuration
    #[must_use]
    pub fn config(&self) -> &CompilerConfig {
        &self.config
    }

    /// Preset names clients can offer, in table order
    #[must_use]
    pub fn preset_names(&self) -> Vec<&'static str> {
        self.presets.names()
    }

    /// Check the namespace and build the pipeline without running it
    pub fn compile(&self, spec: &QuerySpec) -> Result<CompiledQuery> {
        self.config.check_namespace(&spec.namespace)?;
        PipelineBuilder::new(&self.config, &self.presets).build(spec)
    }

    /// Run an aggregation query and return flat records
    #[instrument(skip(self, spec), fields(namespace = %spec.namespace, granularity = %spec.granularity))]
    pub async fn query(&self, spec: &QuerySpec) -> Result<Vec<Document>> {
        let compiled = self.compile(spec)?;
        let pipeline = compiled.pipeline();
        if spec.debug {
            debug!(pipeline = %pipeline.to_json(), "aggregation pipeline");
        }

        let rows = match self.store.aggregate(&spec.namespace, pipeline).await {
            Ok(rows) => rows,
            Err(e) => {
                if spec.debug {
                    error!(
                        namespace = %spec.namespace,
                        pipeline = %pipeline.to_json(),
                        error = %e,
                        "aggregation failed"
                    );
                }
                return Err(e);
            }
        };

        debug!(rows = rows.len(), "aggregation returned");
        Ok(compiled.reshape(rows))
    }

    /// Run a query from its JSON body
    ///
    /// The namespace is checked before the body is interpreted.
    pub async fn query_body(&self, namespace: &str, body: QueryBody) -> Result<Vec<Document>> {
        self.config.check_namespace(namespace)?;
        let spec = body.into_spec(namespace)?;
        self.query(&spec).await
    }

    /// Insert one document, defaulting its timestamp
    #[instrument(skip(self, document), fields(namespace = %namespace))]
    pub async fn insert(&self, namespace: &str, document: Document) -> Result<Value> {
        self.config.check_namespace(namespace)?;
        let document = normalize(document, &self.timestamp_field, self.config.date_encoding())?;
        self.store.insert_one(namespace, document).await
    }

    /// Insert in the background; the caller may drop the handle
    ///
    /// Failures are logged, never returned.
    pub fn insert_detached(
        &self,
        namespace: impl Into<String>,
        document: Document,
    ) -> JoinHandle<()> {
        let compiler = self.clone();
        let namespace = namespace.into();
        tokio::spawn(async move {
            if let Err(e) = compiler.insert(&namespace, document).await {
                warn!(namespace = %namespace, error = %e, "detached insert failed");
            }
        })
    }

    /// Read raw documents in timestamp order, bypassing aggregation
    #[instrument(skip(self, request), fields(namespace = %request.namespace))]
    pub async fn scan(&self, request: &ScanRequest) -> Result<Vec<Document>> {
        self.config.check_namespace(&request.namespace)?;
        let timestamp_field = match &request.timestamp_field {
            Some(field) => FieldName::parse(field)?,
            None => self.timestamp_field.clone(),
        };

        let filter = match &request.range {
            Some(range) => MatchStage::time_window(
                &timestamp_field,
                Some(range.resolve_at(&self.presets, Utc::now())?),
                self.config.date_encoding(),
            ),
            None => MatchStage::new(),
        };
        let options = FindOptions {
            sort: vec![(timestamp_field, request.order)],
            limit: request.limit,
        };
        if request.debug {
            debug!(filter = %filter.to_json(), options = %options.to_json(), "scan");
        }

        self.store
            .find(&request.namespace, &filter, &options)
            .await
            .inspect_err(|e| {
                if request.debug {
                    error!(
                        namespace = %request.namespace,
                        filter = %filter.to_json(),
                        error = %e,
                        "scan failed"
                    );
                }
            })
    }
}
