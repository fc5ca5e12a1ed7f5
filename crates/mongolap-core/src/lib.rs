//! Mongolap Core - Analytics Query Compiler
//!
//! This crate turns declarative analytics requests into document-store
//! aggregation pipelines and flattens the grouped results:
//! - Presets: named relative time ranges
//! - Pipeline: typed `$match`/`$project`/`$group`/`$sort`/`$limit` stages
//! - Reshape: grouped rows back to flat, timestamped records
//! - Normalize: timestamp defaulting on insert
//! - Compiler: allow-list, query, insert and scan orchestration
//! - Store: the backend capability trait and an in-memory backend

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod compiler;
pub mod config;
pub mod document;
pub mod error;
pub mod field;
pub mod granularity;
pub mod memory;
pub mod normalize;
pub mod operator;
pub mod pipeline;
pub mod presets;
pub mod query;
pub mod reshape;
pub mod store;

pub use compiler::QueryCompiler;
pub use config::CompilerConfig;
pub use document::{DateEncoding, Document};
pub use error::{Error, Result};
pub use field::FieldName;
pub use granularity::Granularity;
pub use memory::MemoryStore;
pub use operator::{AggregateOperator, FilterOperator, SortDirection};
pub use pipeline::{CompiledQuery, FindOptions, MatchStage, Pipeline, PipelineBuilder};
pub use presets::{RangePresets, ResolvedRange, STANDARD_PRESETS};
pub use query::{Dimension, Measure, QueryBody, QuerySpec, ScanRequest, TimeRange};
pub use store::DocumentStore;
