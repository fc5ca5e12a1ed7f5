//! PipelineBuilder - QuerySpec to aggregation stages

use super::{
    Accumulator, AccumulatorInput, Condition, GroupStage, MatchStage, Pipeline, ProjectStage,
    SortKey, SortStage, Stage,
};
use crate::config::CompilerConfig;
use crate::document::{DateEncoding, Document};
use crate::error::{Error, Result};
use crate::field::FieldName;
use crate::granularity::Granularity;
use crate::operator::{AggregateOperator, FilterOperator, SortDirection};
use crate::presets::RangePresets;
use crate::query::{Dimension, QuerySpec};
use crate::reshape::reshape;
use chrono::{DateTime, Utc};
use serde_json::Value;

/// A built pipeline plus what the reshaper needs to invert it
#[derive(Debug, Clone, PartialEq)]
pub struct CompiledQuery {
    pipeline: Pipeline,
    granularity: Granularity,
    dimensions: Vec<FieldName>,
    timestamp_field: FieldName,
    encoding: DateEncoding,
}

impl CompiledQuery {
    /// The aggregation plan
    #[must_use]
    pub fn pipeline(&self) -> &Pipeline {
        &self.pipeline
    }

    /// Bucket width the plan bins on
    #[must_use]
    pub fn granularity(&self) -> Granularity {
        self.granularity
    }

    /// Validated dimension fields, deduplicated, in declaration order
    #[must_use]
    pub fn dimensions(&self) -> &[FieldName] {
        &self.dimensions
    }

    /// Timestamp field the plan reads
    #[must_use]
    pub fn timestamp_field(&self) -> &FieldName {
        &self.timestamp_field
    }

    /// Turn grouped store rows into flat records
    #[must_use]
    pub fn reshape(&self, rows: Vec<Document>) -> Vec<Document> {
        reshape(
            self.granularity,
            &self.dimensions,
            &self.timestamp_field,
            self.encoding,
            rows,
        )
    }
}

/// Builds aggregation pipelines from query specs
///
/// Pure: no I/O, and the only time dependency is the instant presets are
/// resolved against.
#[derive(Debug, Clone, Copy)]
pub struct PipelineBuilder<'a> {
    config: &'a CompilerConfig,
    presets: &'a RangePresets,
}

impl<'a> PipelineBuilder<'a> {
    /// Builder bound to a configuration and preset table
    #[must_use]
    pub fn new(config: &'a CompilerConfig, presets: &'a RangePresets) -> Self {
        Self { config, presets }
    }

    /// Build against the current instant
    pub fn build(&self, spec: &QuerySpec) -> Result<CompiledQuery> {
        self.build_at(spec, Utc::now())
    }

    /// Build with presets resolved against `now`
    pub fn build_at(&self, spec: &QuerySpec, now: DateTime<Utc>) -> Result<CompiledQuery> {
        let encoding = self.config.date_encoding();
        let granularity = spec.granularity;
        let timestamp_field = FieldName::parse(
            spec.timestamp_field
                .as_deref()
                .unwrap_or(&self.config.timestamp_field),
        )?;

        let dimensions = self.dimension_fields(spec, &timestamp_field)?;
        let measures = self.measure_fields(spec, &dimensions, &timestamp_field)?;

        // MATCH
        let range = spec
            .range
            .as_ref()
            .map(|r| r.resolve_at(self.presets, now))
            .transpose()?;
        let mut matcher = MatchStage::time_window(&timestamp_field, range, encoding);
        for (dimension, field) in spec.dimensions.iter().zip(dimension_names(spec)?) {
            if let Some(op) = dimension.op {
                let value = filter_value(dimension, op)?;
                matcher.push(&field, Condition::Compare(op, value));
            }
        }

        // PROJECT
        let mut project = ProjectStage::default();
        if granularity.is_binned() {
            project.include(&timestamp_field);
        }
        for field in &dimensions {
            project.include(field);
        }
        for (field, _, synthetic) in &measures {
            if !synthetic {
                project.include(field);
            }
        }

        // GROUP
        let mut group = GroupStage::default();
        for part in granularity.date_parts() {
            group.add_date_part(*part, &timestamp_field, encoding == DateEncoding::String);
        }
        for field in &dimensions {
            group.add_dimension(field);
        }
        for (field, op, synthetic) in &measures {
            let accumulator = if *synthetic {
                Accumulator {
                    output: field.clone(),
                    op: AggregateOperator::Sum,
                    input: AccumulatorInput::Constant(1),
                }
            } else {
                Accumulator {
                    output: field.clone(),
                    op: *op,
                    input: AccumulatorInput::Field(field.reference()),
                }
            };
            group.add_accumulator(accumulator);
        }

        // SORT: binned series are always chronological
        let mut sort = SortStage::default();
        if granularity.is_binned() {
            sort.push(SortKey::GroupKey, SortDirection::Ascending);
        } else {
            for (measure, (field, _, _)) in spec.measures.iter().zip(&measures) {
                if let Some(direction) = measure.sort {
                    sort.push(SortKey::Field(field.clone()), direction);
                }
            }
        }

        let mut stages = vec![
            Stage::Match(matcher),
            Stage::Project(project),
            Stage::Group(group),
        ];
        if !sort.is_empty() {
            stages.push(Stage::Sort(sort));
        }
        if let Some(limit) = spec.limit.filter(|n| *n > 0) {
            stages.push(Stage::Limit(limit));
        }

        Ok(CompiledQuery {
            pipeline: Pipeline::new(stages),
            granularity,
            dimensions,
            timestamp_field,
            encoding,
        })
    }

    fn dimension_fields(
        &self,
        spec: &QuerySpec,
        timestamp_field: &FieldName,
    ) -> Result<Vec<FieldName>> {
        let mut fields: Vec<FieldName> = Vec::new();
        for field in dimension_names(spec)? {
            if spec.granularity.is_binned() {
                if &field == timestamp_field {
                    return Err(Error::field(
                        field.as_str(),
                        "the timestamp field cannot be a dimension of a binned query",
                    ));
                }
                if spec
                    .granularity
                    .date_parts()
                    .iter()
                    .any(|p| p.key() == field.as_str())
                {
                    return Err(Error::field(
                        field.as_str(),
                        "collides with a calendar component of the grouping key",
                    ));
                }
            }
            if !fields.contains(&field) {
                fields.push(field);
            }
        }
        Ok(fields)
    }

    /// Validated measures as (field, operator, is-count)
    fn measure_fields(
        &self,
        spec: &QuerySpec,
        dimensions: &[FieldName],
        timestamp_field: &FieldName,
    ) -> Result<Vec<(FieldName, AggregateOperator, bool)>> {
        let mut out: Vec<(FieldName, AggregateOperator, bool)> = Vec::new();
        for measure in &spec.measures {
            let field = FieldName::parse(&measure.field)?;
            if spec.granularity.is_binned() && &field == timestamp_field {
                return Err(Error::field(
                    field.as_str(),
                    "the timestamp field cannot be a measure of a binned query",
                ));
            }
            if dimensions.contains(&field) {
                return Err(Error::field(
                    field.as_str(),
                    "used as both a dimension and a measure",
                ));
            }
            if out.iter().any(|(f, _, _)| f == &field) {
                return Err(Error::field(field.as_str(), "measure declared more than once"));
            }
            let synthetic = field.as_str() == self.config.count_measure;
            out.push((field, measure.operator(), synthetic));
        }
        Ok(out)
    }
}

fn dimension_names(spec: &QuerySpec) -> Result<Vec<FieldName>> {
    spec.dimensions
        .iter()
        .map(|d| FieldName::parse(&d.field))
        .collect()
}

/// Check the filter operand against its operator
fn filter_value(dimension: &Dimension, op: FilterOperator) -> Result<Value> {
    let invalid = |reason: &str| Error::InvalidFilter {
        field: dimension.field.clone(),
        reason: reason.to_string(),
    };
    let value = dimension.value.clone();
    match op {
        FilterOperator::Eq | FilterOperator::Ne => Ok(value.unwrap_or(Value::Null)),
        FilterOperator::Gt | FilterOperator::Gte | FilterOperator::Lt | FilterOperator::Lte => {
            value.ok_or_else(|| invalid("comparison requires a value"))
        }
        FilterOperator::In | FilterOperator::Nin => match value {
            Some(Value::Array(items)) => Ok(Value::Array(items)),
            _ => Err(invalid("membership requires an array of values")),
        },
        FilterOperator::Regex => match value {
            Some(Value::String(pattern)) => {
                regex::Regex::new(&pattern)
                    .map_err(|e| invalid(&format!("invalid pattern: {e}")))?;
                Ok(Value::String(pattern))
            }
            _ => Err(invalid("regex requires a string pattern")),
        },
        FilterOperator::Exists => match value {
            None => Ok(Value::Bool(true)),
            Some(Value::Bool(b)) => Ok(Value::Bool(b)),
            Some(_) => Err(invalid("exists requires a boolean")),
        },
    }
}
