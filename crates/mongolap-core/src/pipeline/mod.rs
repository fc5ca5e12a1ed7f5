//! Pipeline - typed aggregation stages
//!
//! Stages are declarative values, not bound to any driver type. Field names
//! only enter through [`FieldName`]/[`FieldRef`] and operators only through
//! the closed operator enums, so rendering never interpolates raw input.
//! [`Pipeline::to_json`] produces the MongoDB extended-JSON form.

mod builder;


pub use builder::{CompiledQuery, PipelineBuilder};

use crate::document::{Document, DateEncoding};
use crate::field::{FieldName, FieldRef, GROUP_KEY};
use crate::granularity::DatePart;
use crate::operator::{AggregateOperator, FilterOperator, SortDirection};
use crate::presets::ResolvedRange;
use serde_json::{json, Map, Value};

/// BSON type names usable in `$type` constraints
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueType {
    /// Native date
    Date,
    /// String
    String,
}

impl ValueType {
    /// Store type alias
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Date => "date",
            Self::String => "string",
        }
    }

    /// Type the timestamp field is stored as under `encoding`
    #[must_use]
    pub fn for_encoding(encoding: DateEncoding) -> Self {
        match encoding {
            DateEncoding::Extended => Self::Date,
            DateEncoding::String => Self::String,
        }
    }
}

/// One condition on a field
#[derive(Debug, Clone, PartialEq)]
pub enum Condition {
    /// `{$op: value}`
    Compare(FilterOperator, Value),
    /// `{$type: name}`
    TypeIs(ValueType),
}

impl Condition {
    fn render_into(&self, out: &mut Map<String, Value>) {
        match self {
            Self::Compare(op, value) => {
                out.insert(op.store_key(), value.clone());
            }
            Self::TypeIs(ty) => {
                out.insert("$type".to_string(), Value::String(ty.as_str().to_string()));
            }
        }
    }
}

/// All conditions on one field (implicitly AND-ed)
#[derive(Debug, Clone, PartialEq)]
pub struct Predicate {
    /// Constrained field
    pub field: FieldName,
    /// Conditions on the field
    pub conditions: Vec<Condition>,
}

/// `$match` stage, also used as a `find` filter
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MatchStage {
    predicates: Vec<Predicate>,
}

impl MatchStage {
    /// Filter matching every document
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Filter on the timestamp field
    ///
    /// With bounds: `{gte: start, lte: end, type}`. Without: `{exists, type}`.
    #[must_use]
    pub fn time_window(
        timestamp_field: &FieldName,
        range: Option<ResolvedRange>,
        encoding: DateEncoding,
    ) -> Self {
        let mut stage = Self::new();
        match range {
            Some(range) => {
                stage.push(
                    timestamp_field,
                    Condition::Compare(FilterOperator::Gte, encoding.encode(range.start)),
                );
                stage.push(
                    timestamp_field,
                    Condition::Compare(FilterOperator::Lte, encoding.encode(range.end)),
                );
            }
            None => {
                stage.push(
                    timestamp_field,
                    Condition::Compare(FilterOperator::Exists, Value::Bool(true)),
                );
            }
        }
        stage.push(
            timestamp_field,
            Condition::TypeIs(ValueType::for_encoding(encoding)),
        );
        stage
    }

    /// Add a condition, merging with existing conditions on the same field
    pub fn push(&mut self, field: &FieldName, condition: Condition) {
        match self.predicates.iter_mut().find(|p| &p.field == field) {
            Some(predicate) => predicate.conditions.push(condition),
            None => self.predicates.push(Predicate {
                field: field.clone(),
                conditions: vec![condition],
            }),
        }
    }

    /// Predicates in insertion order
    #[must_use]
    pub fn predicates(&self) -> &[Predicate] {
        &self.predicates
    }

    /// Whether the filter matches everything
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.predicates.is_empty()
    }

    /// Conditions on `field`, if any
    #[must_use]
    pub fn conditions_on(&self, field: &str) -> Option<&[Condition]> {
        self.predicates
            .iter()
            .find(|p| p.field.as_str() == field)
            .map(|p| p.conditions.as_slice())
    }

    /// Extended-JSON filter document
    ///
    /// A field that repeats an operator cannot share one condition object,
    /// so each of its conditions becomes a clause of a top-level `$and`.
    #[must_use]
    pub fn to_json(&self) -> Value {
        let mut out = Map::new();
        let mut clauses = Vec::new();
        for predicate in &self.predicates {
            let mut conditions = Map::new();
            for condition in &predicate.conditions {
                condition.render_into(&mut conditions);
            }
            if conditions.len() == predicate.conditions.len() {
                out.insert(predicate.field.to_string(), Value::Object(conditions));
                continue;
            }
            for condition in &predicate.conditions {
                let mut single = Map::new();
                condition.render_into(&mut single);
                let mut clause = Map::new();
                clause.insert(predicate.field.to_string(), Value::Object(single));
                clauses.push(Value::Object(clause));
            }
        }
        if !clauses.is_empty() {
            out.insert("$and".to_string(), Value::Array(clauses));
        }
        Value::Object(out)
    }
}

/// `$project` stage; the grouping key is always excluded
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ProjectStage {
    fields: Vec<FieldName>,
}

impl ProjectStage {
    /// Include a field once
    pub fn include(&mut self, field: &FieldName) {
        if !self.fields.contains(field) {
            self.fields.push(field.clone());
        }
    }

    /// Included fields in insertion order
    #[must_use]
    pub fn fields(&self) -> &[FieldName] {
        &self.fields
    }

    /// Whether `field` is included
    #[must_use]
    pub fn includes(&self, field: &str) -> bool {
        self.fields.iter().any(|f| f.as_str() == field)
    }

    fn to_json(&self) -> Value {
        let mut out = Map::new();
        out.insert(GROUP_KEY.to_string(), Value::Bool(false));
        for field in &self.fields {
            out.insert(field.to_string(), Value::Bool(true));
        }
        Value::Object(out)
    }
}

/// Expression computing one component of the grouping key
#[derive(Debug, Clone, PartialEq)]
pub enum KeyExpr {
    /// Calendar part of a timestamp field
    DatePart {
        /// Extracted part
        part: DatePart,
        /// Timestamp field
        source: FieldRef,
        /// Source holds RFC 3339 strings that must be parsed first
        from_string: bool,
    },
    /// Raw field value
    Field(FieldRef),
}

impl KeyExpr {
    fn to_json(&self) -> Value {
        match self {
            Self::DatePart {
                part,
                source,
                from_string,
            } => {
                let input = if *from_string {
                    json!({ "$dateFromString": { "dateString": source.render() } })
                } else {
                    Value::String(source.render())
                };
                let mut out = Map::new();
                out.insert(part.store_operator().to_string(), input);
                Value::Object(out)
            }
            Self::Field(source) => Value::String(source.render()),
        }
    }
}

/// Accumulator input
#[derive(Debug, Clone, PartialEq)]
pub enum AccumulatorInput {
    /// Constant added per document (`{$sum: 1}` counts)
    Constant(i64),
    /// Field value
    Field(FieldRef),
}

/// One output field of the group stage
#[derive(Debug, Clone, PartialEq)]
pub struct Accumulator {
    /// Output field
    pub output: FieldName,
    /// Accumulator operator
    pub op: AggregateOperator,
    /// Accumulated expression
    pub input: AccumulatorInput,
}

/// `$group` stage
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GroupStage {
    key: Vec<(String, KeyExpr)>,
    accumulators: Vec<Accumulator>,
}

impl GroupStage {
    /// Grouping key components in insertion order
    #[must_use]
    pub fn key(&self) -> &[(String, KeyExpr)] {
        &self.key
    }

    /// Accumulated output fields
    #[must_use]
    pub fn accumulators(&self) -> &[Accumulator] {
        &self.accumulators
    }

    /// Key component named `name`
    #[must_use]
    pub fn key_component(&self, name: &str) -> Option<&KeyExpr> {
        self.key.iter().find(|(k, _)| k == name).map(|(_, e)| e)
    }

    pub(crate) fn add_date_part(&mut self, part: DatePart, source: &FieldName, from_string: bool) {
        self.key.push((
            part.key().to_string(),
            KeyExpr::DatePart {
                part,
                source: source.reference(),
                from_string,
            },
        ));
    }

    pub(crate) fn add_dimension(&mut self, field: &FieldName) {
        if self.key_component(field.as_str()).is_none() {
            self.key
                .push((field.to_string(), KeyExpr::Field(field.reference())));
        }
    }

    pub(crate) fn add_accumulator(&mut self, accumulator: Accumulator) {
        self.accumulators.push(accumulator);
    }

    fn to_json(&self) -> Value {
        let mut key = Map::new();
        for (name, expr) in &self.key {
            key.insert(name.clone(), expr.to_json());
        }
        let mut out = Map::new();
        out.insert(GROUP_KEY.to_string(), Value::Object(key));
        for acc in &self.accumulators {
            let input = match &acc.input {
                AccumulatorInput::Constant(n) => Value::from(*n),
                AccumulatorInput::Field(source) => Value::String(source.render()),
            };
            let mut expr = Map::new();
            expr.insert(acc.op.store_key(), input);
            out.insert(acc.output.to_string(), Value::Object(expr));
        }
        Value::Object(out)
    }
}

/// Sort key of a `$sort` stage
#[derive(Debug, Clone, PartialEq)]
pub enum SortKey {
    /// The whole grouping key (chronological for binned series)
    GroupKey,
    /// An output field
    Field(FieldName),
}

impl SortKey {
    /// Rendered key
    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            Self::GroupKey => GROUP_KEY,
            Self::Field(field) => field.as_str(),
        }
    }
}

/// `$sort` stage; keys apply in order
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SortStage {
    keys: Vec<(SortKey, SortDirection)>,
}

impl SortStage {
    /// Append a key
    pub fn push(&mut self, key: SortKey, direction: SortDirection) {
        self.keys.push((key, direction));
    }

    /// Keys in priority order
    #[must_use]
    pub fn keys(&self) -> &[(SortKey, SortDirection)] {
        &self.keys
    }

    /// Whether no key was added
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    fn to_json(&self) -> Value {
        let mut out = Map::new();
        for (key, direction) in &self.keys {
            out.insert(key.as_str().to_string(), Value::from(direction.as_i32()));
        }
        Value::Object(out)
    }
}

/// One pipeline stage
#[derive(Debug, Clone, PartialEq)]
pub enum Stage {
    /// `$match`
    Match(MatchStage),
    /// `$project`
    Project(ProjectStage),
    /// `$group`
    Group(GroupStage),
    /// `$sort`
    Sort(SortStage),
    /// `$limit`
    Limit(u64),
}

impl Stage {
    /// Store stage operator
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            Self::Match(_) => "$match",
            Self::Project(_) => "$project",
            Self::Group(_) => "$group",
            Self::Sort(_) => "$sort",
            Self::Limit(_) => "$limit",
        }
    }

    /// Extended-JSON stage document
    #[must_use]
    pub fn to_json(&self) -> Value {
        let body = match self {
            Self::Match(stage) => stage.to_json(),
            Self::Project(stage) => stage.to_json(),
            Self::Group(stage) => stage.to_json(),
            Self::Sort(stage) => stage.to_json(),
            Self::Limit(n) => Value::from(*n),
        };
        let mut out = Map::new();
        out.insert(self.name().to_string(), body);
        Value::Object(out)
    }
}

/// Ordered aggregation plan
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Pipeline {
    stages: Vec<Stage>,
}

impl Pipeline {
    /// Plan from stages
    #[must_use]
    pub fn new(stages: Vec<Stage>) -> Self {
        Self { stages }
    }

    /// Stages in execution order
    #[must_use]
    pub fn stages(&self) -> &[Stage] {
        &self.stages
    }

    /// Number of stages
    #[must_use]
    pub fn len(&self) -> usize {
        self.stages.len()
    }

    /// Whether the plan is empty
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.stages.is_empty()
    }

    /// First `$match` stage
    #[must_use]
    pub fn match_stage(&self) -> Option<&MatchStage> {
        self.stages.iter().find_map(|s| match s {
            Stage::Match(m) => Some(m),
            _ => None,
        })
    }

    /// First `$project` stage
    #[must_use]
    pub fn project_stage(&self) -> Option<&ProjectStage> {
        self.stages.iter().find_map(|s| match s {
            Stage::Project(p) => Some(p),
            _ => None,
        })
    }

    /// First `$group` stage
    #[must_use]
    pub fn group_stage(&self) -> Option<&GroupStage> {
        self.stages.iter().find_map(|s| match s {
            Stage::Group(g) => Some(g),
            _ => None,
        })
    }

    /// First `$sort` stage
    #[must_use]
    pub fn sort_stage(&self) -> Option<&SortStage> {
        self.stages.iter().find_map(|s| match s {
            Stage::Sort(s) => Some(s),
            _ => None,
        })
    }

    /// `$limit` value, if any
    #[must_use]
    pub fn limit(&self) -> Option<u64> {
        self.stages.iter().find_map(|s| match s {
            Stage::Limit(n) => Some(*n),
            _ => None,
        })
    }

    /// Extended-JSON stage array
    #[must_use]
    pub fn to_json(&self) -> Value {
        Value::Array(self.stages.iter().map(Stage::to_json).collect())
    }
}

/// Options of a `find` call
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FindOptions {
    /// Sort keys in priority order
    pub sort: Vec<(FieldName, SortDirection)>,
    /// Maximum number of documents; `None` is unbounded
    pub limit: Option<u64>,
}

impl FindOptions {
    /// Extended-JSON options document
    #[must_use]
    pub fn to_json(&self) -> Value {
        let mut sort = Document::new();
        for (field, direction) in &self.sort {
            sort.insert(field.to_string(), Value::from(direction.as_i32()));
        }
        json!({ "sort": sort, "limit": self.limit })
    }
}
