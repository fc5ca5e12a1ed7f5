//! In-process execution of pipeline stages

use super::eval::{compare_values, matches, read_instant};
use crate::document::Document;
use crate::error::Result;
use crate::field::GROUP_KEY;
use crate::operator::{AggregateOperator, SortDirection};
use crate::pipeline::{
    Accumulator, AccumulatorInput, GroupStage, KeyExpr, MatchStage, Pipeline, ProjectStage,
    SortKey, SortStage, Stage,
};
use serde_json::{Map, Number, Value};
use std::cmp::Ordering;
use std::collections::HashMap;

/// Run every stage of `pipeline` over `docs`
pub(crate) fn run_pipeline(pipeline: &Pipeline, docs: Vec<Document>) -> Result<Vec<Document>> {
    pipeline
        .stages()
        .iter()
        .try_fold(docs, |docs, stage| run_stage(stage, docs))
}

fn run_stage(stage: &Stage, docs: Vec<Document>) -> Result<Vec<Document>> {
    match stage {
        Stage::Match(filter) => filter_docs(filter, docs),
        Stage::Project(project) => Ok(docs.into_iter().map(|d| project_doc(project, d)).collect()),
        Stage::Group(group) => group_docs(group, docs),
        Stage::Sort(sort) => Ok(sort_docs(sort, docs)),
        Stage::Limit(n) => Ok(limit_docs(docs, Some(*n))),
    }
}

pub(crate) fn filter_docs(filter: &MatchStage, docs: Vec<Document>) -> Result<Vec<Document>> {
    let mut out = Vec::with_capacity(docs.len());
    for doc in docs {
        if matches(filter, &doc)? {
            out.push(doc);
        }
    }
    Ok(out)
}

pub(crate) fn limit_docs(mut docs: Vec<Document>, limit: Option<u64>) -> Vec<Document> {
    if let Some(n) = limit.and_then(|n| usize::try_from(n).ok()) {
        docs.truncate(n);
    }
    docs
}

fn project_doc(project: &ProjectStage, mut doc: Document) -> Document {
    let mut out = Document::new();
    for field in project.fields() {
        if let Some(value) = doc.remove(field.as_str()) {
            out.insert(field.to_string(), value);
        }
    }
    out
}

/// Stable multi-key sort; missing fields sort as null
pub(crate) fn sort_by_keys<'k, I>(docs: &mut [Document], keys: I)
where
    I: IntoIterator<Item = (&'k str, SortDirection)>,
{
    let keys: Vec<(&str, SortDirection)> = keys.into_iter().collect();
    docs.sort_by(|a, b| {
        keys.iter()
            .map(|(key, direction)| {
                let l = a.get(*key).unwrap_or(&Value::Null);
                let r = b.get(*key).unwrap_or(&Value::Null);
                match direction {
                    SortDirection::Ascending => compare_values(l, r),
                    SortDirection::Descending => compare_values(r, l),
                }
            })
            .find(|o| o.is_ne())
            .unwrap_or(Ordering::Equal)
    });
}

fn sort_docs(sort: &SortStage, mut docs: Vec<Document>) -> Vec<Document> {
    sort_by_keys(
        &mut docs,
        sort.keys().iter().map(|(key, direction)| {
            let name = match key {
                SortKey::GroupKey => GROUP_KEY,
                SortKey::Field(field) => field.as_str(),
            };
            (name, *direction)
        }),
    );
    docs
}

/// Replace `current` when `value` is non-null and ranks better
fn keep_extreme(current: &mut Option<Value>, value: Option<&Value>, better: fn(Ordering) -> bool) {
    let Some(candidate) = value.filter(|v| !v.is_null()) else {
        return;
    };
    let replace = match current {
        None => true,
        Some(existing) => better(compare_values(candidate, existing)),
    };
    if replace {
        *current = Some(candidate.clone());
    }
}

/// Running state of one accumulator
enum AccState {
    Sum { int: i64, float: f64, is_float: bool },
    Avg { total: f64, count: u64 },
    Min(Option<Value>),
    Max(Option<Value>),
    First(Option<Value>),
    Last(Value),
}

impl AccState {
    fn new(op: AggregateOperator) -> Self {
        match op {
            AggregateOperator::Sum => Self::Sum {
                int: 0,
                float: 0.0,
                is_float: false,
            },
            AggregateOperator::Avg => Self::Avg {
                total: 0.0,
                count: 0,
            },
            AggregateOperator::Min => Self::Min(None),
            AggregateOperator::Max => Self::Max(None),
            AggregateOperator::First => Self::First(None),
            AggregateOperator::Last => Self::Last(Value::Null),
        }
    }

    fn feed(&mut self, value: Option<&Value>) {
        match self {
            Self::Sum {
                int,
                float,
                is_float,
            } => {
                if let Some(Value::Number(n)) = value {
                    match n.as_i64() {
                        Some(i) if !*is_float => match int.checked_add(i) {
                            Some(sum) => *int = sum,
                            None => {
                                *is_float = true;
                                *float = *int as f64 + i as f64;
                            }
                        },
                        _ => {
                            if !*is_float {
                                *is_float = true;
                                *float = *int as f64;
                            }
                            *float += n.as_f64().unwrap_or(0.0);
                        }
                    }
                }
            }
            Self::Avg { total, count } => {
                if let Some(f) = value.and_then(Value::as_f64) {
                    *total += f;
                    *count += 1;
                }
            }
            Self::Min(current) => keep_extreme(current, value, Ordering::is_lt),
            Self::Max(current) => keep_extreme(current, value, Ordering::is_gt),
            Self::First(current) => {
                if current.is_none() {
                    *current = Some(value.cloned().unwrap_or(Value::Null));
                }
            }
            Self::Last(current) => {
                *current = value.cloned().unwrap_or(Value::Null);
            }
        }
    }

    fn finish(self) -> Value {
        match self {
            Self::Sum {
                int,
                float,
                is_float,
            } => {
                if is_float {
                    Number::from_f64(float).map_or(Value::Null, Value::Number)
                } else {
                    Value::from(int)
                }
            }
            Self::Avg { total, count } => {
                if count == 0 {
                    Value::Null
                } else {
                    Number::from_f64(total / count as f64).map_or(Value::Null, Value::Number)
                }
            }
            Self::Min(v) | Self::Max(v) | Self::First(v) => v.unwrap_or(Value::Null),
            Self::Last(v) => v,
        }
    }
}

fn group_key(group: &GroupStage, doc: &Document) -> Result<Map<String, Value>> {
    let mut key = Map::new();
    for (name, expr) in group.key() {
        match expr {
            KeyExpr::DatePart {
                part,
                source,
                from_string,
            } => {
                let at = read_instant(doc.get(source.field().as_str()), *from_string)?;
                key.insert(name.clone(), Value::from(part.extract(at)));
            }
            KeyExpr::Field(source) => {
                if let Some(value) = doc.get(source.field().as_str()) {
                    key.insert(name.clone(), value.clone());
                }
            }
        }
    }
    Ok(key)
}

fn accumulator_input<'a>(acc: &Accumulator, doc: &'a Document, one: &'a Value) -> Option<&'a Value> {
    match &acc.input {
        AccumulatorInput::Constant(_) => Some(one),
        AccumulatorInput::Field(source) => doc.get(source.field().as_str()),
    }
}

fn group_docs(group: &GroupStage, docs: Vec<Document>) -> Result<Vec<Document>> {
    let mut index: HashMap<String, usize> = HashMap::new();
    let mut buckets: Vec<(Map<String, Value>, Vec<AccState>)> = Vec::new();

    for doc in &docs {
        let key = group_key(group, doc)?;
        let fingerprint = Value::Object(key.clone()).to_string();
        let slot = *index.entry(fingerprint).or_insert_with(|| {
            let states = group
                .accumulators()
                .iter()
                .map(|acc| AccState::new(acc.op))
                .collect();
            buckets.push((key, states));
            buckets.len() - 1
        });

        let (_, states) = &mut buckets[slot];
        for (acc, state) in group.accumulators().iter().zip(states.iter_mut()) {
            let constant = match acc.input {
                AccumulatorInput::Constant(n) => Value::from(n),
                AccumulatorInput::Field(_) => Value::Null,
            };
            state.feed(accumulator_input(acc, doc, &constant));
        }
    }

    Ok(buckets
        .into_iter()
        .map(|(key, states)| {
            let mut out = Document::new();
            out.insert(GROUP_KEY.to_string(), Value::Object(key));
            for (acc, state) in group.accumulators().iter().zip(states) {
                out.insert(acc.output.to_string(), state.finish());
            }
            out
        })
        .collect())
}
