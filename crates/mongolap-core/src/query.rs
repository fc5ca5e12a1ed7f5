//! Query and scan requests
//!
//! [`QuerySpec`] is the typed request the compiler works on. [`QueryBody`] is
//! the transport-agnostic JSON shape clients send; it converts into a spec
//! once the namespace is known.

use crate::document::coerce_instant;
use crate::error::{Error, Result};
use crate::granularity::Granularity;
use crate::operator::{optional_sort, AggregateOperator, FilterOperator, SortDirection};
use crate::presets::{RangePresets, ResolvedRange};
use chrono::{DateTime, TimeZone, Utc};
use serde::Deserialize;
use serde_json::Value;

/// Default page size for scans
pub const DEFAULT_SCAN_LIMIT: u64 = 100;

/// Time window of a query
#[derive(Debug, Clone, PartialEq)]
pub enum TimeRange {
    /// Named relative range, resolved at call time
    Preset(String),
    /// Explicit bounds
    Between {
        /// Lower bound
        start: DateTime<Utc>,
        /// Upper bound
        end: DateTime<Utc>,
    },
}

impl TimeRange {
    /// Named preset range
    #[must_use]
    pub fn preset(name: impl Into<String>) -> Self {
        Self::Preset(name.into())
    }

    /// Explicit range
    #[must_use]
    pub fn between(start: DateTime<Utc>, end: DateTime<Utc>) -> Self {
        Self::Between { start, end }
    }

    /// Explicit range from date-like values (strings, epoch millis, extended JSON)
    pub fn between_values(start: &Value, end: &Value) -> Result<Self> {
        Ok(Self::Between {
            start: coerce_instant(start)?,
            end: coerce_instant(end)?,
        })
    }

    /// Absolute bounds relative to `now`
    pub fn resolve_at(&self, presets: &RangePresets, now: DateTime<Utc>) -> Result<ResolvedRange> {
        match self {
            Self::Preset(name) => presets.resolve_at(name, now),
            Self::Between { start, end } => Ok(ResolvedRange {
                start: *start,
                end: *end,
            }),
        }
    }
}

/// Grouping field with an optional filter
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Dimension {
    /// Field to group on
    pub field: String,
    /// Filter operator; without one the dimension only groups
    #[serde(default, alias = "operator")]
    pub op: Option<FilterOperator>,
    /// Filter operand
    #[serde(default)]
    pub value: Option<Value>,
}

impl Dimension {
    /// Group-only dimension
    #[must_use]
    pub fn new(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            op: None,
            value: None,
        }
    }

    /// Add a filter to the dimension
    #[must_use]
    pub fn filtered(mut self, op: FilterOperator, value: Value) -> Self {
        self.op = Some(op);
        self.value = Some(value);
        self
    }
}

/// Aggregated field
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Measure {
    /// Field to aggregate, or the configured count measure
    pub field: String,
    /// Accumulator; sum when absent
    #[serde(default, alias = "operator")]
    pub op: Option<AggregateOperator>,
    /// Requested ordering; honoured only for `all` granularity
    #[serde(default, deserialize_with = "optional_sort")]
    pub sort: Option<SortDirection>,
}

impl Measure {
    /// Summed measure
    #[must_use]
    pub fn new(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            op: None,
            sort: None,
        }
    }

    /// Use a specific accumulator
    #[must_use]
    pub fn with_op(mut self, op: AggregateOperator) -> Self {
        self.op = Some(op);
        self
    }

    /// Request an ordering on this measure
    #[must_use]
    pub fn sorted(mut self, direction: SortDirection) -> Self {
        self.sort = Some(direction);
        self
    }

    /// Effective accumulator
    #[must_use]
    pub fn operator(&self) -> AggregateOperator {
        self.op.unwrap_or_default()
    }
}

/// Typed aggregation request
#[derive(Debug, Clone, PartialEq)]
pub struct QuerySpec {
    /// Target namespace
    pub namespace: String,
    /// Time window; absent means any document with a valid timestamp
    pub range: Option<TimeRange>,
    /// Grouping fields
    pub dimensions: Vec<Dimension>,
    /// Aggregated fields
    pub measures: Vec<Measure>,
    /// Bucket width
    pub granularity: Granularity,
    /// Maximum number of output rows
    pub limit: Option<u64>,
    /// Per-request override of the configured timestamp field
    pub timestamp_field: Option<String>,
    /// Log the pipeline and any store failure
    pub debug: bool,
}

impl QuerySpec {
    /// Empty request against a namespace
    #[must_use]
    pub fn new(namespace: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            range: None,
            dimensions: Vec::new(),
            measures: Vec::new(),
            granularity: Granularity::All,
            limit: None,
            timestamp_field: None,
            debug: false,
        }
    }

    /// Set the time window
    #[must_use]
    pub fn with_range(mut self, range: TimeRange) -> Self {
        self.range = Some(range);
        self
    }

    /// Add a dimension
    #[must_use]
    pub fn dimension(mut self, dimension: Dimension) -> Self {
        self.dimensions.push(dimension);
        self
    }

    /// Add a measure
    #[must_use]
    pub fn measure(mut self, measure: Measure) -> Self {
        self.measures.push(measure);
        self
    }

    /// Set the bucket width
    #[must_use]
    pub fn with_granularity(mut self, granularity: Granularity) -> Self {
        self.granularity = granularity;
        self
    }

    /// Cap the number of rows
    #[must_use]
    pub fn with_limit(mut self, limit: u64) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Override the timestamp field
    #[must_use]
    pub fn with_timestamp_field(mut self, field: impl Into<String>) -> Self {
        self.timestamp_field = Some(field.into());
        self
    }

    /// Toggle diagnostic logging
    #[must_use]
    pub fn with_debug(mut self, debug: bool) -> Self {
        self.debug = debug;
        self
    }
}

/// Dimension as sent on the wire: a bare field name or a full object
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum DimensionInput {
    /// Bare field name
    Field(String),
    /// Field with an optional filter
    Spec(Dimension),
}

impl From<DimensionInput> for Dimension {
    fn from(input: DimensionInput) -> Self {
        match input {
            DimensionInput::Field(field) => Dimension::new(field),
            DimensionInput::Spec(dimension) => dimension,
        }
    }
}

/// Row limit as sent on the wire: a number or a numeric string
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum LimitInput {
    /// Numeric limit
    Number(i64),
    /// Textual limit, parsed as a base-10 integer
    Text(String),
}

impl LimitInput {
    /// Positive limit, or `None` when the value disables limiting
    pub fn resolve(&self) -> Result<Option<u64>> {
        let n = match self {
            Self::Number(n) => *n,
            Self::Text(text) => text
                .trim()
                .parse::<i64>()
                .map_err(|_| Error::InvalidRequest(format!("limit is not an integer: {text}")))?,
        };
        Ok(u64::try_from(n).ok().filter(|n| *n > 0))
    }
}

/// JSON body of a query request
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryBody {
    /// Explicit lower bound
    #[serde(default)]
    pub start_time: Option<Value>,
    /// Explicit upper bound
    #[serde(default)]
    pub end_time: Option<Value>,
    /// Preset name
    #[serde(default)]
    pub range: Option<String>,
    /// Grouping fields
    #[serde(default)]
    pub dimensions: Option<Vec<DimensionInput>>,
    /// Aggregated fields
    #[serde(default)]
    pub measures: Option<Vec<Measure>>,
    /// Timestamp field override
    #[serde(default)]
    pub timestamp_field: Option<String>,
    /// Bucket width, `all` when absent
    #[serde(default)]
    pub granularity: Option<Granularity>,
    /// Row limit
    #[serde(default)]
    pub limit: Option<LimitInput>,
    /// Diagnostic logging
    #[serde(default)]
    pub debug: Option<bool>,
}

impl QueryBody {
    /// Parse a JSON body
    pub fn from_json(value: Value) -> Result<Self> {
        serde_json::from_value(value).map_err(|e| Error::InvalidRequest(e.to_string()))
    }

    /// Convert into a typed spec for `namespace`
    ///
    /// Explicit bounds win over a preset. A missing `endTime` means now and a
    /// missing `startTime` means the epoch.
    pub fn into_spec(self, namespace: impl Into<String>) -> Result<QuerySpec> {
        self.into_spec_at(namespace, Utc::now())
    }

    pub(crate) fn into_spec_at(
        self,
        namespace: impl Into<String>,
        now: DateTime<Utc>,
    ) -> Result<QuerySpec> {
        let range = if self.start_time.is_some() || self.end_time.is_some() {
            let start = match &self.start_time {
                Some(v) if !v.is_null() => coerce_instant(v)?,
                _ => Utc.timestamp_opt(0, 0).single().unwrap_or(now),
            };
            let end = match &self.end_time {
                Some(v) if !v.is_null() => coerce_instant(v)?,
                _ => now,
            };
            Some(TimeRange::between(start, end))
        } else {
            self.range.map(TimeRange::Preset)
        };

        let limit = match &self.limit {
            Some(limit) => limit.resolve()?,
            None => None,
        };

        Ok(QuerySpec {
            namespace: namespace.into(),
            range,
            dimensions: self
                .dimensions
                .unwrap_or_default()
                .into_iter()
                .map(Dimension::from)
                .collect(),
            measures: self.measures.unwrap_or_default(),
            granularity: self.granularity.unwrap_or_default(),
            limit,
            timestamp_field: self.timestamp_field,
            debug: self.debug.unwrap_or(false),
        })
    }
}

/// Raw, non-aggregated read of a namespace
#[derive(Debug, Clone, PartialEq)]
pub struct ScanRequest {
    /// Target namespace
    pub namespace: String,
    /// Time window; absent reads every document
    pub range: Option<TimeRange>,
    /// Maximum number of documents; `None` is unbounded
    pub limit: Option<u64>,
    /// Order on the timestamp field
    pub order: SortDirection,
    /// Per-request override of the configured timestamp field
    pub timestamp_field: Option<String>,
    /// Log the filter and any store failure
    pub debug: bool,
}

impl ScanRequest {
    /// Ascending scan of up to [`DEFAULT_SCAN_LIMIT`] documents
    #[must_use]
    pub fn new(namespace: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            range: None,
            limit: Some(DEFAULT_SCAN_LIMIT),
            order: SortDirection::Ascending,
            timestamp_field: None,
            debug: false,
        }
    }

    /// Set the time window
    #[must_use]
    pub fn with_range(mut self, range: TimeRange) -> Self {
        self.range = Some(range);
        self
    }

    /// Set the limit; `None` removes it
    #[must_use]
    pub fn with_limit(mut self, limit: Option<u64>) -> Self {
        self.limit = limit;
        self
    }

    /// Set the order
    #[must_use]
    pub fn with_order(mut self, order: SortDirection) -> Self {
        self.order = order;
        self
    }

    /// Override the timestamp field
    #[must_use]
    pub fn with_timestamp_field(mut self, field: impl Into<String>) -> Self {
        self.timestamp_field = Some(field.into());
        self
    }

    /// Toggle diagnostic logging
    #[must_use]
    pub fn with_debug(mut self, debug: bool) -> Self {
        self.debug = debug;
        self
    }
}
