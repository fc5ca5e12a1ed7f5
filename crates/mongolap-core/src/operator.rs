//! Closed operator sets for filters, accumulators and sorting
//!
//! Names parse with or without the store's `$` prefix (`"sum"` and `"$sum"`
//! are the same operator); anything outside the set is rejected.

use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;
use std::str::FromStr;

fn strip_prefix(s: &str) -> &str {
    s.trim().strip_prefix('$').unwrap_or(s.trim())
}

macro_rules! string_enum_serde {
    ($ty:ty) => {
        impl Serialize for $ty {
            fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
                serializer.serialize_str(self.as_str())
            }
        }

        impl<'de> Deserialize<'de> for $ty {
            fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
                let raw = String::deserialize(deserializer)?;
                raw.parse().map_err(serde::de::Error::custom)
            }
        }

        impl fmt::Display for $ty {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }
    };
}

/// Match-stage operators accepted on dimension filters
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FilterOperator {
    /// Equality
    Eq,
    /// Inequality
    Ne,
    /// Greater than
    Gt,
    /// Greater than or equal
    Gte,
    /// Less than
    Lt,
    /// Less than or equal
    Lte,
    /// Membership in an array of values
    In,
    /// Non-membership in an array of values
    Nin,
    /// Regular-expression match on strings
    Regex,
    /// Field presence
    Exists,
}

impl FilterOperator {
    /// Operator name without the `$` prefix
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Eq => "eq",
            Self::Ne => "ne",
            Self::Gt => "gt",
            Self::Gte => "gte",
            Self::Lt => "lt",
            Self::Lte => "lte",
            Self::In => "in",
            Self::Nin => "nin",
            Self::Regex => "regex",
            Self::Exists => "exists",
        }
    }

    /// Store operator key (`$eq`, `$in`, ...)
    #[must_use]
    pub fn store_key(&self) -> String {
        format!("${}", self.as_str())
    }
}

impl FromStr for FilterOperator {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match strip_prefix(s) {
            "eq" => Ok(Self::Eq),
            "ne" => Ok(Self::Ne),
            "gt" => Ok(Self::Gt),
            "gte" => Ok(Self::Gte),
            "lt" => Ok(Self::Lt),
            "lte" => Ok(Self::Lte),
            "in" => Ok(Self::In),
            "nin" => Ok(Self::Nin),
            "regex" => Ok(Self::Regex),
            "exists" => Ok(Self::Exists),
            _ => Err(format!("unsupported filter operator: {s}")),
        }
    }
}

string_enum_serde!(FilterOperator);

/// Group-stage accumulators accepted on measures
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum AggregateOperator {
    /// Sum of values
    #[default]
    Sum,
    /// Arithmetic mean
    Avg,
    /// Smallest value
    Min,
    /// Largest value
    Max,
    /// First value seen in the group
    First,
    /// Last value seen in the group
    Last,
}

impl AggregateOperator {
    /// Operator name without the `$` prefix
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Sum => "sum",
            Self::Avg => "avg",
            Self::Min => "min",
            Self::Max => "max",
            Self::First => "first",
            Self::Last => "last",
        }
    }

    /// Store operator key (`$sum`, `$avg`, ...)
    #[must_use]
    pub fn store_key(&self) -> String {
        format!("${}", self.as_str())
    }
}

impl FromStr for AggregateOperator {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match strip_prefix(s) {
            "sum" => Ok(Self::Sum),
            "avg" => Ok(Self::Avg),
            "min" => Ok(Self::Min),
            "max" => Ok(Self::Max),
            "first" => Ok(Self::First),
            "last" => Ok(Self::Last),
            _ => Err(format!("unsupported aggregate operator: {s}")),
        }
    }
}

string_enum_serde!(AggregateOperator);

/// Sort direction for measures and scans
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum SortDirection {
    /// Smallest first
    #[default]
    Ascending,
    /// Largest first
    Descending,
}

impl SortDirection {
    /// Long-form name
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Ascending => "ascending",
            Self::Descending => "descending",
        }
    }

    /// Store sort specifier (`1` / `-1`)
    #[must_use]
    pub fn as_i32(&self) -> i32 {
        match self {
            Self::Ascending => 1,
            Self::Descending => -1,
        }
    }
}

impl FromStr for SortDirection {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "ascending" | "asc" | "1" => Ok(Self::Ascending),
            "descending" | "desc" | "-1" => Ok(Self::Descending),
            _ => Err(format!("unsupported sort direction: {s}")),
        }
    }
}

string_enum_serde!(SortDirection);

/// Deserialize an optional sort where `"none"` and `""` mean unsorted
pub(crate) fn optional_sort<'de, D>(deserializer: D) -> Result<Option<SortDirection>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw: Option<String> = Option::deserialize(deserializer)?;
    match raw.as_deref().map(str::trim) {
        None | Some("") | Some("none") => Ok(None),
        Some(s) => s.parse().map(Some).map_err(serde::de::Error::custom),
    }
}
