//! Time-bucket granularity and the calendar parts it bins on

use chrono::{DateTime, Datelike, TimeZone, Timelike, Utc};
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Width of a time bucket
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Granularity {
    /// No time binning
    #[default]
    All,
    /// Calendar day
    Day,
    /// Hour of day
    Hour,
    /// Minute of hour
    Minute,
    /// Second of minute
    Second,
}

impl Granularity {
    /// Returns the string representation
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::All => "all",
            Self::Day => "day",
            Self::Hour => "hour",
            Self::Minute => "minute",
            Self::Second => "second",
        }
    }

    /// Whether results are binned into time buckets
    #[must_use]
    pub fn is_binned(&self) -> bool {
        !matches!(self, Self::All)
    }

    /// Calendar parts that make up the bucket, coarsest first
    #[must_use]
    pub fn date_parts(&self) -> &'static [DatePart] {
        use DatePart::*;
        match self {
            Self::All => &[],
            Self::Day => &[Year, Month, Day],
            Self::Hour => &[Year, Month, Day, Hour],
            Self::Minute => &[Year, Month, Day, Hour, Minute],
            Self::Second => &[Year, Month, Day, Hour, Minute, Second],
        }
    }

    /// Truncate an instant to the start of its bucket
    ///
    /// `All` leaves the instant untouched.
    #[must_use]
    pub fn truncate(&self, at: DateTime<Utc>) -> DateTime<Utc> {
        let parts = self.date_parts();
        if parts.is_empty() {
            return at;
        }
        let values: Vec<i64> = parts.iter().map(|p| p.extract(at)).collect();
        bucket_start(&values).unwrap_or(at)
    }
}

impl std::fmt::Display for Granularity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for Granularity {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "all" => Ok(Self::All),
            "day" => Ok(Self::Day),
            "hour" => Ok(Self::Hour),
            "minute" => Ok(Self::Minute),
            "second" => Ok(Self::Second),
            _ => Err(format!("unknown granularity: {s}")),
        }
    }
}

/// One calendar component of a bucket key
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DatePart {
    /// Four-digit year
    Year,
    /// Month of year, 1-based
    Month,
    /// Day of month, 1-based
    Day,
    /// Hour of day (0-23)
    Hour,
    /// Minute of hour (0-59)
    Minute,
    /// Second of minute (0-59)
    Second,
}

impl DatePart {
    /// Every part, coarsest first
    pub const ALL: [DatePart; 6] = [
        Self::Year,
        Self::Month,
        Self::Day,
        Self::Hour,
        Self::Minute,
        Self::Second,
    ];

    /// Name of the part inside the grouping key
    #[must_use]
    pub fn key(&self) -> &'static str {
        match self {
            Self::Year => "year",
            Self::Month => "month",
            Self::Day => "day",
            Self::Hour => "hour",
            Self::Minute => "minute",
            Self::Second => "second",
        }
    }

    /// Store date operator extracting the part
    #[must_use]
    pub fn store_operator(&self) -> &'static str {
        match self {
            Self::Year => "$year",
            Self::Month => "$month",
            Self::Day => "$dayOfMonth",
            Self::Hour => "$hour",
            Self::Minute => "$minute",
            Self::Second => "$second",
        }
    }

    /// Extract the part from a UTC instant
    #[must_use]
    pub fn extract(&self, at: DateTime<Utc>) -> i64 {
        match self {
            Self::Year => i64::from(at.year()),
            Self::Month => i64::from(at.month()),
            Self::Day => i64::from(at.day()),
            Self::Hour => i64::from(at.hour()),
            Self::Minute => i64::from(at.minute()),
            Self::Second => i64::from(at.second()),
        }
    }
}

/// Rebuild the instant a bucket starts at from its calendar parts
///
/// `parts` holds year, month, day and optionally hour, minute, second, in that
/// order. The month is 1-based, which is also what chrono expects, so it is
/// used unchanged.
pub(crate) fn bucket_start(parts: &[i64]) -> Option<DateTime<Utc>> {
    let component = |i: usize| -> Option<u32> {
        match parts.get(i) {
            Some(v) => u32::try_from(*v).ok(),
            None => Some(0),
        }
    };
    let year = i32::try_from(*parts.first()?).ok()?;
    if parts.len() < 3 {
        return None;
    }
    Utc.with_ymd_and_hms(
        year,
        component(1)?,
        component(2)?,
        component(3)?,
        component(4)?,
        component(5)?,
    )
    .single()
}
