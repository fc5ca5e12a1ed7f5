//! Named relative time ranges ("1 Hour", "7 Days", ...)
//!
//! The table is an immutable constant; [`RangePresets`] only borrows it, so
//! any number of requests can resolve concurrently.

use crate::error::{Error, Result};
use chrono::{DateTime, Duration, TimeZone, Utc};

const MINUTE: i64 = 60;
const HOUR: i64 = 60 * MINUTE;
const DAY: i64 = 24 * HOUR;

/// How far back a preset reaches
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PresetSpan {
    /// Fixed number of seconds before now
    Seconds(i64),
    /// Everything since the Unix epoch
    AllTime,
}

/// One entry of the preset table
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RangePreset {
    /// Display name, also the lookup key
    pub name: &'static str,
    /// Reach of the preset
    pub span: PresetSpan,
}

impl RangePreset {
    const fn seconds(name: &'static str, seconds: i64) -> Self {
        Self {
            name,
            span: PresetSpan::Seconds(seconds),
        }
    }
}

/// Standard presets in ascending duration
pub static STANDARD_PRESETS: [RangePreset; 12] = [
    RangePreset::seconds("1 Minute", MINUTE),
    RangePreset::seconds("1 Hour", HOUR),
    RangePreset::seconds("12 Hours", 12 * HOUR),
    RangePreset::seconds("24 Hours", 24 * HOUR),
    RangePreset::seconds("3 Days", 3 * DAY),
    RangePreset::seconds("7 Days", 7 * DAY),
    RangePreset::seconds("14 Days", 14 * DAY),
    RangePreset::seconds("30 Days", 30 * DAY),
    RangePreset::seconds("90 Days", 90 * DAY),
    RangePreset::seconds("180 Days", 180 * DAY),
    RangePreset::seconds("1 Year", 365 * DAY),
    RangePreset {
        name: "All Time",
        span: PresetSpan::AllTime,
    },
];

/// Absolute bounds of a time range
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResolvedRange {
    /// Inclusive lower bound
    pub start: DateTime<Utc>,
    /// Upper bound
    pub end: DateTime<Utc>,
}

/// Resolves preset names against an immutable table
#[derive(Debug, Clone, Copy)]
pub struct RangePresets {
    table: &'static [RangePreset],
}

impl Default for RangePresets {
    fn default() -> Self {
        Self::standard()
    }
}

impl RangePresets {
    /// Resolver over [`STANDARD_PRESETS`]
    #[must_use]
    pub const fn standard() -> Self {
        Self {
            table: &STANDARD_PRESETS,
        }
    }

    /// Resolver over a caller-provided table
    #[must_use]
    pub const fn from_table(table: &'static [RangePreset]) -> Self {
        Self { table }
    }

    /// Preset names in table order
    #[must_use]
    pub fn names(&self) -> Vec<&'static str> {
        self.table.iter().map(|p| p.name).collect()
    }

    /// Look up a preset by name (ASCII case-insensitive)
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&RangePreset> {
        let name = name.trim();
        self.table.iter().find(|p| p.name.eq_ignore_ascii_case(name))
    }

    /// Resolve a preset relative to the current instant
    pub fn resolve(&self, name: &str) -> Result<ResolvedRange> {
        self.resolve_at(name, Utc::now())
    }

    /// Resolve a preset relative to `now`
    pub fn resolve_at(&self, name: &str, now: DateTime<Utc>) -> Result<ResolvedRange> {
        let preset = self
            .get(name)
            .ok_or_else(|| Error::UnknownRangePreset(name.to_string()))?;
        let start = match preset.span {
            PresetSpan::Seconds(seconds) => now - Duration::seconds(seconds),
            PresetSpan::AllTime => Utc.timestamp_opt(0, 0).single().unwrap_or(now),
        };
        Ok(ResolvedRange { start, end: now })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, 15, 12, 0, 0).unwrap()
    }

    #[test]
    fn test_names_in_ascending_order() {
        let names = RangePresets::standard().names();
        assert_eq!(names.len(), 12);
        assert_eq!(names.first(), Some(&"1 Minute"));
        assert_eq!(names[1], "1 Hour");
        assert_eq!(names.last(), Some(&"All Time"));

        let spans: Vec<i64> = STANDARD_PRESETS
            .iter()
            .filter_map(|p| match p.span {
                PresetSpan::Seconds(s) => Some(s),
                PresetSpan::AllTime => None,
            })
            .collect();
        assert!(spans.windows(2).all(|w| w[0] < w[1]));
    }

    #[test]
    fn test_resolve_offsets() {
        let presets = RangePresets::standard();
        let range = presets.resolve_at("1 Hour", now()).unwrap();
        assert_eq!(range.end, now());
        assert_eq!(range.start, Utc.with_ymd_and_hms(2024, 6, 15, 11, 0, 0).unwrap());

        let range = presets.resolve_at("7 Days", now()).unwrap();
        assert_eq!(range.start, Utc.with_ymd_and_hms(2024, 6, 8, 12, 0, 0).unwrap());

        let range = presets.resolve_at("1 Year", now()).unwrap();
        assert_eq!(range.start, Utc.with_ymd_and_hms(2023, 6, 16, 12, 0, 0).unwrap());
    }

    #[test]
    fn test_all_time_starts_at_epoch() {
        let range = RangePresets::standard().resolve_at("All Time", now()).unwrap();
        assert_eq!(range.start.timestamp(), 0);
        assert_eq!(range.end, now());
    }

    #[test]
    fn test_lookup_ignores_case() {
        let presets = RangePresets::standard();
        assert!(presets.get("24 hours").is_some());
        assert!(presets.get(" 3 Days ").is_some());
    }

    #[test]
    fn test_unknown_preset() {
        let err = RangePresets::standard().resolve("2 Fortnights").unwrap_err();
        assert!(matches!(err, Error::UnknownRangePreset(name) if name == "2 Fortnights"));
    }

    #[test]
    fn test_custom_table() {
        static SHORT: [RangePreset; 1] = [RangePreset {
            name: "Blink",
            span: PresetSpan::Seconds(1),
        }];
        let presets = RangePresets::from_table(&SHORT);
        assert_eq!(presets.names(), vec!["Blink"]);
        assert!(presets.resolve_at("1 Hour", now()).is_err());
        let range = presets.resolve_at("blink", now()).unwrap();
        assert_eq!((range.end - range.start).num_seconds(), 1);
    }
}
