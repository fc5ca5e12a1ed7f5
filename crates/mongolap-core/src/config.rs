//! Compiler configuration
//!
//! Bound once when a [`QueryCompiler`](crate::QueryCompiler) is built and
//! never mutated afterwards.

use crate::document::DateEncoding;
use crate::error::{Error, Result};
use crate::field::FieldName;
use serde::{Deserialize, Serialize};

/// Configuration for the query compiler
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompilerConfig {
    /// Namespaces that may be queried or written; empty allows every namespace
    #[serde(default, alias = "allowed_namespaces")]
    pub allowed_namespaces: Vec<String>,
    /// Default event-time field
    #[serde(
        default = "default_timestamp_field",
        alias = "timestamp_field",
        alias = "defaultTimestampField",
        alias = "default_timestamp_field"
    )]
    pub timestamp_field: String,
    /// Measure name that counts documents instead of reading a field
    #[serde(default = "default_count_measure", alias = "count_measure")]
    pub count_measure: String,
    /// Store instants as RFC 3339 strings instead of native dates
    #[serde(default, alias = "dates_as_strings")]
    pub dates_as_strings: bool,
}

fn default_timestamp_field() -> String {
    "ts".to_string()
}

fn default_count_measure() -> String {
    "count".to_string()
}

impl Default for CompilerConfig {
    fn default() -> Self {
        Self {
            allowed_namespaces: Vec::new(),
            timestamp_field: default_timestamp_field(),
            count_measure: default_count_measure(),
            dates_as_strings: false,
        }
    }
}

impl CompilerConfig {
    /// Restrict the compiler to the given namespaces
    #[must_use]
    pub fn with_allowed_namespaces<I, S>(mut self, namespaces: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.allowed_namespaces = namespaces.into_iter().map(Into::into).collect();
        self
    }

    /// Set the default timestamp field
    #[must_use]
    pub fn with_timestamp_field(mut self, field: impl Into<String>) -> Self {
        self.timestamp_field = field.into();
        self
    }

    /// Set the synthetic count measure name
    #[must_use]
    pub fn with_count_measure(mut self, name: impl Into<String>) -> Self {
        self.count_measure = name.into();
        self
    }

    /// Keep instants as strings
    #[must_use]
    pub fn with_dates_as_strings(mut self, enabled: bool) -> Self {
        self.dates_as_strings = enabled;
        self
    }

    /// Check that the configured field names are usable
    pub fn validate(&self) -> Result<()> {
        FieldName::parse(&self.timestamp_field)?;
        FieldName::parse(&self.count_measure)?;
        Ok(())
    }

    /// Whether the namespace passes the allow-list
    ///
    /// An empty allow-list admits every namespace.
    #[must_use]
    pub fn is_namespace_allowed(&self, namespace: &str) -> bool {
        self.allowed_namespaces.is_empty() || self.allowed_namespaces.iter().any(|n| n == namespace)
    }

    /// Reject namespaces outside the allow-list
    pub fn check_namespace(&self, namespace: &str) -> Result<()> {
        if self.is_namespace_allowed(namespace) {
            Ok(())
        } else {
            Err(Error::NamespaceNotAllowed(namespace.to_string()))
        }
    }

    /// How instants are written into filters and documents
    #[must_use]
    pub fn date_encoding(&self) -> DateEncoding {
        DateEncoding::from_flag(self.dates_as_strings)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = CompilerConfig::default();
        assert!(config.allowed_namespaces.is_empty());
        assert_eq!(config.timestamp_field, "ts");
        assert_eq!(config.count_measure, "count");
        assert!(!config.dates_as_strings);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_empty_allow_list_admits_everything() {
        let config = CompilerConfig::default();
        assert!(config.is_namespace_allowed("anything"));
        assert!(config.check_namespace("events").is_ok());
    }

    #[test]
    fn test_allow_list_enforced() {
        let config = CompilerConfig::default().with_allowed_namespaces(["events", "metrics"]);
        assert!(config.check_namespace("metrics").is_ok());
        let err = config.check_namespace("users").unwrap_err();
        assert!(matches!(err, Error::NamespaceNotAllowed(ns) if ns == "users"));
    }

    #[test]
    fn test_deserialize_aliases() {
        let config: CompilerConfig = serde_json::from_str(
            r#"{"allowedNamespaces": ["a"], "defaultTimestampField": "time", "datesAsStrings": true}"#,
        )
        .unwrap();
        assert_eq!(config.allowed_namespaces, vec!["a".to_string()]);
        assert_eq!(config.timestamp_field, "time");
        assert_eq!(config.count_measure, "count");
        assert_eq!(config.date_encoding(), DateEncoding::String);

        let snake: CompilerConfig =
            serde_json::from_str(r#"{"count_measure": "hits", "dates_as_strings": false}"#).unwrap();
        assert_eq!(snake.count_measure, "hits");
    }

    #[test]
    fn test_invalid_field_config_rejected() {
        let config = CompilerConfig::default().with_timestamp_field("$ts");
        assert!(matches!(
            config.validate(),
            Err(Error::InvalidFieldName { .. })
        ));
    }
}
