//! Error types for mongolap-core

use thiserror::Error;

/// Compiler error type
///
/// Every variant except [`Error::Store`] is raised before the store is
/// touched.
#[derive(Debug, Error)]
pub enum Error {
    /// Namespace is not in the configured allow-list
    #[error("namespace not allowed: {0}")]
    NamespaceNotAllowed(String),

    /// Named range preset does not exist
    #[error("unknown range preset: {0}")]
    UnknownRangePreset(String),

    /// Textual or numeric timestamp could not be read as an instant
    #[error("invalid timestamp '{value}': {reason}")]
    TimestampParse {
        /// Offending input, rendered as text
        value: String,
        /// Why it was rejected
        reason: String,
    },

    /// Field name cannot be used as a field reference
    #[error("invalid field name '{field}': {reason}")]
    InvalidFieldName {
        /// Offending field name
        field: String,
        /// Why it was rejected
        reason: String,
    },

    /// Filter value does not fit its operator
    #[error("invalid filter on '{field}': {reason}")]
    InvalidFilter {
        /// Filtered field
        field: String,
        /// Why it was rejected
        reason: String,
    },

    /// Malformed request body
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// Failure reported by the document store
    #[error("store error: {0}")]
    Store(String),
}

impl Error {
    pub(crate) fn field(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidFieldName {
            field: field.into(),
            reason: reason.into(),
        }
    }

    pub(crate) fn timestamp(value: impl ToString, reason: impl Into<String>) -> Self {
        Self::TimestampParse {
            value: value.to_string(),
            reason: reason.into(),
        }
    }

    /// Whether the error was raised before any store interaction
    #[must_use]
    pub fn is_rejection(&self) -> bool {
        !matches!(self, Self::Store(_))
    }
}

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;
