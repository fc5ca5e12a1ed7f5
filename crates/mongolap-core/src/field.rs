//! Validated field names
//!
//! Every field that reaches a pipeline stage goes through [`FieldName`], so a
//! user-supplied name can never smuggle a store operator (`$where`, `$expr`,
//! ...) or address the grouping key.

use crate::error::{Error, Result};
use std::fmt;

/// Field reserved for the grouping key in grouped output
pub const GROUP_KEY: &str = "_id";

/// A top-level document field name that is safe to reference in any stage
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FieldName(String);

impl FieldName {
    /// Validate a raw field name
    ///
    /// Rejects empty names, a leading `$`, path separators, NUL bytes and the
    /// reserved grouping key.
    pub fn parse(raw: &str) -> Result<Self> {
        if raw.trim().is_empty() {
            return Err(Error::field(raw, "field name is empty"));
        }
        if raw.starts_with('$') {
            return Err(Error::field(raw, "field name must not start with '$'"));
        }
        if raw.contains('.') {
            return Err(Error::field(raw, "nested field paths are not supported"));
        }
        if raw.contains('\0') {
            return Err(Error::field(raw, "field name contains a NUL byte"));
        }
        if raw == GROUP_KEY {
            return Err(Error::field(raw, "'_id' is reserved for the grouping key"));
        }
        Ok(Self(raw.to_string()))
    }

    /// The validated name
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Reference to this field's value inside an expression (`$name`)
    #[must_use]
    pub fn reference(&self) -> FieldRef {
        FieldRef(self.clone())
    }
}

impl fmt::Display for FieldName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for FieldName {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Expression operand pointing at a document field
///
/// Only constructible from a [`FieldName`], which is what makes the rendered
/// `$name` form safe.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FieldRef(FieldName);

impl FieldRef {
    /// Field being referenced
    #[must_use]
    pub fn field(&self) -> &FieldName {
        &self.0
    }

    /// Rendered expression form (`$name`)
    #[must_use]
    pub fn render(&self) -> String {
        format!("${}", self.0)
    }
}
