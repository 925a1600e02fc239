//! Error types for the record model
//!
//! Reads never fail: an unresolved attribute is [`Resolved::Absent`](crate::Resolved).
//! Errors only arise from writes that the schema forbids.

use serde_json::Value;

/// Errors raised by record writes
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ModelError {
    /// Write through a read-only alias
    #[error("You tried to set '{alias}' to '{value}', but '{alias}' is an alias in '{model_name}' and aliases are read-only")]
    AliasReadOnly {
        /// Alias written to
        alias: String,
        /// Canonical key the alias resolves to
        target: String,
        /// Type owning the alias
        model_name: String,
        /// Rendered value of the attempted write
        value: String,
    },

    /// Write to a key hidden by a projection
    #[error("'{key}' is not visible through projection '{model_name}'")]
    AttributeNotVisible {
        /// Key written to
        key: String,
        /// Projection type
        model_name: String,
    },
}

impl ModelError {
    /// Create alias read-only error
    pub fn alias_read_only(
        alias: impl Into<String>,
        target: impl Into<String>,
        model_name: impl Into<String>,
        value: &Value,
    ) -> Self {
        Self::AliasReadOnly {
            alias: alias.into(),
            target: target.into(),
            model_name: model_name.into(),
            value: render_value(value),
        }
    }

    /// Create attribute-not-visible error
    pub fn not_visible(key: impl Into<String>, model_name: impl Into<String>) -> Self {
        Self::AttributeNotVisible {
            key: key.into(),
            model_name: model_name.into(),
        }
    }
}

/// Strings render bare, everything else as JSON
fn render_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Result type alias for model operations
pub type ModelResult<T> = Result<T, ModelError>;
