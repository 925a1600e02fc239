//! Error types for schema registration
//!
//! Misconfigured schemas are programmer errors: they are rejected when the
//! registry is built, never at resolution time.

/// Errors raised while building a [`SchemaRegistry`](crate::SchemaRegistry)
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SchemaError {
    /// Model registered with an empty name
    #[error("model name must not be empty")]
    EmptyModelName,

    /// Model registered twice
    #[error("model '{0}' is already registered")]
    DuplicateModel(String),

    /// Alias chain loops back on itself
    #[error("alias '{alias}' in '{model_name}' forms a cycle: {}", .chain.join(" -> "))]
    AliasCycle {
        /// Owning model
        model_name: String,
        /// Alias where the cycle was detected
        alias: String,
        /// Keys visited, ending with the repeated key
        chain: Vec<String>,
    },

    /// Projection names a base type the schema does not govern
    #[error("projection '{projection}' projects unknown model '{base}'")]
    UnknownProjectionBase {
        /// Projection model
        projection: String,
        /// Declared base
        base: String,
    },

    /// Projection chain loops back on itself
    #[error("projection '{projection}' forms a cycle: {}", .chain.join(" -> "))]
    ProjectionCycle {
        /// Projection where the cycle was detected
        projection: String,
        /// Models visited, ending with the repeated model
        chain: Vec<String>,
    },
}

impl SchemaError {
    /// Create alias cycle error
    pub fn alias_cycle(model_name: impl Into<String>, alias: impl Into<String>, chain: Vec<String>) -> Self {
        Self::AliasCycle {
            model_name: model_name.into(),
            alias: alias.into(),
            chain,
        }
    }
}

/// Result type alias for schema operations
pub type SchemaResult<T> = Result<T, SchemaError>;
