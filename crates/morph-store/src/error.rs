//! Error types for the record store
//!
//! [`StoreError`] is cloneable: concurrent requests for one record share a
//! single fetch and every waiter receives the same outcome.

use morph_model::ModelError;

/// Store error type
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StoreError {
    /// Write rejected by the record model
    #[error("model error: {0}")]
    Model(#[from] ModelError),

    /// Adapter failed to load a record
    #[error("adapter failed to load '{model_name}' '{id}': {message}")]
    Adapter {
        /// Requested type
        model_name: String,
        /// Requested id
        id: String,
        /// Adapter message
        message: String,
    },

    /// Record is not loaded, or the adapter response did not contain it
    #[error("record '{model_name}' '{id}' not found")]
    NotFound {
        /// Requested type
        model_name: String,
        /// Requested id
        id: String,
    },

    /// Fetch requested from a store without adapter
    #[error("no adapter configured to load '{0}'")]
    NoAdapter(String),

    /// Invalid store configuration
    #[error("configuration error: {0}")]
    Config(String),
}

impl StoreError {
    /// Create adapter error
    pub fn adapter(model_name: impl Into<String>, id: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Adapter {
            model_name: model_name.into(),
            id: id.into(),
            message: message.into(),
        }
    }

    /// Create not-found error
    pub fn not_found(model_name: impl Into<String>, id: impl Into<String>) -> Self {
        Self::NotFound {
            model_name: model_name.into(),
            id: id.into(),
        }
    }

    /// Check if retrying the request may succeed
    #[inline]
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Adapter { .. })
    }
}

/// Result type alias for store operations
pub type StoreResult<T> = Result<T, StoreError>;

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn model_errors_convert() {
        let err: StoreError = ModelError::alias_read_only("title", "name", "book", &json!("x")).into();
        assert!(matches!(err, StoreError::Model(_)));
        assert!(!err.is_retryable());
    }

    #[test]
    fn adapter_error_display() {
        let err = StoreError::adapter("book", "isbn:1", "connection reset");
        assert_eq!(err.to_string(), "adapter failed to load 'book' 'isbn:1': connection reset");
        assert!(err.is_retryable());
    }
}
