//! Store configuration

use crate::error::{StoreError, StoreResult};
use morph_model::ModelConfig;
use serde::{Deserialize, Serialize};

/// Store configuration
///
/// Loadable from TOML:
///
/// ```toml
/// coalesce_requests = true
///
/// [model]
/// alias_notification = "when_read"
/// cache_pending_references = false
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// Configuration shared by every record of the store
    pub model: ModelConfig,
    /// Share one adapter call between concurrent requests for a record
    pub coalesce_requests: bool,
}

impl StoreConfig {
    /// Create default configuration
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// With model configuration
    #[inline]
    #[must_use]
    pub fn with_model(mut self, model: ModelConfig) -> Self {
        self.model = model;
        self
    }

    /// With request coalescing
    #[inline]
    #[must_use]
    pub fn with_coalesce_requests(mut self, coalesce: bool) -> Self {
        self.coalesce_requests = coalesce;
        self
    }

    /// Parse configuration from TOML
    ///
    /// # Errors
    /// - `StoreError::Config` if the document is malformed
    pub fn from_toml_str(source: &str) -> StoreResult<Self> {
        toml::from_str(source).map_err(|err| StoreError::Config(err.to_string()))
    }
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            model: ModelConfig::default(),
            coalesce_requests: true,
        }
    }
}
