//! Model configuration
//!
//! Defines [`ModelConfig`], the knobs shared by every node created under one
//! [`ModelContext`](crate::ModelContext).

use serde::{Deserialize, Serialize};

/// Which aliases are reported when their canonical key changes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AliasNotification {
    /// Every alias of a changed canonical key
    #[default]
    Always,
    /// Only aliases that were read on that node
    WhenRead,
}

/// Record model configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelConfig {
    /// Alias reporting policy for change notifications
    pub alias_notification: AliasNotification,
    /// Cache values holding missing or in-flight references
    pub cache_pending_references: bool,
}

impl ModelConfig {
    /// Create default configuration
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// With alias notification policy
    #[inline]
    #[must_use]
    pub fn with_alias_notification(mut self, policy: AliasNotification) -> Self {
        self.alias_notification = policy;
        self
    }

    /// With caching of unresolved references
    #[inline]
    #[must_use]
    pub fn with_cache_pending_references(mut self, cache: bool) -> Self {
        self.cache_pending_references = cache;
        self
    }
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            alias_notification: AliasNotification::Always,
            cache_pending_references: false,
        }
    }
}
