//! Per-type schema declarations
//!
//! Provides [`ModelSchema`], the declaration a host registers for one model
//! type: aliases, defaults, transforms and projection metadata.

use indexmap::{IndexMap, IndexSet};
use serde_json::Value;
use std::fmt::{self, Debug, Formatter};
use std::sync::Arc;

/// Pure function applied to an explicitly-present raw value
pub type Transform = Arc<dyn Fn(&Value) -> Value + Send + Sync>;

/// Schema declaration for a single model type
///
/// # Example
/// ```
/// use morph_schema::ModelSchema;
/// use serde_json::json;
///
/// let book = ModelSchema::new()
///     .alias("title", "name")
///     .default_value("publisher", json!("Penguin Classics"))
///     .transform("publisher", |v| json!(format!("{}, of course", v.as_str().unwrap_or_default())));
///
/// assert_eq!(book.aliases().get("title").map(String::as_str), Some("name"));
/// ```
#[derive(Clone, Default)]
pub struct ModelSchema {
    aliases: IndexMap<String, String>,
    defaults: IndexMap<String, Value>,
    transforms: IndexMap<String, Transform>,
    projects: Option<String>,
    attributes: Option<IndexSet<String>>,
}

impl ModelSchema {
    /// Create empty schema
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create projection schema over `base`
    #[inline]
    #[must_use]
    pub fn projection(base: impl Into<String>) -> Self {
        Self::new().projects(base)
    }

    /// Declare read-only alias `alias` for `target`
    #[must_use]
    pub fn alias(mut self, alias: impl Into<String>, target: impl Into<String>) -> Self {
        self.aliases.insert(alias.into(), target.into());
        self
    }

    /// Declare fallback used when `key` is absent from the raw tree
    #[must_use]
    pub fn default_value(mut self, key: impl Into<String>, value: Value) -> Self {
        self.defaults.insert(key.into(), value);
        self
    }

    /// Declare transform applied to explicit raw values of `key`
    #[must_use]
    pub fn transform<F>(mut self, key: impl Into<String>, transform: F) -> Self
    where
        F: Fn(&Value) -> Value + Send + Sync + 'static,
    {
        self.transforms.insert(key.into(), Arc::new(transform));
        self
    }

    /// Declare the base type this schema projects
    #[must_use]
    pub fn projects(mut self, base: impl Into<String>) -> Self {
        self.projects = Some(base.into());
        self
    }

    /// Declare the allow-list of keys visible through a projection
    #[must_use]
    pub fn attributes<I, S>(mut self, keys: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.attributes = Some(keys.into_iter().map(Into::into).collect());
        self
    }

    /// Declared aliases (alias -> target)
    #[inline]
    #[must_use]
    pub fn aliases(&self) -> &IndexMap<String, String> {
        &self.aliases
    }

    /// Declared defaults
    #[inline]
    #[must_use]
    pub fn defaults(&self) -> &IndexMap<String, Value> {
        &self.defaults
    }

    /// Declared transforms
    #[inline]
    #[must_use]
    pub fn transforms(&self) -> &IndexMap<String, Transform> {
        &self.transforms
    }

    /// Projected base type
    #[inline]
    #[must_use]
    pub fn projected_base(&self) -> Option<&str> {
        self.projects.as_deref()
    }

    /// Projection allow-list
    #[inline]
    #[must_use]
    pub fn visible_attributes(&self) -> Option<&IndexSet<String>> {
        self.attributes.as_ref()
    }

    /// Whether this schema declares a projection
    #[inline]
    #[must_use]
    pub fn is_projection(&self) -> bool {
        self.projects.is_some()
    }
}

impl Debug for ModelSchema {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("ModelSchema")
            .field("aliases", &self.aliases)
            .field("defaults", &self.defaults)
            .field("transforms", &self.transforms.keys().collect::<Vec<_>>())
            .field("projects", &self.projects)
            .field("attributes", &self.attributes)
            .finish()
    }
}
