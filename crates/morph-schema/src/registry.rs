//! Schema registry for lazily-resolved records
//!
//! Provides [`SchemaRegistry`], the validated, explicitly constructed schema
//! source shared by every record of a store. Declarations are flattened at
//! build time: alias chains are chased to their canonical key and projection
//! schemas are layered over their base type, so lookups during resolution
//! are single map reads.

use crate::error::{SchemaError, SchemaResult};
use crate::hooks::{NoHooks, SchemaHooks};
use crate::model_schema::{ModelSchema, Transform};
use indexmap::{IndexMap, IndexSet};
use serde_json::Value;
use std::collections::HashMap;
use std::fmt::{self, Debug, Formatter};
use std::sync::Arc;

/// Flattened schema for one model type
#[derive(Default)]
struct EffectiveSchema {
    /// alias -> canonical key (chains fully chased)
    aliases: HashMap<String, String>,
    /// canonical key -> aliases resolving to it
    reverse_aliases: HashMap<String, Vec<String>>,
    defaults: HashMap<String, Value>,
    transforms: HashMap<String, Transform>,
    projects: Option<String>,
    attributes: Option<IndexSet<String>>,
}

/// Validated schema source
///
/// Constructed once through [`SchemaRegistry::builder`] and shared by
/// reference (`Arc<SchemaRegistry>`); there is no global registry.
pub struct SchemaRegistry {
    hooks: Arc<dyn SchemaHooks>,
    models: HashMap<String, EffectiveSchema>,
}

impl SchemaRegistry {
    /// Start building a registry around `hooks`
    #[inline]
    #[must_use]
    pub fn builder(hooks: impl SchemaHooks + 'static) -> SchemaRegistryBuilder {
        SchemaRegistryBuilder::new(Arc::new(hooks))
    }

    /// Registry with no hooks and no models
    #[must_use]
    pub fn empty() -> Self {
        Self {
            hooks: Arc::new(NoHooks),
            models: HashMap::new(),
        }
    }

    /// Host predicates
    #[inline]
    #[must_use]
    pub fn hooks(&self) -> &dyn SchemaHooks {
        self.hooks.as_ref()
    }

    /// Whether `model_name` was registered explicitly
    #[inline]
    #[must_use]
    pub fn is_registered(&self, model_name: &str) -> bool {
        self.models.contains_key(model_name)
    }

    /// Whether the schema governs `model_name`
    #[must_use]
    pub fn includes_model(&self, model_name: &str) -> bool {
        self.is_registered(model_name) || self.hooks.includes_model(model_name)
    }

    /// Whether `model_name` is a projection type
    #[must_use]
    pub fn is_projection(&self, model_name: &str) -> bool {
        self.models
            .get(model_name)
            .is_some_and(|schema| schema.projects.is_some())
            || self.hooks.model_is_projection(model_name)
    }

    /// Base type projected by `model_name`
    #[must_use]
    pub fn projection_base(&self, model_name: &str) -> Option<&str> {
        self.models.get(model_name)?.projects.as_deref()
    }

    /// Allow-list of keys visible through projection `model_name`
    #[must_use]
    pub fn projection_attributes(&self, model_name: &str) -> Option<&IndexSet<String>> {
        self.models.get(model_name)?.attributes.as_ref()
    }

    /// Canonical key when `key` is an alias in `model_name`
    #[must_use]
    pub fn alias_target(&self, model_name: &str, key: &str) -> Option<&str> {
        self.models
            .get(model_name)?
            .aliases
            .get(key)
            .map(String::as_str)
    }

    /// Canonical key for `key` (the key itself when it is not an alias)
    #[must_use]
    pub fn canonical_key<'a>(&'a self, model_name: &str, key: &'a str) -> &'a str {
        self.alias_target(model_name, key).unwrap_or(key)
    }

    /// Aliases that resolve to `canonical`
    #[must_use]
    pub fn aliases_for(&self, model_name: &str, canonical: &str) -> &[String] {
        self.models
            .get(model_name)
            .and_then(|schema| schema.reverse_aliases.get(canonical))
            .map_or(&[], Vec::as_slice)
    }

    /// Default for `key` in `model_name`
    #[must_use]
    pub fn default_value(&self, model_name: &str, key: &str) -> Option<&Value> {
        self.models.get(model_name)?.defaults.get(key)
    }

    /// Transform for `key` in `model_name`
    #[must_use]
    pub fn transform(&self, model_name: &str, key: &str) -> Option<&Transform> {
        self.models.get(model_name)?.transforms.get(key)
    }

    /// Names of explicitly registered models
    pub fn model_names(&self) -> impl Iterator<Item = &str> {
        self.models.keys().map(String::as_str)
    }
}

impl Default for SchemaRegistry {
    fn default() -> Self {
        Self::empty()
    }
}

impl Debug for SchemaRegistry {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        let mut names: Vec<_> = self.models.keys().collect();
        names.sort();
        f.debug_struct("SchemaRegistry").field("models", &names).finish()
    }
}

/// Builder validating declarations before a registry exists
pub struct SchemaRegistryBuilder {
    hooks: Arc<dyn SchemaHooks>,
    models: IndexMap<String, ModelSchema>,
    error: Option<SchemaError>,
}

impl SchemaRegistryBuilder {
    fn new(hooks: Arc<dyn SchemaHooks>) -> Self {
        Self {
            hooks,
            models: IndexMap::new(),
            error: None,
        }
    }

    /// Register `schema` for `model_name`
    ///
    /// Registration errors are reported by [`build`](Self::build).
    #[must_use]
    pub fn model(mut self, model_name: impl Into<String>, schema: ModelSchema) -> Self {
        let model_name = model_name.into();
        if self.error.is_some() {
            return self;
        }
        if model_name.is_empty() {
            self.error = Some(SchemaError::EmptyModelName);
        } else if self.models.contains_key(&model_name) {
            self.error = Some(SchemaError::DuplicateModel(model_name));
        } else {
            self.models.insert(model_name, schema);
        }
        self
    }

    /// Validate and flatten all declarations
    ///
    /// # Errors
    /// - `SchemaError::EmptyModelName` / `DuplicateModel` from registration
    /// - `SchemaError::UnknownProjectionBase` if a base is not governed
    /// - `SchemaError::ProjectionCycle` if projections loop
    /// - `SchemaError::AliasCycle` if an alias chain loops
    pub fn build(self) -> SchemaResult<SchemaRegistry> {
        if let Some(err) = self.error {
            return Err(err);
        }

        let mut models = HashMap::with_capacity(self.models.len());
        for name in self.models.keys() {
            let lineage = self.lineage(name)?;
            let effective = self.flatten(name, &lineage)?;
            models.insert(name.clone(), effective);
        }

        tracing::debug!("Built schema registry with {} models", models.len());

        Ok(SchemaRegistry {
            hooks: self.hooks,
            models,
        })
    }

    /// Model followed by the chain of types it projects
    fn lineage<'a>(&'a self, model_name: &'a str) -> SchemaResult<Vec<&'a str>> {
        let mut chain = vec![model_name];
        let mut current = model_name;

        while let Some(base) = self.models.get(current).and_then(ModelSchema::projected_base) {
            if chain.contains(&base) {
                let mut visited: Vec<String> = chain.iter().map(|s| (*s).to_string()).collect();
                visited.push(base.to_string());
                return Err(SchemaError::ProjectionCycle {
                    projection: model_name.to_string(),
                    chain: visited,
                });
            }
            if !self.models.contains_key(base) && !self.hooks.includes_model(base) {
                return Err(SchemaError::UnknownProjectionBase {
                    projection: current.to_string(),
                    base: base.to_string(),
                });
            }
            chain.push(base);
            current = base;
        }

        Ok(chain)
    }

    fn flatten(&self, model_name: &str, lineage: &[&str]) -> SchemaResult<EffectiveSchema> {
        let mut declared_aliases: HashMap<String, String> = HashMap::new();
        let mut effective = EffectiveSchema::default();

        // Base first so the more specific declaration wins
        for name in lineage.iter().rev() {
            let Some(schema) = self.models.get(*name) else {
                continue;
            };
            for (alias, target) in schema.aliases() {
                declared_aliases.insert(alias.clone(), target.clone());
            }
            for (key, value) in schema.defaults() {
                effective.defaults.insert(key.clone(), value.clone());
            }
            for (key, transform) in schema.transforms() {
                effective.transforms.insert(key.clone(), Arc::clone(transform));
            }
        }

        for alias in declared_aliases.keys() {
            let canonical = chase_alias(model_name, alias, &declared_aliases)?;
            effective
                .reverse_aliases
                .entry(canonical.clone())
                .or_default()
                .push(alias.clone());
            effective.aliases.insert(alias.clone(), canonical);
        }
        for aliases in effective.reverse_aliases.values_mut() {
            aliases.sort();
        }

        let own = &self.models[model_name];
        effective.projects = own.projected_base().map(str::to_string);
        effective.attributes = own.visible_attributes().cloned();

        Ok(effective)
    }
}

impl Debug for SchemaRegistryBuilder {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("SchemaRegistryBuilder")
            .field("models", &self.models)
            .field("error", &self.error)
            .finish()
    }
}

fn chase_alias(
    model_name: &str,
    alias: &str,
    aliases: &HashMap<String, String>,
) -> SchemaResult<String> {
    let mut chain = vec![alias.to_string()];
    let mut current = &aliases[alias];

    while let Some(next) = aliases.get(current) {
        if chain.contains(current) {
            chain.push(current.clone());
            return Err(SchemaError::alias_cycle(model_name, alias, chain));
        }
        chain.push(current.clone());
        current = next;
    }

    Ok(current.clone())
}
