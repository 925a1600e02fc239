//! Projection attribute gate
//!
//! Provides [`AttributeGate`], the allow-list a projection node applies at
//! its read, write and notification boundaries.

use indexmap::IndexSet;
use morph_schema::SchemaRegistry;
use serde_json::{Map, Value};
use std::collections::HashSet;

/// Allow-list of keys visible through a projection
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct AttributeGate {
    allowed: Option<IndexSet<String>>,
}

impl AttributeGate {
    /// Gate admitting every key
    #[inline]
    #[must_use]
    pub fn open() -> Self {
        Self { allowed: None }
    }

    /// Gate admitting only `keys`
    #[must_use]
    pub fn only<I, S>(keys: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            allowed: Some(keys.into_iter().map(Into::into).collect()),
        }
    }

    /// Gate declared for projection `model_name`
    ///
    /// Projections without an allow-list admit every key.
    #[must_use]
    pub fn for_projection(schema: &SchemaRegistry, model_name: &str) -> Self {
        Self {
            allowed: schema.projection_attributes(model_name).cloned(),
        }
    }

    /// Allow-list, if one was declared
    #[inline]
    #[must_use]
    pub fn keys(&self) -> Option<&IndexSet<String>> {
        self.allowed.as_ref()
    }

    /// Whether `key` is visible
    #[inline]
    #[must_use]
    pub fn admits(&self, key: &str) -> bool {
        self.allowed.as_ref().map_or(true, |allowed| allowed.contains(key))
    }

    /// Drop keys the gate hides
    pub fn filter(&self, keys: &mut IndexSet<String>) {
        if let Some(allowed) = &self.allowed {
            keys.retain(|key| allowed.contains(key));
        }
    }

    /// Raw keys behind the allow-list of projection `model_name`, aliases resolved
    ///
    /// `None` when every key is visible.
    #[must_use]
    pub fn canonical_keys<'a>(
        &'a self,
        schema: &'a SchemaRegistry,
        model_name: &str,
    ) -> Option<HashSet<&'a str>> {
        let allowed = self.allowed.as_ref()?;
        Some(
            allowed
                .iter()
                .map(|key| schema.canonical_key(model_name, key))
                .collect(),
        )
    }

    /// Drop raw entries the gate hides
    pub fn retain_visible(
        &self,
        schema: &SchemaRegistry,
        model_name: &str,
        raw: &mut Map<String, Value>,
    ) {
        if let Some(visible) = self.canonical_keys(schema, model_name) {
            raw.retain(|key, _| visible.contains(key.as_str()));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use morph_schema::{ModelSchema, NoHooks};

    #[test]
    fn open_gate_admits_everything() {
        let gate = AttributeGate::open();
        assert!(gate.admits("anything"));
    }

    #[test]
    fn gate_filters_keys() {
        let gate = AttributeGate::only(["title", "pub"]);
        let mut keys: IndexSet<String> = ["name", "title", "pub", "publisher"]
            .into_iter()
            .map(String::from)
            .collect();

        gate.filter(&mut keys);

        assert_eq!(keys.into_iter().collect::<Vec<_>>(), vec!["title", "pub"]);
        assert!(!gate.admits("name"));
    }

    #[test]
    fn gate_from_registry() {
        let registry = SchemaRegistry::builder(NoHooks)
            .model("book", ModelSchema::new())
            .model("excerpt", ModelSchema::projection("book").attributes(["title"]))
            .model("full", ModelSchema::projection("book"))
            .build()
            .unwrap();

        assert!(!AttributeGate::for_projection(&registry, "excerpt").admits("name"));
        assert!(AttributeGate::for_projection(&registry, "full").admits("name"));
    }

    #[test]
    fn retain_visible_resolves_aliases() {
        let registry = SchemaRegistry::builder(NoHooks)
            .model("book", ModelSchema::new().alias("title", "name"))
            .model("excerpt", ModelSchema::projection("book").attributes(["title"]))
            .build()
            .unwrap();
        let gate = AttributeGate::for_projection(&registry, "excerpt");
        let mut raw = serde_json::json!({"name": "Dune", "price": 10})
            .as_object()
            .cloned()
            .unwrap();

        gate.retain_visible(&registry, "excerpt", &mut raw);

        assert_eq!(raw.keys().collect::<Vec<_>>(), vec!["name"]);
        assert!(AttributeGate::open().canonical_keys(&registry, "excerpt").is_none());
    }
}
