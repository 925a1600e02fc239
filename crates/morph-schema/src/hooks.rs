//! Schema hooks - open-data predicates supplied by the host
//!
//! Provides [`SchemaHooks`], the capability interface consulted by the
//! resolver to classify raw attribute values, together with the value types
//! the hooks produce ([`AttributeReference`], [`NestedModelSpec`]).

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt::{self, Display, Formatter};

/// Pointer from a raw attribute value to another record
///
/// Produced by [`SchemaHooks::compute_attribute_reference`]; the resolver
/// hands `(model_name, id)` to the reference graph.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct AttributeReference {
    /// Type of the referenced record
    pub model_name: String,
    /// Identifier of the referenced record
    pub id: String,
}

impl AttributeReference {
    /// Create new reference
    #[inline]
    #[must_use]
    pub fn new(model_name: impl Into<String>, id: impl Into<String>) -> Self {
        Self {
            model_name: model_name.into(),
            id: id.into(),
        }
    }
}

impl Display for AttributeReference {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.model_name, self.id)
    }
}

/// Description of a nested model carved out of a raw mapping
///
/// Nested models have no independent network identity: `model_name` and
/// `id` are optional and only used for schema lookups and for deciding
/// whether an update still describes the same nested record.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct NestedModelSpec {
    /// Declared type of the nested record, if any
    pub model_name: Option<String>,
    /// Declared id of the nested record, if any
    pub id: Option<String>,
    /// Raw attributes of the nested record
    pub attributes: Map<String, Value>,
}

impl NestedModelSpec {
    /// Create spec with attributes only
    #[inline]
    #[must_use]
    pub fn new(attributes: Map<String, Value>) -> Self {
        Self {
            model_name: None,
            id: None,
            attributes,
        }
    }

    /// With declared type
    #[inline]
    #[must_use]
    pub fn with_model_name(mut self, model_name: impl Into<String>) -> Self {
        self.model_name = Some(model_name.into());
        self
    }

    /// With declared id
    #[inline]
    #[must_use]
    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }
}

/// Host-supplied predicates over raw attribute data
///
/// Every method is optional. An absent hook never matches: no model is
/// included, no type is a projection, no value is a reference, no key is an
/// array-reference key and no mapping is a nested model.
pub trait SchemaHooks: Send + Sync {
    /// Whether the schema governs records of `model_name`
    fn includes_model(&self, _model_name: &str) -> bool {
        false
    }

    /// Whether `model_name` names a projection type
    fn model_is_projection(&self, _model_name: &str) -> bool {
        false
    }

    /// Classify `value` under `key` as a reference to another record
    fn compute_attribute_reference(&self, _key: &str, _value: &Value) -> Option<AttributeReference> {
        None
    }

    /// Whether sequences under `key` are identity-stable reference arrays
    fn is_attribute_array_reference(&self, _key: &str) -> bool {
        false
    }

    /// Classify the mapping `value` under `key` as a nested model
    fn compute_nested_model(&self, _key: &str, _value: &Value) -> Option<NestedModelSpec> {
        None
    }
}

/// Hooks that never match anything
#[derive(Debug, Clone, Copy, Default)]
pub struct NoHooks;

impl SchemaHooks for NoHooks {}

/// Read a string-or-number field as an identifier
///
/// Hosts commonly carve nested identities out of `id`/`type` fields that may
/// arrive as numbers; this keeps that conversion in one place.
#[must_use]
pub fn identifier_field(map: &Map<String, Value>, field: &str) -> Option<String> {
    match map.get(field)? {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}
