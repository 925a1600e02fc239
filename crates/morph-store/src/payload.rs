//! Inbound resource documents
//!
//! Provides [`Payload`], a `{ data, included }` document as received from an
//! API, and [`ResourceObject`], one `(type, id, attributes)` entry of it.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// One resource of a document
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResourceObject {
    /// Resource id
    pub id: String,
    /// Resource type
    #[serde(rename = "type")]
    pub model_name: String,
    /// Raw attribute tree
    #[serde(default)]
    pub attributes: Map<String, Value>,
}

impl ResourceObject {
    /// Create resource
    #[inline]
    #[must_use]
    pub fn new(model_name: impl Into<String>, id: impl Into<String>, attributes: Map<String, Value>) -> Self {
        Self {
            id: id.into(),
            model_name: model_name.into(),
            attributes,
        }
    }
}

/// Primary data of a document
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PrimaryData {
    /// Single resource
    One(ResourceObject),
    /// Resource collection
    Many(Vec<ResourceObject>),
}

impl PrimaryData {
    /// Resources in document order
    #[must_use]
    pub fn into_vec(self) -> Vec<ResourceObject> {
        match self {
            Self::One(resource) => vec![resource],
            Self::Many(resources) => resources,
        }
    }
}

/// Resource document
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Payload {
    /// Primary data
    pub data: PrimaryData,
    /// Side-loaded resources referenced by the primary data
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub included: Vec<ResourceObject>,
}

impl Payload {
    /// Document with one primary resource
    #[inline]
    #[must_use]
    pub fn single(resource: ResourceObject) -> Self {
        Self {
            data: PrimaryData::One(resource),
            included: Vec::new(),
        }
    }

    /// Document with a collection of primary resources
    #[inline]
    #[must_use]
    pub fn many(resources: Vec<ResourceObject>) -> Self {
        Self {
            data: PrimaryData::Many(resources),
            included: Vec::new(),
        }
    }

    /// With side-loaded resources
    #[inline]
    #[must_use]
    pub fn with_included(mut self, included: Vec<ResourceObject>) -> Self {
        self.included = included;
        self
    }

    /// Parse a JSON document
    ///
    /// # Errors
    /// Returns the `serde_json` error if the document is malformed
    pub fn from_json_str(source: &str) -> serde_json::Result<Self> {
        serde_json::from_str(source)
    }
}
