//! Resolved attribute values
//!
//! Provides [`Resolved`], the post-classification value returned to readers,
//! and [`ReferenceArray`], the identity-stable sequence of references that
//! updates mutate in place.

use crate::graph::PendingRecord;
use crate::node::ModelRef;
use parking_lot::RwLock;
use serde_json::Value;
use std::fmt::{self, Debug, Formatter};
use std::sync::Arc;

/// Value produced by resolving one attribute
#[derive(Debug, Clone)]
pub enum Resolved {
    /// Key is absent and has no default
    Absent,
    /// Scalar passthrough, default or unclassified structure
    Value(Value),
    /// Resolved reference to another record
    Record(ModelRef),
    /// Reference to a record whose fetch is in flight
    Pending(PendingRecord),
    /// Lazily-materialized nested model
    Nested(ModelRef),
    /// Sequence whose elements were classified one by one
    List(Vec<Resolved>),
    /// Identity-stable reference array
    References(ReferenceArray),
}

impl Resolved {
    /// Whether the attribute is absent
    #[inline]
    #[must_use]
    pub fn is_absent(&self) -> bool {
        matches!(self, Self::Absent)
    }

    /// Plain JSON value, if this is one
    #[inline]
    #[must_use]
    pub fn as_value(&self) -> Option<&Value> {
        match self {
            Self::Value(value) => Some(value),
            _ => None,
        }
    }

    /// String value, if this is one
    #[inline]
    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        self.as_value().and_then(Value::as_str)
    }

    /// Referenced record, if resolved
    #[inline]
    #[must_use]
    pub fn as_record(&self) -> Option<&ModelRef> {
        match self {
            Self::Record(node) => Some(node),
            _ => None,
        }
    }

    /// Nested model, if this is one
    #[inline]
    #[must_use]
    pub fn as_nested(&self) -> Option<&ModelRef> {
        match self {
            Self::Nested(node) => Some(node),
            _ => None,
        }
    }

    /// Record or nested model
    #[inline]
    #[must_use]
    pub fn as_node(&self) -> Option<&ModelRef> {
        match self {
            Self::Record(node) | Self::Nested(node) => Some(node),
            _ => None,
        }
    }

    /// Classified sequence, if this is one
    #[inline]
    #[must_use]
    pub fn as_list(&self) -> Option<&[Resolved]> {
        match self {
            Self::List(items) => Some(items),
            _ => None,
        }
    }

    /// Reference array, if this is one
    #[inline]
    #[must_use]
    pub fn as_references(&self) -> Option<&ReferenceArray> {
        match self {
            Self::References(array) => Some(array),
            _ => None,
        }
    }

    /// Cached reference array still waiting on an element
    pub(crate) fn needs_refresh(&self) -> bool {
        matches!(self, Self::References(array) if !array.is_settled())
    }
}

impl PartialEq for Resolved {
    /// Nodes and reference arrays compare by identity
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Absent, Self::Absent) => true,
            (Self::Value(a), Self::Value(b)) => a == b,
            (Self::Record(a), Self::Record(b)) | (Self::Nested(a), Self::Nested(b)) => {
                Arc::ptr_eq(a, b)
            }
            (Self::Pending(a), Self::Pending(b)) => a == b,
            (Self::List(a), Self::List(b)) => a == b,
            (Self::References(a), Self::References(b)) => a.ptr_eq(b),
            _ => false,
        }
    }
}

impl From<Value> for Resolved {
    fn from(value: Value) -> Self {
        Self::Value(value)
    }
}

/// Shared, identity-stable sequence of references
///
/// Clones share the same storage: a holder of an earlier read observes
/// later [`replace_contents`](Self::replace_contents) calls.
#[derive(Clone)]
pub struct ReferenceArray {
    contents: Arc<RwLock<ArrayContents>>,
}

struct ArrayContents {
    items: Vec<Resolved>,
    /// False while an element was missing or pending at the last fill
    settled: bool,
}

impl ReferenceArray {
    /// Create array with initial contents
    #[must_use]
    pub fn new(items: Vec<Resolved>) -> Self {
        Self::filled(items, true)
    }

    pub(crate) fn filled(items: Vec<Resolved>, settled: bool) -> Self {
        Self {
            contents: Arc::new(RwLock::new(ArrayContents { items, settled })),
        }
    }

    /// Replace all elements in place
    pub fn replace_contents(&self, items: Vec<Resolved>) {
        self.refill(items, true);
    }

    pub(crate) fn refill(&self, items: Vec<Resolved>, settled: bool) {
        let mut contents = self.contents.write();
        contents.items = items;
        contents.settled = settled;
    }

    /// Whether every element resolved at the last fill
    #[must_use]
    pub fn is_settled(&self) -> bool {
        self.contents.read().settled
    }

    /// Number of elements
    #[must_use]
    pub fn len(&self) -> usize {
        self.contents.read().items.len()
    }

    /// Whether the array is empty
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.contents.read().items.is_empty()
    }

    /// Element at `index`
    #[must_use]
    pub fn get(&self, index: usize) -> Option<Resolved> {
        self.contents.read().items.get(index).cloned()
    }

    /// Snapshot of the elements
    #[must_use]
    pub fn to_vec(&self) -> Vec<Resolved> {
        self.contents.read().items.clone()
    }

    /// Ids of the records held, skipping non-record elements
    #[must_use]
    pub fn ids(&self) -> Vec<String> {
        self.contents
            .read()
            .items
            .iter()
            .filter_map(|item| item.as_node().and_then(|node| node.id().map(str::to_string)))
            .collect()
    }

    /// Whether both handles share storage
    #[inline]
    #[must_use]
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.contents, &other.contents)
    }
}

impl Default for ReferenceArray {
    fn default() -> Self {
        Self::new(Vec::new())
    }
}

impl Debug for ReferenceArray {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.contents.read().items.iter()).finish()
    }
}
