//! Reference graph contract
//!
//! Provides [`ReferenceGraph`], implemented by the host store, through which
//! the resolver turns `(type, id)` references into records.

use crate::node::ModelRef;
use serde::{Deserialize, Serialize};
use std::fmt::{self, Display, Formatter};

/// Deferred handle for a record whose fetch is in flight
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PendingRecord {
    /// Type of the awaited record
    pub model_name: String,
    /// Identifier of the awaited record
    pub id: String,
}

impl PendingRecord {
    /// Create new pending handle
    #[inline]
    #[must_use]
    pub fn new(model_name: impl Into<String>, id: impl Into<String>) -> Self {
        Self {
            model_name: model_name.into(),
            id: id.into(),
        }
    }
}

impl Display for PendingRecord {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{} (pending)", self.model_name, self.id)
    }
}

/// Outcome of a reference lookup
#[derive(Debug, Clone)]
pub enum Lookup {
    /// Record is loaded
    Loaded(ModelRef),
    /// Record is being fetched
    Pending(PendingRecord),
    /// Record is unknown
    Missing,
}

/// Host-side identity map consulted by the resolver
///
/// Implementations must not call back into the node being resolved.
pub trait ReferenceGraph: Send + Sync {
    /// Look up the record identified by `(model_name, id)`
    fn lookup(&self, model_name: &str, id: &str) -> Lookup;
}

/// Graph that knows no records
#[derive(Debug, Clone, Copy, Default)]
pub struct EmptyGraph;

impl ReferenceGraph for EmptyGraph {
    fn lookup(&self, _model_name: &str, _id: &str) -> Lookup {
        Lookup::Missing
    }
}
