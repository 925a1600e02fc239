//! Retrieval seam
//!
//! Provides [`Adapter`], the async source the store fetches records from,
//! and the request types it receives.

use crate::payload::Payload;
use serde::{Deserialize, Serialize};

/// Kind of record a type instantiates
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecordKind {
    /// Full record
    Model,
    /// Projection over a base type
    Projection,
}

/// Request handed to an adapter
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FindRequest {
    /// Requested type
    pub model_name: String,
    /// Requested id
    pub id: String,
    /// Record kind decided by the schema
    pub kind: RecordKind,
    /// Whether a loaded record is being refreshed
    pub reload: bool,
}

/// Failure reported by an adapter
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{message}")]
pub struct AdapterError {
    /// Description of the failure
    pub message: String,
}

impl AdapterError {
    /// Create adapter error
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// Source of record documents
#[cfg_attr(test, mockall::automock)]
#[async_trait::async_trait]
pub trait Adapter: Send + Sync {
    /// Fetch the document holding `request`'s record
    async fn find_record(&self, request: FindRequest) -> Result<Payload, AdapterError>;
}
