//! Morph Store
//!
//! Identity map and retrieval path hosting lazily-resolved records.
//!
//! # Overview
//!
//! The store layer provides:
//! - **Store**: One node per `(type, id)`, acting as the reference graph of its records
//! - **Adapter**: Async seam records are fetched through
//! - **Payload**: `{ data, included }` documents pushed into the store
//! - **Request coalescing**: Concurrent finds for one record share a single fetch
//! - **Projections**: Gated views reading and writing the record of their base type
//!
//! # Example
//!
//! ```rust
//! use morph_schema::{AttributeReference, ModelSchema, SchemaHooks, SchemaRegistry};
//! use morph_store::{Payload, Store};
//! use serde_json::Value;
//! use std::sync::Arc;
//!
//! struct Hooks;
//!
//! impl SchemaHooks for Hooks {
//!     fn compute_attribute_reference(&self, key: &str, value: &Value) -> Option<AttributeReference> {
//!         if key != "author" {
//!             return None;
//!         }
//!         Some(AttributeReference::new("author", value.as_str()?))
//!     }
//! }
//!
//! let schema = SchemaRegistry::builder(Hooks)
//!     .model("book", ModelSchema::new())
//!     .build()
//!     .unwrap();
//! let store = Store::new(Arc::new(schema));
//!
//! let payload = Payload::from_json_str(
//!     r#"{
//!         "data": {"id": "1", "type": "book", "attributes": {"author": "9"}},
//!         "included": [{"id": "9", "type": "author", "attributes": {"name": "Herbert"}}]
//!     }"#,
//! )
//! .unwrap();
//! let books = store.push_payload(payload);
//!
//! let author = books[0].get("author");
//! assert_eq!(author.as_record().unwrap().get("name").as_str(), Some("Herbert"));
//! ```

pub mod adapter;
pub mod config;
pub mod error;
pub mod payload;
pub mod store;

// Re-exports
pub use adapter::{Adapter, AdapterError, FindRequest, RecordKind};
pub use config::StoreConfig;
pub use error::{StoreError, StoreResult};
pub use payload::{Payload, PrimaryData, ResourceObject};
pub use store::{FindOptions, RecordKey, Store, StoreBuilder};

/// Prelude module for common imports
pub mod prelude {
    //! Common imports for store operations
    pub use crate::{
        Adapter, AdapterError, FindOptions, FindRequest, Payload, RecordKind, ResourceObject,
        Store, StoreConfig, StoreError, StoreResult,
    };
}

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
