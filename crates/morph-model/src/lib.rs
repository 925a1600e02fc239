//! Morph Model
//!
//! Schema-driven, lazily-resolving record model.
//!
//! # Overview
//!
//! The model layer provides:
//! - **ModelNode**: Generic record interpreting a raw attribute tree at read time
//! - **Resolved**: Classified attribute values (scalars, references, nested models)
//! - **ReferenceArray**: Identity-stable reference sequences updated in place
//! - **Diff engine**: Change detection, cache eviction and notification on update
//! - **AttributeGate**: Read-limited projection views
//!
//! # Example
//!
//! ```rust
//! use morph_model::{ModelContext, ModelIdentity, ModelNode};
//! use morph_schema::{ModelSchema, NoHooks, SchemaRegistry};
//! use serde_json::json;
//! use std::sync::Arc;
//!
//! let schema = SchemaRegistry::builder(NoHooks)
//!     .model("book", ModelSchema::new().alias("title", "name"))
//!     .build()
//!     .unwrap();
//! let context = Arc::new(ModelContext::detached(Arc::new(schema)));
//!
//! let raw = json!({"name": "Dune"}).as_object().cloned().unwrap();
//! let book = ModelNode::record(context, ModelIdentity::new("book", "1"), raw);
//! assert_eq!(book.get("title").as_str(), Some("Dune"));
//!
//! let changes = book.apply_update(json!({"name": "Dune Messiah"}).as_object().cloned().unwrap());
//! let keys = changes.keys_for(&book).unwrap();
//! assert!(keys.contains("name") && keys.contains("title"));
//! ```

pub mod config;
pub mod context;
pub mod diff;
pub mod error;
pub mod graph;
pub mod identity;
pub mod node;
pub mod notify;
pub mod projection;
mod resolver;
pub mod value;

// Re-exports
pub use config::{AliasNotification, ModelConfig};
pub use context::ModelContext;
pub use error::{ModelError, ModelResult};
pub use graph::{EmptyGraph, Lookup, PendingRecord, ReferenceGraph};
pub use identity::ModelIdentity;
pub use node::{ModelNode, ModelRef, NodeKind};
pub use notify::{ChangeNotification, ChangeSet, NoopSink, NotificationSink};
pub use projection::AttributeGate;
pub use value::{ReferenceArray, Resolved};

/// Prelude module for common imports
pub mod prelude {
    //! Common imports for record model operations
    pub use crate::{
        ChangeSet, Lookup, ModelConfig, ModelContext, ModelError, ModelIdentity, ModelNode,
        ModelRef, NotificationSink, ReferenceArray, ReferenceGraph, Resolved,
    };
}

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
