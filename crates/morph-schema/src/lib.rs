//! Morph Schema
//!
//! Schema source for lazily-resolved records.
//!
//! # Overview
//!
//! The schema layer provides:
//! - **SchemaHooks**: Host predicates classifying raw values (references, nested models)
//! - **ModelSchema**: Per-type aliases, defaults, transforms and projection metadata
//! - **SchemaRegistry**: Validated, flattened schema shared by every record
//!
//! # Example
//!
//! ```rust
//! use morph_schema::{ModelSchema, NoHooks, SchemaRegistry};
//!
//! let registry = SchemaRegistry::builder(NoHooks)
//!     .model("book", ModelSchema::new().alias("title", "name"))
//!     .build()
//!     .unwrap();
//!
//! assert_eq!(registry.canonical_key("book", "title"), "name");
//! assert_eq!(registry.canonical_key("book", "name"), "name");
//! ```

pub mod error;
pub mod hooks;
pub mod model_schema;
pub mod registry;

// Re-exports
pub use error::{SchemaError, SchemaResult};
pub use hooks::{identifier_field, AttributeReference, NestedModelSpec, NoHooks, SchemaHooks};
pub use model_schema::{ModelSchema, Transform};
pub use registry::{SchemaRegistry, SchemaRegistryBuilder};

/// Prelude module for common imports
pub mod prelude {
    //! Common imports for schema declarations
    pub use crate::{
        AttributeReference, ModelSchema, NestedModelSpec, NoHooks, SchemaError, SchemaHooks,
        SchemaRegistry,
    };
}

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
