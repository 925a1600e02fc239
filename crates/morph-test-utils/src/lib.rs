//! Testing utilities for the Morph workspace
//!
//! Shared fixtures: the bookstore schema, a recording notification sink, an
//! in-memory reference graph and tracing setup.

#![allow(missing_docs)]

use indexmap::IndexSet;
use morph_model::{
    Lookup, ModelContext, ModelIdentity, ModelNode, ModelRef, NotificationSink, PendingRecord,
    ReferenceGraph,
};
use morph_schema::{
    identifier_field, AttributeReference, ModelSchema, NestedModelSpec, SchemaHooks,
    SchemaRegistry,
};
use once_cell::sync::{Lazy, OnceCell};
use parking_lot::{Mutex, RwLock};
use regex::Regex;
use serde_json::{json, Map, Value};
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Weak};

pub const BOOK: &str = "com.example.bookstore.Book";
pub const BOOK_EXCERPT: &str = "com.example.bookstore.projection.BookExcerpt";

/// Key under which the `pubDate` transform wraps parsed dates
pub const DATE_MARKER: &str = "$date";

static BOOKSTORE_MODEL: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)^com\.example\.bookstore\.").unwrap());
static BOOKSTORE_PROJECTION: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)^com\.example\.bookstore\.projection\.").unwrap());
static ISBN: Lazy<Regex> = Lazy::new(|| Regex::new(r"^isbn:").unwrap());
static URN: Lazy<Regex> = Lazy::new(|| Regex::new(r"^urn:(\w+):(.*)").unwrap());

/// Hooks of the bookstore API
///
/// - `isbn:*` strings reference books by the whole value
/// - `urn:<type>:<id>` strings reference `<type>` records
/// - `otherBooksInSeries` holds reference arrays
/// - every mapping except a wrapped date is a nested model typed by its
///   `type` and `id` fields
#[derive(Debug, Clone, Copy, Default)]
pub struct BookstoreHooks;

impl SchemaHooks for BookstoreHooks {
    fn includes_model(&self, model_name: &str) -> bool {
        BOOKSTORE_MODEL.is_match(model_name)
    }

    fn model_is_projection(&self, model_name: &str) -> bool {
        BOOKSTORE_PROJECTION.is_match(model_name)
    }

    fn compute_attribute_reference(&self, _key: &str, value: &Value) -> Option<AttributeReference> {
        let value = value.as_str()?;
        if ISBN.is_match(value) {
            return Some(AttributeReference::new(BOOK, value));
        }
        let parts = URN.captures(value)?;
        Some(AttributeReference::new(&parts[1], &parts[2]))
    }

    fn is_attribute_array_reference(&self, key: &str) -> bool {
        key == "otherBooksInSeries"
    }

    fn compute_nested_model(&self, _key: &str, value: &Value) -> Option<NestedModelSpec> {
        let map = value.as_object()?;
        if map.contains_key(DATE_MARKER) {
            return None;
        }
        Some(NestedModelSpec {
            model_name: identifier_field(map, "type"),
            id: identifier_field(map, "id"),
            attributes: map.clone(),
        })
    }
}

pub fn book_schema() -> ModelSchema {
    ModelSchema::new()
        .alias("title", "name")
        .alias("cost", "price")
        .alias("pub", "publisher")
        .alias("releaseDate", "pubDate")
        .alias("pb", "paperback")
        .alias("hb", "hardback")
        .default_value("publisher", json!("Penguin Classics"))
        .default_value("hardback", json!(true))
        .default_value("paperback", json!(true))
        .default_value("publishedIn", json!("US"))
        .transform("publisher", |value| {
            json!(format!("{}, of course", value.as_str().unwrap_or_default()))
        })
        .transform("pubDate", |value| json!({ DATE_MARKER: value }))
}

pub fn bookstore_registry() -> Arc<SchemaRegistry> {
    let registry = SchemaRegistry::builder(BookstoreHooks)
        .model(BOOK, book_schema())
        .model(
            BOOK_EXCERPT,
            ModelSchema::projection(BOOK).attributes(["title", "pub", "releaseDate"]),
        )
        .build()
        .unwrap();
    Arc::new(registry)
}

/// Top-level mapping of a JSON object literal
pub fn attrs(value: Value) -> Map<String, Value> {
    match value {
        Value::Object(map) => map,
        other => panic!("expected a JSON object, got {other}"),
    }
}

/// Sink remembering every notification in order
#[derive(Debug, Default)]
pub struct RecordingSink {
    events: Mutex<Vec<(ModelRef, Vec<String>)>>,
}

impl RecordingSink {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// `(node label, keys)` in dispatch order
    pub fn events(&self) -> Vec<(String, Vec<String>)> {
        self.events
            .lock()
            .iter()
            .map(|(node, keys)| (node.to_string(), keys.clone()))
            .collect()
    }

    /// All keys reported for `node`, in order
    pub fn keys_for(&self, node: &ModelRef) -> Vec<String> {
        self.events
            .lock()
            .iter()
            .filter(|(seen, _)| Arc::ptr_eq(seen, node))
            .flat_map(|(_, keys)| keys.iter().cloned())
            .collect()
    }

    /// Flattened `"<label>.<key>"` entries in dispatch order
    pub fn flat(&self) -> Vec<String> {
        self.events()
            .into_iter()
            .flat_map(|(label, keys)| keys.into_iter().map(move |key| format!("{label}.{key}")))
            .collect()
    }

    pub fn is_empty(&self) -> bool {
        self.events.lock().is_empty()
    }

    pub fn clear(&self) {
        self.events.lock().clear();
    }
}

impl NotificationSink for RecordingSink {
    fn keys_changed(&self, node: &ModelRef, keys: &IndexSet<String>) {
        self.events
            .lock()
            .push((Arc::clone(node), keys.iter().cloned().collect()));
    }
}

/// In-memory reference graph for model-level tests
#[derive(Debug, Default)]
pub struct MapGraph {
    records: RwLock<HashMap<(String, String), ModelRef>>,
    pending: RwLock<HashSet<(String, String)>>,
}

impl MapGraph {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn insert(&self, node: &ModelRef) {
        let key = (
            node.model_name().unwrap_or_default().to_string(),
            node.id().unwrap_or_default().to_string(),
        );
        self.pending.write().remove(&key);
        self.records.write().insert(key, Arc::clone(node));
    }

    pub fn mark_pending(&self, model_name: &str, id: &str) {
        self.pending
            .write()
            .insert((model_name.to_string(), id.to_string()));
    }
}

impl ReferenceGraph for MapGraph {
    fn lookup(&self, model_name: &str, id: &str) -> Lookup {
        let key = (model_name.to_string(), id.to_string());
        if let Some(node) = self.records.read().get(&key) {
            return Lookup::Loaded(Arc::clone(node));
        }
        if self.pending.read().contains(&key) {
            return Lookup::Pending(PendingRecord::new(model_name, id));
        }
        Lookup::Missing
    }
}

/// Bookstore fixture without a store: a graph, a sink and a shared context
#[derive(Debug)]
pub struct Bookstore {
    pub graph: Arc<MapGraph>,
    pub sink: Arc<RecordingSink>,
    pub context: Arc<ModelContext>,
}

impl Bookstore {
    pub fn new() -> Self {
        Self::with_context(|context| context)
    }

    /// Fixture whose context is adjusted by `configure`
    pub fn with_context(configure: impl FnOnce(ModelContext) -> ModelContext) -> Self {
        let graph = MapGraph::new();
        let sink = RecordingSink::new();
        let weak: Weak<dyn ReferenceGraph> = Arc::downgrade(&graph) as Weak<dyn ReferenceGraph>;
        let context = ModelContext::detached(bookstore_registry())
            .with_graph(weak)
            .with_sink(Arc::clone(&sink) as Arc<dyn NotificationSink>);
        Self {
            graph,
            sink,
            context: Arc::new(configure(context)),
        }
    }

    /// Create a record and register it with the graph
    pub fn record(&self, model_name: &str, id: &str, raw: Value) -> ModelRef {
        let identity = ModelIdentity::new(model_name, id);
        let node = if self.context.schema().is_projection(model_name) {
            ModelNode::projection(Arc::clone(&self.context), identity, attrs(raw))
        } else {
            ModelNode::record(Arc::clone(&self.context), identity, attrs(raw))
        };
        self.graph.insert(&node);
        node
    }
}

impl Default for Bookstore {
    fn default() -> Self {
        Self::new()
    }
}

/// Install a fmt subscriber honouring `RUST_LOG`, once per process
pub fn init_tracing() {
    static INIT: OnceCell<()> = OnceCell::new();
    INIT.get_or_init(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .with_test_writer()
            .try_init();
    });
}
