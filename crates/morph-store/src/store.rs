//! Record store
//!
//! Provides [`Store`], the host of lazily-resolved records: an identity map
//! keyed by `(type, id)`, the reference graph the resolver consults, and an
//! independent per-type retrieval path through an [`Adapter`].
//!
//! A projection type has its own identity `(projection, id)` and its own
//! fetches, but its data lives in the record of its base type with the same
//! id. Pushing either one updates that shared record; records created only
//! to back projections stay hidden until their own type is pushed.

use crate::adapter::{Adapter, FindRequest, RecordKind};
use crate::config::StoreConfig;
use crate::error::{StoreError, StoreResult};
use crate::payload::{Payload, ResourceObject};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use futures::future::{BoxFuture, FutureExt, Shared};
use morph_model::{
    AttributeGate, ChangeSet, Lookup, ModelContext, ModelIdentity, ModelNode, ModelRef,
    NoopSink, NotificationSink, PendingRecord, ReferenceGraph,
};
use morph_schema::SchemaRegistry;
use serde_json::{Map, Value};
use std::fmt::{self, Debug, Display, Formatter};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};

/// Identity map key
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RecordKey {
    /// Record type
    pub model_name: String,
    /// Record id
    pub id: String,
}

impl RecordKey {
    /// Create key
    #[inline]
    #[must_use]
    pub fn new(model_name: impl Into<String>, id: impl Into<String>) -> Self {
        Self {
            model_name: model_name.into(),
            id: id.into(),
        }
    }
}

impl Display for RecordKey {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.model_name, self.id)
    }
}

/// Options for [`Store::find_record_with`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FindOptions {
    /// Fetch even when the record is loaded
    pub reload: bool,
}

impl FindOptions {
    /// Options forcing a fetch
    #[inline]
    #[must_use]
    pub fn reload() -> Self {
        Self { reload: true }
    }
}

type SharedFetch = Shared<BoxFuture<'static, StoreResult<ModelRef>>>;

#[derive(Debug)]
struct StoredRecord {
    node: ModelRef,
    /// Insertion order, for snapshots
    order: u64,
    /// False while the record only backs projection views
    resident: bool,
}

struct StoreInner {
    context: Arc<ModelContext>,
    records: DashMap<RecordKey, StoredRecord>,
    in_flight: DashMap<RecordKey, SharedFetch>,
    adapter: Option<Arc<dyn Adapter>>,
    config: StoreConfig,
    sequence: AtomicU64,
}

impl StoreInner {
    fn instantiate(&self, key: &RecordKey, attributes: Map<String, Value>) -> ModelRef {
        let identity = ModelIdentity::new(&key.model_name, &key.id);
        let context = Arc::clone(&self.context);
        if self.context.schema().is_projection(&key.model_name) {
            ModelNode::projection(context, identity, attributes)
        } else {
            ModelNode::record(context, identity, attributes)
        }
    }

    /// Root type whose records hold the data of projection `model_name`
    fn storage_base(&self, model_name: &str) -> Option<String> {
        let schema = self.context.schema();
        let mut base = schema.projection_base(model_name)?;
        while let Some(next) = schema.projection_base(base) {
            base = next;
        }
        Some(base.to_string())
    }

    /// Stored node for `key`, built by `make` when vacant
    ///
    /// Returns the node and whether it was created. Storing a hidden record
    /// as resident moves it to the end of the snapshot order.
    fn upsert(
        &self,
        key: RecordKey,
        resident: bool,
        make: impl FnOnce(&RecordKey) -> ModelRef,
    ) -> (ModelRef, bool) {
        match self.records.entry(key) {
            Entry::Occupied(mut entry) => {
                let stored = entry.get_mut();
                if resident && !stored.resident {
                    stored.resident = true;
                    stored.order = self.sequence.fetch_add(1, Ordering::Relaxed);
                }
                (Arc::clone(&stored.node), false)
            }
            Entry::Vacant(entry) => {
                let node = make(entry.key());
                entry.insert(StoredRecord {
                    node: Arc::clone(&node),
                    order: self.sequence.fetch_add(1, Ordering::Relaxed),
                    resident,
                });
                (node, true)
            }
        }
    }

    fn peek(&self, key: &RecordKey) -> Option<ModelRef> {
        self.records
            .get(key)
            .filter(|stored| stored.resident)
            .map(|stored| Arc::clone(&stored.node))
    }
}

impl ReferenceGraph for StoreInner {
    fn lookup(&self, model_name: &str, id: &str) -> Lookup {
        let key = RecordKey::new(model_name, id);
        if let Some(node) = self.peek(&key) {
            return Lookup::Loaded(node);
        }
        if self.in_flight.contains_key(&key) {
            return Lookup::Pending(PendingRecord::new(model_name, id));
        }
        Lookup::Missing
    }
}

/// Identity map and retrieval path for records
///
/// Cheap to clone; clones share the same records.
///
/// # Example
/// ```
/// use morph_schema::{ModelSchema, NoHooks, SchemaRegistry};
/// use morph_store::Store;
/// use serde_json::json;
/// use std::sync::Arc;
///
/// let schema = SchemaRegistry::builder(NoHooks)
///     .model("book", ModelSchema::new().alias("title", "name"))
///     .build()
///     .unwrap();
/// let store = Store::new(Arc::new(schema));
///
/// let raw = json!({"name": "Dune"}).as_object().cloned().unwrap();
/// let book = store.push("book", "1", raw);
/// assert_eq!(book.get("title").as_str(), Some("Dune"));
/// assert!(store.has_record("book", "1"));
/// ```
#[derive(Clone)]
pub struct Store {
    inner: Arc<StoreInner>,
}

impl Store {
    /// Store without adapter, sink or custom configuration
    #[must_use]
    pub fn new(schema: Arc<SchemaRegistry>) -> Self {
        Self::builder(schema).build()
    }

    /// Start building a store
    #[inline]
    #[must_use]
    pub fn builder(schema: Arc<SchemaRegistry>) -> StoreBuilder {
        StoreBuilder::new(schema)
    }

    /// Context shared by every record of the store
    #[inline]
    #[must_use]
    pub fn context(&self) -> &Arc<ModelContext> {
        &self.inner.context
    }

    /// Schema registry
    #[inline]
    #[must_use]
    pub fn schema(&self) -> &SchemaRegistry {
        self.inner.context.schema()
    }

    /// Store configuration
    #[inline]
    #[must_use]
    pub fn config(&self) -> &StoreConfig {
        &self.inner.config
    }

    /// Kind of record `model_name` instantiates
    #[must_use]
    pub fn record_kind(&self, model_name: &str) -> RecordKind {
        if self.schema().is_projection(model_name) {
            RecordKind::Projection
        } else {
            RecordKind::Model
        }
    }

    /// Create the record for `(model_name, id)` or update the loaded one
    ///
    /// Every push for one identity returns the same node; updates run the
    /// diff engine and notify the sink. A projection push writes the keys it
    /// can see onto the record of its base type, creating that record hidden
    /// if needed.
    pub fn push(&self, model_name: &str, id: &str, attributes: Map<String, Value>) -> ModelRef {
        let key = RecordKey::new(model_name, id);
        match self.inner.storage_base(model_name) {
            Some(base) => self.push_projection(key, RecordKey::new(base, id), attributes),
            None => self.push_record(key, attributes),
        }
    }

    fn push_record(&self, key: RecordKey, attributes: Map<String, Value>) -> ModelRef {
        let mut pending = Some(attributes);
        let (node, created) = self.inner.upsert(key, true, |key| {
            self.inner.instantiate(key, pending.take().unwrap_or_default())
        });

        if created {
            tracing::debug!("Pushed new record {}", node);
        } else if let Some(attributes) = pending {
            tracing::debug!("Pushed update for {}", node);
            node.apply_update(attributes);
        }
        node
    }

    fn push_projection(
        &self,
        key: RecordKey,
        base_key: RecordKey,
        attributes: Map<String, Value>,
    ) -> ModelRef {
        let context = &self.inner.context;
        let mut pending = Some(attributes);
        let (base, _) = self.inner.upsert(base_key, false, |base_key| {
            let mut raw = pending.take().unwrap_or_default();
            AttributeGate::for_projection(context.schema(), &key.model_name).retain_visible(
                context.schema(),
                &key.model_name,
                &mut raw,
            );
            let identity = ModelIdentity::new(&base_key.model_name, &base_key.id);
            ModelNode::record(Arc::clone(context), identity, raw)
        });

        let (view, created) = self.inner.upsert(key, true, |key| {
            let identity = ModelIdentity::new(&key.model_name, &key.id);
            ModelNode::projection_of(Arc::clone(context), identity, &base)
        });
        if created {
            tracing::debug!("Pushed new projection {} over {}", view, base);
        }

        if let Some(attributes) = pending {
            tracing::debug!("Pushed update for {}", view);
            view.apply_update(attributes);
        }
        view
    }

    /// Push one resource
    pub fn push_resource(&self, resource: ResourceObject) -> ModelRef {
        self.push(&resource.model_name, &resource.id, resource.attributes)
    }

    /// Push a document, side-loaded resources first
    ///
    /// Returns the primary records in document order.
    pub fn push_payload(&self, payload: Payload) -> Vec<ModelRef> {
        for resource in payload.included {
            self.push_resource(resource);
        }
        payload
            .data
            .into_vec()
            .into_iter()
            .map(|resource| self.push_resource(resource))
            .collect()
    }

    /// Loaded record, if any
    #[must_use]
    pub fn peek_record(&self, model_name: &str, id: &str) -> Option<ModelRef> {
        self.inner.peek(&RecordKey::new(model_name, id))
    }

    /// Whether `(model_name, id)` is loaded
    #[must_use]
    pub fn has_record(&self, model_name: &str, id: &str) -> bool {
        self.inner.peek(&RecordKey::new(model_name, id)).is_some()
    }

    /// Snapshot of the loaded records of `model_name`, in push order
    ///
    /// Later pushes do not show up in a snapshot already taken.
    #[must_use]
    pub fn peek_all(&self, model_name: &str) -> Vec<ModelRef> {
        let mut records: Vec<(u64, ModelRef)> = self
            .inner
            .records
            .iter()
            .filter(|entry| entry.value().resident && entry.key().model_name == model_name)
            .map(|entry| (entry.value().order, Arc::clone(&entry.value().node)))
            .collect();
        records.sort_by_key(|(order, _)| *order);
        records.into_iter().map(|(_, node)| node).collect()
    }

    /// Number of loaded records
    #[must_use]
    pub fn len(&self) -> usize {
        self.inner
            .records
            .iter()
            .filter(|entry| entry.value().resident)
            .count()
    }

    /// Whether no record is loaded
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drop `(model_name, id)` from the identity map
    ///
    /// Holders keep the old node; a later push creates a new one. A record
    /// still backing live projection views is only hidden, so the views keep
    /// their data.
    pub fn unload_record(&self, model_name: &str, id: &str) -> Option<ModelRef> {
        let removed = match self.inner.records.entry(RecordKey::new(model_name, id)) {
            Entry::Occupied(mut entry) if entry.get().resident => {
                if entry.get().node.projections().is_empty() {
                    Some(entry.remove().node)
                } else {
                    entry.get_mut().resident = false;
                    Some(Arc::clone(&entry.get().node))
                }
            }
            _ => None,
        };
        if let Some(node) = &removed {
            tracing::debug!("Unloaded {}", node);
        }
        removed
    }

    /// Write one attribute of a loaded record
    ///
    /// # Errors
    /// - `StoreError::NotFound` if the record is not loaded
    /// - `StoreError::Model` if the record rejects the write
    pub fn set_attribute(
        &self,
        model_name: &str,
        id: &str,
        key: &str,
        value: Value,
    ) -> StoreResult<ChangeSet> {
        let node = self
            .peek_record(model_name, id)
            .ok_or_else(|| StoreError::not_found(model_name, id))?;
        Ok(node.set(key, value)?)
    }

    /// Loaded record, or fetch it through the adapter
    ///
    /// # Errors
    /// - `StoreError::NoAdapter` if a fetch is needed and none is configured
    /// - `StoreError::Adapter` if the adapter fails
    /// - `StoreError::NotFound` if the response does not hold the record
    pub async fn find_record(&self, model_name: &str, id: &str) -> StoreResult<ModelRef> {
        self.find_record_with(model_name, id, FindOptions::default()).await
    }

    /// [`find_record`](Self::find_record) with options
    ///
    /// # Errors
    /// See [`find_record`](Self::find_record)
    pub async fn find_record_with(
        &self,
        model_name: &str,
        id: &str,
        options: FindOptions,
    ) -> StoreResult<ModelRef> {
        if !options.reload {
            if let Some(node) = self.peek_record(model_name, id) {
                return Ok(node);
            }
        }

        let key = RecordKey::new(model_name, id);
        let fetch = if self.inner.config.coalesce_requests {
            self.inner
                .in_flight
                .entry(key.clone())
                .or_insert_with(|| self.fetch(key, options.reload))
                .clone()
        } else {
            self.fetch(key, options.reload)
        };
        fetch.await
    }

    /// Wait for the record behind a pending reference
    ///
    /// # Errors
    /// See [`find_record`](Self::find_record)
    pub async fn resolve_pending(&self, pending: &PendingRecord) -> StoreResult<ModelRef> {
        let key = RecordKey::new(&pending.model_name, &pending.id);
        let in_flight = self.inner.in_flight.get(&key).map(|fetch| fetch.clone());
        match in_flight {
            Some(fetch) => fetch.await,
            None => self.find_record(&pending.model_name, &pending.id).await,
        }
    }

    fn fetch(&self, key: RecordKey, reload: bool) -> SharedFetch {
        let store = self.clone();
        async move {
            let result = store.load(&key, reload).await;
            if store.inner.config.coalesce_requests {
                store.inner.in_flight.remove(&key);
            }
            match &result {
                Err(err) if err.is_retryable() => {
                    tracing::warn!("Fetch of {} failed, a later find retries: {}", key, err);
                }
                Err(err) => tracing::debug!("Fetch of {} failed: {}", key, err),
                Ok(_) => {}
            }
            result
        }
        .boxed()
        .shared()
    }

    async fn load(&self, key: &RecordKey, reload: bool) -> StoreResult<ModelRef> {
        let adapter = self
            .inner
            .adapter
            .clone()
            .ok_or_else(|| StoreError::NoAdapter(key.model_name.clone()))?;

        let request = FindRequest {
            model_name: key.model_name.clone(),
            id: key.id.clone(),
            kind: self.record_kind(&key.model_name),
            reload,
        };
        tracing::debug!("Fetching {} as {:?}", key, request.kind);

        let payload = adapter
            .find_record(request)
            .await
            .map_err(|err| StoreError::adapter(&key.model_name, &key.id, err.to_string()))?;

        self.push_payload(payload);
        self.peek_record(&key.model_name, &key.id)
            .ok_or_else(|| StoreError::not_found(&key.model_name, &key.id))
    }
}

impl Debug for Store {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("Store")
            .field("records", &self.len())
            .field("in_flight", &self.inner.in_flight.len())
            .field("has_adapter", &self.inner.adapter.is_some())
            .field("config", &self.inner.config)
            .finish()
    }
}

/// Builder for [`Store`]
pub struct StoreBuilder {
    schema: Arc<SchemaRegistry>,
    adapter: Option<Arc<dyn Adapter>>,
    sink: Arc<dyn NotificationSink>,
    config: StoreConfig,
}

impl StoreBuilder {
    fn new(schema: Arc<SchemaRegistry>) -> Self {
        Self {
            schema,
            adapter: None,
            sink: Arc::new(NoopSink),
            config: StoreConfig::default(),
        }
    }

    /// With adapter for `find_record`
    #[must_use]
    pub fn adapter(mut self, adapter: Arc<dyn Adapter>) -> Self {
        self.adapter = Some(adapter);
        self
    }

    /// With notification sink
    #[must_use]
    pub fn sink(mut self, sink: Arc<dyn NotificationSink>) -> Self {
        self.sink = sink;
        self
    }

    /// With configuration
    #[must_use]
    pub fn config(mut self, config: StoreConfig) -> Self {
        self.config = config;
        self
    }

    /// Build the store
    #[must_use]
    pub fn build(self) -> Store {
        let Self {
            schema,
            adapter,
            sink,
            config,
        } = self;

        let inner = Arc::new_cyclic(|weak: &Weak<StoreInner>| {
            let graph: Weak<dyn ReferenceGraph> = weak.clone();
            let context = ModelContext::new(schema, graph, sink, config.model.clone());
            StoreInner {
                context: Arc::new(context),
                records: DashMap::new(),
                in_flight: DashMap::new(),
                adapter,
                config,
                sequence: AtomicU64::new(0),
            }
        });

        Store { inner }
    }
}

impl Debug for StoreBuilder {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("StoreBuilder")
            .field("has_adapter", &self.adapter.is_some())
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapter::{AdapterError, MockAdapter};
    use morph_test_utils::{attrs, bookstore_registry, BOOK, BOOK_EXCERPT};
    use serde_json::json;

    const ID: &str = "isbn:9780439708180";

    fn echo(request: &FindRequest) -> Payload {
        Payload::single(ResourceObject::new(
            request.model_name.clone(),
            request.id.clone(),
            attrs(json!({"name": "Harry Potter"})),
        ))
    }

    #[tokio::test]
    async fn find_record_fetches_model_kind() {
        let mut adapter = MockAdapter::new();
        adapter
            .expect_find_record()
            .withf(|request| {
                request.model_name == BOOK
                    && request.id == ID
                    && request.kind == RecordKind::Model
                    && !request.reload
            })
            .times(1)
            .returning(|request| Ok(echo(&request)));

        let store = Store::builder(bookstore_registry())
            .adapter(Arc::new(adapter))
            .build();
        let book = store.find_record(BOOK, ID).await.unwrap();

        assert_eq!(book.id(), Some(ID));
        assert!(!book.is_projection());
        assert!(Arc::ptr_eq(&book, &store.find_record(BOOK, ID).await.unwrap()));
    }

    #[tokio::test]
    async fn find_record_fetches_projection_kind() {
        let mut adapter = MockAdapter::new();
        adapter
            .expect_find_record()
            .withf(|request| {
                request.model_name == BOOK_EXCERPT && request.kind == RecordKind::Projection
            })
            .times(1)
            .returning(|request| Ok(echo(&request)));

        let store = Store::builder(bookstore_registry())
            .adapter(Arc::new(adapter))
            .build();
        let excerpt = store.find_record(BOOK_EXCERPT, ID).await.unwrap();

        assert!(excerpt.is_projection());
        assert_eq!(excerpt.get("title").as_str(), Some("Harry Potter"));
    }

    #[tokio::test]
    async fn reload_fetches_loaded_records() {
        let mut adapter = MockAdapter::new();
        adapter
            .expect_find_record()
            .withf(|request| request.reload)
            .times(1)
            .returning(|request| {
                Ok(Payload::single(ResourceObject::new(
                    request.model_name,
                    request.id,
                    attrs(json!({"name": "Reloaded"})),
                )))
            });

        let store = Store::builder(bookstore_registry())
            .adapter(Arc::new(adapter))
            .build();
        let book = store.push(BOOK, ID, attrs(json!({"name": "Loaded"})));

        let reloaded = store.find_record_with(BOOK, ID, FindOptions::reload()).await.unwrap();

        assert!(Arc::ptr_eq(&book, &reloaded));
        assert_eq!(book.get("name").as_str(), Some("Reloaded"));
    }

    #[tokio::test]
    async fn adapter_failures_surface_as_store_errors() {
        let mut adapter = MockAdapter::new();
        adapter
            .expect_find_record()
            .times(1)
            .returning(|_| Err(AdapterError::new("503 Service Unavailable")));

        let store = Store::builder(bookstore_registry())
            .adapter(Arc::new(adapter))
            .build();
        let err = store.find_record(BOOK, ID).await.unwrap_err();

        assert_eq!(err, StoreError::adapter(BOOK, ID, "503 Service Unavailable"));
        assert!(!store.has_record(BOOK, ID));
    }

    #[tokio::test]
    async fn retryable_failures_are_fetched_again() {
        let calls = Arc::new(AtomicU64::new(0));
        let seen = Arc::clone(&calls);
        let mut adapter = MockAdapter::new();
        adapter.expect_find_record().times(2).returning(move |request| {
            if seen.fetch_add(1, Ordering::SeqCst) == 0 {
                Err(AdapterError::new("connection reset"))
            } else {
                Ok(echo(&request))
            }
        });

        let store = Store::builder(bookstore_registry())
            .adapter(Arc::new(adapter))
            .build();
        let err = store.find_record(BOOK, ID).await.unwrap_err();
        assert!(err.is_retryable());

        let book = store.find_record(BOOK, ID).await.unwrap();
        assert_eq!(book.get("name").as_str(), Some("Harry Potter"));
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn response_without_the_record_is_not_found() {
        let mut adapter = MockAdapter::new();
        adapter.expect_find_record().returning(|_| {
            Ok(Payload::single(ResourceObject::new(BOOK, "isbn:other", Map::new())))
        });

        let store = Store::builder(bookstore_registry())
            .adapter(Arc::new(adapter))
            .build();
        let err = store.find_record(BOOK, ID).await.unwrap_err();

        assert_eq!(err, StoreError::not_found(BOOK, ID));
        assert!(store.has_record(BOOK, "isbn:other"));
    }

    #[tokio::test]
    async fn find_without_adapter_fails() {
        let store = Store::new(bookstore_registry());
        assert_eq!(
            store.find_record(BOOK, ID).await.unwrap_err(),
            StoreError::NoAdapter(BOOK.to_string())
        );
    }

    #[test]
    fn set_attribute_maps_model_errors() {
        let store = Store::new(bookstore_registry());
        store.push(BOOK, ID, attrs(json!({"name": "Harry Potter"})));

        let err = store.set_attribute(BOOK, ID, "title", json!("x")).unwrap_err();
        assert!(matches!(err, StoreError::Model(_)));

        let err = store.set_attribute(BOOK, "isbn:404", "name", json!("x")).unwrap_err();
        assert_eq!(err, StoreError::not_found(BOOK, "isbn:404"));

        let changes = store.set_attribute(BOOK, ID, "name", json!("Chamber")).unwrap();
        assert_eq!(changes.len(), 1);
    }

    #[test]
    fn record_kind_follows_schema() {
        let store = Store::new(bookstore_registry());
        assert_eq!(store.record_kind(BOOK), RecordKind::Model);
        assert_eq!(store.record_kind(BOOK_EXCERPT), RecordKind::Projection);
        assert_eq!(store.record_kind("author"), RecordKind::Model);
    }
}
