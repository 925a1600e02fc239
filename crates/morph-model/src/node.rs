//! Model nodes
//!
//! Provides [`ModelNode`], the single generic record type. A node owns its
//! raw attribute tree and a lazily-populated cache of resolved values; it is
//! shared as [`ModelRef`] so that every push for one identity mutates the
//! same instance.
//!
//! A projection view owns no data: it reads and writes through the record of
//! its base type with the same id, behind its [`AttributeGate`].

use crate::context::ModelContext;
use crate::diff;
use crate::error::{ModelError, ModelResult};
use crate::identity::ModelIdentity;
use crate::notify::ChangeSet;
use crate::projection::AttributeGate;
use crate::resolver;
use crate::value::Resolved;
use morph_schema::NestedModelSpec;
use parking_lot::{Mutex, RwLock};
use serde_json::{Map, Value};
use std::collections::{HashMap, HashSet};
use std::fmt::{self, Debug, Display, Formatter};
use std::sync::{Arc, Weak};

/// Shared handle on a node
pub type ModelRef = Arc<ModelNode>;

/// What a node stands for
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NodeKind {
    /// Top-level record with network identity
    Record,
    /// Sub-record owned by a parent's cache entry
    Nested,
    /// Read-limited view over a base type
    Projection(AttributeGate),
}

/// Mutable part of a node
#[derive(Debug, Default)]
pub(crate) struct NodeState {
    pub(crate) raw: Map<String, Value>,
    /// Canonical key -> resolved value; an entry exists only after a read
    pub(crate) cache: HashMap<String, Resolved>,
    /// Aliases read on this node
    pub(crate) observed_aliases: HashSet<String>,
}

/// Generic record interpreting an arbitrary attribute tree at read time
pub struct ModelNode {
    identity: ModelIdentity,
    kind: NodeKind,
    context: Arc<ModelContext>,
    /// Record holding the data of a projection view
    base: Option<ModelRef>,
    /// Projection views reading through this record
    views: Mutex<Vec<Weak<ModelNode>>>,
    pub(crate) state: RwLock<NodeState>,
}

impl ModelNode {
    fn build(
        context: Arc<ModelContext>,
        identity: ModelIdentity,
        kind: NodeKind,
        raw: Map<String, Value>,
    ) -> ModelRef {
        Self::build_over(context, identity, kind, raw, None)
    }

    fn build_over(
        context: Arc<ModelContext>,
        identity: ModelIdentity,
        kind: NodeKind,
        raw: Map<String, Value>,
        base: Option<ModelRef>,
    ) -> ModelRef {
        Arc::new(Self {
            identity,
            kind,
            context,
            base,
            views: Mutex::new(Vec::new()),
            state: RwLock::new(NodeState {
                raw,
                ..NodeState::default()
            }),
        })
    }

    /// Create top-level record
    #[must_use]
    pub fn record(
        context: Arc<ModelContext>,
        identity: ModelIdentity,
        raw: Map<String, Value>,
    ) -> ModelRef {
        Self::build(context, identity, NodeKind::Record, raw)
    }

    /// Create projection record with its own data, gated by its type's allow-list
    ///
    /// For projections whose base record is unknown; see
    /// [`projection_of`](Self::projection_of).
    #[must_use]
    pub fn projection(
        context: Arc<ModelContext>,
        identity: ModelIdentity,
        raw: Map<String, Value>,
    ) -> ModelRef {
        let gate = Self::gate_for(&context, &identity);
        Self::build(context, identity, NodeKind::Projection(gate), raw)
    }

    /// Create projection view over `base`, the record of its base type with the same id
    ///
    /// Reads, writes and updates of the view go to `base`; changes to
    /// `base` are reported for the view as well, filtered by its gate.
    #[must_use]
    pub fn projection_of(
        context: Arc<ModelContext>,
        identity: ModelIdentity,
        base: &ModelRef,
    ) -> ModelRef {
        let base = base.base.clone().unwrap_or_else(|| Arc::clone(base));
        let gate = Self::gate_for(&context, &identity);
        let view = Self::build_over(
            context,
            identity,
            NodeKind::Projection(gate),
            Map::new(),
            Some(Arc::clone(&base)),
        );

        let mut views = base.views.lock();
        views.retain(|view| view.strong_count() > 0);
        views.push(Arc::downgrade(&view));
        drop(views);

        tracing::trace!("Attached {} to {}", view, base);
        view
    }

    fn gate_for(context: &ModelContext, identity: &ModelIdentity) -> AttributeGate {
        identity
            .model_name
            .as_deref()
            .map_or_else(AttributeGate::open, |name| {
                AttributeGate::for_projection(context.schema(), name)
            })
    }

    pub(crate) fn nested(context: Arc<ModelContext>, spec: NestedModelSpec) -> ModelRef {
        let identity = ModelIdentity::partial(spec.model_name, spec.id);
        Self::build(context, identity, NodeKind::Nested, spec.attributes)
    }

    /// Identity
    #[inline]
    #[must_use]
    pub fn identity(&self) -> &ModelIdentity {
        &self.identity
    }

    /// Type name
    #[inline]
    #[must_use]
    pub fn model_name(&self) -> Option<&str> {
        self.identity.model_name.as_deref()
    }

    /// Identifier
    #[inline]
    #[must_use]
    pub fn id(&self) -> Option<&str> {
        self.identity.id.as_deref()
    }

    /// Node kind
    #[inline]
    #[must_use]
    pub fn kind(&self) -> &NodeKind {
        &self.kind
    }

    /// Whether this is a projection record
    #[inline]
    #[must_use]
    pub fn is_projection(&self) -> bool {
        matches!(self.kind, NodeKind::Projection(_))
    }

    /// Whether this is a nested model
    #[inline]
    #[must_use]
    pub fn is_nested(&self) -> bool {
        matches!(self.kind, NodeKind::Nested)
    }

    /// Shared context
    #[inline]
    #[must_use]
    pub fn context(&self) -> &Arc<ModelContext> {
        &self.context
    }

    /// Record a projection view reads through
    #[inline]
    #[must_use]
    pub fn base(&self) -> Option<&ModelRef> {
        self.base.as_ref()
    }

    /// Live projection views reading through this record
    #[must_use]
    pub fn projections(&self) -> Vec<ModelRef> {
        self.views.lock().iter().filter_map(Weak::upgrade).collect()
    }

    /// Projection gate, if any
    #[must_use]
    pub fn gate(&self) -> Option<&AttributeGate> {
        match &self.kind {
            NodeKind::Projection(gate) => Some(gate),
            _ => None,
        }
    }

    /// Name used for schema lookups; untyped nested models match nothing
    pub(crate) fn schema_name(&self) -> &str {
        self.model_name().unwrap_or_default()
    }

    pub(crate) fn admits(&self, key: &str) -> bool {
        self.gate().map_or(true, |gate| gate.admits(key))
    }

    /// Whether a nested model spec still describes this node
    pub(crate) fn describes(&self, spec: &NestedModelSpec) -> bool {
        self.identity.model_name == spec.model_name && self.identity.id == spec.id
    }

    /// Resolve `key`
    ///
    /// Never fails: an absent attribute without default, a missing
    /// reference and a key hidden by a projection all read as
    /// [`Resolved::Absent`].
    #[must_use]
    pub fn get(&self, key: &str) -> Resolved {
        if !self.admits(key) {
            return Resolved::Absent;
        }

        let schema = self.context.schema();
        let model_name = self.schema_name();
        let canonical = schema.canonical_key(model_name, key);
        let is_alias = canonical != key;

        if let Some(base) = &self.base {
            if is_alias {
                self.state.write().observed_aliases.insert(key.to_string());
            }
            return base.get(canonical);
        }

        {
            let state = self.state.read();
            let observed = !is_alias || state.observed_aliases.contains(key);
            if let Some(hit) = state.cache.get(canonical) {
                if observed && !hit.needs_refresh() {
                    return hit.clone();
                }
            }
        }

        let mut state = self.state.write();
        if is_alias {
            state.observed_aliases.insert(key.to_string());
        }
        if let Some(hit) = state.cache.get(canonical) {
            if let Resolved::References(array) = hit {
                if !array.is_settled() {
                    resolver::refresh_references(
                        &self.context,
                        model_name,
                        canonical,
                        &state.raw,
                        array,
                    );
                }
            }
            return hit.clone();
        }

        tracing::trace!("Cache miss: {}.{}", self, canonical);
        let resolution = resolver::resolve_attribute(&self.context, model_name, canonical, &state.raw);
        let cacheable = resolution.settled
            || self.context.config().cache_pending_references
            || matches!(resolution.value, Resolved::References(_));
        if cacheable {
            state
                .cache
                .insert(canonical.to_string(), resolution.value.clone());
        }
        resolution.value
    }

    /// Resolve a dotted path through nested models, references and plain data
    ///
    /// Numeric segments index into sequences.
    #[must_use]
    pub fn get_path(&self, path: &str) -> Resolved {
        let mut segments = path.split('.');
        let mut current = match segments.next() {
            Some(first) => self.get(first),
            None => return Resolved::Absent,
        };

        for segment in segments {
            let next = match &current {
                Resolved::Record(node) | Resolved::Nested(node) => node.get(segment),
                Resolved::Value(Value::Object(map)) => {
                    map.get(segment).cloned().map_or(Resolved::Absent, Resolved::Value)
                }
                Resolved::Value(Value::Array(items)) => segment
                    .parse::<usize>()
                    .ok()
                    .and_then(|i| items.get(i).cloned())
                    .map_or(Resolved::Absent, Resolved::Value),
                Resolved::List(items) => segment
                    .parse::<usize>()
                    .ok()
                    .and_then(|i| items.get(i).cloned())
                    .unwrap_or(Resolved::Absent),
                Resolved::References(array) => segment
                    .parse::<usize>()
                    .ok()
                    .and_then(|i| array.get(i))
                    .unwrap_or(Resolved::Absent),
                _ => Resolved::Absent,
            };
            if next.is_absent() {
                return next;
            }
            current = next;
        }
        current
    }

    /// Snapshot of the raw attribute tree
    ///
    /// A projection view returns the keys of its base record it can see.
    #[must_use]
    pub fn raw(&self) -> Map<String, Value> {
        let Some(base) = &self.base else {
            return self.state.read().raw.clone();
        };
        let mut raw = base.raw();
        if let Some(visible) = self.visible_keys() {
            raw.retain(|key, _| visible.contains(key.as_str()));
        }
        raw
    }

    /// Raw value stored under `key`
    #[must_use]
    pub fn raw_value(&self, key: &str) -> Option<Value> {
        match &self.base {
            Some(base) if self.admits(key) => base.raw_value(self.canonical(key)),
            Some(_) => None,
            None => self.state.read().raw.get(key).cloned(),
        }
    }

    /// Whether `key` currently has a cache entry
    #[must_use]
    pub fn is_materialized(&self, key: &str) -> bool {
        let canonical = self.canonical(key);
        match &self.base {
            Some(base) => base.is_materialized(canonical),
            None => self.state.read().cache.contains_key(canonical),
        }
    }

    /// Write `value` under `key` and notify
    ///
    /// # Errors
    /// - `ModelError::AttributeNotVisible` if a projection hides `key`
    /// - `ModelError::AliasReadOnly` if `key` is an alias
    pub fn set(self: &Arc<Self>, key: &str, value: Value) -> ModelResult<ChangeSet> {
        if !self.admits(key) {
            return Err(ModelError::not_visible(key, self.schema_name()));
        }
        let schema = self.context.schema();
        if let Some(target) = schema.alias_target(self.schema_name(), key) {
            return Err(ModelError::alias_read_only(key, target, self.schema_name(), &value));
        }
        if let Some(base) = &self.base {
            return base.set(key, value);
        }

        let mut changes = ChangeSet::new();
        diff::apply_key(self, key, value, &mut changes);
        changes.dispatch(self.context.sink());
        Ok(changes)
    }

    /// Replace the raw tree with `raw` and notify
    ///
    /// Returns the notifications dispatched, children before parents. A
    /// projection view writes the keys of `raw` it can see onto its base
    /// record; every other base key stays in place.
    pub fn apply_update(self: &Arc<Self>, raw: Map<String, Value>) -> ChangeSet {
        if let Some(base) = &self.base {
            let merged = self.merge_visible(base.raw(), raw);
            return base.apply_update(merged);
        }

        let mut changes = ChangeSet::new();
        diff::apply_update(self, raw, &mut changes);
        changes.dispatch(self.context.sink());
        changes
    }

    fn canonical<'a>(&'a self, key: &'a str) -> &'a str {
        self.context.schema().canonical_key(self.schema_name(), key)
    }

    /// Canonical keys behind the gate's allow-list; `None` when every key is visible
    fn visible_keys(&self) -> Option<HashSet<&str>> {
        self.gate()?.canonical_keys(self.context.schema(), self.schema_name())
    }

    /// Keys of `incoming` the view can see overwrite those of `current`
    fn merge_visible(
        &self,
        mut current: Map<String, Value>,
        incoming: Map<String, Value>,
    ) -> Map<String, Value> {
        let visible = self.visible_keys();
        current.extend(incoming.into_iter().filter(|(key, _)| {
            visible
                .as_ref()
                .map_or(true, |visible| visible.contains(key.as_str()))
        }));
        current
    }
}

impl Display for ModelNode {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        let label = match self.kind {
            NodeKind::Record => "Model",
            NodeKind::Nested => "Nested",
            NodeKind::Projection(_) => "Projection",
        };
        write!(f, "<{}:{}>", label, self.identity)
    }
}

impl Debug for ModelNode {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("ModelNode")
            .field("identity", &self.identity)
            .field("kind", &self.kind)
            .finish_non_exhaustive()
    }
}
