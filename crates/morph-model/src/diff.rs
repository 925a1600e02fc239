//! Change detection
//!
//! Compares a node's raw tree with an incoming one, settles the node cache
//! for every changed key and records which keys each node reports.
//!
//! A key is changed when it is present in only one tree, when either
//! version is an object or array, or when two scalars differ. Structured
//! values are always changed: they are not compared deeply.

use crate::config::AliasNotification;
use crate::node::{ModelNode, ModelRef, NodeKind, NodeState};
use crate::notify::ChangeSet;
use crate::resolver;
use crate::value::Resolved;
use indexmap::IndexSet;
use serde_json::{Map, Value};
use std::sync::Arc;

/// Whether a key's raw value changed between two trees
#[must_use]
pub fn is_changed(old: Option<&Value>, new: Option<&Value>) -> bool {
    match (old, new) {
        (None, None) => false,
        (Some(old), Some(new)) => is_structured(old) || is_structured(new) || old != new,
        _ => true,
    }
}

#[inline]
fn is_structured(value: &Value) -> bool {
    value.is_object() || value.is_array()
}

/// Replace the whole raw tree of `node`
pub(crate) fn apply_update(node: &ModelRef, new_raw: Map<String, Value>, changes: &mut ChangeSet) {
    let (changed, reported) = {
        let mut guard = node.state.write();
        let state = &mut *guard;

        let keys: IndexSet<String> = state.raw.keys().chain(new_raw.keys()).cloned().collect();
        let mut changed = IndexSet::new();
        for key in keys {
            let old = state.raw.get(&key).cloned();
            if settle_key(node, state, &key, old.as_ref(), new_raw.get(&key), changes) {
                changed.insert(key);
            }
        }

        state.raw = new_raw;
        let reported = report(node, state, &changed);
        (changed, reported)
    };

    if !reported.is_empty() {
        tracing::debug!("{} changed: {:?}", node, reported);
    }
    changes.push(Arc::clone(node), reported);
    report_views(node, &changed, changes);
}

/// Replace the raw value of one key of `node`
pub(crate) fn apply_key(node: &ModelRef, key: &str, value: Value, changes: &mut ChangeSet) {
    let (changed, reported) = {
        let mut guard = node.state.write();
        let state = &mut *guard;

        let old = state.raw.get(key).cloned();
        let mut changed = IndexSet::new();
        if settle_key(node, state, key, old.as_ref(), Some(&value), changes) {
            changed.insert(key.to_string());
        }

        state.raw.insert(key.to_string(), value);
        let reported = report(node, state, &changed);
        (changed, reported)
    };

    if !reported.is_empty() {
        tracing::debug!("{} set: {:?}", node, reported);
    }
    changes.push(Arc::clone(node), reported);
    report_views(node, &changed, changes);
}

/// Settle the cache entry for `key`; true when `node` reports the key
fn settle_key(
    node: &ModelNode,
    state: &mut NodeState,
    key: &str,
    old: Option<&Value>,
    new: Option<&Value>,
    changes: &mut ChangeSet,
) -> bool {
    if !is_changed(old, new) {
        return false;
    }

    let ctx = node.context();
    let model_name = node.schema_name();

    match state.cache.remove(key) {
        Some(Resolved::Nested(child)) => {
            let spec = new.and_then(|explicit| {
                let candidate = resolver::candidate(ctx, model_name, key, explicit);
                resolver::nested_attribute(ctx, key, &candidate)
            });
            match spec {
                Some(spec) if child.describes(&spec) => {
                    apply_update(&child, spec.attributes, changes);
                    state.cache.insert(key.to_string(), Resolved::Nested(child));
                    return false;
                }
                _ => tracing::trace!("Evicted nested model {} from {}.{}", child, node, key),
            }
        }
        Some(Resolved::References(array)) => {
            let elements = new.and_then(|explicit| {
                let candidate = resolver::candidate(ctx, model_name, key, explicit);
                resolver::reference_elements(ctx, key, &candidate)
            });
            match elements {
                Some(elements) => {
                    array.refill(elements.items, elements.settled);
                    state.cache.insert(key.to_string(), Resolved::References(array));
                }
                None => tracing::trace!("Evicted reference array {}.{}", node, key),
            }
        }
        Some(_) => tracing::trace!("Evicted {}.{}", node, key),
        None => {}
    }

    true
}

/// Changed canonical keys plus their aliases, filtered through a projection gate
fn report(node: &ModelNode, state: &NodeState, changed: &IndexSet<String>) -> IndexSet<String> {
    let schema = node.context().schema();
    let policy = node.context().config().alias_notification;

    let mut keys = changed.clone();
    for key in changed {
        for alias in schema.aliases_for(node.schema_name(), key) {
            if policy == AliasNotification::Always || state.observed_aliases.contains(alias) {
                keys.insert(alias.clone());
            }
        }
    }

    if let NodeKind::Projection(gate) = node.kind() {
        gate.filter(&mut keys);
    }
    keys
}

/// Report the canonical keys changed on a base record for each of its projection views
fn report_views(node: &ModelNode, changed: &IndexSet<String>, changes: &mut ChangeSet) {
    if changed.is_empty() {
        return;
    }
    for view in node.projections() {
        let keys = report(&view, &view.state.read(), changed);
        changes.push(view, keys);
    }
}
