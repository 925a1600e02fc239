//! Attribute resolution
//!
//! Turns one raw attribute into a [`Resolved`] value: alias chase, explicit
//! value or default, transform, then classification as reference, reference
//! array, nested model, sequence or scalar.

use crate::context::ModelContext;
use crate::graph::Lookup;
use crate::node::ModelNode;
use crate::value::{ReferenceArray, Resolved};
use morph_schema::{AttributeReference, NestedModelSpec};
use serde_json::{Map, Value};
use std::borrow::Cow;
use std::sync::Arc;

/// Resolved value plus whether it may be cached
#[derive(Debug)]
pub(crate) struct Resolution {
    pub(crate) value: Resolved,
    /// False when a reference was missing or still in flight
    pub(crate) settled: bool,
}

impl Resolution {
    fn settled(value: Resolved) -> Self {
        Self {
            value,
            settled: true,
        }
    }

    fn unsettled(value: Resolved) -> Self {
        Self {
            value,
            settled: false,
        }
    }
}

/// Resolve canonical `key` of a `model_name` node from its raw tree
pub(crate) fn resolve_attribute(
    ctx: &Arc<ModelContext>,
    model_name: &str,
    key: &str,
    raw: &Map<String, Value>,
) -> Resolution {
    let Some(explicit) = raw.get(key) else {
        // Defaults are returned verbatim: no transform, no classification
        return match ctx.schema().default_value(model_name, key) {
            Some(default) => Resolution::settled(Resolved::Value(default.clone())),
            None => Resolution::settled(Resolved::Absent),
        };
    };

    let candidate = candidate(ctx, model_name, key, explicit);
    classify_attribute(ctx, key, &candidate)
}

/// Explicit raw value after the declared transform, if any
pub(crate) fn candidate<'a>(
    ctx: &ModelContext,
    model_name: &str,
    key: &str,
    explicit: &'a Value,
) -> Cow<'a, Value> {
    match ctx.schema().transform(model_name, key) {
        Some(transform) => Cow::Owned(transform(explicit)),
        None => Cow::Borrowed(explicit),
    }
}

/// Classification of a top-level attribute value
fn classify_attribute(ctx: &Arc<ModelContext>, key: &str, value: &Value) -> Resolution {
    let hooks = ctx.schema().hooks();

    if let Some(reference) = hooks.compute_attribute_reference(key, value) {
        return resolve_reference(ctx, &reference);
    }
    if let Some(elements) = reference_elements(ctx, key, value) {
        let array = ReferenceArray::filled(elements.items, elements.settled);
        return Resolution::settled(Resolved::References(array));
    }
    classify_structure(ctx, key, value)
}

/// Nested model, sequence or scalar
fn classify_structure(ctx: &Arc<ModelContext>, key: &str, value: &Value) -> Resolution {
    if let Some(spec) = nested_spec(ctx, key, value) {
        return Resolution::settled(Resolved::Nested(ModelNode::nested(Arc::clone(ctx), spec)));
    }

    if let Value::Array(items) = value {
        let mut settled = true;
        let elements = items
            .iter()
            .map(|item| {
                let resolution = classify_element(ctx, key, item);
                settled &= resolution.settled;
                resolution.value
            })
            .collect();
        return Resolution {
            value: Resolved::List(elements),
            settled,
        };
    }

    Resolution::settled(Resolved::Value(value.clone()))
}

/// Sequence element: reference, nested model, nested sequence or scalar
fn classify_element(ctx: &Arc<ModelContext>, key: &str, value: &Value) -> Resolution {
    match ctx.schema().hooks().compute_attribute_reference(key, value) {
        Some(reference) => resolve_reference(ctx, &reference),
        None => classify_structure(ctx, key, value),
    }
}

fn resolve_reference(ctx: &ModelContext, reference: &AttributeReference) -> Resolution {
    match ctx.lookup(reference) {
        Lookup::Loaded(node) => Resolution::settled(Resolved::Record(node)),
        Lookup::Pending(pending) => Resolution::unsettled(Resolved::Pending(pending)),
        Lookup::Missing => {
            tracing::debug!("Unresolved reference: {}", reference);
            Resolution::unsettled(Resolved::Absent)
        }
    }
}

/// Nested model spec when `value` is a mapping the hooks accept
pub(crate) fn nested_spec(ctx: &ModelContext, key: &str, value: &Value) -> Option<NestedModelSpec> {
    if !value.is_object() {
        return None;
    }
    ctx.schema().hooks().compute_nested_model(key, value)
}

/// Nested model spec when `value` classifies as a nested model at the top level
pub(crate) fn nested_attribute(ctx: &ModelContext, key: &str, value: &Value) -> Option<NestedModelSpec> {
    let hooks = ctx.schema().hooks();
    if hooks.compute_attribute_reference(key, value).is_some() {
        return None;
    }
    if hooks.is_attribute_array_reference(key) && (value.is_array() || value.is_null()) {
        return None;
    }
    nested_spec(ctx, key, value)
}

/// Resolved elements of a reference array
#[derive(Debug)]
pub(crate) struct Elements {
    pub(crate) items: Vec<Resolved>,
    /// False when an element was missing or still in flight
    pub(crate) settled: bool,
}

/// Elements of a reference array when `key` is flagged and `value` is a sequence or null
///
/// `null` yields an empty array. Missing references are left out.
pub(crate) fn reference_elements(ctx: &Arc<ModelContext>, key: &str, value: &Value) -> Option<Elements> {
    let hooks = ctx.schema().hooks();
    if !hooks.is_attribute_array_reference(key) {
        return None;
    }
    if hooks.compute_attribute_reference(key, value).is_some() {
        return None;
    }

    let items = match value {
        Value::Null => {
            return Some(Elements {
                items: Vec::new(),
                settled: true,
            })
        }
        Value::Array(items) => items,
        _ => return None,
    };

    let mut settled = true;
    let items = items
        .iter()
        .map(|item| {
            let resolution = classify_element(ctx, key, item);
            settled &= resolution.settled;
            resolution.value
        })
        .filter(|resolved| !resolved.is_absent())
        .collect();
    Some(Elements {
        items,
        settled: settled || ctx.config().cache_pending_references,
    })
}

/// Refill a cached reference array whose elements were not all resolved
pub(crate) fn refresh_references(
    ctx: &Arc<ModelContext>,
    model_name: &str,
    key: &str,
    raw: &Map<String, Value>,
    array: &ReferenceArray,
) {
    let Some(explicit) = raw.get(key) else {
        return;
    };
    let candidate = candidate(ctx, model_name, key, explicit);
    if let Some(elements) = reference_elements(ctx, key, &candidate) {
        tracing::trace!("Refilled reference array {}", key);
        array.refill(elements.items, elements.settled);
    }
}
