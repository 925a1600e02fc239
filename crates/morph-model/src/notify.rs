//! Change notifications
//!
//! Provides [`NotificationSink`], the host callback invoked with the keys
//! that changed on a node, and [`ChangeSet`], the ordered list of
//! notifications produced by one update.

use crate::node::ModelRef;
use indexmap::IndexSet;
use std::sync::Arc;

/// Receiver of "keys changed" callbacks
///
/// Called once per affected node, children before parents, after every node
/// lock has been released.
pub trait NotificationSink: Send + Sync {
    /// Keys of `node` whose resolved value may have changed
    fn keys_changed(&self, node: &ModelRef, keys: &IndexSet<String>);
}

/// Sink that drops every notification
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopSink;

impl NotificationSink for NoopSink {
    fn keys_changed(&self, _node: &ModelRef, _keys: &IndexSet<String>) {}
}

/// Keys reported for one node
#[derive(Debug, Clone)]
pub struct ChangeNotification {
    /// Affected node
    pub node: ModelRef,
    /// Changed keys, canonical keys first, then aliases
    pub keys: IndexSet<String>,
}

/// Ordered notifications from one update
#[derive(Debug, Clone, Default)]
pub struct ChangeSet {
    notifications: Vec<ChangeNotification>,
}

impl ChangeSet {
    /// Create empty change set
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn push(&mut self, node: ModelRef, keys: IndexSet<String>) {
        if !keys.is_empty() {
            self.notifications.push(ChangeNotification { node, keys });
        }
    }

    /// Whether no node reported a change
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.notifications.is_empty()
    }

    /// Number of nodes that reported
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.notifications.len()
    }

    /// Notifications in dispatch order
    pub fn iter(&self) -> impl Iterator<Item = &ChangeNotification> {
        self.notifications.iter()
    }

    /// Keys reported for `node`, if it reported
    #[must_use]
    pub fn keys_for(&self, node: &ModelRef) -> Option<&IndexSet<String>> {
        self.notifications
            .iter()
            .find(|n| Arc::ptr_eq(&n.node, node))
            .map(|n| &n.keys)
    }

    /// Deliver every notification to `sink`
    pub fn dispatch(&self, sink: &dyn NotificationSink) {
        for notification in &self.notifications {
            sink.keys_changed(&notification.node, &notification.keys);
        }
    }
}

impl IntoIterator for ChangeSet {
    type Item = ChangeNotification;
    type IntoIter = std::vec::IntoIter<ChangeNotification>;

    fn into_iter(self) -> Self::IntoIter {
        self.notifications.into_iter()
    }
}
