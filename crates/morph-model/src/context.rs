//! Shared context of a node tree
//!
//! Provides [`ModelContext`]: the schema registry, a weak handle on the
//! host's reference graph, the notification sink and the model config.
//! Every node created by one store shares one context.

use crate::config::ModelConfig;
use crate::graph::{EmptyGraph, Lookup, ReferenceGraph};
use crate::notify::{NoopSink, NotificationSink};
use morph_schema::{AttributeReference, SchemaRegistry};
use std::fmt::{self, Debug, Formatter};
use std::sync::{Arc, Weak};

/// Collaborators consulted while resolving and diffing
pub struct ModelContext {
    schema: Arc<SchemaRegistry>,
    graph: Weak<dyn ReferenceGraph>,
    sink: Arc<dyn NotificationSink>,
    config: ModelConfig,
}

impl ModelContext {
    /// Create context
    ///
    /// `graph` is held weakly: the host owns both the graph and the nodes.
    #[must_use]
    pub fn new(
        schema: Arc<SchemaRegistry>,
        graph: Weak<dyn ReferenceGraph>,
        sink: Arc<dyn NotificationSink>,
        config: ModelConfig,
    ) -> Self {
        Self {
            schema,
            graph,
            sink,
            config,
        }
    }

    /// Context without a reference graph or sink
    #[must_use]
    pub fn detached(schema: Arc<SchemaRegistry>) -> Self {
        let graph: Weak<dyn ReferenceGraph> = Weak::<EmptyGraph>::new();
        Self::new(schema, graph, Arc::new(NoopSink), ModelConfig::default())
    }

    /// With notification sink
    #[inline]
    #[must_use]
    pub fn with_sink(mut self, sink: Arc<dyn NotificationSink>) -> Self {
        self.sink = sink;
        self
    }

    /// With reference graph
    #[inline]
    #[must_use]
    pub fn with_graph(mut self, graph: Weak<dyn ReferenceGraph>) -> Self {
        self.graph = graph;
        self
    }

    /// With model configuration
    #[inline]
    #[must_use]
    pub fn with_config(mut self, config: ModelConfig) -> Self {
        self.config = config;
        self
    }

    /// Schema registry
    #[inline]
    #[must_use]
    pub fn schema(&self) -> &SchemaRegistry {
        &self.schema
    }

    /// Shared handle on the schema registry
    #[inline]
    #[must_use]
    pub fn schema_handle(&self) -> Arc<SchemaRegistry> {
        Arc::clone(&self.schema)
    }

    /// Notification sink
    #[inline]
    #[must_use]
    pub fn sink(&self) -> &dyn NotificationSink {
        self.sink.as_ref()
    }

    /// Model configuration
    #[inline]
    #[must_use]
    pub fn config(&self) -> &ModelConfig {
        &self.config
    }

    /// Resolve `reference` through the graph
    ///
    /// A dropped graph knows no records.
    #[must_use]
    pub fn lookup(&self, reference: &AttributeReference) -> Lookup {
        match self.graph.upgrade() {
            Some(graph) => graph.lookup(&reference.model_name, &reference.id),
            None => Lookup::Missing,
        }
    }
}

impl Debug for ModelContext {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("ModelContext")
            .field("schema", &self.schema)
            .field("graph_alive", &(self.graph.strong_count() > 0))
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}
