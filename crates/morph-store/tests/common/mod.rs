//! Adapter doubles shared by the store integration tests

#![allow(dead_code)]

use async_trait::async_trait;
use morph_store::{Adapter, AdapterError, FindRequest, Payload, ResourceObject};
use parking_lot::Mutex;
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::Semaphore;

/// Adapter answering from canned attributes once the test opens its gate
#[derive(Debug)]
pub struct GatedAdapter {
    gate: Semaphore,
    calls: AtomicUsize,
    requests: Mutex<Vec<FindRequest>>,
    responses: Mutex<HashMap<(String, String), Map<String, Value>>>,
    failure: Mutex<Option<String>>,
}

impl GatedAdapter {
    /// Adapter whose fetches wait for [`open`](Self::open)
    pub fn closed() -> Arc<Self> {
        Arc::new(Self {
            gate: Semaphore::new(0),
            calls: AtomicUsize::new(0),
            requests: Mutex::new(Vec::new()),
            responses: Mutex::new(HashMap::new()),
            failure: Mutex::new(None),
        })
    }

    /// Adapter whose fetches complete immediately
    pub fn open_gate() -> Arc<Self> {
        let adapter = Self::closed();
        adapter.open(Semaphore::MAX_PERMITS);
        adapter
    }

    /// Attributes returned for `(model_name, id)`
    pub fn respond(&self, model_name: &str, id: &str, attributes: Map<String, Value>) {
        self.responses
            .lock()
            .insert((model_name.to_string(), id.to_string()), attributes);
    }

    /// Fail every later fetch with `message`
    pub fn fail_with(&self, message: &str) {
        *self.failure.lock() = Some(message.to_string());
    }

    /// Let `fetches` waiting fetches through
    pub fn open(&self, fetches: usize) {
        self.gate.add_permits(fetches);
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn requests(&self) -> Vec<FindRequest> {
        self.requests.lock().clone()
    }

    /// Yield until `count` fetches reached the adapter
    pub async fn wait_for_calls(&self, count: usize) {
        while self.calls() < count {
            tokio::task::yield_now().await;
        }
    }
}

#[async_trait]
impl Adapter for GatedAdapter {
    async fn find_record(&self, request: FindRequest) -> Result<Payload, AdapterError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.requests.lock().push(request.clone());

        let _permit = self
            .gate
            .acquire()
            .await
            .map_err(|err| AdapterError::new(err.to_string()))?;

        if let Some(message) = self.failure.lock().clone() {
            return Err(AdapterError::new(message));
        }
        let attributes = self
            .responses
            .lock()
            .get(&(request.model_name.clone(), request.id.clone()))
            .cloned()
            .unwrap_or_default();
        Ok(Payload::single(ResourceObject::new(
            request.model_name,
            request.id,
            attributes,
        )))
    }
}
