//! Owner that records hook calls.

use serde_json::{Map, Value};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use crate::service::{DataService, OnDispose, OnInit, OnPrepareContext, Render};

/// Counts renders and lifecycle hooks. Optionally seeds view state in `on_init`
/// and contributes extra template context.
#[derive(Default)]
pub struct RecordingOwner {
    renders: AtomicUsize,
    inits: AtomicUsize,
    disposals: AtomicUsize,
    initial_view: Map<String, Value>,
    context: Map<String, Value>,
    last_context: Mutex<Option<Map<String, Value>>>,
}

impl RecordingOwner {
    /// Owner with no initial view state or extra context.
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Set these view attributes in `on_init`.
    pub fn with_initial_view(mut self, view: Value) -> Self {
        if let Value::Object(map) = view {
            self.initial_view = map;
        }
        self
    }

    /// Contribute these entries from `prepare_context`.
    pub fn with_context(mut self, context: Value) -> Self {
        if let Value::Object(map) = context {
            self.context = map;
        }
        self
    }

    /// Number of renders so far.
    pub fn renders(&self) -> usize {
        self.renders.load(Ordering::SeqCst)
    }

    /// Number of `on_init` calls.
    pub fn inits(&self) -> usize {
        self.inits.load(Ordering::SeqCst)
    }

    /// Number of `on_dispose` calls.
    pub fn disposals(&self) -> usize {
        self.disposals.load(Ordering::SeqCst)
    }

    /// Context prepared by the most recent render.
    pub fn last_context(&self) -> Option<Map<String, Value>> {
        self.last_context.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }
}

impl Render for RecordingOwner {
    fn render(&self, service: &DataService) {
        self.renders.fetch_add(1, Ordering::SeqCst);
        let context = service.prepare();
        *self.last_context.lock().unwrap_or_else(PoisonError::into_inner) = Some(context);
    }
}

impl OnInit for RecordingOwner {
    fn on_init(&self, service: &DataService) {
        self.inits.fetch_add(1, Ordering::SeqCst);
        service.view_state().set_all(self.initial_view.clone());
    }
}

impl OnPrepareContext for RecordingOwner {
    fn prepare_context(&self, _service: &DataService) -> Map<String, Value> {
        self.context.clone()
    }
}

impl OnDispose for RecordingOwner {
    fn on_dispose(&self) {
        self.disposals.fetch_add(1, Ordering::SeqCst);
    }
}
