//! The per-owner data service.
//!
//! A [`DataService`] is created for one owner from its data model declarations. It
//! parses them into alias specs, fetches every root alias, stores results, and keeps
//! them current: when a watched property of a stored entity changes, dependent
//! aliases re-fetch, and the owner re-renders after each store or clear.
//!
//! # Lifecycle
//!
//! 1. [`DataService::builder`] collects the declarations, the owner's bound model
//!    and its initial view state.
//! 2. [`DataServiceBuilder::initialize`] runs the owner's `on_init`, parses the
//!    declarations (returning every configuration problem at once), then fetches the
//!    dependents of `model` and `view` followed by every alias with no parent.
//! 3. Deferred fetches are queued. [`DataService::settle`] drives them, and the
//!    fetches they trigger, to completion.
//! 4. [`DataService::dispose`] releases private views and listeners.
//!
//! # Example
//!
//! ```rust,ignore
//! use irrigation_cli::config::DataModel;
//! use irrigation_cli::service::DataService;
//! use serde_json::json;
//!
//! let service = DataService::builder(registry)
//!     .view_state(json!({"page": 1}))
//!     .data_model(
//!         DataModel::new("moisture")
//!             .collection_type("moisture")
//!             .depends_on("view:page")
//!             .criteria_fn(|s| json!({"pagination": {"page": s.view_state().get("page")}})),
//!     )
//!     .initialize(owner)?;
//! service.settle().await;
//!
//! service.view_state().set("page", 2); // re-fetches "moisture"
//! service.settle().await;
//! ```

mod orchestrator;
pub mod owner;
pub mod store;

pub use owner::{OnDispose, OnInit, OnPrepareContext, Owner, Render};
pub use store::{Fetched, ResultStore};

use dashmap::DashMap;
use futures::StreamExt;
use futures::future::BoxFuture;
use futures::stream::FuturesUnordered;
use serde_json::{Map, Value};
use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, OnceLock, Weak};
use tokio::sync::mpsc;

use crate::cache::{CacheRegistry, MasterCache, PrivateView};
use crate::config::DataModel;
use crate::constants::{MODEL_ALIAS, VIEW_ALIAS};
use crate::core::{DataError, DataResult, Entity, EventHub, Subscription};
use crate::resolver::{ParsedAliases, parse_data_models};

/// Notification emitted by a data service.
#[derive(Debug, Clone)]
pub enum ServiceEvent {
    /// A value was stored for an alias.
    Fetched {
        /// Alias that was stored.
        alias: String,
        /// Stored value.
        value: Fetched,
    },
    /// A fetch attempt for an alias failed.
    FetchError {
        /// Alias whose fetch failed.
        alias: String,
        /// The failure.
        error: DataError,
    },
}

/// Topic emitted after each successful store of `alias`.
pub fn fetched_topic(alias: &str) -> String {
    format!("fetched:{alias}")
}

/// Topic emitted when a fetch of `alias` fails.
pub fn fetch_error_topic(alias: &str) -> String {
    format!("fetchError:{alias}")
}

/// Options passed to fetch strategies and custom fetchers.
#[derive(Debug, Clone, Default)]
pub struct FetchOptions {
    /// Re-request every id even in pull mode.
    pub force_fetch: bool,
    /// Skip the render that normally follows a store or clear.
    pub no_render: bool,
    /// The alias's private view, filled in by the orchestrator.
    pub private_view: Option<Arc<PrivateView>>,
}

impl FetchOptions {
    /// Options for a forced fetch.
    pub fn forced() -> Self {
        Self {
            force_fetch: true,
            ..Self::default()
        }
    }
}

/// Result of invoking a fetch strategy.
pub enum FetchOutcome {
    /// Available now. `None` counts as absent input and clears the alias.
    Ready(Option<Fetched>),
    /// Completes later; applied by [`DataService::settle`].
    Deferred(BoxFuture<'static, DataResult<Option<Fetched>>>),
}

impl fmt::Debug for FetchOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FetchOutcome::Ready(value) => f.debug_tuple("Ready").field(value).finish(),
            FetchOutcome::Deferred(_) => f.write_str("Deferred(..)"),
        }
    }
}

/// A deferred fetch waiting to be driven by `settle`.
struct PendingFetch {
    alias: String,
    generation: u64,
    options: FetchOptions,
    future: BoxFuture<'static, DataResult<Option<Fetched>>>,
}

type Completion = (String, u64, FetchOptions, DataResult<Option<Fetched>>);

pub(crate) struct ServiceInner {
    cid: String,
    registry: Arc<CacheRegistry>,
    owner: Arc<dyn Owner>,
    models: Vec<DataModel>,
    parsed: OnceLock<ParsedAliases>,
    model: Arc<Entity>,
    view_state: Arc<Entity>,
    store: ResultStore,
    private_views: DashMap<String, Arc<PrivateView>>,
    generations: DashMap<String, u64>,
    events: EventHub<ServiceEvent>,
    pending_tx: mpsc::UnboundedSender<PendingFetch>,
    pending_rx: tokio::sync::Mutex<mpsc::UnboundedReceiver<PendingFetch>>,
    in_flight: AtomicUsize,
    disposed: AtomicBool,
}

/// Data dependency and fetch orchestration for one owner.
///
/// Cloning is cheap and yields a handle to the same service.
#[derive(Clone)]
pub struct DataService {
    inner: Arc<ServiceInner>,
}

/// Builder returned by [`DataService::builder`].
pub struct DataServiceBuilder {
    registry: Arc<CacheRegistry>,
    models: Vec<DataModel>,
    model: Option<Arc<Entity>>,
    view_state: Map<String, Value>,
}

impl DataServiceBuilder {
    /// Add one declaration.
    pub fn data_model(mut self, model: DataModel) -> Self {
        self.models.push(model);
        self
    }

    /// Add several declarations, in order.
    pub fn data_models(mut self, models: impl IntoIterator<Item = DataModel>) -> Self {
        self.models.extend(models);
        self
    }

    /// Bind the owner's primary entity, stored under `model`.
    pub fn model(mut self, model: Arc<Entity>) -> Self {
        self.model = Some(model);
        self
    }

    /// Initial view state attributes, stored under `view`. Non-object values are
    /// ignored.
    pub fn view_state(mut self, state: Value) -> Self {
        if let Value::Object(map) = state {
            self.view_state.extend(map);
        }
        self
    }

    /// Create the service and run the initial fetches.
    ///
    /// # Errors
    ///
    /// Returns [`DataError::InvalidDataModels`] listing every configuration problem.
    /// Private views created by the owner's `on_init` are released before returning.
    pub fn initialize<O>(self, owner: Arc<O>) -> DataResult<DataService>
    where
        O: Owner + 'static,
    {
        let (pending_tx, pending_rx) = mpsc::unbounded_channel();
        let service = DataService {
            inner: Arc::new(ServiceInner {
                cid: uuid::Uuid::new_v4().to_string(),
                registry: self.registry,
                owner,
                models: self.models,
                parsed: OnceLock::new(),
                model: self.model.unwrap_or_else(|| Entity::transient(Map::new())),
                view_state: Entity::transient(self.view_state),
                store: ResultStore::new(),
                private_views: DashMap::new(),
                generations: DashMap::new(),
                events: EventHub::new(),
                pending_tx,
                pending_rx: tokio::sync::Mutex::new(pending_rx),
                in_flight: AtomicUsize::new(0),
                disposed: AtomicBool::new(false),
            }),
        };

        service.inner.owner.on_init(&service);

        let parsed = match parse_data_models(&service.inner.models, &service.inner.registry) {
            Ok(parsed) => parsed,
            Err(error) => {
                service.release_private_views();
                return Err(error);
            }
        };
        let parsed = service.inner.parsed.get_or_init(|| parsed);
        tracing::debug!(cid = %service.inner.cid, aliases = parsed.len(), "data service initialized");

        service.store_implicit(MODEL_ALIAS, Arc::clone(&service.inner.model));
        service.store_implicit(VIEW_ALIAS, Arc::clone(&service.inner.view_state));
        service.fetch_dependents(MODEL_ALIAS);
        service.fetch_dependents(VIEW_ALIAS);

        let roots: Vec<String> = parsed.roots().into_iter().map(str::to_string).collect();
        for alias in roots {
            service.fetch_alias(&alias, FetchOptions::default());
        }
        Ok(service)
    }
}

impl DataService {
    /// Start building a service against `registry`.
    pub fn builder(registry: Arc<CacheRegistry>) -> DataServiceBuilder {
        DataServiceBuilder {
            registry,
            models: Vec::new(),
            model: None,
            view_state: Map::new(),
        }
    }

    fn upgrade(inner: &Weak<ServiceInner>) -> Option<DataService> {
        inner.upgrade().map(|inner| DataService {
            inner,
        })
    }

    fn downgrade(&self) -> Weak<ServiceInner> {
        Arc::downgrade(&self.inner)
    }

    /// Unique id of this service instance, used to key its private views.
    pub fn cid(&self) -> &str {
        &self.inner.cid
    }

    /// The cache registry this service fetches through.
    pub fn registry(&self) -> &Arc<CacheRegistry> {
        &self.inner.registry
    }

    /// Parsed alias specs.
    pub fn aliases(&self) -> Option<&ParsedAliases> {
        self.inner.parsed.get()
    }

    /// The owner's bound entity, stored under `model`.
    pub fn model(&self) -> &Arc<Entity> {
        &self.inner.model
    }

    /// The owner's view state, stored under `view`.
    pub fn view_state(&self) -> &Arc<Entity> {
        &self.inner.view_state
    }

    /// Current value of `alias`.
    pub fn fetched(&self, alias: &str) -> Option<Fetched> {
        self.inner.store.get(alias)
    }

    /// Attribute `name` of the single entity stored under `alias`.
    pub fn fetched_property(&self, alias: &str, name: &str) -> Option<Value> {
        self.fetched(alias).and_then(|value| value.get(name))
    }

    /// Number of listeners currently attached for `alias`.
    pub fn listener_count(&self, alias: &str) -> usize {
        self.inner.store.listener_count(alias)
    }

    /// The private view for `alias`, created on first access.
    ///
    /// Before the declarations are parsed (inside `on_init`), the alias is looked up
    /// in the raw declarations.
    ///
    /// # Errors
    ///
    /// Fails if the service is disposed, the alias is unknown, the alias has no
    /// entity type, or the type is not registered.
    pub fn private_view(&self, alias: &str) -> DataResult<Arc<PrivateView>> {
        if self.is_disposed() {
            return Err(DataError::Disposed);
        }
        if let Some(view) = self.inner.private_views.get(alias) {
            return Ok(Arc::clone(view.value()));
        }

        let entity_type = match self.inner.parsed.get() {
            Some(parsed) => parsed
                .get(alias)
                .ok_or_else(|| unknown_alias(alias))?
                .entity_type
                .clone(),
            None => self
                .inner
                .models
                .iter()
                .find(|model| model.alias.as_deref() == Some(alias))
                .ok_or_else(|| unknown_alias(alias))?
                .entity_type()
                .map(str::to_string),
        };
        let entity_type = entity_type.ok_or_else(|| DataError::Other {
            message: format!("Alias {alias} has no entity type, so it has no private view"),
        })?;
        let master = self.inner.registry.require(&entity_type)?;

        let view = self
            .inner
            .private_views
            .entry(alias.to_string())
            .or_insert_with(|| master.create_private_view(format!("{}:{alias}", self.inner.cid)));
        Ok(Arc::clone(view.value()))
    }

    /// Master cache for `entity_type`.
    pub fn master_cache(&self, entity_type: &str) -> Option<Arc<MasterCache>> {
        self.inner.registry.get(entity_type)
    }

    /// Fetch `alias` with `options`, cascading to its dependents.
    ///
    /// Fetch failures are reported through `fetchError:<alias>`, not returned.
    ///
    /// # Errors
    ///
    /// Fails if the service is disposed or `alias` is unknown.
    pub fn fetch(&self, alias: &str, options: FetchOptions) -> DataResult<()> {
        if self.is_disposed() {
            return Err(DataError::Disposed);
        }
        if !self.inner.parsed.get().is_some_and(|parsed| parsed.contains(alias)) {
            return Err(unknown_alias(alias));
        }
        self.fetch_alias(alias, options);
        Ok(())
    }

    /// Re-fetch `alias` unconditionally, re-requesting every id.
    ///
    /// # Errors
    ///
    /// Fails if the service is disposed or `alias` is unknown.
    pub fn force_fetch(&self, alias: &str) -> DataResult<()> {
        self.fetch(alias, FetchOptions::forced())
    }

    /// Template context: `model`, `view` and every declared alias as JSON (null when
    /// absent), with the owner's own context merged on top.
    pub fn prepare(&self) -> Map<String, Value> {
        let mut context = Map::new();
        context.insert(MODEL_ALIAS.to_string(), self.inner.model.to_json());
        context.insert(VIEW_ALIAS.to_string(), self.inner.view_state.to_json());
        if let Some(parsed) = self.inner.parsed.get() {
            for spec in parsed.declared() {
                let value = self.fetched(&spec.alias).map_or(Value::Null, |value| value.to_json());
                context.insert(spec.alias.clone(), value);
            }
        }
        context.extend(self.inner.owner.prepare_context(self));
        context
    }

    /// Subscribe to a service topic such as `fetched:<alias>`.
    #[must_use = "dropping the subscription immediately removes the listener"]
    pub fn on<F>(&self, topic: impl Into<String>, callback: F) -> Subscription
    where
        F: Fn(&ServiceEvent) + Send + Sync + 'static,
    {
        self.inner.events.subscribe(topic, callback)
    }

    /// Subscribe to successful stores of `alias`.
    #[must_use = "dropping the subscription immediately removes the listener"]
    pub fn on_fetched<F>(&self, alias: &str, callback: F) -> Subscription
    where
        F: Fn(&Fetched) + Send + Sync + 'static,
    {
        self.on(fetched_topic(alias), move |event| {
            if let ServiceEvent::Fetched { value, .. } = event {
                callback(value);
            }
        })
    }

    /// Subscribe to fetch failures of `alias`.
    #[must_use = "dropping the subscription immediately removes the listener"]
    pub fn on_fetch_error<F>(&self, alias: &str, callback: F) -> Subscription
    where
        F: Fn(&DataError) + Send + Sync + 'static,
    {
        self.on(fetch_error_topic(alias), move |event| {
            if let ServiceEvent::FetchError { error, .. } = event {
                callback(error);
            }
        })
    }

    /// Number of deferred fetches not yet applied.
    pub fn pending(&self) -> usize {
        self.inner.in_flight.load(Ordering::Acquire)
    }

    /// Drive every queued deferred fetch, and every fetch those trigger, to
    /// completion. Completions are applied one at a time in completion order.
    pub async fn settle(&self) {
        let mut receiver = self.inner.pending_rx.lock().await;
        let mut in_flight: FuturesUnordered<BoxFuture<'static, Completion>> = FuturesUnordered::new();
        loop {
            while let Ok(pending) = receiver.try_recv() {
                let PendingFetch {
                    alias,
                    generation,
                    options,
                    future,
                } = pending;
                in_flight.push(Box::pin(async move { (alias, generation, options, future.await) }));
            }
            let Some((alias, generation, options, result)) = in_flight.next().await else {
                break;
            };
            self.inner.in_flight.fetch_sub(1, Ordering::AcqRel);
            self.complete(&alias, generation, &options, result);
        }
    }

    /// Whether [`dispose`](Self::dispose) was called.
    pub fn is_disposed(&self) -> bool {
        self.inner.disposed.load(Ordering::Acquire)
    }

    /// Release every private view and listener, drop queued fetches, and run the
    /// owner's `on_dispose`. Later triggers and completions are ignored.
    pub fn dispose(&self) {
        if self.inner.disposed.swap(true, Ordering::AcqRel) {
            return;
        }
        self.release_private_views();
        self.inner.store.clear();
        if let Ok(mut receiver) = self.inner.pending_rx.try_lock() {
            while receiver.try_recv().is_ok() {
                self.inner.in_flight.fetch_sub(1, Ordering::AcqRel);
            }
        }
        self.inner.owner.on_dispose();
        tracing::debug!(cid = %self.inner.cid, "data service disposed");
    }

    fn release_private_views(&self) {
        let aliases: Vec<String> =
            self.inner.private_views.iter().map(|entry| entry.key().clone()).collect();
        for alias in aliases {
            if let Some((_, view)) = self.inner.private_views.remove(&alias) {
                view.dispose();
            }
        }
    }

    fn request_render(&self) {
        if !self.is_disposed() {
            self.inner.owner.render(self);
        }
    }
}

fn unknown_alias(alias: &str) -> DataError {
    DataError::UnknownAlias {
        alias: alias.to_string(),
    }
}

impl fmt::Debug for DataService {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DataService")
            .field("cid", &self.inner.cid)
            .field("stored", &self.inner.store.aliases())
            .field("pending", &self.pending())
            .field("disposed", &self.is_disposed())
            .finish()
    }
}
