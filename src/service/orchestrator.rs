//! Fetch orchestration for one alias.
//!
//! `fetch_alias` evaluates the alias's id source, clears the alias when the input
//! is absent, and otherwise runs the alias's strategy. Synchronous failures become
//! `fetchError:<alias>` notifications; deferred results are queued and applied by
//! `settle` if their generation is still current.
//!
//! The strategy functions are public so custom fetchers can delegate to them.

use futures::FutureExt;
use futures::future::BoxFuture;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::Ordering;

use super::{
    DataService, FetchOptions, FetchOutcome, Fetched, PendingFetch, ServiceEvent, fetch_error_topic,
    fetched_topic,
};
use crate::cache::{CriteriaResponse, PrivateView, RetrievalMode};
use crate::core::{CHANGE, DataError, DataResult, Entity, EntityId, change_topic};
use crate::resolver::{AliasSpec, FetchStrategy, IdSource};

/// Deferred result of a strategy.
pub type FetchFuture = BoxFuture<'static, DataResult<Option<Fetched>>>;

/// Whether `input` identifies something to fetch.
///
/// Numbers and booleans are present. Null is absent. Strings, arrays and objects
/// are present when non-empty.
pub fn is_present(input: &Value) -> bool {
    match input {
        Value::Null => false,
        Value::Bool(_) | Value::Number(_) => true,
        Value::String(s) => !s.is_empty(),
        Value::Array(items) => !items.is_empty(),
        Value::Object(map) => !map.is_empty(),
    }
}

impl DataService {
    /// Fetch `alias` now, or clear it if its input is absent.
    pub(crate) fn fetch_alias(&self, alias: &str, options: FetchOptions) {
        if self.is_disposed() {
            return;
        }
        let Some(spec) = self.aliases().and_then(|parsed| parsed.get(alias)).cloned() else {
            tracing::warn!(alias, "fetch requested for unknown alias");
            return;
        };
        if spec.is_implicit() {
            self.fetch_dependents(alias);
            return;
        }

        let generation = self.bump_generation(alias);
        let input = self.evaluate_input(&spec);
        if !is_present(&input) {
            tracing::debug!(alias, generation, "input absent, clearing");
            self.clear_alias(alias, &options);
            return;
        }

        let mut options = options;
        if options.private_view.is_none() && spec.entity_type.is_some() {
            match self.private_view(alias) {
                Ok(view) => options.private_view = Some(view),
                Err(error) => {
                    self.report_error(alias, error);
                    return;
                }
            }
        }

        tracing::debug!(alias, generation, strategy = spec.strategy.name(), input = %input, "fetching");
        let outcome = match &spec.strategy {
            FetchStrategy::ById => self.fetch_one_by_id(alias, &input, &options).map(FetchOutcome::Deferred),
            FetchStrategy::ByIds => {
                self.fetch_many_by_ids(alias, &input, &options).map(FetchOutcome::Deferred)
            }
            FetchStrategy::ByCriteria => {
                self.fetch_many_by_criteria(alias, &input, &options).map(FetchOutcome::Deferred)
            }
            FetchStrategy::ByCriteriaSingle => {
                self.fetch_one_by_criteria(alias, &input, &options).map(FetchOutcome::Deferred)
            }
            FetchStrategy::Custom(fetcher) => fetcher(self, alias, &input, &options),
            FetchStrategy::Implicit => Ok(FetchOutcome::Ready(None)),
        };

        match outcome {
            Err(error) => self.report_error(alias, error),
            Ok(FetchOutcome::Ready(Some(value))) => self.store_value(alias, value, &options),
            Ok(FetchOutcome::Ready(None)) => self.clear_alias(alias, &options),
            Ok(FetchOutcome::Deferred(future)) => self.enqueue(PendingFetch {
                alias: alias.to_string(),
                generation,
                options,
                future,
            }),
        }
    }

    /// Re-fetch every distinct dependent of `alias`.
    pub(crate) fn fetch_dependents(&self, alias: &str) {
        let dependents: Vec<String> = match self.aliases().and_then(|parsed| parsed.get(alias)) {
            Some(spec) => spec.dependent_aliases().into_iter().map(str::to_string).collect(),
            None => return,
        };
        for dependent in dependents {
            self.fetch_alias(&dependent, FetchOptions::default());
        }
    }

    fn evaluate_input(&self, spec: &AliasSpec) -> Value {
        match &spec.id_source {
            IdSource::Value(source) => source.evaluate(self),
            IdSource::Property { parent, property } => {
                self.fetched(parent).map_or(Value::Null, |value| value.property_input(property))
            }
            IdSource::Always => Value::Bool(true),
            IdSource::Implicit | IdSource::None => Value::Null,
        }
    }

    fn bump_generation(&self, alias: &str) -> u64 {
        let mut entry = self.inner.generations.entry(alias.to_string()).or_insert(0);
        *entry += 1;
        *entry
    }

    fn current_generation(&self, alias: &str) -> u64 {
        self.inner.generations.get(alias).map_or(0, |entry| *entry.value())
    }

    fn enqueue(&self, pending: PendingFetch) {
        self.inner.in_flight.fetch_add(1, Ordering::AcqRel);
        if self.inner.pending_tx.send(pending).is_err() {
            self.inner.in_flight.fetch_sub(1, Ordering::AcqRel);
        }
    }

    /// Apply a deferred result if it is still current.
    pub(super) fn complete(
        &self,
        alias: &str,
        generation: u64,
        options: &FetchOptions,
        result: DataResult<Option<Fetched>>,
    ) {
        if self.is_disposed() {
            tracing::debug!(alias, "completion after dispose ignored");
            return;
        }
        let current = self.current_generation(alias);
        if generation != current {
            tracing::debug!(alias, generation, current, "stale completion dropped");
            return;
        }
        match result {
            Ok(Some(value)) => self.store_value(alias, value, options),
            Ok(None) => {
                self.bump_generation(alias);
                self.clear_alias(alias, options);
            }
            Err(error) => self.report_error(alias, error),
        }
    }

    fn report_error(&self, alias: &str, error: DataError) {
        tracing::warn!(alias, error = %error, "fetch failed");
        self.inner.events.emit(
            &fetch_error_topic(alias),
            &ServiceEvent::FetchError {
                alias: alias.to_string(),
                error,
            },
        );
    }

    /// Store `value` for `alias`.
    ///
    /// A value that is a new reference replaces the old one, gets fresh listeners
    /// and re-fetches the dependents. `fetched:<alias>` is emitted either way.
    pub(crate) fn store_value(&self, alias: &str, value: Fetched, options: &FetchOptions) {
        if self.is_disposed() {
            return;
        }
        let changed = self.fetched(alias).is_none_or(|previous| !previous.same_as(&value));
        if changed {
            self.inner.store.insert(alias, value.clone());
            self.attach_listeners(alias, &value, false);
            tracing::debug!(alias, entities = value.len(), "value stored");
            self.fetch_dependents(alias);
        }
        self.inner.events.emit(
            &fetched_topic(alias),
            &ServiceEvent::Fetched {
                alias: alias.to_string(),
                value,
            },
        );
        if !options.no_render {
            self.request_render();
        }
    }

    /// Store `model` or `view`. Their own changes do not trigger a render.
    pub(crate) fn store_implicit(&self, alias: &str, entity: Arc<Entity>) {
        let value = Fetched::One(entity);
        self.inner.store.insert(alias, value.clone());
        self.attach_listeners(alias, &value, true);
    }

    fn clear_alias(&self, alias: &str, options: &FetchOptions) {
        if self.inner.store.remove(alias).is_none() {
            return;
        }
        tracing::debug!(alias, "value cleared");
        self.fetch_dependents(alias);
        if !options.no_render {
            self.request_render();
        }
    }

    fn attach_listeners(&self, alias: &str, value: &Fetched, skip_general: bool) {
        let mut watched: Vec<(String, Vec<String>)> = Vec::new();
        if let Some(spec) = self.aliases().and_then(|parsed| parsed.get(alias)) {
            let mut by_property: HashMap<&str, usize> = HashMap::new();
            for edge in &spec.dependents {
                match by_property.get(edge.property.as_str()) {
                    Some(&i) => {
                        if !watched[i].1.contains(&edge.dependent) {
                            watched[i].1.push(edge.dependent.clone());
                        }
                    }
                    None => {
                        by_property.insert(&edge.property, watched.len());
                        watched.push((edge.property.clone(), vec![edge.dependent.clone()]));
                    }
                }
            }
        }

        let mut subscriptions = Vec::new();
        for entity in value.entities() {
            if !skip_general {
                let service = self.downgrade();
                subscriptions.push(entity.on(CHANGE, move |_| {
                    if let Some(service) = DataService::upgrade(&service) {
                        service.request_render();
                    }
                }));
            }
            for (property, dependents) in &watched {
                let service = self.downgrade();
                let dependents = dependents.clone();
                subscriptions.push(entity.on(change_topic(property), move |_| {
                    if let Some(service) = DataService::upgrade(&service) {
                        for dependent in &dependents {
                            service.fetch_alias(dependent, FetchOptions::default());
                        }
                    }
                }));
            }
        }
        self.inner.store.set_listeners(alias, subscriptions);
    }

    fn view_for(&self, alias: &str, options: &FetchOptions) -> DataResult<Arc<PrivateView>> {
        match &options.private_view {
            Some(view) => Ok(Arc::clone(view)),
            None => self.private_view(alias),
        }
    }

    fn retrieval_mode(&self, alias: &str, options: &FetchOptions) -> RetrievalMode {
        if options.force_fetch {
            return RetrievalMode::AlwaysFetch;
        }
        self.aliases()
            .and_then(|parsed| parsed.get(alias))
            .map_or(RetrievalMode::AlwaysFetch, |spec| spec.retrieval_mode)
    }

    /// Track the ids in `input` on the alias's private view and load them.
    ///
    /// A scalar counts as a one-element list. Non-id values in a list are skipped.
    ///
    /// # Errors
    ///
    /// Fails synchronously if a scalar input is not an id or the private view
    /// cannot be resolved.
    pub fn fetch_many_by_ids(&self, alias: &str, input: &Value, options: &FetchOptions) -> DataResult<FetchFuture> {
        let ids = ids_from_input(alias, input)?;
        let view = self.view_for(alias, options)?;
        let retrieval = view.track_and_retrieve(ids, self.retrieval_mode(alias, options));
        Ok(async move { Ok(Some(Fetched::many(retrieval.await?))) }.boxed())
    }

    /// Resolve `criteria` to ids through the master cache for `entity_type`.
    ///
    /// # Errors
    ///
    /// Fails synchronously if `entity_type` is not registered.
    pub fn fetch_ids_by_criteria(
        &self,
        entity_type: &str,
        criteria: Value,
    ) -> DataResult<BoxFuture<'static, DataResult<CriteriaResponse>>> {
        let master = self.inner.registry.require(entity_type)?;
        Ok(async move { master.fetch_ids_by_criteria(criteria).await }.boxed())
    }

    /// Resolve criteria to ids, record the row count on the private view, then
    /// load the ids.
    ///
    /// # Errors
    ///
    /// Fails synchronously if the private view cannot be resolved.
    pub fn fetch_many_by_criteria(
        &self,
        alias: &str,
        criteria: &Value,
        options: &FetchOptions,
    ) -> DataResult<FetchFuture> {
        let view = self.view_for(alias, options)?;
        let mode = self.retrieval_mode(alias, options);
        let criteria = criteria.clone();
        Ok(async move {
            let response = view.master().fetch_ids_by_criteria(criteria).await?;
            let row_count = response.row_count().unwrap_or(response.ids.len() as u64);
            view.set_full_list_size(Some(row_count));
            let entities = view.track_and_retrieve(response.ids, mode).await?;
            Ok(Some(Fetched::many(entities)))
        }
        .boxed())
    }

    /// Criteria fetch that must resolve to exactly one entity.
    ///
    /// # Errors
    ///
    /// Fails synchronously like [`fetch_many_by_criteria`](Self::fetch_many_by_criteria).
    /// The future fails with [`DataError::Cardinality`] unless one entity is found.
    pub fn fetch_one_by_criteria(&self, alias: &str, criteria: &Value, options: &FetchOptions) -> DataResult<FetchFuture> {
        let many = self.fetch_many_by_criteria(alias, criteria, options)?;
        Ok(expect_one(alias.to_string(), format!("criteria {criteria}"), many))
    }

    /// Id fetch that must resolve to exactly one entity.
    ///
    /// # Errors
    ///
    /// Fails synchronously if `input` is an array or not an id. The future fails
    /// with [`DataError::Cardinality`] unless one entity is found.
    pub fn fetch_one_by_id(&self, alias: &str, input: &Value, options: &FetchOptions) -> DataResult<FetchFuture> {
        if input.is_array() {
            return Err(DataError::InvalidInput {
                alias: alias.to_string(),
                reason: format!("expected a single id, got an array: {input}"),
            });
        }
        let id = scalar_id(alias, input)?;
        let many = self.fetch_many_by_ids(alias, &id.to_value(), options)?;
        Ok(expect_one(alias.to_string(), format!("id {id}"), many))
    }
}

fn expect_one(alias: String, description: String, many: FetchFuture) -> FetchFuture {
    async move {
        let value = many.await?;
        let entities = value.map(|v| v.entities()).unwrap_or_default();
        match <[Arc<Entity>; 1]>::try_from(entities) {
            Ok([entity]) => Ok(Some(Fetched::One(entity))),
            Err(entities) => Err(DataError::Cardinality {
                alias,
                input: description,
                found: entities.len(),
            }),
        }
    }
    .boxed()
}

fn scalar_id(alias: &str, input: &Value) -> DataResult<EntityId> {
    EntityId::from_value(input).ok_or_else(|| DataError::InvalidInput {
        alias: alias.to_string(),
        reason: format!("{input} is not an id"),
    })
}

fn ids_from_input(alias: &str, input: &Value) -> DataResult<Vec<EntityId>> {
    match input {
        Value::Array(items) => Ok(items.iter().filter_map(EntityId::from_value).collect()),
        scalar => scalar_id(alias, scalar).map(|id| vec![id]),
    }
}
