//! Entity caches shared across owners
//!
//! This module provides the two-level cache that sits under every data service:
//! - [`MasterCache`]: one per entity type, process-wide. It owns the entity
//!   instances and the [`Transport`] that loads them.
//! - [`PrivateView`]: one per owner and alias. It tracks the ids its owner asked
//!   for and reads entities from the master cache.
//!
//! Master caches are collected in a [`CacheRegistry`] that is built once at
//! application startup and handed to every owner by `Arc`.
//!
//! # Retrieval Modes
//!
//! - **Pull** ([`RetrievalMode::PullMissingOnly`]): only ids not yet loaded in the
//!   master cache go to the transport. Entities loaded for one owner are reused by
//!   every other owner.
//! - **Fetch** ([`RetrievalMode::AlwaysFetch`]): every requested id is re-requested.
//!   Entities already loaded are updated in place, which emits change events to
//!   every holder.
//!
//! # Usage Examples
//!
//! ```rust,ignore
//! use irrigation_cli::cache::CacheRegistry;
//! use irrigation_cli::moisture::MoistureBackend;
//!
//! let registry = CacheRegistry::new();
//! registry.register("moisture", MoistureBackend::with_generated(50));
//!
//! let master = registry.get("moisture").unwrap();
//! let view = master.create_private_view("owner-1:moisture");
//! let readings = view.track_and_pull(vec![1.into(), 2.into()]).await?;
//! ```

pub mod private_view;
pub mod transport;

pub use private_view::PrivateView;
pub use transport::{CriteriaResponse, Pagination, Transport};

use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashSet;
use std::fmt;
use std::sync::{Arc, Weak};

use crate::core::{DataError, DataResult, Entity, EntityId, EntityRecord};

/// How an id-based retrieval treats entities that are already loaded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RetrievalMode {
    /// Re-request every id from the transport.
    #[default]
    AlwaysFetch,
    /// Request only ids missing from the cache.
    PullMissingOnly,
}

/// Process-wide store of entities for one entity type.
pub struct MasterCache {
    entity_type: String,
    transport: Arc<dyn Transport>,
    entities: DashMap<EntityId, Arc<Entity>>,
    views: DashMap<String, Weak<PrivateView>>,
}

impl MasterCache {
    /// Create a cache for `entity_type` backed by `transport`.
    pub fn new(entity_type: impl Into<String>, transport: Arc<dyn Transport>) -> Arc<Self> {
        Arc::new(Self {
            entity_type: entity_type.into(),
            transport,
            entities: DashMap::new(),
            views: DashMap::new(),
        })
    }

    /// Entity type name.
    pub fn entity_type(&self) -> &str {
        &self.entity_type
    }

    /// Loaded entity for `id`.
    pub fn get(&self, id: &EntityId) -> Option<Arc<Entity>> {
        self.entities.get(id).map(|entry| Arc::clone(entry.value()))
    }

    /// Whether `id` is loaded.
    pub fn contains(&self, id: &EntityId) -> bool {
        self.entities.contains_key(id)
    }

    /// Number of loaded entities.
    pub fn len(&self) -> usize {
        self.entities.len()
    }

    /// Whether nothing is loaded.
    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }

    /// Create and register a private view under `key`.
    ///
    /// A view previously registered under the same key is disposed first.
    pub fn create_private_view(self: &Arc<Self>, key: impl Into<String>) -> Arc<PrivateView> {
        let key = key.into();
        if let Some(previous) = self.views.get(&key).and_then(|entry| entry.value().upgrade()) {
            previous.dispose();
        }
        // Owners dropped without disposing leave dead entries behind.
        self.views.retain(|_, view| view.strong_count() > 0);
        let view = Arc::new(PrivateView::new(key.clone(), Arc::clone(self)));
        self.views.insert(key.clone(), Arc::downgrade(&view));
        tracing::debug!(entity_type = %self.entity_type, view = %key, "private view created");
        view
    }

    /// Keys of the live private views, sorted.
    pub fn view_keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self
            .views
            .iter()
            .filter(|entry| entry.value().strong_count() > 0)
            .map(|entry| entry.key().clone())
            .collect();
        keys.sort();
        keys
    }

    /// Unregister `view`, leaving any newer view under the same key in place.
    pub(crate) fn release_view(&self, key: &str, view: &PrivateView) {
        self.views.remove_if(key, |_, registered| std::ptr::eq(registered.as_ptr(), view));
    }

    #[cfg(test)]
    fn registered_views(&self) -> usize {
        self.views.len()
    }

    /// Load `ids` from the transport, updating or inserting each returned record.
    pub async fn fetch(&self, ids: &[EntityId]) -> DataResult<Vec<Arc<Entity>>> {
        let unique = unique_ids(ids);
        if unique.is_empty() {
            return Ok(Vec::new());
        }
        tracing::debug!(entity_type = %self.entity_type, count = unique.len(), "fetching from transport");
        let records = self.transport.fetch_by_ids(unique).await.map_err(|e| self.transport_error(e))?;
        Ok(records.into_iter().map(|record| self.upsert(record)).collect())
    }

    /// Load only the ids of `ids` that are not loaded yet.
    pub async fn pull(&self, ids: &[EntityId]) -> DataResult<Vec<Arc<Entity>>> {
        let missing: Vec<EntityId> =
            unique_ids(ids).into_iter().filter(|id| !self.contains(id)).collect();
        if missing.is_empty() {
            tracing::debug!(entity_type = %self.entity_type, "pull satisfied from cache");
            return Ok(Vec::new());
        }
        self.fetch(&missing).await
    }

    /// Resolve `criteria` to ids through the transport.
    pub async fn fetch_ids_by_criteria(&self, criteria: Value) -> DataResult<CriteriaResponse> {
        self.transport.fetch_ids_by_criteria(criteria).await.map_err(|e| self.transport_error(e))
    }

    fn transport_error(&self, error: DataError) -> DataError {
        match error {
            DataError::Transport { .. } | DataError::InvalidCriteria { .. } => error,
            other => DataError::Transport {
                entity_type: self.entity_type.clone(),
                message: other.to_string(),
            },
        }
    }

    fn upsert(&self, record: EntityRecord) -> Arc<Entity> {
        // Clone out of the map before writing so change listeners run unguarded.
        let existing = self.entities.get(&record.id).map(|entry| Arc::clone(entry.value()));
        match existing {
            Some(entity) => {
                entity.set_all(record.attributes);
                entity
            }
            None => {
                let id = record.id.clone();
                let entity = Entity::from_record(record);
                self.entities.insert(id, Arc::clone(&entity));
                entity
            }
        }
    }
}

impl fmt::Debug for MasterCache {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MasterCache")
            .field("entity_type", &self.entity_type)
            .field("entities", &self.entities.len())
            .field("views", &self.views.len())
            .finish()
    }
}

fn unique_ids(ids: &[EntityId]) -> Vec<EntityId> {
    let mut seen = HashSet::new();
    ids.iter().filter(|id| seen.insert(*id)).cloned().collect()
}

/// Registry of master caches by entity type name.
#[derive(Debug, Default)]
pub struct CacheRegistry {
    caches: DashMap<String, Arc<MasterCache>>,
}

impl CacheRegistry {
    /// Create an empty registry.
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Register a master cache for `entity_type` and return it.
    ///
    /// Registering the same type twice keeps the first cache.
    pub fn register(&self, entity_type: &str, transport: Arc<dyn Transport>) -> Arc<MasterCache> {
        Arc::clone(
            self.caches
                .entry(entity_type.to_string())
                .or_insert_with(|| MasterCache::new(entity_type, transport))
                .value(),
        )
    }

    /// Master cache for `entity_type`.
    pub fn get(&self, entity_type: &str) -> Option<Arc<MasterCache>> {
        self.caches.get(entity_type).map(|entry| Arc::clone(entry.value()))
    }

    /// Master cache for `entity_type`, or an error naming the type.
    pub fn require(&self, entity_type: &str) -> DataResult<Arc<MasterCache>> {
        self.get(entity_type).ok_or_else(|| DataError::UnknownEntityType {
            entity_type: entity_type.to_string(),
        })
    }

    /// Whether `entity_type` is registered.
    pub fn contains(&self, entity_type: &str) -> bool {
        self.caches.contains_key(entity_type)
    }

    /// Registered type names, sorted.
    pub fn entity_types(&self) -> Vec<String> {
        let mut names: Vec<String> = self.caches.iter().map(|entry| entry.key().clone()).collect();
        names.sort();
        names
    }

    /// Registered type name closest to `name`, if one is reasonably similar.
    pub fn closest_match(&self, name: &str) -> Option<String> {
        crate::utils::closest_match(name, self.entity_types())
    }
}

#[cfg(test)]
mod tests;
