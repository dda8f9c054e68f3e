//! Owner-scoped windows into a master cache.
//!
//! A [`PrivateView`] tracks the ids one owner currently cares about for one alias.
//! Entity storage stays in the [`MasterCache`]; the view only remembers which ids
//! it asked for, so several owners can share loaded entities while each sees only
//! its own subset.

use futures::FutureExt;
use futures::future::BoxFuture;
use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use super::{MasterCache, RetrievalMode};
use crate::core::{DataError, DataResult, Entity, EntityId};

/// Ids tracked by one owner for one alias, backed by a shared master cache.
#[derive(Debug)]
pub struct PrivateView {
    key: String,
    master: Arc<MasterCache>,
    tracked: Mutex<Vec<EntityId>>,
    full_list_size: Mutex<Option<u64>>,
    disposed: AtomicBool,
}

impl PrivateView {
    pub(super) fn new(key: String, master: Arc<MasterCache>) -> Self {
        Self {
            key,
            master,
            tracked: Mutex::new(Vec::new()),
            full_list_size: Mutex::new(None),
            disposed: AtomicBool::new(false),
        }
    }

    /// Registration key, unique per owner and alias.
    pub fn key(&self) -> &str {
        &self.key
    }

    /// Master cache this view delegates to.
    pub fn master(&self) -> &Arc<MasterCache> {
        &self.master
    }

    /// Replace the tracked id set. Duplicates are dropped, first occurrence wins.
    pub fn track(&self, ids: &[EntityId]) {
        let mut seen = HashSet::new();
        let unique: Vec<EntityId> = ids.iter().filter(|id| seen.insert(*id)).cloned().collect();
        *self.tracked.lock().unwrap_or_else(PoisonError::into_inner) = unique;
    }

    /// Ids currently tracked, in tracking order.
    pub fn tracked_ids(&self) -> Vec<EntityId> {
        self.tracked.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }

    /// Whether `id` is tracked and loaded.
    pub fn contains(&self, id: &EntityId) -> bool {
        self.tracked.lock().unwrap_or_else(PoisonError::into_inner).contains(id)
            && self.master.contains(id)
    }

    /// Loaded entities for the tracked ids, in tracking order.
    pub fn entities(&self) -> Vec<Arc<Entity>> {
        self.tracked_ids().iter().filter_map(|id| self.master.get(id)).collect()
    }

    /// Loaded, tracked entities whose id is in `ids`.
    pub fn filter(&self, ids: &[EntityId]) -> Vec<Arc<Entity>> {
        let wanted: HashSet<&EntityId> = ids.iter().collect();
        self.entities()
            .into_iter()
            .filter(|entity| entity.id().is_some_and(|id| wanted.contains(id)))
            .collect()
    }

    /// Number of loaded tracked entities.
    pub fn len(&self) -> usize {
        self.entities().len()
    }

    /// Whether no tracked entity is loaded.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Total result size reported by the last criteria query, if any.
    pub fn full_list_size(&self) -> Option<u64> {
        *self.full_list_size.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Record the total result size reported by a criteria query.
    pub fn set_full_list_size(&self, size: Option<u64>) {
        *self.full_list_size.lock().unwrap_or_else(PoisonError::into_inner) = size;
    }

    /// Track `ids` now and return a future that loads them and yields the
    /// matching entities.
    ///
    /// Tracking happens before the future is polled, so the view reflects the new
    /// id set immediately even though the entities arrive later.
    pub fn track_and_retrieve(
        self: &Arc<Self>,
        ids: Vec<EntityId>,
        mode: RetrievalMode,
    ) -> BoxFuture<'static, DataResult<Vec<Arc<Entity>>>> {
        if self.is_disposed() {
            return futures::future::ready(Err(DataError::Disposed)).boxed();
        }
        self.track(&ids);
        let view = Arc::clone(self);
        async move {
            match mode {
                RetrievalMode::PullMissingOnly => view.master.pull(&ids).await?,
                RetrievalMode::AlwaysFetch => view.master.fetch(&ids).await?,
            };
            Ok(view.filter(&ids))
        }
        .boxed()
    }

    /// Track `ids` and load only those not yet in the master cache.
    pub async fn track_and_pull(self: &Arc<Self>, ids: Vec<EntityId>) -> DataResult<Vec<Arc<Entity>>> {
        self.track_and_retrieve(ids, RetrievalMode::PullMissingOnly).await
    }

    /// Track `ids` and reload all of them from the transport.
    pub async fn track_and_fetch(self: &Arc<Self>, ids: Vec<EntityId>) -> DataResult<Vec<Arc<Entity>>> {
        self.track_and_retrieve(ids, RetrievalMode::AlwaysFetch).await
    }

    /// Whether [`dispose`](Self::dispose) was called.
    pub fn is_disposed(&self) -> bool {
        self.disposed.load(Ordering::Acquire)
    }

    /// Stop tracking everything and unregister from the master cache.
    pub fn dispose(&self) {
        if self.disposed.swap(true, Ordering::AcqRel) {
            return;
        }
        self.tracked.lock().unwrap_or_else(PoisonError::into_inner).clear();
        self.master.release_view(&self.key, self);
        tracing::debug!(view = %self.key, entity_type = %self.master.entity_type(), "private view disposed");
    }
}
