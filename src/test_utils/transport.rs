//! In-memory transport that records its calls.

use futures::FutureExt;
use futures::future::BoxFuture;
use serde_json::Value;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use crate::cache::{CriteriaResponse, Pagination, Transport};
use crate::core::{DataError, DataResult, EntityId, EntityRecord};

/// Build a record from an id and a JSON object of attributes.
pub fn record(id: impl Into<EntityId>, attributes: Value) -> EntityRecord {
    EntityRecord::new(id, attributes.as_object().cloned().unwrap_or_default())
}

#[derive(Default)]
struct State {
    records: Vec<EntityRecord>,
    id_calls: Vec<Vec<EntityId>>,
    criteria_calls: Vec<Value>,
    criteria_response: Option<CriteriaResponse>,
    failure: Option<String>,
    delays: VecDeque<Duration>,
}

/// Transport over a list of records, recording every request.
///
/// Criteria requests return the configured response, or every record id when
/// none is configured.
#[derive(Default)]
pub struct RecordingTransport {
    state: Mutex<State>,
}

impl RecordingTransport {
    /// Empty transport.
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Transport serving `records`.
    pub fn with_records(records: impl IntoIterator<Item = EntityRecord>) -> Arc<Self> {
        let transport = Self::default();
        transport.lock().records.extend(records);
        Arc::new(transport)
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Add or replace a record.
    pub fn upsert(&self, record: EntityRecord) {
        let mut state = self.lock();
        match state.records.iter_mut().find(|r| r.id == record.id) {
            Some(existing) => *existing = record,
            None => state.records.push(record),
        }
    }

    /// Answer criteria requests with `ids` and a single page holding all of them.
    pub fn respond_with_ids(&self, ids: impl IntoIterator<Item = EntityId>) {
        let ids: Vec<EntityId> = ids.into_iter().collect();
        let row_count = ids.len() as u64;
        self.lock().criteria_response = Some(CriteriaResponse {
            ids,
            pagination: Some(Pagination {
                page: 1,
                page_size: row_count.max(1),
                row_count,
                page_count: 1,
            }),
            sorting: None,
        });
    }

    /// Answer criteria requests with `response`.
    pub fn respond_with(&self, response: CriteriaResponse) {
        self.lock().criteria_response = Some(response);
    }

    /// Fail every request with `message` until [`recover`](Self::recover).
    pub fn fail_with(&self, message: impl Into<String>) {
        self.lock().failure = Some(message.into());
    }

    /// Stop failing.
    pub fn recover(&self) {
        self.lock().failure = None;
    }

    /// Delay the next request by `delay`. Delays queue up in request order.
    pub fn delay_next(&self, delay: Duration) {
        self.lock().delays.push_back(delay);
    }

    /// Id lists requested through `fetch_by_ids`, in call order.
    pub fn id_calls(&self) -> Vec<Vec<EntityId>> {
        self.lock().id_calls.clone()
    }

    /// Criteria requested through `fetch_ids_by_criteria`, in call order.
    pub fn criteria_calls(&self) -> Vec<Value> {
        self.lock().criteria_calls.clone()
    }

    /// Total number of requests of either kind.
    pub fn call_count(&self) -> usize {
        let state = self.lock();
        state.id_calls.len() + state.criteria_calls.len()
    }

    fn prepare(&self) -> (Option<Duration>, Option<String>) {
        let mut state = self.lock();
        (state.delays.pop_front(), state.failure.clone())
    }
}

async fn wait(delay: Option<Duration>) {
    if let Some(delay) = delay {
        tokio::time::sleep(delay).await;
    }
}

impl Transport for RecordingTransport {
    fn fetch_by_ids(&self, ids: Vec<EntityId>) -> BoxFuture<'static, DataResult<Vec<EntityRecord>>> {
        let (delay, failure) = self.prepare();
        let mut state = self.lock();
        state.id_calls.push(ids.clone());
        let records: Vec<EntityRecord> =
            state.records.iter().filter(|r| ids.contains(&r.id)).cloned().collect();
        drop(state);

        async move {
            wait(delay).await;
            match failure {
                Some(message) => Err(DataError::Other {
                    message,
                }),
                None => Ok(records),
            }
        }
        .boxed()
    }

    fn fetch_ids_by_criteria(&self, criteria: Value) -> BoxFuture<'static, DataResult<CriteriaResponse>> {
        let (delay, failure) = self.prepare();
        let mut state = self.lock();
        state.criteria_calls.push(criteria);
        let response = state
            .criteria_response
            .clone()
            .unwrap_or_else(|| CriteriaResponse::from_ids(state.records.iter().map(|r| r.id.clone())));
        drop(state);

        async move {
            wait(delay).await;
            match failure {
                Some(message) => Err(DataError::Other {
                    message,
                }),
                None => Ok(response),
            }
        }
        .boxed()
    }
}
