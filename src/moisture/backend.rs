//! In-memory moisture store served through the transport contract.

use chrono::{DateTime, Duration, TimeZone, Utc};
use futures::FutureExt;
use futures::future::{self, BoxFuture};
use serde_json::Value;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tracing::debug;

use super::{MoistureCriteria, MoistureReading};
use crate::cache::{CriteriaResponse, Transport};
use crate::constants::MAX_MOISTURE;
use crate::core::{DataError, DataResult, EntityId, EntityRecord};

/// Minutes between generated readings.
const SAMPLE_INTERVAL_MINUTES: i64 = 15;

/// Readings between two generated waterings.
const WATERING_CYCLE: i64 = 96;

#[derive(Debug, Default)]
struct State {
    readings: Vec<MoistureReading>,
    next_id: i64,
}

/// Moisture readings held in memory, in insertion order.
///
/// Readings can only be created. Attempting to save a reading that already carries
/// an id fails, matching the sensor API which never edits a measurement.
#[derive(Debug, Default)]
pub struct MoistureBackend {
    state: Mutex<State>,
}

impl MoistureBackend {
    /// Empty backend.
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Backend seeded with `count` generated readings.
    pub fn with_generated(count: usize) -> Arc<Self> {
        let backend = Self::default();
        backend.generate(count);
        Arc::new(backend)
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Append `count` deterministic readings.
    ///
    /// The series starts at 2017-01-15 10:00 UTC with one reading every 15 minutes.
    /// Values climb as the soil dries and drop back after each watering, with a
    /// little index-derived jitter.
    pub fn generate(&self, count: usize) {
        let mut state = self.lock();
        let start = series_start();
        for _ in 0..count {
            state.next_id += 1;
            let id = state.next_id;
            let at = start + Duration::minutes(SAMPLE_INTERVAL_MINUTES * (id - 1));
            state.readings.push(MoistureReading::new(id, generated_moisture(id), at));
        }
        debug!("Generated {} moisture readings", count);
    }

    /// Store a new reading from a JSON body such as `{"moisture": 512}`.
    ///
    /// Bodies carrying an `id` are rejected: existing readings are never updated.
    pub fn create(&self, body: &Value) -> DataResult<MoistureReading> {
        if body.get("id").is_some_and(|id| !id.is_null()) {
            return Err(DataError::Other {
                message: "Updating existing moisture readings is not permitted".to_string(),
            });
        }
        let moisture = body
            .get("moisture")
            .and_then(Value::as_u64)
            .and_then(|m| u16::try_from(m).ok())
            .filter(|m| *m <= MAX_MOISTURE)
            .ok_or_else(|| DataError::Other {
                message: format!("moisture must be an integer between 0 and {MAX_MOISTURE}"),
            })?;

        let mut state = self.lock();
        state.next_id += 1;
        let reading = MoistureReading::new(state.next_id, moisture, Utc::now());
        state.readings.push(reading);
        debug!("Created moisture reading {}", reading.id);
        Ok(reading)
    }

    /// Snapshot of every reading in storage order.
    pub fn readings(&self) -> Vec<MoistureReading> {
        self.lock().readings.clone()
    }

    /// Number of stored readings.
    pub fn len(&self) -> usize {
        self.lock().readings.len()
    }

    /// Whether the backend holds no readings.
    pub fn is_empty(&self) -> bool {
        self.lock().readings.is_empty()
    }
}

fn series_start() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2017, 1, 15, 10, 0, 0).single().unwrap_or_default()
}

fn generated_moisture(id: i64) -> u16 {
    let cycle = id.rem_euclid(WATERING_CYCLE);
    let jitter = id.wrapping_mul(7919).rem_euclid(41) - 20;
    let value = (250 + cycle * 7 + jitter).clamp(0, i64::from(MAX_MOISTURE));
    u16::try_from(value).unwrap_or(MAX_MOISTURE)
}

impl Transport for MoistureBackend {
    fn fetch_by_ids(&self, ids: Vec<EntityId>) -> BoxFuture<'static, DataResult<Vec<EntityRecord>>> {
        let records: Vec<EntityRecord> = self
            .lock()
            .readings
            .iter()
            .filter(|r| ids.contains(&EntityId::Int(r.id)))
            .map(MoistureReading::to_record)
            .collect();
        debug!("Serving {} of {} requested moisture readings", records.len(), ids.len());
        future::ready(Ok(records)).boxed()
    }

    fn fetch_ids_by_criteria(&self, criteria: Value) -> BoxFuture<'static, DataResult<CriteriaResponse>> {
        let result = MoistureCriteria::from_value(&criteria).map(|parsed| parsed.apply(&self.lock().readings));
        future::ready(result).boxed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_generation_is_deterministic() {
        let a = MoistureBackend::with_generated(20);
        let b = MoistureBackend::with_generated(20);
        assert_eq!(a.readings(), b.readings());
        assert_eq!(a.len(), 20);

        let readings = a.readings();
        assert_eq!(readings[0].id, 1);
        assert_eq!(readings[0].created_at, 1_484_474_400_000);
        assert_eq!(readings[1].created_at - readings[0].created_at, 15 * 60 * 1000);
        assert!(readings.iter().all(|r| r.moisture <= MAX_MOISTURE));
    }

    #[test]
    fn test_create_assigns_next_id() {
        let backend = MoistureBackend::with_generated(3);
        let reading = backend.create(&json!({"moisture": 640})).unwrap();
        assert_eq!(reading.id, 4);
        assert_eq!(reading.moisture, 640);
        assert_eq!(backend.len(), 4);
    }

    #[test]
    fn test_create_rejects_updates_and_bad_values() {
        let backend = MoistureBackend::new();
        let err = backend.create(&json!({"id": 1, "moisture": 10})).unwrap_err();
        assert!(err.to_string().contains("not permitted"));
        assert!(backend.create(&json!({"moisture": 2000})).is_err());
        assert!(backend.create(&json!({})).is_err());
        assert!(backend.is_empty());
    }

    #[tokio::test]
    async fn test_fetch_by_ids_in_storage_order() {
        let backend = MoistureBackend::with_generated(5);
        let records = backend
            .fetch_by_ids(vec![EntityId::Int(4), EntityId::Int(2), EntityId::Int(99)])
            .await
            .unwrap();
        let ids: Vec<EntityId> = records.into_iter().map(|r| r.id).collect();
        assert_eq!(ids, vec![EntityId::Int(2), EntityId::Int(4)]);
    }

    #[tokio::test]
    async fn test_criteria_errors_surface() {
        let backend = MoistureBackend::with_generated(5);
        let result = backend.fetch_ids_by_criteria(json!({"sorting": 1})).await;
        assert!(matches!(result, Err(DataError::InvalidCriteria { .. })));

        let page = backend
            .fetch_ids_by_criteria(json!({"pagination": {"page": 2, "pageSize": 2}}))
            .await
            .unwrap();
        assert_eq!(page.ids, vec![EntityId::Int(3), EntityId::Int(4)]);
        assert_eq!(page.row_count(), Some(5));
    }
}
