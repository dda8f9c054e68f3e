//! Soil moisture domain: readings, an in-memory backend and the list owner.
//!
//! Readings are raw sensor values between 0 (saturated) and
//! [`MAX_MOISTURE`](crate::constants::MAX_MOISTURE) (bone dry). The
//! [`MoistureBackend`] serves them through the [`Transport`](crate::cache::Transport)
//! contract so the data service can page through them by criteria, and the
//! [`MoistureListView`] owner declares that paged list and renders it.
//!
//! # Example
//!
//! ```rust,ignore
//! use irrigation_cli::cache::CacheRegistry;
//! use irrigation_cli::moisture::{MoistureBackend, MoistureListView};
//!
//! let registry = CacheRegistry::new();
//! registry.register("moisture", MoistureBackend::with_generated(50));
//!
//! let list = MoistureListView::new(10);
//! let service = list.attach(registry)?;
//! service.settle().await;
//! println!("{}", list.output());
//! ```

mod backend;
pub mod criteria;
mod list_view;
pub mod sampling;

pub use backend::MoistureBackend;
pub use criteria::{MoistureCriteria, SortColumn, SortDirection, SortKey};
pub use list_view::MoistureListView;
pub use sampling::{SampleBucket, dryness_percent, sampled_summary};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::core::{DataError, DataResult, EntityRecord};

/// One stored sensor reading.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MoistureReading {
    /// Backend-assigned id.
    pub id: i64,
    /// Raw sensor value, 0..=1024.
    pub moisture: u16,
    /// Creation time, epoch milliseconds.
    pub created_at: i64,
    /// Last update time, epoch milliseconds.
    pub updated_at: i64,
}

impl MoistureReading {
    /// Reading taken at `at`.
    pub fn new(id: i64, moisture: u16, at: DateTime<Utc>) -> Self {
        let millis = at.timestamp_millis();
        Self {
            id,
            moisture,
            created_at: millis,
            updated_at: millis,
        }
    }

    /// Creation time as a UTC timestamp.
    pub fn created(&self) -> Option<DateTime<Utc>> {
        DateTime::from_timestamp_millis(self.created_at)
    }

    /// Convert into the record shape served to master caches.
    pub fn to_record(&self) -> EntityRecord {
        let mut attributes = Map::new();
        attributes.insert("moisture".into(), Value::from(self.moisture));
        attributes.insert("created_at".into(), Value::from(self.created_at));
        attributes.insert("updated_at".into(), Value::from(self.updated_at));
        EntityRecord::new(self.id, attributes)
    }

    /// Read back a record produced by [`to_record`](Self::to_record).
    pub fn from_attributes(id: i64, attributes: &Map<String, Value>) -> DataResult<Self> {
        let moisture = attributes
            .get("moisture")
            .and_then(Value::as_u64)
            .and_then(|m| u16::try_from(m).ok())
            .ok_or_else(|| DataError::Other {
                message: format!("Moisture reading {id} has no valid moisture value"),
            })?;
        let created_at = attributes.get("created_at").and_then(Value::as_i64).unwrap_or_default();
        let updated_at = attributes.get("updated_at").and_then(Value::as_i64).unwrap_or(created_at);
        Ok(Self {
            id,
            moisture,
            created_at,
            updated_at,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_record_round_trips_attributes() {
        let at = Utc.with_ymd_and_hms(2017, 1, 15, 10, 0, 0).unwrap();
        let reading = MoistureReading::new(7, 512, at);
        let record = reading.to_record();

        assert_eq!(record.attributes["created_at"], Value::from(1_484_474_400_000i64));
        let back = MoistureReading::from_attributes(7, &record.attributes).unwrap();
        assert_eq!(back, reading);
        assert_eq!(back.created(), Some(at));
    }

    #[test]
    fn test_missing_moisture_is_rejected() {
        let err = MoistureReading::from_attributes(3, &Map::new()).unwrap_err();
        assert!(err.to_string().contains("Moisture reading 3"));
    }
}
