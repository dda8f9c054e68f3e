//! Summaries of reading series for charting.

use serde::Serialize;

use super::MoistureReading;
use crate::constants::MAX_MOISTURE;

/// Fraction of the sensor range a raw value represents: 0.0 is saturated, 1.0 is dry.
pub fn dryness_percent(raw: u16) -> f64 {
    f64::from(raw) / f64::from(MAX_MOISTURE)
}

/// Statistics for one group of consecutive readings.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct SampleBucket {
    /// Creation time of the first reading in the bucket, epoch milliseconds.
    pub created_at: i64,
    /// Readings in the bucket.
    pub count: usize,
    /// Mean raw moisture.
    pub avg_moisture: f64,
    /// Population standard deviation of raw moisture.
    pub std_dev_moisture: f64,
}

impl SampleBucket {
    /// Mean dryness with a one standard deviation band, as `(low, mean, high)`.
    pub fn dryness_band(&self) -> (f64, f64, f64) {
        let max = f64::from(MAX_MOISTURE);
        let mean = self.avg_moisture / max;
        let spread = self.std_dev_moisture / max;
        (mean - spread, mean, mean + spread)
    }
}

/// Group readings, oldest first, into buckets of `count` and summarize each.
///
/// The last bucket holds whatever remains. A `count` of zero yields no buckets.
pub fn sampled_summary(readings: &[MoistureReading], count: usize) -> Vec<SampleBucket> {
    if count == 0 {
        return Vec::new();
    }
    let mut ordered: Vec<&MoistureReading> = readings.iter().collect();
    ordered.sort_by_key(|r| (r.created_at, r.id));

    ordered
        .chunks(count)
        .map(|chunk| {
            let n = chunk.len() as f64;
            let avg = chunk.iter().map(|r| f64::from(r.moisture)).sum::<f64>() / n;
            let variance = chunk.iter().map(|r| (f64::from(r.moisture) - avg).powi(2)).sum::<f64>() / n;
            SampleBucket {
                created_at: chunk[0].created_at,
                count: chunk.len(),
                avg_moisture: avg,
                std_dev_moisture: variance.sqrt(),
            }
        })
        .collect()
}
