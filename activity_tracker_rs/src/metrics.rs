//! Derived pace and speed for a distance/duration pair.
//! Called after every mutation of the running totals, never lazily.
use serde::{Deserialize, Serialize};

const METERS_PER_KM: f64 = 1000.0;
const MS_TO_KMH: f64 = 3.6;

#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Metrics {
    pub pace_sec_per_km: f64, // seconds per kilometer
    pub avg_speed_kmh: f64,   // kilometers per hour
}

/// Pace and average speed; either input at zero gives zero for both.
pub fn compute_metrics(distance_meters: f64, duration_seconds: u64) -> Metrics {
    if distance_meters <= 0.0 || duration_seconds == 0 || !distance_meters.is_finite() {
        return Metrics::default();
    }

    let duration = duration_seconds as f64;
    Metrics {
        pace_sec_per_km: duration / (distance_meters / METERS_PER_KM),
        avg_speed_kmh: (distance_meters / duration) * MS_TO_KMH,
    }
}
