pub mod activity;

pub use activity::*;

use serde::{Deserialize, Serialize};
use std::fmt;

/// One raw sample from the location sensor.
///
/// `accuracy` is the reported radius of uncertainty in meters and
/// `timestamp_ms` is milliseconds since the Unix epoch.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct LocationFix {
    pub latitude: f64,
    pub longitude: f64,
    pub accuracy: f64,
    pub timestamp_ms: i64,
}

impl LocationFix {
    pub fn new(latitude: f64, longitude: f64, accuracy: f64, timestamp_ms: i64) -> Self {
        Self {
            latitude,
            longitude,
            accuracy,
            timestamp_ms,
        }
    }

    /// Coordinates within WGS84 bounds and a finite, non-negative accuracy.
    pub fn is_valid(&self) -> bool {
        self.latitude.is_finite()
            && self.longitude.is_finite()
            && (-90.0..=90.0).contains(&self.latitude)
            && (-180.0..=180.0).contains(&self.longitude)
            && self.accuracy.is_finite()
            && self.accuracy >= 0.0
    }

    /// Seconds elapsed since `earlier`, never negative.
    pub fn seconds_since(&self, earlier_ms: i64) -> f64 {
        (self.timestamp_ms - earlier_ms).max(0) as f64 / 1000.0
    }
}

/// A fix after smoothing, as drawn on the live map and persisted with the record.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct TrackPoint {
    pub latitude: f64,
    pub longitude: f64,
    pub accuracy: f64,
    pub timestamp_ms: i64,
}

impl TrackPoint {
    /// Same point with its position replaced, accuracy and timestamp untouched.
    pub fn with_position(&self, latitude: f64, longitude: f64) -> Self {
        Self {
            latitude,
            longitude,
            ..*self
        }
    }
}

impl From<LocationFix> for TrackPoint {
    fn from(fix: LocationFix) -> Self {
        Self {
            latitude: fix.latitude,
            longitude: fix.longitude,
            accuracy: fix.accuracy,
            timestamp_ms: fix.timestamp_ms,
        }
    }
}

/// Running aggregate shown to the user while tracking.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct SessionStats {
    pub distance_meters: f64,
    pub duration_seconds: u64,
    pub pace_sec_per_km: f64,
    pub avg_speed_kmh: f64,
    pub steps: u32,
}

/// Qualitative GPS quality derived from the latest accuracy and update cadence
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum SignalTier {
    #[default]
    Unknown,
    Excellent,
    Good,
    Fair,
    Weak,
    Poor,
}

impl fmt::Display for SignalTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            SignalTier::Unknown => "unknown",
            SignalTier::Excellent => "excellent",
            SignalTier::Good => "good",
            SignalTier::Fair => "fair",
            SignalTier::Weak => "weak",
            SignalTier::Poor => "poor",
        };
        f.write_str(label)
    }
}

/// Non-fatal conditions surfaced to the caller while tracking continues
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum Advisory {
    /// The position feed reported an error
    SignalDegraded(String),
    /// Consecutive missed or rejected updates reached the loss threshold
    SignalLost { missed_updates: u32 },
    /// Too many consecutive fixes were rejected by the live accumulator
    PoorAccuracy { rejected: u32 },
    /// Step-derived distance replaced the GPS distance
    PedometerFallback { distance_meters: f64 },
}

impl fmt::Display for Advisory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Advisory::SignalDegraded(reason) => write!(f, "GPS signal degraded: {reason}"),
            Advisory::SignalLost { missed_updates } => {
                write!(f, "GPS signal lost ({missed_updates} missed updates)")
            }
            Advisory::PoorAccuracy { rejected } => {
                write!(f, "Poor GPS accuracy ({rejected} fixes rejected in a row)")
            }
            Advisory::PedometerFallback { distance_meters } => {
                write!(f, "Using step count for distance ({distance_meters:.1} m)")
            }
        }
    }
}
