use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Sensor accuracy mode requested from the platform location service
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum AccuracyMode {
    High,
    BestForNavigation,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ActivityType {
    Walking,
    Running,
    Cycling,
    Jogging,
}

/// Per-activity tuning used by the filters and the sensor subscription
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct ActivityProfile {
    /// Fixes with a larger accuracy radius (m) are not folded into distance
    pub accuracy_threshold_m: f64,
    /// Segments faster than this (m/s) are treated as GPS jumps
    pub max_speed_ms: f64,
    /// Meters per step, only for step-based activities
    pub stride_length_m: Option<f64>,
    pub accuracy_mode: AccuracyMode,
    pub sampling_interval_ms: u64,
    pub min_distance_m: f64,
}

impl ActivityType {
    pub const ALL: [ActivityType; 4] = [
        ActivityType::Walking,
        ActivityType::Running,
        ActivityType::Cycling,
        ActivityType::Jogging,
    ];

    pub fn profile(self) -> ActivityProfile {
        match self {
            ActivityType::Walking => ActivityProfile {
                accuracy_threshold_m: 20.0,
                max_speed_ms: 8.0,
                stride_length_m: Some(0.7),
                accuracy_mode: AccuracyMode::High,
                sampling_interval_ms: 2000,
                min_distance_m: 2.0,
            },
            ActivityType::Jogging => ActivityProfile {
                accuracy_threshold_m: 15.0,
                max_speed_ms: 8.0,
                stride_length_m: Some(1.0),
                accuracy_mode: AccuracyMode::High,
                sampling_interval_ms: 1000,
                min_distance_m: 3.0,
            },
            ActivityType::Running => ActivityProfile {
                accuracy_threshold_m: 15.0,
                max_speed_ms: 12.0,
                stride_length_m: None,
                accuracy_mode: AccuracyMode::BestForNavigation,
                sampling_interval_ms: 1000,
                min_distance_m: 3.0,
            },
            ActivityType::Cycling => ActivityProfile {
                accuracy_threshold_m: 20.0,
                max_speed_ms: 25.0,
                stride_length_m: None,
                accuracy_mode: AccuracyMode::BestForNavigation,
                sampling_interval_ms: 1000,
                min_distance_m: 5.0,
            },
        }
    }

    /// Walking and jogging can fall back to the pedometer during GPS loss.
    pub fn is_step_based(self) -> bool {
        matches!(self, ActivityType::Walking | ActivityType::Jogging)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ActivityType::Walking => "walking",
            ActivityType::Running => "running",
            ActivityType::Cycling => "cycling",
            ActivityType::Jogging => "jogging",
        }
    }
}

impl fmt::Display for ActivityType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ActivityType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "walking" | "walk" => Ok(ActivityType::Walking),
            "running" | "run" => Ok(ActivityType::Running),
            "cycling" | "bike" => Ok(ActivityType::Cycling),
            "jogging" | "jog" => Ok(ActivityType::Jogging),
            other => Err(format!("unknown activity type '{other}'")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_running_class_thresholds() {
        assert_eq!(ActivityType::Running.profile().accuracy_threshold_m, 15.0);
        assert_eq!(ActivityType::Jogging.profile().accuracy_threshold_m, 15.0);
        assert_eq!(ActivityType::Walking.profile().accuracy_threshold_m, 20.0);
        assert_eq!(ActivityType::Cycling.profile().accuracy_threshold_m, 20.0);
    }

    #[test]
    fn test_stride_only_for_step_based() {
        for activity in ActivityType::ALL {
            assert_eq!(
                activity.profile().stride_length_m.is_some(),
                activity.is_step_based()
            );
        }
        assert_eq!(ActivityType::Walking.profile().stride_length_m, Some(0.7));
        assert_eq!(ActivityType::Jogging.profile().stride_length_m, Some(1.0));
    }

    #[test]
    fn test_parse_activity() {
        assert_eq!("Run".parse::<ActivityType>(), Ok(ActivityType::Running));
        assert_eq!(" walking ".parse::<ActivityType>(), Ok(ActivityType::Walking));
        assert!("swimming".parse::<ActivityType>().is_err());
    }

    #[test]
    fn test_serde_lowercase() {
        let json = serde_json::to_string(&ActivityType::Cycling).unwrap();
        assert_eq!(json, "\"cycling\"");
    }
}
