use crate::error::{TrackerError, TrackerResult};
use crate::types::{ActivityProfile, ActivityType};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::path::Path;

/// Accuracy cut-offs (meters) for the signal tiers
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TierThresholds {
    pub excellent_below_m: f64,
    pub good_below_m: f64,
    pub fair_below_m: f64,
}

impl Default for TierThresholds {
    fn default() -> Self {
        Self {
            excellent_below_m: 8.0,
            good_below_m: 15.0,
            fair_below_m: 25.0,
        }
    }
}

/// Every tunable constant of the tracking pipeline.
///
/// The live and reconciliation jitter floors are independent: the first
/// filters smoothed live points, the second raw fixes.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrackerConfig {
    /// Live segments shorter than this (m) are jitter
    pub live_jitter_m: f64,
    /// Reconciled segments must be longer than this (m)
    pub reconcile_jitter_m: f64,
    /// Raw fixes at or above this accuracy (m) never reach the final track
    pub reconcile_max_accuracy_m: f64,
    /// Prior accepted points needed before live smoothing kicks in
    pub live_smoothing_window: usize,
    /// Half width of the centered post-processing window
    pub post_smoothing_radius: usize,
    /// Inter-update intervals kept for the dynamic timeout
    pub interval_history: usize,
    /// Stall timeout as a multiple of the average interval
    pub stall_factor: f64,
    /// Consecutive live rejections before the poor-accuracy advisory
    pub rejection_advisory_after: u32,
    /// Consecutive missed GPS updates before the pedometer may take over
    pub pedometer_miss_threshold: u32,
    /// Consecutive good fixes that clear a standing signal error
    pub clear_after_good_fixes: u32,
    pub tiers: TierThresholds,
    /// Replaces the built-in profile for the given activity type
    pub profile_overrides: HashMap<ActivityType, ActivityProfile>,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            live_jitter_m: 3.0,
            reconcile_jitter_m: 3.0,
            reconcile_max_accuracy_m: 50.0,
            live_smoothing_window: 5,
            post_smoothing_radius: 2,
            interval_history: 5,
            stall_factor: 3.0,
            rejection_advisory_after: 5,
            pedometer_miss_threshold: 5,
            clear_after_good_fixes: 2,
            tiers: TierThresholds::default(),
            profile_overrides: HashMap::new(),
        }
    }
}

impl TrackerConfig {
    /// Read a JSON config file; missing keys fall back to defaults.
    pub fn load(path: &Path) -> TrackerResult<Self> {
        let text = fs::read_to_string(path)
            .map_err(|e| TrackerError::Config(format!("{}: {e}", path.display())))?;
        let config: TrackerConfig = serde_json::from_str(&text)
            .map_err(|e| TrackerError::Config(format!("{}: {e}", path.display())))?;
        config.validate()?;
        Ok(config)
    }

    /// `load` when a path is given, defaults otherwise.
    pub fn load_or_default(path: Option<&Path>) -> TrackerResult<Self> {
        match path {
            Some(path) => Self::load(path),
            None => Ok(Self::default()),
        }
    }

    pub fn validate(&self) -> TrackerResult<()> {
        let positive = [
            ("live_jitter_m", self.live_jitter_m),
            ("reconcile_jitter_m", self.reconcile_jitter_m),
            ("reconcile_max_accuracy_m", self.reconcile_max_accuracy_m),
            ("stall_factor", self.stall_factor),
        ];
        for (name, value) in positive {
            if !value.is_finite() || value <= 0.0 {
                return Err(TrackerError::Config(format!("{name} must be > 0, got {value}")));
            }
        }
        if self.interval_history == 0 {
            return Err(TrackerError::Config("interval_history must be > 0".to_string()));
        }
        let tiers = &self.tiers;
        let ordered = tiers.excellent_below_m < tiers.good_below_m
            && tiers.good_below_m < tiers.fair_below_m;
        if !ordered {
            return Err(TrackerError::Config(
                "tier thresholds must be strictly increasing".to_string(),
            ));
        }
        for (activity, profile) in &self.profile_overrides {
            if profile.max_speed_ms <= 0.0 || profile.accuracy_threshold_m <= 0.0 {
                return Err(TrackerError::Config(format!(
                    "profile override for {activity} needs positive speed and accuracy limits"
                )));
            }
        }
        Ok(())
    }

    /// Built-in profile unless overridden.
    pub fn profile_for(&self, activity: ActivityType) -> ActivityProfile {
        self.profile_overrides
            .get(&activity)
            .copied()
            .unwrap_or_else(|| activity.profile())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults_are_valid() {
        let config = TrackerConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.live_jitter_m, config.reconcile_jitter_m);
        assert_eq!(config.reconcile_max_accuracy_m, 50.0);
    }

    #[test]
    fn test_partial_file_uses_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{ "reconcile_jitter_m": 4.5 }}"#).unwrap();

        let config = TrackerConfig::load(file.path()).unwrap();
        assert_eq!(config.reconcile_jitter_m, 4.5);
        assert_eq!(config.live_jitter_m, 3.0);
        assert_eq!(config.tiers, TierThresholds::default());
    }

    #[test]
    fn test_profile_override() {
        let mut lenient = ActivityType::Walking.profile();
        lenient.accuracy_threshold_m = 80.0;

        let mut config = TrackerConfig::default();
        config.profile_overrides.insert(ActivityType::Walking, lenient);

        assert_eq!(config.profile_for(ActivityType::Walking).accuracy_threshold_m, 80.0);
        assert_eq!(config.profile_for(ActivityType::Running), ActivityType::Running.profile());
    }

    #[test]
    fn test_rejects_bad_tiers() {
        let config = TrackerConfig {
            tiers: TierThresholds {
                excellent_below_m: 20.0,
                good_below_m: 15.0,
                fair_below_m: 25.0,
            },
            ..TrackerConfig::default()
        };
        assert!(matches!(config.validate(), Err(TrackerError::Config(_))));
    }

    #[test]
    fn test_missing_file() {
        let result = TrackerConfig::load(Path::new("/nonexistent/tracker.json"));
        assert!(matches!(result, Err(TrackerError::Config(_))));
    }
}
