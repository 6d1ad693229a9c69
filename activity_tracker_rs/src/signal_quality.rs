use crate::config::{TierThresholds, TrackerConfig};
use crate::types::{ActivityProfile, LocationFix, SignalTier};
use log::{debug, info};
use std::collections::VecDeque;

/// Outcome of running a fix through the signal gate
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum GateDecision {
    /// Fix may be handed to the distance accumulator
    Pass,
    /// Coordinates or accuracy out of range
    Malformed,
    /// Timestamp does not advance past the previous fix
    Stale,
}

/// Tracks update cadence and accuracy of the GPS feed.
///
/// The expected update interval is the mean of the last few observed
/// intervals; the feed counts as stalled once silence exceeds
/// `stall_factor` times that mean.
#[derive(Clone, Debug)]
pub struct SignalQualityEstimator {
    intervals_ms: VecDeque<f64>,
    history: usize,
    stall_factor: f64,
    default_interval_ms: f64,
    accuracy_threshold_m: f64,
    tiers: TierThresholds,
    clear_after: u32,
    last_update_ms: Option<i64>,
    last_accuracy: Option<f64>,
    tier: SignalTier,
    good_streak: u32,
    error: Option<String>,
}

impl SignalQualityEstimator {
    pub fn new(config: &TrackerConfig, profile: &ActivityProfile) -> Self {
        SignalQualityEstimator {
            intervals_ms: VecDeque::with_capacity(config.interval_history),
            history: config.interval_history.max(1),
            stall_factor: config.stall_factor,
            default_interval_ms: profile.sampling_interval_ms as f64,
            accuracy_threshold_m: profile.accuracy_threshold_m,
            tiers: config.tiers,
            clear_after: config.clear_after_good_fixes,
            last_update_ms: None,
            last_accuracy: None,
            tier: SignalTier::Unknown,
            good_streak: 0,
            error: None,
        }
    }

    /// Gate and classify an incoming fix, updating the cadence history
    pub fn observe(&mut self, fix: &LocationFix) -> GateDecision {
        if !fix.is_valid() {
            debug!("[signal] malformed fix {fix:?}");
            return GateDecision::Malformed;
        }
        if let Some(last) = self.last_update_ms {
            if fix.timestamp_ms <= last {
                debug!("[signal] stale fix at {} (last {last})", fix.timestamp_ms);
                return GateDecision::Stale;
            }
            self.intervals_ms.push_back((fix.timestamp_ms - last) as f64);
            while self.intervals_ms.len() > self.history {
                self.intervals_ms.pop_front();
            }
        }
        self.last_update_ms = Some(fix.timestamp_ms);
        self.last_accuracy = Some(fix.accuracy);

        if fix.accuracy < self.accuracy_threshold_m {
            self.good_streak += 1;
            if self.good_streak >= self.clear_after && self.error.take().is_some() {
                info!("[signal] recovered after {} good fixes", self.good_streak);
            }
        } else {
            self.good_streak = 0;
            self.error = Some(format!(
                "accuracy {:.0} m not under {:.0} m limit",
                fix.accuracy, self.accuracy_threshold_m
            ));
        }

        self.set_tier(self.classify(fix.accuracy, false));
        GateDecision::Pass
    }

    /// Re-evaluate the tier against the clock; returns true while stalled.
    pub fn check_stall(&mut self, now_ms: i64) -> bool {
        if !self.is_stalled(now_ms) {
            return false;
        }
        let silent_for = self.last_update_ms.map_or(0, |last| now_ms - last);
        self.good_streak = 0;
        self.error = Some(format!("no GPS update for {:.1}s", silent_for as f64 / 1000.0));
        self.set_tier(SignalTier::Poor);
        true
    }

    pub fn is_stalled(&self, now_ms: i64) -> bool {
        self.last_update_ms
            .is_some_and(|last| (now_ms - last) as f64 > self.timeout_ms())
    }

    /// Mean of the recorded intervals, or the profile's sampling interval
    pub fn expected_interval_ms(&self) -> f64 {
        if self.intervals_ms.is_empty() {
            return self.default_interval_ms;
        }
        self.intervals_ms.iter().sum::<f64>() / self.intervals_ms.len() as f64
    }

    pub fn timeout_ms(&self) -> f64 {
        self.stall_factor * self.expected_interval_ms()
    }

    /// Tier for an accuracy reading.
    ///
    /// `Weak` replaces `Good`/`Fair` when the reading is at or above the
    /// activity threshold but updates still arrive on time.
    pub fn classify(&self, accuracy: f64, stalled: bool) -> SignalTier {
        if stalled {
            return SignalTier::Poor;
        }
        let base = if accuracy < self.tiers.excellent_below_m {
            SignalTier::Excellent
        } else if accuracy < self.tiers.good_below_m {
            SignalTier::Good
        } else if accuracy < self.tiers.fair_below_m {
            SignalTier::Fair
        } else {
            SignalTier::Poor
        };
        if accuracy >= self.accuracy_threshold_m && base != SignalTier::Poor {
            SignalTier::Weak
        } else {
            base
        }
    }

    /// Record a feed error reported by the sensor callback
    pub fn report_error(&mut self, message: String) {
        self.good_streak = 0;
        self.error = Some(message);
    }

    pub fn tier(&self) -> SignalTier {
        self.tier
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    pub fn last_accuracy(&self) -> Option<f64> {
        self.last_accuracy
    }

    pub fn last_update_ms(&self) -> Option<i64> {
        self.last_update_ms
    }

    /// Forget cadence history, e.g. across a pause
    pub fn reset_cadence(&mut self, now_ms: i64) {
        self.intervals_ms.clear();
        self.last_update_ms = Some(now_ms);
    }

    fn set_tier(&mut self, tier: SignalTier) {
        if tier != self.tier {
            debug!("[signal] tier {} -> {}", self.tier, tier);
            self.tier = tier;
        }
    }
}
