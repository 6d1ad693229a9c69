use crate::config::TrackerConfig;
use crate::metrics::compute_metrics;
use crate::signal_quality::SignalQualityEstimator;
use crate::smoothing::LiveSmoother;
use crate::types::{ActivityProfile, ActivityType, Advisory, LocationFix, SessionStats, TrackPoint};
use log::{debug, warn};
use serde::{Deserialize, Serialize};

/// Advisories kept for the caller between `take_advisories` calls
pub const MAX_PENDING_ADVISORIES: usize = 32;

/// Every fix received while tracking, split into segments at pauses.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct RawBuffer {
    segments: Vec<Vec<LocationFix>>,
}

impl RawBuffer {
    pub fn push(&mut self, fix: LocationFix) {
        match self.segments.last_mut() {
            Some(segment) => segment.push(fix),
            None => self.segments.push(vec![fix]),
        }
    }

    /// Close the current segment; the next fix opens a new one.
    pub fn break_segment(&mut self) {
        if self.segments.last().is_some_and(|s| !s.is_empty()) {
            self.segments.push(Vec::new());
        }
    }

    pub fn segments(&self) -> &[Vec<LocationFix>] {
        &self.segments
    }

    pub fn len(&self) -> usize {
        self.segments.iter().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Hand the buffer over, leaving an empty one behind
    pub fn take(&mut self) -> RawBuffer {
        std::mem::take(self)
    }
}

impl From<Vec<LocationFix>> for RawBuffer {
    fn from(fixes: Vec<LocationFix>) -> Self {
        RawBuffer {
            segments: vec![fixes],
        }
    }
}

/// Rolling state shared by the per-event handlers of one session.
///
/// Owned by the session and lent mutably to each component; nothing here is
/// captured in closures, so any state can be built directly in tests.
#[derive(Clone, Debug)]
pub struct TrackingContext {
    pub activity: ActivityType,
    pub profile: ActivityProfile,
    pub raw: RawBuffer,
    pub trace: Vec<TrackPoint>,
    pub stats: SessionStats,
    pub last_accepted: Option<TrackPoint>,
    pub smoother: LiveSmoother,
    pub signal: SignalQualityEstimator,
    pub consecutive_rejections: u32,
    pub missed_gps_updates: u32,
    /// Last cumulative reading from the step subscription
    pub last_step_reading: u32,
    pub pedometer_engaged: bool,
    pending: Vec<Advisory>,
    latest: Option<Advisory>,
    loss_threshold: u32,
}

impl TrackingContext {
    pub fn new(activity: ActivityType, config: &TrackerConfig) -> Self {
        let profile = config.profile_for(activity);
        TrackingContext {
            activity,
            profile,
            raw: RawBuffer::default(),
            trace: Vec::new(),
            stats: SessionStats::default(),
            last_accepted: None,
            smoother: LiveSmoother::new(config.live_smoothing_window),
            signal: SignalQualityEstimator::new(config, &profile),
            consecutive_rejections: 0,
            missed_gps_updates: 0,
            last_step_reading: 0,
            pedometer_engaged: false,
            pending: Vec::new(),
            latest: None,
            loss_threshold: config.pedometer_miss_threshold,
        }
    }

    /// Recompute pace and speed from the current distance and duration
    pub fn refresh_metrics(&mut self) {
        let metrics = compute_metrics(self.stats.distance_meters, self.stats.duration_seconds);
        self.stats.pace_sec_per_km = metrics.pace_sec_per_km;
        self.stats.avg_speed_kmh = metrics.avg_speed_kmh;
    }

    /// Count a GPS update that did not advance the track.
    ///
    /// Emits `SignalLost` once when the loss threshold is first reached.
    pub fn note_missed_update(&mut self) {
        self.missed_gps_updates += 1;
        if self.missed_gps_updates == self.loss_threshold {
            self.advise(Advisory::SignalLost {
                missed_updates: self.missed_gps_updates,
            });
        }
    }

    /// Queue an advisory for the caller.
    ///
    /// A repeat of the newest queued advisory is not queued again, and the
    /// queue keeps at most `MAX_PENDING_ADVISORIES`, dropping the oldest.
    pub fn advise(&mut self, advisory: Advisory) {
        self.latest = Some(advisory.clone());
        if self.pending.last() == Some(&advisory) {
            debug!("[tracking] repeated {advisory}");
            return;
        }
        warn!("[tracking] {advisory}");
        if self.pending.len() >= MAX_PENDING_ADVISORIES {
            self.pending.remove(0);
        }
        self.pending.push(advisory);
    }

    /// Advisories raised since the last call
    pub fn take_advisories(&mut self) -> Vec<Advisory> {
        std::mem::take(&mut self.pending)
    }

    pub fn latest_advisory(&self) -> Option<&Advisory> {
        self.latest.as_ref()
    }

    pub fn clear_latest_advisory(&mut self) {
        self.latest = None;
    }
}
