use crate::config::TrackerConfig;
use crate::context::RawBuffer;
use crate::geodesy::{distance_meters, path_length};
use crate::metrics::{compute_metrics, Metrics};
use crate::smoothing::smooth_centered;
use crate::types::{ActivityProfile, LocationFix, TrackPoint};
use log::info;
use serde::{Deserialize, Serialize};

/// Final track and totals produced when a session stops
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ReconciledTrack {
    pub points: Vec<TrackPoint>,
    pub distance_meters: f64,
    pub duration_seconds: u64,
    pub metrics: Metrics,
    pub raw_count: usize,
    pub dropped_low_accuracy: usize,
    pub dropped_motion: usize,
}

impl ReconciledTrack {
    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }
}

/// Authoritative re-filter, re-smooth and re-sum over the whole raw buffer.
///
/// Segments (split at pauses) are cleaned independently and their lengths
/// added, so the gap across a pause contributes nothing.
#[derive(Clone, Copy, Debug)]
pub struct Reconciler {
    max_accuracy_m: f64,
    jitter_m: f64,
    radius: usize,
}

impl Reconciler {
    pub fn new(config: &TrackerConfig) -> Self {
        Self {
            max_accuracy_m: config.reconcile_max_accuracy_m,
            jitter_m: config.reconcile_jitter_m,
            radius: config.post_smoothing_radius,
        }
    }

    pub fn reconcile(
        &self,
        raw: &RawBuffer,
        profile: &ActivityProfile,
        duration_seconds: u64,
    ) -> ReconciledTrack {
        let mut track = ReconciledTrack {
            raw_count: raw.len(),
            ..ReconciledTrack::default()
        };

        for segment in raw.segments() {
            let accurate: Vec<LocationFix> = segment
                .iter()
                .filter(|fix| fix.is_valid() && fix.accuracy < self.max_accuracy_m)
                .copied()
                .collect();
            track.dropped_low_accuracy += segment.len() - accurate.len();

            let plausible = self.filter_motion(&accurate, profile);
            track.dropped_motion += accurate.len() - plausible.len();

            let smoothed = smooth_centered(&plausible, self.radius);
            track.distance_meters +=
                path_length(smoothed.iter().map(|p| (p.latitude, p.longitude)));
            track.points.extend(smoothed);
        }

        if track.points.is_empty() {
            info!("[reconcile] no usable fixes out of {}", track.raw_count);
            track.distance_meters = 0.0;
            return track;
        }

        track.duration_seconds = duration_seconds;
        track.metrics = compute_metrics(track.distance_meters, duration_seconds);
        info!(
            "[reconcile] {} raw -> {} points, {:.2} m (dropped {} inaccurate, {} implausible)",
            track.raw_count,
            track.points.len(),
            track.distance_meters,
            track.dropped_low_accuracy,
            track.dropped_motion
        );
        track
    }

    /// Keep a fix only if it moved far enough, and not too fast, from the
    /// previous surviving fix. The first fix always survives.
    fn filter_motion(&self, fixes: &[LocationFix], profile: &ActivityProfile) -> Vec<TrackPoint> {
        let mut kept: Vec<TrackPoint> = Vec::with_capacity(fixes.len());
        for fix in fixes {
            let Some(previous) = kept.last() else {
                kept.push(TrackPoint::from(*fix));
                continue;
            };
            let distance = distance_meters(
                previous.latitude,
                previous.longitude,
                fix.latitude,
                fix.longitude,
            );
            let elapsed = fix.seconds_since(previous.timestamp_ms).max(1.0);
            if distance > self.jitter_m && distance / elapsed < profile.max_speed_ms {
                kept.push(TrackPoint::from(*fix));
            }
        }
        kept
    }
}
