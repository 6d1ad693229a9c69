use crate::config::TrackerConfig;
use crate::context::TrackingContext;
use crate::geodesy::distance_meters;
use crate::types::{Advisory, LocationFix, TrackPoint};
use log::debug;

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum RejectReason {
    /// Segment shorter than the jitter floor
    Jitter { distance_m: f64 },
    /// Implied speed above the activity ceiling
    TooFast { speed_ms: f64 },
    /// Reported accuracy at or above the activity threshold
    LowAccuracy { accuracy_m: f64 },
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum FixOutcome {
    /// First usable point of the session or segment; no distance added
    Seeded,
    Accepted { segment_m: f64 },
    Rejected(RejectReason),
}

/// Incremental distance from gated, smoothed fixes.
///
/// A rejected fix leaves the running totals and the last accepted point
/// untouched, so distance never decreases while tracking.
#[derive(Clone, Copy, Debug)]
pub struct LiveDistanceAccumulator {
    jitter_m: f64,
    rejection_advisory_after: u32,
}

impl LiveDistanceAccumulator {
    pub fn new(config: &TrackerConfig) -> Self {
        Self {
            jitter_m: config.live_jitter_m,
            rejection_advisory_after: config.rejection_advisory_after,
        }
    }

    pub fn on_fix(&self, ctx: &mut TrackingContext, fix: &LocationFix) -> FixOutcome {
        let threshold = ctx.profile.accuracy_threshold_m;
        let smoothed = ctx.smoother.apply(fix);

        let Some(last) = ctx.last_accepted else {
            if fix.accuracy >= threshold {
                return self.reject(ctx, RejectReason::LowAccuracy { accuracy_m: fix.accuracy });
            }
            self.accept(ctx, fix, smoothed, 0.0);
            return FixOutcome::Seeded;
        };

        let segment_m = distance_meters(
            last.latitude,
            last.longitude,
            smoothed.latitude,
            smoothed.longitude,
        );
        let elapsed_s = fix.seconds_since(last.timestamp_ms).max(1.0);
        let speed_ms = segment_m / elapsed_s;

        let reason = if fix.accuracy >= threshold {
            Some(RejectReason::LowAccuracy { accuracy_m: fix.accuracy })
        } else if segment_m < self.jitter_m {
            Some(RejectReason::Jitter { distance_m: segment_m })
        } else if speed_ms > ctx.profile.max_speed_ms {
            Some(RejectReason::TooFast { speed_ms })
        } else {
            None
        };

        match reason {
            Some(reason) => self.reject(ctx, reason),
            None => {
                self.accept(ctx, fix, smoothed, segment_m);
                FixOutcome::Accepted { segment_m }
            }
        }
    }

    fn accept(
        &self,
        ctx: &mut TrackingContext,
        fix: &LocationFix,
        point: TrackPoint,
        segment_m: f64,
    ) {
        ctx.stats.distance_meters += segment_m;
        ctx.trace.push(point);
        ctx.smoother.accept(fix);
        ctx.last_accepted = Some(point);
        ctx.consecutive_rejections = 0;
        ctx.missed_gps_updates = 0;
        ctx.refresh_metrics();
    }

    fn reject(&self, ctx: &mut TrackingContext, reason: RejectReason) -> FixOutcome {
        debug!("[accumulator] rejected fix: {reason:?}");
        ctx.consecutive_rejections += 1;
        if ctx.consecutive_rejections == self.rejection_advisory_after {
            ctx.advise(Advisory::PoorAccuracy {
                rejected: ctx.consecutive_rejections,
            });
        }
        ctx.note_missed_update();
        FixOutcome::Rejected(reason)
    }
}
