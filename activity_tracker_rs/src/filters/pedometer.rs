use crate::config::TrackerConfig;
use crate::context::TrackingContext;
use crate::types::Advisory;
use log::{debug, info};

/// Step-count distance for walking and jogging while GPS is lost.
///
/// Only ever raises `distance_meters`: the override applies when
/// `steps * stride` exceeds the GPS distance after enough missed updates.
#[derive(Clone, Copy, Debug)]
pub struct PedometerFallback {
    miss_threshold: u32,
}

impl PedometerFallback {
    pub fn new(config: &TrackerConfig) -> Self {
        Self {
            miss_threshold: config.pedometer_miss_threshold,
        }
    }

    /// Fold a cumulative step reading into the session.
    ///
    /// Readings count from the start of the subscription; a reading lower
    /// than the previous one means the counter restarted from zero.
    pub fn on_steps(&self, ctx: &mut TrackingContext, cumulative_steps: u32) -> bool {
        ctx.stats.steps += Self::advance(ctx, cumulative_steps);
        self.evaluate(ctx)
    }

    /// Absorb a reading without counting it, e.g. while paused
    pub fn hold(&self, ctx: &mut TrackingContext, cumulative_steps: u32) {
        let skipped = Self::advance(ctx, cumulative_steps);
        if skipped > 0 {
            debug!("[pedometer] ignoring {skipped} steps");
        }
    }

    fn advance(ctx: &mut TrackingContext, cumulative_steps: u32) -> u32 {
        let delta = if cumulative_steps >= ctx.last_step_reading {
            cumulative_steps - ctx.last_step_reading
        } else {
            cumulative_steps
        };
        ctx.last_step_reading = cumulative_steps;
        delta
    }

    pub fn step_distance(&self, ctx: &TrackingContext) -> Option<f64> {
        if !ctx.activity.is_step_based() {
            return None;
        }
        ctx.profile
            .stride_length_m
            .map(|stride| ctx.stats.steps as f64 * stride)
    }

    /// Apply the override if the loss threshold is met; true when applied.
    pub fn evaluate(&self, ctx: &mut TrackingContext) -> bool {
        if ctx.missed_gps_updates < self.miss_threshold {
            return false;
        }
        let Some(step_distance) = self.step_distance(ctx) else {
            return false;
        };
        if step_distance <= ctx.stats.distance_meters {
            return false;
        }

        info!(
            "[pedometer] {} steps -> {:.1} m replaces GPS {:.1} m",
            ctx.stats.steps, step_distance, ctx.stats.distance_meters
        );
        ctx.stats.distance_meters = step_distance;
        ctx.refresh_metrics();
        if !ctx.pedometer_engaged {
            ctx.pedometer_engaged = true;
            ctx.advise(Advisory::PedometerFallback {
                distance_meters: step_distance,
            });
        }
        true
    }
}
