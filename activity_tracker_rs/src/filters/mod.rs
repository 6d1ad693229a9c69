pub mod accumulator;
pub mod pedometer;
pub mod reconciler;

pub use accumulator::{FixOutcome, LiveDistanceAccumulator, RejectReason};
pub use pedometer::PedometerFallback;
pub use reconciler::{ReconciledTrack, Reconciler};
