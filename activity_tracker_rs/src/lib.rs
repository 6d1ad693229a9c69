//! GPS activity tracking: live distance from a noisy position feed, a
//! pedometer fallback during signal loss, and an authoritative
//! reconciliation pass over the full raw track when the session stops.

pub mod config;
pub mod context;
pub mod error;
pub mod filters;
pub mod fix_log;
pub mod geodesy;
pub mod live_status;
pub mod metrics;
pub mod sensors;
pub mod session;
pub mod signal_quality;
pub mod smoothing;
pub mod storage;
pub mod types;

pub use config::TrackerConfig;
pub use context::{RawBuffer, TrackingContext};
pub use error::{SensorError, StoreError, TrackerError, TrackerResult};
pub use filters::{
    FixOutcome, LiveDistanceAccumulator, PedometerFallback, ReconciledTrack, Reconciler,
};
pub use fix_log::FixLog;
pub use live_status::LiveStatus;
pub use sensors::{LocationSensor, ScriptedSensor, StepReading, Subscription, WatchOptions};
pub use session::{ReplaySummary, RunExit, Session, SessionOptions, SessionState, StopOutcome};
pub use storage::{
    ActivityId, ActivityRecord, ActivityStore, DistanceSource, InMemoryStore, JsonFileStore,
};
pub use types::{
    ActivityProfile, ActivityType, Advisory, LocationFix, SessionStats, SignalTier, TrackPoint,
};
