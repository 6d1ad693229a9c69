use crate::config::TrackerConfig;
use crate::context::TrackingContext;
use crate::error::{TrackerError, TrackerResult};
use crate::filters::{
    FixOutcome, LiveDistanceAccumulator, PedometerFallback, ReconciledTrack, Reconciler,
};
use crate::live_status::LiveStatus;
use crate::sensors::{LocationSensor, PositionEvent, StepReading, Subscription, WatchOptions};
use crate::signal_quality::GateDecision;
use crate::storage::{ActivityId, ActivityRecord, ActivityStore, DistanceSource};
use crate::types::{ActivityType, Advisory, LocationFix, SessionStats, TrackPoint};
use chrono::{DateTime, Utc};
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::future::Future;
use tokio::time::{interval_at, Duration, Instant, Interval};

const TICK: Duration = Duration::from_secs(1);
const TICK_MS: i64 = 1000;

/// Session state machine states
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SessionState {
    /// Created or reset, not tracking
    Idle,
    /// Subscribed and accumulating
    Tracking,
    /// Subscriptions alive, events ignored and duration frozen
    Paused,
    /// Reconciled and handed to the store; terminal until reset
    Stopped,
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            SessionState::Idle => "idle",
            SessionState::Tracking => "tracking",
            SessionState::Paused => "paused",
            SessionState::Stopped => "stopped",
        };
        f.write_str(label)
    }
}

/// Who is tracking what, and the goals they set
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionOptions {
    pub user_id: String,
    pub activity_type: ActivityType,
    pub target_distance: Option<f64>,
    pub target_time: Option<u64>,
    /// Sensor milliseconds per wall millisecond, above 1 for sped-up playback
    pub clock_rate: f64,
}

impl SessionOptions {
    pub fn new(user_id: impl Into<String>, activity_type: ActivityType) -> Self {
        Self {
            user_id: user_id.into(),
            activity_type,
            target_distance: None,
            target_time: None,
            clock_rate: 1.0,
        }
    }

    pub fn with_targets(mut self, distance_m: Option<f64>, time_s: Option<u64>) -> Self {
        self.target_distance = distance_m;
        self.target_time = time_s;
        self
    }

    pub fn with_clock_rate(mut self, rate: f64) -> Self {
        self.clock_rate = rate;
        self
    }
}

/// Result of a completed `stop()`
#[derive(Debug, Clone)]
pub struct StopOutcome {
    pub activity_id: ActivityId,
    pub record: ActivityRecord,
    pub reconciled: ReconciledTrack,
    /// Live distance just before reconciliation replaced it
    pub live_distance_meters: f64,
}

/// Live and reconciled results of replaying a recorded log
#[derive(Debug, Clone, Serialize)]
pub struct ReplaySummary {
    pub live: SessionStats,
    pub reconciled: ReconciledTrack,
    pub advisories: Vec<Advisory>,
    pub pedometer_fallback_used: bool,
}

/// Why [`Session::run_until`] returned
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunExit {
    Shutdown,
    /// The position subscription ended on the sensor side
    FeedClosed,
    NotRunning,
}

/// Time base for stall checks: the device clock while live, fix time in replay
#[derive(Debug, Clone, Copy)]
enum Clock {
    /// Sensor and wall time at the initial fix; sensor time runs `rate` times wall time
    Wall {
        sensor_origin_ms: i64,
        wall_origin_ms: i64,
        rate: f64,
    },
    Virtual { now_ms: i64 },
}

impl Clock {
    fn now_ms(&self, wall_ms: i64) -> i64 {
        match *self {
            Clock::Wall {
                sensor_origin_ms,
                wall_origin_ms,
                rate,
            } => sensor_origin_ms + ((wall_ms - wall_origin_ms) as f64 * rate).round() as i64,
            Clock::Virtual { now_ms } => now_ms,
        }
    }
}

enum SessionEvent {
    Shutdown,
    Position(Option<PositionEvent>),
    Steps(Option<u32>),
    Tick,
}

/// One tracking session: owns the sensor feeds, the ticker and the
/// [`TrackingContext`] every handler works on.
///
/// Handlers are synchronous and each runs to completion; the only await
/// points are permission and initial-fix requests in `start()` and the
/// store call in `stop()`.
pub struct Session<S: LocationSensor> {
    sensor: S,
    config: TrackerConfig,
    options: SessionOptions,
    session_id: String,
    state: SessionState,
    ctx: TrackingContext,
    accumulator: LiveDistanceAccumulator,
    pedometer: PedometerFallback,
    reconciler: Reconciler,
    position_sub: Option<Subscription<PositionEvent>>,
    step_sub: Option<Subscription<u32>>,
    ticker: Option<Interval>,
    started_at: Option<DateTime<Utc>>,
    clock: Clock,
}

impl<S: LocationSensor> Session<S> {
    pub fn new(sensor: S, config: TrackerConfig, options: SessionOptions) -> TrackerResult<Self> {
        config.validate()?;
        if options.user_id.trim().is_empty() {
            return Err(TrackerError::InvalidParameters("user id is empty".to_string()));
        }
        if options.target_distance.is_some_and(|d| !d.is_finite() || d <= 0.0) {
            return Err(TrackerError::InvalidParameters(
                "target distance must be positive".to_string(),
            ));
        }
        if !options.clock_rate.is_finite() || options.clock_rate <= 0.0 {
            return Err(TrackerError::InvalidParameters(
                "clock rate must be positive".to_string(),
            ));
        }

        Ok(Session {
            ctx: TrackingContext::new(options.activity_type, &config),
            accumulator: LiveDistanceAccumulator::new(&config),
            pedometer: PedometerFallback::new(&config),
            reconciler: Reconciler::new(&config),
            session_id: new_session_id(),
            sensor,
            config,
            options,
            state: SessionState::Idle,
            position_sub: None,
            step_sub: None,
            ticker: None,
            started_at: None,
            clock: Clock::Virtual { now_ms: 0 },
        })
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn is_active(&self) -> bool {
        matches!(self.state, SessionState::Tracking | SessionState::Paused)
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    pub fn options(&self) -> &SessionOptions {
        &self.options
    }

    pub fn stats(&self) -> SessionStats {
        self.ctx.stats
    }

    /// Live trace while tracking; the reconciled track once stopped
    pub fn trace(&self) -> &[TrackPoint] {
        &self.ctx.trace
    }

    pub fn context(&self) -> &TrackingContext {
        &self.ctx
    }

    pub fn take_advisories(&mut self) -> Vec<Advisory> {
        self.ctx.take_advisories()
    }

    /// Begin tracking.
    ///
    /// Requests permissions, takes one immediate high-accuracy fix, then
    /// opens the position watch, the pedometer (walking and jogging) and the
    /// 1 Hz ticker. On failure the session stays `Idle`.
    pub async fn start(&mut self) -> TrackerResult<()> {
        match self.state {
            SessionState::Tracking | SessionState::Paused => {
                debug!("[session] start() ignored, already {}", self.state);
                return Ok(());
            }
            SessionState::Stopped => {
                return Err(TrackerError::InvalidState(
                    "session already stopped; reset() before starting again".to_string(),
                ));
            }
            SessionState::Idle => {}
        }

        let activity = self.options.activity_type;
        info!("[session] starting {activity} session {}", self.session_id);

        self.sensor
            .request_permissions(activity.is_step_based())
            .await
            .map_err(TrackerError::from_start_failure)?;

        let initial = self
            .sensor
            .current_fix(WatchOptions::initial_fix())
            .await
            .map_err(TrackerError::from_start_failure)?;
        if !initial.is_valid() {
            return Err(TrackerError::InitialFixFailure(format!(
                "sensor returned an invalid fix {initial:?}"
            )));
        }

        let profile = self.config.profile_for(activity);
        let position_sub = self
            .sensor
            .watch_position(WatchOptions::from_profile(&profile))
            .map_err(|e| TrackerError::SensorFailed(e.to_string()))?;
        let step_sub = if activity.is_step_based() {
            match self.sensor.watch_step_count() {
                Ok(sub) => Some(sub),
                Err(e) => {
                    warn!("[session] pedometer unavailable, continuing without it: {e}");
                    None
                }
            }
        } else {
            None
        };

        self.begin(initial);
        self.clock = Clock::Wall {
            sensor_origin_ms: initial.timestamp_ms,
            wall_origin_ms: Utc::now().timestamp_millis(),
            rate: self.options.clock_rate,
        };
        self.position_sub = Some(position_sub);
        self.step_sub = step_sub;
        self.ticker = Some(interval_at(Instant::now() + TICK, TICK));
        self.started_at = Some(Utc::now());
        Ok(())
    }

    /// Fresh context seeded with the initial fix; enters `Tracking`
    fn begin(&mut self, initial: LocationFix) {
        self.ctx = TrackingContext::new(self.options.activity_type, &self.config);
        self.clock = Clock::Virtual {
            now_ms: initial.timestamp_ms,
        };
        self.ctx.raw.push(initial);
        self.ctx.signal.observe(&initial);
        self.accumulator.on_fix(&mut self.ctx, &initial);
        self.state = SessionState::Tracking;
        info!(
            "[session] tracking from ({:.6}, {:.6}) accuracy {:.1} m",
            initial.latitude, initial.longitude, initial.accuracy
        );
    }

    /// Position callback: errors become advisory state, never propagate.
    pub fn on_position_event(&mut self, event: PositionEvent) -> Option<FixOutcome> {
        match event {
            Ok(fix) => self.on_fix(fix),
            Err(error) => {
                if self.state == SessionState::Tracking {
                    self.ctx.signal.report_error(error.to_string());
                    self.ctx.advise(Advisory::SignalDegraded(error.to_string()));
                    self.ctx.note_missed_update();
                }
                None
            }
        }
    }

    pub fn on_fix(&mut self, fix: LocationFix) -> Option<FixOutcome> {
        self.advance_clock(fix.timestamp_ms);
        if self.state != SessionState::Tracking {
            debug!("[session] discarding fix while {}", self.state);
            return None;
        }

        self.ctx.raw.push(fix);
        let outcome = match self.ctx.signal.observe(&fix) {
            GateDecision::Pass => Some(self.accumulator.on_fix(&mut self.ctx, &fix)),
            decision => {
                debug!("[session] fix failed gate: {decision:?}");
                self.ctx.note_missed_update();
                None
            }
        };
        self.pedometer.evaluate(&mut self.ctx);
        outcome
    }

    /// Pedometer callback with the cumulative count since subscribing
    pub fn on_steps(&mut self, cumulative_steps: u32) {
        match self.state {
            SessionState::Tracking => {
                self.pedometer.on_steps(&mut self.ctx, cumulative_steps);
            }
            SessionState::Paused => self.pedometer.hold(&mut self.ctx, cumulative_steps),
            _ => {}
        }
    }

    /// One-second ticker: advance duration, re-derive metrics, check for stalls.
    pub fn on_tick(&mut self, now_ms: i64) {
        self.advance_clock(now_ms);
        if self.state != SessionState::Tracking {
            return;
        }
        self.ctx.stats.duration_seconds += 1;
        self.ctx.refresh_metrics();
        if self.ctx.signal.check_stall(now_ms) {
            self.ctx.note_missed_update();
        }
        self.pedometer.evaluate(&mut self.ctx);
    }

    pub fn pause(&mut self) -> TrackerResult<()> {
        if self.state != SessionState::Tracking {
            return Err(TrackerError::InvalidState(format!("cannot pause while {}", self.state)));
        }
        self.ctx.raw.break_segment();
        self.ctx.last_accepted = None;
        self.ctx.smoother.clear();
        self.state = SessionState::Paused;
        info!("[session] paused at {:.1} m", self.ctx.stats.distance_meters);
        Ok(())
    }

    pub fn resume(&mut self) -> TrackerResult<()> {
        if self.state != SessionState::Paused {
            return Err(TrackerError::InvalidState(format!("cannot resume while {}", self.state)));
        }
        self.ctx.signal.reset_cadence(self.sensor_now_ms());
        self.state = SessionState::Tracking;
        info!("[session] resumed");
        Ok(())
    }

    /// Drive the session from its subscriptions until `shutdown` resolves,
    /// the position feed closes, or the session leaves the active states.
    pub async fn run_until<F>(&mut self, shutdown: F) -> RunExit
    where
        F: Future<Output = ()>,
    {
        tokio::pin!(shutdown);
        loop {
            if !self.is_active() {
                return RunExit::NotRunning;
            }

            let event = tokio::select! {
                _ = &mut shutdown => SessionEvent::Shutdown,
                event = next_event(&mut self.position_sub) => SessionEvent::Position(event),
                steps = next_event(&mut self.step_sub) => SessionEvent::Steps(steps),
                _ = next_tick(&mut self.ticker) => SessionEvent::Tick,
            };

            match event {
                SessionEvent::Shutdown => return RunExit::Shutdown,
                SessionEvent::Position(Some(event)) => {
                    self.on_position_event(event);
                }
                SessionEvent::Position(None) => {
                    info!("[session] position feed closed");
                    self.position_sub = None;
                    return RunExit::FeedClosed;
                }
                SessionEvent::Steps(Some(steps)) => self.on_steps(steps),
                SessionEvent::Steps(None) => {
                    debug!("[session] step feed closed");
                    self.step_sub = None;
                }
                SessionEvent::Tick => {
                    let now_ms = self.sensor_now_ms();
                    self.on_tick(now_ms);
                }
            }
        }
    }

    /// Stop tracking, reconcile the full raw buffer and save the record.
    ///
    /// A no-op returning `Ok(None)` when nothing is being tracked.
    pub async fn stop(&mut self, store: &dyn ActivityStore) -> TrackerResult<Option<StopOutcome>> {
        if !self.is_active() {
            debug!("[session] stop() ignored while {}", self.state);
            return Ok(None);
        }

        let live_distance_meters = self.ctx.stats.distance_meters;
        let reconciled = self.finish();
        let record = self.build_record();
        let activity_id = store.save_activity(record.clone()).await?;
        info!(
            "[session] saved {activity_id}: {:.1} m in {}s",
            record.distance_meters, record.duration_seconds
        );

        Ok(Some(StopOutcome {
            activity_id,
            record,
            reconciled,
            live_distance_meters,
        }))
    }

    /// Cancel every feed, then replace the live trace and stats with the
    /// reconciled result. Leaves the session `Stopped`.
    fn finish(&mut self) -> ReconciledTrack {
        self.cancel_feeds();

        let raw = self.ctx.raw.take();
        let reconciled = self
            .reconciler
            .reconcile(&raw, &self.ctx.profile, self.ctx.stats.duration_seconds);

        self.ctx.trace = reconciled.points.clone();
        self.ctx.last_accepted = self.ctx.trace.last().copied();
        self.ctx.stats.distance_meters = reconciled.distance_meters;
        self.ctx.stats.duration_seconds = reconciled.duration_seconds;
        self.ctx.stats.pace_sec_per_km = reconciled.metrics.pace_sec_per_km;
        self.ctx.stats.avg_speed_kmh = reconciled.metrics.avg_speed_kmh;
        self.state = SessionState::Stopped;
        reconciled
    }

    fn cancel_feeds(&mut self) {
        if let Some(mut sub) = self.position_sub.take() {
            sub.cancel();
        }
        if let Some(mut sub) = self.step_sub.take() {
            sub.cancel();
        }
        self.ticker = None;
    }

    fn build_record(&self) -> ActivityRecord {
        let stats = self.ctx.stats;
        ActivityRecord {
            user_id: self.options.user_id.clone(),
            activity_type: self.options.activity_type,
            distance_meters: stats.distance_meters,
            duration_seconds: stats.duration_seconds,
            pace: stats.pace_sec_per_km,
            avg_speed: stats.avg_speed_kmh,
            steps: stats.steps,
            coordinates: self.ctx.trace.clone(),
            target_distance: self.options.target_distance,
            target_time: self.options.target_time,
            created_at: None,
            distance_source: if self.ctx.pedometer_engaged {
                DistanceSource::Pedometer
            } else {
                DistanceSource::Gps
            },
            pedometer_fallback_used: self.ctx.pedometer_engaged,
        }
    }

    /// Return a stopped session to `Idle` with a fresh context
    pub fn reset(&mut self) -> TrackerResult<()> {
        if self.is_active() {
            return Err(TrackerError::InvalidState(format!("cannot reset while {}", self.state)));
        }
        self.cancel_feeds();
        self.ctx = TrackingContext::new(self.options.activity_type, &self.config);
        self.session_id = new_session_id();
        self.started_at = None;
        self.clock = Clock::Virtual { now_ms: 0 };
        self.state = SessionState::Idle;
        Ok(())
    }

    /// Feed a recorded log through the live handlers, ticking once per
    /// second of fix time, then reconcile.
    ///
    /// Step readings are delivered in timestamp order between fixes and ticks.
    pub fn replay(
        &mut self,
        fixes: &[LocationFix],
        steps: &[StepReading],
    ) -> TrackerResult<ReplaySummary> {
        if self.state != SessionState::Idle {
            return Err(TrackerError::InvalidState(format!("cannot replay while {}", self.state)));
        }
        let Some((first, rest)) = fixes.split_first() else {
            return Err(TrackerError::InvalidParameters("fix log is empty".to_string()));
        };

        self.begin(*first);
        let mut pending_steps = steps.iter().peekable();
        let mut next_tick_ms = first.timestamp_ms + TICK_MS;

        for fix in rest {
            while next_tick_ms <= fix.timestamp_ms {
                while let Some(reading) =
                    pending_steps.next_if(|r| r.timestamp_ms <= next_tick_ms)
                {
                    self.on_steps(reading.cumulative_steps);
                }
                self.on_tick(next_tick_ms);
                next_tick_ms += TICK_MS;
            }
            while let Some(reading) =
                pending_steps.next_if(|r| r.timestamp_ms <= fix.timestamp_ms)
            {
                self.on_steps(reading.cumulative_steps);
            }
            self.on_fix(*fix);
        }
        for reading in pending_steps {
            self.on_steps(reading.cumulative_steps);
        }

        let live = self.ctx.stats;
        let pedometer_fallback_used = self.ctx.pedometer_engaged;
        let reconciled = self.finish();
        Ok(ReplaySummary {
            live,
            reconciled,
            advisories: self.ctx.take_advisories(),
            pedometer_fallback_used,
        })
    }

    pub fn live_status(&self) -> LiveStatus {
        let mut status = LiveStatus::new(
            &self.session_id,
            self.options.activity_type,
            self.state,
            self.ctx.stats,
        );
        status.signal_tier = self.ctx.signal.tier();
        status.signal_error = self.ctx.signal.error().map(str::to_string);
        status.last_accuracy_m = self.ctx.signal.last_accuracy();
        status.advisory = self.ctx.latest_advisory().cloned();
        status.raw_fixes = self.ctx.raw.len();
        status.accepted_points = self.ctx.trace.len();
        status.consecutive_rejections = self.ctx.consecutive_rejections;
        status.missed_gps_updates = self.ctx.missed_gps_updates;
        status.pedometer_engaged = self.ctx.pedometer_engaged;
        status
    }

    pub fn started_at(&self) -> Option<DateTime<Utc>> {
        self.started_at
    }

    fn sensor_now_ms(&self) -> i64 {
        self.clock.now_ms(Utc::now().timestamp_millis())
    }

    fn advance_clock(&mut self, observed_ms: i64) {
        if let Clock::Virtual { now_ms } = &mut self.clock {
            *now_ms = (*now_ms).max(observed_ms);
        }
    }
}

fn new_session_id() -> String {
    format!("session_{}", Utc::now().timestamp_millis())
}

async fn next_event<T>(sub: &mut Option<Subscription<T>>) -> Option<T> {
    match sub {
        Some(sub) => sub.recv().await,
        None => std::future::pending().await,
    }
}

async fn next_tick(ticker: &mut Option<Interval>) {
    match ticker {
        Some(ticker) => {
            ticker.tick().await;
        }
        None => std::future::pending().await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::SensorError;
    use crate::sensors::ScriptedSensor;
    use crate::signal_quality::SignalQualityEstimator;
    use crate::storage::InMemoryStore;
    use approx::assert_abs_diff_eq;

    fn fix(lon: f64, accuracy: f64, secs: i64) -> LocationFix {
        LocationFix::new(0.0, lon, accuracy, secs * 1000)
    }

    fn session(activity: ActivityType, fixes: Vec<LocationFix>) -> Session<ScriptedSensor> {
        Session::new(
            ScriptedSensor::new(fixes),
            TrackerConfig::default(),
            SessionOptions::new("runner-1", activity),
        )
        .unwrap()
    }

    #[test]
    fn test_rejects_empty_user() {
        let result = Session::new(
            ScriptedSensor::default(),
            TrackerConfig::default(),
            SessionOptions::new(" ", ActivityType::Running),
        );
        assert!(matches!(result, Err(TrackerError::InvalidParameters(_))));
    }

    #[test]
    fn test_rejects_non_positive_clock_rate() {
        for rate in [0.0, -2.0, f64::NAN] {
            let result = Session::new(
                ScriptedSensor::default(),
                TrackerConfig::default(),
                SessionOptions::new("athlete", ActivityType::Running).with_clock_rate(rate),
            );
            assert!(matches!(result, Err(TrackerError::InvalidParameters(_))));
        }
    }

    #[test]
    fn test_wall_clock_runs_at_playback_rate() {
        let clock = Clock::Wall {
            sensor_origin_ms: 50_000,
            wall_origin_ms: 1_000,
            rate: 4.0,
        };
        assert_eq!(clock.now_ms(1_000), 50_000);
        assert_eq!(clock.now_ms(3_000), 58_000);

        // 1 s cadence at 4x: the last fix lands at wall 2_000, the 3 s timeout 750 ms later
        let mut signal = SignalQualityEstimator::new(
            &TrackerConfig::default(),
            &ActivityType::Running.profile(),
        );
        for i in 0..5 {
            signal.observe(&fix(0.0, 5.0, 50 + i));
        }
        assert!(!signal.is_stalled(clock.now_ms(2_500)));
        assert!(signal.is_stalled(clock.now_ms(2_800)));

        let slow = Clock::Wall {
            sensor_origin_ms: 0,
            wall_origin_ms: 0,
            rate: 0.5,
        };
        assert_eq!(slow.now_ms(6_000), 3_000);
    }

    #[tokio::test]
    async fn test_stop_while_idle_is_noop() {
        let mut session = session(ActivityType::Walking, vec![]);
        let store = InMemoryStore::new();
        let outcome = session.stop(&store).await.unwrap();
        assert!(outcome.is_none());
        assert_eq!(session.state(), SessionState::Idle);
        assert!(store.is_empty().await);
    }

    #[tokio::test]
    async fn test_start_stop_lifecycle() {
        let mut session = session(
            ActivityType::Cycling,
            vec![fix(0.0, 5.0, 0), fix(0.0001, 5.0, 1), fix(0.0002, 5.0, 2)],
        );
        session.start().await.unwrap();
        assert_eq!(session.state(), SessionState::Tracking);
        assert_eq!(session.context().raw.len(), 1);

        // second start is a no-op
        session.start().await.unwrap();

        assert_eq!(session.run_until(std::future::pending()).await, RunExit::FeedClosed);
        assert_eq!(session.context().raw.len(), 3);

        let store = InMemoryStore::new();
        let outcome = session.stop(&store).await.unwrap().unwrap();
        assert_eq!(session.state(), SessionState::Stopped);
        assert_abs_diff_eq!(outcome.reconciled.distance_meters, 22.24, epsilon = 0.01);
        assert_eq!(outcome.record.coordinates.len(), 3);
        assert_eq!(store.len().await, 1);
        assert!(store.get(&outcome.activity_id).await.unwrap().created_at.is_some());
    }

    #[tokio::test]
    async fn test_permission_denied_stays_idle() {
        let mut session = Session::new(
            ScriptedSensor::new(vec![fix(0.0, 5.0, 0)]).deny_location(),
            TrackerConfig::default(),
            SessionOptions::new("u", ActivityType::Running),
        )
        .unwrap();
        let result = session.start().await;
        assert_eq!(result, Err(TrackerError::PermissionDenied("location".to_string())));
        assert_eq!(session.state(), SessionState::Idle);
    }

    #[tokio::test]
    async fn test_motion_permission_only_for_step_activities() {
        let sensor = || ScriptedSensor::new(vec![fix(0.0, 5.0, 0)]).deny_motion();
        let options = |a| SessionOptions::new("u", a);

        let mut walking =
            Session::new(sensor(), TrackerConfig::default(), options(ActivityType::Walking))
                .unwrap();
        assert!(matches!(walking.start().await, Err(TrackerError::PermissionDenied(_))));

        let mut cycling =
            Session::new(sensor(), TrackerConfig::default(), options(ActivityType::Cycling))
                .unwrap();
        assert!(cycling.start().await.is_ok());
    }

    #[tokio::test]
    async fn test_initial_fix_failure_stays_idle() {
        let mut session = Session::new(
            ScriptedSensor::new(vec![fix(0.0, 5.0, 0)]).failing_initial_fix(),
            TrackerConfig::default(),
            SessionOptions::new("u", ActivityType::Running),
        )
        .unwrap();
        assert!(matches!(session.start().await, Err(TrackerError::InitialFixFailure(_))));
        assert_eq!(session.state(), SessionState::Idle);
        assert!(session.context().raw.is_empty());
    }

    #[tokio::test]
    async fn test_start_after_stop_requires_reset() {
        let mut session = session(ActivityType::Running, vec![fix(0.0, 5.0, 0), fix(0.0, 5.0, 10)]);
        session.start().await.unwrap();
        session.stop(&InMemoryStore::new()).await.unwrap();

        session.clear_script_for_test(vec![fix(0.0, 5.0, 100)]);
        assert!(matches!(session.start().await, Err(TrackerError::InvalidState(_))));
        session.reset().unwrap();
        assert_eq!(session.state(), SessionState::Idle);
        session.start().await.unwrap();
        assert_eq!(session.stats().distance_meters, 0.0);
    }

    #[test]
    fn test_three_fix_replay() {
        let mut session = session(ActivityType::Cycling, vec![]);
        let summary = session
            .replay(&[fix(0.0, 5.0, 0), fix(0.0001, 5.0, 1), fix(0.0002, 5.0, 2)], &[])
            .unwrap();
        assert_eq!(summary.live.duration_seconds, 2);
        assert_abs_diff_eq!(summary.live.distance_meters, 22.24, epsilon = 0.01);
        assert_abs_diff_eq!(summary.reconciled.distance_meters, 22.24, epsilon = 0.01);
        assert_eq!(session.stats().duration_seconds, 2);
        assert_eq!(session.state(), SessionState::Stopped);
    }

    #[test]
    fn test_sensor_errors_become_advisories() {
        let mut session = session(ActivityType::Running, vec![]);
        session.begin(fix(0.0, 5.0, 0));
        let error = SensorError::Unavailable("gps off".to_string());
        let outcome = session.on_position_event(Err(error));
        assert!(outcome.is_none());
        assert_eq!(session.state(), SessionState::Tracking);
        assert!(session
            .take_advisories()
            .iter()
            .any(|a| matches!(a, Advisory::SignalDegraded(_))));
        assert_eq!(
            session.live_status().signal_error.as_deref(),
            Some("sensor unavailable: gps off")
        );
    }

    #[test]
    fn test_pause_excludes_gap_and_time() {
        let mut session = session(ActivityType::Walking, vec![]);
        session.begin(fix(0.0, 5.0, 0));
        session.on_tick(1_000);
        session.on_tick(2_000);
        session.on_fix(fix(0.0001, 5.0, 2));
        assert_abs_diff_eq!(session.stats().distance_meters, 11.12, epsilon = 0.01);

        session.pause().unwrap();
        assert!(session.pause().is_err());
        session.on_tick(3_000);
        assert!(session.on_fix(fix(0.005, 5.0, 598)).is_none());
        assert_eq!(session.stats().duration_seconds, 2);

        session.resume().unwrap();
        assert_eq!(session.on_fix(fix(0.01, 5.0, 600)), Some(FixOutcome::Seeded));
        session.on_tick(601_000);
        session.on_tick(602_000);
        session.on_fix(fix(0.0101, 5.0, 602));
        assert_abs_diff_eq!(session.stats().distance_meters, 22.24, epsilon = 0.01);

        let reconciled = session.finish();
        assert_eq!(reconciled.raw_count, 4);
        assert_abs_diff_eq!(reconciled.distance_meters, 22.24, epsilon = 0.01);
        assert_eq!(reconciled.duration_seconds, 4);
    }

    #[test]
    fn test_stall_ticks_count_as_missed_updates() {
        let mut session = session(ActivityType::Walking, vec![]);
        session.begin(fix(0.0, 5.0, 0));
        // walking expects 2 s updates, so the feed is stalled after 6 s
        for second in 1..=6 {
            session.on_tick(second * 1000);
        }
        assert_eq!(session.context().missed_gps_updates, 0);
        session.on_tick(7_000);
        assert_eq!(session.context().missed_gps_updates, 1);
        assert_eq!(session.live_status().signal_tier, crate::types::SignalTier::Poor);
    }

    #[test]
    fn test_replay_pedometer_fallback() {
        let mut session = session(ActivityType::Walking, vec![]);
        let mut fixes = vec![fix(0.0, 5.0, 0)];
        fixes.extend((1..=5).map(|i| fix(0.0, 999.0, i * 2)));
        let steps = [StepReading {
            timestamp_ms: 10_500,
            cumulative_steps: 20,
        }];
        let summary = session.replay(&fixes, &steps).unwrap();
        assert!(summary.pedometer_fallback_used);
        assert_abs_diff_eq!(summary.live.distance_meters, 14.0, epsilon = 1e-9);
        assert!(summary
            .advisories
            .iter()
            .any(|a| matches!(a, Advisory::PedometerFallback { .. })));
    }

    #[test]
    fn test_replay_rejects_empty_log() {
        let mut session = session(ActivityType::Running, vec![]);
        assert!(matches!(session.replay(&[], &[]), Err(TrackerError::InvalidParameters(_))));
        assert_eq!(session.state(), SessionState::Idle);
    }

    impl Session<ScriptedSensor> {
        fn clear_script_for_test(&mut self, fixes: Vec<LocationFix>) {
            self.sensor = ScriptedSensor::new(fixes);
        }
    }
}
