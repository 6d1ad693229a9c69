use crate::error::SensorError;
use crate::types::{AccuracyMode, ActivityProfile, LocationFix};
use async_trait::async_trait;
use log::debug;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc::{self, Receiver};
use tokio::task::JoinHandle;
use tokio::time::{sleep, Duration};

const POSITION_CHANNEL_CAPACITY: usize = 100;
const STEP_CHANNEL_CAPACITY: usize = 100;

/// Options passed to the platform position watch
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct WatchOptions {
    pub accuracy_mode: AccuracyMode,
    pub min_distance_m: f64,
    pub min_interval_ms: u64,
}

impl WatchOptions {
    pub fn from_profile(profile: &ActivityProfile) -> Self {
        Self {
            accuracy_mode: profile.accuracy_mode,
            min_distance_m: profile.min_distance_m,
            min_interval_ms: profile.sampling_interval_ms,
        }
    }

    /// One-shot, most accurate request used for the initial fix
    pub fn initial_fix() -> Self {
        Self {
            accuracy_mode: AccuracyMode::BestForNavigation,
            min_distance_m: 0.0,
            min_interval_ms: 0,
        }
    }
}

/// A position callback delivers either a fix or an error
pub type PositionEvent = Result<LocationFix, SensorError>;

/// Live feed from the device, cancelled explicitly or on drop.
pub struct Subscription<T> {
    rx: Receiver<T>,
    task: Option<JoinHandle<()>>,
}

impl<T> Subscription<T> {
    pub fn new(rx: Receiver<T>, task: Option<JoinHandle<()>>) -> Self {
        Self { rx, task }
    }

    /// Next event; `None` once the feed is closed or cancelled
    pub async fn recv(&mut self) -> Option<T> {
        self.rx.recv().await
    }

    /// Stop delivery immediately; nothing is received after this returns.
    pub fn cancel(&mut self) {
        self.rx.close();
        while self.rx.try_recv().is_ok() {}
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }

    pub fn is_active(&self) -> bool {
        !self.rx.is_closed()
    }
}

impl<T> Drop for Subscription<T> {
    fn drop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

/// Device location and motion interface.
#[async_trait]
pub trait LocationSensor: Send {
    /// Ask for location (and motion, for step-based activities) permission
    async fn request_permissions(&mut self, motion: bool) -> Result<(), SensorError>;

    /// A single fix, used once when tracking starts
    async fn current_fix(&mut self, options: WatchOptions) -> Result<LocationFix, SensorError>;

    fn watch_position(
        &mut self,
        options: WatchOptions,
    ) -> Result<Subscription<PositionEvent>, SensorError>;

    /// Cumulative steps since the subscription was opened
    fn watch_step_count(&mut self) -> Result<Subscription<u32>, SensorError>;
}

/// Timestamped cumulative step reading
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct StepReading {
    pub timestamp_ms: i64,
    pub cumulative_steps: u32,
}

/// Sensor that plays back pre-recorded events.
///
/// The first fix answers `current_fix`; the rest are delivered by
/// `watch_position`. With a speedup set, events are spaced by their
/// recorded timestamps divided by that factor, otherwise sent back to back.
#[derive(Clone, Debug, Default)]
pub struct ScriptedSensor {
    fixes: Vec<PositionEvent>,
    steps: Vec<StepReading>,
    speedup: Option<f64>,
    deny_location: bool,
    deny_motion: bool,
    initial_fix_fails: bool,
}

impl ScriptedSensor {
    pub fn new(fixes: Vec<LocationFix>) -> Self {
        Self {
            fixes: fixes.into_iter().map(Ok).collect(),
            ..Self::default()
        }
    }

    /// Script including feed errors between fixes
    pub fn from_events(events: Vec<PositionEvent>) -> Self {
        Self {
            fixes: events,
            ..Self::default()
        }
    }

    pub fn with_steps(mut self, steps: Vec<StepReading>) -> Self {
        self.steps = steps;
        self
    }

    pub fn paced(mut self, speedup: f64) -> Self {
        self.speedup = (speedup > 0.0).then_some(speedup);
        self
    }

    pub fn deny_location(mut self) -> Self {
        self.deny_location = true;
        self
    }

    pub fn deny_motion(mut self) -> Self {
        self.deny_motion = true;
        self
    }

    pub fn failing_initial_fix(mut self) -> Self {
        self.initial_fix_fails = true;
        self
    }
}

fn delay_between(speedup: Option<f64>, previous_ms: Option<i64>, next_ms: i64) -> Option<Duration> {
    let speedup = speedup?;
    let gap_ms = next_ms - previous_ms?;
    (gap_ms > 0).then(|| Duration::from_secs_f64(gap_ms as f64 / 1000.0 / speedup))
}

#[async_trait]
impl LocationSensor for ScriptedSensor {
    async fn request_permissions(&mut self, motion: bool) -> Result<(), SensorError> {
        if self.deny_location {
            return Err(SensorError::PermissionDenied("location".to_string()));
        }
        if motion && self.deny_motion {
            return Err(SensorError::PermissionDenied("motion".to_string()));
        }
        Ok(())
    }

    async fn current_fix(&mut self, _options: WatchOptions) -> Result<LocationFix, SensorError> {
        if self.initial_fix_fails {
            return Err(SensorError::Timeout);
        }
        let position = self
            .fixes
            .iter()
            .position(Result::is_ok)
            .ok_or_else(|| SensorError::Unavailable("no fix recorded".to_string()))?;
        self.fixes.remove(position)
    }

    fn watch_position(
        &mut self,
        options: WatchOptions,
    ) -> Result<Subscription<PositionEvent>, SensorError> {
        debug!("[sensor] watching position with {options:?}");
        let (tx, rx) = mpsc::channel(POSITION_CHANNEL_CAPACITY);
        let speedup = self.speedup;
        let mut previous_ms: Option<i64> = None;
        let script: Vec<(Option<Duration>, PositionEvent)> = self
            .fixes
            .drain(..)
            .map(|event| {
                let delay = match &event {
                    Ok(fix) => {
                        let delay = delay_between(speedup, previous_ms, fix.timestamp_ms);
                        previous_ms = Some(fix.timestamp_ms);
                        delay
                    }
                    Err(_) => None,
                };
                (delay, event)
            })
            .collect();

        let task = tokio::spawn(async move {
            for (delay, event) in script {
                if let Some(delay) = delay {
                    sleep(delay).await;
                }
                if tx.send(event).await.is_err() {
                    break;
                }
            }
        });
        Ok(Subscription::new(rx, Some(task)))
    }

    fn watch_step_count(&mut self) -> Result<Subscription<u32>, SensorError> {
        if self.deny_motion {
            return Err(SensorError::PermissionDenied("motion".to_string()));
        }
        let (tx, rx) = mpsc::channel(STEP_CHANNEL_CAPACITY);
        let speedup = self.speedup;
        let mut previous_ms: Option<i64> = None;
        let script: Vec<(Option<Duration>, u32)> = self
            .steps
            .drain(..)
            .map(|reading| {
                let delay = delay_between(speedup, previous_ms, reading.timestamp_ms);
                previous_ms = Some(reading.timestamp_ms);
                (delay, reading.cumulative_steps)
            })
            .collect();

        let task = tokio::spawn(async move {
            for (delay, steps) in script {
                if let Some(delay) = delay {
                    sleep(delay).await;
                }
                if tx.send(steps).await.is_err() {
                    break;
                }
            }
        });
        Ok(Subscription::new(rx, Some(task)))
    }
}

/// Noisy out-and-along route for demos, one fix per second.
///
/// Moves roughly `speed_ms` east with a slow northward drift; every 17th
/// fix is a poor-accuracy outlier.
pub fn synthetic_route(
    start_lat: f64,
    start_lon: f64,
    speed_ms: f64,
    seconds: u32,
    start_ms: i64,
) -> Vec<LocationFix> {
    const METERS_PER_DEGREE: f64 = 111_195.0;
    let lon_scale = METERS_PER_DEGREE * start_lat.to_radians().cos().max(0.01);

    (0..=seconds)
        .map(|i| {
            let t = f64::from(i);
            let east_m = speed_ms * t + (t * 0.7).sin() * 1.5;
            let north_m = t * 0.2 + (t * 0.3).cos() * 1.5;
            let accuracy = if i > 0 && i % 17 == 0 {
                65.0
            } else {
                5.0 + (t * 0.1).sin().abs() * 4.0
            };
            LocationFix::new(
                start_lat + north_m / METERS_PER_DEGREE,
                start_lon + east_m / lon_scale,
                accuracy,
                start_ms + i64::from(i) * 1000,
            )
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fixes(n: i64) -> Vec<LocationFix> {
        (0..n)
            .map(|i| LocationFix::new(0.0, i as f64 * 0.0001, 5.0, i * 1000))
            .collect()
    }

    #[tokio::test]
    async fn test_initial_fix_then_watch() {
        let mut sensor = ScriptedSensor::new(fixes(3));
        let first = sensor.current_fix(WatchOptions::initial_fix()).await.unwrap();
        assert_eq!(first.timestamp_ms, 0);

        let mut sub = sensor
            .watch_position(WatchOptions::from_profile(
                &crate::types::ActivityType::Running.profile(),
            ))
            .unwrap();
        let mut received = Vec::new();
        while let Some(event) = sub.recv().await {
            received.push(event.unwrap().timestamp_ms);
        }
        assert_eq!(received, vec![1000, 2000]);
    }

    #[tokio::test]
    async fn test_cancel_stops_delivery() {
        let mut sensor = ScriptedSensor::new(fixes(50)).paced(10.0);
        let mut sub = sensor.watch_position(WatchOptions::initial_fix()).unwrap();
        sub.cancel();
        assert!(!sub.is_active());
        assert!(sub.recv().await.is_none());
    }

    #[tokio::test]
    async fn test_permissions() {
        let mut sensor = ScriptedSensor::new(fixes(1)).deny_motion();
        assert!(sensor.request_permissions(false).await.is_ok());
        assert_eq!(
            sensor.request_permissions(true).await,
            Err(SensorError::PermissionDenied("motion".to_string()))
        );
        assert!(sensor.watch_step_count().is_err());
    }

    #[tokio::test]
    async fn test_empty_script_has_no_initial_fix() {
        let mut sensor = ScriptedSensor::new(Vec::new());
        let result = sensor.current_fix(WatchOptions::initial_fix()).await;
        assert!(matches!(result, Err(SensorError::Unavailable(_))));
    }

    #[test]
    fn test_synthetic_route_shape() {
        let route = synthetic_route(45.0, 7.0, 3.0, 60, 1_000);
        assert_eq!(route.len(), 61);
        assert!(route.iter().all(LocationFix::is_valid));
        assert_eq!(route[1].timestamp_ms - route[0].timestamp_ms, 1000);
        assert_eq!(route[17].accuracy, 65.0);
        assert!(route[60].longitude > route[0].longitude);
    }
}
