use activity_tracker_rs::geodesy::distance_meters;
use activity_tracker_rs::{
    ActivityStore, ActivityType, Advisory, DistanceSource, FixLog, InMemoryStore, JsonFileStore,
    LocationFix, RawBuffer, Reconciler, RunExit, ScriptedSensor, Session, SessionOptions,
    SessionState, StepReading, TrackerConfig,
};
use approx::assert_abs_diff_eq;
use chrono::Utc;

fn fix(lon: f64, accuracy: f64, secs: i64) -> LocationFix {
    LocationFix::new(0.0, lon, accuracy, secs * 1000)
}

fn session_with(activity: ActivityType, sensor: ScriptedSensor) -> Session<ScriptedSensor> {
    let options = SessionOptions::new("athlete", activity);
    Session::new(sensor, TrackerConfig::default(), options).unwrap()
}

#[tokio::test]
async fn stop_while_idle_is_a_noop() {
    let mut session = session_with(ActivityType::Walking, ScriptedSensor::default());
    let store = InMemoryStore::new();
    assert!(session.stop(&store).await.unwrap().is_none());
    assert_eq!(session.state(), SessionState::Idle);
    assert!(store.is_empty().await);
}

#[tokio::test]
async fn three_fix_session_is_saved_once() {
    let fixes = vec![fix(0.0, 5.0, 0), fix(0.0001, 5.0, 1), fix(0.0002, 5.0, 2)];
    let mut session = session_with(ActivityType::Cycling, ScriptedSensor::new(fixes));
    session.start().await.unwrap();
    assert_eq!(session.run_until(std::future::pending()).await, RunExit::FeedClosed);

    let store = InMemoryStore::new();
    let outcome = session.stop(&store).await.unwrap().unwrap();
    assert_abs_diff_eq!(outcome.live_distance_meters, 22.24, epsilon = 0.01);
    assert_abs_diff_eq!(outcome.record.distance_meters, 22.24, epsilon = 0.01);
    assert_eq!(outcome.record.distance_source, DistanceSource::Gps);

    // a second stop does not save again
    assert!(session.stop(&store).await.unwrap().is_none());
    let saved = store
        .activities_for_user("athlete", Utc::now().date_naive())
        .await
        .unwrap();
    assert_eq!(saved.len(), 1);
}

#[test]
fn three_fix_scenario_at_walking_cadence() {
    // walking caps speed at 8 m/s, so 11.1 m steps need 2 s spacing
    let mut session = session_with(ActivityType::Walking, ScriptedSensor::default());
    let summary = session
        .replay(&[fix(0.0, 5.0, 0), fix(0.0001, 5.0, 2), fix(0.0002, 5.0, 4)], &[])
        .unwrap();
    assert_abs_diff_eq!(summary.live.distance_meters, 22.24, epsilon = 0.01);
    assert_abs_diff_eq!(summary.reconciled.distance_meters, 22.24, epsilon = 0.01);
    assert_eq!(summary.reconciled.duration_seconds, 4);
}

#[test]
fn fixes_at_the_accuracy_threshold_add_no_live_distance() {
    for activity in [ActivityType::Walking, ActivityType::Running] {
        let threshold = activity.profile().accuracy_threshold_m;
        let mut session = session_with(activity, ScriptedSensor::default());
        let fixes = [
            fix(0.0, 5.0, 0),
            fix(0.0001, threshold, 2),
            fix(0.0002, threshold, 4),
        ];
        let summary = session.replay(&fixes, &[]).unwrap();
        assert_eq!(summary.live.distance_meters, 0.0, "{activity}");
    }
}

#[test]
fn live_distance_tracks_a_clean_straight_line() {
    let cases = [
        (ActivityType::Walking, 0.00004, 2),
        (ActivityType::Running, 0.00003, 1),
        (ActivityType::Cycling, 0.00006, 1),
    ];
    for (activity, step, dt) in cases {
        let fixes: Vec<LocationFix> = (0..100).map(|i| fix(i as f64 * step, 5.0, i * dt)).collect();
        let mut session = session_with(activity, ScriptedSensor::default());
        let summary = session.replay(&fixes, &[]).unwrap();
        let truth = distance_meters(0.0, 0.0, 0.0, 99.0 * step);
        let live = summary.live.distance_meters;
        assert!((live - truth).abs() < truth * 0.02, "{activity}: live {live} vs {truth}");
        assert_abs_diff_eq!(summary.reconciled.distance_meters, truth, epsilon = truth * 0.01);
    }
}

#[test]
fn jitter_never_manufactures_distance() {
    let mut session = session_with(ActivityType::Running, ScriptedSensor::default());
    // standing still with ~1 m of wobble for two minutes
    let fixes: Vec<LocationFix> = (0..120)
        .map(|i| {
            let wobble = if i % 2 == 0 { 0.000008 } else { -0.000008 };
            LocationFix::new(wobble, -wobble, 6.0, i * 1000)
        })
        .collect();
    let summary = session.replay(&fixes, &[]).unwrap();
    assert_eq!(summary.live.distance_meters, 0.0);
    assert_eq!(summary.reconciled.distance_meters, 0.0);
    assert_eq!(summary.live.duration_seconds, 119);
}

#[test]
fn inaccurate_fixes_never_add_live_distance() {
    let mut session = session_with(ActivityType::Running, ScriptedSensor::default());
    let mut fixes = vec![fix(0.0, 5.0, 0)];
    fixes.extend((1..30).map(|i| fix(i as f64 * 0.0001, 15.5 + i as f64, i)));
    let summary = session.replay(&fixes, &[]).unwrap();
    assert_eq!(summary.live.distance_meters, 0.0);
    assert!(summary
        .advisories
        .iter()
        .any(|a| matches!(a, Advisory::PoorAccuracy { rejected: 5 })));
}

#[test]
fn pedometer_fallback_overrides_and_never_lowers() {
    let config = TrackerConfig::default();
    let lost: Vec<LocationFix> = (1..=5).map(|i| fix(0.0, 999.0, i * 2)).collect();
    let steps = [StepReading {
        timestamp_ms: 11_000,
        cumulative_steps: 20,
    }];

    // 5 m of GPS distance before the signal drops
    let mut short = vec![fix(0.0, 5.0, -2)];
    short.push(LocationFix::new(0.0, 0.000045, 5.0, 0));
    short.extend(lost.iter().copied());
    let mut session = Session::new(
        ScriptedSensor::default(),
        config.clone(),
        SessionOptions::new("walker", ActivityType::Walking),
    )
    .unwrap();
    let summary = session.replay(&short, &steps).unwrap();
    assert!(summary.pedometer_fallback_used);
    assert_abs_diff_eq!(summary.live.distance_meters, 14.0, epsilon = 1e-9);

    // 22 m of GPS distance: 14 m of steps leaves it alone
    let mut long = vec![fix(-0.0002, 5.0, -4), fix(-0.0001, 5.0, -2), fix(0.0, 5.0, 0)];
    long.extend(lost.iter().copied());
    let mut session = Session::new(
        ScriptedSensor::default(),
        config,
        SessionOptions::new("walker", ActivityType::Walking),
    )
    .unwrap();
    let summary = session.replay(&long, &steps).unwrap();
    assert!(!summary.pedometer_fallback_used);
    assert_abs_diff_eq!(summary.live.distance_meters, 22.24, epsilon = 0.01);
}

#[test]
fn reconciliation_is_idempotent() {
    let config = TrackerConfig::default();
    let profile = ActivityType::Running.profile();
    // gently curving, noisy run with a few outliers
    let fixes: Vec<LocationFix> = (0..200)
        .map(|i| {
            let t = i as f64;
            let accuracy = if i % 23 == 0 { 70.0 } else { 5.0 };
            LocationFix::new(
                t * 0.00002 + (t * 0.9).sin() * 0.000004,
                t * 0.00003,
                accuracy,
                i * 1000,
            )
        })
        .collect();

    let reconciler = Reconciler::new(&config);
    let first = reconciler.reconcile(&RawBuffer::from(fixes), &profile, 199);
    let again: Vec<LocationFix> = first
        .points
        .iter()
        .map(|p| LocationFix::new(p.latitude, p.longitude, p.accuracy, p.timestamp_ms))
        .collect();
    let second = reconciler.reconcile(&RawBuffer::from(again), &profile, 199);
    assert!(first.distance_meters > 0.0);
    assert_abs_diff_eq!(
        first.distance_meters,
        second.distance_meters,
        epsilon = first.distance_meters * 0.01
    );
}

#[test]
fn identical_coordinates_are_zero_distance() {
    for i in -9..=9 {
        let lat = i as f64 * 10.0;
        let lon = i as f64 * 20.0;
        assert_eq!(distance_meters(lat, lon, lat, lon), 0.0);
    }
}

#[tokio::test]
async fn recorded_log_replays_through_file_store() {
    let dir = tempfile::tempdir().unwrap();
    let log_path = dir.path().join("walk.json.gz");
    let log = FixLog {
        activity_type: Some(ActivityType::Walking),
        fixes: (0..40).map(|i| fix(i as f64 * 0.00004, 6.0, i * 2)).collect(),
        steps: Vec::new(),
    };
    log.save(&log_path).unwrap();

    let loaded = FixLog::load(&log_path).unwrap();
    let mut session = session_with(ActivityType::Walking, ScriptedSensor::new(loaded.fixes));
    session.start().await.unwrap();
    session.run_until(std::future::pending()).await;

    let store = JsonFileStore::new(dir.path().join("activities"));
    let outcome = session.stop(&store).await.unwrap().unwrap();
    assert!(store.path_for(&outcome.activity_id).exists());
    assert!(outcome.record.distance_meters > 150.0);
    assert!(outcome.record.to_gpx().contains("<trkseg>"));
}
