use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use activity_tracker_rs::fix_log::FixLog;
use activity_tracker_rs::geodesy::{format_duration, format_pace};
use activity_tracker_rs::sensors::synthetic_route;
use activity_tracker_rs::{
    ActivityType, JsonFileStore, LocationFix, RunExit, ScriptedSensor, Session, SessionOptions,
    StepReading, TrackerConfig,
};
use anyhow::Result;
use chrono::Utc;
use clap::Parser;
use log::warn;
use tokio::time::{sleep, Duration};

const STATUS_INTERVAL: Duration = Duration::from_secs(2);

#[derive(Parser, Debug)]
#[command(name = "activity_tracker")]
#[command(about = "Track an activity from a recorded or simulated GPS feed", long_about = None)]
struct Args {
    /// Simulated session length in seconds (ignored with --log)
    #[arg(value_name = "SECONDS", default_value = "120")]
    duration: u32,

    /// Activity type (walking, jogging, running, cycling)
    #[arg(long, default_value = "running")]
    activity: ActivityType,

    /// User the activity is saved for
    #[arg(long, default_value = "local-user")]
    user: String,

    /// Recorded fix log to play back instead of a simulated route
    #[arg(long)]
    log: Option<PathBuf>,

    /// Playback speed multiplier for fix timestamps and the stall clock
    #[arg(long, default_value = "1.0")]
    speedup: f64,

    /// Target distance in meters
    #[arg(long)]
    target_distance: Option<f64>,

    /// Target time in seconds
    #[arg(long)]
    target_time: Option<u64>,

    /// Tracker configuration (JSON)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Output directory
    #[arg(long, default_value = "activity_sessions")]
    output_dir: PathBuf,
}

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();

    println!("[{}] Activity Tracker Starting", ts_now());
    println!("  Activity: {}", args.activity);
    println!("  User: {}", args.user);
    println!("  Output Dir: {}", args.output_dir.display());

    let config = TrackerConfig::load_or_default(args.config.as_deref())?;
    std::fs::create_dir_all(&args.output_dir)?;

    let (fixes, steps) = match args.log.as_ref() {
        Some(path) => {
            let log = FixLog::load(path)?;
            println!("  Feed: {} ({} fixes)", path.display(), log.fixes.len());
            (log.fixes, log.steps)
        }
        None => {
            let feed = simulated_feed(args.activity, args.duration);
            let log_path = args
                .output_dir
                .join(format!("fixes_{}.json.gz", ts_now_clean()));
            FixLog {
                activity_type: Some(args.activity),
                fixes: feed.0.clone(),
                steps: feed.1.clone(),
            }
            .save(&log_path)?;
            println!("  Feed: simulated, {}s (recorded to {})", args.duration, log_path.display());
            feed
        }
    };
    if fixes.is_empty() {
        anyhow::bail!("no fixes to track");
    }

    let sensor = ScriptedSensor::new(fixes).with_steps(steps).paced(args.speedup);
    let options = SessionOptions::new(args.user.clone(), args.activity)
        .with_targets(args.target_distance, args.target_time)
        .with_clock_rate(args.speedup);
    let mut session = Session::new(sensor, config, options)?;
    session.start().await?;
    println!("[{}] Tracking {}...", ts_now(), session.session_id());

    let interrupted = Arc::new(AtomicBool::new(false));
    let interrupted_flag = interrupted.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            interrupted_flag.store(true, Ordering::SeqCst);
        }
    });

    let status_path = args.output_dir.join("live_status.json");
    loop {
        let exit = session.run_until(sleep(STATUS_INTERVAL)).await;

        let status = session.live_status();
        if let Err(e) = status.save(&status_path) {
            warn!("could not write {}: {e}", status_path.display());
        }
        println!(
            "[{}] {} | {:.1} m | pace {} | signal {} | steps {}",
            ts_now(),
            status.duration_display,
            status.stats.distance_meters,
            status.pace_display,
            status.signal_tier,
            status.stats.steps
        );
        for advisory in session.take_advisories() {
            println!("[{}] ! {}", ts_now(), advisory);
        }

        match exit {
            RunExit::Shutdown if !interrupted.load(Ordering::SeqCst) => continue,
            RunExit::Shutdown => println!("[{}] Interrupted, stopping...", ts_now()),
            RunExit::FeedClosed => println!("[{}] Feed ended, stopping...", ts_now()),
            RunExit::NotRunning => {}
        }
        break;
    }

    let store = JsonFileStore::new(args.output_dir.join("activities"));
    let Some(outcome) = session.stop(&store).await? else {
        println!("[{}] Nothing recorded", ts_now());
        return Ok(());
    };

    let gpx_path = args.output_dir.join(format!("{}.gpx", outcome.activity_id));
    std::fs::write(&gpx_path, outcome.record.to_gpx())?;
    if let Err(e) = session
        .live_status()
        .save(&args.output_dir.join("live_status_final.json"))
    {
        warn!("could not write final status: {e}");
    }

    let record = &outcome.record;
    println!("\n=== Final Stats ===");
    println!("Activity id: {}", outcome.activity_id);
    println!("Duration: {}", format_duration(record.duration_seconds));
    println!("Live distance: {:.2} m", outcome.live_distance_meters);
    println!("Reconciled distance: {:.2} m", record.distance_meters);
    println!("Pace: {} /km", format_pace(record.pace));
    println!("Avg speed: {:.2} km/h", record.avg_speed);
    println!("Steps: {}", record.steps);
    println!(
        "Points: {} of {} raw fixes",
        outcome.reconciled.points.len(),
        outcome.reconciled.raw_count
    );
    if record.pedometer_fallback_used {
        println!("Pedometer fallback was used during signal loss");
    }
    println!("GPX: {}", gpx_path.display());

    Ok(())
}

/// Noisy route plus cumulative step readings for step-based activities
fn simulated_feed(activity: ActivityType, seconds: u32) -> (Vec<LocationFix>, Vec<StepReading>) {
    let (speed_ms, cadence_hz) = match activity {
        ActivityType::Walking => (1.4, 1.8),
        ActivityType::Jogging => (2.5, 2.6),
        ActivityType::Running => (3.5, 0.0),
        ActivityType::Cycling => (7.0, 0.0),
    };
    let start_ms = Utc::now().timestamp_millis();
    let fixes = synthetic_route(37.7749, -122.4194, speed_ms, seconds, start_ms);
    let steps = if activity.is_step_based() {
        fixes
            .iter()
            .enumerate()
            .map(|(i, fix)| StepReading {
                timestamp_ms: fix.timestamp_ms,
                cumulative_steps: (i as f64 * cadence_hz).round() as u32,
            })
            .collect()
    } else {
        Vec::new()
    };
    (fixes, steps)
}

fn ts_now() -> String {
    Utc::now().format("%H:%M:%S").to_string()
}

fn ts_now_clean() -> String {
    Utc::now().format("%Y%m%d_%H%M%S").to_string()
}
