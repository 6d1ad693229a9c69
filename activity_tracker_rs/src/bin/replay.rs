use std::path::{Path, PathBuf};

use activity_tracker_rs::fix_log::{is_log_file, FixLog};
use activity_tracker_rs::geodesy::format_duration;
use activity_tracker_rs::{ActivityType, ScriptedSensor, Session, SessionOptions, TrackerConfig};
use clap::Parser;
use log::{info, warn};
use serde_json::json;

#[derive(Parser, Debug)]
#[command(name = "replay")]
#[command(about = "Replay recorded fix logs through the live and reconciliation pipelines")]
struct Args {
    /// Path to a fix log (.json or .json.gz)
    #[arg(long, conflicts_with = "golden_dir")]
    log: Option<PathBuf>,

    /// Directory of logs to batch replay
    #[arg(long)]
    golden_dir: Option<PathBuf>,

    /// Activity type when the log does not record one
    #[arg(long, default_value = "walking")]
    activity: ActivityType,

    /// Force this activity type even if the log records another
    #[arg(long, default_value_t = false)]
    force_activity: bool,

    /// Tracker configuration (JSON)
    #[arg(long)]
    config: Option<PathBuf>,
}

fn run_once(path: &Path, args: &Args, config: &TrackerConfig) -> anyhow::Result<serde_json::Value> {
    let log = FixLog::load(path)?;
    let activity = match log.activity_type {
        Some(recorded) if !args.force_activity => recorded,
        _ => args.activity,
    };

    let options = SessionOptions::new("replay", activity);
    let mut session = Session::new(ScriptedSensor::default(), config.clone(), options)?;
    let summary = session.replay(&log.fixes, &log.steps)?;
    info!(
        "[replay] {}: live {:.1} m, reconciled {:.1} m",
        path.display(),
        summary.live.distance_meters,
        summary.reconciled.distance_meters
    );

    let live = summary.live;
    let reconciled = &summary.reconciled;
    let drift_pct = if reconciled.distance_meters > 0.0 {
        (live.distance_meters - reconciled.distance_meters) / reconciled.distance_meters * 100.0
    } else {
        0.0
    };

    Ok(json!({
        "log": path.display().to_string(),
        "activity": activity,
        "raw_fixes": reconciled.raw_count,
        "steps": live.steps,
        "duration": format_duration(live.duration_seconds),
        "live_distance_m": live.distance_meters,
        "live_pace_sec_per_km": live.pace_sec_per_km,
        "reconciled_distance_m": reconciled.distance_meters,
        "reconciled_points": reconciled.points.len(),
        "reconciled_avg_speed_kmh": reconciled.metrics.avg_speed_kmh,
        "dropped_low_accuracy": reconciled.dropped_low_accuracy,
        "dropped_motion": reconciled.dropped_motion,
        "live_vs_reconciled_pct": drift_pct,
        "pedometer_fallback_used": summary.pedometer_fallback_used,
        "advisories": summary.advisories.iter().map(ToString::to_string).collect::<Vec<_>>(),
    }))
}

fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();
    let args = Args::parse();
    let config = TrackerConfig::load_or_default(args.config.as_deref())?;
    let mut results = Vec::new();

    if let Some(dir) = args.golden_dir.as_ref() {
        let mut paths: Vec<PathBuf> = std::fs::read_dir(dir)?
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|path| path.is_file() && is_log_file(path))
            .collect();
        paths.sort();
        for path in paths {
            match run_once(&path, &args, &config) {
                Ok(res) => results.push(res),
                Err(e) => warn!("Failed {}: {}", path.display(), e),
            }
        }
    } else if let Some(log) = args.log.as_ref() {
        results.push(run_once(log, &args, &config)?);
    } else {
        anyhow::bail!("Provide --log or --golden-dir");
    }

    println!("{}", serde_json::to_string_pretty(&results)?);
    Ok(())
}
