use crate::geodesy::{format_duration, format_pace};
use crate::session::SessionState;
use crate::types::{ActivityType, Advisory, SessionStats, SignalTier};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// Snapshot of a running session, rendered by the caller once per tick
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct LiveStatus {
    pub timestamp: f64,
    pub session_id: String,
    pub activity_type: ActivityType,
    pub state: SessionState,
    pub stats: SessionStats,
    pub duration_display: String,
    pub pace_display: String,
    pub signal_tier: SignalTier,
    pub signal_error: Option<String>,
    pub last_accuracy_m: Option<f64>,
    pub advisory: Option<Advisory>,
    pub raw_fixes: usize,
    pub accepted_points: usize,
    pub consecutive_rejections: u32,
    pub missed_gps_updates: u32,
    pub pedometer_engaged: bool,
}

impl LiveStatus {
    pub fn new(
        session_id: &str,
        activity_type: ActivityType,
        state: SessionState,
        stats: SessionStats,
    ) -> Self {
        Self {
            timestamp: current_timestamp(),
            session_id: session_id.to_string(),
            activity_type,
            state,
            stats,
            duration_display: format_duration(stats.duration_seconds),
            pace_display: format_pace(stats.pace_sec_per_km),
            signal_tier: SignalTier::Unknown,
            signal_error: None,
            last_accuracy_m: None,
            advisory: None,
            raw_fixes: 0,
            accepted_points: 0,
            consecutive_rejections: 0,
            missed_gps_updates: 0,
            pedometer_engaged: false,
        }
    }

    pub fn save(&self, path: &Path) -> std::io::Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        fs::write(path, json)?;
        Ok(())
    }
}

pub fn current_timestamp() -> f64 {
    Utc::now().timestamp_millis() as f64 / 1000.0
}
