use crate::error::StoreError;
use crate::types::{ActivityType, TrackPoint};
use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use log::{debug, info};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::RwLock;

/// Identifier assigned by the store on save
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ActivityId(pub String);

impl fmt::Display for ActivityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Which estimate the live distance came from when the session stopped
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DistanceSource {
    #[default]
    Gps,
    Pedometer,
}

/// Finished session as handed to the store
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActivityRecord {
    pub user_id: String,
    pub activity_type: ActivityType,
    pub distance_meters: f64,
    pub duration_seconds: u64,
    /// Seconds per kilometer
    pub pace: f64,
    /// km/h
    pub avg_speed: f64,
    pub steps: u32,
    pub coordinates: Vec<TrackPoint>,
    pub target_distance: Option<f64>,
    pub target_time: Option<u64>,
    /// Set by the store when the record is saved
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub distance_source: DistanceSource,
    #[serde(default)]
    pub pedometer_fallback_used: bool,
}

impl ActivityRecord {
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    /// Render the track as a GPX 1.1 document
    pub fn to_gpx(&self) -> String {
        let name = format!("{} activity for {}", self.activity_type, xml_escape(&self.user_id));
        let mut xml = String::new();
        xml.push_str("<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n");
        xml.push_str("<gpx version=\"1.1\" creator=\"ActivityTracker\">\n");
        xml.push_str("  <metadata>\n");
        xml.push_str(&format!("    <name>{name}</name>\n"));
        if let Some(created_at) = self.created_at {
            xml.push_str(&format!("    <time>{}</time>\n", created_at.to_rfc3339()));
        }
        xml.push_str("  </metadata>\n");
        xml.push_str("  <trk>\n");
        xml.push_str(&format!("    <name>{name}</name>\n"));
        xml.push_str(&format!("    <type>{}</type>\n", self.activity_type));
        xml.push_str("    <trkseg>\n");

        for point in &self.coordinates {
            xml.push_str(&format!(
                "      <trkpt lat=\"{:.7}\" lon=\"{:.7}\">\n",
                point.latitude, point.longitude
            ));
            if let Some(time) = DateTime::<Utc>::from_timestamp_millis(point.timestamp_ms) {
                xml.push_str(&format!("        <time>{}</time>\n", time.to_rfc3339()));
            }
            // GPX has no accuracy field; hdop approximated from the radius
            xml.push_str(&format!("        <hdop>{:.1}</hdop>\n", point.accuracy / 2.0));
            xml.push_str("      </trkpt>\n");
        }

        xml.push_str("    </trkseg>\n");
        xml.push_str("  </trk>\n");
        xml.push_str("</gpx>\n");
        xml
    }

    fn created_on(&self, date: NaiveDate) -> bool {
        self.created_at.is_some_and(|t| t.date_naive() == date)
    }
}

fn xml_escape(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

/// Persistence boundary for finished activities.
#[async_trait]
pub trait ActivityStore: Send + Sync {
    /// Append a record; the store assigns the id and creation time.
    async fn save_activity(&self, record: ActivityRecord) -> Result<ActivityId, StoreError>;

    /// Records for `user_id` created on `date` (UTC), oldest first
    async fn activities_for_user(
        &self,
        user_id: &str,
        date: NaiveDate,
    ) -> Result<Vec<ActivityRecord>, StoreError>;
}

fn check_record(record: &ActivityRecord) -> Result<(), StoreError> {
    if record.user_id.trim().is_empty() {
        return Err(StoreError::Rejected("missing user id".to_string()));
    }
    if !record.distance_meters.is_finite() || record.distance_meters < 0.0 {
        return Err(StoreError::Rejected(format!(
            "invalid distance {}",
            record.distance_meters
        )));
    }
    Ok(())
}

/// Process-local store, mostly for tests and the demo runner.
#[derive(Debug, Default)]
pub struct InMemoryStore {
    records: RwLock<Vec<(ActivityId, ActivityRecord)>>,
    next_id: AtomicU64,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.records.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.records.read().await.is_empty()
    }

    pub async fn get(&self, id: &ActivityId) -> Option<ActivityRecord> {
        self.records
            .read()
            .await
            .iter()
            .find(|(stored, _)| stored == id)
            .map(|(_, record)| record.clone())
    }
}

#[async_trait]
impl ActivityStore for InMemoryStore {
    async fn save_activity(&self, mut record: ActivityRecord) -> Result<ActivityId, StoreError> {
        check_record(&record)?;
        let id = ActivityId(format!(
            "activity-{}",
            self.next_id.fetch_add(1, Ordering::Relaxed) + 1
        ));
        record.created_at = Some(Utc::now());
        debug!("[store] saved {id} for {}", record.user_id);
        self.records.write().await.push((id.clone(), record));
        Ok(id)
    }

    async fn activities_for_user(
        &self,
        user_id: &str,
        date: NaiveDate,
    ) -> Result<Vec<ActivityRecord>, StoreError> {
        Ok(self
            .records
            .read()
            .await
            .iter()
            .filter(|(_, r)| r.user_id == user_id && r.created_on(date))
            .map(|(_, r)| r.clone())
            .collect())
    }
}

/// One pretty-printed JSON file per activity in a directory.
#[derive(Debug)]
pub struct JsonFileStore {
    dir: PathBuf,
    sequence: AtomicU64,
}

impl JsonFileStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            sequence: AtomicU64::new(0),
        }
    }

    pub fn path_for(&self, id: &ActivityId) -> PathBuf {
        self.dir.join(format!("{id}.json"))
    }
}

#[async_trait]
impl ActivityStore for JsonFileStore {
    async fn save_activity(&self, mut record: ActivityRecord) -> Result<ActivityId, StoreError> {
        check_record(&record)?;
        tokio::fs::create_dir_all(&self.dir).await?;

        let created_at = Utc::now();
        record.created_at = Some(created_at);
        let id = ActivityId(format!(
            "activity_{}_{}",
            created_at.format("%Y%m%d_%H%M%S%3f"),
            self.sequence.fetch_add(1, Ordering::Relaxed)
        ));

        let path = self.path_for(&id);
        tokio::fs::write(&path, record.to_json()?).await?;
        info!("[store] wrote {}", path.display());
        Ok(id)
    }

    async fn activities_for_user(
        &self,
        user_id: &str,
        date: NaiveDate,
    ) -> Result<Vec<ActivityRecord>, StoreError> {
        let mut entries = match tokio::fs::read_dir(&self.dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let mut found = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            let contents = tokio::fs::read_to_string(&path).await?;
            let record: ActivityRecord = serde_json::from_str(&contents)?;
            if record.user_id == user_id && record.created_on(date) {
                found.push(record);
            }
        }
        found.sort_by_key(|r| r.created_at);
        Ok(found)
    }
}
