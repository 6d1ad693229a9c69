use crate::error::StoreError;
use crate::sensors::StepReading;
use crate::types::{ActivityType, LocationFix};
use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::Path;

/// Recorded position and step feed of one session, replayable offline.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FixLog {
    #[serde(default)]
    pub activity_type: Option<ActivityType>,
    pub fixes: Vec<LocationFix>,
    #[serde(default)]
    pub steps: Vec<StepReading>,
}

impl FixLog {
    /// Read a `.json` or gzip-compressed `.json.gz` log
    pub fn load(path: &Path) -> Result<Self, StoreError> {
        let file = File::open(path)?;
        if is_gzip(path) {
            let reader = BufReader::new(GzDecoder::new(file));
            Ok(serde_json::from_reader(reader)?)
        } else {
            Ok(serde_json::from_reader(BufReader::new(file))?)
        }
    }

    /// Write the log, compressed when the path ends in `.gz`
    pub fn save(&self, path: &Path) -> Result<(), StoreError> {
        let file = File::create(path)?;
        if is_gzip(path) {
            let mut encoder = GzEncoder::new(BufWriter::new(file), Compression::default());
            serde_json::to_writer(&mut encoder, self)?;
            encoder.finish()?.flush()?;
        } else {
            let mut writer = BufWriter::new(file);
            serde_json::to_writer_pretty(&mut writer, self)?;
            writer.flush()?;
        }
        Ok(())
    }
}

pub fn is_gzip(path: &Path) -> bool {
    path.extension().is_some_and(|e| e == "gz")
}

/// File names the replay tool picks up from a directory
pub fn is_log_file(path: &Path) -> bool {
    let name = path.file_name().and_then(|n| n.to_str()).unwrap_or("");
    name.ends_with(".json") || name.ends_with(".json.gz")
}
