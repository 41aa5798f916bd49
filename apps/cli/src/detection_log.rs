use std::path::{Path, PathBuf};
use survey_core::{CaptureAndLogPort, CaptureError, LogEntry, LogError};
use survey_link::SurveyVehicle;
use tokio::fs::OpenOptions;
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;

/// Append-only text log, one entry per line. The file is created on first
/// write and never truncated.
#[derive(Debug)]
pub struct DetectionLog {
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl DetectionLog {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub async fn append(&self, entry: &LogEntry) -> Result<(), LogError> {
        let _guard = self.write_lock.lock().await;
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await?;
        file.write_all(format!("{entry}\n").as_bytes()).await?;
        file.flush().await?;
        Ok(())
    }
}

/// Photos through the vehicle's camera, notes into the detection log.
pub struct EvidenceRecorder {
    vehicle: SurveyVehicle,
    log: DetectionLog,
}

impl EvidenceRecorder {
    pub fn new(vehicle: SurveyVehicle, log: DetectionLog) -> Self {
        Self { vehicle, log }
    }
}

impl CaptureAndLogPort for EvidenceRecorder {
    async fn take_photo(&self) -> Result<(), CaptureError> {
        self.vehicle.take_photo().await?;
        println!("[CAPTURE] Photo request sent.");
        Ok(())
    }

    async fn append_log(&self, entry: &LogEntry) -> Result<(), LogError> {
        self.log.append(entry).await
    }
}
