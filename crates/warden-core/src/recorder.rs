//! Filesystem-backed session recorder.

use std::path::PathBuf;

use chrono::Utc;

use warden_types::{SessionLog, SessionRecorder, WardenError};

/// Writes finished session logs as pretty-printed JSON documents.
///
/// One file per session, named `warden_{session_id}_{YYYYMMDD_HHMMSS}.json`
/// inside the configured directory. The directory is created on first
/// write; the timestamp in the name is the shutdown time, which also
/// becomes the document's `ended_at`.
#[derive(Debug, Clone)]
pub struct JsonFileRecorder {
    log_dir: PathBuf,
}

impl JsonFileRecorder {
    /// Create a recorder that writes into `log_dir`.
    pub fn new(log_dir: impl Into<PathBuf>) -> Self {
        Self {
            log_dir: log_dir.into(),
        }
    }

    /// The directory this recorder writes into.
    pub fn log_dir(&self) -> &std::path::Path {
        &self.log_dir
    }
}

impl SessionRecorder for JsonFileRecorder {
    fn record(&self, log: &SessionLog) -> Result<PathBuf, WardenError> {
        std::fs::create_dir_all(&self.log_dir).map_err(|e| {
            WardenError::RecorderError(format!(
                "cannot create log directory {}: {e}",
                self.log_dir.display()
            ))
        })?;

        let ended_at = Utc::now();
        let filename = format!(
            "warden_{}_{}.json",
            log.session_id,
            ended_at.format("%Y%m%d_%H%M%S")
        );
        let path = self.log_dir.join(filename);

        let document = log.document(ended_at);
        let json = serde_json::to_string_pretty(&document).map_err(|e| {
            WardenError::RecorderError(format!("cannot serialize session log: {e}"))
        })?;

        std::fs::write(&path, json).map_err(|e| {
            WardenError::RecorderError(format!(
                "cannot write session log {}: {e}",
                path.display()
            ))
        })?;

        Ok(path)
    }
}
