//! Storage collaborator for telemetry and charger status
//!
//! The control loop treats storage as fire-and-forget: failures are logged
//! by the caller and never abort a tick. `JsonlStore` appends one JSON
//! line per record to per-kind files.

use crate::charger::ChargerStatus;
use crate::error::{HeliosError, Result};
use crate::logging::get_logger;
use crate::telemetry::TelemetrySnapshot;
use chrono::Utc;
use serde::Serialize;
use std::io::Write;
use std::path::{Path, PathBuf};

/// Sink the control loop writes readings into
#[async_trait::async_trait]
pub trait TelemetryStore: Send {
    /// Persist one telemetry snapshot
    async fn save_telemetry(&mut self, snapshot: &TelemetrySnapshot) -> Result<()>;

    /// Persist one charger status record
    async fn save_charger_status(&mut self, status: &ChargerStatus) -> Result<()>;
}

/// Charger status record with its capture time
#[derive(Debug, Serialize)]
struct ChargerStatusRecord<'a> {
    recorded_at: chrono::DateTime<Utc>,
    #[serde(flatten)]
    status: &'a ChargerStatus,
}

/// Append-only JSON-lines store
pub struct JsonlStore {
    telemetry_path: PathBuf,
    charger_path: PathBuf,
    logger: crate::logging::StructuredLogger,
}

impl JsonlStore {
    /// Create a store rooted at `data_dir`, creating the directory if needed
    pub fn new<P: AsRef<Path>>(data_dir: P) -> Result<Self> {
        let logger = get_logger("storage");
        let dir = data_dir.as_ref();
        std::fs::create_dir_all(dir)
            .map_err(|e| HeliosError::storage(format!("Failed to create {:?}: {}", dir, e)))?;
        logger.info(&format!("Storing readings under {:?}", dir));
        Ok(Self {
            telemetry_path: dir.join("telemetry.jsonl"),
            charger_path: dir.join("charger_status.jsonl"),
            logger,
        })
    }

    fn append<T: Serialize>(path: &Path, record: &T) -> Result<()> {
        let line = serde_json::to_string(record)?;
        let mut file = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .map_err(|e| HeliosError::storage(format!("Failed to open {:?}: {}", path, e)))?;
        writeln!(file, "{}", line)
            .map_err(|e| HeliosError::storage(format!("Failed to append to {:?}: {}", path, e)))?;
        Ok(())
    }
}

#[async_trait::async_trait]
impl TelemetryStore for JsonlStore {
    async fn save_telemetry(&mut self, snapshot: &TelemetrySnapshot) -> Result<()> {
        Self::append(&self.telemetry_path, snapshot)?;
        self.logger.trace("Appended telemetry snapshot");
        Ok(())
    }

    async fn save_charger_status(&mut self, status: &ChargerStatus) -> Result<()> {
        let record = ChargerStatusRecord {
            recorded_at: Utc::now(),
            status,
        };
        Self::append(&self.charger_path, &record)?;
        self.logger.trace("Appended charger status");
        Ok(())
    }
}
