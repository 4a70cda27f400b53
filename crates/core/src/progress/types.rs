//! Ingestion session snapshots and progress updates.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Stage of an ingestion session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IngestionStage {
    /// Receiving bytes from a direct upload.
    Receiving,
    /// Fetching bytes from a remote URL.
    Downloading,
    /// Handing the local file to the remote service.
    Submitting,
    /// Waiting for the remote service to finish processing.
    Processing,
    /// Asset is ready for use.
    Complete,
    /// Ingestion failed.
    Error,
    /// Sentinel for ids the tracker does not know about. Never stored.
    Unknown,
}

impl IngestionStage {
    pub fn as_str(&self) -> &'static str {
        match self {
            IngestionStage::Receiving => "receiving",
            IngestionStage::Downloading => "downloading",
            IngestionStage::Submitting => "submitting",
            IngestionStage::Processing => "processing",
            IngestionStage::Complete => "complete",
            IngestionStage::Error => "error",
            IngestionStage::Unknown => "unknown",
        }
    }

    /// COMPLETE and ERROR accept no further mutation.
    pub fn is_terminal(&self) -> bool {
        matches!(self, IngestionStage::Complete | IngestionStage::Error)
    }

    /// Position in the forward-only stage order. ERROR is reachable from any
    /// non-terminal stage and has no rank.
    pub(crate) fn rank(&self) -> Option<u8> {
        match self {
            IngestionStage::Receiving | IngestionStage::Downloading => Some(0),
            IngestionStage::Submitting => Some(1),
            IngestionStage::Processing => Some(2),
            IngestionStage::Complete => Some(3),
            IngestionStage::Error | IngestionStage::Unknown => None,
        }
    }
}

/// Snapshot of one ingestion attempt, as served to pollers.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IngestionSession {
    #[serde(rename = "upload_id")]
    pub id: String,
    pub stage: IngestionStage,
    /// Percent complete (0-100).
    pub progress: u8,
    pub message: String,
    #[serde(rename = "loaded")]
    pub bytes_loaded: u64,
    /// Zero when the total is unknown.
    #[serde(rename = "total")]
    pub bytes_total: u64,
    /// Smoothed transfer speed in bytes/second.
    pub speed: f64,
    pub updated_at: DateTime<Utc>,
    /// Remote asset id, set on COMPLETE.
    #[serde(rename = "file_name", skip_serializing_if = "Option::is_none")]
    pub result_asset_id: Option<String>,
    #[serde(rename = "display_name", skip_serializing_if = "Option::is_none")]
    pub result_display_name: Option<String>,
}

impl IngestionSession {
    pub(crate) fn new(id: impl Into<String>, stage: IngestionStage) -> Self {
        let message = match stage {
            IngestionStage::Receiving => "Receiving file...",
            IngestionStage::Downloading => "Initiating URL download...",
            _ => "",
        };
        Self {
            id: id.into(),
            stage,
            progress: 0,
            message: message.to_string(),
            bytes_loaded: 0,
            bytes_total: 0,
            speed: 0.0,
            updated_at: Utc::now(),
            result_asset_id: None,
            result_display_name: None,
        }
    }

    /// Snapshot returned for ids that are not (or no longer) tracked.
    pub fn unknown(id: impl Into<String>) -> Self {
        Self {
            message: "Upload ID not found".to_string(),
            ..Self::new(id, IngestionStage::Unknown)
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.stage.is_terminal()
    }
}

/// Identifies the remote asset an ingestion produced.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssetRef {
    pub asset_id: String,
    pub display_name: String,
}

/// One progress event emitted by a pipeline stage.
#[derive(Debug, Clone, PartialEq)]
pub struct ProgressUpdate {
    pub stage: IngestionStage,
    pub progress: u8,
    pub message: String,
    pub loaded: u64,
    pub total: u64,
    pub speed: f64,
    pub result: Option<AssetRef>,
}

impl ProgressUpdate {
    pub fn new(stage: IngestionStage, progress: u8, message: impl Into<String>) -> Self {
        Self {
            stage,
            progress: progress.min(100),
            message: message.into(),
            loaded: 0,
            total: 0,
            speed: 0.0,
            result: None,
        }
    }

    pub fn with_bytes(mut self, loaded: u64, total: u64) -> Self {
        self.loaded = loaded;
        self.total = total;
        self
    }

    pub fn with_speed(mut self, speed: f64) -> Self {
        self.speed = speed.max(0.0);
        self
    }

    /// Terminal success carrying the produced asset.
    pub fn complete(message: impl Into<String>, asset: AssetRef) -> Self {
        Self {
            result: Some(asset),
            ..Self::new(IngestionStage::Complete, 100, message)
        }
    }

    /// Terminal failure; progress is always reset to 0.
    pub fn error(message: impl Into<String>) -> Self {
        Self::new(IngestionStage::Error, 0, message)
    }
}

/// Receiver of progress events for a single session.
pub trait ProgressSink: Send + Sync {
    fn report(&self, update: ProgressUpdate);
}
