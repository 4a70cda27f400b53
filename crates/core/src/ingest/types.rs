//! Types for the ingestion pipeline.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::remote::RemoteServiceError;

/// Errors that terminate an ingestion session.
#[derive(Debug, Error)]
pub enum IngestError {
    /// Missing or invalid credential; never retried.
    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// Fetching the source URL failed; `reason` is caller-facing.
    #[error("{reason}")]
    Download { reason: String },

    /// Local I/O failure while receiving uploaded bytes.
    #[error("Upload failed: {0}")]
    Upload(String),

    #[error("Failed to submit to remote service: {0}")]
    RemoteSubmit(String),

    #[error("Video processing timeout")]
    ProcessingTimeout,

    #[error("Video processing failed")]
    ProcessingFailed,

    #[error("File not found: {0}")]
    AssetNotFound(String),

    #[error("Remote service error: {0}")]
    Remote(String),
}

impl IngestError {
    /// Short label used for metrics.
    pub fn kind(&self) -> &'static str {
        match self {
            IngestError::Configuration(_) => "configuration",
            IngestError::InvalidRequest(_) => "invalid_request",
            IngestError::Download { .. } => "download",
            IngestError::Upload(_) => "upload",
            IngestError::RemoteSubmit(_) => "remote_submit",
            IngestError::ProcessingTimeout => "processing_timeout",
            IngestError::ProcessingFailed => "processing_failed",
            IngestError::AssetNotFound(_) => "asset_not_found",
            IngestError::Remote(_) => "remote",
        }
    }

    pub(crate) fn download(reason: impl Into<String>) -> Self {
        IngestError::Download {
            reason: reason.into(),
        }
    }
}

impl From<RemoteServiceError> for IngestError {
    fn from(e: RemoteServiceError) -> Self {
        match e {
            RemoteServiceError::NotConfigured(msg) => IngestError::Configuration(msg),
            RemoteServiceError::NotFound(name) => IngestError::AssetNotFound(name),
            other => IngestError::Remote(other.to_string()),
        }
    }
}

/// Where an ingestion's bytes come from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IngestSource {
    Upload,
    Url,
}

impl IngestSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            IngestSource::Upload => "upload",
            IngestSource::Url => "url",
        }
    }
}

/// Result of a completed direct upload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UploadReceipt {
    pub upload_id: String,
    pub asset_id: String,
    pub display_name: String,
}
