//! Media ingestion pipeline.
//!
//! Bytes arrive either as a direct upload ([`UploadStreamer`]) or from a
//! remote URL ([`DownloadStreamer`]), land in a [`ScopedTempFile`], are
//! submitted to the remote service, and are then polled until ready
//! ([`ProcessingPoller`]). [`IngestionCoordinator`] wires the stages together
//! and records every step in the progress tracker.
//!
//! Progress bands per stage:
//! - receiving: 10..=30 (direct upload)
//! - downloading: 10..=50 (URL)
//! - submitting: 40 (upload) or 50 (URL)
//! - processing: 60..=95
//! - complete: 100

mod coordinator;
mod download;
mod media;
mod poller;
mod temp;
mod types;
mod upload;

pub use coordinator::IngestionCoordinator;
pub use download::{describe_http_failure, download_progress, DownloadStreamer, DownloadedMedia};
pub use media::{
    display_name_from_url, extension_for_content_type, extension_from_filename, infer_mime_type,
};
pub use poller::{polling_progress, Delay, ProcessingPoller, TokioDelay};
pub use temp::ScopedTempFile;
pub use types::*;
pub use upload::{receive_progress, UploadStreamer};
