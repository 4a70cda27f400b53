//! Streaming download of remote media into a scoped temp file.

use std::path::PathBuf;
use std::time::Duration;

use bytes::BytesMut;
use futures::StreamExt;
use reqwest::header::CONTENT_TYPE;
use reqwest::{Client, StatusCode, Url};
use tokio::io::AsyncWriteExt;
use tokio::time::Instant;
use tracing::{debug, error, info};

use crate::config::IngestConfig;
use crate::metrics::BYTES_RECEIVED;
use crate::progress::{format_eta, IngestionStage, ProgressSink, ProgressUpdate, SpeedEstimator};

use super::media::{display_name_from_url, extension_for_content_type, infer_mime_type};
use super::temp::ScopedTempFile;
use super::IngestError;

const MIB: u64 = 1024 * 1024;

/// Plain UA; some CDNs reject requests without one.
const USER_AGENT: &str = "Mozilla/5.0 (Windows NT 6.1; Trident/7.0; rv:11.0) like Gecko";
const MAX_REDIRECTS: usize = 10;
const CONNECT_TIMEOUT: Duration = Duration::from_secs(30);

/// A fully downloaded media file.
#[derive(Debug)]
pub struct DownloadedMedia {
    /// Deleted when dropped.
    pub file: ScopedTempFile,
    pub display_name: String,
    pub mime_type: String,
    pub bytes: u64,
}

/// Fetches a URL into local storage, reporting progress in the 10..=50 band.
pub struct DownloadStreamer {
    client: Client,
    chunk_size: usize,
    temp_dir: Option<PathBuf>,
}

impl DownloadStreamer {
    pub fn new(config: &IngestConfig) -> Result<Self, IngestError> {
        // Idle bound per read; large bodies may stream for much longer overall.
        let client = Client::builder()
            .connect_timeout(CONNECT_TIMEOUT)
            .read_timeout(Duration::from_secs(config.download_timeout_secs))
            .redirect(reqwest::redirect::Policy::limited(MAX_REDIRECTS))
            .user_agent(USER_AGENT)
            .build()
            .map_err(|e| IngestError::Configuration(format!("HTTP client: {}", e)))?;

        Ok(Self {
            client,
            chunk_size: config.chunk_size_bytes.max(1),
            temp_dir: config.temp_dir.clone(),
        })
    }

    /// Download `url`. On failure the sink receives an ERROR update before
    /// the error is returned.
    pub async fn download(
        &self,
        url: &Url,
        sink: &dyn ProgressSink,
    ) -> Result<DownloadedMedia, IngestError> {
        match self.fetch(url, sink).await {
            Ok(media) => Ok(media),
            Err(e) => {
                error!(url = %url, error = %e, "Download failed");
                sink.report(ProgressUpdate::error(e.to_string()));
                Err(e)
            }
        }
    }

    async fn fetch(
        &self,
        url: &Url,
        sink: &dyn ProgressSink,
    ) -> Result<DownloadedMedia, IngestError> {
        info!(url = %url, "Downloading video from URL");

        sink.report(ProgressUpdate::new(
            IngestionStage::Downloading,
            10,
            "Connecting to URL...",
        ));
        let response = self
            .client
            .get(url.clone())
            .send()
            .await
            .map_err(|e| IngestError::download(format!("Failed to download video: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            return Err(IngestError::download(describe_http_failure(status)));
        }

        let total = response.content_length().unwrap_or(0);
        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        let extension = extension_for_content_type(content_type.as_deref());
        let display_name = display_name_from_url(url, extension);
        let mime_type = infer_mime_type(content_type.as_deref(), extension);

        let (temp, mut file) = ScopedTempFile::create(self.temp_dir.as_deref(), extension)
            .map_err(|e| IngestError::download(format!("Failed to create temp file: {}", e)))?;

        let mut estimator = SpeedEstimator::new();
        estimator.observe(0, Instant::now());
        let mut buffer = BytesMut::with_capacity(self.chunk_size);
        let mut loaded: u64 = 0;
        let mut stream = response.bytes_stream();

        loop {
            let next = stream.next().await;
            let done = next.is_none();
            if let Some(chunk) = next {
                let chunk = chunk.map_err(|e| {
                    IngestError::download(format!("Download interrupted: {}", e))
                })?;
                buffer.extend_from_slice(&chunk);
            }

            while buffer.len() >= self.chunk_size || (done && !buffer.is_empty()) {
                let take = buffer.len().min(self.chunk_size);
                let piece = buffer.split_to(take);
                file.write_all(&piece).await.map_err(|e| {
                    IngestError::download(format!("Failed to write temp file: {}", e))
                })?;
                loaded += piece.len() as u64;

                if let Some(speed) = estimator.observe(piece.len() as u64, Instant::now()) {
                    debug!(loaded, total, speed, "Download chunk");
                    sink.report(
                        ProgressUpdate::new(
                            IngestionStage::Downloading,
                            download_progress(loaded, total),
                            download_message(loaded, total, &estimator),
                        )
                        .with_bytes(loaded, total)
                        .with_speed(speed),
                    );
                }
            }

            if done {
                break;
            }
        }

        file.flush()
            .await
            .map_err(|e| IngestError::download(format!("Failed to write temp file: {}", e)))?;
        drop(file);

        BYTES_RECEIVED.with_label_values(&["url"]).inc_by(loaded);
        info!(url = %url, bytes = loaded, display_name = %display_name, "Download complete");
        sink.report(
            ProgressUpdate::new(IngestionStage::Downloading, 50, "Download complete!")
                .with_bytes(loaded, loaded)
                .with_speed(0.0),
        );

        Ok(DownloadedMedia {
            file: temp,
            display_name,
            mime_type,
            bytes: loaded,
        })
    }
}

/// Caller-facing message for a non-success download status.
pub fn describe_http_failure(status: StatusCode) -> String {
    let code = status.as_u16();
    let mut message = format!("Failed to download video (HTTP {})", code);
    match code {
        403 => message.push_str(
            " - Access denied. The link may have expired or requires authentication.",
        ),
        404 => message.push_str(" - Video not found."),
        c if c >= 500 => message.push_str(" - Server error."),
        _ => {}
    }
    message
}

/// Percent for `loaded` bytes: 10..=50 with a known total, else one point
/// per MiB capped at 45.
pub fn download_progress(loaded: u64, total: u64) -> u8 {
    if total > 0 {
        let scaled = (loaded as u128 * 40 / total as u128).min(40) as u8;
        10 + scaled
    } else {
        (10 + loaded / MIB).min(45) as u8
    }
}

fn download_message(loaded: u64, total: u64, estimator: &SpeedEstimator) -> String {
    let mut message = if total > 0 {
        format!(
            "Downloading: {:.1}MB / {:.1}MB",
            loaded as f64 / MIB as f64,
            total as f64 / MIB as f64
        )
    } else {
        format!("Downloading: {:.1}MB", loaded as f64 / MIB as f64)
    };

    let speed = estimator.speed();
    if speed > 0.0 {
        message.push_str(&format!(" ({:.2} MB/s)", speed / MIB as f64));
        if total > loaded {
            if let Some(eta) = estimator.eta(total - loaded) {
                message.push_str(&format!(" - {} remaining", format_eta(eta)));
            }
        }
    }
    message
}
