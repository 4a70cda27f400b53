//! End-to-end ingestion orchestration.

use std::sync::Arc;

use reqwest::Url;
use tokio::io::AsyncRead;
use tokio::time::Instant;
use tracing::{error, info, info_span, warn, Instrument};

use crate::config::IngestConfig;
use crate::metrics::{
    INGESTIONS_COMPLETED, INGESTIONS_FAILED, INGESTIONS_STARTED, INGESTION_DURATION,
};
use crate::progress::{
    IngestionStage, ProgressSink, ProgressTracker, ProgressUpdate, SessionHandle,
};
use crate::remote::{ApiContext, AssetManager, RemoteAsset, RemoteServiceError};

use super::download::DownloadStreamer;
use super::media::{extension_from_filename, infer_mime_type};
use super::poller::{Delay, ProcessingPoller};
use super::upload::UploadStreamer;
use super::{IngestError, IngestSource, UploadReceipt};

const SUBMITTING_MESSAGE: &str = "Uploading to processing service...";
const DEFAULT_UPLOAD_SUFFIX: &str = ".mp4";
const ABORTED_MESSAGE: &str = "Upload aborted";

/// Runs ingestion sessions: receive or download, submit, then poll.
///
/// Every session is registered with the tracker before any I/O starts, and
/// every failure is recorded there as an ERROR snapshot.
#[derive(Clone)]
pub struct IngestionCoordinator {
    tracker: Arc<ProgressTracker>,
    assets: Arc<AssetManager>,
    downloader: Arc<DownloadStreamer>,
    receiver: Arc<UploadStreamer>,
    poller: Arc<ProcessingPoller>,
}

impl IngestionCoordinator {
    pub fn new(
        config: &IngestConfig,
        tracker: Arc<ProgressTracker>,
        assets: Arc<AssetManager>,
        delay: Arc<dyn Delay>,
    ) -> Result<Self, IngestError> {
        let poller = ProcessingPoller::from_config(Arc::clone(assets.client()), delay, config);
        Ok(Self {
            tracker,
            assets,
            downloader: Arc::new(DownloadStreamer::new(config)?),
            receiver: Arc::new(UploadStreamer::new(config)),
            poller: Arc::new(poller),
        })
    }

    pub fn tracker(&self) -> &Arc<ProgressTracker> {
        &self.tracker
    }

    pub fn assets(&self) -> &Arc<AssetManager> {
        &self.assets
    }

    /// Ingest an uploaded payload within the caller's request.
    ///
    /// `upload_id` lets the caller pick the session id so it can poll progress
    /// while the request is still running; a fresh id is generated otherwise.
    pub async fn ingest_upload<R>(
        &self,
        reader: R,
        filename: &str,
        mime_type: Option<&str>,
        expected_size: Option<u64>,
        upload_id: Option<&str>,
        ctx: &ApiContext,
    ) -> Result<UploadReceipt, IngestError>
    where
        R: AsyncRead + Unpin + Send,
    {
        let session = match upload_id.map(str::trim).filter(|id| !id.is_empty()) {
            Some(id) => self
                .tracker
                .open_with_id(id, IngestionStage::Receiving)
                .ok_or_else(|| {
                    IngestError::InvalidRequest(format!("Upload ID already in use: {}", id))
                })?,
            None => self.tracker.open(IngestionStage::Receiving),
        };
        INGESTIONS_STARTED.with_label_values(&[IngestSource::Upload.as_str()]).inc();
        info!(upload_id = %session.id(), filename, "Starting direct upload ingest");

        // The request future is dropped if the client disconnects mid-upload.
        let guard = AbortGuard::new(&session);
        let started = Instant::now();
        let result = self
            .run_upload(&session, reader, filename, mime_type, expected_size, ctx)
            .instrument(info_span!("ingest_upload", upload_id = %session.id()))
            .await;
        guard.disarm();
        let asset = self.finish(&session, IngestSource::Upload, started, result)?;

        Ok(UploadReceipt {
            upload_id: session.id().to_string(),
            asset_id: asset.name,
            display_name: filename.to_string(),
        })
    }

    /// Start a background URL ingest and return its session id immediately.
    pub fn ingest_url(&self, url: &str, ctx: ApiContext) -> Result<String, IngestError> {
        let url = parse_source_url(url)?;
        let session = self.tracker.open(IngestionStage::Downloading);
        let upload_id = session.id().to_string();
        INGESTIONS_STARTED.with_label_values(&[IngestSource::Url.as_str()]).inc();
        info!(upload_id = %upload_id, url = %url, "Starting URL download in background");

        let this = self.clone();
        let span = info_span!("ingest_url", upload_id = %upload_id);
        tokio::spawn(
            async move {
                let started = Instant::now();
                let result = this.run_url(&session, &url, &ctx).await;
                // Outcome is already in the tracker.
                let _ = this.finish(&session, IngestSource::Url, started, result);
            }
            .instrument(span),
        );

        Ok(upload_id)
    }

    async fn run_upload<R>(
        &self,
        session: &SessionHandle,
        reader: R,
        filename: &str,
        mime_type: Option<&str>,
        expected_size: Option<u64>,
        ctx: &ApiContext,
    ) -> Result<RemoteAsset, IngestError>
    where
        R: AsyncRead + Unpin + Send,
    {
        session.report(ProgressUpdate::new(
            IngestionStage::Receiving,
            10,
            "Receiving file...",
        ));

        let suffix =
            extension_from_filename(filename).unwrap_or_else(|| DEFAULT_UPLOAD_SUFFIX.to_string());
        let (file, received) = self
            .receiver
            .receive(reader, &suffix, expected_size, session)
            .await?;
        let mime_type = infer_mime_type(mime_type, &suffix);

        session.report(
            ProgressUpdate::new(IngestionStage::Submitting, 40, SUBMITTING_MESSAGE)
                .with_bytes(received, received),
        );
        let asset = self.submit(ctx, &file, filename, &mime_type).await?;
        drop(file);

        self.await_and_remember(ctx, asset, session).await
    }

    async fn run_url(
        &self,
        session: &SessionHandle,
        url: &Url,
        ctx: &ApiContext,
    ) -> Result<RemoteAsset, IngestError> {
        let media = self.downloader.download(url, session).await?;

        session.report(
            ProgressUpdate::new(IngestionStage::Submitting, 50, SUBMITTING_MESSAGE)
                .with_bytes(media.bytes, media.bytes),
        );
        let asset = self
            .submit(ctx, &media.file, &media.display_name, &media.mime_type)
            .await?;
        drop(media);

        self.await_and_remember(ctx, asset, session).await
    }

    async fn submit(
        &self,
        ctx: &ApiContext,
        file: &super::ScopedTempFile,
        display_name: &str,
        mime_type: &str,
    ) -> Result<RemoteAsset, IngestError> {
        info!(display_name, mime_type, "Submitting to remote service");
        self.assets
            .client()
            .submit(ctx, file.path(), display_name, Some(mime_type))
            .await
            .map_err(|e| match e {
                RemoteServiceError::NotConfigured(msg) => IngestError::Configuration(msg),
                other => IngestError::RemoteSubmit(other.to_string()),
            })
    }

    async fn await_and_remember(
        &self,
        ctx: &ApiContext,
        asset: RemoteAsset,
        session: &SessionHandle,
    ) -> Result<RemoteAsset, IngestError> {
        let ready = self.poller.await_ready(ctx, asset, session).await?;
        self.assets.remember(ready.clone());
        Ok(ready)
    }

    /// Record the outcome of a session in metrics and the tracker.
    fn finish<T>(
        &self,
        session: &SessionHandle,
        source: IngestSource,
        started: Instant,
        result: Result<T, IngestError>,
    ) -> Result<T, IngestError> {
        let elapsed = started.elapsed().as_secs_f64();
        match &result {
            Ok(_) => {
                info!(
                    upload_id = %session.id(),
                    source = source.as_str(),
                    elapsed,
                    "Ingest completed"
                );
                INGESTIONS_COMPLETED.with_label_values(&[source.as_str()]).inc();
                INGESTION_DURATION
                    .with_label_values(&[source.as_str(), "success"])
                    .observe(elapsed);
            }
            Err(e) => {
                error!(
                    upload_id = %session.id(),
                    source = source.as_str(),
                    error = %e,
                    "Ingest failed"
                );
                // No-op when a stage already reported the failure.
                session.report(ProgressUpdate::error(e.to_string()));
                INGESTIONS_FAILED
                    .with_label_values(&[source.as_str(), e.kind()])
                    .inc();
                INGESTION_DURATION
                    .with_label_values(&[source.as_str(), "failure"])
                    .observe(elapsed);
            }
        }
        result
    }
}

/// Fails an inline session whose driving future was dropped before finishing.
struct AbortGuard<'a> {
    session: &'a SessionHandle,
    armed: bool,
}

impl<'a> AbortGuard<'a> {
    fn new(session: &'a SessionHandle) -> Self {
        Self {
            session,
            armed: true,
        }
    }

    fn disarm(mut self) {
        self.armed = false;
    }
}

impl Drop for AbortGuard<'_> {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        warn!(upload_id = %self.session.id(), "Upload aborted before completion");
        self.session.report(ProgressUpdate::error(ABORTED_MESSAGE));
        INGESTIONS_FAILED
            .with_label_values(&[IngestSource::Upload.as_str(), "aborted"])
            .inc();
    }
}

/// Accept only absolute http(s) URLs.
fn parse_source_url(raw: &str) -> Result<Url, IngestError> {
    let url = Url::parse(raw.trim())
        .map_err(|e| IngestError::InvalidRequest(format!("Invalid URL: {}", e)))?;
    match url.scheme() {
        "http" | "https" => Ok(url),
        other => Err(IngestError::InvalidRequest(format!(
            "Unsupported URL scheme: {}",
            other
        ))),
    }
}
