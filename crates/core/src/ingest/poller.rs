//! Readiness polling against the remote service.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tracing::{error, info};

use crate::config::IngestConfig;
use crate::metrics::REMOTE_POLLS;
use crate::progress::{AssetRef, IngestionStage, ProgressSink, ProgressUpdate};
use crate::remote::{ApiContext, RemoteAsset, RemoteAssetClient, RemoteAssetState};

use super::IngestError;

/// Wait between polls. Injected so tests run without wall-clock delays.
#[async_trait]
pub trait Delay: Send + Sync {
    async fn wait(&self, duration: Duration);
}

/// Production delay backed by the tokio timer.
#[derive(Debug, Default, Clone, Copy)]
pub struct TokioDelay;

#[async_trait]
impl Delay for TokioDelay {
    async fn wait(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}

/// Drives a submitted asset to a terminal remote state.
///
/// State machine: while the asset is not terminal, report progress, wait one
/// fixed interval, then re-fetch. `max_retries` fetches without reaching a
/// terminal state is a timeout.
pub struct ProcessingPoller {
    client: Arc<dyn RemoteAssetClient>,
    delay: Arc<dyn Delay>,
    interval: Duration,
    max_retries: u32,
}

impl ProcessingPoller {
    pub fn new(
        client: Arc<dyn RemoteAssetClient>,
        delay: Arc<dyn Delay>,
        interval: Duration,
        max_retries: u32,
    ) -> Self {
        Self {
            client,
            delay,
            interval,
            max_retries,
        }
    }

    pub fn from_config(
        client: Arc<dyn RemoteAssetClient>,
        delay: Arc<dyn Delay>,
        config: &IngestConfig,
    ) -> Self {
        Self::new(
            client,
            delay,
            Duration::from_secs(config.poll_interval_secs),
            config.max_poll_retries,
        )
    }

    pub fn max_retries(&self) -> u32 {
        self.max_retries
    }

    /// Poll until `asset` is ACTIVE or FAILED.
    ///
    /// Terminal outcomes are reported to `sink`: COMPLETE at 100 with the
    /// asset as result, or ERROR on remote failure or timeout. Remote call
    /// errors are returned without reporting.
    pub async fn await_ready(
        &self,
        ctx: &ApiContext,
        asset: RemoteAsset,
        sink: &dyn ProgressSink,
    ) -> Result<RemoteAsset, IngestError> {
        sink.report(ProgressUpdate::new(
            IngestionStage::Processing,
            60,
            "Processing video...",
        ));

        let mut asset = asset;
        let mut retries: u32 = 0;

        while !asset.state.is_terminal() {
            if retries >= self.max_retries {
                error!(asset = %asset.name, retries, "Video processing timeout");
                sink.report(ProgressUpdate::error("Video processing timeout"));
                return Err(IngestError::ProcessingTimeout);
            }

            info!(
                asset = %asset.name,
                retry = retries + 1,
                max_retries = self.max_retries,
                "Waiting for remote processing"
            );
            let waited = self.interval.as_secs() * retries as u64;
            sink.report(ProgressUpdate::new(
                IngestionStage::Processing,
                polling_progress(retries, self.max_retries),
                format!("Processing video ({}s)...", waited),
            ));

            self.delay.wait(self.interval).await;
            let mut polled = self.client.get(ctx, &asset.name).await?;
            // Status responses may omit the display name chosen at submit.
            if polled.display_name.is_none() {
                polled.display_name = asset.display_name.take();
            }
            asset = polled;
            REMOTE_POLLS.inc();
            retries += 1;
        }

        if asset.state == RemoteAssetState::Failed {
            error!(asset = %asset.name, "Video processing failed");
            sink.report(ProgressUpdate::error("Video processing failed"));
            return Err(IngestError::ProcessingFailed);
        }

        info!(asset = %asset.name, polls = retries, "Remote asset ready");
        sink.report(ProgressUpdate::complete(
            "Video ready!",
            AssetRef {
                asset_id: asset.name.clone(),
                display_name: asset.label().to_string(),
            },
        ));
        Ok(asset)
    }
}

/// Percent after `retry` polls: linear across 60..=95.
pub fn polling_progress(retry: u32, max_retries: u32) -> u8 {
    if max_retries == 0 {
        return 60;
    }
    60 + (retry as u64 * 35 / max_retries as u64).min(35) as u8
}
