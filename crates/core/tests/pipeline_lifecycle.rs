//! Pipeline lifecycle integration tests.
//!
//! These tests drive URL and upload ingestion against an in-process origin
//! server and a mock remote service:
//! - Download progress bands with known and unknown lengths
//! - HTTP error classification
//! - Readiness polling to completion and to timeout
//! - Session isolation under concurrency

use std::convert::Infallible;
use std::sync::Arc;
use std::time::Duration;

use axum::body::{Body, Bytes};
use axum::extract::Path;
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::Router;
use tempfile::TempDir;
use tokio::io::AsyncWriteExt;

use mediaflow_core::config::{IngestConfig, ProgressConfig};
use mediaflow_core::ingest::{DownloadStreamer, IngestionCoordinator};
use mediaflow_core::progress::{IngestionSession, IngestionStage, ProgressTracker};
use mediaflow_core::remote::{AssetManager, RemoteAssetState};
use mediaflow_core::testing::fixtures::api_context;
use mediaflow_core::testing::{ImmediateDelay, MockRemoteClient, RecordingSink};

use RemoteAssetState::{Active, Processing};

const MIB: usize = 1024 * 1024;

// ============================================================================
// Origin server
// ============================================================================

async fn known_length(Path(mib): Path<usize>) -> Response {
    (
        [(header::CONTENT_TYPE, "video/mp4")],
        Body::from(vec![0u8; mib * MIB]),
    )
        .into_response()
}

/// Chunked body with no Content-Length, paced so speed samples are taken.
async fn unknown_length(Path(mib): Path<usize>) -> Response {
    let stream = futures::stream::unfold(0usize, move |sent| async move {
        if sent >= mib {
            return None;
        }
        tokio::time::sleep(Duration::from_millis(15)).await;
        Some((Ok::<_, Infallible>(Bytes::from(vec![1u8; MIB])), sent + 1))
    });
    (
        [(header::CONTENT_TYPE, "video/webm")],
        Body::from_stream(stream),
    )
        .into_response()
}

/// Small chunks with short gaps; slow overall but never idle for long.
async fn trickle() -> Response {
    let stream = futures::stream::unfold(0usize, |sent| async move {
        if sent >= 15 {
            return None;
        }
        tokio::time::sleep(Duration::from_millis(200)).await;
        Some((Ok::<_, Infallible>(Bytes::from(vec![3u8; 1024])), sent + 1))
    });
    (
        [(header::CONTENT_TYPE, "video/mp4")],
        Body::from_stream(stream),
    )
        .into_response()
}

async fn webm_clip() -> Response {
    (
        [(header::CONTENT_TYPE, "video/webm")],
        Body::from(vec![2u8; 64 * 1024]),
    )
        .into_response()
}

async fn start_origin() -> String {
    let app = Router::new()
        .route("/known/{mib}", get(known_length))
        .route("/unknown/{mib}", get(unknown_length))
        .route("/media/{name}", get(webm_clip))
        .route("/trickle", get(trickle))
        .route("/forbidden", get(|| async { StatusCode::FORBIDDEN }))
        .route("/missing", get(|| async { StatusCode::NOT_FOUND }))
        .route("/broken", get(|| async { StatusCode::BAD_GATEWAY }));

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("Failed to bind origin");
    let addr = listener.local_addr().expect("No local addr");
    tokio::spawn(async move {
        axum::serve(listener, app).await.ok();
    });
    format!("http://{}", addr)
}

// ============================================================================
// Harness
// ============================================================================

/// Test helper wiring a coordinator to mocks.
struct TestHarness {
    coordinator: IngestionCoordinator,
    client: Arc<MockRemoteClient>,
    delay: Arc<ImmediateDelay>,
    temp_dir: TempDir,
    origin: String,
}

impl TestHarness {
    async fn new() -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let client = Arc::new(MockRemoteClient::new());
        let delay = Arc::new(ImmediateDelay::new());

        let tracker = Arc::new(ProgressTracker::new(&ProgressConfig::default()));
        let assets = Arc::new(AssetManager::new(client.clone(), 64));
        let coordinator = IngestionCoordinator::new(
            &ingest_config(&temp_dir),
            tracker,
            assets,
            delay.clone(),
        )
        .expect("Failed to build coordinator");

        Self {
            coordinator,
            client,
            delay,
            temp_dir,
            origin: start_origin().await,
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.origin, path)
    }

    /// Poll the tracker until the session is terminal.
    async fn wait_terminal(&self, upload_id: &str) -> IngestionSession {
        for _ in 0..1000 {
            let session = self.coordinator.tracker().get(upload_id);
            if session.stage.is_terminal() {
                return session;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("session {} never finished", upload_id);
    }

    fn temp_files(&self) -> usize {
        std::fs::read_dir(self.temp_dir.path()).unwrap().count()
    }
}

fn ingest_config(temp_dir: &TempDir) -> IngestConfig {
    IngestConfig {
        temp_dir: Some(temp_dir.path().to_path_buf()),
        ..IngestConfig::default()
    }
}

fn downloading_progress(sink: &RecordingSink) -> Vec<(u8, u64, u64)> {
    sink.updates()
        .iter()
        .filter(|u| u.stage == IngestionStage::Downloading)
        .map(|u| (u.progress, u.loaded, u.total))
        .collect()
}

// ============================================================================
// Download streamer
// ============================================================================

#[tokio::test]
async fn test_known_length_download_stays_in_band() {
    let origin = start_origin().await;
    let temp_dir = TempDir::new().unwrap();
    let streamer = DownloadStreamer::new(&ingest_config(&temp_dir)).unwrap();
    let sink = RecordingSink::new();

    let url = format!("{}/known/100", origin).parse().unwrap();
    let media = streamer.download(&url, &sink).await.unwrap();

    assert_eq!(media.bytes, (100 * MIB) as u64);
    assert_eq!(media.display_name, "100.mp4");
    assert_eq!(media.mime_type, "video/mp4");

    let progress = downloading_progress(&sink);
    assert!(progress.iter().all(|(p, _, _)| (10..=50).contains(p)));
    assert!(progress.windows(2).all(|w| w[0].0 <= w[1].0));

    let (last_progress, loaded, total) = *progress.last().unwrap();
    assert_eq!(last_progress, 50);
    assert_eq!(loaded, (100 * MIB) as u64);
    assert_eq!(loaded, total);
    assert_eq!(sink.last().unwrap().speed, 0.0);

    let path = media.file.path().to_path_buf();
    assert_eq!(std::fs::metadata(&path).unwrap().len(), (100 * MIB) as u64);
    drop(media);
    assert!(!path.exists());
}

#[tokio::test]
async fn test_unknown_length_caps_at_45() {
    let origin = start_origin().await;
    let temp_dir = TempDir::new().unwrap();
    let streamer = DownloadStreamer::new(&ingest_config(&temp_dir)).unwrap();
    let sink = RecordingSink::new();

    let url = format!("{}/unknown/48", origin).parse().unwrap();
    let media = streamer.download(&url, &sink).await.unwrap();
    assert_eq!(media.bytes, (48 * MIB) as u64);
    assert_eq!(media.display_name, "48.webm");

    let progress = downloading_progress(&sink);
    let (last, intermediate) = progress.split_last().unwrap();
    assert_eq!(last.0, 50);
    assert!(intermediate.len() > 1);
    assert!(intermediate.iter().all(|(p, _, total)| *p <= 45 && *total == 0));
    for (p, loaded, _) in intermediate {
        if *loaded >= (35 * MIB) as u64 {
            assert_eq!(*p, 45);
        }
    }
}

#[tokio::test]
async fn test_slow_download_outlasting_read_timeout_completes() {
    let origin = start_origin().await;
    let temp_dir = TempDir::new().unwrap();
    let config = IngestConfig {
        download_timeout_secs: 1,
        ..ingest_config(&temp_dir)
    };
    let streamer = DownloadStreamer::new(&config).unwrap();
    let sink = RecordingSink::new();

    let started = std::time::Instant::now();
    let url = format!("{}/trickle", origin).parse().unwrap();
    let media = streamer.download(&url, &sink).await.unwrap();

    assert!(started.elapsed() > Duration::from_secs(2));
    assert_eq!(media.bytes, 15 * 1024);
    assert_eq!(sink.last().unwrap().progress, 50);
}

#[tokio::test]
async fn test_forbidden_download_sets_error() {
    let harness = TestHarness::new().await;

    let id = harness
        .coordinator
        .ingest_url(&harness.url("/forbidden"), api_context())
        .unwrap();
    let session = harness.wait_terminal(&id).await;

    assert_eq!(session.stage, IngestionStage::Error);
    assert_eq!(session.progress, 0);
    assert!(session.message.contains("HTTP 403"));
    assert!(session.message.contains("Access denied"));
    assert!(harness.client.submitted().is_empty());
    assert_eq!(harness.temp_files(), 0);
}

#[tokio::test]
async fn test_missing_and_server_error_messages() {
    let harness = TestHarness::new().await;

    let missing = harness
        .coordinator
        .ingest_url(&harness.url("/missing"), api_context())
        .unwrap();
    let broken = harness
        .coordinator
        .ingest_url(&harness.url("/broken"), api_context())
        .unwrap();

    let missing = harness.wait_terminal(&missing).await;
    let broken = harness.wait_terminal(&broken).await;
    assert!(missing.message.ends_with("Video not found."));
    assert!(broken.message.ends_with("Server error."));
}

// ============================================================================
// Full URL pipeline
// ============================================================================

#[tokio::test]
async fn test_url_ingest_completes_after_four_polls() {
    let harness = TestHarness::new().await;
    // submit -> PROCESSING, then polls see P, P, P, A
    harness
        .client
        .script_states(vec![Processing, Processing, Processing, Processing, Active]);

    let id = harness
        .coordinator
        .ingest_url(&harness.url("/media/clip%20one"), api_context())
        .unwrap();

    // Visible immediately.
    assert_ne!(
        harness.coordinator.tracker().get(&id).stage,
        IngestionStage::Unknown
    );

    let session = harness.wait_terminal(&id).await;
    assert_eq!(session.stage, IngestionStage::Complete);
    assert_eq!(session.progress, 100);
    assert_eq!(session.bytes_loaded, 64 * 1024);
    assert_eq!(session.result_display_name.as_deref(), Some("clip one.webm"));
    assert_eq!(harness.client.get_calls(), 4);
    assert_eq!(harness.delay.waits(), 4);

    let submitted = harness.client.submitted();
    assert_eq!(submitted.len(), 1);
    assert_eq!(submitted[0].display_name, "clip one.webm");
    assert_eq!(submitted[0].mime_type.as_deref(), Some("video/webm"));
    assert_eq!(submitted[0].bytes, 64 * 1024);
    assert_eq!(harness.temp_files(), 0);

    let asset_id = session.result_asset_id.unwrap();
    assert!(harness.coordinator.assets().cache().get(&asset_id).is_some());
}

#[tokio::test]
async fn test_url_ingest_times_out_after_max_retries() {
    let harness = TestHarness::new().await;
    harness.client.script_states(vec![Processing; 200]);

    let id = harness
        .coordinator
        .ingest_url(&harness.url("/media/slow.mp4"), api_context())
        .unwrap();
    let session = harness.wait_terminal(&id).await;

    assert_eq!(session.stage, IngestionStage::Error);
    assert_eq!(session.progress, 0);
    assert_eq!(session.message, "Video processing timeout");
    assert_eq!(harness.client.get_calls(), 60);
    assert_eq!(harness.temp_files(), 0);
}

#[tokio::test]
async fn test_concurrent_sessions_are_isolated() {
    let harness = TestHarness::new().await;

    let small = harness
        .coordinator
        .ingest_url(&harness.url("/known/3"), api_context())
        .unwrap();
    let large = harness
        .coordinator
        .ingest_url(&harness.url("/known/5"), api_context())
        .unwrap();
    assert_ne!(small, large);

    let small = harness.wait_terminal(&small).await;
    let large = harness.wait_terminal(&large).await;

    assert_eq!(small.stage, IngestionStage::Complete);
    assert_eq!(large.stage, IngestionStage::Complete);
    assert_eq!(small.bytes_loaded, (3 * MIB) as u64);
    assert_eq!(large.bytes_loaded, (5 * MIB) as u64);
    assert_eq!(small.result_display_name.as_deref(), Some("3.mp4"));
    assert_eq!(large.result_display_name.as_deref(), Some("5.mp4"));
    assert_ne!(small.result_asset_id, large.result_asset_id);
}

// ============================================================================
// Direct upload
// ============================================================================

#[tokio::test]
async fn test_upload_progress_is_monotonic() {
    let harness = TestHarness::new().await;
    harness.client.script_states(vec![Processing, Processing, Active]);

    let data = vec![9u8; 3 * MIB + 17];
    let (mut writer, reader) = tokio::io::duplex(64 * 1024);
    let payload = data.clone();
    let feeder = tokio::spawn(async move {
        for chunk in payload.chunks(256 * 1024) {
            writer.write_all(chunk).await.unwrap();
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    });

    let tracker = Arc::clone(harness.coordinator.tracker());
    let sampler = tokio::spawn(async move {
        let mut seen = Vec::new();
        loop {
            let session = tracker.get("upload-1");
            if session.stage != IngestionStage::Unknown {
                seen.push(session.progress);
            }
            if session.stage.is_terminal() {
                return seen;
            }
            tokio::time::sleep(Duration::from_millis(1)).await;
        }
    });

    let receipt = harness
        .coordinator
        .ingest_upload(
            reader,
            "holiday.MOV",
            None,
            Some(data.len() as u64),
            Some("upload-1"),
            &api_context(),
        )
        .await
        .unwrap();
    feeder.await.unwrap();
    let seen = sampler.await.unwrap();

    assert_eq!(receipt.upload_id, "upload-1");
    assert_eq!(receipt.display_name, "holiday.MOV");

    assert!(seen.windows(2).all(|w| w[0] <= w[1]), "{:?}", seen);
    assert!(seen.iter().any(|p| (11..30).contains(p)), "{:?}", seen);
    assert_eq!(seen.last(), Some(&100));

    let session = harness.coordinator.tracker().get("upload-1");
    assert_eq!(session.stage, IngestionStage::Complete);
    assert_eq!(session.bytes_loaded, data.len() as u64);

    let submitted = harness.client.submitted();
    assert_eq!(submitted[0].mime_type.as_deref(), Some("video/quicktime"));
    assert!(submitted[0].path.to_string_lossy().ends_with(".mov"));
    assert_eq!(harness.temp_files(), 0);
}
