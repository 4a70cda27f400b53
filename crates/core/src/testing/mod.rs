//! Testing utilities and mock implementations.
//!
//! This module provides a mock remote service and deterministic stand-ins for
//! the pipeline's timing and progress seams, so ingestion flows can be tested
//! end to end without network access or wall-clock waits.
//!
//! # Example
//!
//! ```rust,ignore
//! use mediaflow_core::testing::{ImmediateDelay, MockRemoteClient, RecordingSink};
//!
//! let client = Arc::new(MockRemoteClient::new());
//! client.script_states(vec![Processing, Processing, Active]);
//!
//! let delay = Arc::new(ImmediateDelay::new());
//! let poller = ProcessingPoller::new(client.clone(), delay, interval, 60);
//! let sink = RecordingSink::new();
//! poller.await_ready(&ctx, asset, &sink).await?;
//! ```

mod mock_remote_client;
mod recording;

pub use mock_remote_client::{MockRemoteClient, SubmittedFile};
pub use recording::{ImmediateDelay, RecordingSink};

/// Test fixtures and helper functions.
pub mod fixtures {
    use crate::config::{Config, ProgressConfig};
    use crate::remote::{ApiContext, RemoteAsset, RemoteAssetState};

    /// Context with dummy credentials.
    pub fn api_context() -> ApiContext {
        ApiContext::new("test-api-key", "gemini-2.5-flash")
    }

    /// An ACTIVE video asset.
    pub fn active_asset(name: &str, display_name: &str) -> RemoteAsset {
        RemoteAsset::new(name, RemoteAssetState::Active)
            .with_display_name(display_name)
            .with_mime_type("video/mp4")
    }

    /// Config suitable for tests: fast polling and a temp dir.
    pub fn test_config(temp_dir: &std::path::Path) -> Config {
        let mut config = Config::default();
        config.remote.api_key = Some("test-api-key".to_string());
        config.ingest.temp_dir = Some(temp_dir.to_path_buf());
        config.ingest.poll_interval_secs = 1;
        config.progress = ProgressConfig {
            max_sessions: 64,
            retention_secs: 60,
            sweep_interval_secs: 60,
        };
        config
    }
}
