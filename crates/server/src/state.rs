use std::sync::Arc;

use axum::http::HeaderMap;
use mediaflow_core::ingest::{Delay, IngestError, IngestionCoordinator};
use mediaflow_core::remote::{ApiContext, AssetManager, RemoteAssetClient};
use mediaflow_core::{Config, ProgressTracker, SanitizedConfig};

/// Header carrying a per-request API credential.
pub const API_KEY_HEADER: &str = "x-gemini-api-key";
/// Header selecting the remote model.
pub const MODEL_HEADER: &str = "x-gemini-model";

/// Shared application state
pub struct AppState {
    config: Config,
    coordinator: IngestionCoordinator,
}

impl AppState {
    pub fn new(config: Config, coordinator: IngestionCoordinator) -> Self {
        Self {
            config,
            coordinator,
        }
    }

    /// Wire the tracker, asset cache and coordinator around a remote client.
    pub fn build(
        config: Config,
        client: Arc<dyn RemoteAssetClient>,
        delay: Arc<dyn Delay>,
    ) -> Result<Self, IngestError> {
        let tracker = Arc::new(ProgressTracker::new(&config.progress));
        let assets = Arc::new(AssetManager::new(client, config.cache.max_assets));
        let coordinator = IngestionCoordinator::new(&config.ingest, tracker, assets, delay)?;
        Ok(Self::new(config, coordinator))
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn sanitized_config(&self) -> SanitizedConfig {
        SanitizedConfig::from(&self.config)
    }

    pub fn coordinator(&self) -> &IngestionCoordinator {
        &self.coordinator
    }

    pub fn tracker(&self) -> &Arc<ProgressTracker> {
        self.coordinator.tracker()
    }

    pub fn assets(&self) -> &Arc<AssetManager> {
        self.coordinator.assets()
    }

    /// Resolve credentials for a request from its headers and the config.
    pub fn api_context(&self, headers: &HeaderMap) -> Result<ApiContext, IngestError> {
        let header = |name: &str| headers.get(name).and_then(|v| v.to_str().ok());
        ApiContext::resolve(header(API_KEY_HEADER), header(MODEL_HEADER), &self.config.remote)
            .map_err(IngestError::from)
    }
}
