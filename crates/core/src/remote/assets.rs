//! Asset management on top of a remote client.

use std::sync::Arc;

use tracing::{debug, info};

use super::{ApiContext, AssetCache, RemoteAsset, RemoteAssetClient, RemoteServiceError};

/// Read-through access to remote assets with a local metadata cache.
pub struct AssetManager {
    client: Arc<dyn RemoteAssetClient>,
    cache: AssetCache,
}

impl AssetManager {
    pub fn new(client: Arc<dyn RemoteAssetClient>, cache_capacity: usize) -> Self {
        Self {
            client,
            cache: AssetCache::new(cache_capacity),
        }
    }

    pub fn client(&self) -> &Arc<dyn RemoteAssetClient> {
        &self.client
    }

    pub fn cache(&self) -> &AssetCache {
        &self.cache
    }

    /// Record an asset seen elsewhere (e.g., after ingestion completes).
    pub fn remember(&self, asset: RemoteAsset) {
        self.cache.insert(asset);
    }

    /// Fetch one asset. Only terminal states are served from cache.
    pub async fn lookup(
        &self,
        ctx: &ApiContext,
        name: &str,
    ) -> Result<RemoteAsset, RemoteServiceError> {
        if let Some(asset) = self.cache.get(name) {
            if asset.state.is_terminal() {
                debug!(name, "Asset served from cache");
                return Ok(asset);
            }
        }

        match self.client.get(ctx, name).await {
            Ok(asset) => {
                self.cache.insert(asset.clone());
                Ok(asset)
            }
            Err(RemoteServiceError::NotFound(n)) => {
                self.cache.remove(name);
                Err(RemoteServiceError::NotFound(n))
            }
            Err(e) => Err(e),
        }
    }

    /// List all assets; refreshes the cache with what the service returned.
    pub async fn list(&self, ctx: &ApiContext) -> Result<Vec<RemoteAsset>, RemoteServiceError> {
        let assets = self.client.list(ctx).await?;
        for asset in &assets {
            self.cache.insert(asset.clone());
        }
        Ok(assets)
    }

    pub async fn rename(
        &self,
        ctx: &ApiContext,
        name: &str,
        display_name: &str,
    ) -> Result<RemoteAsset, RemoteServiceError> {
        let asset = self.client.rename(ctx, name, display_name).await?;
        info!(name, display_name, "Renamed asset");
        self.cache.insert(asset.clone());
        Ok(asset)
    }

    pub async fn delete(&self, ctx: &ApiContext, name: &str) -> Result<(), RemoteServiceError> {
        let result = self.client.delete(ctx, name).await;
        // Gone either way.
        if result.is_ok() || matches!(result, Err(RemoteServiceError::NotFound(_))) {
            self.cache.remove(name);
        }
        result?;
        info!(name, "Deleted asset");
        Ok(())
    }
}
