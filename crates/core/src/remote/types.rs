//! Types for the remote processing service.

use std::path::Path;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::config::RemoteConfig;

/// Credential value shipped in sample `.env` files; treated as absent.
const PLACEHOLDER_API_KEY: &str = "PLACEHOLDER_API_KEY";

/// Errors that can occur during remote service operations.
#[derive(Debug, Error)]
pub enum RemoteServiceError {
    #[error("HTTP error: {0}")]
    Http(String),

    #[error("API error: {status} - {message}")]
    Api { status: u16, message: String },

    #[error("Asset not found: {0}")]
    NotFound(String),

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Request timeout")]
    Timeout,

    #[error("Not configured: {0}")]
    NotConfigured(String),
}

/// Processing state reported by the remote service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RemoteAssetState {
    Uploading,
    Processing,
    Active,
    Failed,
}

impl RemoteAssetState {
    pub fn as_str(&self) -> &'static str {
        match self {
            RemoteAssetState::Uploading => "UPLOADING",
            RemoteAssetState::Processing => "PROCESSING",
            RemoteAssetState::Active => "ACTIVE",
            RemoteAssetState::Failed => "FAILED",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, RemoteAssetState::Active | RemoteAssetState::Failed)
    }
}

/// An asset held by the remote service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RemoteAsset {
    /// Opaque identifier (e.g., "files/abc123").
    pub name: String,
    pub state: RemoteAssetState,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mime_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub size_bytes: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub uri: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub create_time: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expiration_time: Option<DateTime<Utc>>,
}

impl RemoteAsset {
    pub fn new(name: impl Into<String>, state: RemoteAssetState) -> Self {
        Self {
            name: name.into(),
            state,
            display_name: None,
            mime_type: None,
            size_bytes: None,
            uri: None,
            create_time: None,
            expiration_time: None,
        }
    }

    pub fn with_display_name(mut self, display_name: impl Into<String>) -> Self {
        self.display_name = Some(display_name.into());
        self
    }

    pub fn with_mime_type(mut self, mime_type: impl Into<String>) -> Self {
        self.mime_type = Some(mime_type.into());
        self
    }

    /// Display name, falling back to the identifier.
    pub fn label(&self) -> &str {
        self.display_name.as_deref().unwrap_or(&self.name)
    }
}

/// Per-request credentials and model selection for remote calls.
#[derive(Clone)]
pub struct ApiContext {
    api_key: String,
    model: String,
}

impl std::fmt::Debug for ApiContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApiContext")
            .field("api_key", &"<redacted>")
            .field("model", &self.model)
            .finish()
    }
}

impl ApiContext {
    pub fn new(api_key: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            model: model.into(),
        }
    }

    /// Build a context from request headers, falling back to configuration.
    pub fn resolve(
        header_key: Option<&str>,
        header_model: Option<&str>,
        config: &RemoteConfig,
    ) -> Result<Self, RemoteServiceError> {
        let api_key = header_key
            .map(str::trim)
            .filter(|k| !k.is_empty())
            .or_else(|| config.api_key.as_deref().map(str::trim))
            .filter(|k| !k.is_empty() && *k != PLACEHOLDER_API_KEY)
            .ok_or_else(|| {
                RemoteServiceError::NotConfigured(
                    "API key not configured. Set remote.api_key or provide the \
                     x-gemini-api-key header."
                        .to_string(),
                )
            })?;

        let model = header_model
            .map(str::trim)
            .filter(|m| !m.is_empty())
            .unwrap_or(&config.default_model);

        Ok(Self::new(api_key, model))
    }

    pub fn api_key(&self) -> &str {
        &self.api_key
    }

    pub fn model(&self) -> &str {
        &self.model
    }
}

/// Trait for remote processing service backends.
///
/// Failures are returned as-is; callers decide whether to retry.
#[async_trait]
pub trait RemoteAssetClient: Send + Sync {
    /// Backend name for logging.
    fn name(&self) -> &str;

    /// Upload a local file. The returned asset is usually still
    /// UPLOADING or PROCESSING.
    async fn submit(
        &self,
        ctx: &ApiContext,
        path: &Path,
        display_name: &str,
        mime_type: Option<&str>,
    ) -> Result<RemoteAsset, RemoteServiceError>;

    /// Fetch the current state of an asset.
    async fn get(&self, ctx: &ApiContext, name: &str) -> Result<RemoteAsset, RemoteServiceError>;

    /// Delete an asset.
    async fn delete(&self, ctx: &ApiContext, name: &str) -> Result<(), RemoteServiceError>;

    /// Change an asset's display name.
    async fn rename(
        &self,
        ctx: &ApiContext,
        name: &str,
        display_name: &str,
    ) -> Result<RemoteAsset, RemoteServiceError>;

    /// List all assets visible to the credential.
    async fn list(&self, ctx: &ApiContext) -> Result<Vec<RemoteAsset>, RemoteServiceError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    fn remote_config(api_key: Option<&str>) -> RemoteConfig {
        RemoteConfig {
            api_key: api_key.map(str::to_string),
            ..RemoteConfig::default()
        }
    }

    #[test]
    fn test_state_serialization() {
        assert_eq!(
            serde_json::to_string(&RemoteAssetState::Processing).unwrap(),
            "\"PROCESSING\""
        );
        let state: RemoteAssetState = serde_json::from_str("\"ACTIVE\"").unwrap();
        assert_eq!(state, RemoteAssetState::Active);
    }

    #[test]
    fn test_state_terminal() {
        assert!(RemoteAssetState::Active.is_terminal());
        assert!(RemoteAssetState::Failed.is_terminal());
        assert!(!RemoteAssetState::Processing.is_terminal());
        assert!(!RemoteAssetState::Uploading.is_terminal());
    }

    #[test]
    fn test_asset_label_falls_back_to_name() {
        let asset = RemoteAsset::new("files/1", RemoteAssetState::Active);
        assert_eq!(asset.label(), "files/1");
        let asset = asset.with_display_name("clip.mp4");
        assert_eq!(asset.label(), "clip.mp4");
    }

    #[test]
    fn test_resolve_prefers_header() {
        let ctx = ApiContext::resolve(
            Some("header-key"),
            Some("gemini-2.5-pro"),
            &remote_config(Some("config-key")),
        )
        .unwrap();
        assert_eq!(ctx.api_key(), "header-key");
        assert_eq!(ctx.model(), "gemini-2.5-pro");
    }

    #[test]
    fn test_resolve_falls_back_to_config() {
        let ctx =
            ApiContext::resolve(None, Some("  "), &remote_config(Some("config-key"))).unwrap();
        assert_eq!(ctx.api_key(), "config-key");
        assert_eq!(ctx.model(), "gemini-2.5-flash");
    }

    #[test]
    fn test_resolve_missing_key_is_configuration_error() {
        let result = ApiContext::resolve(None, None, &remote_config(None));
        assert!(matches!(result, Err(RemoteServiceError::NotConfigured(_))));
    }

    #[test]
    fn test_resolve_placeholder_key_rejected() {
        let result = ApiContext::resolve(None, None, &remote_config(Some("PLACEHOLDER_API_KEY")));
        assert!(matches!(result, Err(RemoteServiceError::NotConfigured(_))));
    }

    #[test]
    fn test_context_debug_redacts_key() {
        let ctx = ApiContext::new("super-secret", "m");
        assert!(!format!("{:?}", ctx).contains("super-secret"));
    }
}
