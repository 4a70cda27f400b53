use serde::{Deserialize, Serialize};
use std::net::IpAddr;
use std::path::PathBuf;

/// Root configuration
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub remote: RemoteConfig,
    #[serde(default)]
    pub ingest: IngestConfig,
    #[serde(default)]
    pub progress: ProgressConfig,
    #[serde(default)]
    pub cache: CacheConfig,
}

/// Server configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: IpAddr,
    #[serde(default = "default_port")]
    pub port: u16,
    /// Request body ceiling for direct uploads.
    #[serde(default = "default_max_upload_bytes")]
    pub max_upload_bytes: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            max_upload_bytes: default_max_upload_bytes(),
        }
    }
}

fn default_host() -> IpAddr {
    IpAddr::from([0, 0, 0, 0])
}

fn default_port() -> u16 {
    8000
}

fn default_max_upload_bytes() -> usize {
    2 * 1024 * 1024 * 1024
}

/// Remote processing service configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RemoteConfig {
    /// Base URL of the Files API (e.g., "https://generativelanguage.googleapis.com")
    #[serde(default = "default_api_base")]
    pub api_base: String,
    /// Fallback credential used when a request carries none.
    #[serde(default)]
    pub api_key: Option<String>,
    /// Model selector used when a request carries none.
    #[serde(default = "default_model")]
    pub default_model: String,
    /// Request timeout in seconds (covers the media upload).
    #[serde(default = "default_remote_timeout")]
    pub timeout_secs: u64,
}

impl Default for RemoteConfig {
    fn default() -> Self {
        Self {
            api_base: default_api_base(),
            api_key: None,
            default_model: default_model(),
            timeout_secs: default_remote_timeout(),
        }
    }
}

fn default_api_base() -> String {
    "https://generativelanguage.googleapis.com".to_string()
}

fn default_model() -> String {
    "gemini-2.5-flash".to_string()
}

fn default_remote_timeout() -> u64 {
    600
}

/// Ingestion pipeline configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct IngestConfig {
    /// Directory for transient media files (system temp dir when unset).
    #[serde(default)]
    pub temp_dir: Option<PathBuf>,
    #[serde(default = "default_chunk_size")]
    pub chunk_size_bytes: usize,
    #[serde(default = "default_download_timeout")]
    pub download_timeout_secs: u64,
    /// Fixed delay between readiness polls.
    #[serde(default = "default_poll_interval")]
    pub poll_interval_secs: u64,
    /// Poll ceiling before giving up on a still-processing asset.
    #[serde(default = "default_max_poll_retries")]
    pub max_poll_retries: u32,
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            temp_dir: None,
            chunk_size_bytes: default_chunk_size(),
            download_timeout_secs: default_download_timeout(),
            poll_interval_secs: default_poll_interval(),
            max_poll_retries: default_max_poll_retries(),
        }
    }
}

fn default_chunk_size() -> usize {
    1024 * 1024
}

fn default_download_timeout() -> u64 {
    600
}

fn default_poll_interval() -> u64 {
    10
}

fn default_max_poll_retries() -> u32 {
    60
}

/// Progress store retention configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ProgressConfig {
    #[serde(default = "default_max_sessions")]
    pub max_sessions: usize,
    /// How long terminal sessions stay visible to pollers.
    #[serde(default = "default_retention")]
    pub retention_secs: u64,
    #[serde(default = "default_sweep_interval")]
    pub sweep_interval_secs: u64,
}

impl Default for ProgressConfig {
    fn default() -> Self {
        Self {
            max_sessions: default_max_sessions(),
            retention_secs: default_retention(),
            sweep_interval_secs: default_sweep_interval(),
        }
    }
}

fn default_max_sessions() -> usize {
    1024
}

fn default_retention() -> u64 {
    3600
}

fn default_sweep_interval() -> u64 {
    60
}

/// Local remote-asset cache configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct CacheConfig {
    #[serde(default = "default_max_assets")]
    pub max_assets: usize,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            max_assets: default_max_assets(),
        }
    }
}

fn default_max_assets() -> usize {
    512
}

/// Sanitized config for API responses (secrets redacted)
#[derive(Debug, Clone, Serialize)]
pub struct SanitizedConfig {
    pub server: ServerConfig,
    pub remote: SanitizedRemoteConfig,
    pub ingest: IngestConfig,
    pub progress: ProgressConfig,
    pub cache: CacheConfig,
}

/// Sanitized remote config (API key hidden)
#[derive(Debug, Clone, Serialize)]
pub struct SanitizedRemoteConfig {
    pub api_base: String,
    pub api_key_configured: bool,
    pub default_model: String,
    pub timeout_secs: u64,
}

impl From<&Config> for SanitizedConfig {
    fn from(config: &Config) -> Self {
        Self {
            server: config.server.clone(),
            remote: SanitizedRemoteConfig {
                api_base: config.remote.api_base.clone(),
                api_key_configured: config
                    .remote
                    .api_key
                    .as_ref()
                    .is_some_and(|k| !k.is_empty()),
                default_model: config.remote.default_model.clone(),
                timeout_secs: config.remote.timeout_secs,
            },
            ingest: config.ingest.clone(),
            progress: config.progress.clone(),
            cache: config.cache.clone(),
        }
    }
}
