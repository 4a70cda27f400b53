use super::{types::Config, ConfigError};

/// Minimum allowed download timeout; remote media can be large.
const MIN_DOWNLOAD_TIMEOUT_SECS: u64 = 600;

/// Validate configuration
pub fn validate_config(config: &Config) -> Result<(), ConfigError> {
    if config.server.port == 0 {
        return Err(ConfigError::ValidationError(
            "server.port cannot be 0".to_string(),
        ));
    }

    if config.ingest.download_timeout_secs < MIN_DOWNLOAD_TIMEOUT_SECS {
        return Err(ConfigError::ValidationError(format!(
            "ingest.download_timeout_secs must be at least {}",
            MIN_DOWNLOAD_TIMEOUT_SECS
        )));
    }

    if config.ingest.poll_interval_secs == 0 {
        return Err(ConfigError::ValidationError(
            "ingest.poll_interval_secs cannot be 0".to_string(),
        ));
    }

    if config.ingest.max_poll_retries == 0 {
        return Err(ConfigError::ValidationError(
            "ingest.max_poll_retries cannot be 0".to_string(),
        ));
    }

    if config.ingest.chunk_size_bytes == 0 {
        return Err(ConfigError::ValidationError(
            "ingest.chunk_size_bytes cannot be 0".to_string(),
        ));
    }

    if config.progress.max_sessions == 0 {
        return Err(ConfigError::ValidationError(
            "progress.max_sessions cannot be 0".to_string(),
        ));
    }

    if config.cache.max_assets == 0 {
        return Err(ConfigError::ValidationError(
            "cache.max_assets cannot be 0".to_string(),
        ));
    }

    Ok(())
}
