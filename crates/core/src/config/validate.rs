use super::{types::Config, ConfigError};

/// Validate configuration
/// Currently validates:
/// - qBittorrent URL and credentials are present
/// - Poll interval and request timeout are not 0
/// - API port is not 0 when the API is enabled
pub fn validate_config(config: &Config) -> Result<(), ConfigError> {
    let qbit = &config.qbittorrent;

    if qbit.url.trim().is_empty() {
        return Err(ConfigError::ValidationError(
            "qbittorrent.url must be set".to_string(),
        ));
    }

    if qbit.username.is_empty() || qbit.password.is_empty() {
        return Err(ConfigError::ValidationError(
            "qbittorrent.username and qbittorrent.password must be set".to_string(),
        ));
    }

    if qbit.timeout_secs == 0 {
        return Err(ConfigError::ValidationError(
            "qbittorrent.timeout_secs cannot be 0".to_string(),
        ));
    }

    if config.sequencer.poll_interval_secs == 0 {
        return Err(ConfigError::ValidationError(
            "sequencer.poll_interval_secs cannot be 0".to_string(),
        ));
    }

    if config.api.enabled && config.api.port == 0 {
        return Err(ConfigError::ValidationError(
            "api.port cannot be 0".to_string(),
        ));
    }

    Ok(())
}
