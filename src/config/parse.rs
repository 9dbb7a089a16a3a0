use super::types::RewindConfig;
use crate::config::expand_tilde;
use std::path::Path;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse YAML: {0}")]
    YamlParse(#[from] serde_yaml::Error),

    #[error("validation failed: {0}")]
    Validation(String),
}

pub fn load_config(path: &Path) -> Result<RewindConfig, ConfigError> {
    let yaml_string = std::fs::read_to_string(path).map_err(|e| {
        ConfigError::Io(std::io::Error::new(
            e.kind(),
            format!("failed to read config file '{}': {}", path.display(), e),
        ))
    })?;

    let mut config: RewindConfig = serde_yaml::from_str(&yaml_string)?;

    config.storage.path = expand_tilde(&config.storage.path);

    validate_config(&config)?;
    Ok(config)
}

fn validate_config(config: &RewindConfig) -> Result<(), ConfigError> {
    if config
        .collector
        .listen
        .parse::<std::net::SocketAddr>()
        .is_err()
    {
        return Err(ConfigError::Validation(format!(
            "collector.listen is not a valid socket address: '{}'",
            config.collector.listen
        )));
    }

    if config.capture.endpoint.trim().is_empty() {
        return Err(ConfigError::Validation(
            "capture.endpoint must not be empty".to_string(),
        ));
    }

    if config.capture.max_batch_events == 0 {
        return Err(ConfigError::Validation(
            "capture.max_batch_events must be at least 1".to_string(),
        ));
    }

    if config.capture.retry.max_attempts == 0 {
        return Err(ConfigError::Validation(
            "capture.retry.max_attempts must be at least 1".to_string(),
        ));
    }

    if config.replay.tick_interval.is_zero() {
        return Err(ConfigError::Validation(
            "replay.tick_interval must be positive".to_string(),
        ));
    }

    if !(config.replay.initial_speed > 0.0) || !config.replay.initial_speed.is_finite() {
        return Err(ConfigError::Validation(format!(
            "replay.initial_speed must be a positive number, got {}",
            config.replay.initial_speed
        )));
    }

    Ok(())
}
