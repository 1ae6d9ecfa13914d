//! Configuration loading from disk.

use std::fs;
use std::path::Path;

use crate::config::schema::ServeConfig;

/// Error type for configuration loading.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("parse error: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid config: {0}")]
    Invalid(String),
}

/// Load and validate configuration from a TOML file.
pub fn load_config(path: &Path) -> Result<ServeConfig, ConfigError> {
    let content = fs::read_to_string(path)?;
    let config: ServeConfig = toml::from_str(&content)?;

    if config.listener.address.is_empty() {
        return Err(ConfigError::Invalid("listener.address must not be empty".into()));
    }

    Ok(config)
}
