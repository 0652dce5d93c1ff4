use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::info;
use validator::Validate;

use super::models::MarketGuardConfig;

/// Errors that can occur during configuration parsing
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to open config file: {0}")]
    FileError(#[from] std::io::Error),

    #[error("Failed to parse YAML: {0}")]
    ParseError(#[from] serde_yaml::Error),

    #[error("Configuration validation error: {0}")]
    ValidationError(#[from] validator::ValidationErrors),

    #[error("Configuration error: {0}")]
    Other(String),
}

/// Provides default configuration file path
pub fn default_config_path() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".marketguard")
        .join("config.yaml")
}

/// Loads and validates the MarketGuard configuration
///
/// `PROXY_ENABLED` and `PROXY_LIST` from the environment take precedence
/// over the proxy section of the file.
pub fn load_config<P: AsRef<Path>>(config_path: P) -> Result<MarketGuardConfig, ConfigError> {
    let mut file = File::open(&config_path).map_err(ConfigError::FileError)?;

    let mut content = String::new();
    file.read_to_string(&mut content)
        .map_err(ConfigError::FileError)?;

    let mut config = parse_config(&content)?;

    apply_proxy_overrides(
        &mut config,
        std::env::var("PROXY_ENABLED").ok().as_deref(),
        std::env::var("PROXY_LIST").ok().as_deref(),
    );

    validate_config(&config)?;

    Ok(config)
}

/// Parses YAML content without validating it
pub fn parse_config(content: &str) -> Result<MarketGuardConfig, ConfigError> {
    // An empty file is a valid, all-defaults configuration
    if content.trim().is_empty() {
        return Ok(MarketGuardConfig::default());
    }
    serde_yaml::from_str(content).map_err(ConfigError::ParseError)
}

/// Runs derive validation plus the cross-section checks
pub fn validate_config(config: &MarketGuardConfig) -> Result<(), ConfigError> {
    config.validate().map_err(ConfigError::ValidationError)?;

    if config.proxy.enabled && config.proxy.active_endpoints().is_empty() {
        return Err(ConfigError::Other(
            "Proxy is enabled but the proxy list is empty".to_string(),
        ));
    }

    Ok(())
}

/// Applies `PROXY_ENABLED` / `PROXY_LIST` style overrides
pub fn apply_proxy_overrides(
    config: &mut MarketGuardConfig,
    enabled: Option<&str>,
    list: Option<&str>,
) {
    if let Some(enabled) = enabled {
        config.proxy.enabled = enabled.trim().eq_ignore_ascii_case("true");
        info!("Proxy enabled overridden from environment: {}", config.proxy.enabled);
    }

    if let Some(list) = list {
        config.proxy.list = list
            .split(',')
            .map(|p| p.trim().to_string())
            .filter(|p| !p.is_empty())
            .collect();
        info!(
            "Proxy list overridden from environment: {} endpoint(s)",
            config.proxy.list.len()
        );
    }
}
