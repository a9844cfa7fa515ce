//! Configuration loading and management
//!
//! This module handles loading configuration from files and environment variables.

use std::path::Path;

use tracing::{debug, info};

use super::types::Config;
use crate::error::ConfigError;

/// Load configuration from a JSON file
///
/// # Errors
///
/// Returns `ConfigError` if the file cannot be read or parsed.
pub fn load_config(path: impl AsRef<Path>) -> Result<Config, ConfigError> {
    let path = path.as_ref();

    debug!("Loading configuration from {:?}", path);

    if !path.exists() {
        return Err(ConfigError::FileNotFound {
            path: path.display().to_string(),
        });
    }

    let contents = std::fs::read_to_string(path)?;

    let config: Config = serde_json::from_str(&contents).map_err(|e| {
        ConfigError::ParseError(format!("Failed to parse JSON: {e} at {path:?}"))
    })?;

    config.validate()?;

    info!(
        "Configuration loaded: device={}, wpa_device={}, local_address={}",
        config.device.name, config.device.wpa_device, config.network.local_address
    );

    Ok(config)
}

/// Load configuration from a JSON string
///
/// # Errors
///
/// Returns `ConfigError` if parsing or validation fails.
pub fn load_config_str(json: &str) -> Result<Config, ConfigError> {
    let config: Config =
        serde_json::from_str(json).map_err(|e| ConfigError::ParseError(e.to_string()))?;

    config.validate()?;

    Ok(config)
}

/// Load configuration with environment variable overrides
///
/// Environment variables:
/// - `WFD_LOG_LEVEL`: Override log level
/// - `WFD_DEVICE_NAME`: Override the advertised device name
/// - `WFD_CONTROL_ADDR`: Override the control listen address
/// - `WFD_DHCP_CONFIG_PATH`: Override where the DHCP configuration is written
///
/// # Errors
///
/// Returns `ConfigError` if loading or parsing fails.
pub fn load_config_with_env(path: impl AsRef<Path>) -> Result<Config, ConfigError> {
    let mut config = load_config(path)?;

    if let Ok(level) = std::env::var("WFD_LOG_LEVEL") {
        config.log.level = level;
        debug!("Log level overridden to {}", config.log.level);
    }

    if let Ok(name) = std::env::var("WFD_DEVICE_NAME") {
        config.device.name = name;
        debug!("Device name overridden to {}", config.device.name);
    }

    if let Ok(addr) = std::env::var("WFD_CONTROL_ADDR") {
        config.control.listen = addr.parse().map_err(|_| ConfigError::EnvError {
            name: "WFD_CONTROL_ADDR".into(),
            reason: format!("Invalid socket address: {addr}"),
        })?;
        debug!("Control address overridden to {}", config.control.listen);
    }

    if let Ok(path) = std::env::var("WFD_DHCP_CONFIG_PATH") {
        config.dhcp.config_path = path.into();
        debug!("DHCP config path overridden to {:?}", config.dhcp.config_path);
    }

    // Re-validate after overrides
    config.validate()?;

    Ok(config)
}

/// Create a default configuration file at the given path
///
/// # Errors
///
/// Returns `ConfigError` if the file cannot be written.
pub fn create_default_config(path: impl AsRef<Path>) -> Result<(), ConfigError> {
    let config = Config::default_config();
    let json = serde_json::to_string_pretty(&config)
        .map_err(|e| ConfigError::ParseError(format!("Failed to serialize config: {e}")))?;

    let path = path.as_ref();
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }
    std::fs::write(path, json)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn create_temp_config() -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        let config = Config::default_config();
        let json = serde_json::to_string_pretty(&config).unwrap();
        file.write_all(json.as_bytes()).unwrap();
        file
    }

    #[test]
    fn test_load_config() {
        let file = create_temp_config();
        let config = load_config(file.path()).unwrap();
        assert_eq!(config.device.wpa_device, "wlan0");
    }

    #[test]
    fn test_load_config_file_not_found() {
        let result = load_config("/nonexistent/path/config.json");
        assert!(matches!(result, Err(ConfigError::FileNotFound { .. })));
    }

    #[test]
    fn test_load_config_str() {
        let json = r#"{
            "device": { "name": "living-room-tv", "wpa_device": "wlan1" },
            "network": { "local_address": "10.1.2.1/24" },
            "dhcp": { "config_path": "/tmp/udhcpd.conf", "pool_start": 10, "pool_end": 50 }
        }"#;
        let config = load_config_str(json).unwrap();
        assert_eq!(config.device.name, "living-room-tv");
        assert_eq!(config.network.local_address.addr().to_string(), "10.1.2.1");
        assert_eq!(config.dhcp.pool_end, 50);
    }

    #[test]
    fn test_load_config_invalid_json() {
        let result = load_config_str("not valid json");
        assert!(matches!(result, Err(ConfigError::ParseError(_))));
    }

    #[test]
    fn test_create_default_config_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        create_default_config(&path).unwrap();
        let config = load_config(&path).unwrap();
        assert_eq!(config.control.adapter_id, 1);
    }
}
