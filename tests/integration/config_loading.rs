//! Configuration files on disk

use std::io::Write;

use wfd_p2p_server::config::{create_default_config, load_config, Config};
use wfd_p2p_server::error::ConfigError;
use wfd_p2p_server::p2p::{P2pGroupController, WfdDevice};

use super::support::{FakeTools, NullDhcp};

#[test]
fn test_generated_default_loads_back() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("nested").join("config.json");

    create_default_config(&path).unwrap();
    let config = load_config(&path).unwrap();

    assert_eq!(config.device.wpa_device, "wlan0");
    assert_eq!(config.network.local_address.to_string(), "192.168.49.1/24");
    assert_eq!(config.control.listen.port(), 5555);
}

#[test]
fn test_partial_file_drives_controller() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    write!(
        file,
        r#"{{
            "device": {{ "name": "boardroom", "wpa_device": "wlp2s0" }},
            "network": {{ "local_address": "10.42.0.1/16" }}
        }}"#
    )
    .unwrap();

    let config = load_config(file.path()).unwrap();
    let tools = FakeTools::default();
    let mut controller = P2pGroupController::new(
        WfdDevice::from_config(&config.device),
        &config,
        Box::new(tools.clone()),
        Box::new(NullDhcp::default()),
    );

    assert_eq!(controller.allow().unwrap(), "10.42.0.1");
    assert_eq!(tools.count("-i wlp2s0 set device_name boardroom"), 1);
    assert_eq!(tools.count("addr add 10.42.0.1/16"), 1);
}

#[test]
fn test_invalid_files_rejected() {
    let dir = tempfile::tempdir().unwrap();

    let missing = load_config(dir.path().join("absent.json"));
    assert!(matches!(missing, Err(ConfigError::FileNotFound { .. })));

    let path = dir.path().join("bad.json");
    std::fs::write(&path, "{ not json").unwrap();
    assert!(matches!(load_config(&path), Err(ConfigError::ParseError(_))));

    let mut config = Config::default();
    config.dhcp.pool_start = 200;
    config.dhcp.pool_end = 100;
    std::fs::write(&path, serde_json::to_string(&config).unwrap()).unwrap();
    assert!(matches!(
        load_config(&path),
        Err(ConfigError::ValidationError(_))
    ));
}
