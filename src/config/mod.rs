//! Configuration module for wfd-p2p-server
//!
//! This module provides configuration types and loading utilities.
//!
//! # Example
//!
//! ```no_run
//! use wfd_p2p_server::config::{load_config, Config};
//!
//! let config = load_config("/etc/wfd-p2p-server/config.json").unwrap();
//! println!("Group address: {}", config.network.local_address);
//! ```

mod loader;
mod types;

pub use loader::{create_default_config, load_config, load_config_str, load_config_with_env};
pub use types::{
    Config, ControlConfig, DeviceConfig, DhcpConfig, LogConfig, NetworkConfig, WpaConfig,
};
