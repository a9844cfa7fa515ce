//! Configuration types for wfd-p2p-server
//!
//! This module defines all configuration structures used by the daemon.
//! Configuration is loaded from JSON files and validated at startup.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use ipnet::Ipv4Net;
use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::p2p::session::{DEVICE_NAME_MAX, WPA_NAME_MAX};

/// Root configuration structure
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Config {
    /// Device identity
    #[serde(default)]
    pub device: DeviceConfig,

    /// Wireless control utility
    #[serde(default)]
    pub wpa: WpaConfig,

    /// Group interface addressing
    #[serde(default)]
    pub network: NetworkConfig,

    /// DHCP server supervision
    #[serde(default)]
    pub dhcp: DhcpConfig,

    /// Peer control channel
    #[serde(default)]
    pub control: ControlConfig,

    /// Logging configuration
    #[serde(default)]
    pub log: LogConfig,
}

impl Config {
    /// Validate the configuration
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::ValidationError` if validation fails.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.device.validate()?;
        self.wpa.validate()?;
        self.network.validate()?;
        self.dhcp.validate(&self.network)?;
        self.control.validate()?;
        Ok(())
    }

    /// Create a default configuration
    #[must_use]
    pub fn default_config() -> Self {
        Self::default()
    }
}

/// Device identity configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DeviceConfig {
    /// WFD/WPS display name advertised to peers
    #[serde(default = "default_device_name")]
    pub name: String,

    /// Name of the P2P-capable WPA control device (e.g. "wlan0")
    #[serde(default = "default_wpa_device")]
    pub wpa_device: String,
}

impl DeviceConfig {
    /// Validate device configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.name.is_empty() {
            return Err(ConfigError::ValidationError(
                "device.name cannot be empty".into(),
            ));
        }
        if self.name.len() > DEVICE_NAME_MAX {
            return Err(ConfigError::ValidationError(format!(
                "device.name is {} bytes (max {DEVICE_NAME_MAX})",
                self.name.len()
            )));
        }
        if self.wpa_device.is_empty() || self.wpa_device.len() > WPA_NAME_MAX {
            return Err(ConfigError::ValidationError(format!(
                "device.wpa_device must be 1..={WPA_NAME_MAX} bytes"
            )));
        }
        Ok(())
    }
}

impl Default for DeviceConfig {
    fn default() -> Self {
        Self {
            name: default_device_name(),
            wpa_device: default_wpa_device(),
        }
    }
}

/// Wireless control utility configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct WpaConfig {
    /// Path to the control utility
    #[serde(default = "default_wpa_cli")]
    pub cli_path: PathBuf,

    /// Prefix of group interfaces created by `p2p_group_add`
    #[serde(default = "default_group_prefix")]
    pub group_interface_prefix: String,

    /// Prefix of P2P management interfaces that are never group interfaces
    #[serde(default = "default_p2p_dev_prefix")]
    pub p2p_device_prefix: String,
}

impl WpaConfig {
    /// Validate WPA configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.cli_path.as_os_str().is_empty() {
            return Err(ConfigError::ValidationError(
                "wpa.cli_path cannot be empty".into(),
            ));
        }
        if self.group_interface_prefix.is_empty() {
            return Err(ConfigError::ValidationError(
                "wpa.group_interface_prefix cannot be empty".into(),
            ));
        }
        Ok(())
    }
}

impl Default for WpaConfig {
    fn default() -> Self {
        Self {
            cli_path: default_wpa_cli(),
            group_interface_prefix: default_group_prefix(),
            p2p_device_prefix: default_p2p_dev_prefix(),
        }
    }
}

/// Group interface addressing
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct NetworkConfig {
    /// Path to the address configuration tool
    #[serde(default = "default_ip_tool")]
    pub ip_tool: PathBuf,

    /// Local address of the group owner, with prefix length
    #[serde(default = "default_local_address")]
    pub local_address: Ipv4Net,
}

impl NetworkConfig {
    /// Validate network configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.ip_tool.as_os_str().is_empty() {
            return Err(ConfigError::ValidationError(
                "network.ip_tool cannot be empty".into(),
            ));
        }
        if self.local_address.prefix_len() > 30 {
            return Err(ConfigError::ValidationError(format!(
                "network.local_address /{} leaves no room for peers",
                self.local_address.prefix_len()
            )));
        }
        let addr = self.local_address.addr();
        if addr == self.local_address.network() || addr == self.local_address.broadcast() {
            return Err(ConfigError::ValidationError(format!(
                "network.local_address {addr} is a reserved address"
            )));
        }
        Ok(())
    }
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            ip_tool: default_ip_tool(),
            local_address: default_local_address(),
        }
    }
}

/// DHCP server supervision configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DhcpConfig {
    /// DHCP server binary
    #[serde(default = "default_dhcp_binary")]
    pub binary: PathBuf,

    /// Arguments placed before the configuration path
    ///
    /// `udhcpd` daemonizes unless `-f` is given, which would make the
    /// supervised pid exit immediately.
    #[serde(default = "default_dhcp_args")]
    pub args: Vec<String>,

    /// Where the server configuration is written
    #[serde(default = "default_dhcp_config_path")]
    pub config_path: PathBuf,

    /// Host offset of the first leased address within the group subnet
    #[serde(default = "default_pool_start")]
    pub pool_start: u32,

    /// Host offset of the last leased address within the group subnet
    #[serde(default = "default_pool_end")]
    pub pool_end: u32,

    /// Lease time in seconds
    #[serde(default = "default_lease_secs")]
    pub lease_secs: u64,

    /// How long `stop()` waits after SIGTERM before SIGKILL
    #[serde(default = "default_stop_timeout_ms")]
    pub stop_timeout_ms: u64,
}

impl DhcpConfig {
    /// Validate DHCP configuration against the group network
    pub fn validate(&self, network: &NetworkConfig) -> Result<(), ConfigError> {
        if self.binary.as_os_str().is_empty() {
            return Err(ConfigError::ValidationError(
                "dhcp.binary cannot be empty".into(),
            ));
        }
        if self.config_path.as_os_str().is_empty() {
            return Err(ConfigError::ValidationError(
                "dhcp.config_path cannot be empty".into(),
            ));
        }
        if self.pool_start == 0 || self.pool_start > self.pool_end {
            return Err(ConfigError::ValidationError(format!(
                "dhcp pool offsets {}..{} are invalid",
                self.pool_start, self.pool_end
            )));
        }
        let host_bits = 32 - u32::from(network.local_address.prefix_len());
        let max_host = if host_bits >= 32 { u32::MAX } else { (1u32 << host_bits) - 2 };
        if self.pool_end > max_host {
            return Err(ConfigError::ValidationError(format!(
                "dhcp.pool_end {} exceeds the /{} subnet",
                self.pool_end,
                network.local_address.prefix_len()
            )));
        }
        if self.stop_timeout_ms == 0 {
            return Err(ConfigError::ValidationError(
                "dhcp.stop_timeout_ms must be greater than 0".into(),
            ));
        }
        Ok(())
    }

    /// Get stop timeout as Duration
    #[must_use]
    pub const fn stop_timeout(&self) -> Duration {
        Duration::from_millis(self.stop_timeout_ms)
    }
}

impl Default for DhcpConfig {
    fn default() -> Self {
        Self {
            binary: default_dhcp_binary(),
            args: default_dhcp_args(),
            config_path: default_dhcp_config_path(),
            pool_start: default_pool_start(),
            pool_end: default_pool_end(),
            lease_secs: default_lease_secs(),
            stop_timeout_ms: default_stop_timeout_ms(),
        }
    }
}

/// Peer control channel configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ControlConfig {
    /// Enable the control listener
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// TCP listen address
    #[serde(default = "default_control_addr")]
    pub listen: SocketAddr,

    /// Identifier of this server adapter on the transport
    #[serde(default = "default_adapter_id")]
    pub adapter_id: u32,

    /// Maximum control message size in bytes
    #[serde(default = "default_max_message_size")]
    pub max_message_size: usize,

    /// Interval between DHCP health polls in milliseconds
    #[serde(default = "default_health_poll_ms")]
    pub health_poll_ms: u64,
}

impl ControlConfig {
    /// Validate control configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_message_size == 0 {
            return Err(ConfigError::ValidationError(
                "control.max_message_size must be greater than 0".into(),
            ));
        }
        if self.health_poll_ms == 0 {
            return Err(ConfigError::ValidationError(
                "control.health_poll_ms must be greater than 0".into(),
            ));
        }
        Ok(())
    }

    /// Get health poll interval as Duration
    #[must_use]
    pub const fn health_poll_interval(&self) -> Duration {
        Duration::from_millis(self.health_poll_ms)
    }
}

impl Default for ControlConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            listen: default_control_addr(),
            adapter_id: default_adapter_id(),
            max_message_size: default_max_message_size(),
            health_poll_ms: default_health_poll_ms(),
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LogConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Output format: "json" or "text"
    #[serde(default = "default_log_format")]
    pub format: String,

    /// Include target (module path)
    #[serde(default = "default_true")]
    pub target: bool,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
            target: true,
        }
    }
}

// Default value functions for serde

fn default_true() -> bool {
    true
}

fn default_device_name() -> String {
    "wfd-p2p-server".into()
}

fn default_wpa_device() -> String {
    "wlan0".into()
}

fn default_wpa_cli() -> PathBuf {
    PathBuf::from("wpa_cli")
}

fn default_group_prefix() -> String {
    "p2p-".into()
}

fn default_p2p_dev_prefix() -> String {
    "p2p-dev-".into()
}

fn default_ip_tool() -> PathBuf {
    PathBuf::from("ip")
}

fn default_local_address() -> Ipv4Net {
    Ipv4Net::new(std::net::Ipv4Addr::new(192, 168, 49, 1), 24)
        .unwrap_or_else(|_| Ipv4Net::default())
}

fn default_dhcp_binary() -> PathBuf {
    PathBuf::from("udhcpd")
}

fn default_dhcp_args() -> Vec<String> {
    vec!["-f".into()]
}

fn default_dhcp_config_path() -> PathBuf {
    PathBuf::from("/etc/udhcpd.conf")
}

fn default_pool_start() -> u32 {
    20
}

fn default_pool_end() -> u32 {
    254
}

fn default_lease_secs() -> u64 {
    864_000
}

fn default_stop_timeout_ms() -> u64 {
    3000
}

fn default_control_addr() -> SocketAddr {
    SocketAddr::from(([0, 0, 0, 0], 5555))
}

fn default_adapter_id() -> u32 {
    1
}

fn default_max_message_size() -> usize {
    64 * 1024
}

fn default_health_poll_ms() -> u64 {
    1000
}

fn default_log_level() -> String {
    "info".into()
}

fn default_log_format() -> String {
    "text".into()
}
