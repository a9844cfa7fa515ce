//! Wi-Fi Direct device handle
//!
//! Identifies the physical P2P device a controller drives. Constructed once
//! at startup and passed into the controller and server adapter.

use crate::config::DeviceConfig;

use super::session::{DeviceName, WpaName};

/// The P2P-capable wireless device
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WfdDevice {
    name: DeviceName,
    wpa_device: WpaName,
}

impl WfdDevice {
    /// Create a device handle
    pub fn new(name: &str, wpa_device: &str) -> Self {
        Self {
            name: DeviceName::new(name),
            wpa_device: WpaName::new(wpa_device),
        }
    }

    /// Create from configuration
    pub fn from_config(config: &DeviceConfig) -> Self {
        Self::new(&config.name, &config.wpa_device)
    }

    /// Default WPS display name
    pub fn name(&self) -> &DeviceName {
        &self.name
    }

    /// WPA control device the group is created on
    pub fn wpa_device(&self) -> &WpaName {
        &self.wpa_device
    }
}
