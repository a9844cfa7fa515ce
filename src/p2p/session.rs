//! Group session state
//!
//! A [`GroupSession`] describes the single P2P group this device may own:
//! who we advertise as, which WPA control device drives it, which group
//! interface the control utility handed back, and the address we hold on it.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Maximum WPS device name length in bytes
pub const DEVICE_NAME_MAX: usize = 100;

/// Maximum WPA control device / interface name length in bytes
pub const WPA_NAME_MAX: usize = 256;

/// A string that never exceeds `N` bytes
///
/// Longer input is truncated at the last UTF-8 character boundary that fits.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct BoundedName<const N: usize>(String);

impl<const N: usize> BoundedName<N> {
    /// Create a name, truncating to `N` bytes
    pub fn new(value: &str) -> Self {
        let mut end = value.len().min(N);
        while !value.is_char_boundary(end) {
            end -= 1;
        }
        Self(value[..end].to_owned())
    }

    /// Borrow as `&str`
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// True if empty
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl<const N: usize> fmt::Display for BoundedName<N> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl<const N: usize> From<&str> for BoundedName<N> {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

/// WPS display name
pub type DeviceName = BoundedName<DEVICE_NAME_MAX>;

/// WPA control device or group interface name
pub type WpaName = BoundedName<WPA_NAME_MAX>;

/// Lifecycle state of the P2P group
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GroupState {
    /// No group
    Idle,
    /// `allow()` in progress
    GroupStarting,
    /// Group up, DHCP supervised
    GroupActive,
    /// `disallow()` in progress
    GroupStopping,
}

impl fmt::Display for GroupState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Idle => write!(f, "idle"),
            Self::GroupStarting => write!(f, "group-starting"),
            Self::GroupActive => write!(f, "group-active"),
            Self::GroupStopping => write!(f, "group-stopping"),
        }
    }
}

/// The device's single P2P group
#[derive(Debug, Clone)]
pub struct GroupSession {
    /// Advertised WPS device name
    pub device_name: DeviceName,
    /// WPA control device the group is created on
    pub wpa_device: WpaName,
    /// Group interface assigned by the control utility, empty until created
    pub group_interface: WpaName,
    /// Current lifecycle state
    pub state: GroupState,
    /// Address currently assigned to the group interface
    pub local_address: Option<String>,
    /// DHCP service died while the group was active
    pub degraded: bool,
}

impl GroupSession {
    /// Create an idle session
    pub fn new(device_name: DeviceName, wpa_device: WpaName) -> Self {
        Self {
            device_name,
            wpa_device,
            group_interface: WpaName::default(),
            state: GroupState::Idle,
            local_address: None,
            degraded: false,
        }
    }

    /// True if the group is up
    pub fn is_active(&self) -> bool {
        self.state == GroupState::GroupActive
    }

    /// Forget everything learned from the last group
    pub fn reset(&mut self) {
        self.group_interface = WpaName::default();
        self.local_address = None;
        self.degraded = false;
        self.state = GroupState::Idle;
    }

    /// Snapshot for status reporting
    pub fn status(&self) -> GroupStatus {
        GroupStatus {
            state: self.state,
            device_name: self.device_name.to_string(),
            group_interface: if self.group_interface.is_empty() {
                None
            } else {
                Some(self.group_interface.to_string())
            },
            local_address: self.local_address.clone(),
            degraded: self.degraded,
        }
    }
}

/// Serializable view of a [`GroupSession`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupStatus {
    pub state: GroupState,
    pub device_name: String,
    pub group_interface: Option<String>,
    pub local_address: Option<String>,
    pub degraded: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bounded_name_truncates() {
        let long = "a".repeat(DEVICE_NAME_MAX + 20);
        let name = DeviceName::new(&long);
        assert_eq!(name.as_str().len(), DEVICE_NAME_MAX);

        let short = DeviceName::new("tv");
        assert_eq!(short.as_str(), "tv");
    }

    #[test]
    fn test_bounded_name_respects_char_boundary() {
        // 'é' is two bytes; 3 of them straddle a 5-byte limit
        let name = BoundedName::<5>::new("ééé");
        assert_eq!(name.as_str(), "éé");
    }

    #[test]
    fn test_group_interface_truncated_to_wpa_limit() {
        let mut session = GroupSession::new("tv".into(), "w".repeat(300).as_str().into());
        assert_eq!(session.wpa_device.as_str().len(), WPA_NAME_MAX);

        let long = format!("p2p-{}", "x".repeat(300));
        session.group_interface = long.as_str().into();
        assert_eq!(session.group_interface.as_str().len(), WPA_NAME_MAX);
        assert!(long.starts_with(session.group_interface.as_str()));
    }

    #[test]
    fn test_session_reset() {
        let mut session = GroupSession::new("tv".into(), "wlan0".into());
        session.group_interface = "p2p-wlan0-0".into();
        session.local_address = Some("192.168.49.1".into());
        session.state = GroupState::GroupActive;
        session.degraded = true;

        session.reset();
        assert_eq!(session.state, GroupState::Idle);
        assert!(session.local_address.is_none());
        assert!(session.group_interface.is_empty());
        assert!(!session.degraded);
        assert_eq!(session.device_name.as_str(), "tv");
    }

    #[test]
    fn test_status_serialization() {
        let session = GroupSession::new("tv".into(), "wlan0".into());
        let json = serde_json::to_string(&session.status()).unwrap();
        assert!(json.contains("\"state\":\"idle\""));
        assert!(json.contains("\"group_interface\":null"));
    }
}
