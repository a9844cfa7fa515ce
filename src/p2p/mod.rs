//! Wi-Fi Direct group management
//!
//! # Submodules
//!
//! - [`controller`]: group lifecycle state machine and listener fan-out
//! - [`device`]: injected device handle
//! - [`session`]: group session state and bounded names
//! - [`wpa`]: `wpa_cli` command builders and reply parsing
//! - [`netif`]: group interface addressing

pub mod controller;
pub mod device;
pub mod netif;
pub mod session;
pub mod wpa;

pub use controller::P2pGroupController;
pub use device::WfdDevice;
pub use netif::IpTool;
pub use session::{
    BoundedName, DeviceName, GroupSession, GroupState, GroupStatus, WpaName, DEVICE_NAME_MAX,
    WPA_NAME_MAX,
};
pub use wpa::WpaCli;
