//! wfd-p2p-server: Wi-Fi Direct group owner for Wi-Fi Display sinks
//!
//! This crate brings up a Wi-Fi Direct (P2P) group on a Linux wireless
//! device, serves DHCP to peers that join it, and accepts control messages
//! from the peer that can rename the device or move the group address.
//!
//! # Features
//!
//! - **Group lifecycle**: `wpa_cli` driven group creation and teardown
//! - **DHCP supervision**: `udhcpd` child process with `SIGCHLD` exit detection
//! - **Control channel**: length-prefixed JSON messages over TCP
//! - **Address listeners**: notification fan-out when the local address changes
//!
//! # Architecture
//!
//! ```text
//! peer ──TCP──> ControlServer ─> WfdServerAdapter ─> ControlDispatcher
//!                                                         │
//!                                                         v
//!                 wpa_cli / ip  <── P2pGroupController ──> DhcpSupervisor ─> udhcpd
//!                                          │
//!                                          v
//!                                  IpAddressListener(s)
//! ```
//!
//! # Quick Start
//!
//! ```no_run
//! use std::sync::Arc;
//! use wfd_p2p_server::config::load_config;
//! use wfd_p2p_server::dhcp::DhcpSupervisor;
//! use wfd_p2p_server::invoker::SystemInvoker;
//! use wfd_p2p_server::p2p::{P2pGroupController, WfdDevice};
//!
//! # fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = load_config("/etc/wfd-p2p-server/config.json")?;
//! let device = WfdDevice::from_config(&config.device);
//! let mut controller = P2pGroupController::new(
//!     device,
//!     &config,
//!     Box::new(SystemInvoker::new()),
//!     Box::new(DhcpSupervisor::new(config.dhcp.clone())),
//! );
//!
//! let address = controller.allow()?;
//! println!("group up at {address}");
//! controller.disallow()?;
//! # Ok(())
//! # }
//! ```
//!
//! # Modules
//!
//! - [`config`]: Configuration types and loading
//! - [`control`]: Control message protocol, dispatcher and transport
//! - [`dhcp`]: DHCP server configuration and supervision
//! - [`error`]: Error types
//! - [`invoker`]: External command execution
//! - [`listener`]: Address change listeners
//! - [`p2p`]: Group controller and `wpa_cli` plumbing

#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::must_use_candidate)]

pub mod config;
pub mod control;
pub mod dhcp;
pub mod error;
pub mod invoker;
pub mod listener;
pub mod p2p;

// Re-export commonly used types at the crate root
pub use config::Config;
pub use control::{ControlClient, ControlCommand, ControlReply, ControlServer, WfdServerAdapter};
pub use dhcp::{DhcpService, DhcpSupervisor};
pub use error::{ConfigError, ControlError, DhcpError, GroupError, InvokeError, WfdError};
pub use invoker::{CommandInvoker, SystemInvoker};
pub use listener::{IpAddressListener, ListenerError, ListenerId};
pub use p2p::{GroupState, GroupStatus, P2pGroupController, WfdDevice};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
