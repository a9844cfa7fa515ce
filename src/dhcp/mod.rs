//! DHCP service supervision
//!
//! Peers joining the group get their addresses from a DHCP server child
//! process. This module renders its configuration, spawns it, and detects
//! when it dies.
//!
//! # Monitoring
//!
//! Termination is observed through `SIGCHLD`. The handler only touches the
//! atomics in [`monitor`]; the supervisor turns a recorded exit into a
//! [`DhcpExit`] when polled from the control thread.

mod config;
pub mod monitor;
mod supervisor;

pub use config::DhcpServerConfig;
pub use supervisor::{DhcpExit, DhcpService, DhcpSupervisor};
