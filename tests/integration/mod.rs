//! Integration tests for wfd-p2p-server
//!
//! # Test Organization
//!
//! - `support`: scripted `wpa_cli`/`ip` invoker and in-memory DHCP service
//! - `control_channel`: peer commands over TCP through the full adapter stack
//! - `group_lifecycle`: controller driving a real DHCP child process
//! - `config_loading`: configuration files on disk
//!
//! # Test Requirements
//!
//! - No wireless hardware; `wpa_cli` and `ip` are scripted
//! - `group_lifecycle` needs `/bin/sh` and `sleep`

pub mod config_loading;
pub mod control_channel;
pub mod group_lifecycle;
pub mod support;
