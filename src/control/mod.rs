//! Peer control channel
//!
//! This module provides:
//! - Wire types and framing for control messages
//! - The dispatcher that applies them to the group controller
//! - Adapter capability traits and the Wi-Fi Display server adapter
//! - A TCP transport that feeds frames to the adapter

mod adapter;
mod dispatcher;
pub mod protocol;
mod server;

pub use adapter::{HasAdapterIdentity, ReceivesControlMessages, WfdServerAdapter};
pub use dispatcher::ControlDispatcher;
pub use protocol::{ControlCommand, ControlMessage, ControlReply, ErrorCode};
pub use server::{ControlClient, ControlServer};
