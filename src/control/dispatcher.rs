//! Control message dispatcher
//!
//! Turns inbound control buffers into controller calls. Messages for other
//! adapters and buffers that do not decode are dropped with a log line and
//! produce no reply.

use std::sync::Arc;

use parking_lot::Mutex;
use tracing::{debug, info, warn};

use super::protocol::{decode_command, parse_address, ControlCommand, ControlReply, ErrorCode};
use crate::error::{report, GroupError};
use crate::p2p::P2pGroupController;

/// Dispatches control messages for one server adapter
pub struct ControlDispatcher {
    adapter_id: u32,
    controller: Arc<Mutex<P2pGroupController>>,
    default_prefix: u8,
}

impl ControlDispatcher {
    /// Create a dispatcher for `adapter_id`
    ///
    /// `default_prefix` is applied to `SET_LOCAL_IP` addresses given without one.
    pub fn new(adapter_id: u32, controller: Arc<Mutex<P2pGroupController>>, default_prefix: u8) -> Self {
        Self {
            adapter_id,
            controller,
            default_prefix,
        }
    }

    /// Adapter this dispatcher serves
    pub fn adapter_id(&self) -> u32 {
        self.adapter_id
    }

    /// Handle one control buffer, returning the reply to send, if any
    ///
    /// Runs synchronously on the caller's thread and may block on the
    /// control utility.
    pub fn dispatch(&self, adapter_id: u32, buffer: &[u8]) -> Option<ControlReply> {
        if adapter_id != self.adapter_id {
            debug!(
                "Ignoring control message for adapter {} (this is {})",
                adapter_id, self.adapter_id
            );
            return None;
        }

        let command = match decode_command(buffer) {
            Ok(command) => command,
            Err(e) => {
                warn!("Dropping control message ({} bytes): {}", buffer.len(), e);
                return None;
            }
        };

        debug!("Control command: {:?}", command);
        Some(self.handle(command))
    }

    fn handle(&self, command: ControlCommand) -> ControlReply {
        match command {
            ControlCommand::SetDeviceName { name } => {
                match self.controller.lock().set_device_name(&name) {
                    Ok(()) => ControlReply::ok(),
                    Err(e) => group_error_reply(&e),
                }
            }

            ControlCommand::SetLocalIp { address } => {
                let net = match parse_address(&address, self.default_prefix) {
                    Ok(net) => net,
                    Err(e) => {
                        warn!("Rejecting SET_LOCAL_IP: {}", e);
                        return ControlReply::error(ErrorCode::InvalidParameters, e.to_string());
                    }
                };
                match self.controller.lock().set_local_ip(net) {
                    Ok(address) => {
                        info!("Peer set local address to {}", address);
                        ControlReply::ok_with_address(address)
                    }
                    Err(e) => group_error_reply(&e),
                }
            }
        }
    }
}

fn group_error_reply(err: &GroupError) -> ControlReply {
    let message = report(err);
    warn!("Control command failed: {}", message);
    let code = match err {
        GroupError::NotActive => ErrorCode::NotActive,
        GroupError::DeviceName { name, .. } if name.is_empty() => ErrorCode::InvalidParameters,
        _ => ErrorCode::OperationFailed,
    };
    ControlReply::error(code, message)
}
