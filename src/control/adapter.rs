//! Server adapter capabilities
//!
//! A transport hands every inbound buffer to the adapters it knows about.
//! Each adapter reports its identity and decides whether the buffer is its
//! own to handle.

use std::sync::Arc;

use parking_lot::Mutex;

use super::dispatcher::ControlDispatcher;
use super::protocol::ControlReply;
use crate::config::ControlConfig;
use crate::p2p::{P2pGroupController, WfdDevice};

/// Identity of an adapter on the control transport
pub trait HasAdapterIdentity {
    /// Transport-assigned adapter id
    fn adapter_id(&self) -> u32;

    /// Human readable adapter name
    fn name(&self) -> &str;
}

/// Adapters that accept control messages
pub trait ReceivesControlMessages {
    /// Handle one message body received for `adapter_id`
    ///
    /// Returns `None` when the message is not for this adapter or is dropped.
    fn on_receive_control_message(&self, adapter_id: u32, buffer: &[u8]) -> Option<ControlReply>;
}

/// Wi-Fi Display server adapter
///
/// Binds a device and its group controller to one adapter id on the control
/// transport.
pub struct WfdServerAdapter {
    name: String,
    device: WfdDevice,
    controller: Arc<Mutex<P2pGroupController>>,
    socket: ControlConfig,
    dispatcher: ControlDispatcher,
}

impl WfdServerAdapter {
    /// Create an adapter for `device`
    ///
    /// Addresses sent without a prefix length inherit the prefix of the
    /// controller's configured group address.
    pub fn new(
        device: WfdDevice,
        controller: Arc<Mutex<P2pGroupController>>,
        socket: ControlConfig,
    ) -> Self {
        let default_prefix = controller.lock().group_address().prefix_len();
        let dispatcher = ControlDispatcher::new(socket.adapter_id, Arc::clone(&controller), default_prefix);
        Self {
            name: format!("wfd:{}", device.name()),
            device,
            controller,
            socket,
            dispatcher,
        }
    }

    /// Device served by this adapter
    pub fn device(&self) -> &WfdDevice {
        &self.device
    }

    /// Shared group controller
    pub fn controller(&self) -> &Arc<Mutex<P2pGroupController>> {
        &self.controller
    }

    /// Control socket settings
    pub fn socket(&self) -> &ControlConfig {
        &self.socket
    }
}

impl HasAdapterIdentity for WfdServerAdapter {
    fn adapter_id(&self) -> u32 {
        self.socket.adapter_id
    }

    fn name(&self) -> &str {
        &self.name
    }
}

impl ReceivesControlMessages for WfdServerAdapter {
    fn on_receive_control_message(&self, adapter_id: u32, buffer: &[u8]) -> Option<ControlReply> {
        self.dispatcher.dispatch(adapter_id, buffer)
    }
}

impl std::fmt::Debug for WfdServerAdapter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WfdServerAdapter")
            .field("name", &self.name)
            .field("adapter_id", &self.socket.adapter_id)
            .field("listen", &self.socket.listen)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::p2p::controller::tests::{fixture, Fixture};

    fn adapter(adapter_id: u32) -> WfdServerAdapter {
        let Fixture { controller, .. } = fixture();
        let device = controller.device().clone();
        let socket = ControlConfig {
            adapter_id,
            ..ControlConfig::default()
        };
        WfdServerAdapter::new(device, Arc::new(Mutex::new(controller)), socket)
    }

    #[test]
    fn test_identity() {
        let adapter = adapter(3);
        assert_eq!(adapter.adapter_id(), 3);
        assert_eq!(adapter.name(), "wfd:living-room-tv");
        assert_eq!(adapter.device().wpa_device().as_str(), "wlan0");
    }

    #[test]
    fn test_filters_by_adapter_id() {
        let adapter = adapter(3);
        let body = br#"{"type":"set_device_name","name":"den"}"#;

        assert!(adapter.on_receive_control_message(4, body).is_none());
        assert_eq!(adapter.controller().lock().status().device_name, "living-room-tv");

        let reply = adapter.on_receive_control_message(3, body).unwrap();
        assert!(!reply.is_error());
        assert_eq!(adapter.controller().lock().status().device_name, "den");
    }

    #[test]
    fn test_address_prefix_follows_group_address() {
        let adapter = adapter(3);
        adapter.controller().lock().allow().unwrap();

        let reply = adapter
            .on_receive_control_message(3, br#"{"type":"set_local_ip","address":"192.168.49.7"}"#)
            .unwrap();
        assert_eq!(reply, ControlReply::ok_with_address("192.168.49.7"));
    }
}
