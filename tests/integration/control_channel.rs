//! Peer control channel tests
//!
//! Each test runs a real `ControlServer` on a loopback port in front of a
//! controller wired to scripted tools.

use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::sync::broadcast;

use wfd_p2p_server::config::{Config, ControlConfig};
use wfd_p2p_server::control::{
    ControlClient, ControlCommand, ControlReply, ControlServer, ErrorCode, WfdServerAdapter,
};
use wfd_p2p_server::listener::IpAddressListener;
use wfd_p2p_server::p2p::{GroupState, P2pGroupController, WfdDevice};

use super::support::{AddressLog, FakeTools, NullDhcp};

struct Harness {
    addr: std::net::SocketAddr,
    controller: Arc<Mutex<P2pGroupController>>,
    tools: FakeTools,
    dhcp: NullDhcp,
    shutdown_tx: broadcast::Sender<()>,
}

impl Drop for Harness {
    fn drop(&mut self) {
        let _ = self.shutdown_tx.send(());
    }
}

async fn harness() -> Harness {
    let tools = FakeTools::default();
    let dhcp = NullDhcp::default();
    let device = WfdDevice::new("projector", "wlan0");
    let controller = Arc::new(Mutex::new(P2pGroupController::new(
        device.clone(),
        &Config::default(),
        Box::new(tools.clone()),
        Box::new(dhcp.clone()),
    )));

    let socket = ControlConfig {
        listen: "127.0.0.1:0".parse().unwrap(),
        adapter_id: 9,
        ..ControlConfig::default()
    };
    let adapter = Arc::new(WfdServerAdapter::new(device, Arc::clone(&controller), socket));
    let server = ControlServer::bind(adapter).await.unwrap();
    let addr = server.local_addr().unwrap();
    let shutdown_tx = server.shutdown_sender();
    tokio::spawn(async move { server.run().await });

    Harness {
        addr,
        controller,
        tools,
        dhcp,
        shutdown_tx,
    }
}

fn set_local_ip(address: &str) -> ControlCommand {
    ControlCommand::SetLocalIp {
        address: address.into(),
    }
}

#[tokio::test]
async fn test_set_local_ip_notifies_listener() {
    let h = harness().await;
    let log = Arc::new(AddressLog::default());
    let listener: Arc<dyn IpAddressListener> = log.clone();
    h.controller.lock().add_ip_address_listener(&listener);

    let address = h.controller.lock().allow().unwrap();
    assert_eq!(address, "192.168.49.1");
    assert_eq!(
        h.dhcp.configured.lock().as_ref().map(|(i, _)| i.clone()),
        Some("p2p-wlan0-3".to_string())
    );

    let mut client = ControlClient::connect(h.addr).await.unwrap();
    let reply = client.send(&set_local_ip("10.0.0.5")).await.unwrap();

    assert_eq!(reply, ControlReply::ok_with_address("10.0.0.5"));
    assert_eq!(*log.0.lock(), vec!["192.168.49.1", "10.0.0.5"]);
    assert_eq!(h.tools.count("addr add 10.0.0.5/24 dev p2p-wlan0-3"), 1);
    assert_eq!(
        h.dhcp.configured.lock().as_ref().map(|(_, net)| net.to_string()),
        Some("10.0.0.5/24".to_string())
    );
    assert!(*h.dhcp.running.lock());
}

#[tokio::test]
async fn test_failed_set_local_ip_keeps_previous_address() {
    let h = harness().await;
    let log = Arc::new(AddressLog::default());
    let listener: Arc<dyn IpAddressListener> = log.clone();
    h.controller.lock().add_ip_address_listener(&listener);
    h.controller.lock().allow().unwrap();
    h.tools.fail_on.lock().push("addr add 10.0.0.5".into());

    let mut client = ControlClient::connect(h.addr).await.unwrap();
    let reply = client.send(&set_local_ip("10.0.0.5")).await.unwrap();

    match reply {
        ControlReply::Error { code, message } => {
            assert_eq!(code, ErrorCode::OperationFailed);
            assert!(message.contains("RTNETLINK answers: Invalid argument"));
        }
        other => panic!("unexpected reply {other:?}"),
    }
    assert_eq!(h.controller.lock().local_address(), Some("192.168.49.1"));
    assert!(!h.controller.lock().is_degraded());
    assert_eq!(*log.0.lock(), vec!["192.168.49.1"]);
    assert_eq!(h.tools.count("addr add 192.168.49.1/24 dev p2p-wlan0-3"), 2);
    assert_eq!(
        h.dhcp.configured.lock().as_ref().map(|(_, net)| net.to_string()),
        Some("192.168.49.1/24".to_string())
    );

    // The channel and the group remain usable
    h.tools.fail_on.lock().clear();
    let reply = client.send(&set_local_ip("10.0.0.5")).await.unwrap();
    assert_eq!(reply, ControlReply::ok_with_address("10.0.0.5"));
}

#[tokio::test]
async fn test_unknown_command_is_dropped() {
    let h = harness().await;
    h.controller.lock().allow().unwrap();
    let calls_before = h.tools.calls.lock().len();

    let mut client = ControlClient::connect(h.addr).await.unwrap();
    client.send_raw(br#"{"type":"reboot_sink"}"#).await.unwrap();
    client.send_raw(b"SET_LOCAL_IP").await.unwrap();

    // Nothing is pending: the first reply read is for this command
    let reply = client
        .send(&ControlCommand::SetDeviceName {
            name: "projector-2".into(),
        })
        .await
        .unwrap();
    assert_eq!(reply, ControlReply::ok());

    let calls = h.tools.calls.lock();
    assert_eq!(calls.len(), calls_before + 1);
    assert!(calls[calls_before].ends_with("set device_name projector-2"));
    drop(calls);
    assert_eq!(h.controller.lock().state(), GroupState::GroupActive);
}

#[tokio::test]
async fn test_set_local_ip_rejected_without_group() {
    let h = harness().await;
    let log = Arc::new(AddressLog::default());
    let listener: Arc<dyn IpAddressListener> = log.clone();
    h.controller.lock().add_ip_address_listener(&listener);

    let mut client = ControlClient::connect(h.addr).await.unwrap();
    let reply = client.send(&set_local_ip("10.0.0.5")).await.unwrap();

    assert!(matches!(
        reply,
        ControlReply::Error {
            code: ErrorCode::NotActive,
            ..
        }
    ));
    assert!(log.0.lock().is_empty());
}

#[tokio::test]
async fn test_invalid_address_reply() {
    let h = harness().await;
    h.controller.lock().allow().unwrap();

    let mut client = ControlClient::connect(h.addr).await.unwrap();
    for bad in ["10.0.0", "224.0.0.1", "10.0.0.5/33"] {
        let reply = client.send(&set_local_ip(bad)).await.unwrap();
        assert!(
            matches!(
                reply,
                ControlReply::Error {
                    code: ErrorCode::InvalidParameters,
                    ..
                }
            ),
            "{bad} was accepted"
        );
    }
    assert_eq!(h.controller.lock().local_address(), Some("192.168.49.1"));
}

#[tokio::test]
async fn test_teardown_after_commands() {
    let h = harness().await;
    h.controller.lock().allow().unwrap();

    let mut client = ControlClient::connect(h.addr).await.unwrap();
    client.send(&set_local_ip("10.0.0.5")).await.unwrap();

    h.controller.lock().disallow().unwrap();
    assert_eq!(h.controller.lock().state(), GroupState::Idle);
    assert!(!*h.dhcp.running.lock());
    assert_eq!(h.tools.count("p2p_group_remove p2p-wlan0-3"), 1);

    // Closing the group does not close the channel
    let reply = tokio::time::timeout(Duration::from_secs(2), client.send(&set_local_ip("10.0.0.6")))
        .await
        .unwrap()
        .unwrap();
    assert!(reply.is_error());
}
