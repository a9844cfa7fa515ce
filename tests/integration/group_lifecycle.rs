//! Group lifecycle with a real DHCP child
//!
//! The "DHCP server" is `/bin/sh -c <script>`, so these tests exercise
//! spawning, SIGCHLD monitoring and termination without udhcpd installed.

use std::path::PathBuf;
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use parking_lot::Mutex;

use wfd_p2p_server::config::{Config, DhcpConfig};
use wfd_p2p_server::dhcp::{monitor, DhcpSupervisor};
use wfd_p2p_server::listener::IpAddressListener;
use wfd_p2p_server::p2p::{GroupState, P2pGroupController, WfdDevice};

use super::support::{AddressLog, FakeTools};

/// Child monitoring is process-wide; one supervisor at a time
static SERIAL: Mutex<()> = parking_lot::const_mutex(());

fn controller(dir: &tempfile::TempDir, script: &str) -> (P2pGroupController, FakeTools) {
    let tools = FakeTools::default();
    let mut config = Config::default();
    config.dhcp = DhcpConfig {
        binary: PathBuf::from("/bin/sh"),
        args: vec!["-c".into(), script.into(), "udhcpd".into()],
        config_path: dir.path().join("udhcpd.conf"),
        stop_timeout_ms: 2000,
        ..DhcpConfig::default()
    };
    let supervisor = DhcpSupervisor::new(config.dhcp.clone());
    let controller = P2pGroupController::new(
        WfdDevice::new("projector", "wlan0"),
        &config,
        Box::new(tools.clone()),
        Box::new(supervisor),
    );
    (controller, tools)
}

#[test]
fn test_allow_disallow_with_real_child() {
    let _serial = SERIAL.lock();
    let dir = tempfile::tempdir().unwrap();
    let (mut controller, tools) = controller(&dir, "exec sleep 30");
    let log = Arc::new(AddressLog::default());
    let listener: Arc<dyn IpAddressListener> = log.clone();
    controller.add_ip_address_listener(&listener);

    controller.allow().unwrap();
    assert_eq!(controller.state(), GroupState::GroupActive);
    assert!(monitor::is_monitoring());

    let conf = std::fs::read_to_string(dir.path().join("udhcpd.conf")).unwrap();
    assert!(conf.contains("interface p2p-wlan0-3"));
    assert!(conf.contains("start 192.168.49.20"));
    assert!(conf.contains("end 192.168.49.254"));
    assert!(conf.contains("option router 192.168.49.1"));

    controller.disallow().unwrap();
    assert_eq!(controller.state(), GroupState::Idle);
    assert!(!monitor::is_monitoring());
    assert!(controller.poll_dhcp().is_none());
    assert!(!controller.is_degraded());
    assert_eq!(tools.count("p2p_group_remove p2p-wlan0-3"), 1);
    assert_eq!(log.0.lock().len(), 1);
}

#[test]
fn test_dhcp_crash_degrades_group() {
    let _serial = SERIAL.lock();
    let dir = tempfile::tempdir().unwrap();
    let (mut controller, _tools) = controller(&dir, "exec sleep 30");
    controller.allow().unwrap();

    let pid = monitor::monitored_pid().unwrap();
    // SAFETY: pid is the supervisor's unreaped child
    unsafe {
        libc::kill(pid as i32, libc::SIGKILL);
    }

    let deadline = Instant::now() + Duration::from_secs(5);
    let exit = loop {
        if let Some(exit) = controller.poll_dhcp() {
            break exit;
        }
        assert!(Instant::now() < deadline, "DHCP exit was never observed");
        thread::sleep(Duration::from_millis(20));
    };

    assert_eq!(exit.pid, pid);
    assert!(controller.is_degraded());
    assert!(controller.status().degraded);
    assert_eq!(controller.state(), GroupState::GroupActive);

    // Cycling the group restarts DHCP with a fresh child
    controller.disallow().unwrap();
    controller.allow().unwrap();
    assert!(!controller.is_degraded());
    assert_ne!(monitor::monitored_pid(), Some(pid));
    controller.disallow().unwrap();
}

#[test]
fn test_dhcp_that_exits_immediately_fails_allow() {
    let _serial = SERIAL.lock();
    let dir = tempfile::tempdir().unwrap();
    let (mut controller, tools) = controller(&dir, "exit 1");

    // Either the spawn-time check or the first poll notices the exit
    match controller.allow() {
        Err(_) => {
            assert_eq!(controller.state(), GroupState::Idle);
            assert_eq!(tools.count("p2p_group_remove p2p-wlan0-3"), 1);
        }
        Ok(_) => {
            let deadline = Instant::now() + Duration::from_secs(5);
            while controller.poll_dhcp().is_none() {
                assert!(Instant::now() < deadline, "DHCP exit was never observed");
                thread::sleep(Duration::from_millis(20));
            }
            assert!(controller.is_degraded());
            controller.disallow().unwrap();
        }
    }
    assert!(!monitor::is_monitoring());
}
