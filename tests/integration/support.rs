//! Shared fakes for integration tests

use std::path::Path;
use std::sync::Arc;

use ipnet::Ipv4Net;
use parking_lot::Mutex;

use wfd_p2p_server::dhcp::{DhcpExit, DhcpService};
use wfd_p2p_server::error::{DhcpError, InvokeError};
use wfd_p2p_server::invoker::{command_line, CommandInvoker, InvokeOutput};
use wfd_p2p_server::listener::{IpAddressListener, ListenerError};

/// Answers like `wpa_cli` and `ip` on a device with one P2P group
#[derive(Clone, Default)]
pub struct FakeTools {
    pub calls: Arc<Mutex<Vec<String>>>,
    /// Calls containing any of these exit with status 1
    pub fail_on: Arc<Mutex<Vec<String>>>,
}

impl FakeTools {
    pub fn count(&self, needle: &str) -> usize {
        self.calls.lock().iter().filter(|c| c.contains(needle)).count()
    }
}

impl CommandInvoker for FakeTools {
    fn invoke(&self, program: &Path, args: &[&str]) -> Result<InvokeOutput, InvokeError> {
        let line = command_line(program, args);
        self.calls.lock().push(line.clone());
        if self.fail_on.lock().iter().any(|f| line.contains(f.as_str())) {
            return Ok(InvokeOutput::failed(1, "RTNETLINK answers: Invalid argument"));
        }
        let reply = match args.last().copied() {
            Some("ping") => "PONG\n",
            Some("interface") => "Selected interface 'wlan0'\nAvailable interfaces:\np2p-dev-wlan0\np2p-wlan0-3\nwlan0\n",
            _ if program.ends_with("ip") => "",
            _ => "OK\n",
        };
        Ok(InvokeOutput::ok(reply))
    }
}

/// DHCP service that only records what it was asked to do
#[derive(Clone, Default)]
pub struct NullDhcp {
    pub configured: Arc<Mutex<Option<(String, Ipv4Net)>>>,
    pub running: Arc<Mutex<bool>>,
}

impl DhcpService for NullDhcp {
    fn configure(&mut self, interface: &str, local: Ipv4Net) -> Result<(), DhcpError> {
        *self.configured.lock() = Some((interface.to_owned(), local));
        Ok(())
    }

    fn start(&mut self) -> Result<u32, DhcpError> {
        *self.running.lock() = true;
        Ok(4242)
    }

    fn stop(&mut self) -> Result<(), DhcpError> {
        *self.running.lock() = false;
        Ok(())
    }

    fn is_running(&self) -> bool {
        *self.running.lock()
    }

    fn poll_exit(&mut self) -> Option<DhcpExit> {
        None
    }
}

/// Listener that records every address it is told about
#[derive(Default)]
pub struct AddressLog(pub Mutex<Vec<String>>);

impl IpAddressListener for AddressLog {
    fn on_ip_address_changed(&self, address: &str) -> Result<(), ListenerError> {
        self.0.lock().push(address.to_owned());
        Ok(())
    }
}
