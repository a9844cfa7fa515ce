//! DHCP server configuration rendering
//!
//! The leased pool is derived from the group owner's own address: same
//! subnet, host offsets `pool_start..=pool_end`, with the owner advertised
//! as router.

use std::fmt::Write as _;
use std::net::Ipv4Addr;
use std::path::Path;

use ipnet::Ipv4Net;

use crate::config::DhcpConfig;
use crate::error::DhcpError;

/// Parameters written to the DHCP server configuration file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DhcpServerConfig {
    pub interface: String,
    pub pool_start: Ipv4Addr,
    pub pool_end: Ipv4Addr,
    pub router: Ipv4Addr,
    pub subnet_mask: Ipv4Addr,
    pub lease_secs: u64,
}

impl DhcpServerConfig {
    /// Derive the server configuration for `interface` owning `local`
    pub fn derive(interface: &str, local: Ipv4Net, config: &DhcpConfig) -> Self {
        let network = u32::from(local.network());
        let max_host = u32::from(local.broadcast()).saturating_sub(network + 1);
        let host = |offset: u32| Ipv4Addr::from(network + offset.clamp(1, max_host.max(1)));

        Self {
            interface: interface.to_owned(),
            pool_start: host(config.pool_start),
            pool_end: host(config.pool_end),
            router: local.addr(),
            subnet_mask: local.netmask(),
            lease_secs: config.lease_secs,
        }
    }

    /// Render in `udhcpd.conf` syntax
    pub fn render(&self) -> String {
        let mut out = String::new();
        // Writing to a String cannot fail
        let _ = writeln!(out, "start {}", self.pool_start);
        let _ = writeln!(out, "end {}", self.pool_end);
        let _ = writeln!(out, "interface {}", self.interface);
        let _ = writeln!(out, "option subnet {}", self.subnet_mask);
        let _ = writeln!(out, "option router {}", self.router);
        let _ = writeln!(out, "option lease {}", self.lease_secs);
        out
    }

    /// Write the rendered configuration to `path`
    ///
    /// # Errors
    ///
    /// Returns `DhcpError::ConfigWrite` on any I/O failure.
    pub fn write(&self, path: &Path) -> Result<(), DhcpError> {
        std::fs::write(path, self.render()).map_err(|source| DhcpError::ConfigWrite {
            path: path.to_path_buf(),
            source,
        })
    }
}
