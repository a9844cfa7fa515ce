//! Group interface address configuration via the `ip` tool

use std::path::PathBuf;

use ipnet::Ipv4Net;
use tracing::debug;

use crate::error::GroupError;
use crate::invoker::{command_line, CommandInvoker};

/// Address configuration front end
#[derive(Debug, Clone)]
pub struct IpTool {
    path: PathBuf,
}

impl IpTool {
    /// Create with the path of the `ip` binary
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Replace every address on `interface` with `address` and bring the link up
    ///
    /// # Errors
    ///
    /// Returns `GroupError::AddressAssign` on the first step that fails.
    pub fn assign(
        &self,
        invoker: &dyn CommandInvoker,
        interface: &str,
        address: Ipv4Net,
    ) -> Result<(), GroupError> {
        let cidr = address.to_string();
        let steps: [&[&str]; 3] = [
            &["addr", "flush", "dev", interface],
            &["addr", "add", cidr.as_str(), "dev", interface],
            &["link", "set", interface, "up"],
        ];

        for args in steps {
            invoker
                .invoke(&self.path, args)
                .and_then(|out| out.into_result(&command_line(&self.path, args)))
                .map_err(|e| {
                    GroupError::address_assign(
                        interface,
                        address.addr().to_string(),
                        format!("ip {} {} failed", args[0], args[1]),
                    )
                    .caused_by(e)
                })?;
        }

        debug!("Assigned {} to {}", cidr, interface);
        Ok(())
    }
}
