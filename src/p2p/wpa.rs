//! Wireless control utility wrapper
//!
//! Builds the `wpa_cli` command lines used for group lifecycle and parses
//! their textual replies. Every call goes through a [`CommandInvoker`].

use std::path::PathBuf;

use tracing::{debug, warn};

use crate::config::WpaConfig;
use crate::error::{GroupError, InvokeError};
use crate::invoker::{command_line, CommandInvoker, InvokeOutput};

/// Reply printed by `wpa_cli` for accepted commands
const REPLY_OK: &str = "OK";

/// Reply printed by `wpa_cli ping`
const REPLY_PONG: &str = "PONG";

/// `wpa_cli` front end bound to one control device
#[derive(Debug, Clone)]
pub struct WpaCli {
    cli_path: PathBuf,
    group_prefix: String,
    p2p_device_prefix: String,
}

impl WpaCli {
    /// Create from configuration
    pub fn new(config: &WpaConfig) -> Self {
        Self {
            cli_path: config.cli_path.clone(),
            group_prefix: config.group_interface_prefix.clone(),
            p2p_device_prefix: config.p2p_device_prefix.clone(),
        }
    }

    fn run(
        &self,
        invoker: &dyn CommandInvoker,
        device: &str,
        args: &[&str],
    ) -> Result<InvokeOutput, InvokeError> {
        let mut full = Vec::with_capacity(args.len() + 2);
        full.extend_from_slice(&["-i", device]);
        full.extend_from_slice(args);
        invoker
            .invoke(&self.cli_path, &full)?
            .into_result(&command_line(&self.cli_path, &full))
    }

    /// Advertise `name` as the WPS device name
    ///
    /// # Errors
    ///
    /// Returns `GroupError::DeviceName` if the utility fails or does not reply `OK`.
    pub fn set_device_name(
        &self,
        invoker: &dyn CommandInvoker,
        device: &str,
        name: &str,
    ) -> Result<(), GroupError> {
        let out = self
            .run(invoker, device, &["set", "device_name", name])
            .map_err(|e| GroupError::device_name(name, "wpa_cli failed").caused_by(e))?;
        if !is_ok(&out) {
            return Err(GroupError::device_name(
                name,
                format!("unexpected reply: {}", out.stdout.trim()),
            ));
        }
        Ok(())
    }

    /// Create an autonomous group and return the group interface name
    ///
    /// # Errors
    ///
    /// Returns `GroupError::GroupCreate` if the group cannot be created or no
    /// group interface appears in the interface listing.
    pub fn add_group(
        &self,
        invoker: &dyn CommandInvoker,
        device: &str,
    ) -> Result<String, GroupError> {
        let out = self
            .run(invoker, device, &["p2p_group_add"])
            .map_err(|e| GroupError::group_create("p2p_group_add failed").caused_by(e))?;
        if !is_ok(&out) {
            return Err(GroupError::group_create(format!(
                "p2p_group_add replied: {}",
                out.stdout.trim()
            )));
        }

        let listing = self
            .run(invoker, device, &["interface"])
            .map_err(|e| GroupError::group_create("interface listing failed").caused_by(e))?;
        let interface = self.parse_group_interface(&listing).ok_or_else(|| {
            GroupError::group_create(format!(
                "no {}* interface in listing: {:?}",
                self.group_prefix,
                listing.stdout.trim()
            ))
        })?;

        debug!("P2P group interface is {}", interface);
        Ok(interface)
    }

    /// Remove the group on `interface`
    ///
    /// # Errors
    ///
    /// Returns `GroupError::GroupRemove` if the utility fails or rejects the request.
    pub fn remove_group(
        &self,
        invoker: &dyn CommandInvoker,
        device: &str,
        interface: &str,
    ) -> Result<(), GroupError> {
        let out = self
            .run(invoker, device, &["p2p_group_remove", interface])
            .map_err(|e| GroupError::group_remove(interface, "wpa_cli failed").caused_by(e))?;
        if !is_ok(&out) {
            return Err(GroupError::group_remove(
                interface,
                format!("unexpected reply: {}", out.stdout.trim()),
            ));
        }
        Ok(())
    }

    /// Check that the control utility answers
    pub fn ping(&self, invoker: &dyn CommandInvoker, device: &str) -> bool {
        match self.run(invoker, device, &["ping"]) {
            Ok(out) => out.lines().any(|l| l == REPLY_PONG),
            Err(e) => {
                warn!("wpa_cli ping failed: {}", e);
                false
            }
        }
    }

    /// Find the first group interface named in `output`
    ///
    /// Accepts both the `interface` listing and `P2P-GROUP-STARTED` event lines.
    /// P2P management interfaces (`p2p-dev-*`) are skipped.
    pub fn parse_group_interface(&self, output: &InvokeOutput) -> Option<String> {
        output
            .lines()
            .flat_map(str::split_whitespace)
            .map(|tok| tok.trim_matches(|c| c == '\'' || c == '"'))
            .find(|tok| {
                tok.starts_with(&self.group_prefix)
                    && (self.p2p_device_prefix.is_empty()
                        || !tok.starts_with(&self.p2p_device_prefix))
            })
            .map(str::to_owned)
    }
}

fn is_ok(out: &InvokeOutput) -> bool {
    out.lines().next() == Some(REPLY_OK)
}
