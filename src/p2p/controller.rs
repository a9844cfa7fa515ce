//! P2P group controller
//!
//! Owns the [`GroupSession`] and drives it through
//! `Idle -> GroupStarting -> GroupActive -> GroupStopping -> Idle`.
//!
//! - `allow()` names the device, creates the group, assigns the local
//!   address, starts DHCP, then notifies listeners. Any failure unwinds the
//!   half-built group and leaves the controller `Idle`.
//! - `disallow()` stops DHCP before removing the group and always ends
//!   `Idle`, reporting the first teardown failure it saw.
//!
//! All methods take `&mut self`; callers sharing a controller between
//! threads must lock it. Listener callbacks run inside `allow()` and
//! `set_local_ip()`, so with a shared controller they run while its lock is
//! held and must not lock the controller again.

use std::sync::Arc;

use ipnet::Ipv4Net;
use tracing::{debug, error, info, warn};

use super::device::WfdDevice;
use super::netif::IpTool;
use super::session::{DeviceName, GroupSession, GroupState, GroupStatus};
use super::wpa::WpaCli;
use crate::config::Config;
use crate::dhcp::{DhcpExit, DhcpService};
use crate::error::{report, GroupError, WfdError};
use crate::invoker::CommandInvoker;
use crate::listener::{IpAddressListener, ListenerId, ListenerRegistry};

/// Controller for the device's single P2P group
pub struct P2pGroupController {
    device: WfdDevice,
    session: GroupSession,
    invoker: Box<dyn CommandInvoker>,
    wpa: WpaCli,
    ip: IpTool,
    group_address: Ipv4Net,
    /// Address currently on the group interface
    assigned: Option<Ipv4Net>,
    dhcp: Box<dyn DhcpService>,
    listeners: ListenerRegistry,
}

impl P2pGroupController {
    /// Create an idle controller for `device`
    pub fn new(
        device: WfdDevice,
        config: &Config,
        invoker: Box<dyn CommandInvoker>,
        dhcp: Box<dyn DhcpService>,
    ) -> Self {
        let session = GroupSession::new(device.name().clone(), device.wpa_device().clone());
        Self {
            device,
            session,
            invoker,
            wpa: WpaCli::new(&config.wpa),
            ip: IpTool::new(config.network.ip_tool.clone()),
            group_address: config.network.local_address,
            assigned: None,
            dhcp,
            listeners: ListenerRegistry::new(),
        }
    }

    /// The device this controller drives
    pub fn device(&self) -> &WfdDevice {
        &self.device
    }

    /// Current lifecycle state
    pub fn state(&self) -> GroupState {
        self.session.state
    }

    /// Address currently assigned to the group interface
    pub fn local_address(&self) -> Option<&str> {
        self.session.local_address.as_deref()
    }

    /// Configured group address, applied by `allow()`
    pub fn group_address(&self) -> Ipv4Net {
        self.group_address
    }

    /// Status snapshot
    pub fn status(&self) -> GroupStatus {
        self.session.status()
    }

    /// Register an address listener
    pub fn add_ip_address_listener(&mut self, listener: &Arc<dyn IpAddressListener>) -> ListenerId {
        self.listeners.register(listener)
    }

    /// Unregister an address listener
    pub fn remove_ip_address_listener(&mut self, id: ListenerId) -> bool {
        self.listeners.unregister(id)
    }

    /// Bring the group up, returning the local address
    ///
    /// Calling this while the group is already active returns the current
    /// address without touching the control utility.
    ///
    /// # Errors
    ///
    /// Returns the `GroupError` of the first failed step; the controller is
    /// `Idle` afterwards.
    pub fn allow(&mut self) -> Result<String, GroupError> {
        self.poll_dhcp();

        if let (GroupState::GroupActive, Some(address)) =
            (self.session.state, &self.session.local_address)
        {
            debug!("P2P group already active at {}", address);
            return Ok(address.clone());
        }

        self.transition(GroupState::GroupStarting);
        match self.start_group() {
            Ok(address) => {
                self.assigned = Some(self.group_address);
                self.session.local_address = Some(address.clone());
                self.transition(GroupState::GroupActive);
                info!(
                    "P2P group active on {} at {}",
                    self.session.group_interface, address
                );
                self.listeners.notify_all(&address);
                Ok(address)
            }
            Err(e) => {
                error!("Failed to bring up P2P group: {}", report(&e));
                self.assigned = None;
                self.session.reset();
                Err(e)
            }
        }
    }

    fn start_group(&mut self) -> Result<String, GroupError> {
        let device = self.session.wpa_device.to_string();

        self.wpa
            .set_device_name(self.invoker.as_ref(), &device, self.session.device_name.as_str())?;

        let interface = self.wpa.add_group(self.invoker.as_ref(), &device)?;
        self.session.group_interface = interface.as_str().into();

        if let Err(e) = self.ip.assign(self.invoker.as_ref(), &interface, self.group_address) {
            self.remove_group_best_effort();
            return Err(e);
        }

        let dhcp_result = self
            .dhcp
            .configure(&interface, self.group_address)
            .and_then(|()| self.dhcp.start());
        if let Err(e) = dhcp_result {
            self.remove_group_best_effort();
            return Err(GroupError::DhcpStart(e));
        }

        Ok(self.group_address.addr().to_string())
    }

    /// Tear the group down
    ///
    /// Always leaves the controller `Idle`. No listener is notified.
    ///
    /// # Errors
    ///
    /// Returns the first teardown step that failed; later steps still ran.
    pub fn disallow(&mut self) -> Result<(), WfdError> {
        if self.session.state == GroupState::Idle {
            debug!("P2P group already idle");
            return Ok(());
        }

        self.transition(GroupState::GroupStopping);
        let mut first_error: Option<WfdError> = None;

        // DHCP goes first so its exit never refers to a removed interface
        if let Err(e) = self.dhcp.stop() {
            warn!("Failed to stop DHCP server cleanly: {}", e);
            first_error.get_or_insert(e.into());
        }

        if !self.session.group_interface.is_empty() {
            let device = self.session.wpa_device.to_string();
            let interface = self.session.group_interface.to_string();
            if let Err(e) = self.wpa.remove_group(self.invoker.as_ref(), &device, &interface) {
                warn!("{}", e);
                first_error.get_or_insert(e.into());
            }
        }

        self.assigned = None;
        self.session.reset();
        info!("P2P group removed");

        first_error.map_or(Ok(()), Err)
    }

    /// Check that the wireless control utility answers
    pub fn ping(&self) -> bool {
        self.wpa
            .ping(self.invoker.as_ref(), self.session.wpa_device.as_str())
    }

    /// Change the advertised device name
    ///
    /// The name is truncated to the WPS limit and pushed to the control
    /// utility immediately; it is kept only if the utility accepts it.
    ///
    /// # Errors
    ///
    /// Returns `GroupError::DeviceName` if the name is empty or rejected.
    pub fn set_device_name(&mut self, name: &str) -> Result<(), GroupError> {
        let name = DeviceName::new(name);
        if name.is_empty() {
            return Err(GroupError::device_name("", "name is empty"));
        }

        self.wpa.set_device_name(
            self.invoker.as_ref(),
            self.session.wpa_device.as_str(),
            name.as_str(),
        )?;

        info!("Device name set to {}", name);
        self.session.device_name = name;
        Ok(())
    }

    /// Replace the group interface address, move DHCP to the new subnet and
    /// notify listeners
    ///
    /// If the address cannot be applied the previous one is put back and no
    /// listener is notified. A DHCP server that fails to restart on the new
    /// subnet leaves the group degraded but does not fail the call.
    ///
    /// # Errors
    ///
    /// Returns `GroupError::NotActive` without a group, or
    /// `GroupError::AddressAssign` if the address cannot be applied.
    pub fn set_local_ip(&mut self, address: Ipv4Net) -> Result<String, GroupError> {
        self.poll_dhcp();

        if !self.session.is_active() {
            return Err(GroupError::NotActive);
        }

        let interface = self.session.group_interface.to_string();
        if let Err(e) = self.ip.assign(self.invoker.as_ref(), &interface, address) {
            error!("Failed to change local address of {}: {}", interface, report(&e));
            self.restore_address(&interface);
            return Err(e);
        }
        self.assigned = Some(address);

        let text = address.addr().to_string();
        info!("Local address of {} changed to {}", interface, text);
        self.session.local_address = Some(text.clone());
        self.restart_dhcp(&interface, address);
        self.listeners.notify_all(&text);
        Ok(text)
    }

    /// Put the last good address back after a failed change
    fn restore_address(&mut self, interface: &str) {
        let Some(previous) = self.assigned else {
            return;
        };
        match self.ip.assign(self.invoker.as_ref(), interface, previous) {
            Ok(()) => info!("Restored {} on {}", previous, interface),
            Err(e) => {
                error!(
                    "Failed to restore {} on {}: {}; cycle the group to recover",
                    previous,
                    interface,
                    report(&e)
                );
                self.assigned = None;
                self.session.degraded = true;
            }
        }
    }

    /// Restart the DHCP server so its pool and router follow `address`
    fn restart_dhcp(&mut self, interface: &str, address: Ipv4Net) {
        if let Err(e) = self.dhcp.stop() {
            warn!("Failed to stop DHCP server cleanly: {}", e);
        }

        let restarted = self
            .dhcp
            .configure(interface, address)
            .and_then(|()| self.dhcp.start());
        match restarted {
            Ok(pid) => {
                debug!("DHCP server restarted for {} (pid {})", address, pid);
                self.session.degraded = false;
            }
            Err(e) => {
                error!(
                    "DHCP server could not follow {} on {}: {}; peers cannot obtain addresses until the group is cycled",
                    address, interface, e
                );
                self.session.degraded = true;
            }
        }
    }

    /// Collect an unexpected DHCP exit and mark the session degraded
    pub fn poll_dhcp(&mut self) -> Option<DhcpExit> {
        let exit = self.dhcp.poll_exit()?;
        if self.session.is_active() {
            error!(
                "DHCP server died while group {} is active ({}); peers cannot obtain addresses until the group is cycled",
                self.session.group_interface, exit
            );
            self.session.degraded = true;
        }
        Some(exit)
    }

    /// True if the DHCP server died while the group was active
    pub fn is_degraded(&self) -> bool {
        self.session.degraded
    }

    fn remove_group_best_effort(&mut self) {
        let device = self.session.wpa_device.to_string();
        let interface = self.session.group_interface.to_string();
        if interface.is_empty() {
            return;
        }
        if let Err(e) = self.wpa.remove_group(self.invoker.as_ref(), &device, &interface) {
            warn!("Cleanup of half-created group failed: {}", e);
        }
    }

    fn transition(&mut self, next: GroupState) {
        debug!("P2P group state {} -> {}", self.session.state, next);
        self.session.state = next;
    }
}
