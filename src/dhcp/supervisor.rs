//! DHCP server supervision
//!
//! [`DhcpSupervisor`] writes the server configuration, spawns the server as a
//! child process, and watches it through the process-wide `SIGCHLD` monitor.
//! The group controller talks to it through the [`DhcpService`] trait.

use std::fmt;
use std::process::{Child, Command, Stdio};
use std::thread;
use std::time::{Duration, Instant};

use ipnet::Ipv4Net;
use tracing::{debug, error, info, warn};

use super::config::DhcpServerConfig;
use super::monitor::{self, SigchldGuard};
use crate::config::DhcpConfig;
use crate::error::DhcpError;

/// Interval between exit checks while waiting for the child in `stop()`
const STOP_POLL_INTERVAL: Duration = Duration::from_millis(20);

/// An exit of the DHCP server that `stop()` did not cause
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DhcpExit {
    pub pid: u32,
    /// Human-readable exit status, if it could be collected
    pub status: Option<String>,
}

impl fmt::Display for DhcpExit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.status {
            Some(status) => write!(f, "pid {} ({})", self.pid, status),
            None => write!(f, "pid {}", self.pid),
        }
    }
}

/// Operations the group controller needs from a DHCP service
pub trait DhcpService: Send {
    /// Write the server configuration for `interface` owning `local`
    ///
    /// # Errors
    ///
    /// Returns `DhcpError::ConfigWrite` on I/O failure.
    fn configure(&mut self, interface: &str, local: Ipv4Net) -> Result<(), DhcpError>;

    /// Spawn the server and begin monitoring it, returning its pid
    ///
    /// # Errors
    ///
    /// Returns `DhcpError::Spawn` if the server cannot be launched.
    fn start(&mut self) -> Result<u32, DhcpError>;

    /// Disable monitoring and terminate the server
    ///
    /// # Errors
    ///
    /// Returns `DhcpError::TerminationTimeout` if the server had to be killed.
    fn stop(&mut self) -> Result<(), DhcpError>;

    /// True while the server is running and monitored
    fn is_running(&self) -> bool;

    /// Collect an unexpected server exit, if one happened
    fn poll_exit(&mut self) -> Option<DhcpExit>;
}

/// The spawned DHCP server
#[derive(Debug)]
struct DhcpChildProcess {
    child: Child,
    pid: u32,
    /// Dropped after the child is reaped to restore the previous disposition
    _sigchld: SigchldGuard,
}

/// Supervisor for a single DHCP server child process
#[derive(Debug)]
pub struct DhcpSupervisor {
    config: DhcpConfig,
    server_config: Option<DhcpServerConfig>,
    child: Option<DhcpChildProcess>,
}

impl DhcpSupervisor {
    /// Create a supervisor; nothing is written or spawned yet
    pub fn new(config: DhcpConfig) -> Self {
        Self {
            config,
            server_config: None,
            child: None,
        }
    }

    /// Configuration written by the last `configure()`
    pub fn server_config(&self) -> Option<&DhcpServerConfig> {
        self.server_config.as_ref()
    }

    fn binary_name(&self) -> String {
        self.config.binary.display().to_string()
    }

    /// Wait for the child to exit, up to the configured timeout
    fn wait_for_exit(child: &mut Child, timeout: Duration) -> Option<std::process::ExitStatus> {
        let deadline = Instant::now() + timeout;
        loop {
            match child.try_wait() {
                Ok(Some(status)) => return Some(status),
                Ok(None) => {}
                Err(e) => {
                    warn!("Failed to poll DHCP server exit: {}", e);
                    return None;
                }
            }
            if Instant::now() >= deadline {
                return None;
            }
            thread::sleep(STOP_POLL_INTERVAL);
        }
    }
}

impl DhcpService for DhcpSupervisor {
    fn configure(&mut self, interface: &str, local: Ipv4Net) -> Result<(), DhcpError> {
        let server_config = DhcpServerConfig::derive(interface, local, &self.config);
        server_config.write(&self.config.config_path)?;

        info!(
            "Wrote DHCP configuration to {:?}: {} pool {}-{}",
            self.config.config_path,
            interface,
            server_config.pool_start,
            server_config.pool_end
        );
        self.server_config = Some(server_config);
        Ok(())
    }

    fn start(&mut self) -> Result<u32, DhcpError> {
        if let Some(child) = &self.child {
            return Err(DhcpError::AlreadyRunning(child.pid));
        }
        if self.server_config.is_none() {
            return Err(DhcpError::NotConfigured);
        }

        let sigchld = SigchldGuard::install().map_err(DhcpError::Signal)?;

        let mut child = Command::new(&self.config.binary)
            .args(&self.config.args)
            .arg(&self.config.config_path)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()
            .map_err(|e| DhcpError::spawn(self.binary_name(), e.to_string()))?;

        let pid = child.id();
        let raw_pid = i32::try_from(pid)
            .map_err(|_| DhcpError::spawn(self.binary_name(), format!("pid {pid} out of range")))?;
        monitor::arm(raw_pid);

        // An exit before arm() was ignored by the handler; catch it here
        if let Ok(Some(status)) = child.try_wait() {
            monitor::disarm();
            monitor::take_exited();
            return Err(DhcpError::spawn(
                self.binary_name(),
                format!("exited immediately with {status}"),
            ));
        }

        info!("Started DHCP server {} (pid {})", self.binary_name(), pid);
        self.child = Some(DhcpChildProcess {
            child,
            pid,
            _sigchld: sigchld,
        });
        Ok(pid)
    }

    fn stop(&mut self) -> Result<(), DhcpError> {
        let Some(mut running) = self.child.take() else {
            debug!("DHCP server not running, nothing to stop");
            return Ok(());
        };

        // Disable monitoring before signalling so our own SIGTERM is not
        // reported as an unexpected exit
        monitor::disarm();
        monitor::take_exited();

        if let Ok(raw_pid) = i32::try_from(running.pid) {
            // SAFETY: the child has not been reaped, so the pid is still ours
            let rc = unsafe { libc::kill(raw_pid, libc::SIGTERM) };
            if rc != 0 {
                debug!(
                    "SIGTERM to DHCP server pid {} failed: {}",
                    running.pid,
                    std::io::Error::last_os_error()
                );
            }
        }

        let timeout = self.config.stop_timeout();
        if let Some(status) = Self::wait_for_exit(&mut running.child, timeout) {
            info!("DHCP server pid {} stopped ({})", running.pid, status);
            return Ok(());
        }

        warn!(
            "DHCP server pid {} ignored SIGTERM for {:?}, killing",
            running.pid, timeout
        );
        if let Err(e) = running.child.kill() {
            warn!("SIGKILL to DHCP server pid {} failed: {}", running.pid, e);
        }
        if let Err(e) = running.child.wait() {
            warn!("Failed to reap DHCP server pid {}: {}", running.pid, e);
        }

        Err(DhcpError::TerminationTimeout {
            pid: running.pid,
            timeout_ms: self.config.stop_timeout_ms,
        })
    }

    fn is_running(&self) -> bool {
        self.child.is_some() && monitor::is_monitoring()
    }

    fn poll_exit(&mut self) -> Option<DhcpExit> {
        let reported = monitor::take_exited();
        let running = self.child.as_mut()?;

        if let Some(pid) = reported {
            if u32::try_from(pid).ok() != Some(running.pid) {
                debug!("Ignoring exit report for stale pid {}", pid);
                return None;
            }
        }

        // SIGCHLD may coalesce with another child's, so also ask directly
        let status = match running.child.try_wait() {
            Ok(Some(status)) => Some(status),
            Ok(None) if reported.is_none() => return None,
            Ok(None) => match running.child.wait() {
                Ok(status) => Some(status),
                Err(e) => {
                    warn!("Failed to reap DHCP server pid {}: {}", running.pid, e);
                    None
                }
            },
            Err(e) => {
                warn!("Failed to poll DHCP server pid {}: {}", running.pid, e);
                None
            }
        };

        monitor::disarm();
        let pid = running.pid;
        self.child = None;

        let exit = DhcpExit {
            pid,
            status: status.map(|s| s.to_string()),
        };
        error!("DHCP server exited unexpectedly: {}", exit);
        Some(exit)
    }
}

impl Drop for DhcpSupervisor {
    fn drop(&mut self) {
        if self.child.is_some() {
            if let Err(e) = self.stop() {
                warn!("Failed to stop DHCP server on drop: {}", e);
            }
        }
    }
}
