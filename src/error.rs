//! Error types for wfd-p2p-server
//!
//! This module defines the error hierarchy for the P2P group supervisor.
//! Errors are grouped by subsystem and carry a recoverability hint so that
//! callers can decide whether cycling the group is worthwhile.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Top-level error type for wfd-p2p-server
#[derive(Debug, Error)]
pub enum WfdError {
    /// Configuration errors (file parsing, validation)
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// External control utility errors
    #[error("Invocation error: {0}")]
    Invoke(#[from] InvokeError),

    /// P2P group lifecycle errors
    #[error("Group error: {0}")]
    Group(#[from] GroupError),

    /// DHCP supervisor errors
    #[error("DHCP error: {0}")]
    Dhcp(#[from] DhcpError),

    /// Control channel errors
    #[error("Control error: {0}")]
    Control(#[from] ControlError),

    /// I/O errors not covered by other categories
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

impl WfdError {
    /// Check if this error is recoverable (a retry or group cycle may help)
    #[must_use]
    pub fn is_recoverable(&self) -> bool {
        match self {
            Self::Config(_) => false,
            Self::Invoke(e) => e.is_recoverable(),
            Self::Group(e) => e.is_recoverable(),
            Self::Dhcp(e) => e.is_recoverable(),
            Self::Control(e) => e.is_recoverable(),
            Self::Io(e) => matches!(
                e.kind(),
                io::ErrorKind::TimedOut | io::ErrorKind::Interrupted | io::ErrorKind::WouldBlock
            ),
        }
    }
}

/// Configuration-related errors
#[derive(Debug, Error)]
pub enum ConfigError {
    /// File not found or inaccessible
    #[error("Configuration file not found: {path}")]
    FileNotFound { path: String },

    /// JSON parsing error
    #[error("Failed to parse configuration: {0}")]
    ParseError(String),

    /// Validation error (invalid values, missing required fields)
    #[error("Configuration validation failed: {0}")]
    ValidationError(String),

    /// Environment variable error
    #[error("Environment variable error: {name}: {reason}")]
    EnvError { name: String, reason: String },

    /// I/O error while reading config
    #[error("I/O error reading configuration: {0}")]
    IoError(#[from] io::Error),
}

impl ConfigError {
    /// Config errors are not recoverable without user intervention
    #[must_use]
    pub const fn is_recoverable(&self) -> bool {
        false
    }
}

/// Errors from running the external control utilities
#[derive(Debug, Error)]
pub enum InvokeError {
    /// The binary could not be launched at all
    #[error("Failed to launch {command}: {source}")]
    Launch {
        command: String,
        #[source]
        source: io::Error,
    },

    /// The binary ran but exited with a non-zero status
    #[error("{command} exited with status {status:?}: {output}")]
    Failed {
        command: String,
        status: Option<i32>,
        output: String,
    },
}

impl InvokeError {
    /// A launch failure means the binary is missing; a bad exit may be transient
    #[must_use]
    pub fn is_recoverable(&self) -> bool {
        match self {
            Self::Launch { source, .. } => source.kind() != io::ErrorKind::NotFound,
            Self::Failed { .. } => true,
        }
    }

    /// Create a launch error
    pub fn launch(command: impl Into<String>, source: io::Error) -> Self {
        Self::Launch {
            command: command.into(),
            source,
        }
    }

    /// Create a non-zero exit error
    pub fn failed(command: impl Into<String>, status: Option<i32>, output: impl Into<String>) -> Self {
        Self::Failed {
            command: command.into(),
            status,
            output: output.into(),
        }
    }
}

/// P2P group lifecycle errors
///
/// Variants raised by a failed utility call keep the [`InvokeError`] as their
/// source; use [`report`] to render the whole chain.
#[derive(Debug, Error)]
pub enum GroupError {
    /// Registering the WPS display name failed
    #[error("Failed to set WPS device name '{name}': {reason}")]
    DeviceName {
        name: String,
        reason: String,
        #[source]
        source: Option<InvokeError>,
    },

    /// Group creation failed or its output could not be parsed
    #[error("Failed to create P2P group: {reason}")]
    GroupCreate {
        reason: String,
        #[source]
        source: Option<InvokeError>,
    },

    /// Group removal failed (logged, never fatal for teardown)
    #[error("Failed to remove P2P group {interface}: {reason}")]
    GroupRemove {
        interface: String,
        reason: String,
        #[source]
        source: Option<InvokeError>,
    },

    /// Assigning an address to the group interface failed
    #[error("Failed to assign {address} to {interface}: {reason}")]
    AddressAssign {
        interface: String,
        address: String,
        reason: String,
        #[source]
        source: Option<InvokeError>,
    },

    /// The DHCP service could not be configured or started
    #[error("Failed to start DHCP service: {0}")]
    DhcpStart(#[source] DhcpError),

    /// Operation requires an active group
    #[error("No active P2P group")]
    NotActive,
}

impl GroupError {
    /// Check if this error is recoverable
    #[must_use]
    pub fn is_recoverable(&self) -> bool {
        match self {
            Self::DeviceName { source, .. }
            | Self::GroupCreate { source, .. }
            | Self::GroupRemove { source, .. }
            | Self::AddressAssign { source, .. } => {
                source.as_ref().map_or(true, InvokeError::is_recoverable)
            }
            Self::DhcpStart(e) => e.is_recoverable(),
            Self::NotActive => false,
        }
    }

    /// Create a device name error
    pub fn device_name(name: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::DeviceName {
            name: name.into(),
            reason: reason.into(),
            source: None,
        }
    }

    /// Create a group creation error
    pub fn group_create(reason: impl Into<String>) -> Self {
        Self::GroupCreate {
            reason: reason.into(),
            source: None,
        }
    }

    /// Create a group removal error
    pub fn group_remove(interface: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::GroupRemove {
            interface: interface.into(),
            reason: reason.into(),
            source: None,
        }
    }

    /// Create an address assignment error
    pub fn address_assign(
        interface: impl Into<String>,
        address: impl Into<String>,
        reason: impl Into<String>,
    ) -> Self {
        Self::AddressAssign {
            interface: interface.into(),
            address: address.into(),
            reason: reason.into(),
            source: None,
        }
    }

    /// Attach the utility failure that caused this error
    #[must_use]
    pub fn caused_by(mut self, cause: InvokeError) -> Self {
        match &mut self {
            Self::DeviceName { source, .. }
            | Self::GroupCreate { source, .. }
            | Self::GroupRemove { source, .. }
            | Self::AddressAssign { source, .. } => *source = Some(cause),
            Self::DhcpStart(_) | Self::NotActive => {}
        }
        self
    }
}

/// Render `err` followed by each of its sources, separated by `": "`
pub fn report(err: &dyn std::error::Error) -> String {
    let mut text = err.to_string();
    let mut next = err.source();
    while let Some(cause) = next {
        text.push_str(": ");
        text.push_str(&cause.to_string());
        next = cause.source();
    }
    text
}

/// DHCP supervisor errors
#[derive(Debug, Error)]
pub enum DhcpError {
    /// Writing the DHCP server configuration failed
    #[error("Failed to write DHCP configuration to {path:?}: {source}")]
    ConfigWrite {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// The DHCP server binary could not be launched
    #[error("Failed to spawn {binary}: {reason}")]
    Spawn { binary: String, reason: String },

    /// The DHCP server did not exit within the stop timeout and was killed
    #[error("DHCP server (pid {pid}) did not exit within {timeout_ms}ms, killed")]
    TerminationTimeout { pid: u32, timeout_ms: u64 },

    /// A DHCP server is already supervised
    #[error("DHCP server already running (pid {0})")]
    AlreadyRunning(u32),

    /// `start()` was called before `configure()`
    #[error("DHCP server is not configured")]
    NotConfigured,

    /// Installing or restoring the SIGCHLD handler failed
    #[error("Failed to update SIGCHLD disposition: {0}")]
    Signal(#[source] io::Error),
}

impl DhcpError {
    /// Check if this error is recoverable
    #[must_use]
    pub fn is_recoverable(&self) -> bool {
        match self {
            Self::ConfigWrite { source, .. } => matches!(
                source.kind(),
                io::ErrorKind::Interrupted | io::ErrorKind::WouldBlock
            ),
            Self::Spawn { .. } => false,
            Self::TerminationTimeout { .. } => true,
            Self::AlreadyRunning(_) => false,
            Self::NotConfigured => false,
            Self::Signal(_) => false,
        }
    }

    /// Create a spawn error
    pub fn spawn(binary: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Spawn {
            binary: binary.into(),
            reason: reason.into(),
        }
    }
}

/// Control channel errors
#[derive(Debug, Error)]
pub enum ControlError {
    /// Malformed or unrecognized control message
    #[error("Control message parse error: {0}")]
    Parse(String),

    /// Failed to bind the control listener
    #[error("Failed to bind control listener to {addr}: {reason}")]
    BindError { addr: String, reason: String },

    /// Frame exceeded the configured maximum size
    #[error("Control message too large: {size} bytes (max {max})")]
    TooLarge { size: usize, max: usize },

    /// Serialization error when writing a reply
    #[error("Control serialization error: {0}")]
    SerializationError(String),

    /// I/O error
    #[error("Control I/O error: {0}")]
    IoError(#[from] io::Error),
}

impl ControlError {
    /// Check if this error is recoverable
    #[must_use]
    pub fn is_recoverable(&self) -> bool {
        match self {
            Self::Parse(_) => true,
            Self::BindError { .. } => false,
            Self::TooLarge { .. } => true,
            Self::SerializationError(_) => false,
            Self::IoError(e) => matches!(
                e.kind(),
                io::ErrorKind::Interrupted
                    | io::ErrorKind::ConnectionReset
                    | io::ErrorKind::BrokenPipe
            ),
        }
    }

    /// Create a parse error
    pub fn parse(msg: impl Into<String>) -> Self {
        Self::Parse(msg.into())
    }
}

/// Type alias for Result with WfdError
pub type Result<T> = std::result::Result<T, WfdError>;
