//! External command invocation
//!
//! Every interaction with the wireless control stack goes through a
//! [`CommandInvoker`]: run a binary with arguments, block until it exits,
//! and hand back its (bounded) standard output plus whether it exited
//! with status zero.
//!
//! The trait seam exists so the group controller can be driven by a
//! scripted invoker in tests.

use std::ffi::OsStr;
use std::path::Path;
use std::process::{Command, Stdio};

use tracing::debug;

use crate::error::InvokeError;

/// Maximum number of stdout bytes kept from a single invocation
pub const MAX_OUTPUT_SIZE: usize = 4096;

/// Output of a completed invocation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvokeOutput {
    /// Captured standard output, truncated to [`MAX_OUTPUT_SIZE`]
    pub stdout: String,
    /// Process exited with status zero
    pub success: bool,
    /// Exit code, `None` if terminated by a signal
    pub status: Option<i32>,
}

impl InvokeOutput {
    /// Successful output carrying `stdout`
    pub fn ok(stdout: impl Into<String>) -> Self {
        Self {
            stdout: stdout.into(),
            success: true,
            status: Some(0),
        }
    }

    /// Failed output with the given exit code
    pub fn failed(status: i32, stdout: impl Into<String>) -> Self {
        Self {
            stdout: stdout.into(),
            success: false,
            status: Some(status),
        }
    }

    /// Iterate over non-empty, trimmed output lines
    pub fn lines(&self) -> impl Iterator<Item = &str> {
        self.stdout.lines().map(str::trim).filter(|l| !l.is_empty())
    }

    /// Turn a non-zero exit into an error
    ///
    /// # Errors
    ///
    /// Returns `InvokeError::Failed` if the process did not exit with status zero.
    pub fn into_result(self, command: &str) -> Result<Self, InvokeError> {
        if self.success {
            Ok(self)
        } else {
            Err(InvokeError::failed(command, self.status, self.stdout.trim()))
        }
    }
}

/// Runs an external command synchronously
pub trait CommandInvoker: Send + Sync {
    /// Run `program` with `args`, blocking until it exits
    ///
    /// # Errors
    ///
    /// Returns `InvokeError::Launch` if the binary cannot be started.
    /// A non-zero exit is reported through [`InvokeOutput::success`], not as an error.
    fn invoke(&self, program: &Path, args: &[&str]) -> Result<InvokeOutput, InvokeError>;
}

/// Invoker backed by `std::process::Command`
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemInvoker;

impl SystemInvoker {
    /// Create a new system invoker
    pub const fn new() -> Self {
        Self
    }
}

impl CommandInvoker for SystemInvoker {
    fn invoke(&self, program: &Path, args: &[&str]) -> Result<InvokeOutput, InvokeError> {
        let line = command_line(program, args);
        debug!("Invoking: {}", line);

        let output = Command::new(program)
            .args(args.iter().map(OsStr::new))
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .output()
            .map_err(|e| InvokeError::launch(line.clone(), e))?;

        let stdout = &output.stdout[..output.stdout.len().min(MAX_OUTPUT_SIZE)];
        let result = InvokeOutput {
            stdout: String::from_utf8_lossy(stdout).into_owned(),
            success: output.status.success(),
            status: output.status.code(),
        };

        debug!(
            "{} exited with {:?}: {:?}",
            line,
            result.status,
            result.stdout.trim()
        );

        Ok(result)
    }
}

/// Render a command line for logs and error messages
pub fn command_line(program: &Path, args: &[&str]) -> String {
    let mut line = program.display().to_string();
    for arg in args {
        line.push(' ');
        line.push_str(arg);
    }
    line
}
