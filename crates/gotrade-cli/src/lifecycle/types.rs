//! Service identities, handles, and output abstractions.
//!
//! Defines the values shared across lifecycle commands so the orchestrator can
//! remain agnostic of concrete writers.

use std::fmt;
use std::io::Write;
use std::time::SystemTime;

use tracing::warn;

use super::{LIFECYCLE_TARGET, LifecycleError};

/// Services managed by the orchestrator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub(crate) enum ServiceName {
    Engine,
    Api,
    Frontend,
}

impl ServiceName {
    pub(crate) const fn as_str(self) -> &'static str {
        match self {
            Self::Engine => "oems",
            Self::Api => "fastapi",
            Self::Frontend => "frontend",
        }
    }
}

impl fmt::Display for ServiceName {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.write_str(self.as_str())
    }
}

/// A successfully launched service awaiting persistence.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct ServiceHandle {
    pub(crate) name: ServiceName,
    pub(crate) pid: u32,
    pub(crate) launched_at: SystemTime,
}

impl ServiceHandle {
    pub(crate) fn new(name: ServiceName, pid: u32) -> Self {
        Self {
            name,
            pid,
            launched_at: SystemTime::now(),
        }
    }
}

/// Output handle abstracting over stdout/stderr writers.
pub(crate) struct LifecycleOutput<W: Write, E: Write> {
    pub(crate) stdout: W,
    pub(crate) stderr: E,
}

impl<W: Write, E: Write> LifecycleOutput<W, E> {
    pub(crate) fn new(stdout: W, stderr: E) -> Self {
        Self { stdout, stderr }
    }

    pub(crate) fn stdout_line(&mut self, args: fmt::Arguments<'_>) -> Result<(), LifecycleError> {
        self.stdout.write_fmt(args).map_err(LifecycleError::Io)?;
        self.stdout.write_all(b"\n").map_err(LifecycleError::Io)?;
        self.stdout.flush().map_err(LifecycleError::Io)
    }

    pub(crate) fn stderr_line(&mut self, args: fmt::Arguments<'_>) -> Result<(), LifecycleError> {
        self.stderr.write_fmt(args).map_err(LifecycleError::Io)?;
        self.stderr.write_all(b"\n").map_err(LifecycleError::Io)?;
        self.stderr.flush().map_err(LifecycleError::Io)
    }

    /// Writes a progress line to stdout, logging rather than failing on error.
    ///
    /// Used where the surrounding step must complete even if the terminal is
    /// gone.
    pub(crate) fn stdout_note(&mut self, args: fmt::Arguments<'_>) {
        if let Err(error) = self.stdout_line(args) {
            warn!(target: LIFECYCLE_TARGET, %error, "stdout unavailable; progress line dropped");
        }
    }

    /// Writes a progress line to stderr, logging rather than failing on error.
    pub(crate) fn stderr_note(&mut self, args: fmt::Arguments<'_>) {
        if let Err(error) = self.stderr_line(args) {
            warn!(target: LIFECYCLE_TARGET, %error, "stderr unavailable; progress line dropped");
        }
    }
}
