//! Error types for orchestration operations.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

use super::ServiceName;
use super::shutdown::ShutdownError;
use crate::registry::RegistryError;

/// Errors raised while starting services or running collaborators.
#[derive(Debug, Error)]
pub(crate) enum LifecycleError {
    #[error("invalid request: {reason}")]
    PolicyViolation { reason: String },
    #[error("{what} not found at {path:?}; {hint}")]
    EnvironmentMissing {
        what: &'static str,
        path: PathBuf,
        hint: &'static str,
    },
    #[error("{step} failed: {detail}")]
    DependencyFailure { step: &'static str, detail: String },
    #[error(
        "{service} (pid {pid}) exited with status {status} within {waited_ms} ms of launch; later services were not started"
    )]
    LivenessFailure {
        service: ServiceName,
        pid: u32,
        status: i32,
        waited_ms: u128,
    },
    #[error("failed to launch {service} with '{program}': {source}")]
    LaunchService {
        service: ServiceName,
        program: String,
        #[source]
        source: io::Error,
    },
    #[error("failed to monitor service process: {source}")]
    Monitor {
        #[source]
        source: io::Error,
    },
    #[error("the configured {what} command is empty")]
    InvalidCommand { what: &'static str },
    #[error(
        "services are already running (pid {pid} recorded in {path:?}); run --stop first"
    )]
    AlreadyRunning { pid: u32, path: PathBuf },
    #[error(transparent)]
    Registry(#[from] RegistryError),
    #[error(transparent)]
    Signal(#[from] ShutdownError),
    #[error("failed to write lifecycle output: {0}")]
    Io(#[source] io::Error),
}
