//! Error types for the CLI runtime.

use std::io;
use std::sync::Arc;

use gotrade_config::PathsError;
use thiserror::Error;

use crate::lifecycle::LifecycleError;
use crate::telemetry::TelemetryError;

#[derive(Debug, Error)]
pub(crate) enum AppError {
    #[error("failed to load configuration: {0}")]
    LoadConfiguration(Arc<ortho_config::OrthoError>),
    #[error("{0}")]
    CliUsage(clap::Error),
    #[error("an operation flag must be provided (see --help)")]
    MissingOperation,
    #[error(transparent)]
    Paths(#[from] PathsError),
    #[error(transparent)]
    Telemetry(#[from] TelemetryError),
    #[error("failed to forward service output: {0}")]
    ForwardOutput(io::Error),
    #[error(transparent)]
    Lifecycle(#[from] LifecycleError),
}
