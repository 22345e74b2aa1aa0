//! Diagnostic logging for the `gotrade` binary.
//!
//! Stdout belongs to the operator: progress lines and tagged service output
//! (`[ENGINE1]`, `[FASTAPI]`, ...) go there and may be piped into other
//! tools. Tracing events therefore always go to stderr, filtered by
//! `log_filter` and rendered as compact text or JSON per `log_format`.
//! ANSI styling is only enabled when stderr is a terminal.

use std::io::{self, IsTerminal};

use gotrade_config::{Config, LogFormat};
use once_cell::sync::OnceCell;
use tracing::subscriber::SetGlobalDefaultError;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::fmt::{self, format::FmtSpan};

/// Set once the subscriber is installed; later commands in the same process
/// reuse it.
static INSTALLED: OnceCell<()> = OnceCell::new();

#[derive(Debug, thiserror::Error)]
pub(crate) enum TelemetryError {
    #[error("invalid log filter '{filter}': {reason}")]
    Filter { filter: String, reason: String },
    #[error("failed to install telemetry subscriber: {0}")]
    Subscriber(#[source] SetGlobalDefaultError),
}

/// Installs the stderr subscriber for this invocation.
pub(crate) fn initialise(config: &Config) -> Result<(), TelemetryError> {
    INSTALLED
        .get_or_try_init(|| install(config, io::stderr().is_terminal()))
        .map(|_| ())
}

fn parse_filter(config: &Config) -> Result<EnvFilter, TelemetryError> {
    EnvFilter::try_new(config.log_filter()).map_err(|error| TelemetryError::Filter {
        filter: config.log_filter().to_owned(),
        reason: error.to_string(),
    })
}

fn install(config: &Config, ansi: bool) -> Result<(), TelemetryError> {
    let filter = parse_filter(config)?;
    let builder = fmt::Subscriber::builder()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .with_target(true)
        .with_span_events(FmtSpan::NONE)
        .with_timer(fmt::time::UtcTime::rfc_3339());

    match config.log_format() {
        LogFormat::Json => tracing::subscriber::set_global_default(
            builder.with_ansi(false).json().flatten_event(true).finish(),
        ),
        LogFormat::Compact => {
            tracing::subscriber::set_global_default(builder.with_ansi(ansi).compact().finish())
        }
    }
    .map_err(TelemetryError::Subscriber)
}
