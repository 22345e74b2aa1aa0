//! Built-in defaults for every configuration field.
//!
//! Paths are relative to the directory the tool is invoked from; the
//! [`crate::WorkspacePaths`] resolver anchors them.

use camino::Utf8PathBuf;

use crate::logging::LogFormat;

/// Default log filter expression used by the binary.
pub const DEFAULT_LOG_FILTER: &str = "info";

/// File name of the PID registry written by a full-stack start.
pub const DEFAULT_PID_REGISTRY: &str = ".gotrade.pids";

/// Delay between launching a full-stack service and checking it is alive.
pub const DEFAULT_READINESS_DELAY_MS: u64 = 5_000;

/// Grace interval between SIGTERM and SIGKILL during stop.
pub const DEFAULT_STOP_GRACE_MS: u64 = 2_000;

/// Remote that repositories are cloned from.
pub const DEFAULT_REPOSITORY_BASE: &str = "git@github.com:gotrade-dev";

/// Default log filter expression used by the binary.
pub fn default_log_filter() -> &'static str {
    DEFAULT_LOG_FILTER
}

/// Owned log filter value used where allocation is required (e.g. serde).
pub fn default_log_filter_string() -> String {
    DEFAULT_LOG_FILTER.to_owned()
}

/// Default logging format for the binary.
pub fn default_log_format() -> LogFormat {
    LogFormat::Compact
}

/// Default PID registry location.
pub fn default_pid_registry() -> Utf8PathBuf {
    Utf8PathBuf::from(DEFAULT_PID_REGISTRY)
}

pub(crate) fn path(value: &str) -> Utf8PathBuf {
    Utf8PathBuf::from(value)
}

pub(crate) fn text(value: &str) -> String {
    value.to_owned()
}
