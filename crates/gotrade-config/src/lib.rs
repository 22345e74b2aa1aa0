//! Shared configuration for the GoTrade developer orchestration tool.
//!
//! Settings are layered by `ortho_config`: built-in defaults, then a
//! discovered or explicit `.gotrade.toml`, then `GOTRADE_*` environment
//! variables, then command-line flags. The [`WorkspacePaths`] helper anchors
//! the relative directories against the invocation's working directory so the
//! launchers and the stop path agree on where everything lives.

use camino::Utf8PathBuf;
use ortho_config::OrthoConfig;
use serde::{Deserialize, Serialize};

pub mod defaults;
mod logging;
mod paths;

pub use defaults::{
    DEFAULT_LOG_FILTER, DEFAULT_PID_REGISTRY, DEFAULT_READINESS_DELAY_MS, DEFAULT_STOP_GRACE_MS,
    default_log_filter, default_log_format, default_pid_registry,
};
pub use logging::{LogFormat, LogFormatParseError};
pub use paths::{PathsError, WorkspacePaths};

/// Configuration consumed by the `gotrade` binary.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize, OrthoConfig)]
#[ortho_config(prefix = "GOTRADE")]
pub struct Config {
    /// Tracing filter expression, for example `info` or `gotrade=debug`.
    #[ortho_config(default = defaults::default_log_filter_string())]
    pub log_filter: String,
    /// Output format for diagnostic logs.
    #[ortho_config(default = defaults::default_log_format())]
    pub log_format: LogFormat,
    /// Location of the PID registry, relative to the working directory.
    #[ortho_config(default = defaults::default_pid_registry())]
    pub pid_registry: Utf8PathBuf,
    /// Milliseconds to wait after each full-stack launch before the liveness check.
    #[ortho_config(default = DEFAULT_READINESS_DELAY_MS)]
    pub readiness_delay_ms: u64,
    /// Milliseconds between SIGTERM and SIGKILL while stopping services.
    #[ortho_config(default = DEFAULT_STOP_GRACE_MS)]
    pub stop_grace_ms: u64,

    /// Checkout of the trading engine.
    #[ortho_config(default = defaults::path("oems"))]
    pub engine_dir: Utf8PathBuf,
    /// Engine executable, relative to `engine_dir`.
    #[ortho_config(default = defaults::path("build/oems"))]
    pub engine_binary: Utf8PathBuf,
    /// Compile script, relative to `engine_dir`.
    #[ortho_config(default = defaults::path("scripts/compile.sh"))]
    pub engine_compile_script: Utf8PathBuf,
    /// Script that compiles and runs the engine against the remote environment.
    #[ortho_config(default = defaults::path("scripts/run_remote.sh"))]
    pub engine_remote_script: Utf8PathBuf,
    /// Command-line pattern used to find stray engine processes.
    #[ortho_config(default = defaults::text("build/oems"))]
    pub engine_process_pattern: String,
    /// Compose file for the database container group, relative to `engine_dir`.
    #[ortho_config(default = defaults::path("docker-compose.yml"))]
    pub database_compose_file: Utf8PathBuf,

    /// Checkout of the web API.
    #[ortho_config(default = defaults::path("gotrade"))]
    pub api_dir: Utf8PathBuf,
    /// Python virtual environment, relative to `api_dir`.
    #[ortho_config(default = defaults::path(".venv"))]
    pub api_venv: Utf8PathBuf,
    /// API command; the program is resolved inside the virtual environment.
    #[ortho_config(default = defaults::text("uvicorn app.main:app --host 0.0.0.0 --port 8000"))]
    pub api_command: String,
    /// Script that builds the shared Python packages, relative to `api_dir`.
    #[ortho_config(default = defaults::path("scripts/build_packages.sh"))]
    pub api_packages_script: Utf8PathBuf,
    /// Optional compose file for API-side containers, relative to `api_dir`.
    #[ortho_config(default = defaults::path("docker-compose.yml"))]
    pub api_compose_file: Utf8PathBuf,
    /// Command-line pattern used to find stray API processes.
    #[ortho_config(default = defaults::text("uvicorn app.main:app"))]
    pub api_process_pattern: String,

    /// Checkout of the frontend.
    #[ortho_config(default = defaults::path("gotrade-frontend"))]
    pub frontend_dir: Utf8PathBuf,
    /// Command that serves the frontend.
    #[ortho_config(default = defaults::text("npm run dev"))]
    pub frontend_command: String,
    /// Command that builds the frontend bundle.
    #[ortho_config(default = defaults::text("npm run build"))]
    pub frontend_build_command: String,
    /// Command-line pattern used to find stray frontend processes.
    #[ortho_config(default = defaults::text("gotrade-frontend/node_modules/.bin/vite"))]
    pub frontend_process_pattern: String,

    /// Dependency bootstrap script.
    #[ortho_config(default = defaults::path("scripts/install_dependencies.sh"))]
    pub init_script: Utf8PathBuf,
    /// SSH key generation script.
    #[ortho_config(default = defaults::path("scripts/generate_ssh_key.sh"))]
    pub auth_script: Utf8PathBuf,
    /// Environment setup script.
    #[ortho_config(default = defaults::path("scripts/setup_gotrade.sh"))]
    pub setup_script: Utf8PathBuf,
    /// Remote prefix used by `clone`.
    #[ortho_config(default = defaults::text(defaults::DEFAULT_REPOSITORY_BASE))]
    pub repository_base: String,
}

impl Config {
    /// Returns the configured log filter expression.
    #[must_use]
    pub fn log_filter(&self) -> &str {
        self.log_filter.as_str()
    }

    /// Returns the configured log format.
    #[must_use]
    pub fn log_format(&self) -> LogFormat {
        self.log_format
    }

    /// Returns the readiness delay as a [`std::time::Duration`].
    #[must_use]
    pub fn readiness_delay(&self) -> std::time::Duration {
        std::time::Duration::from_millis(self.readiness_delay_ms)
    }

    /// Returns the stop grace interval as a [`std::time::Duration`].
    #[must_use]
    pub fn stop_grace(&self) -> std::time::Duration {
        std::time::Duration::from_millis(self.stop_grace_ms)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            log_filter: defaults::default_log_filter_string(),
            log_format: defaults::default_log_format(),
            pid_registry: defaults::default_pid_registry(),
            readiness_delay_ms: DEFAULT_READINESS_DELAY_MS,
            stop_grace_ms: DEFAULT_STOP_GRACE_MS,
            engine_dir: defaults::path("oems"),
            engine_binary: defaults::path("build/oems"),
            engine_compile_script: defaults::path("scripts/compile.sh"),
            engine_remote_script: defaults::path("scripts/run_remote.sh"),
            engine_process_pattern: defaults::text("build/oems"),
            database_compose_file: defaults::path("docker-compose.yml"),
            api_dir: defaults::path("gotrade"),
            api_venv: defaults::path(".venv"),
            api_command: defaults::text("uvicorn app.main:app --host 0.0.0.0 --port 8000"),
            api_packages_script: defaults::path("scripts/build_packages.sh"),
            api_compose_file: defaults::path("docker-compose.yml"),
            api_process_pattern: defaults::text("uvicorn app.main:app"),
            frontend_dir: defaults::path("gotrade-frontend"),
            frontend_command: defaults::text("npm run dev"),
            frontend_build_command: defaults::text("npm run build"),
            frontend_process_pattern: defaults::text("gotrade-frontend/node_modules/.bin/vite"),
            init_script: defaults::path("scripts/install_dependencies.sh"),
            auth_script: defaults::path("scripts/generate_ssh_key.sh"),
            setup_script: defaults::path("scripts/setup_gotrade.sh"),
            repository_base: defaults::text(defaults::DEFAULT_REPOSITORY_BASE),
        }
    }
}
