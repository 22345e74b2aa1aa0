//! Service launchers.
//!
//! Each launcher knows how to get one service ready (`prepare`: directory
//! checks, container groups, optional builds) and how to start it (`launch`).
//! Prepare failures abort before any process exists for that service.

mod api;
mod engine;
mod frontend;
mod remote;

use std::os::unix::fs::PermissionsExt;
use std::path::Path;

use tracing::info;

use crate::host::{CommandSpec, Forwarding, OutputPlan, ProcessHost, SpawnedProcess};
use crate::intent::Intent;
use crate::lifecycle::{LIFECYCLE_TARGET, LifecycleError, ServiceName};

pub(crate) use api::ApiLauncher;
pub(crate) use engine::EngineLauncher;
pub(crate) use frontend::FrontendLauncher;
pub(crate) use remote::RemoteEngineLauncher;

/// A prepared service: the command to start and where its output goes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Ready {
    pub(crate) spec: CommandSpec,
    pub(crate) output: OutputPlan,
}

pub(crate) trait ServiceLauncher {
    fn service(&self) -> ServiceName;

    /// Verifies the environment and runs the service's dependency steps.
    fn prepare(&self, host: &dyn ProcessHost, intent: &Intent) -> Result<Ready, LifecycleError>;

    /// Final checks immediately before spawning.
    fn verify(&self, _ready: &Ready) -> Result<(), LifecycleError> {
        Ok(())
    }

    fn launch(
        &self,
        host: &dyn ProcessHost,
        ready: &Ready,
        forwarding: Forwarding,
    ) -> Result<SpawnedProcess, LifecycleError> {
        self.verify(ready)?;
        let service = self.service();
        let process = host
            .spawn(&ready.spec, &ready.output, forwarding)
            .map_err(|source| LifecycleError::LaunchService {
                service,
                program: ready.spec.to_string(),
                source,
            })?;
        info!(
            target: LIFECYCLE_TARGET,
            %service,
            pid = process.pid,
            command = %ready.spec,
            ?forwarding,
            "service launched"
        );
        Ok(process)
    }
}

pub(crate) fn require_dir(
    path: &Path,
    what: &'static str,
    hint: &'static str,
) -> Result<(), LifecycleError> {
    if path.is_dir() {
        Ok(())
    } else {
        Err(missing(path, what, hint))
    }
}

pub(crate) fn require_file(
    path: &Path,
    what: &'static str,
    hint: &'static str,
) -> Result<(), LifecycleError> {
    if path.is_file() {
        Ok(())
    } else {
        Err(missing(path, what, hint))
    }
}

pub(crate) fn require_executable(
    path: &Path,
    what: &'static str,
    hint: &'static str,
) -> Result<(), LifecycleError> {
    let executable = path
        .metadata()
        .map(|metadata| metadata.is_file() && metadata.permissions().mode() & 0o111 != 0)
        .unwrap_or(false);
    if executable {
        Ok(())
    } else {
        Err(missing(path, what, hint))
    }
}

fn missing(path: &Path, what: &'static str, hint: &'static str) -> LifecycleError {
    LifecycleError::EnvironmentMissing {
        what,
        path: path.to_path_buf(),
        hint,
    }
}

/// Runs a one-shot dependency step; any non-zero status is fatal.
pub(crate) fn run_step(
    host: &dyn ProcessHost,
    step: &'static str,
    spec: &CommandSpec,
) -> Result<(), LifecycleError> {
    info!(target: LIFECYCLE_TARGET, step, command = %spec, "running dependency step");
    match host.run(spec) {
        Ok(0) => Ok(()),
        Ok(status) => Err(LifecycleError::DependencyFailure {
            step,
            detail: format!("'{spec}' exited with status {status}"),
        }),
        Err(error) => Err(LifecycleError::DependencyFailure {
            step,
            detail: format!("could not run '{spec}': {error}"),
        }),
    }
}

/// Splits a configured command line into program and arguments.
pub(crate) fn split_command(
    command: &str,
    what: &'static str,
) -> Result<(String, Vec<String>), LifecycleError> {
    let mut words = command.split_whitespace().map(str::to_owned);
    let program = words
        .next()
        .ok_or(LifecycleError::InvalidCommand { what })?;
    Ok((program, words.collect()))
}
