//! High-level orchestration for service lifecycle commands.
//!
//! This module wires the start and stop flows together: it resolves the
//! topology for a start, sequences the launchers, persists the PID registry
//! for detached services, and attaches to foreground services until they exit
//! or a termination signal arrives.

use std::io::Write;
use std::process::ExitCode;
use std::slice;

use gotrade_config::{Config, WorkspacePaths};
use tracing::{info, warn};

use super::error::LifecycleError;
use super::foreground::{self, AttachOutcome};
use super::shutdown::{ShutdownGuard, ShutdownSignal};
use super::state::{LifecycleState, StateTracker};
use super::teardown::{self, TeardownPlan, TeardownReport};
use super::types::{LifecycleOutput, ServiceHandle, ServiceName};
use super::LIFECYCLE_TARGET;
use crate::exit_code_from_status;
use crate::host::{Forwarding, ProcessHost, SpawnedProcess};
use crate::intent::{Intent, Operation, Topology};
use crate::launchers::{
    ApiLauncher, EngineLauncher, FrontendLauncher, RemoteEngineLauncher, ServiceLauncher,
};
use crate::registry::PidRegistry;

/// Drives the start and stop flows against a [`ProcessHost`].
pub(crate) struct Orchestrator<'a, H: ProcessHost, S: ShutdownSignal> {
    host: &'a H,
    signals: &'a S,
    config: &'a Config,
    paths: &'a WorkspacePaths,
    registry: PidRegistry,
    state: StateTracker,
    shutdown: ShutdownGuard,
}

impl<'a, H: ProcessHost, S: ShutdownSignal> Orchestrator<'a, H, S> {
    pub(crate) fn new(
        host: &'a H,
        signals: &'a S,
        config: &'a Config,
        paths: &'a WorkspacePaths,
    ) -> Self {
        Self {
            host,
            signals,
            config,
            paths,
            registry: PidRegistry::new(paths.pid_registry()),
            state: StateTracker::new(),
            shutdown: ShutdownGuard::default(),
        }
    }

    #[cfg(test)]
    pub(crate) fn state(&self) -> LifecycleState {
        self.state.current()
    }

    pub(crate) fn handle<W: Write, E: Write>(
        &mut self,
        intent: &Intent,
        output: &mut LifecycleOutput<W, E>,
    ) -> Result<ExitCode, LifecycleError> {
        match &intent.operation {
            Operation::Start | Operation::RunEngine => self.start(intent, output),
            Operation::Stop => self.stop(output),
            other => Err(LifecycleError::PolicyViolation {
                reason: format!("{other:?} is not a service lifecycle operation"),
            }),
        }
    }

    fn start<W: Write, E: Write>(
        &mut self,
        intent: &Intent,
        output: &mut LifecycleOutput<W, E>,
    ) -> Result<ExitCode, LifecycleError> {
        self.state.advance(LifecycleState::Validating);
        let result = intent.validate().and_then(|()| match intent.topology() {
            Topology::SingleService => {
                let launcher = EngineLauncher::new(self.paths);
                self.run_foreground(&launcher, intent, output)
            }
            Topology::Remote => {
                let launcher = RemoteEngineLauncher::new(self.paths);
                self.run_foreground(&launcher, intent, output)
            }
            Topology::FullStack => self.start_full_stack(intent, output),
        });
        if result.is_err() {
            self.state.advance(LifecycleState::Failed);
        }
        result
    }

    fn run_foreground<W: Write, E: Write>(
        &mut self,
        launcher: &dyn ServiceLauncher,
        intent: &Intent,
        output: &mut LifecycleOutput<W, E>,
    ) -> Result<ExitCode, LifecycleError> {
        let service = launcher.service();
        self.state.advance(LifecycleState::Launching { step: 1, of: 1 });
        let ready = launcher.prepare(self.host, intent)?;
        let listener = self.signals.install()?;
        let mut process = launcher.launch(self.host, &ready, Forwarding::Attached)?;
        self.state.advance(LifecycleState::Running);
        output.stderr_note(format_args!(
            "{service} running in the foreground (pid {}); press Ctrl-C to stop",
            process.pid
        ));

        let outcome = match foreground::attach(self.host, &mut process, &listener) {
            Ok(outcome) => outcome,
            Err(error) => {
                drop(listener);
                self.abandon_attached(process);
                return Err(error);
            }
        };
        drop(listener);
        match outcome {
            AttachOutcome::Exited(status) => {
                process.finish();
                self.state.advance(LifecycleState::Stopped);
                output.stderr_note(format_args!("{service} exited with status {status}"));
                Ok(exit_code_from_status(status))
            }
            AttachOutcome::Interrupted(signal) => {
                Ok(self.shutdown_after_signal(signal, process, output))
            }
        }
    }

    /// Stops an attached service the orchestrator can no longer monitor.
    fn abandon_attached(&self, mut process: SpawnedProcess) {
        let plan = TeardownPlan::from_config(self.config, self.paths);
        let mut report = TeardownReport::default();
        teardown::terminate_owned(
            self.host,
            slice::from_mut(&mut process),
            plan.grace(),
            &mut report,
        );
        warn!(
            target: LIFECYCLE_TARGET,
            pid = process.pid,
            failures = report.failures(),
            "stopped attached service after losing track of it"
        );
    }

    fn shutdown_after_signal<W: Write, E: Write>(
        &mut self,
        signal: i32,
        mut process: SpawnedProcess,
        output: &mut LifecycleOutput<W, E>,
    ) -> ExitCode {
        if !self.shutdown.try_begin() {
            return ExitCode::SUCCESS;
        }
        self.state.advance(LifecycleState::Stopping);
        output.stderr_note(format_args!("received signal {signal}; stopping services"));
        let plan = TeardownPlan::from_config(self.config, self.paths);
        let mut report = TeardownReport::default();
        teardown::terminate_owned(
            self.host,
            slice::from_mut(&mut process),
            plan.grace(),
            &mut report,
        );
        teardown::run(self.host, &self.registry, &plan, &mut report);
        self.finish_stop(&report, output);
        ExitCode::SUCCESS
    }

    fn start_full_stack<W: Write, E: Write>(
        &mut self,
        intent: &Intent,
        output: &mut LifecycleOutput<W, E>,
    ) -> Result<ExitCode, LifecycleError> {
        self.ensure_not_running()?;
        let engine = EngineLauncher::new(self.paths);
        let api = ApiLauncher::new(self.config, self.paths);
        let frontend = FrontendLauncher::new(self.config, self.paths);
        let launchers: [&dyn ServiceLauncher; 3] = [&engine, &api, &frontend];

        let total = launchers.len();
        let mut handles = Vec::with_capacity(total);
        for (index, launcher) in launchers.into_iter().enumerate() {
            self.state.advance(LifecycleState::Launching {
                step: index + 1,
                of: total,
            });
            let service = launcher.service();
            let ready = launcher.prepare(self.host, intent)?;
            let mut process = launcher.launch(self.host, &ready, Forwarding::Detached)?;
            self.await_liveness(service, &mut process)?;
            output.stdout_note(format_args!("{service} started (pid {})", process.pid));
            handles.push(ServiceHandle::new(service, process.pid));
        }

        self.registry.write(handles)?;
        self.state.advance(LifecycleState::Running);
        output.stdout_note(format_args!(
            "GoTrade full stack running; PIDs recorded in {}. Stop it with --stop.",
            self.registry.path().display()
        ));
        Ok(ExitCode::SUCCESS)
    }

    /// Waits the readiness delay, then requires the service to still be running.
    fn await_liveness(
        &self,
        service: ServiceName,
        process: &mut SpawnedProcess,
    ) -> Result<(), LifecycleError> {
        let delay = self.config.readiness_delay();
        self.host.sleep(delay);
        let status = self
            .host
            .try_wait(process)
            .map_err(|source| LifecycleError::Monitor { source })?;
        match status {
            None => {
                info!(target: LIFECYCLE_TARGET, %service, pid = process.pid, "service alive");
                Ok(())
            }
            Some(status) => Err(LifecycleError::LivenessFailure {
                service,
                pid: process.pid,
                status,
                waited_ms: delay.as_millis(),
            }),
        }
    }

    fn ensure_not_running(&self) -> Result<(), LifecycleError> {
        match self.registry.read() {
            Ok(pids) => {
                if let Some(pid) = pids.into_iter().find(|pid| self.host.is_alive(*pid)) {
                    return Err(LifecycleError::AlreadyRunning {
                        pid,
                        path: self.registry.path().to_path_buf(),
                    });
                }
                if self.registry.exists() {
                    warn!(
                        target: LIFECYCLE_TARGET,
                        file = %self.registry.path().display(),
                        "replacing stale PID registry"
                    );
                }
            }
            Err(error) => {
                warn!(target: LIFECYCLE_TARGET, %error, "replacing unreadable PID registry");
            }
        }
        Ok(())
    }

    fn stop<W: Write, E: Write>(
        &mut self,
        output: &mut LifecycleOutput<W, E>,
    ) -> Result<ExitCode, LifecycleError> {
        self.state.advance(LifecycleState::Stopping);
        let plan = TeardownPlan::from_config(self.config, self.paths);
        let mut report = TeardownReport::default();
        teardown::run(self.host, &self.registry, &plan, &mut report);
        self.finish_stop(&report, output);
        Ok(ExitCode::SUCCESS)
    }

    /// Reports the teardown steps. Output failures never fail a stop.
    fn finish_stop<W: Write, E: Write>(
        &mut self,
        report: &TeardownReport,
        output: &mut LifecycleOutput<W, E>,
    ) {
        self.state.advance(LifecycleState::Stopped);
        for step in report.steps() {
            output.stdout_note(format_args!("  {step}"));
        }
        match report.failures() {
            0 => output.stdout_note(format_args!("GoTrade services stopped")),
            failed => output.stdout_note(format_args!(
                "GoTrade services stopped; {failed} step(s) failed, see above"
            )),
        }
    }
}
