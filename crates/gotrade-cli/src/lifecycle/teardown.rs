//! Stop sequence shared by `--stop` and signal-driven shutdown.
//!
//! Teardown never fails as a whole: every step is attempted and its outcome is
//! recorded in a [`TeardownReport`]. Steps run in a fixed order: read the PID
//! registry, terminate recorded processes (SIGTERM, one grace interval, then
//! SIGKILL), kill stray processes by command line, bring container groups
//! down, and finally remove the registry.

use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

use gotrade_config::{Config, WorkspacePaths};
use tracing::{info, warn};

use super::{LIFECYCLE_TARGET, ServiceName};
use crate::host::{CommandSpec, ProcessHost, ProcessSignal, SpawnedProcess, is_no_such_process};
use crate::registry::PidRegistry;

/// Container groups brought down by teardown.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ContainerGroup {
    Api,
    Database,
}

impl fmt::Display for ContainerGroup {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Api => formatter.write_str("api"),
            Self::Database => formatter.write_str("database"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum TeardownAction {
    ReadRegistry,
    Terminate { pid: u32 },
    ForceKill { pid: u32 },
    KillMatching { service: ServiceName },
    ComposeDown { group: ContainerGroup },
    ClearRegistry,
}

impl fmt::Display for TeardownAction {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ReadRegistry => formatter.write_str("read PID registry"),
            Self::Terminate { pid } => write!(formatter, "terminate pid {pid}"),
            Self::ForceKill { pid } => write!(formatter, "force-kill pid {pid}"),
            Self::KillMatching { service } => write!(formatter, "kill stray {service} processes"),
            Self::ComposeDown { group } => write!(formatter, "bring down {group} containers"),
            Self::ClearRegistry => formatter.write_str("remove PID registry"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum StepOutcome {
    Done,
    Skipped(String),
    Failed(String),
}

impl StepOutcome {
    fn skipped(reason: &str) -> Self {
        Self::Skipped(reason.to_owned())
    }
}

impl fmt::Display for StepOutcome {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Done => formatter.write_str("done"),
            Self::Skipped(reason) => write!(formatter, "skipped ({reason})"),
            Self::Failed(message) => write!(formatter, "failed: {message}"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct TeardownStep {
    pub(crate) action: TeardownAction,
    pub(crate) outcome: StepOutcome,
}

impl fmt::Display for TeardownStep {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(formatter, "{}: {}", self.action, self.outcome)
    }
}

/// Ordered record of every teardown step.
#[derive(Debug, Default)]
pub(crate) struct TeardownReport {
    steps: Vec<TeardownStep>,
}

impl TeardownReport {
    pub(crate) fn record(&mut self, action: TeardownAction, outcome: StepOutcome) {
        match &outcome {
            StepOutcome::Failed(message) => {
                warn!(target: LIFECYCLE_TARGET, %action, %message, "teardown step failed");
            }
            outcome => info!(target: LIFECYCLE_TARGET, %action, %outcome, "teardown step"),
        }
        self.steps.push(TeardownStep { action, outcome });
    }

    pub(crate) fn steps(&self) -> &[TeardownStep] {
        &self.steps
    }

    pub(crate) fn failures(&self) -> usize {
        self.steps
            .iter()
            .filter(|step| matches!(step.outcome, StepOutcome::Failed(_)))
            .count()
    }

    #[cfg(test)]
    pub(crate) fn outcome_of(&self, action: TeardownAction) -> Option<&StepOutcome> {
        self.steps
            .iter()
            .find(|step| step.action == action)
            .map(|step| &step.outcome)
    }
}

/// What teardown acts on beyond the registry.
#[derive(Debug, Clone)]
pub(crate) struct TeardownPlan {
    grace: Duration,
    process_patterns: Vec<(ServiceName, String)>,
    container_groups: Vec<(ContainerGroup, PathBuf)>,
}

impl TeardownPlan {
    pub(crate) fn from_config(config: &Config, paths: &WorkspacePaths) -> Self {
        Self {
            grace: config.stop_grace(),
            process_patterns: vec![
                (ServiceName::Engine, config.engine_process_pattern.clone()),
                (ServiceName::Api, config.api_process_pattern.clone()),
                (ServiceName::Frontend, config.frontend_process_pattern.clone()),
            ],
            container_groups: vec![
                (ContainerGroup::Api, paths.api_compose_file().to_path_buf()),
                (
                    ContainerGroup::Database,
                    paths.database_compose_file().to_path_buf(),
                ),
            ],
        }
    }

    pub(crate) const fn grace(&self) -> Duration {
        self.grace
    }
}

/// Runs the full stop sequence, appending every step to `report`.
pub(crate) fn run(
    host: &dyn ProcessHost,
    registry: &PidRegistry,
    plan: &TeardownPlan,
    report: &mut TeardownReport,
) {
    let had_registry = registry.exists();
    let pids = match registry.read() {
        Ok(pids) if had_registry => {
            report.record(TeardownAction::ReadRegistry, StepOutcome::Done);
            pids
        }
        Ok(pids) => {
            report.record(
                TeardownAction::ReadRegistry,
                StepOutcome::skipped("no registry present"),
            );
            pids
        }
        Err(error) => {
            report.record(
                TeardownAction::ReadRegistry,
                StepOutcome::Failed(error.to_string()),
            );
            Vec::new()
        }
    };

    terminate_pids(host, &pids, plan.grace, report);

    for (service, pattern) in &plan.process_patterns {
        let outcome = match host.kill_matching(pattern) {
            Ok(true) => StepOutcome::Done,
            Ok(false) => StepOutcome::skipped("no matching processes"),
            Err(error) => StepOutcome::Failed(error.to_string()),
        };
        report.record(TeardownAction::KillMatching { service: *service }, outcome);
    }

    for (group, compose_file) in &plan.container_groups {
        let outcome = if compose_file.is_file() {
            match host.run(&CommandSpec::compose(compose_file, &["down"])) {
                Ok(0) => StepOutcome::Done,
                Ok(status) => {
                    StepOutcome::Failed(format!("docker compose exited with status {status}"))
                }
                Err(error) => StepOutcome::Failed(error.to_string()),
            }
        } else {
            StepOutcome::skipped("compose file not found")
        };
        report.record(TeardownAction::ComposeDown { group: *group }, outcome);
    }

    let outcome = match registry.clear() {
        Ok(()) if had_registry => StepOutcome::Done,
        Ok(()) => StepOutcome::skipped("nothing to remove"),
        Err(error) => StepOutcome::Failed(error.to_string()),
    };
    report.record(TeardownAction::ClearRegistry, outcome);
}

/// Terminates processes known only by PID.
pub(crate) fn terminate_pids(
    host: &dyn ProcessHost,
    pids: &[u32],
    grace: Duration,
    report: &mut TeardownReport,
) {
    let mut targets = pids.to_vec();
    escalate(host, &mut targets, grace, report, |pid| {
        (*pid, host.is_alive(*pid))
    });
}

/// Terminates processes this invocation spawned, reaping them as they exit.
pub(crate) fn terminate_owned(
    host: &dyn ProcessHost,
    processes: &mut [SpawnedProcess],
    grace: Duration,
    report: &mut TeardownReport,
) {
    escalate(host, processes, grace, report, |process| {
        let running = !matches!(host.try_wait(process), Ok(Some(_)));
        (process.pid, running)
    });
}

fn escalate<T>(
    host: &dyn ProcessHost,
    targets: &mut [T],
    grace: Duration,
    report: &mut TeardownReport,
    mut probe: impl FnMut(&mut T) -> (u32, bool),
) {
    let mut signalled = Vec::new();
    for (index, target) in targets.iter_mut().enumerate() {
        let (pid, running) = probe(target);
        let action = TeardownAction::Terminate { pid };
        if !running {
            report.record(action, StepOutcome::skipped("not running"));
            continue;
        }
        match host.signal(pid, ProcessSignal::Terminate) {
            Ok(()) => signalled.push(index),
            Err(error) if is_no_such_process(&error) => {
                report.record(action, StepOutcome::skipped("not running"));
            }
            Err(error) => report.record(action, StepOutcome::Failed(error.to_string())),
        }
    }
    if signalled.is_empty() {
        return;
    }

    host.sleep(grace);

    for index in signalled {
        let Some(target) = targets.get_mut(index) else {
            continue;
        };
        let (pid, running) = probe(target);
        if !running {
            report.record(TeardownAction::Terminate { pid }, StepOutcome::Done);
            continue;
        }
        let outcome = match host.signal(pid, ProcessSignal::Kill) {
            Ok(()) => StepOutcome::Done,
            Err(error) if is_no_such_process(&error) => StepOutcome::Done,
            Err(error) => StepOutcome::Failed(error.to_string()),
        };
        report.record(TeardownAction::ForceKill { pid }, outcome);
    }
}
