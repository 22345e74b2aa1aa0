//! Resolution of parsed flags into an immutable [`Intent`].

use crate::cli::{Cli, CliCommand};
use crate::errors::AppError;
use crate::lifecycle::LifecycleError;
use crate::multiplexer::StreamLabel;

/// The single operation requested by an invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Operation {
    Init,
    Auth,
    SetupGotrade,
    Start,
    Stop,
    RunEngine,
    Clone { repositories: Vec<String> },
}

/// Dev mode modifier; `Standard` unless another mode is requested.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub(crate) enum DevMode {
    #[default]
    Standard,
    FullStack,
    Remote,
}

/// Which services run and how the CLI waits for them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Topology {
    SingleService,
    FullStack,
    Remote,
}

/// Preparation steps requested alongside a start.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub(crate) struct BuildToggles {
    pub(crate) compile: bool,
    pub(crate) build_packages: bool,
    pub(crate) reset: bool,
    pub(crate) build_frontend: bool,
}

/// Output streams the user asked to see.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub(crate) struct LogToggles {
    pub(crate) engine1: bool,
    pub(crate) engine2: bool,
    pub(crate) api: bool,
    pub(crate) frontend: bool,
}

/// Everything an invocation asked for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Intent {
    pub(crate) operation: Operation,
    pub(crate) dev_mode: DevMode,
    pub(crate) builds: BuildToggles,
    pub(crate) logs: LogToggles,
}

impl Intent {
    #[cfg(test)]
    pub(crate) fn new(operation: Operation) -> Self {
        Self {
            operation,
            dev_mode: DevMode::default(),
            builds: BuildToggles::default(),
            logs: LogToggles::default(),
        }
    }

    /// Rejects combinations that cannot be honoured.
    pub(crate) fn validate(&self) -> Result<(), LifecycleError> {
        if self.dev_mode == DevMode::Remote && self.builds.build_packages {
            return Err(LifecycleError::PolicyViolation {
                reason: String::from(
                    "--build-gq cannot be combined with --remote-dev; the remote environment \
                     provides its own packages",
                ),
            });
        }
        Ok(())
    }

    pub(crate) fn topology(&self) -> Topology {
        match (&self.operation, self.dev_mode) {
            (_, DevMode::Remote) => Topology::Remote,
            (Operation::Start, DevMode::FullStack) => Topology::FullStack,
            _ => Topology::SingleService,
        }
    }
}

/// What the binary should do with a parsed command line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Invocation {
    /// Internal output filter used by detached services.
    TagOutput(StreamLabel),
    Orchestrate(Intent),
}

impl TryFrom<Cli> for Invocation {
    type Error = AppError;

    fn try_from(cli: Cli) -> Result<Self, Self::Error> {
        let operation = match cli.command {
            Some(CliCommand::TagOutput { label }) => return Ok(Self::TagOutput(label)),
            Some(CliCommand::Clone { repositories }) => Operation::Clone { repositories },
            None => operation_from_flags(&cli).ok_or(AppError::MissingOperation)?,
        };
        let dev_mode = if cli.remote_dev {
            DevMode::Remote
        } else if cli.full_stack {
            DevMode::FullStack
        } else {
            DevMode::Standard
        };
        Ok(Self::Orchestrate(Intent {
            operation,
            dev_mode,
            builds: BuildToggles {
                compile: cli.compile_oems,
                build_packages: cli.build_gq,
                reset: cli.reset,
                build_frontend: cli.build_frontend,
            },
            logs: LogToggles {
                engine1: cli.log_oems1,
                engine2: cli.log_oems2,
                api: cli.log_fastapi,
                frontend: cli.log_frontend,
            },
        }))
    }
}

fn operation_from_flags(cli: &Cli) -> Option<Operation> {
    [
        (cli.init, Operation::Init),
        (cli.auth, Operation::Auth),
        (cli.setup_gotrade, Operation::SetupGotrade),
        (cli.start, Operation::Start),
        (cli.stop, Operation::Stop),
        (cli.run_oems, Operation::RunEngine),
    ]
    .into_iter()
    .find_map(|(requested, operation)| requested.then_some(operation))
}
