//! Command-line runtime for the GoTrade developer orchestration tool.
//!
//! The module owns argument parsing, configuration bootstrapping, and the
//! hand-off to the service orchestrator or the one-shot setup operations. The
//! runtime is designed to be exercised both from the binary entrypoint and
//! from tests where configuration loading and IO streams can be substituted.

use std::ffi::OsString;
use std::io::{self, IsTerminal, Write};
use std::process::ExitCode;

use clap::Parser;
use gotrade_config::{Config, WorkspacePaths};

mod cli;
mod collaborators;
mod config;
mod errors;
mod host;
mod intent;
mod launchers;
mod lifecycle;
mod multiplexer;
mod registry;
mod telemetry;

use cli::{Cli, normalise_legacy_flags};
use collaborators::Collaborators;
use config::split_config_arguments;
pub(crate) use config::{ConfigLoader, OrthoConfigLoader};
pub(crate) use errors::AppError;
use host::SystemProcessHost;
use intent::{Intent, Invocation, Operation};
use lifecycle::{LifecycleOutput, Orchestrator, SystemShutdownSignal};
use multiplexer::{LineTagger, StreamLabel};

/// Bundles the IO streams provided to the CLI runtime.
///
/// Commands receive a short-lived [`LifecycleOutput`] wrapper that borrows
/// these streams so helpers can flush individual messages without threading
/// the runtime through every call.
pub(crate) struct IoStreams<'a, W: Write, E: Write> {
    pub(crate) stdout: &'a mut W,
    pub(crate) stderr: &'a mut E,
    stdout_is_terminal: bool,
}

impl<'a, W: Write, E: Write> IoStreams<'a, W, E> {
    pub(crate) fn new(stdout: &'a mut W, stderr: &'a mut E) -> Self {
        Self {
            stdout,
            stderr,
            stdout_is_terminal: io::stdout().is_terminal(),
        }
    }

    #[cfg(test)]
    pub(crate) fn with_terminal_status(
        stdout: &'a mut W,
        stderr: &'a mut E,
        stdout_is_terminal: bool,
    ) -> Self {
        Self {
            stdout,
            stderr,
            stdout_is_terminal,
        }
    }

    pub(crate) const fn stdout_is_terminal(&self) -> bool {
        self.stdout_is_terminal
    }
}

struct CliRunner<'a, W: Write, E: Write, L: ConfigLoader> {
    io: &'a mut IoStreams<'a, W, E>,
    loader: &'a L,
}

impl<'a, W, E, L> CliRunner<'a, W, E, L>
where
    W: Write,
    E: Write,
    L: ConfigLoader,
{
    fn new(io: &'a mut IoStreams<'a, W, E>, loader: &'a L) -> Self {
        Self { io, loader }
    }

    fn run<I>(&mut self, args: I) -> ExitCode
    where
        I: IntoIterator<Item = OsString>,
    {
        let use_color = self.io.stdout_is_terminal();
        self.run_with_handler(args, |intent, config, output| {
            dispatch(intent, config, output, use_color)
        })
    }

    fn run_with_handler<I, F>(&mut self, args: I, mut handler: F) -> ExitCode
    where
        I: IntoIterator<Item = OsString>,
        F: FnMut(
            Intent,
            &Config,
            &mut LifecycleOutput<&mut W, &mut E>,
        ) -> Result<ExitCode, AppError>,
    {
        let args = normalise_legacy_flags(args.into_iter().collect());
        let split = split_config_arguments(&args);

        let result = Cli::try_parse_from(split.command_arguments.iter())
            .map_err(AppError::CliUsage)
            .and_then(Invocation::try_from)
            .and_then(|invocation| match invocation {
                Invocation::TagOutput(label) => forward_stdin(label, self.io),
                Invocation::Orchestrate(intent) => {
                    let config = self.loader.load(&split.config_arguments)?;
                    let mut output =
                        LifecycleOutput::new(&mut *self.io.stdout, &mut *self.io.stderr);
                    handler(intent, &config, &mut output)
                }
            });

        match result {
            Ok(exit_code) => exit_code,
            Err(error) => {
                let _ = writeln!(self.io.stderr, "{error}");
                ExitCode::FAILURE
            }
        }
    }
}

/// Runs the CLI using the provided arguments and IO handles.
#[must_use]
pub fn run<I, W, E>(args: I, stdout: &mut W, stderr: &mut E) -> ExitCode
where
    I: IntoIterator<Item = OsString>,
    W: Write,
    E: Write,
{
    let mut io = IoStreams::new(stdout, stderr);
    run_with_loader(args, &mut io, &OrthoConfigLoader)
}

/// Runs the CLI with a custom configuration loader.
#[must_use]
pub(crate) fn run_with_loader<'a, I, W, E, L>(
    args: I,
    io: &'a mut IoStreams<'a, W, E>,
    loader: &'a L,
) -> ExitCode
where
    I: IntoIterator<Item = OsString>,
    W: Write,
    E: Write,
    L: ConfigLoader,
{
    CliRunner::new(io, loader).run(args)
}

/// Runs the CLI with a custom configuration loader and command handler.
#[cfg(test)]
pub(crate) fn run_with_handler<'a, I, W, E, L, F>(
    args: I,
    io: &'a mut IoStreams<'a, W, E>,
    loader: &'a L,
    handler: F,
) -> ExitCode
where
    I: IntoIterator<Item = OsString>,
    W: Write,
    E: Write,
    L: ConfigLoader,
    F: FnMut(
        Intent,
        &Config,
        &mut LifecycleOutput<&mut W, &mut E>,
    ) -> Result<ExitCode, AppError>,
{
    CliRunner::new(io, loader).run_with_handler(args, handler)
}

fn dispatch<W: Write, E: Write>(
    intent: Intent,
    config: &Config,
    output: &mut LifecycleOutput<W, E>,
    use_color: bool,
) -> Result<ExitCode, AppError> {
    telemetry::initialise(config)?;
    let paths = WorkspacePaths::from_current_dir(config)?;
    let host = SystemProcessHost::new(use_color);
    match intent.operation {
        Operation::Start | Operation::Stop | Operation::RunEngine => {
            let signals = SystemShutdownSignal;
            let mut orchestrator = Orchestrator::new(&host, &signals, config, &paths);
            Ok(orchestrator.handle(&intent, output)?)
        }
        Operation::Init | Operation::Auth | Operation::SetupGotrade | Operation::Clone { .. } => {
            Ok(Collaborators::new(&host, config, &paths).run(&intent.operation, output)?)
        }
    }
}

/// Tags everything on stdin with `label`; the body of `tag-output`.
fn forward_stdin<W: Write, E: Write>(
    label: StreamLabel,
    streams: &mut IoStreams<'_, W, E>,
) -> Result<ExitCode, AppError> {
    let tagger = LineTagger::new(label, streams.stdout_is_terminal());
    let stdin = io::stdin();
    multiplexer::forward(stdin.lock(), &mut *streams.stdout, &tagger)
        .map_err(AppError::ForwardOutput)?;
    Ok(ExitCode::SUCCESS)
}

pub(crate) fn exit_code_from_status(status: i32) -> ExitCode {
    u8::try_from(status)
        .map(ExitCode::from)
        .unwrap_or(ExitCode::FAILURE)
}
