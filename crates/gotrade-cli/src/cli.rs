//! CLI argument definitions for the GoTrade orchestration tool.
//!
//! Operations are mutually exclusive flags; dev-mode selection and the build
//! and log toggles are modifiers. The historical interface used multi-letter
//! single-dash forms such as `-up` and `-loem1`, which clap cannot express as
//! short flags, so [`normalise_legacy_flags`] rewrites them to their long
//! spellings before parsing.

use std::ffi::OsString;

use clap::{ArgGroup, Parser, Subcommand};

use crate::multiplexer::StreamLabel;

/// Legacy single-dash spellings and the long flag each one stands for.
const LEGACY_FLAGS: &[(&str, &str)] = &[
    ("-i", "--init"),
    ("-a", "--auth"),
    ("-sg", "--setup-gotrade"),
    ("-up", "--start"),
    ("-down", "--stop"),
    ("-r", "--run-oems"),
    ("-rd", "--remote-dev"),
    ("-s", "--standard-dev"),
    ("-f", "--full-stack"),
    ("-c", "--compile-oems"),
    ("-g", "--build-gq"),
    ("-w", "--reset"),
    ("-bf", "--build-frontend"),
    ("-loem1", "--log-oems1"),
    ("-loem2", "--log-oems2"),
    ("-lapi", "--log-fastapi"),
    ("-lui", "--log-frontend"),
    ("-h", "--help"),
];

/// Command-line interface for the GoTrade orchestration tool.
#[derive(Parser, Debug)]
#[command(
    name = "gotrade",
    about = "Starts, stops, and sequences the GoTrade development services",
    disable_help_subcommand = true,
    args_conflicts_with_subcommands = true,
    group(
        ArgGroup::new("operation")
            .args(["init", "auth", "setup_gotrade", "start", "stop", "run_oems"])
    ),
    group(
        ArgGroup::new("dev_mode")
            .args(["remote_dev", "standard_dev", "full_stack"])
    )
)]
pub(crate) struct Cli {
    /// Installs dependencies for every service checkout (-i).
    #[arg(long, help_heading = "Operations")]
    pub(crate) init: bool,
    /// Generates the SSH key used for repository access (-a).
    #[arg(long, help_heading = "Operations")]
    pub(crate) auth: bool,
    /// Bootstraps the GoTrade environment (-sg).
    #[arg(long, help_heading = "Operations")]
    pub(crate) setup_gotrade: bool,
    /// Starts the services for the selected dev mode (-up).
    #[arg(long, help_heading = "Operations")]
    pub(crate) start: bool,
    /// Stops every service and container started by this tool (-down).
    #[arg(long, help_heading = "Operations")]
    pub(crate) stop: bool,
    /// Runs only the engine, attached to this terminal (-r).
    #[arg(long, help_heading = "Operations")]
    pub(crate) run_oems: bool,

    /// Runs the engine against the remote environment (-rd).
    #[arg(long, help_heading = "Dev mode")]
    pub(crate) remote_dev: bool,
    /// Runs the engine locally on its own (-s).
    #[arg(long, help_heading = "Dev mode")]
    pub(crate) standard_dev: bool,
    /// Runs engine, API, and frontend in the background (-f).
    #[arg(long, help_heading = "Dev mode")]
    pub(crate) full_stack: bool,

    /// Compiles the engine before launching it (-c).
    #[arg(long, help_heading = "Build toggles")]
    pub(crate) compile_oems: bool,
    /// Builds the shared Python packages before launching the API (-g).
    #[arg(long, help_heading = "Build toggles")]
    pub(crate) build_gq: bool,
    /// Wipes the database volumes before starting the containers (-w).
    #[arg(long, help_heading = "Build toggles")]
    pub(crate) reset: bool,
    /// Builds the frontend bundle before serving it (-bf).
    #[arg(long, help_heading = "Build toggles")]
    pub(crate) build_frontend: bool,

    /// Streams the engine's standard output (-loem1).
    #[arg(long, help_heading = "Log toggles")]
    pub(crate) log_oems1: bool,
    /// Streams the engine's standard error (-loem2).
    #[arg(long, help_heading = "Log toggles")]
    pub(crate) log_oems2: bool,
    /// Streams the API output (-lapi).
    #[arg(long, help_heading = "Log toggles")]
    pub(crate) log_fastapi: bool,
    /// Streams the frontend output (-lui).
    #[arg(long, help_heading = "Log toggles")]
    pub(crate) log_frontend: bool,

    /// Structured subcommands (for example `clone`).
    #[command(subcommand)]
    pub(crate) command: Option<CliCommand>,
}

/// Structured subcommands for the GoTrade CLI.
#[derive(Subcommand, Debug, Clone)]
pub(crate) enum CliCommand {
    /// Clones service repositories; every service checkout when none are named.
    Clone {
        /// Repository names under the configured remote.
        #[arg(value_name = "REPO")]
        repositories: Vec<String>,
    },
    /// Tags standard input with a service label and writes it to standard output.
    #[command(name = "tag-output", hide = true)]
    TagOutput {
        /// Label printed in front of every line.
        #[arg(value_enum)]
        label: StreamLabel,
    },
}

/// Rewrites legacy single-dash flags to their long spellings.
///
/// The program name in `args[0]` is preserved untouched.
pub(crate) fn normalise_legacy_flags(args: Vec<OsString>) -> Vec<OsString> {
    let mut arguments = args.into_iter();
    let mut normalised: Vec<OsString> = arguments.next().into_iter().collect();
    normalised.extend(arguments.map(|argument| {
        argument
            .to_str()
            .and_then(|text| {
                LEGACY_FLAGS
                    .iter()
                    .find(|(legacy, _)| *legacy == text)
                    .map(|(_, long)| OsString::from(*long))
            })
            .unwrap_or(argument)
    }));
    normalised
}
