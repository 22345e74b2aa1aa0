//! CLI entrypoint for the GoTrade developer orchestration tool.
//!
//! The binary delegates to [`gotrade_cli::run`], which loads configuration,
//! resolves the requested operation, and drives the service orchestrator.

use std::io;
use std::process::ExitCode;

fn main() -> ExitCode {
    // Output forwarding threads share stdout, so the handles stay unlocked.
    let mut stdout = io::stdout();
    let mut stderr = io::stderr();
    gotrade_cli::run(std::env::args_os(), &mut stdout, &mut stderr)
}
