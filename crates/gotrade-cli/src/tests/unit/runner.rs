use std::process::ExitCode;

use gotrade_config::Config;
use rstest::rstest;

use crate::intent::{Intent, Operation};
use crate::tests::support::{StaticConfigLoader, build_args};
use crate::{IoStreams, exit_code_from_status, run_with_handler};

struct Captured {
    exit: ExitCode,
    stdout: String,
    stderr: String,
    intents: Vec<Intent>,
}

fn run_cli(command: &str, config: Config) -> Captured {
    let mut stdout = Vec::new();
    let mut stderr = Vec::new();
    let mut intents = Vec::new();
    let loader = StaticConfigLoader::new(config);
    let exit = {
        let mut io = IoStreams::with_terminal_status(&mut stdout, &mut stderr, false);
        run_with_handler(build_args(command), &mut io, &loader, |intent, _, output| {
            output.stdout_line(format_args!("handled {:?}", intent.operation))?;
            intents.push(intent);
            Ok(ExitCode::SUCCESS)
        })
    };
    Captured {
        exit,
        stdout: String::from_utf8(stdout).expect("stdout utf8"),
        stderr: String::from_utf8(stderr).expect("stderr utf8"),
        intents,
    }
}

#[test]
fn help_is_printed_to_stderr_with_failure() {
    let captured = run_cli("-h", Config::default());
    assert_eq!(captured.exit, ExitCode::FAILURE);
    assert!(captured.stderr.contains("Usage:"));
    assert!(captured.stderr.contains("--run-oems"));
    assert!(captured.intents.is_empty());
}

#[test]
fn missing_operation_fails_without_running_anything() {
    let captured = run_cli("-f -c", Config::default());
    assert_eq!(captured.exit, ExitCode::FAILURE);
    assert!(
        captured
            .stderr
            .contains("an operation flag must be provided")
    );
    assert!(captured.intents.is_empty());
}

#[test]
fn conflicting_operations_are_rejected() {
    let captured = run_cli("-up -down", Config::default());
    assert_eq!(captured.exit, ExitCode::FAILURE);
    assert!(captured.stderr.contains("cannot be used with"));
    assert!(captured.intents.is_empty());
}

#[test]
fn configuration_flags_do_not_reach_the_command_parser() {
    let captured = run_cli(
        "--stop-grace-ms 10 -down --log-format json",
        Config::default(),
    );
    assert_eq!(captured.exit, ExitCode::SUCCESS);
    assert_eq!(captured.stdout, "handled Stop\n");
    assert_eq!(captured.intents.len(), 1);
    assert_eq!(captured.intents[0].operation, Operation::Stop);
}

#[test]
fn handler_errors_are_printed_with_failure() {
    let mut stdout = Vec::new();
    let mut stderr = Vec::new();
    let loader = StaticConfigLoader::new(Config::default());
    let exit = {
        let mut io = IoStreams::with_terminal_status(&mut stdout, &mut stderr, false);
        run_with_handler(build_args("-up -rd -g"), &mut io, &loader, |intent, _, _| {
            intent.validate()?;
            Ok(ExitCode::SUCCESS)
        })
    };
    let stderr = String::from_utf8(stderr).expect("stderr utf8");
    assert_eq!(exit, ExitCode::FAILURE);
    assert!(stderr.starts_with("invalid request: --build-gq cannot be combined"));
}

#[rstest]
#[case(0, ExitCode::SUCCESS)]
#[case(7, ExitCode::from(7))]
#[case(143, ExitCode::from(143))]
#[case(-1, ExitCode::FAILURE)]
#[case(300, ExitCode::FAILURE)]
fn service_status_maps_to_exit_code(#[case] status: i32, #[case] expected: ExitCode) {
    assert_eq!(exit_code_from_status(status), expected);
}
