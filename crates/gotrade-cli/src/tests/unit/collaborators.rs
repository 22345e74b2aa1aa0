use std::fs;
use std::process::ExitCode;

use rstest::rstest;

use crate::collaborators::Collaborators;
use crate::intent::Operation;
use crate::lifecycle::{LifecycleError, LifecycleOutput};
use crate::tests::support::{FakeHost, TempWorkspace, workspace};

fn run_collaborator(
    workspace: &TempWorkspace,
    host: &FakeHost,
    operation: &Operation,
) -> (Result<ExitCode, LifecycleError>, String) {
    let mut stdout = Vec::new();
    let mut stderr = Vec::new();
    let result = {
        let mut output = LifecycleOutput::new(&mut stdout, &mut stderr);
        Collaborators::new(host, workspace.config(), workspace.paths()).run(operation, &mut output)
    };
    (result, String::from_utf8(stdout).expect("stdout utf8"))
}

#[rstest]
#[case(Operation::Init, "scripts/install_dependencies.sh", "dependency bootstrap completed")]
#[case(Operation::Auth, "scripts/generate_ssh_key.sh", "SSH key generation completed")]
#[case(Operation::SetupGotrade, "scripts/setup_gotrade.sh", "environment setup completed")]
fn setup_operations_run_their_script(
    workspace: TempWorkspace,
    #[case] operation: Operation,
    #[case] script: &str,
    #[case] message: &str,
) {
    let host = FakeHost::default();
    let (result, stdout) = run_collaborator(&workspace, &host, &operation);

    assert_eq!(result.expect("script succeeds"), ExitCode::SUCCESS);
    assert_eq!(
        host.runs(),
        vec![workspace.root().join(script).display().to_string()]
    );
    assert!(host.spawned().is_empty());
    assert_eq!(stdout, format!("{message}\n"));
}

#[rstest]
fn failing_script_is_a_dependency_failure(workspace: TempWorkspace) {
    let host = FakeHost::default();
    host.fail_step("install_dependencies.sh");

    let (result, _) = run_collaborator(&workspace, &host, &Operation::Init);

    assert!(matches!(
        result,
        Err(LifecycleError::DependencyFailure {
            step: "dependency bootstrap",
            ..
        })
    ));
}

#[rstest]
fn missing_script_is_reported(workspace: TempWorkspace) {
    let script = workspace.root().join("scripts/generate_ssh_key.sh");
    fs::remove_file(&script).expect("remove script");
    let host = FakeHost::default();

    let (result, _) = run_collaborator(&workspace, &host, &Operation::Auth);

    assert!(matches!(
        result,
        Err(LifecycleError::EnvironmentMissing { .. })
    ));
    assert!(host.calls().is_empty());
}

#[rstest]
fn clone_without_names_skips_existing_checkouts(workspace: TempWorkspace) {
    let host = FakeHost::default();
    let operation = Operation::Clone {
        repositories: Vec::new(),
    };

    let (result, stdout) = run_collaborator(&workspace, &host, &operation);

    result.expect("clone succeeds");
    assert!(host.runs().is_empty());
    for name in ["oems", "gotrade", "gotrade-frontend"] {
        assert!(
            stdout.contains(&format!("skipping {name}:")),
            "missing skip line for {name} in {stdout:?}"
        );
    }
}

#[rstest]
fn clone_fetches_named_repositories_from_the_configured_remote(workspace: TempWorkspace) {
    let host = FakeHost::default();
    let operation = Operation::Clone {
        repositories: vec![String::from("market-data")],
    };

    let (result, stdout) = run_collaborator(&workspace, &host, &operation);

    result.expect("clone succeeds");
    let target = workspace.root().join("market-data");
    assert_eq!(
        host.runs(),
        vec![format!(
            "git clone git@github.com:gotrade-dev/market-data.git {}",
            target.display()
        )]
    );
    assert!(stdout.starts_with("cloned market-data into"));
}

#[rstest]
fn lifecycle_operations_are_not_collaborators(workspace: TempWorkspace) {
    let host = FakeHost::default();
    let (result, _) = run_collaborator(&workspace, &host, &Operation::Start);
    assert!(matches!(
        result,
        Err(LifecycleError::PolicyViolation { .. })
    ));
}
