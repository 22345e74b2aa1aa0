use std::fs;
use std::process::ExitCode;

use gotrade_config::{Config, WorkspacePaths};
use mockall::predicate::eq;
use rstest::rstest;
use signal_hook::consts::signal::{SIGHUP, SIGINT};
use tempfile::TempDir;

use crate::host::{
    Forwarding, MockProcessHost, OutputPlan, ProcessSignal, SpawnedProcess, StreamRoute,
};
use crate::launchers::{EngineLauncher, ServiceLauncher};
use crate::lifecycle::{
    LifecycleError, LifecycleOutput, LifecycleState, Orchestrator, ServiceName,
};
use crate::multiplexer::StreamLabel;
use crate::tests::support::{
    ClosedTerminal, FakeHost, HostCall, ScriptedSignal, TempWorkspace, intent, orchestrate,
    orchestrate_into, workspace,
};

const DISCARD_ALL: OutputPlan = OutputPlan {
    stdout: StreamRoute::Discard,
    stderr: StreamRoute::Discard,
};

#[rstest]
fn stop_without_a_prior_start_succeeds(workspace: TempWorkspace) {
    let host = FakeHost::default();
    let outcome = orchestrate(&workspace, &host, &ScriptedSignal::default(), "-down");

    assert_eq!(outcome.result.expect("stop succeeds"), ExitCode::SUCCESS);
    assert!(host.signals().is_empty());
    assert!(host.spawned().is_empty());
    assert_eq!(outcome.state, LifecycleState::Stopped);
    assert!(outcome.stdout.contains("read PID registry: skipped (no registry present)"));
    assert!(outcome.stdout.ends_with("GoTrade services stopped\n"));
}

#[rstest]
fn remote_package_build_is_rejected_before_any_process(workspace: TempWorkspace) {
    let host = FakeHost::default();
    let outcome = orchestrate(&workspace, &host, &ScriptedSignal::default(), "-up -rd -g");

    let error = outcome.result.expect_err("policy violation");
    assert!(matches!(error, LifecycleError::PolicyViolation { .. }));
    assert!(host.calls().is_empty());
    assert_eq!(workspace.registry_pids(), None);
    assert_eq!(outcome.state, LifecycleState::Failed);
}

#[rstest]
fn full_stack_records_services_in_launch_order(workspace: TempWorkspace) {
    let host = FakeHost::default();
    let outcome = orchestrate(&workspace, &host, &ScriptedSignal::default(), "-up -f");

    assert_eq!(outcome.result.expect("start succeeds"), ExitCode::SUCCESS);
    let spawned = host.spawned();
    let programs: Vec<String> = spawned.iter().map(|record| record.program_name()).collect();
    assert_eq!(programs, ["oems", "uvicorn", "npm"]);
    assert!(
        spawned
            .iter()
            .all(|record| record.forwarding == Forwarding::Detached)
    );

    let pids: Vec<u32> = spawned.iter().map(|record| record.pid).collect();
    assert_eq!(workspace.registry_pids(), Some(pids));
    assert_eq!(host.sleeps(), vec![workspace.config().readiness_delay(); 3]);
    assert_eq!(outcome.state, LifecycleState::Running);
    assert!(outcome.stdout.contains("GoTrade full stack running"));
}

#[rstest]
fn full_stack_runs_requested_builds_before_each_launch(workspace: TempWorkspace) {
    let host = FakeHost::default();
    let outcome = orchestrate(
        &workspace,
        &host,
        &ScriptedSignal::default(),
        "-up -f -w -c -g -bf",
    );
    outcome.result.expect("start succeeds");

    let root = workspace.root().display().to_string();
    let expected = vec![
        HostCall::Run(format!(
            "docker compose -f {root}/oems/docker-compose.yml down -v"
        )),
        HostCall::Run(format!("docker compose -f {root}/oems/docker-compose.yml up -d")),
        HostCall::Run(format!("{root}/oems/scripts/compile.sh")),
        HostCall::Spawn(format!("{root}/oems/build/oems")),
        HostCall::Run(format!("{root}/gotrade/scripts/build_packages.sh")),
        HostCall::Run(format!(
            "docker compose -f {root}/gotrade/docker-compose.yml up -d"
        )),
        HostCall::Spawn(format!(
            "{root}/gotrade/.venv/bin/uvicorn app.main:app --host 0.0.0.0 --port 8000"
        )),
        HostCall::Run(String::from("npm run build")),
        HostCall::Spawn(String::from("npm run dev")),
    ];
    assert_eq!(host.calls(), expected);
}

#[rstest]
fn stop_after_start_leaves_nothing_running(workspace: TempWorkspace) {
    let host = FakeHost::default();
    let signals = ScriptedSignal::default();
    orchestrate(&workspace, &host, &signals, "-up -f")
        .result
        .expect("start succeeds");
    let pids: Vec<u32> = host.spawned().iter().map(|record| record.pid).collect();

    let outcome = orchestrate(&workspace, &host, &signals, "-down");

    assert_eq!(outcome.result.expect("stop succeeds"), ExitCode::SUCCESS);
    assert_eq!(workspace.registry_pids(), None);
    for pid in &pids {
        assert!(!host.running(*pid), "pid {pid} still running");
        assert!(host.signals().contains(&(*pid, ProcessSignal::Terminate)));
    }
    assert_eq!(host.sleeps().last(), Some(&workspace.config().stop_grace()));
    assert!(outcome.stdout.contains("bring down database containers: done"));
    assert!(outcome.stdout.contains("bring down api containers: done"));
}

#[rstest]
fn stopping_twice_matches_stopping_once(workspace: TempWorkspace) {
    let host = FakeHost::default();
    let signals = ScriptedSignal::default();
    orchestrate(&workspace, &host, &signals, "-up -f")
        .result
        .expect("start succeeds");
    orchestrate(&workspace, &host, &signals, "-down")
        .result
        .expect("first stop succeeds");
    let signals_after_first = host.signals();

    let outcome = orchestrate(&workspace, &host, &signals, "-down");

    assert_eq!(outcome.result.expect("second stop succeeds"), ExitCode::SUCCESS);
    assert_eq!(host.signals(), signals_after_first);
    assert_eq!(workspace.registry_pids(), None);
    assert!(outcome.stdout.contains("remove PID registry: skipped (nothing to remove)"));
}

#[rstest]
fn services_ignoring_sigterm_are_force_killed(workspace: TempWorkspace) {
    let host = FakeHost::default();
    host.ignore_terminate("uvicorn");
    let signals = ScriptedSignal::default();
    orchestrate(&workspace, &host, &signals, "-up -f")
        .result
        .expect("start succeeds");
    let api_pid = host
        .spawned()
        .iter()
        .find(|record| record.program_name() == "uvicorn")
        .map(|record| record.pid)
        .expect("api spawned");

    let outcome = orchestrate(&workspace, &host, &signals, "-down");

    outcome.result.expect("stop succeeds");
    assert!(host.signals().contains(&(api_pid, ProcessSignal::Kill)));
    assert!(!host.running(api_pid));
    assert!(outcome.stdout.contains(&format!("force-kill pid {api_pid}: done")));
}

#[rstest]
fn log_toggles_change_only_output_routing(workspace: TempWorkspace) {
    let host = FakeHost::default();
    let signals = ScriptedSignal::default();
    orchestrate(&workspace, &host, &signals, "-up -f")
        .result
        .expect("quiet start succeeds");
    orchestrate(&workspace, &host, &signals, "-down")
        .result
        .expect("stop succeeds");
    orchestrate(&workspace, &host, &signals, "-up -f -loem1 -lapi")
        .result
        .expect("logged start succeeds");

    let spawned = host.spawned();
    let (quiet, logged) = spawned.split_at(3);
    for (before, after) in quiet.iter().zip(logged) {
        assert_eq!(before.spec, after.spec);
        assert_eq!(before.forwarding, after.forwarding);
        assert_eq!(before.plan, DISCARD_ALL);
    }
    assert_eq!(
        logged[0].plan,
        OutputPlan {
            stdout: StreamRoute::Tag(StreamLabel::Engine1),
            stderr: StreamRoute::Discard,
        }
    );
    assert_eq!(
        logged[1].plan,
        OutputPlan {
            stdout: StreamRoute::Tag(StreamLabel::Fastapi),
            stderr: StreamRoute::Tag(StreamLabel::Fastapi),
        }
    );
    assert_eq!(logged[2].plan, DISCARD_ALL);
}

#[rstest]
fn engine_liveness_failure_halts_the_sequence(workspace: TempWorkspace) {
    let host = FakeHost::default();
    host.exit_on_launch("oems", 1);
    let outcome = orchestrate(&workspace, &host, &ScriptedSignal::default(), "-up -f");

    let error = outcome.result.expect_err("liveness failure");
    assert!(matches!(
        error,
        LifecycleError::LivenessFailure {
            service: ServiceName::Engine,
            status: 1,
            ..
        }
    ));
    assert_eq!(host.spawned().len(), 1);
    assert!(
        !host
            .runs()
            .iter()
            .any(|command| command.contains("/gotrade/docker-compose.yml")),
        "API containers must not start after an engine failure"
    );
    assert_eq!(workspace.registry_pids(), None);
    assert_eq!(outcome.state, LifecycleState::Failed);
}

#[rstest]
fn later_liveness_failure_leaves_earlier_services_for_stop(workspace: TempWorkspace) {
    let host = FakeHost::default();
    host.exit_on_launch("uvicorn", 2);
    let outcome = orchestrate(&workspace, &host, &ScriptedSignal::default(), "-up -f");

    outcome.result.expect_err("api liveness failure");
    let spawned = host.spawned();
    assert_eq!(spawned.len(), 2);
    assert!(host.running(spawned[0].pid));
    assert_eq!(workspace.registry_pids(), None);
}

#[rstest]
fn start_refuses_while_recorded_services_run(workspace: TempWorkspace) {
    let host = FakeHost::default();
    let signals = ScriptedSignal::default();
    orchestrate(&workspace, &host, &signals, "-up -f")
        .result
        .expect("start succeeds");
    let recorded = workspace.registry_pids();

    let outcome = orchestrate(&workspace, &host, &signals, "-up -f");

    let error = outcome.result.expect_err("already running");
    assert!(matches!(error, LifecycleError::AlreadyRunning { .. }));
    assert_eq!(host.spawned().len(), 3);
    assert_eq!(workspace.registry_pids(), recorded);
}

#[rstest]
fn stale_registry_is_replaced(workspace: TempWorkspace) {
    fs::write(workspace.paths().pid_registry(), "999999\n").expect("seed stale registry");
    let host = FakeHost::default();

    orchestrate(&workspace, &host, &ScriptedSignal::default(), "-up -f")
        .result
        .expect("start succeeds");

    let pids: Vec<u32> = host.spawned().iter().map(|record| record.pid).collect();
    assert_eq!(workspace.registry_pids(), Some(pids));
}

#[rstest]
fn live_unrelated_pid_in_registry_blocks_start(workspace: TempWorkspace) {
    fs::write(workspace.paths().pid_registry(), "31337\n").expect("seed registry");
    let host = FakeHost::default();
    host.adopt(31337);

    let outcome = orchestrate(&workspace, &host, &ScriptedSignal::default(), "-up -f");

    assert!(matches!(
        outcome.result,
        Err(LifecycleError::AlreadyRunning { pid: 31337, .. })
    ));
    assert!(host.spawned().is_empty());
}

#[rstest]
fn foreground_exit_status_is_propagated(workspace: TempWorkspace) {
    let host = FakeHost::default();
    host.exit_on_launch("oems", 7);
    let outcome = orchestrate(&workspace, &host, &ScriptedSignal::default(), "-r");

    assert_eq!(outcome.result.expect("engine ran"), ExitCode::from(7));
    let spawned = host.spawned();
    assert_eq!(spawned.len(), 1);
    assert_eq!(spawned[0].forwarding, Forwarding::Attached);
    assert_eq!(outcome.state, LifecycleState::Stopped);
    assert!(outcome.stderr.contains("oems exited with status 7"));
    assert_eq!(workspace.registry_pids(), None);
}

#[rstest]
fn foreground_signal_runs_the_stop_sequence(workspace: TempWorkspace) {
    let host = FakeHost::default();
    let outcome = orchestrate(&workspace, &host, &ScriptedSignal::delivering(SIGINT), "-up");

    assert_eq!(outcome.result.expect("clean shutdown"), ExitCode::SUCCESS);
    let engine_pid = host.spawned()[0].pid;
    assert!(host.signals().contains(&(engine_pid, ProcessSignal::Terminate)));
    assert!(!host.running(engine_pid));
    assert_eq!(outcome.state, LifecycleState::Stopped);
    assert!(outcome.stderr.contains(&format!("received signal {SIGINT}")));

    let runs = host.runs();
    assert!(runs.iter().any(|command| command.ends_with("oems/docker-compose.yml down")));
    assert!(runs.iter().any(|command| command.ends_with("gotrade/docker-compose.yml down")));
}

#[rstest]
fn hangup_with_a_closed_terminal_still_tears_everything_down(workspace: TempWorkspace) {
    let host = FakeHost::default();
    let (result, state) = orchestrate_into(
        &workspace,
        &host,
        &ScriptedSignal::delivering(SIGHUP),
        "-up",
        ClosedTerminal,
        ClosedTerminal,
    );

    assert_eq!(result.expect("teardown completes"), ExitCode::SUCCESS);
    let engine_pid = host.spawned()[0].pid;
    assert!(host.signals().contains(&(engine_pid, ProcessSignal::Terminate)));
    assert!(!host.running(engine_pid));
    assert_eq!(state, LifecycleState::Stopped);
    let runs = host.runs();
    assert!(runs.iter().any(|command| command.ends_with("oems/docker-compose.yml down")));
}

#[rstest]
fn stop_succeeds_when_stdout_is_closed(workspace: TempWorkspace) {
    let host = FakeHost::default();
    orchestrate(&workspace, &host, &ScriptedSignal::default(), "-up -f")
        .result
        .expect("start succeeds");

    let (result, state) = orchestrate_into(
        &workspace,
        &host,
        &ScriptedSignal::default(),
        "-down",
        ClosedTerminal,
        Vec::new(),
    );

    assert_eq!(result.expect("stop never fails"), ExitCode::SUCCESS);
    assert_eq!(state, LifecycleState::Stopped);
    assert_eq!(workspace.registry_pids(), None);
    for record in host.spawned() {
        assert!(!host.running(record.pid), "{} still running", record.program_name());
    }
}

#[rstest]
fn full_stack_start_survives_a_closed_stdout(workspace: TempWorkspace) {
    let host = FakeHost::default();
    let (result, state) = orchestrate_into(
        &workspace,
        &host,
        &ScriptedSignal::default(),
        "-up -f",
        ClosedTerminal,
        Vec::new(),
    );

    assert_eq!(result.expect("start succeeds"), ExitCode::SUCCESS);
    assert_eq!(state, LifecycleState::Running);
    let pids: Vec<u32> = host.spawned().iter().map(|record| record.pid).collect();
    assert_eq!(workspace.registry_pids(), Some(pids));
}

#[test]
fn attached_service_is_stopped_when_monitoring_fails() {
    let workspace = TempWorkspace::new();
    let mut host = MockProcessHost::new();
    host.expect_run().returning(|_| Ok(0));
    host.expect_spawn()
        .times(1)
        .returning(|_, _, _| Ok(SpawnedProcess::untracked(4321)));
    host.expect_try_wait()
        .returning(|_| Err(std::io::Error::other("wait failed")));
    host.expect_signal()
        .with(eq(4321), eq(ProcessSignal::Terminate))
        .times(1)
        .returning(|_, _| Ok(()));
    host.expect_signal()
        .with(eq(4321), eq(ProcessSignal::Kill))
        .times(1)
        .returning(|_, _| Ok(()));
    host.expect_sleep().return_const(());

    let signals = ScriptedSignal::default();
    let mut orchestrator =
        Orchestrator::new(&host, &signals, workspace.config(), workspace.paths());
    let mut stdout = Vec::new();
    let mut stderr = Vec::new();
    let mut output = LifecycleOutput::new(&mut stdout, &mut stderr);
    let error = orchestrator
        .handle(&intent("-up"), &mut output)
        .expect_err("monitoring fails");

    assert!(matches!(error, LifecycleError::Monitor { .. }));
}

#[rstest]
fn remote_mode_runs_the_engine_against_the_remote_environment(workspace: TempWorkspace) {
    let host = FakeHost::default();
    orchestrate(&workspace, &host, &ScriptedSignal::delivering(SIGINT), "-up -rd")
        .result
        .expect("remote run succeeds");

    let spawned = host.spawned();
    assert_eq!(spawned.len(), 1);
    assert_eq!(spawned[0].program_name(), "oems");
    assert!(spawned[0].spec.envs().iter().any(|(key, value)| {
        key == "GOTRADE_ENVIRONMENT" && value == "remote"
    }));
    assert!(!host.runs().iter().any(|command| command.ends_with("up -d")));
}

#[rstest]
fn remote_compile_uses_the_remote_script(workspace: TempWorkspace) {
    let host = FakeHost::default();
    orchestrate(&workspace, &host, &ScriptedSignal::delivering(SIGINT), "-r -rd -c")
        .result
        .expect("remote run succeeds");

    let spawned = host.spawned();
    assert_eq!(spawned[0].program_name(), "run_remote.sh");
    assert!(spawned[0].spec.to_string().ends_with("run_remote.sh --compile"));
    assert_eq!(spawned[0].spec.cwd(), Some(workspace.paths().engine_dir()));
}

#[rstest]
fn missing_engine_binary_is_reported_with_a_hint(workspace: TempWorkspace) {
    fs::remove_file(workspace.paths().engine_binary()).expect("remove binary");
    let host = FakeHost::default();

    let outcome = orchestrate(&workspace, &host, &ScriptedSignal::default(), "-up");

    let error = outcome.result.expect_err("binary missing");
    assert!(matches!(
        error,
        LifecycleError::EnvironmentMissing {
            what: "engine binary",
            ..
        }
    ));
    assert!(error.to_string().contains("--compile-oems"));
    assert!(host.spawned().is_empty());
}

#[rstest]
fn failed_database_start_aborts_before_launch(workspace: TempWorkspace) {
    let host = FakeHost::default();
    host.fail_step("up -d");

    let outcome = orchestrate(&workspace, &host, &ScriptedSignal::default(), "-up -f");

    assert!(matches!(
        outcome.result,
        Err(LifecycleError::DependencyFailure {
            step: "database start",
            ..
        })
    ));
    assert!(host.spawned().is_empty());
}

#[test]
fn missing_checkout_fails_before_touching_processes() {
    let dir = TempDir::new().expect("tempdir");
    let paths = WorkspacePaths::resolve(&Config::default(), dir.path());
    let mut host = MockProcessHost::new();
    host.expect_run().never();
    host.expect_spawn().never();

    let launcher = EngineLauncher::new(&paths);
    let error = launcher
        .prepare(&host, &intent("-up"))
        .expect_err("checkout missing");

    assert!(matches!(
        error,
        LifecycleError::EnvironmentMissing {
            what: "engine checkout",
            ..
        }
    ));
}

#[test]
fn spawn_failure_is_reported_as_launch_error() {
    let workspace = TempWorkspace::new();
    let mut host = MockProcessHost::new();
    host.expect_run().returning(|_| Ok(0));
    host.expect_spawn()
        .times(1)
        .returning(|_, _, _| Err(std::io::Error::other("exec format error")));

    let launcher = EngineLauncher::new(workspace.paths());
    let ready = launcher
        .prepare(&host, &intent("-up"))
        .expect("engine prepares");
    let error = launcher
        .launch(&host, &ready, Forwarding::Attached)
        .expect_err("spawn fails");

    assert!(matches!(
        error,
        LifecycleError::LaunchService {
            service: ServiceName::Engine,
            ..
        }
    ));
}
