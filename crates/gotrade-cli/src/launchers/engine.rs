//! Local engine launcher.

use gotrade_config::WorkspacePaths;

use super::{Ready, ServiceLauncher, require_dir, require_executable, require_file, run_step};
use crate::host::{CommandSpec, OutputPlan, ProcessHost, StreamRoute};
use crate::intent::{Intent, LogToggles};
use crate::lifecycle::{LifecycleError, ServiceName};
use crate::multiplexer::StreamLabel;

const CLONE_HINT: &str = "run `gotrade clone` first";

/// Brings up the database containers, optionally compiles, then runs the
/// engine binary from its checkout.
pub(crate) struct EngineLauncher<'a> {
    paths: &'a WorkspacePaths,
}

impl<'a> EngineLauncher<'a> {
    pub(crate) fn new(paths: &'a WorkspacePaths) -> Self {
        Self { paths }
    }
}

/// Engine stdout is `ENGINE1`, engine stderr is `ENGINE2`.
pub(super) fn engine_output(logs: &LogToggles) -> OutputPlan {
    OutputPlan {
        stdout: StreamRoute::when(logs.engine1, StreamLabel::Engine1),
        stderr: StreamRoute::when(logs.engine2, StreamLabel::Engine2),
    }
}

impl ServiceLauncher for EngineLauncher<'_> {
    fn service(&self) -> ServiceName {
        ServiceName::Engine
    }

    fn prepare(&self, host: &dyn ProcessHost, intent: &Intent) -> Result<Ready, LifecycleError> {
        let engine_dir = self.paths.engine_dir();
        require_dir(engine_dir, "engine checkout", CLONE_HINT)?;

        let compose_file = self.paths.database_compose_file();
        require_file(
            compose_file,
            "database compose file",
            "check the database_compose_file setting",
        )?;
        if intent.builds.reset {
            run_step(
                host,
                "database reset",
                &CommandSpec::compose(compose_file, &["down", "-v"]),
            )?;
        }
        run_step(
            host,
            "database start",
            &CommandSpec::compose(compose_file, &["up", "-d"]),
        )?;

        if intent.builds.compile {
            let script = self.paths.engine_compile_script();
            require_file(
                script,
                "engine compile script",
                "check the engine_compile_script setting",
            )?;
            run_step(
                host,
                "engine compile",
                &CommandSpec::new(script).current_dir(engine_dir),
            )?;
        }

        Ok(Ready {
            spec: CommandSpec::new(self.paths.engine_binary()).current_dir(engine_dir),
            output: engine_output(&intent.logs),
        })
    }

    fn verify(&self, ready: &Ready) -> Result<(), LifecycleError> {
        require_executable(
            ready.spec.program(),
            "engine binary",
            "run with --compile-oems first",
        )
    }
}
