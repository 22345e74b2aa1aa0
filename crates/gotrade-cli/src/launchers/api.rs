//! Web API launcher.

use gotrade_config::{Config, WorkspacePaths};

use super::{
    Ready, ServiceLauncher, require_dir, require_executable, require_file, run_step, split_command,
};
use crate::host::{CommandSpec, OutputPlan, ProcessHost, StreamRoute};
use crate::intent::Intent;
use crate::lifecycle::{LifecycleError, ServiceName};
use crate::multiplexer::StreamLabel;

const INIT_HINT: &str = "run `gotrade --init` first";

/// Runs the API server from the checkout's virtual environment.
pub(crate) struct ApiLauncher<'a> {
    config: &'a Config,
    paths: &'a WorkspacePaths,
}

impl<'a> ApiLauncher<'a> {
    pub(crate) fn new(config: &'a Config, paths: &'a WorkspacePaths) -> Self {
        Self { config, paths }
    }
}

impl ServiceLauncher for ApiLauncher<'_> {
    fn service(&self) -> ServiceName {
        ServiceName::Api
    }

    fn prepare(&self, host: &dyn ProcessHost, intent: &Intent) -> Result<Ready, LifecycleError> {
        let api_dir = self.paths.api_dir();
        require_dir(api_dir, "API checkout", "run `gotrade clone` first")?;
        require_dir(self.paths.api_venv(), "API virtual environment", INIT_HINT)?;

        if intent.builds.build_packages {
            let script = self.paths.api_packages_script();
            require_file(
                script,
                "package build script",
                "check the api_packages_script setting",
            )?;
            run_step(
                host,
                "package build",
                &CommandSpec::new(script).current_dir(api_dir),
            )?;
        }

        let compose_file = self.paths.api_compose_file();
        if compose_file.is_file() {
            run_step(
                host,
                "API containers start",
                &CommandSpec::compose(compose_file, &["up", "-d"]),
            )?;
        }

        let (program, args) = split_command(&self.config.api_command, "API")?;
        let route = StreamRoute::when(intent.logs.api, StreamLabel::Fastapi);
        Ok(Ready {
            spec: CommandSpec::new(self.paths.api_venv_bin().join(program))
                .args(args)
                .current_dir(api_dir)
                .env("VIRTUAL_ENV", self.paths.api_venv()),
            output: OutputPlan {
                stdout: route,
                stderr: route,
            },
        })
    }

    fn verify(&self, ready: &Ready) -> Result<(), LifecycleError> {
        require_executable(ready.spec.program(), "API server executable", INIT_HINT)
    }
}
