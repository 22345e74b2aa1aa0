//! Frontend launcher.

use gotrade_config::{Config, WorkspacePaths};

use super::{Ready, ServiceLauncher, require_dir, run_step, split_command};
use crate::host::{CommandSpec, OutputPlan, ProcessHost, StreamRoute};
use crate::intent::Intent;
use crate::lifecycle::{LifecycleError, ServiceName};
use crate::multiplexer::StreamLabel;

pub(crate) struct FrontendLauncher<'a> {
    config: &'a Config,
    paths: &'a WorkspacePaths,
}

impl<'a> FrontendLauncher<'a> {
    pub(crate) fn new(config: &'a Config, paths: &'a WorkspacePaths) -> Self {
        Self { config, paths }
    }
}

impl ServiceLauncher for FrontendLauncher<'_> {
    fn service(&self) -> ServiceName {
        ServiceName::Frontend
    }

    fn prepare(&self, host: &dyn ProcessHost, intent: &Intent) -> Result<Ready, LifecycleError> {
        let frontend_dir = self.paths.frontend_dir();
        require_dir(frontend_dir, "frontend checkout", "run `gotrade clone` first")?;
        require_dir(
            &self.paths.frontend_modules(),
            "frontend dependencies",
            "run `gotrade --init` first",
        )?;

        if intent.builds.build_frontend {
            let (program, args) = split_command(&self.config.frontend_build_command, "frontend build")?;
            run_step(
                host,
                "frontend build",
                &CommandSpec::new(program).args(args).current_dir(frontend_dir),
            )?;
        }

        let (program, args) = split_command(&self.config.frontend_command, "frontend")?;
        let route = StreamRoute::when(intent.logs.frontend, StreamLabel::Frontend);
        Ok(Ready {
            spec: CommandSpec::new(program).args(args).current_dir(frontend_dir),
            output: OutputPlan {
                stdout: route,
                stderr: route,
            },
        })
    }
}
