//! Engine launcher for the remote environment.
//!
//! No local containers are involved. With `--compile-oems` the remote script
//! compiles and runs the engine in one step; otherwise the existing binary is
//! started with `GOTRADE_ENVIRONMENT=remote`.

use gotrade_config::WorkspacePaths;

use super::engine::engine_output;
use super::{Ready, ServiceLauncher, require_dir, require_executable, require_file};
use crate::host::{CommandSpec, ProcessHost};
use crate::intent::Intent;
use crate::lifecycle::{LifecycleError, ServiceName};

pub(crate) const REMOTE_ENVIRONMENT: (&str, &str) = ("GOTRADE_ENVIRONMENT", "remote");

pub(crate) struct RemoteEngineLauncher<'a> {
    paths: &'a WorkspacePaths,
}

impl<'a> RemoteEngineLauncher<'a> {
    pub(crate) fn new(paths: &'a WorkspacePaths) -> Self {
        Self { paths }
    }
}

impl ServiceLauncher for RemoteEngineLauncher<'_> {
    fn service(&self) -> ServiceName {
        ServiceName::Engine
    }

    fn prepare(&self, _host: &dyn ProcessHost, intent: &Intent) -> Result<Ready, LifecycleError> {
        let engine_dir = self.paths.engine_dir();
        require_dir(engine_dir, "engine checkout", "run `gotrade clone` first")?;

        let (name, value) = REMOTE_ENVIRONMENT;
        let spec = if intent.builds.compile {
            let script = self.paths.engine_remote_script();
            require_file(
                script,
                "remote run script",
                "check the engine_remote_script setting",
            )?;
            CommandSpec::new(script).arg("--compile")
        } else {
            CommandSpec::new(self.paths.engine_binary())
        };

        Ok(Ready {
            spec: spec.current_dir(engine_dir).env(name, value),
            output: engine_output(&intent.logs),
        })
    }

    fn verify(&self, ready: &Ready) -> Result<(), LifecycleError> {
        require_executable(
            ready.spec.program(),
            "remote engine command",
            "run with --compile-oems first",
        )
    }
}
