//! One-shot setup operations: dependency bootstrap, SSH key generation,
//! environment setup, and repository cloning.
//!
//! These run their configured script or `git` and report the result; they
//! never touch the PID registry or long-running services.

use std::io::Write;
use std::path::PathBuf;
use std::process::ExitCode;

use camino::Utf8Path;
use gotrade_config::{Config, WorkspacePaths};
use tracing::info;

use crate::host::{CommandSpec, ProcessHost};
use crate::intent::Operation;
use crate::launchers::{require_file, run_step};
use crate::lifecycle::{LifecycleError, LifecycleOutput};

const COLLABORATOR_TARGET: &str = "gotrade::collaborators";

pub(crate) struct Collaborators<'a, H: ProcessHost> {
    host: &'a H,
    config: &'a Config,
    paths: &'a WorkspacePaths,
}

impl<'a, H: ProcessHost> Collaborators<'a, H> {
    pub(crate) fn new(host: &'a H, config: &'a Config, paths: &'a WorkspacePaths) -> Self {
        Self {
            host,
            config,
            paths,
        }
    }

    pub(crate) fn run<W: Write, E: Write>(
        &self,
        operation: &Operation,
        output: &mut LifecycleOutput<W, E>,
    ) -> Result<ExitCode, LifecycleError> {
        match operation {
            Operation::Init => self.run_script(
                &self.config.init_script,
                "dependency bootstrap",
                "check the init_script setting",
                output,
            ),
            Operation::Auth => self.run_script(
                &self.config.auth_script,
                "SSH key generation",
                "check the auth_script setting",
                output,
            ),
            Operation::SetupGotrade => self.run_script(
                &self.config.setup_script,
                "environment setup",
                "check the setup_script setting",
                output,
            ),
            Operation::Clone { repositories } => self.clone_repositories(repositories, output),
            other => Err(LifecycleError::PolicyViolation {
                reason: format!("{other:?} is not a setup operation"),
            }),
        }
    }

    fn run_script<W: Write, E: Write>(
        &self,
        script: &Utf8Path,
        step: &'static str,
        hint: &'static str,
        output: &mut LifecycleOutput<W, E>,
    ) -> Result<ExitCode, LifecycleError> {
        let script = self.paths.anchored(script);
        require_file(&script, step, hint)?;
        run_step(
            self.host,
            step,
            &CommandSpec::new(script).current_dir(self.paths.root()),
        )?;
        output.stdout_line(format_args!("{step} completed"))?;
        Ok(ExitCode::SUCCESS)
    }

    fn clone_repositories<W: Write, E: Write>(
        &self,
        repositories: &[String],
        output: &mut LifecycleOutput<W, E>,
    ) -> Result<ExitCode, LifecycleError> {
        let targets = if repositories.is_empty() {
            self.default_checkouts()
        } else {
            repositories
                .iter()
                .map(|repository| (repository.clone(), self.paths.root().join(repository)))
                .collect()
        };

        for (repository, target) in targets {
            if target.exists() {
                output.stdout_line(format_args!(
                    "skipping {repository}: {} already exists",
                    target.display()
                ))?;
                continue;
            }
            let remote = format!(
                "{}/{repository}.git",
                self.config.repository_base.trim_end_matches('/')
            );
            info!(target: COLLABORATOR_TARGET, %remote, target = %target.display(), "cloning");
            run_step(
                self.host,
                "repository clone",
                &CommandSpec::new("git")
                    .arg("clone")
                    .arg(&remote)
                    .arg(&target)
                    .current_dir(self.paths.root()),
            )?;
            output.stdout_line(format_args!("cloned {repository} into {}", target.display()))?;
        }
        Ok(ExitCode::SUCCESS)
    }

    /// The engine, API, and frontend checkouts, named after their directories.
    fn default_checkouts(&self) -> Vec<(String, PathBuf)> {
        [
            self.paths.engine_dir(),
            self.paths.api_dir(),
            self.paths.frontend_dir(),
        ]
        .into_iter()
        .filter_map(|directory| {
            directory
                .file_name()
                .map(|name| (name.to_string_lossy().into_owned(), directory.to_path_buf()))
        })
        .collect()
    }
}
