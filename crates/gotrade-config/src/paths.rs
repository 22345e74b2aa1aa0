//! Resolves the configured service layout against the working directory.
//!
//! Launchers, the stop path, and the external collaborators all need to agree
//! on where the checkouts, scripts, and the PID registry live. Relative
//! configuration values are anchored at the directory the tool was invoked
//! from; absolute values are used verbatim.

use std::env;
use std::io;
use std::path::{Path, PathBuf};

use camino::Utf8Path;
use thiserror::Error;

use crate::Config;

/// Absolute paths derived from a [`Config`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkspacePaths {
    root: PathBuf,
    pid_registry: PathBuf,
    engine_dir: PathBuf,
    engine_binary: PathBuf,
    engine_compile_script: PathBuf,
    engine_remote_script: PathBuf,
    database_compose_file: PathBuf,
    api_dir: PathBuf,
    api_venv: PathBuf,
    api_packages_script: PathBuf,
    api_compose_file: PathBuf,
    frontend_dir: PathBuf,
}

impl WorkspacePaths {
    /// Derives paths relative to the process working directory.
    pub fn from_current_dir(config: &Config) -> Result<Self, PathsError> {
        let root = env::current_dir().map_err(|source| PathsError::WorkingDirectory { source })?;
        Ok(Self::resolve(config, root))
    }

    /// Derives paths relative to an explicit workspace root.
    #[must_use]
    pub fn resolve(config: &Config, root: impl Into<PathBuf>) -> Self {
        let root = root.into();
        let engine_dir = anchor(&root, &config.engine_dir);
        let api_dir = anchor(&root, &config.api_dir);
        let api_venv = anchor(&api_dir, &config.api_venv);
        Self {
            pid_registry: anchor(&root, &config.pid_registry),
            engine_binary: anchor(&engine_dir, &config.engine_binary),
            engine_compile_script: anchor(&engine_dir, &config.engine_compile_script),
            engine_remote_script: anchor(&engine_dir, &config.engine_remote_script),
            database_compose_file: anchor(&engine_dir, &config.database_compose_file),
            api_packages_script: anchor(&api_dir, &config.api_packages_script),
            api_compose_file: anchor(&api_dir, &config.api_compose_file),
            frontend_dir: anchor(&root, &config.frontend_dir),
            engine_dir,
            api_dir,
            api_venv,
            root,
        }
    }

    /// Directory the tool was invoked from.
    pub fn root(&self) -> &Path {
        self.root.as_path()
    }

    /// Path to the PID registry file.
    pub fn pid_registry(&self) -> &Path {
        self.pid_registry.as_path()
    }

    /// Engine checkout.
    pub fn engine_dir(&self) -> &Path {
        self.engine_dir.as_path()
    }

    /// Compiled engine executable.
    pub fn engine_binary(&self) -> &Path {
        self.engine_binary.as_path()
    }

    /// Engine compile script.
    pub fn engine_compile_script(&self) -> &Path {
        self.engine_compile_script.as_path()
    }

    /// Combined compile-and-run script for the remote environment.
    pub fn engine_remote_script(&self) -> &Path {
        self.engine_remote_script.as_path()
    }

    /// Compose file for the database container group.
    pub fn database_compose_file(&self) -> &Path {
        self.database_compose_file.as_path()
    }

    /// API checkout.
    pub fn api_dir(&self) -> &Path {
        self.api_dir.as_path()
    }

    /// API virtual environment.
    pub fn api_venv(&self) -> &Path {
        self.api_venv.as_path()
    }

    /// `bin` directory of the API virtual environment.
    pub fn api_venv_bin(&self) -> PathBuf {
        self.api_venv.join("bin")
    }

    /// Package build script.
    pub fn api_packages_script(&self) -> &Path {
        self.api_packages_script.as_path()
    }

    /// Compose file for API-side containers.
    pub fn api_compose_file(&self) -> &Path {
        self.api_compose_file.as_path()
    }

    /// Frontend checkout.
    pub fn frontend_dir(&self) -> &Path {
        self.frontend_dir.as_path()
    }

    /// Installed frontend dependencies.
    pub fn frontend_modules(&self) -> PathBuf {
        self.frontend_dir.join("node_modules")
    }

    /// Anchors an arbitrary configured path at the workspace root.
    pub fn anchored(&self, path: &Utf8Path) -> PathBuf {
        anchor(&self.root, path)
    }
}

fn anchor(base: &Path, path: &Utf8Path) -> PathBuf {
    let path = path.as_std_path();
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        base.join(path)
    }
}

/// Errors raised while deriving workspace paths.
#[derive(Debug, Error)]
pub enum PathsError {
    /// The working directory could not be determined.
    #[error("failed to determine the working directory: {source}")]
    WorkingDirectory {
        #[source]
        source: io::Error,
    },
}
