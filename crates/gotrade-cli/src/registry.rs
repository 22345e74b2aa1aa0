//! PID registry persisted by a full-stack start.
//!
//! The registry is a plain text file holding one PID per line in launch
//! order. Its presence means services were started and not yet stopped; `stop`
//! reads it, terminates the recorded processes, and removes it.

use std::fs;
use std::io::{self, Write};
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};

use tempfile::Builder;
use thiserror::Error;
use tracing::info;

use crate::lifecycle::ServiceHandle;

const REGISTRY_TARGET: &str = "gotrade::registry";

/// Errors raised while persisting or loading the registry.
#[derive(Debug, Error)]
pub(crate) enum RegistryError {
    #[error("failed to write PID registry {path:?}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("failed to read PID registry {path:?}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("PID registry {path:?} contains an invalid entry: {line:?}")]
    Parse { path: PathBuf, line: String },
    #[error("failed to remove PID registry {path:?}: {source}")]
    Remove {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// Ordered PID file in the working directory.
#[derive(Debug, Clone)]
pub(crate) struct PidRegistry {
    path: PathBuf,
}

impl PidRegistry {
    pub(crate) fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub(crate) fn path(&self) -> &Path {
        self.path.as_path()
    }

    pub(crate) fn exists(&self) -> bool {
        self.path.exists()
    }

    /// Atomically replaces the registry with the PIDs of `handles`.
    ///
    /// The handles are consumed; ownership of the processes passes to
    /// whichever invocation later runs `stop`.
    pub(crate) fn write(&self, handles: Vec<ServiceHandle>) -> Result<(), RegistryError> {
        let contents: String = handles
            .iter()
            .map(|handle| format!("{}\n", handle.pid))
            .collect();
        atomic_write(&self.path, contents.as_bytes()).map_err(|source| RegistryError::Write {
            path: self.path.clone(),
            source,
        })?;
        for handle in &handles {
            info!(
                target: REGISTRY_TARGET,
                service = %handle.name,
                pid = handle.pid,
                launched_at = ?handle.launched_at,
                file = %self.path.display(),
                "service recorded"
            );
        }
        Ok(())
    }

    /// Reads recorded PIDs in launch order; a missing registry is empty.
    pub(crate) fn read(&self) -> Result<Vec<u32>, RegistryError> {
        let contents = match fs::read_to_string(&self.path) {
            Ok(contents) => contents,
            Err(error) if error.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(source) => {
                return Err(RegistryError::Read {
                    path: self.path.clone(),
                    source,
                });
            }
        };
        contents
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .map(|line| {
                line.parse::<u32>().map_err(|_| RegistryError::Parse {
                    path: self.path.clone(),
                    line: line.to_owned(),
                })
            })
            .collect()
    }

    /// Removes the registry; removing a missing registry succeeds.
    pub(crate) fn clear(&self) -> Result<(), RegistryError> {
        match fs::remove_file(&self.path) {
            Ok(()) => {
                info!(target: REGISTRY_TARGET, file = %self.path.display(), "registry removed");
                Ok(())
            }
            Err(error) if error.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(source) => Err(RegistryError::Remove {
                path: self.path.clone(),
                source,
            }),
        }
    }
}

/// Writes `contents` through a synced temporary file renamed into place, so
/// readers never observe a partial registry.
fn atomic_write(path: &Path, contents: &[u8]) -> io::Result<()> {
    let directory = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };

    let mut builder = Builder::new();
    builder.prefix(
        path.file_name()
            .and_then(|name| name.to_str())
            .unwrap_or("gotrade-pids"),
    );
    builder.permissions(fs::Permissions::from_mode(0o600));

    let mut file = builder.tempfile_in(directory)?;
    file.write_all(contents)?;
    file.as_file().sync_all()?;
    file.persist(path).map_err(|error| error.error)?;
    Ok(())
}
