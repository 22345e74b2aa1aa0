//! Foreground attachment to a single service.

use std::time::Duration;

use tracing::debug;

use super::{LIFECYCLE_TARGET, LifecycleError};
use super::shutdown::SignalListener;
use crate::host::{ProcessHost, SpawnedProcess};

pub(crate) const POLL_INTERVAL: Duration = Duration::from_millis(100);

/// How an attached session ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum AttachOutcome {
    /// The service exited on its own with this status.
    Exited(i32),
    /// A termination signal arrived while the service was running.
    Interrupted(i32),
}

/// Blocks until the service exits or a shutdown signal is delivered.
pub(crate) fn attach(
    host: &dyn ProcessHost,
    process: &mut SpawnedProcess,
    listener: &SignalListener,
) -> Result<AttachOutcome, LifecycleError> {
    loop {
        if let Some(signal) = listener.poll() {
            debug!(target: LIFECYCLE_TARGET, pid = process.pid, signal, "attach interrupted");
            return Ok(AttachOutcome::Interrupted(signal));
        }
        let status = host
            .try_wait(process)
            .map_err(|source| LifecycleError::Monitor { source })?;
        if let Some(status) = status {
            debug!(target: LIFECYCLE_TARGET, pid = process.pid, status, "attached service exited");
            return Ok(AttachOutcome::Exited(status));
        }
        host.sleep(POLL_INTERVAL);
    }
}
