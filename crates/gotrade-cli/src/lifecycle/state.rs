//! Lifecycle state tracking.

use std::fmt;

use tracing::info;

use super::LIFECYCLE_TARGET;

/// Phases an orchestrator invocation moves through.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum LifecycleState {
    Idle,
    Validating,
    Launching { step: usize, of: usize },
    Running,
    Stopping,
    Stopped,
    Failed,
}

impl fmt::Display for LifecycleState {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Idle => formatter.write_str("idle"),
            Self::Validating => formatter.write_str("validating"),
            Self::Launching { step, of } => write!(formatter, "launching {step}/{of}"),
            Self::Running => formatter.write_str("running"),
            Self::Stopping => formatter.write_str("stopping"),
            Self::Stopped => formatter.write_str("stopped"),
            Self::Failed => formatter.write_str("failed"),
        }
    }
}

/// Records the current state and logs each transition.
#[derive(Debug)]
pub(crate) struct StateTracker {
    current: LifecycleState,
}

impl StateTracker {
    pub(crate) const fn new() -> Self {
        Self {
            current: LifecycleState::Idle,
        }
    }

    #[cfg(test)]
    pub(crate) const fn current(&self) -> LifecycleState {
        self.current
    }

    pub(crate) fn advance(&mut self, next: LifecycleState) {
        info!(
            target: LIFECYCLE_TARGET,
            from = %self.current,
            to = %next,
            "lifecycle transition"
        );
        self.current = next;
    }
}

impl Default for StateTracker {
    fn default() -> Self {
        Self::new()
    }
}
