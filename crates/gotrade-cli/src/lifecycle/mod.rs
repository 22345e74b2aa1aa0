//! Service lifecycle management for the GoTrade stack.
//!
//! This module is split into focused submodules so each concern remains small and
//! testable:
//! - [`types`] defines service identities, handles, and IO helpers.
//! - [`error`] captures the error surface exposed to the CLI.
//! - [`state`] tracks and logs lifecycle transitions.
//! - [`foreground`] attaches to a single running service.
//! - [`shutdown`] listens for termination signals.
//! - [`teardown`] implements the stop sequence.
//! - [`controller`] implements the high-level start/stop flows.

mod controller;
mod error;
mod foreground;
mod shutdown;
mod state;
mod teardown;
mod types;

pub(crate) use controller::Orchestrator;
pub(crate) use error::LifecycleError;
pub(crate) use shutdown::SystemShutdownSignal;
#[cfg(test)]
pub(crate) use shutdown::{ShutdownError, ShutdownSignal, SignalListener};
#[cfg(test)]
pub(crate) use state::LifecycleState;
pub(crate) use types::{LifecycleOutput, ServiceHandle, ServiceName};

pub(crate) const LIFECYCLE_TARGET: &str = "gotrade::lifecycle";
