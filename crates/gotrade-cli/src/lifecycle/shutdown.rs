//! Termination signal handling for attached services.
//!
//! While a service runs in the foreground the CLI intercepts SIGTERM, SIGINT,
//! SIGQUIT, and SIGHUP so it can tear the service and its containers down
//! instead of dying with them.

use std::io;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver, TryRecvError};
use std::thread::{self, JoinHandle};

use signal_hook::consts::signal::{SIGHUP, SIGINT, SIGQUIT, SIGTERM};
use signal_hook::iterator::{Handle, Signals};
use thiserror::Error;
use tracing::{info, warn};

use super::LIFECYCLE_TARGET;

/// Signals that begin a shutdown.
pub(crate) const SHUTDOWN_SIGNALS: [i32; 4] = [SIGTERM, SIGINT, SIGQUIT, SIGHUP];

/// Errors reported by shutdown signal listeners.
#[derive(Debug, Error)]
pub(crate) enum ShutdownError {
    /// Installing signal handlers failed.
    #[error("failed to install signal handlers: {source}")]
    Install {
        #[source]
        source: io::Error,
    },
}

/// Abstraction over shutdown notification mechanisms.
pub(crate) trait ShutdownSignal {
    /// Starts listening; signals are observed through the returned listener.
    fn install(&self) -> Result<SignalListener, ShutdownError>;
}

/// Receives delivered signals without blocking.
///
/// Dropping the listener unregisters the handlers.
pub(crate) struct SignalListener {
    receiver: Receiver<i32>,
    handle: Option<Handle>,
    thread: Option<JoinHandle<()>>,
}

impl SignalListener {
    #[cfg(test)]
    pub(crate) fn from_receiver(receiver: Receiver<i32>) -> Self {
        Self {
            receiver,
            handle: None,
            thread: None,
        }
    }

    /// Returns the next delivered signal, if any.
    pub(crate) fn poll(&self) -> Option<i32> {
        match self.receiver.try_recv() {
            Ok(signal) => Some(signal),
            Err(TryRecvError::Empty | TryRecvError::Disconnected) => None,
        }
    }
}

impl Drop for SignalListener {
    fn drop(&mut self) {
        if let Some(handle) = self.handle.take() {
            handle.close();
        }
        if let Some(thread) = self.thread.take() {
            if thread.join().is_err() {
                warn!(target: LIFECYCLE_TARGET, "signal listener thread panicked");
            }
        }
    }
}

/// Listener backed by `signal-hook`.
#[derive(Debug, Default, Clone, Copy)]
pub(crate) struct SystemShutdownSignal;

impl ShutdownSignal for SystemShutdownSignal {
    fn install(&self) -> Result<SignalListener, ShutdownError> {
        let mut signals =
            Signals::new(SHUTDOWN_SIGNALS).map_err(|source| ShutdownError::Install { source })?;
        let handle = signals.handle();
        let (sender, receiver) = mpsc::channel();
        let thread = thread::Builder::new()
            .name(String::from("gotrade-signals"))
            .spawn(move || {
                for signal in signals.forever() {
                    info!(target: LIFECYCLE_TARGET, signal, "shutdown signal received");
                    if sender.send(signal).is_err() {
                        break;
                    }
                }
            })
            .map_err(|source| ShutdownError::Install { source })?;
        Ok(SignalListener {
            receiver,
            handle: Some(handle),
            thread: Some(thread),
        })
    }
}

/// Ensures teardown runs at most once per invocation.
#[derive(Debug, Default)]
pub(crate) struct ShutdownGuard {
    started: AtomicBool,
}

impl ShutdownGuard {
    /// Returns `true` for the first caller only.
    pub(crate) fn try_begin(&self) -> bool {
        self.started
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }
}
