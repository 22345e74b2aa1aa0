//! Operating-system seam used by the orchestrator.
//!
//! Everything that touches real processes goes through [`ProcessHost`]: one-shot
//! steps, long-running service spawns, liveness probes, signals, name-matched
//! kills, and sleeping. Tests substitute a recording implementation so the
//! lifecycle can be exercised without launching anything.

use std::ffi::{OsStr, OsString};
use std::fmt;
use std::io;
use std::os::unix::process::ExitStatusExt;
use std::path::{Path, PathBuf};
use std::process::{Child, ChildStderr, ChildStdout, Command, ExitStatus, Stdio};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use nix::errno::Errno;
use nix::sys::signal::{Signal, kill};
use nix::unistd::Pid;
use tracing::{debug, warn};

use crate::multiplexer::{LineTagger, StreamLabel, spawn_forwarder};

const HOST_TARGET: &str = "gotrade::host";

/// Fully described external command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct CommandSpec {
    program: PathBuf,
    args: Vec<OsString>,
    cwd: Option<PathBuf>,
    envs: Vec<(OsString, OsString)>,
}

impl CommandSpec {
    pub(crate) fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            cwd: None,
            envs: Vec::new(),
        }
    }

    /// `docker compose -f <file> <args>` run from the compose file's directory.
    pub(crate) fn compose(file: &Path, args: &[&str]) -> Self {
        let spec = Self::new("docker")
            .args(["compose", "-f"])
            .arg(file)
            .args(args.iter().copied());
        match file.parent() {
            Some(directory) => spec.current_dir(directory),
            None => spec,
        }
    }

    #[must_use]
    pub(crate) fn arg(mut self, arg: impl AsRef<OsStr>) -> Self {
        self.args.push(arg.as_ref().to_os_string());
        self
    }

    #[must_use]
    pub(crate) fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<OsStr>,
    {
        self.args
            .extend(args.into_iter().map(|arg| arg.as_ref().to_os_string()));
        self
    }

    #[must_use]
    pub(crate) fn current_dir(mut self, directory: impl Into<PathBuf>) -> Self {
        self.cwd = Some(directory.into());
        self
    }

    #[must_use]
    pub(crate) fn env(mut self, key: impl AsRef<OsStr>, value: impl AsRef<OsStr>) -> Self {
        self.envs
            .push((key.as_ref().to_os_string(), value.as_ref().to_os_string()));
        self
    }

    pub(crate) fn program(&self) -> &Path {
        self.program.as_path()
    }

    #[cfg(test)]
    pub(crate) fn cwd(&self) -> Option<&Path> {
        self.cwd.as_deref()
    }

    #[cfg(test)]
    pub(crate) fn envs(&self) -> &[(OsString, OsString)] {
        &self.envs
    }

    fn to_command(&self) -> Command {
        let mut command = Command::new(&self.program);
        command.args(&self.args);
        if let Some(directory) = &self.cwd {
            command.current_dir(directory);
        }
        command.envs(self.envs.iter().map(|(key, value)| (key, value)));
        command
    }
}

impl fmt::Display for CommandSpec {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(formatter, "{}", self.program.display())?;
        for arg in &self.args {
            write!(formatter, " {}", arg.to_string_lossy())?;
        }
        Ok(())
    }
}

/// Destination of one child output stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum StreamRoute {
    Discard,
    Tag(StreamLabel),
}

impl StreamRoute {
    /// Tags the stream when `enabled`, otherwise discards it.
    pub(crate) const fn when(enabled: bool, label: StreamLabel) -> Self {
        if enabled {
            Self::Tag(label)
        } else {
            Self::Discard
        }
    }
}

/// Routing for a service's stdout and stderr.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct OutputPlan {
    pub(crate) stdout: StreamRoute,
    pub(crate) stderr: StreamRoute,
}

/// How tagged output is forwarded once a service is spawned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Forwarding {
    /// Forwarder threads inside this process; used while attached.
    Attached,
    /// Forwarder processes that outlive this invocation.
    Detached,
}

/// A service process started by the host.
#[derive(Debug)]
pub(crate) struct SpawnedProcess {
    pub(crate) pid: u32,
    pub(crate) child: Option<Child>,
    pub(crate) forwarders: Vec<JoinHandle<io::Result<u64>>>,
}

impl SpawnedProcess {
    #[cfg(test)]
    pub(crate) fn untracked(pid: u32) -> Self {
        Self {
            pid,
            child: None,
            forwarders: Vec::new(),
        }
    }

    /// Waits for in-process forwarders to drain the remaining output.
    pub(crate) fn finish(self) {
        for forwarder in self.forwarders {
            match forwarder.join() {
                Ok(Ok(lines)) => debug!(target: HOST_TARGET, pid = self.pid, lines, "forwarder drained"),
                Ok(Err(error)) => warn!(target: HOST_TARGET, pid = self.pid, %error, "forwarder failed"),
                Err(_) => warn!(target: HOST_TARGET, pid = self.pid, "forwarder panicked"),
            }
        }
    }
}

/// Signals the orchestrator sends to services.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ProcessSignal {
    Terminate,
    Kill,
}

impl ProcessSignal {
    const fn as_nix(self) -> Signal {
        match self {
            Self::Terminate => Signal::SIGTERM,
            Self::Kill => Signal::SIGKILL,
        }
    }
}

impl fmt::Display for ProcessSignal {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.write_str(self.as_nix().as_str())
    }
}

/// Returns true when a signal error means the process is already gone.
pub(crate) fn is_no_such_process(error: &io::Error) -> bool {
    error.raw_os_error() == Some(Errno::ESRCH as i32)
}

#[cfg_attr(test, mockall::automock)]
pub(crate) trait ProcessHost {
    /// Runs a one-shot step to completion with inherited stdio.
    fn run(&self, spec: &CommandSpec) -> io::Result<i32>;

    /// Starts a long-running service.
    fn spawn(
        &self,
        spec: &CommandSpec,
        plan: &OutputPlan,
        forwarding: Forwarding,
    ) -> io::Result<SpawnedProcess>;

    /// Polls a spawned service; `Some(status)` once it has exited.
    fn try_wait(&self, process: &mut SpawnedProcess) -> io::Result<Option<i32>>;

    /// Reports whether any process with `pid` exists.
    fn is_alive(&self, pid: u32) -> bool;

    fn signal(&self, pid: u32, signal: ProcessSignal) -> io::Result<()>;

    /// Force-kills processes whose command line matches `pattern`.
    ///
    /// Returns `false` when nothing matched.
    fn kill_matching(&self, pattern: &str) -> io::Result<bool>;

    fn sleep(&self, duration: Duration);
}

/// [`ProcessHost`] backed by real processes.
#[derive(Debug, Clone)]
pub(crate) struct SystemProcessHost {
    use_color: bool,
    forwarder_binary: Option<PathBuf>,
}

impl SystemProcessHost {
    pub(crate) fn new(use_color: bool) -> Self {
        Self {
            use_color,
            forwarder_binary: std::env::current_exe().ok(),
        }
    }

    fn forward_attached(
        &self,
        process: &mut SpawnedProcess,
        stdout: Option<(ChildStdout, StreamLabel)>,
        stderr: Option<(ChildStderr, StreamLabel)>,
    ) -> io::Result<()> {
        if let Some((stream, label)) = stdout {
            let handle = spawn_forwarder(stream, LineTagger::new(label, self.use_color))?;
            process.forwarders.push(handle);
        }
        if let Some((stream, label)) = stderr {
            let handle = spawn_forwarder(stream, LineTagger::new(label, self.use_color))?;
            process.forwarders.push(handle);
        }
        Ok(())
    }

    fn forward_detached(&self, source: Stdio, label: StreamLabel) -> io::Result<()> {
        let binary = self.forwarder_binary.as_deref().ok_or_else(|| {
            io::Error::new(
                io::ErrorKind::NotFound,
                "cannot locate the gotrade executable for output forwarding",
            )
        })?;
        // The forwarder is reparented once this invocation exits and ends
        // when the service closes its end of the pipe.
        let forwarder = Command::new(binary)
            .arg("tag-output")
            .arg(label.as_str())
            .stdin(source)
            .stdout(Stdio::inherit())
            .stderr(Stdio::null())
            .spawn()?;
        debug!(target: HOST_TARGET, pid = forwarder.id(), %label, "output forwarder started");
        Ok(())
    }
}

fn stdio_for(route: StreamRoute) -> Stdio {
    match route {
        StreamRoute::Discard => Stdio::null(),
        StreamRoute::Tag(_) => Stdio::piped(),
    }
}

fn tagged<T>(stream: Option<T>, route: StreamRoute) -> Option<(T, StreamLabel)> {
    match route {
        StreamRoute::Tag(label) => stream.map(|stream| (stream, label)),
        StreamRoute::Discard => None,
    }
}

fn status_code(status: ExitStatus) -> i32 {
    status
        .code()
        .or_else(|| status.signal().map(|signal| 128 + signal))
        .unwrap_or(1)
}

fn to_pid(pid: u32) -> io::Result<Pid> {
    i32::try_from(pid)
        .map(Pid::from_raw)
        .map_err(|_| io::Error::new(io::ErrorKind::InvalidInput, format!("pid {pid} out of range")))
}

impl ProcessHost for SystemProcessHost {
    fn run(&self, spec: &CommandSpec) -> io::Result<i32> {
        debug!(target: HOST_TARGET, command = %spec, "running step");
        spec.to_command().stdin(Stdio::null()).status().map(status_code)
    }

    fn spawn(
        &self,
        spec: &CommandSpec,
        plan: &OutputPlan,
        forwarding: Forwarding,
    ) -> io::Result<SpawnedProcess> {
        let mut child = spec
            .to_command()
            .stdin(Stdio::null())
            .stdout(stdio_for(plan.stdout))
            .stderr(stdio_for(plan.stderr))
            .spawn()?;
        let stdout = tagged(child.stdout.take(), plan.stdout);
        let stderr = tagged(child.stderr.take(), plan.stderr);
        let mut process = SpawnedProcess {
            pid: child.id(),
            child: Some(child),
            forwarders: Vec::new(),
        };
        match forwarding {
            Forwarding::Attached => self.forward_attached(&mut process, stdout, stderr)?,
            Forwarding::Detached => {
                if let Some((stream, label)) = stdout {
                    self.forward_detached(Stdio::from(stream), label)?;
                }
                if let Some((stream, label)) = stderr {
                    self.forward_detached(Stdio::from(stream), label)?;
                }
            }
        }
        Ok(process)
    }

    fn try_wait(&self, process: &mut SpawnedProcess) -> io::Result<Option<i32>> {
        match process.child.as_mut() {
            Some(child) => Ok(child.try_wait()?.map(status_code)),
            None if self.is_alive(process.pid) => Ok(None),
            None => Ok(Some(0)),
        }
    }

    fn is_alive(&self, pid: u32) -> bool {
        let Ok(pid) = to_pid(pid) else {
            return false;
        };
        match kill(pid, None) {
            Ok(()) | Err(Errno::EPERM) => true,
            Err(_) => false,
        }
    }

    fn signal(&self, pid: u32, signal: ProcessSignal) -> io::Result<()> {
        debug!(target: HOST_TARGET, pid, %signal, "signalling process");
        kill(to_pid(pid)?, signal.as_nix()).map_err(io::Error::from)
    }

    fn kill_matching(&self, pattern: &str) -> io::Result<bool> {
        let status = Command::new("pkill")
            .args(["-KILL", "-f"])
            .arg(pattern)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()?;
        match status.code() {
            Some(0) => Ok(true),
            Some(1) => Ok(false),
            _ => Err(io::Error::other(format!(
                "pkill exited with status {}",
                status_code(status)
            ))),
        }
    }

    fn sleep(&self, duration: Duration) {
        thread::sleep(duration);
    }
}
