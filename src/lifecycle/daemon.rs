//! Background relaunch ("daemon mode").
//!
//! # Responsibilities
//! - Decide once at startup whether this process is the foreground launcher
//!   or the relaunched background worker
//! - Relaunch the current executable detached, with the sentinel set
//!
//! # Design Decisions
//! - Role comes only from the `NEXTHOP_FORKED` environment sentinel
//! - Exactly one decision per process; no further transitions
//! - A failed relaunch is fatal: the launcher never falls back to serving
//! - Spawning sits behind [`Spawner`] so the decision is testable

use std::ffi::OsString;
use std::path::PathBuf;
use std::process::{Command, Stdio};

/// Environment variable marking the relaunched background worker.
pub const SENTINEL_VAR: &str = "NEXTHOP_FORKED";

/// Value of [`SENTINEL_VAR`] the worker is started with.
pub const SENTINEL_VALUE: &str = "1";

/// Which side of the relaunch this process is on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DaemonRole {
    ForegroundLauncher,
    BackgroundWorker,
}

impl DaemonRole {
    /// Read the role from the process environment.
    pub fn detect() -> Self {
        Self::from_marker(std::env::var(SENTINEL_VAR).ok().as_deref())
    }

    /// Role for a given sentinel value (`None` when unset).
    pub fn from_marker(marker: Option<&str>) -> Self {
        match marker {
            Some(SENTINEL_VALUE) => DaemonRole::BackgroundWorker,
            _ => DaemonRole::ForegroundLauncher,
        }
    }
}

/// Outcome of the startup decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    /// Carry on: build the transport and serve.
    Serve,
    /// A background worker was started; this process should exit successfully.
    Detached { pid: u32 },
}

#[derive(Debug, thiserror::Error)]
pub enum DaemonError {
    #[error("cannot determine the current executable: {0}")]
    CurrentExe(#[source] std::io::Error),

    #[error("failed to relaunch in the background: {0}")]
    Spawn(#[source] std::io::Error),
}

/// How to re-invoke this program as the background worker.
#[derive(Debug, Clone)]
pub struct Relaunch {
    program: PathBuf,
    args: Vec<OsString>,
}

impl Relaunch {
    pub fn new(
        program: impl Into<PathBuf>,
        args: impl IntoIterator<Item = impl Into<OsString>>,
    ) -> Self {
        Self {
            program: program.into(),
            args: args.into_iter().map(Into::into).collect(),
        }
    }

    /// The running executable with its original arguments.
    pub fn current() -> Result<Self, DaemonError> {
        let program = std::env::current_exe().map_err(DaemonError::CurrentExe)?;
        Ok(Self::new(program, std::env::args_os().skip(1)))
    }

    /// Detached command: same program and arguments, sentinel set, stdio
    /// closed, and on Unix its own process group.
    pub fn command(&self) -> Command {
        let mut command = Command::new(&self.program);
        command
            .args(&self.args)
            .env(SENTINEL_VAR, SENTINEL_VALUE)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null());

        #[cfg(unix)]
        {
            use std::os::unix::process::CommandExt;
            command.process_group(0);
        }

        command
    }
}

/// Starts the background worker.
pub trait Spawner {
    /// Spawn the worker and return its process id.
    fn spawn(&mut self) -> Result<u32, DaemonError>;
}

/// Spawns a real child process from a [`Relaunch`].
#[derive(Debug, Default)]
pub struct ProcessSpawner;

impl Spawner for ProcessSpawner {
    fn spawn(&mut self) -> Result<u32, DaemonError> {
        let relaunch = Relaunch::current()?;
        let child = relaunch.command().spawn().map_err(DaemonError::Spawn)?;
        Ok(child.id())
    }
}

/// The two-state startup supervisor.
#[derive(Debug)]
pub struct DaemonSupervisor<S> {
    role: DaemonRole,
    daemon_requested: bool,
    spawner: S,
}

impl DaemonSupervisor<ProcessSpawner> {
    /// Supervisor for the current process.
    pub fn from_env(daemon_requested: bool) -> Self {
        Self::new(DaemonRole::detect(), daemon_requested, ProcessSpawner)
    }
}

impl<S: Spawner> DaemonSupervisor<S> {
    pub fn new(role: DaemonRole, daemon_requested: bool, spawner: S) -> Self {
        Self {
            role,
            daemon_requested,
            spawner,
        }
    }

    /// Make the one startup decision.
    pub fn decide(mut self) -> Result<Decision, DaemonError> {
        match (self.role, self.daemon_requested) {
            (DaemonRole::ForegroundLauncher, true) => {
                let pid = self.spawner.spawn()?;
                tracing::info!(pid, "Relaunched in background");
                Ok(Decision::Detached { pid })
            }
            (DaemonRole::BackgroundWorker, _) => {
                tracing::debug!(pid = std::process::id(), "Running as background worker");
                Ok(Decision::Serve)
            }
            (DaemonRole::ForegroundLauncher, false) => Ok(Decision::Serve),
        }
    }
}
