//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Startup (startup.rs):
//!     Validate config → Daemon decision → Build transport → Bind → Serve
//!
//! Daemon (daemon.rs):
//!     ForegroundLauncher + --daemon → relaunch detached → exit 0
//!     BackgroundWorker (NEXTHOP_FORKED=1) → serve
//!
//! Shutdown (shutdown.rs, signals.rs):
//!     SIGTERM/SIGINT → stop accepting → drain in-flight requests → exit
//! ```

pub mod daemon;
pub mod shutdown;
pub mod signals;
pub mod startup;

pub use daemon::{DaemonRole, DaemonSupervisor, Decision};
pub use shutdown::{Shutdown, ShutdownReason, ShutdownSignal};
pub use startup::StartupError;
