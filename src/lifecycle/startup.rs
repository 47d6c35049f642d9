//! Startup orchestration.
//!
//! # Responsibilities
//! - Validate configuration
//! - Run the daemon decision before any runtime or socket exists
//! - Build the outbound transport, bind the listener, serve until shutdown
//!
//! # Design Decisions
//! - Fail fast: any startup error is fatal and maps to a non-zero exit
//! - The listener binds last, after the transport is ready

use std::net::SocketAddr;

use tokio::net::TcpListener;

use crate::config::{ConfigError, ProxyConfig, ValidatedConfig};
use crate::http::{HttpServer, TransportError};
use crate::lifecycle::daemon::{DaemonError, DaemonSupervisor, Decision};
use crate::lifecycle::signals::spawn_signal_listener;
use crate::lifecycle::Shutdown;

/// Anything that stops the proxy from starting.
#[derive(Debug, thiserror::Error)]
pub enum StartupError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Daemon(#[from] DaemonError),

    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error("failed to start async runtime: {0}")]
    Runtime(#[source] std::io::Error),

    #[error("failed to bind {addr}: {source}")]
    Bind {
        addr: SocketAddr,
        #[source]
        source: std::io::Error,
    },

    #[error("server error: {0}")]
    Serve(#[source] std::io::Error),
}

/// Validate, decide the daemon role, then serve on a fresh Tokio runtime.
pub fn run(config: ProxyConfig) -> Result<(), StartupError> {
    let config = config.validate()?;

    tracing::debug!(config = ?config, "Configuration loaded");

    match DaemonSupervisor::from_env(config.config.daemon).decide()? {
        Decision::Detached { .. } => return Ok(()),
        Decision::Serve => {}
    }

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .map_err(StartupError::Runtime)?;

    runtime.block_on(serve(config))
}

/// Build the transport, bind, and serve until a termination signal.
pub async fn serve(config: ValidatedConfig) -> Result<(), StartupError> {
    let server = HttpServer::new(config)?;

    let addr = server.config().listen_addr;
    let listener = TcpListener::bind(addr)
        .await
        .map_err(|source| StartupError::Bind { addr, source })?;

    let shutdown = Shutdown::new();
    let server_shutdown = shutdown.signal();
    spawn_signal_listener(shutdown);

    server
        .run(listener, server_shutdown)
        .await
        .map_err(StartupError::Serve)?;

    tracing::info!("Shutdown complete");
    Ok(())
}
