//! Network layer subsystem.
//!
//! Upstream TLS trust lives here; listening sockets are plain Tokio
//! `TcpListener`s bound in `lifecycle::startup`.

pub mod tls;
