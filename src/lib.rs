//! nexthop: a single-hop HTTP reverse proxy.
//!
//! Every inbound request is rewritten toward one fixed upstream, optionally
//! with an overridden Host header and TLS server name, forwarded over a
//! shared pooled client, and the response is streamed back.
//!
//! # Architecture Overview
//!
//! ```text
//!  Client ──▶ http::server ──▶ http::director ──▶ http::transport ──▶ Upstream
//!         ◀──────────────── streamed response ◀──────────────────────
//!
//!  startup: config ─▶ lifecycle::daemon ─▶ transport build ─▶ bind ─▶ serve
//! ```

// Core subsystems
pub mod config;
pub mod http;
pub mod net;

// Cross-cutting concerns
pub mod lifecycle;
pub mod observability;

pub use config::{ProxyConfig, ValidatedConfig};
pub use http::HttpServer;
pub use lifecycle::Shutdown;
