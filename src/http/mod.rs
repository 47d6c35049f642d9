//! HTTP forwarding subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection (axum::serve)
//!     → server.rs (proxy handler)
//!     → headers.rs (hop-by-hop stripping)
//!     → director.rs (point the request at the upstream, Host override)
//!     → headers.rs (X-Forwarded-For)
//!     → transport.rs (TLS-aware pooled client, optional logging wrapper)
//!     → upstream
//!     → response streamed back to the client
//!       (101 Switching Protocols → upgrade.rs splices both connections)
//! ```

pub mod director;
pub mod headers;
pub mod server;
pub mod transport;
pub mod upgrade;

pub use director::Director;
pub use server::HttpServer;
pub use transport::{OutboundTransport, TransportBuilder, TransportError};
