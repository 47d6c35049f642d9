//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the proxy.
//! All types derive Serde traits for deserialization from config files.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Root configuration for the forwarder.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ProxyConfig {
    /// Upstream base URL (e.g., "https://httpbin.org/").
    pub upstream: String,

    /// Value sent as the Host header and used as the TLS server name.
    pub host_header: Option<String>,

    /// Listen address (e.g., ":8000" or "127.0.0.1:8000").
    pub listen: String,

    /// Log every outbound request.
    pub log_requests: bool,

    /// Skip upstream certificate verification.
    pub insecure_tls: bool,

    /// Verbose diagnostics.
    pub debug: bool,

    /// Relaunch into the background at startup.
    pub daemon: bool,

    /// Extra PEM trust roots for upstream verification.
    pub ca_file: Option<PathBuf>,

    /// Outbound client tuning.
    pub transport: TransportConfig,
}

impl Default for ProxyConfig {
    fn default() -> Self {
        Self {
            upstream: "https://httpbin.org/".to_string(),
            host_header: None,
            listen: ":8000".to_string(),
            log_requests: false,
            insecure_tls: false,
            debug: false,
            daemon: false,
            ca_file: None,
            transport: TransportConfig::default(),
        }
    }
}

/// Outbound connection pool settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TransportConfig {
    /// TCP connect timeout in seconds.
    pub connect_timeout_secs: u64,

    /// How long an idle pooled connection is kept, in seconds.
    pub pool_idle_timeout_secs: u64,

    /// Maximum idle pooled connections per upstream host.
    pub max_idle_per_host: usize,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            connect_timeout_secs: 30,
            pool_idle_timeout_secs: 90,
            max_idle_per_host: 100,
        }
    }
}
