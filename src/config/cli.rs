//! Command-line arguments.
//!
//! Flags overlay whatever the optional config file provides.

use std::path::PathBuf;

use clap::Parser;

use crate::config::loader::{load_config, ConfigError};
use crate::config::schema::ProxyConfig;

#[derive(Parser, Debug, Clone, Default)]
#[command(name = "nexthop", version, about = "Single-hop HTTP reverse proxy", long_about = None)]
pub struct Cli {
    /// Value of the Host header (and TLS server name) sent to the next hop
    #[arg(long = "host", env = "NEXTHOP_HOST", value_name = "HOST")]
    pub host_header: Option<String>,

    /// URL of the next hop (target) server
    #[arg(long = "nexthop", env = "NEXTHOP_URL", value_name = "URL")]
    pub nexthop: Option<String>,

    /// Address to listen on (`:PORT` is IPv4 only; use `[::]:PORT` for IPv6)
    #[arg(long = "listen", env = "NEXTHOP_LISTEN", value_name = "ADDR")]
    pub listen: Option<String>,

    /// Enable request logging
    #[arg(long = "log")]
    pub log_requests: bool,

    /// Run as a daemon
    #[arg(long = "daemon")]
    pub daemon: bool,

    /// Enable debug mode
    #[arg(long = "debug")]
    pub debug: bool,

    /// Ignore upstream TLS certificate errors (unsafe on untrusted networks)
    #[arg(long = "insecure")]
    pub insecure: bool,

    /// Extra PEM trust roots for the upstream
    #[arg(long = "ca-file", env = "NEXTHOP_CA_FILE", value_name = "PEM")]
    pub ca_file: Option<PathBuf>,

    /// Path to a TOML configuration file
    #[arg(short = 'c', long = "config", env = "NEXTHOP_CONFIG", value_name = "FILE")]
    pub config: Option<PathBuf>,
}

impl Cli {
    /// Build the effective configuration: file first, then flags.
    pub fn into_config(self) -> Result<ProxyConfig, ConfigError> {
        let base = match &self.config {
            Some(path) => load_config(path)?,
            None => ProxyConfig::default(),
        };
        Ok(self.apply_to(base))
    }

    /// Overlay explicitly given flags on top of `base`.
    pub fn apply_to(self, mut base: ProxyConfig) -> ProxyConfig {
        if let Some(host) = self.host_header {
            base.host_header = Some(host);
        }
        if let Some(url) = self.nexthop {
            base.upstream = url;
        }
        if let Some(listen) = self.listen {
            base.listen = listen;
        }
        if let Some(ca_file) = self.ca_file {
            base.ca_file = Some(ca_file);
        }
        base.log_requests |= self.log_requests;
        base.daemon |= self.daemon;
        base.debug |= self.debug;
        base.insecure_tls |= self.insecure;
        base
    }
}
