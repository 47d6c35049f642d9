//! Configuration validation.
//!
//! # Responsibilities
//! - Parse the upstream URL into an [`UpstreamTarget`]
//! - Check the Host override is a legal header value
//! - Resolve the listen address
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: ProxyConfig → Result<ValidatedConfig, Vec<ValidationError>>
//! - Runs before the daemon decision so the launcher can still report failures

use std::fmt;
use std::net::{SocketAddr, ToSocketAddrs};
use std::str::FromStr;

use axum::http::uri::{Authority, Scheme};
use axum::http::HeaderValue;
use url::Url;

use crate::config::schema::ProxyConfig;

/// A single semantic problem with the configuration.
#[derive(Debug, thiserror::Error)]
pub enum ValidationError {
    #[error("invalid upstream URL {url:?}: {source}")]
    UpstreamUrl {
        url: String,
        #[source]
        source: url::ParseError,
    },

    #[error("unsupported upstream scheme {0:?} (expected http or https)")]
    UnsupportedScheme(String),

    #[error("upstream URL {0:?} has no host")]
    MissingHost(String),

    #[error("upstream authority {0:?} is not valid")]
    InvalidAuthority(String),

    #[error("host header override {0:?} is not a valid header value")]
    InvalidHostHeader(String),

    #[error("invalid listen address {0:?}")]
    ListenAddress(String),
}

/// The fixed destination every request is forwarded to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpstreamTarget {
    scheme: Scheme,
    authority: Authority,
    base_path: String,
    base_query: Option<String>,
    host_header: HeaderValue,
}

impl UpstreamTarget {
    /// Parse and validate an upstream base URL.
    pub fn parse(raw: &str) -> Result<Self, ValidationError> {
        let url = Url::parse(raw).map_err(|source| ValidationError::UpstreamUrl {
            url: raw.to_string(),
            source,
        })?;

        let scheme = match url.scheme() {
            "http" => Scheme::HTTP,
            "https" => Scheme::HTTPS,
            other => return Err(ValidationError::UnsupportedScheme(other.to_string())),
        };

        let host = url
            .host_str()
            .filter(|h| !h.is_empty())
            .ok_or_else(|| ValidationError::MissingHost(raw.to_string()))?;

        let authority = match url.port() {
            Some(port) => format!("{host}:{port}"),
            None => host.to_string(),
        };
        let host_header = HeaderValue::from_str(&authority)
            .map_err(|_| ValidationError::InvalidAuthority(authority.clone()))?;
        let authority = Authority::from_str(&authority)
            .map_err(|_| ValidationError::InvalidAuthority(authority.clone()))?;

        Ok(Self {
            scheme,
            authority,
            base_path: url.path().to_string(),
            base_query: url.query().filter(|q| !q.is_empty()).map(str::to_owned),
            host_header,
        })
    }

    pub fn scheme(&self) -> &Scheme {
        &self.scheme
    }

    /// Host and optional explicit port, as sent in the default Host header.
    pub fn authority(&self) -> &Authority {
        &self.authority
    }

    /// Default Host header value: the authority as written in the URL.
    pub fn host_header(&self) -> &HeaderValue {
        &self.host_header
    }

    pub fn base_path(&self) -> &str {
        &self.base_path
    }

    pub fn base_query(&self) -> Option<&str> {
        self.base_query.as_deref()
    }

    pub fn is_tls(&self) -> bool {
        self.scheme == Scheme::HTTPS
    }
}

impl fmt::Display for UpstreamTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}://{}{}", self.scheme, self.authority, self.base_path)?;
        if let Some(query) = &self.base_query {
            write!(f, "?{query}")?;
        }
        Ok(())
    }
}

/// Configuration after every field has been checked.
#[derive(Debug, Clone)]
pub struct ValidatedConfig {
    pub config: ProxyConfig,
    pub upstream: UpstreamTarget,
    pub host_override: Option<HeaderValue>,
    pub listen_addr: SocketAddr,
}

/// Validate a configuration, collecting every error found.
pub fn validate_config(config: &ProxyConfig) -> Result<ValidatedConfig, Vec<ValidationError>> {
    let mut errors = Vec::new();

    let upstream = UpstreamTarget::parse(config.upstream.trim())
        .map_err(|e| errors.push(e))
        .ok();

    let host_override = match config.host_header.as_deref().map(str::trim) {
        None | Some("") => None,
        Some(host) => HeaderValue::from_str(host)
            .map_err(|_| errors.push(ValidationError::InvalidHostHeader(host.to_string())))
            .ok(),
    };

    let listen_addr = parse_listen_address(&config.listen)
        .map_err(|e| errors.push(e))
        .ok();

    match (upstream, listen_addr) {
        (Some(upstream), Some(listen_addr)) if errors.is_empty() => Ok(ValidatedConfig {
            config: config.clone(),
            upstream,
            host_override,
            listen_addr,
        }),
        _ => Err(errors),
    }
}

/// Resolve a listen address.
///
/// A bare `:port` binds every IPv4 interface (`0.0.0.0`). IPv6 listeners
/// need an explicit address such as `[::]:8000`.
pub fn parse_listen_address(raw: &str) -> Result<SocketAddr, ValidationError> {
    let raw = raw.trim();
    let candidate = match raw.strip_prefix(':') {
        Some(port) => format!("0.0.0.0:{port}"),
        None => raw.to_string(),
    };

    if let Ok(addr) = candidate.parse::<SocketAddr>() {
        return Ok(addr);
    }

    candidate
        .to_socket_addrs()
        .ok()
        .and_then(|mut addrs| addrs.next())
        .ok_or_else(|| ValidationError::ListenAddress(raw.to_string()))
}
