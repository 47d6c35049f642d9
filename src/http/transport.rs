//! Outbound transport construction.
//!
//! # Responsibilities
//! - Build the pooled HTTP/HTTPS client used for every forwarded request
//! - Apply the TLS trust policy and the fixed server name
//! - Optionally wrap the client with a request-logging decorator
//!
//! # Design Decisions
//! - Composition order is fixed: TLS config → client → logging wrapper
//! - The composed transport is built once and shared read-only via `Arc`
//! - Callers never inspect which layers are present

use std::future::Future;
use std::path::PathBuf;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use axum::body::Body;
use axum::http::{Request, Response};
use hyper_rustls::{FixedServerNameResolver, HttpsConnector, HttpsConnectorBuilder};
use hyper_util::client::legacy::connect::HttpConnector;
use hyper_util::client::legacy::Client;
use hyper_util::rt::{TokioExecutor, TokioTimer};

use crate::config::ValidatedConfig;
use crate::net::tls::{build_client_config, server_name_for};

/// Boxed future returned by [`RoundTrip`] implementations.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Pooled client able to speak plain HTTP and HTTPS.
pub type HttpsClient = Client<HttpsConnector<HttpConnector>, Body>;

/// Error building the outbound transport.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("TLS configuration error: {0}")]
    Tls(#[source] rustls::Error),

    #[error("cannot read CA bundle {path:?}: {source}")]
    CaFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("no certificates found in CA bundle {0:?}")]
    NoCertificates(PathBuf),

    #[error("host override {0:?} is not a valid TLS server name")]
    InvalidServerName(String),
}

/// A single forwarding attempt failed before a response was obtained.
#[derive(Debug, thiserror::Error)]
#[error("upstream request failed: {0}")]
pub struct ForwardError(#[from] hyper_util::client::legacy::Error);

/// One request in, one response (or failure) out.
pub trait RoundTrip: Send + Sync {
    fn round_trip(
        &self,
        request: Request<Body>,
    ) -> BoxFuture<'_, Result<Response<Body>, ForwardError>>;
}

/// The base transport: a pooled hyper-util client.
#[derive(Clone)]
pub struct ClientTransport {
    client: HttpsClient,
}

impl ClientTransport {
    pub fn new(client: HttpsClient) -> Self {
        Self { client }
    }
}

impl RoundTrip for ClientTransport {
    fn round_trip(
        &self,
        request: Request<Body>,
    ) -> BoxFuture<'_, Result<Response<Body>, ForwardError>> {
        Box::pin(async move {
            let response = self.client.request(request).await?;
            let (parts, body) = response.into_parts();
            Ok(Response::from_parts(parts, Body::new(body)))
        })
    }
}

/// Logs method and URL of every request, then delegates unchanged.
pub struct LoggingTransport<T> {
    inner: T,
}

impl<T> LoggingTransport<T> {
    pub fn new(inner: T) -> Self {
        Self { inner }
    }
}

impl<T: RoundTrip> RoundTrip for LoggingTransport<T> {
    fn round_trip(
        &self,
        request: Request<Body>,
    ) -> BoxFuture<'_, Result<Response<Body>, ForwardError>> {
        tracing::info!(
            method = %request.method(),
            url = %request.uri(),
            "Proxying request"
        );
        self.inner.round_trip(request)
    }
}

/// The composed, shareable transport used by every request handler.
#[derive(Clone)]
pub struct OutboundTransport {
    inner: Arc<dyn RoundTrip>,
}

impl OutboundTransport {
    pub fn new(round_trip: impl RoundTrip + 'static) -> Self {
        Self {
            inner: Arc::new(round_trip),
        }
    }

    pub async fn send(&self, request: Request<Body>) -> Result<Response<Body>, ForwardError> {
        self.inner.round_trip(request).await
    }
}

impl std::fmt::Debug for OutboundTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OutboundTransport").finish_non_exhaustive()
    }
}

/// Builds the [`OutboundTransport`] from validated configuration.
pub struct TransportBuilder<'a> {
    config: &'a ValidatedConfig,
}

impl<'a> TransportBuilder<'a> {
    pub fn new(config: &'a ValidatedConfig) -> Self {
        Self { config }
    }

    /// Compose the transport. Performs no network I/O.
    ///
    /// Only the trust material can fail the build. A Host override that is
    /// not a usable TLS server name only loses its SNI role.
    pub fn build(&self) -> Result<OutboundTransport, TransportError> {
        let settings = &self.config.config;

        let tls = build_client_config(settings.insecure_tls, settings.ca_file.as_deref())?;
        if settings.debug {
            tracing::debug!(tls_config = ?tls, "Upstream TLS configuration");
        }

        let mut http = HttpConnector::new();
        http.enforce_http(false);
        http.set_connect_timeout(Some(Duration::from_secs(
            settings.transport.connect_timeout_secs,
        )));

        let connector = HttpsConnectorBuilder::new()
            .with_tls_config(tls)
            .https_or_http();
        let server_name = match &self.config.host_override {
            Some(host) if self.config.upstream.is_tls() => match server_name_for(host) {
                Ok(name) => Some(name),
                Err(e) => {
                    tracing::warn!(error = %e, "Using the upstream host as TLS server name");
                    None
                }
            },
            _ => None,
        };
        let connector = match server_name {
            Some(server_name) => {
                tracing::debug!(server_name = ?server_name, "Fixed TLS server name");
                connector.with_server_name_resolver(FixedServerNameResolver::new(server_name))
            }
            None => connector,
        };
        let connector = connector.enable_http1().wrap_connector(http);

        let client: HttpsClient = Client::builder(TokioExecutor::new())
            .pool_idle_timeout(Duration::from_secs(
                settings.transport.pool_idle_timeout_secs,
            ))
            .pool_max_idle_per_host(settings.transport.max_idle_per_host)
            .pool_timer(TokioTimer::new())
            .build(connector);

        let base = ClientTransport::new(client);
        let transport = if settings.log_requests {
            OutboundTransport::new(LoggingTransport::new(base))
        } else {
            OutboundTransport::new(base)
        };

        tracing::info!(
            upstream = %self.config.upstream,
            insecure_tls = settings.insecure_tls,
            log_requests = settings.log_requests,
            host_override = ?self.config.host_override,
            "Outbound transport ready"
        );

        Ok(transport)
    }
}
