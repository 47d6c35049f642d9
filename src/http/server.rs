//! HTTP server setup and the per-request proxy handler.
//!
//! # Responsibilities
//! - Create the Axum router that sends every request to the proxy handler
//! - Rewrite each request through the [`Director`]
//! - Forward via the shared [`OutboundTransport`] and stream the response back
//! - Map upstream failures to 502 Bad Gateway
//! - Hand 101 Switching Protocols answers to the upgrade tunnel
//!
//! # Design Decisions
//! - One forwarding attempt per request, no retries
//! - Response bodies are streamed, never buffered
//! - A dropped client connection drops the in-flight upstream exchange

use std::net::SocketAddr;
use std::sync::Arc;

use axum::{
    body::Body,
    extract::{ConnectInfo, State},
    http::{Request, StatusCode, Version},
    response::{IntoResponse, Response},
    Router,
};
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;

use crate::config::ValidatedConfig;
use crate::http::director::Director;
use crate::http::headers::{append_forwarded_for, strip_hop_by_hop};
use crate::http::transport::{OutboundTransport, TransportBuilder, TransportError};
use crate::http::upgrade;
use crate::lifecycle::shutdown::ShutdownSignal;

/// Application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    pub director: Arc<Director>,
    pub transport: OutboundTransport,
}

/// HTTP server for the forwarder.
pub struct HttpServer {
    router: Router,
    config: ValidatedConfig,
}

impl HttpServer {
    /// Create a server, building the outbound transport from `config`.
    pub fn new(config: ValidatedConfig) -> Result<Self, TransportError> {
        let transport = TransportBuilder::new(&config).build()?;
        Ok(Self::with_transport(config, transport))
    }

    /// Create a server around an already composed transport.
    pub fn with_transport(config: ValidatedConfig, transport: OutboundTransport) -> Self {
        let director = Director::new(config.upstream.clone(), config.host_override.clone());
        let state = AppState {
            director: Arc::new(director),
            transport,
        };

        Self {
            router: Self::build_router(state),
            config,
        }
    }

    fn build_router(state: AppState) -> Router {
        Router::new()
            .fallback(proxy_handler)
            .with_state(state)
            .layer(TraceLayer::new_for_http())
    }

    /// Run the server until `shutdown` fires, then drain in-flight requests.
    pub async fn run(
        self,
        listener: TcpListener,
        shutdown: ShutdownSignal,
    ) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(
            address = %addr,
            upstream = %self.config.upstream,
            "Starting reverse proxy server"
        );

        let app = self.router.into_make_service_with_connect_info::<SocketAddr>();

        axum::serve(listener, app)
            .with_graceful_shutdown(async move {
                let reason = shutdown.recv().await;
                tracing::info!(%reason, "Draining in-flight requests");
            })
            .await?;

        tracing::info!("HTTP server stopped");
        Ok(())
    }

    /// Get a reference to the config.
    pub fn config(&self) -> &ValidatedConfig {
        &self.config
    }

    /// The router, for driving the server without a socket.
    pub fn into_router(self) -> Router {
        self.router
    }
}

/// Main proxy handler.
/// Rewrites the request, forwards it, and relays the upstream response.
async fn proxy_handler(
    State(state): State<AppState>,
    ConnectInfo(peer): ConnectInfo<SocketAddr>,
    mut request: Request<Body>,
) -> Response {
    let method = request.method().clone();
    let path = request.uri().path().to_string();

    let requested_upgrade = upgrade::requested_protocol(request.headers())
        .map(|protocol| (protocol, hyper::upgrade::on(&mut request)));

    // Before the rewrite, so nothing listed in `Connection` can remove the Host it sets.
    strip_hop_by_hop(request.headers_mut());

    let mut outbound = match state.director.rewrite(request) {
        Ok(outbound) => outbound,
        Err(e) => {
            tracing::warn!(
                method = %method,
                path = %path,
                error = %e,
                "Cannot rewrite request target"
            );
            return (StatusCode::BAD_REQUEST, "Invalid request target").into_response();
        }
    };

    *outbound.version_mut() = Version::HTTP_11;
    append_forwarded_for(outbound.headers_mut(), peer.ip());

    let client_upgrade = match requested_upgrade {
        Some((protocol, on_upgrade)) => {
            upgrade::restore_upgrade_headers(outbound.headers_mut(), protocol);
            Some(on_upgrade)
        }
        None => None,
    };

    match state.transport.send(outbound).await {
        Ok(mut response) => {
            tracing::debug!(
                method = %method,
                path = %path,
                status = %response.status(),
                "Upstream responded"
            );

            if response.status() == StatusCode::SWITCHING_PROTOCOLS {
                if let Some(client_upgrade) = client_upgrade {
                    let upstream_upgrade = hyper::upgrade::on(&mut response);
                    upgrade::spawn_tunnel(client_upgrade, upstream_upgrade);
                    let (parts, _) = response.into_parts();
                    return Response::from_parts(parts, Body::empty());
                }
            }

            strip_hop_by_hop(response.headers_mut());
            response
        }
        Err(e) => {
            tracing::error!(method = %method, path = %path, error = %e, "Upstream error");
            (StatusCode::BAD_GATEWAY, "Upstream request failed").into_response()
        }
    }
}
