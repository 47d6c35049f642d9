//! Request rewriting toward the upstream.
//!
//! # Responsibilities
//! - Point the request URI at the upstream scheme and authority
//! - Prefix the upstream base path and merge the upstream query
//! - Set the Host header (override when configured, upstream authority otherwise)
//!
//! # Design Decisions
//! - Pure function of (request, target, override); no I/O, never blocks
//! - The override is applied after the base rewrite so it always wins
//! - Method, body and all other headers pass through untouched

use axum::body::Body;
use axum::http::uri::PathAndQuery;
use axum::http::{header, HeaderValue, Request, Uri};

use crate::config::UpstreamTarget;

/// Rewrites inbound requests into requests for the single upstream.
#[derive(Debug, Clone)]
pub struct Director {
    target: UpstreamTarget,
    host_override: Option<HeaderValue>,
}

impl Director {
    pub fn new(target: UpstreamTarget, host_override: Option<HeaderValue>) -> Self {
        Self {
            target,
            host_override,
        }
    }

    /// Produce the outbound request.
    ///
    /// Fails only when the joined path and query do not form a valid URI.
    pub fn rewrite(&self, request: Request<Body>) -> Result<Request<Body>, axum::http::Error> {
        rewrite(request, &self.target, self.host_override.as_ref())
    }
}

/// Rewrite `request` so it is addressed to `target`.
pub fn rewrite(
    request: Request<Body>,
    target: &UpstreamTarget,
    host_override: Option<&HeaderValue>,
) -> Result<Request<Body>, axum::http::Error> {
    let (mut parts, body) = request.into_parts();

    parts.uri = target_uri(&parts.uri, target)?;
    parts
        .headers
        .insert(header::HOST, target.host_header().clone());

    if let Some(host) = host_override {
        parts.headers.insert(header::HOST, host.clone());
    }

    Ok(Request::from_parts(parts, body))
}

fn target_uri(inbound: &Uri, target: &UpstreamTarget) -> Result<Uri, axum::http::Error> {
    let path = join_path(target.base_path(), inbound.path());
    let query = join_query(target.base_query(), inbound.query());

    let path_and_query = match query {
        Some(query) => format!("{path}?{query}"),
        None => path,
    };

    Uri::builder()
        .scheme(target.scheme().clone())
        .authority(target.authority().clone())
        .path_and_query(path_and_query.parse::<PathAndQuery>()?)
        .build()
}

/// Join two paths with exactly one slash between them.
fn join_path(base: &str, path: &str) -> String {
    match (base.ends_with('/'), path.starts_with('/')) {
        (true, true) => format!("{base}{}", &path[1..]),
        (false, false) => format!("{base}/{path}"),
        _ => format!("{base}{path}"),
    }
}

fn join_query(base: Option<&str>, query: Option<&str>) -> Option<String> {
    let base = base.filter(|q| !q.is_empty());
    let query = query.filter(|q| !q.is_empty());
    match (base, query) {
        (Some(base), Some(query)) => Some(format!("{base}&{query}")),
        (Some(only), None) | (None, Some(only)) => Some(only.to_string()),
        (None, None) => None,
    }
}
