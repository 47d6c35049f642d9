//! Protocol upgrade pass-through (WebSocket and friends).
//!
//! # Responsibilities
//! - Detect an inbound `Connection: upgrade` + `Upgrade: <proto>` request
//! - Put the upgrade headers back after hop-by-hop stripping
//! - Splice client and upstream connections once the upstream answers 101
//!
//! # Design Decisions
//! - The proxy never inspects the upgraded byte stream
//! - A non-101 answer is relayed like any other response

use axum::http::header::{self, HeaderMap, HeaderValue};
use hyper::upgrade::OnUpgrade;
use hyper_util::rt::TokioIo;

/// The protocol the client asked to switch to, if any.
pub fn requested_protocol(headers: &HeaderMap) -> Option<HeaderValue> {
    let wants_upgrade = headers
        .get_all(header::CONNECTION)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(','))
        .any(|token| token.trim().eq_ignore_ascii_case("upgrade"));

    if wants_upgrade {
        headers.get(header::UPGRADE).cloned()
    } else {
        None
    }
}

/// Re-add the upgrade request headers on the outbound request.
pub fn restore_upgrade_headers(headers: &mut HeaderMap, protocol: HeaderValue) {
    headers.insert(header::CONNECTION, HeaderValue::from_static("upgrade"));
    headers.insert(header::UPGRADE, protocol);
}

/// Copy bytes both ways between the two upgraded connections until either side closes.
pub fn spawn_tunnel(client: OnUpgrade, upstream: OnUpgrade) {
    tokio::spawn(async move {
        let (client, upstream) = match tokio::try_join!(client, upstream) {
            Ok(pair) => pair,
            Err(e) => {
                tracing::warn!(error = %e, "Connection upgrade failed");
                return;
            }
        };

        let mut client = TokioIo::new(client);
        let mut upstream = TokioIo::new(upstream);
        match tokio::io::copy_bidirectional(&mut client, &mut upstream).await {
            Ok((sent, received)) => {
                tracing::debug!(sent, received, "Upgraded connection closed");
            }
            Err(e) => tracing::debug!(error = %e, "Upgraded connection ended with error"),
        }
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_requested_protocol() {
        let mut headers = HeaderMap::new();
        headers.insert(header::CONNECTION, HeaderValue::from_static("keep-alive, Upgrade"));
        headers.insert(header::UPGRADE, HeaderValue::from_static("websocket"));
        assert_eq!(requested_protocol(&headers).unwrap(), "websocket");

        headers.insert(header::CONNECTION, HeaderValue::from_static("keep-alive"));
        assert!(requested_protocol(&headers).is_none());

        let mut headers = HeaderMap::new();
        headers.insert(header::CONNECTION, HeaderValue::from_static("upgrade"));
        assert!(requested_protocol(&headers).is_none());
    }

    #[test]
    fn test_restore_upgrade_headers() {
        let mut headers = HeaderMap::new();
        restore_upgrade_headers(&mut headers, HeaderValue::from_static("websocket"));
        assert_eq!(headers[header::CONNECTION], "upgrade");
        assert_eq!(headers[header::UPGRADE], "websocket");
    }
}
