//! Shared utilities for integration testing.

#![allow(dead_code)]

use std::net::SocketAddr;
use std::sync::Arc;

use nexthop::config::ProxyConfig;
use nexthop::http::HttpServer;
use nexthop::lifecycle::Shutdown;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::net::TcpListener;
use tokio_rustls::rustls;
use tokio_rustls::TlsAcceptor;

/// What the mock upstream saw, echoed back as the response body.
///
/// Body format, one item per line:
/// `<METHOD> <target>`, `host: <Host>`, `xff: <X-Forwarded-For>`,
/// `sni: <server name>` (TLS only), `body: <request body>`.
async fn echo_one<S>(mut stream: S, sni: Option<String>)
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let mut buf = Vec::new();
    let mut chunk = [0u8; 4096];
    let header_end = loop {
        match stream.read(&mut chunk).await {
            Ok(0) | Err(_) => return,
            Ok(n) => buf.extend_from_slice(&chunk[..n]),
        }
        if let Some(pos) = buf.windows(4).position(|w| w == b"\r\n\r\n") {
            break pos + 4;
        }
    };

    let head = String::from_utf8_lossy(&buf[..header_end]).to_string();
    let mut lines = head.split("\r\n");
    let request_line = lines.next().unwrap_or_default().to_string();

    let mut host = String::new();
    let mut xff = String::new();
    let mut content_length = 0usize;
    for line in lines {
        if let Some((name, value)) = line.split_once(':') {
            let value = value.trim().to_string();
            match name.trim().to_ascii_lowercase().as_str() {
                "host" => host = value,
                "x-forwarded-for" => xff = value,
                "content-length" => content_length = value.parse().unwrap_or(0),
                _ => {}
            }
        }
    }

    let mut body = buf[header_end..].to_vec();
    while body.len() < content_length {
        match stream.read(&mut chunk).await {
            Ok(0) | Err(_) => break,
            Ok(n) => body.extend_from_slice(&chunk[..n]),
        }
    }

    let method_and_target = request_line
        .rsplit_once(' ')
        .map(|(left, _version)| left.to_string())
        .unwrap_or(request_line);

    let mut echo = format!("{method_and_target}\nhost: {host}\nxff: {xff}\n");
    if let Some(sni) = sni {
        echo.push_str(&format!("sni: {sni}\n"));
    }
    echo.push_str(&format!("body: {}\n", String::from_utf8_lossy(&body)));

    let response = format!(
        "HTTP/1.1 200 OK\r\nContent-Length: {}\r\nX-Upstream: echo\r\nConnection: close\r\n\r\n{}",
        echo.len(),
        echo
    );
    let _ = stream.write_all(response.as_bytes()).await;
    let _ = stream.shutdown().await;
}

/// Start a plain-HTTP upstream that echoes what it received.
pub async fn start_echo_upstream() -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    serve_echo(listener)
}

/// Start the echo upstream on a specific address.
pub async fn start_echo_upstream_on(addr: SocketAddr) -> SocketAddr {
    let listener = TcpListener::bind(addr).await.unwrap();
    serve_echo(listener)
}

fn serve_echo(listener: TcpListener) -> SocketAddr {
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        while let Ok((socket, _)) = listener.accept().await {
            tokio::spawn(echo_one(socket, None));
        }
    });
    addr
}

/// Start an upstream that accepts `Upgrade: <protocol>` with 101 and then
/// echoes raw bytes back until the client closes.
pub async fn start_upgrade_upstream(protocol: &'static str) -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        while let Ok((mut socket, _)) = listener.accept().await {
            tokio::spawn(async move {
                let mut buf = Vec::new();
                let mut chunk = [0u8; 4096];
                while !buf.windows(4).any(|w| w == b"\r\n\r\n") {
                    match socket.read(&mut chunk).await {
                        Ok(0) | Err(_) => return,
                        Ok(n) => buf.extend_from_slice(&chunk[..n]),
                    }
                }

                let head = String::from_utf8_lossy(&buf).to_ascii_lowercase();
                if !head.contains(&format!("upgrade: {protocol}\r\n")) {
                    let refusal: &[u8] = b"HTTP/1.1 400 Bad Request\r\n\
                        Content-Length: 0\r\nConnection: close\r\n\r\n";
                    let _ = socket.write_all(refusal).await;
                    return;
                }

                let switching = format!(
                    "HTTP/1.1 101 Switching Protocols\r\n\
                     Connection: upgrade\r\nUpgrade: {protocol}\r\n\r\n"
                );
                if socket.write_all(switching.as_bytes()).await.is_err() {
                    return;
                }

                let (mut reader, mut writer) = socket.split();
                let _ = tokio::io::copy(&mut reader, &mut writer).await;
            });
        }
    });

    addr
}

/// A self-signed certificate valid for `names`, as (PEM, rustls server config).
pub fn self_signed(names: &[&str]) -> (String, Arc<rustls::ServerConfig>) {
    let certified =
        rcgen::generate_simple_self_signed(names.iter().map(|n| n.to_string()).collect::<Vec<_>>())
            .unwrap();

    let key = rustls::pki_types::PrivateKeyDer::Pkcs8(
        rustls::pki_types::PrivatePkcs8KeyDer::from(certified.key_pair.serialize_der()),
    );

    let config = rustls::ServerConfig::builder_with_provider(Arc::new(
        rustls::crypto::ring::default_provider(),
    ))
    .with_safe_default_protocol_versions()
    .unwrap()
    .with_no_client_auth()
    .with_single_cert(vec![certified.cert.der().clone()], key)
    .unwrap();

    (certified.cert.pem(), Arc::new(config))
}

/// Start a TLS upstream presenting a self-signed certificate for `names`.
///
/// Returns the address and the certificate PEM. The echoed body includes the
/// SNI the client sent.
pub async fn start_tls_echo_upstream(names: &[&str]) -> (SocketAddr, String) {
    let (pem, config) = self_signed(names);
    let acceptor = TlsAcceptor::from(config);
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        while let Ok((socket, _)) = listener.accept().await {
            let acceptor = acceptor.clone();
            tokio::spawn(async move {
                // Handshake failures are expected when the client refuses the certificate.
                if let Ok(stream) = acceptor.accept(socket).await {
                    let sni = stream.get_ref().1.server_name().map(str::to_string);
                    echo_one(stream, sni).await;
                }
            });
        }
    });

    (addr, pem)
}

/// An address nothing is listening on.
pub fn unused_addr() -> SocketAddr {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    listener.local_addr().unwrap()
}

/// Start the proxy on an ephemeral port.
pub async fn start_proxy(mut config: ProxyConfig) -> (SocketAddr, Shutdown) {
    config.listen = "127.0.0.1:0".to_string();
    let config = config.validate().unwrap();

    let server = HttpServer::new(config).unwrap();
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    let shutdown = Shutdown::new();
    let server_shutdown = shutdown.signal();
    tokio::spawn(async move {
        let _ = server.run(listener, server_shutdown).await;
    });

    (addr, shutdown)
}

pub fn client() -> reqwest::Client {
    reqwest::Client::builder()
        .pool_max_idle_per_host(0)
        .no_proxy()
        .build()
        .unwrap()
}
