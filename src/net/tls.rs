//! Upstream TLS trust configuration.
//!
//! # Responsibilities
//! - Build the rustls client config used for every upstream handshake
//! - Load extra trust roots from a PEM bundle
//! - Derive the fixed TLS server name from a Host override
//! - Provide the verification bypass behind `--insecure`

use std::fs::File;
use std::io::BufReader;
use std::path::Path;
use std::str::FromStr;
use std::sync::Arc;

use axum::http::uri::Authority;
use axum::http::HeaderValue;
use rustls::client::danger::{HandshakeSignatureValid, ServerCertVerified, ServerCertVerifier};
use rustls::crypto::{ring, CryptoProvider};
use rustls::pki_types::{CertificateDer, ServerName, UnixTime};
use rustls::{ClientConfig, DigitallySignedStruct, RootCertStore, SignatureScheme};

use crate::http::transport::TransportError;

fn crypto_provider() -> Arc<CryptoProvider> {
    Arc::new(ring::default_provider())
}

/// Certificate verifier that accepts any server certificate.
///
/// # Warning
/// This disables all TLS identity checks. Only use it against upstreams on a
/// network you already trust.
#[derive(Debug)]
pub struct NoVerifier {
    schemes: Vec<SignatureScheme>,
}

impl NoVerifier {
    pub fn new() -> Self {
        Self {
            schemes: crypto_provider()
                .signature_verification_algorithms
                .supported_schemes(),
        }
    }
}

impl Default for NoVerifier {
    fn default() -> Self {
        Self::new()
    }
}

impl ServerCertVerifier for NoVerifier {
    fn verify_server_cert(
        &self,
        _end_entity: &CertificateDer<'_>,
        _intermediates: &[CertificateDer<'_>],
        _server_name: &ServerName<'_>,
        _ocsp_response: &[u8],
        _now: UnixTime,
    ) -> Result<ServerCertVerified, rustls::Error> {
        Ok(ServerCertVerified::assertion())
    }

    fn verify_tls12_signature(
        &self,
        _message: &[u8],
        _cert: &CertificateDer<'_>,
        _dss: &DigitallySignedStruct,
    ) -> Result<HandshakeSignatureValid, rustls::Error> {
        Ok(HandshakeSignatureValid::assertion())
    }

    fn verify_tls13_signature(
        &self,
        _message: &[u8],
        _cert: &CertificateDer<'_>,
        _dss: &DigitallySignedStruct,
    ) -> Result<HandshakeSignatureValid, rustls::Error> {
        Ok(HandshakeSignatureValid::assertion())
    }

    fn supported_verify_schemes(&self) -> Vec<SignatureScheme> {
        self.schemes.clone()
    }
}

/// Build the client config for upstream handshakes.
///
/// With `insecure` set the certificate chain is never checked and `ca_file`
/// is ignored. Otherwise the bundled Mozilla roots are trusted, plus every
/// certificate in `ca_file`.
pub fn build_client_config(
    insecure: bool,
    ca_file: Option<&Path>,
) -> Result<ClientConfig, TransportError> {
    let builder = ClientConfig::builder_with_provider(crypto_provider())
        .with_safe_default_protocol_versions()
        .map_err(TransportError::Tls)?;

    let config = if insecure {
        tracing::warn!("TLS certificate verification DISABLED for the upstream");
        builder
            .dangerous()
            .with_custom_certificate_verifier(Arc::new(NoVerifier::new()))
            .with_no_client_auth()
    } else {
        builder
            .with_root_certificates(root_store(ca_file)?)
            .with_no_client_auth()
    };

    Ok(config)
}

fn root_store(ca_file: Option<&Path>) -> Result<RootCertStore, TransportError> {
    let mut roots = RootCertStore::empty();
    roots.extend(webpki_roots::TLS_SERVER_ROOTS.iter().cloned());

    if let Some(path) = ca_file {
        let certs = load_certificates(path)?;
        let count = certs.len();
        for cert in certs {
            roots.add(cert).map_err(TransportError::Tls)?;
        }
        tracing::info!(path = ?path, certificates = count, "Loaded extra trust roots");
    }

    Ok(roots)
}

fn load_certificates(path: &Path) -> Result<Vec<CertificateDer<'static>>, TransportError> {
    let io_err = |source| TransportError::CaFile {
        path: path.to_path_buf(),
        source,
    };

    let file = File::open(path).map_err(io_err)?;
    let mut reader = BufReader::new(file);
    let certs = rustls_pemfile::certs(&mut reader)
        .collect::<Result<Vec<_>, _>>()
        .map_err(io_err)?;

    if certs.is_empty() {
        return Err(TransportError::NoCertificates(path.to_path_buf()));
    }
    Ok(certs)
}

/// TLS server name for a Host override: the host part, without port or
/// IPv6 brackets.
pub fn server_name_for(host: &HeaderValue) -> Result<ServerName<'static>, TransportError> {
    let raw = host.to_str().map_err(|_| {
        TransportError::InvalidServerName(String::from_utf8_lossy(host.as_bytes()).into_owned())
    })?;

    let host_only = match Authority::from_str(raw) {
        Ok(authority) => authority.host().to_string(),
        Err(_) => raw.to_string(),
    };
    let host_only = host_only.trim_start_matches('[').trim_end_matches(']').to_string();

    ServerName::try_from(host_only).map_err(|_| TransportError::InvalidServerName(raw.to_string()))
}
