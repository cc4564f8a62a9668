//! mTLS server configuration: require and verify a client certificate signed
//! by the configured CA (§6 — "TLS 1.2+ with mutual client auth").

use std::path::Path;
use std::sync::Arc;

use axum_server::tls_rustls::RustlsConfig;
use referral_core::error::{ReferralError, ReferralResult};
use rustls::server::WebPkiClientVerifier;
use rustls::RootCertStore;

fn load_certs(path: &Path) -> ReferralResult<Vec<rustls::pki_types::CertificateDer<'static>>> {
    let bytes = std::fs::read(path)?;
    rustls_pemfile::certs(&mut bytes.as_slice())
        .collect::<Result<Vec<_>, _>>()
        .map_err(ReferralError::from)
}

fn load_key(path: &Path) -> ReferralResult<rustls::pki_types::PrivateKeyDer<'static>> {
    let bytes = std::fs::read(path)?;
    rustls_pemfile::private_key(&mut bytes.as_slice())
        .map_err(ReferralError::from)?
        .ok_or_else(|| {
            ReferralError::Validation(format!("no private key found in {}", path.display()))
        })
}

/// Builds the rustls server config that `axum_server::bind_rustls` uses: the
/// coordinator's own cert/key plus a client-verifier that trusts only
/// certificates chained to `ca_file`.
pub async fn mtls_config(
    cert_file: &Path,
    key_file: &Path,
    ca_file: &Path,
) -> ReferralResult<RustlsConfig> {
    let certs = load_certs(cert_file)?;
    let key = load_key(key_file)?;

    let mut roots = RootCertStore::empty();
    for ca_cert in load_certs(ca_file)? {
        roots
            .add(ca_cert)
            .map_err(|e| ReferralError::Validation(format!("invalid CA certificate: {e}")))?;
    }
    let client_verifier = WebPkiClientVerifier::builder(Arc::new(roots))
        .build()
        .map_err(|e| ReferralError::Validation(format!("invalid client verifier setup: {e}")))?;

    let mut config = rustls::ServerConfig::builder()
        .with_client_cert_verifier(client_verifier)
        .with_single_cert(certs, key)
        .map_err(|e| ReferralError::Validation(format!("invalid server certificate: {e}")))?;
    config.alpn_protocols = vec![b"h2".to_vec(), b"http/1.1".to_vec()];

    Ok(RustlsConfig::from_config(Arc::new(config)))
}
