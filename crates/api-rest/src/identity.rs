//! mTLS identity binding (§4.1).
//!
//! axum-server hands the accepted connection to axum as the IO type it was
//! negotiated on; `ClientCertInfo` is populated from that IO via axum's
//! `Connected` trait, the standard way to thread rustls peer-certificate data
//! through to a handler (grounded on the axum-server/rustls combination used
//! in `examples/other_examples/manifests/MystenLabs-sui/Cargo.toml`). The
//! `AuthenticatedHospital` extractor then turns a peer certificate serial
//! into the hospital row it belongs to, or a 400 if there isn't one.

use axum::extract::connect_info::Connected;
use axum::extract::{ConnectInfo, FromRef, FromRequestParts};
use axum::http::request::Parts;
use axum_server::tls_rustls::RustlsAcceptor;
use referral_core::domain::Hospital;
use referral_core::error::ReferralError;

use crate::error_response::ApiError;
use crate::state::AppState;

/// The client certificate serial number observed at the TLS layer, if any.
#[derive(Clone, Debug, Default)]
pub struct ClientCertInfo(pub Option<String>);

impl<IO> Connected<&tokio_rustls::server::TlsStream<IO>> for ClientCertInfo {
    fn connect_info(target: &tokio_rustls::server::TlsStream<IO>) -> Self {
        let (_, session) = target.get_ref();
        let serial = session
            .peer_certificates()
            .and_then(|certs| certs.first())
            .and_then(|cert| leaf_serial_hex(cert.as_ref()));
        ClientCertInfo(serial)
    }
}

pub type MtlsAcceptor = RustlsAcceptor;

fn leaf_serial_hex(der: &[u8]) -> Option<String> {
    let (_, cert) = x509_parser::parse_x509_certificate(der).ok()?;
    Some(
        cert.raw_serial()
            .iter()
            .map(|b| format!("{b:02x}"))
            .collect::<String>()
            .trim_start_matches('0')
            .to_string(),
    )
}

/// The hospital that the caller's peer certificate resolved to. Handlers
/// extract this instead of reading request-body `origin`/`destination`
/// fields for authorization (§4.1).
#[derive(Clone, Debug)]
pub struct AuthenticatedHospital {
    pub hospital_id: String,
}

impl<S> FromRequestParts<S> for AuthenticatedHospital
where
    AppState: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let app_state = AppState::from_ref(state);
        let ConnectInfo(cert_info) = parts
            .extensions
            .get::<ConnectInfo<ClientCertInfo>>()
            .cloned()
            .ok_or(ReferralError::Identity)?;
        let serial = cert_info.0.ok_or(ReferralError::Identity)?;
        let hospital: Hospital = app_state
            .repo
            .hospital_by_cert_serial(&serial)?
            .ok_or(ReferralError::UnknownHospital)?;
        if hospital.hospital_id.trim().is_empty() {
            return Err(ReferralError::Identity.into());
        }
        Ok(AuthenticatedHospital {
            hospital_id: hospital.hospital_id,
        })
    }
}
