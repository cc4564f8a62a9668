//! X.509 certificate generation for mTLS test and development deployments.
//!
//! A coordinator and its hospital nodes each need a cert/key pair chained to
//! a shared CA, with the hospital's leaf certificate serial number equal to
//! the `certSerial` stored on its `Hospital` row. This crate builds that CA
//! and those leaves with rcgen, the same way the original self-signed
//! professional-registration certificate was built.

use rcgen::{
    CertificateParams, DistinguishedName, DnType, Ia5String, IsCa, KeyPair, KeyUsagePurpose,
    SanType, SerialNumber,
};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum CertificateError {
    #[error("Invalid certificate input: {0}")]
    InvalidInput(String),
    #[error("Failed to generate certificate: {0}")]
    GenerationError(String),
}

/// PEM-encoded certificate and private key pair.
pub struct CertificatePair {
    pub cert_pem: String,
    pub key_pem: String,
}

/// A self-signed root usable to sign hospital and coordinator leaf certs.
pub struct CertificateAuthority {
    params: CertificateParams,
    key_pair: KeyPair,
    cert: rcgen::Certificate,
}

impl CertificateAuthority {
    pub fn generate(common_name: &str) -> Result<Self, CertificateError> {
        let mut params = CertificateParams::default();
        let mut subject = DistinguishedName::new();
        subject.push(DnType::CommonName, common_name);
        params.distinguished_name = subject;
        params.is_ca = IsCa::Ca(rcgen::BasicConstraints::Unconstrained);
        params.key_usages = vec![
            KeyUsagePurpose::KeyCertSign,
            KeyUsagePurpose::CrlSign,
            KeyUsagePurpose::DigitalSignature,
        ];
        let now = time::OffsetDateTime::now_utc();
        params.not_before = now;
        params.not_after = now + time::Duration::days(3650);

        let key_pair =
            KeyPair::generate().map_err(|e| CertificateError::GenerationError(e.to_string()))?;
        let cert = params
            .clone()
            .self_signed(&key_pair)
            .map_err(|e| CertificateError::GenerationError(e.to_string()))?;

        Ok(Self {
            params,
            key_pair,
            cert,
        })
    }

    pub fn cert_pem(&self) -> String {
        self.cert.pem()
    }

    pub fn key_pem(&self) -> String {
        self.key_pair.serialize_pem()
    }

    /// Issue a leaf certificate for `common_name`, with its serial number set
    /// to `serial` (hex digits, as used for `Hospital.certSerial` lookups).
    pub fn issue_leaf(
        &self,
        common_name: &str,
        serial: &str,
    ) -> Result<CertificatePair, CertificateError> {
        let common_name = common_name.trim();
        if common_name.is_empty() {
            return Err(CertificateError::InvalidInput(
                "common_name must not be empty".to_string(),
            ));
        }
        let serial_bytes = hex_decode(serial)
            .map_err(|e| CertificateError::InvalidInput(format!("invalid serial: {e}")))?;

        let mut leaf_params = CertificateParams::default();
        let mut subject = DistinguishedName::new();
        subject.push(DnType::CommonName, common_name);
        leaf_params.distinguished_name = subject;
        leaf_params.is_ca = IsCa::NoCa;
        leaf_params.key_usages = vec![
            KeyUsagePurpose::DigitalSignature,
            KeyUsagePurpose::KeyEncipherment,
        ];
        let uri = Ia5String::try_from(format!("urn:hospital:{common_name}"))
            .map_err(|e| CertificateError::InvalidInput(format!("invalid SAN: {e}")))?;
        leaf_params.subject_alt_names.push(SanType::URI(uri));
        let now = time::OffsetDateTime::now_utc();
        leaf_params.not_before = now;
        leaf_params.not_after = now + time::Duration::days(365);
        leaf_params.serial_number = Some(SerialNumber::from(serial_bytes));

        let leaf_key =
            KeyPair::generate().map_err(|e| CertificateError::GenerationError(e.to_string()))?;
        let issuer = rcgen::Issuer::new(self.params.clone(), &self.key_pair);
        let leaf_cert = leaf_params
            .signed_by(&leaf_key, &issuer)
            .map_err(|e| CertificateError::GenerationError(e.to_string()))?;

        Ok(CertificatePair {
            cert_pem: leaf_cert.pem(),
            key_pem: leaf_key.serialize_pem(),
        })
    }
}

fn hex_decode(s: &str) -> Result<Vec<u8>, String> {
    if s.len() % 2 != 0 {
        return Err("odd-length hex string".to_string());
    }
    (0..s.len())
        .step_by(2)
        .map(|i| u8::from_str_radix(&s[i..i + 2], 16).map_err(|e| e.to_string()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn leaf_certificate_carries_the_requested_serial() {
        let ca = CertificateAuthority::generate("test-ca").unwrap();
        let pair = ca.issue_leaf("First Government Hospital", "1111").unwrap();
        assert!(pair.cert_pem.contains("BEGIN CERTIFICATE"));

        let (_, pem) = x509_parser::pem::parse_x509_pem(pair.cert_pem.as_bytes()).unwrap();
        let (_, cert) = x509_parser::parse_x509_certificate(pem.contents.as_slice()).unwrap();
        let serial_hex: String = cert
            .raw_serial()
            .iter()
            .map(|b| format!("{b:02x}"))
            .collect();
        assert!(serial_hex.ends_with("1111") || serial_hex.contains("1111"));
    }

    #[test]
    fn ca_and_leaf_chain_validates_subject() {
        let ca = CertificateAuthority::generate("test-ca").unwrap();
        let pair = ca.issue_leaf("Second Private Hospital", "2222").unwrap();
        let (_, pem) = x509_parser::pem::parse_x509_pem(pair.cert_pem.as_bytes()).unwrap();
        let (_, cert) = x509_parser::parse_x509_certificate(pem.contents.as_slice()).unwrap();
        assert!(cert.subject().to_string().contains("Second Private Hospital"));
    }
}
