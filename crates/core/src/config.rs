//! Runtime configuration, resolved once at process startup.
//!
//! Mirrors the reference crate's `CoreConfig::new` discipline: every field is
//! read from the environment exactly once in `main`, validated immediately,
//! and then carried around as an immutable value. Handlers and the polling
//! engine never call `std::env::var` themselves.

use crate::error::{ReferralError, ReferralResult};
use std::path::{Path, PathBuf};

fn env_var(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

fn env_var_required(key: &str) -> ReferralResult<String> {
    std::env::var(key).map_err(|_| ReferralError::Validation(format!("{key} is not set")))
}

fn env_port(key: &str, default: u16) -> ReferralResult<u16> {
    match std::env::var(key) {
        Ok(v) => v
            .parse::<u16>()
            .map_err(|_| ReferralError::Validation(format!("{key} is not a valid port"))),
        Err(_) => Ok(default),
    }
}

fn require_readable_file(path: &Path, label: &str) -> ReferralResult<()> {
    if !path.is_file() {
        return Err(ReferralError::Validation(format!(
            "{label} does not exist or is not a file: {}",
            path.display()
        )));
    }
    Ok(())
}

fn ensure_writable_dir(path: &Path, label: &str) -> ReferralResult<()> {
    std::fs::create_dir_all(path).map_err(|e| {
        ReferralError::Validation(format!(
            "{label} ({}) could not be created: {e}",
            path.display()
        ))
    })?;
    let probe = path.join(".write_test");
    std::fs::write(&probe, b"x")
        .map_err(|e| ReferralError::Validation(format!("{label} is not writable: {e}")))?;
    let _ = std::fs::remove_file(&probe);
    Ok(())
}

/// Configuration for the central coordinator process.
#[derive(Clone, Debug)]
pub struct CoordinatorConfig {
    pub mtls_addr: std::net::SocketAddr,
    pub frontend_addr: std::net::SocketAddr,
    pub cert_file: PathBuf,
    pub key_file: PathBuf,
    pub ca_file: PathBuf,
    pub db_path: PathBuf,
    pub chunk_dir: PathBuf,
    pub payload_dir: PathBuf,
}

impl CoordinatorConfig {
    /// Resolve from the environment. Fails fast with a descriptive error
    /// rather than deferring a missing file or unwritable directory to the
    /// first request that needs it.
    pub fn from_env() -> ReferralResult<Self> {
        let server_port = env_port("SERVER_PORT", 8443)?;
        let frontend_port = env_port("SERVER_FRONTEND_PORT", 8445)?;
        let auth_dir = PathBuf::from(env_var("AUTH_DIR", "./auth"));
        let cert_file = auth_dir.join(env_var("CERT_FILE", "server.crt"));
        let key_file = auth_dir.join(env_var("KEY_FILE", "server.key"));
        let ca_file = auth_dir.join(env_var("CA_FILE", "ca.crt"));
        require_readable_file(&cert_file, "CERT_FILE")?;
        require_readable_file(&key_file, "KEY_FILE")?;
        require_readable_file(&ca_file, "CA_FILE")?;

        let db_path = PathBuf::from(env_var("SERVER_DB", "./data/server.db"));
        if let Some(parent) = db_path.parent() {
            ensure_writable_dir(parent, "SERVER_DB directory")?;
        }

        let chunk_dir = PathBuf::from(env_var("CHUNK_DIR", "./data/chunks"));
        let payload_dir = PathBuf::from(env_var("PAYLOAD_DIR", "./data/payloads"));
        ensure_writable_dir(&chunk_dir, "CHUNK_DIR")?;
        ensure_writable_dir(&payload_dir, "PAYLOAD_DIR")?;

        Ok(Self {
            mtls_addr: ([0, 0, 0, 0], server_port).into(),
            frontend_addr: ([0, 0, 0, 0], frontend_port).into(),
            cert_file,
            key_file,
            ca_file,
            db_path,
            chunk_dir,
            payload_dir,
        })
    }
}

/// Configuration for a per-hospital node agent process.
#[derive(Clone, Debug)]
pub struct NodeConfig {
    pub hospital_id: String,
    pub coordinator_base_url: String,
    pub frontend_addr: std::net::SocketAddr,
    pub cert_file: PathBuf,
    pub key_file: PathBuf,
    pub ca_file: PathBuf,
    pub db_path: PathBuf,
    pub upload_dir: PathBuf,
    pub origin_payload_dir: PathBuf,
    pub dest_payload_dir: PathBuf,
    pub result_dir: PathBuf,
    pub poll_interval_secs: u64,
}

impl NodeConfig {
    pub fn from_env() -> ReferralResult<Self> {
        let hospital_id = env_var_required("HOSPITAL_ID")?;
        if hospital_id.trim().is_empty() {
            return Err(ReferralError::Validation("HOSPITAL_ID is empty".into()));
        }
        let server_path = env_var_required("SERVER_PATH")?;
        let frontend_port = env_port("CLIENT_FRONTEND_PORT", 8080)?;
        let auth_dir = PathBuf::from(env_var("AUTH_DIR", "./auth"));
        let cert_file = auth_dir.join(env_var("CERT_FILE", "origin.crt"));
        let key_file = auth_dir.join(env_var("KEY_FILE", "origin.key"));
        let ca_file = auth_dir.join(env_var("CA_FILE", "ca.crt"));
        require_readable_file(&cert_file, "CERT_FILE")?;
        require_readable_file(&key_file, "KEY_FILE")?;
        require_readable_file(&ca_file, "CA_FILE")?;

        let db_path = PathBuf::from(env_var("CLIENT_DB", "./data/client.db"));
        if let Some(parent) = db_path.parent() {
            ensure_writable_dir(parent, "CLIENT_DB directory")?;
        }

        let upload_dir = PathBuf::from(env_var("UPLOAD_DIR", "./data/uploads"));
        let origin_payload_dir = PathBuf::from(env_var("ORIGIN_PAYLOAD_DIR", "./data/origin"));
        let dest_payload_dir = PathBuf::from(env_var("DEST_PAYLOAD_DIR", "./data/dest"));
        let result_dir = PathBuf::from(env_var("RESULT_DIR", "./data/result"));
        for (dir, label) in [
            (&upload_dir, "UPLOAD_DIR"),
            (&origin_payload_dir, "ORIGIN_PAYLOAD_DIR"),
            (&dest_payload_dir, "DEST_PAYLOAD_DIR"),
            (&result_dir, "RESULT_DIR"),
        ] {
            ensure_writable_dir(dir, label)?;
        }

        let poll_interval_secs = env_var("POLL_INTERVAL_SECS", "5")
            .parse::<u64>()
            .map_err(|_| ReferralError::Validation("POLL_INTERVAL_SECS is not a number".into()))?;

        Ok(Self {
            hospital_id,
            coordinator_base_url: server_path,
            frontend_addr: ([0, 0, 0, 0], frontend_port).into(),
            cert_file,
            key_file,
            ca_file,
            db_path,
            upload_dir,
            origin_payload_dir,
            dest_payload_dir,
            result_dir,
            poll_interval_secs,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn env_port_falls_back_to_default_when_unset() {
        std::env::remove_var("VPR_TEST_PORT_UNSET");
        assert_eq!(env_port("VPR_TEST_PORT_UNSET", 1234).unwrap(), 1234);
    }

    #[test]
    fn env_port_rejects_non_numeric() {
        std::env::set_var("VPR_TEST_PORT_BAD", "not-a-port");
        assert!(env_port("VPR_TEST_PORT_BAD", 1234).is_err());
        std::env::remove_var("VPR_TEST_PORT_BAD");
    }
}
