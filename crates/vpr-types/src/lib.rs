//! Wire DTOs for the coordinator's and the node's HTTP APIs.
//!
//! These are pure serde structs with no behaviour: validation and domain
//! invariants live in `referral-core`. A handler decodes one of these, hands
//! the fields to a domain constructor, and the domain constructor is the
//! thing that can fail.

use serde::{Deserialize, Serialize};

/// Error envelope used by every non-2xx coordinator and node response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorEnvelope {
    pub message: String,
}

impl ErrorEnvelope {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HospitalDto {
    pub hospital_id: String,
    pub name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateReferralRequest {
    pub origin: String,
    pub destination: String,
    pub department: String,
    pub reason: String,
    pub citizen_id: String,
    pub prefix: String,
    pub first_name: String,
    pub last_name: String,
    pub birth_date: String,
    pub address: String,
    pub gender: String,
    pub telephone: String,
    pub email: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateReferralResponse {
    pub id: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReferralDto {
    pub id: i64,
    pub origin: String,
    pub destination: String,
    pub department: String,
    pub reason: String,
    pub citizen_id: String,
    pub prefix: String,
    pub first_name: String,
    pub last_name: String,
    pub birth_date: String,
    pub address: String,
    pub gender: String,
    pub telephone: String,
    pub email: String,
    pub status: String,
    pub created_at: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReferralListResponse {
    pub referrals: Vec<ReferralDto>,
}

/// `{Granted:bool}` — kept PascalCase to match the literal wire shape named in
/// the external-interfaces table.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct GrantRequest {
    pub granted: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct FileManifestEntry {
    pub name: String,
    pub checksum: String,
}

/// `{PayloadKey, Files:[{Name,Checksum}]}`
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct UploadInitiateRequest {
    pub payload_key: String,
    pub files: Vec<FileManifestEntry>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ChunkSpec {
    pub checksum: String,
    pub size_kb: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ChunkFileSpec {
    pub name: String,
    pub chunks: Vec<ChunkSpec>,
}

/// `{ChunkFiles:[…]}`
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ChunkBeginRequest {
    pub chunk_files: Vec<ChunkFileSpec>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DownloadListResponse {
    pub files: Vec<FileManifestEntry>,
    pub payload_key: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegisterRequest {
    pub username: String,
    pub password: String,
    pub citizen_id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoginResponse {
    pub username: String,
    pub citizen_id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReferralReceiptDto {
    pub referral_id: i64,
    pub doctor_id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssignReceiptRequest {
    pub doctor_id: String,
}
