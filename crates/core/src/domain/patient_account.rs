//! Coordinator-local patient account (§3, §11). Out of scope per §1 is the
//! choice of hash algorithm; `referral-core::crypto::password` makes that
//! choice (argon2) and this type just carries the resulting hash string.

#[derive(Debug, Clone)]
pub struct PatientAccount {
    pub username: String,
    pub password_hash: String,
    pub citizen_id: String,
    pub is_verified: bool,
}
