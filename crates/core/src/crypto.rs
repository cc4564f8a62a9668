//! Payload cryptography (§4.4) and checksums.
//!
//! Crate usage mirrors `examples/MattFrayser-ArchDrop/src/crypto/encryption.rs`
//! (`aes_gcm::{Aes256Gcm, aead::Aead}`), but the nonce scheme does not: that
//! file derives its nonce from a chunk position/counter, while this protocol
//! wants one fresh random nonce per whole file (§4.4, §9). Checksums are
//! SHA-256 computed over whatever bytes are actually transmitted — ciphertext
//! with its nonce prefix for whole-file checksums, raw bytes for per-chunk
//! checksums — on both the encrypt and the verify side, so the two can never
//! drift apart (§9's "fixed contract" note).

use aes_gcm::aead::{Aead, KeyInit, OsRng};
use aes_gcm::{Aes256Gcm, Nonce};
use rand::RngCore;
use sha2::{Digest, Sha256};

use crate::error::{ReferralError, ReferralResult};

pub const KEY_LEN: usize = 32;
pub const NONCE_LEN: usize = 12;

/// Generate a fresh 32-byte payload key, hex-encoded as the wire format (§4.4).
pub fn generate_payload_key() -> String {
    let mut key = [0u8; KEY_LEN];
    OsRng.fill_bytes(&mut key);
    hex::encode(key)
}

fn decode_key(hex_key: &str) -> ReferralResult<[u8; KEY_LEN]> {
    let bytes = hex::decode(hex_key)
        .map_err(|e| ReferralError::InvalidPayloadKey(format!("not valid hex: {e}")))?;
    bytes
        .try_into()
        .map_err(|_| ReferralError::InvalidPayloadKey(format!("expected {KEY_LEN} bytes")))
}

/// Encrypt `plaintext` under `hex_key`, returning `nonce ‖ ciphertext ‖ tag`.
pub fn encrypt_file(plaintext: &[u8], hex_key: &str) -> ReferralResult<Vec<u8>> {
    let key = decode_key(hex_key)?;
    let cipher = Aes256Gcm::new_from_slice(&key)
        .map_err(|e| ReferralError::InvalidPayloadKey(e.to_string()))?;

    let mut nonce_bytes = [0u8; NONCE_LEN];
    OsRng.fill_bytes(&mut nonce_bytes);
    let nonce = Nonce::from_slice(&nonce_bytes);

    let ciphertext = cipher
        .encrypt(nonce, plaintext)
        .map_err(|_| ReferralError::DecryptionFailed)?;

    let mut out = Vec::with_capacity(NONCE_LEN + ciphertext.len());
    out.extend_from_slice(&nonce_bytes);
    out.extend_from_slice(&ciphertext);
    Ok(out)
}

/// Decrypt a `nonce ‖ ciphertext ‖ tag` blob produced by [`encrypt_file`].
pub fn decrypt_file(wire_bytes: &[u8], hex_key: &str) -> ReferralResult<Vec<u8>> {
    if wire_bytes.len() < NONCE_LEN {
        return Err(ReferralError::DecryptionFailed);
    }
    let key = decode_key(hex_key)?;
    let cipher = Aes256Gcm::new_from_slice(&key)
        .map_err(|e| ReferralError::InvalidPayloadKey(e.to_string()))?;

    let (nonce_bytes, ciphertext) = wire_bytes.split_at(NONCE_LEN);
    let nonce = Nonce::from_slice(nonce_bytes);
    cipher
        .decrypt(nonce, ciphertext)
        .map_err(|_| ReferralError::DecryptionFailed)
}

/// SHA-256 of `bytes`, lower-hex encoded. Used identically for whole-file
/// checksums (over the wire bytes, nonce included) and per-chunk checksums.
pub fn sha256_hex(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    hex::encode(hasher.finalize())
}

pub mod password {
    //! Patient password hashing — the "standard adaptive hash" that §1 leaves
    //! unspecified. Argon2 is the concrete choice (see DESIGN.md); no bcrypt
    //! crate appears anywhere in the example pack this implementation is
    //! grounded on.
    use argon2::password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
    use argon2::Argon2;

    use crate::error::{ReferralError, ReferralResult};

    pub fn hash(password: &str) -> ReferralResult<String> {
        let salt = SaltString::generate(&mut rand::rngs::OsRng);
        Argon2::default()
            .hash_password(password.as_bytes(), &salt)
            .map(|h| h.to_string())
            .map_err(|e| ReferralError::Validation(format!("could not hash password: {e}")))
    }

    /// Returns `Ok(true)` iff `password` matches `hash`. Unlike the reference
    /// implementation's login handler, the caller is required to inspect this
    /// result (§9, §11) rather than return success unconditionally.
    pub fn verify(password: &str, hash: &str) -> ReferralResult<bool> {
        let parsed = PasswordHash::new(hash)
            .map_err(|e| ReferralError::Validation(format!("corrupt password hash: {e}")))?;
        Ok(Argon2::default()
            .verify_password(password.as_bytes(), &parsed)
            .is_ok())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trip_encrypt_decrypt() {
        let key = generate_payload_key();
        let plaintext = b"referral payload bytes";
        let wire = encrypt_file(plaintext, &key).unwrap();
        assert_eq!(&wire[..NONCE_LEN].len(), &NONCE_LEN);
        let recovered = decrypt_file(&wire, &key).unwrap();
        assert_eq!(recovered, plaintext);
    }

    #[test]
    fn wrong_key_fails_decryption() {
        let key = generate_payload_key();
        let other_key = generate_payload_key();
        let wire = encrypt_file(b"secret", &key).unwrap();
        assert!(decrypt_file(&wire, &other_key).is_err());
    }

    #[test]
    fn checksum_is_over_wire_bytes_including_nonce() {
        let key = generate_payload_key();
        let wire = encrypt_file(b"data", &key).unwrap();
        let checksum_a = sha256_hex(&wire);
        let checksum_b = sha256_hex(&wire);
        assert_eq!(checksum_a, checksum_b);
        // Changing only the nonce (re-encrypt) changes the checksum, proving
        // the nonce is included in what gets hashed.
        let wire2 = encrypt_file(b"data", &key).unwrap();
        assert_ne!(sha256_hex(&wire2), checksum_a);
    }

    #[test]
    fn password_hash_round_trips_and_rejects_wrong_password() {
        let hash = password::hash("correct horse battery staple").unwrap();
        assert!(password::verify("correct horse battery staple", &hash).unwrap());
        assert!(!password::verify("wrong password", &hash).unwrap());
    }
}
