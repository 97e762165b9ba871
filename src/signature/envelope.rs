//! Encrypted signature envelopes (AES-256-GCM).
//!
//! The verifier only needs `open`; `seal` exists for the CLI and tests.
//! Envelope layout: base64(nonce(12 bytes) || ciphertext || tag(16 bytes)).
//! The 256-bit key is the SHA-256 digest of the configured key string, so
//! operators can configure keys of any length.

use aes_gcm::{
    aead::{Aead, AeadCore, KeyInit, OsRng},
    Aes256Gcm, Nonce,
};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use sha2::{Digest, Sha256};
use thiserror::Error;

const NONCE_LEN: usize = 12;

#[derive(Debug, Error)]
pub enum EnvelopeError {
    #[error("Envelope key is empty")]
    MissingKey,

    #[error("Invalid envelope format")]
    InvalidFormat,

    #[error("Encryption failed: {0}")]
    EncryptionFailed(String),

    #[error("Decryption failed: {0}")]
    DecryptionFailed(String),
}

/// AEAD collaborator: `open(seal(p, k), k) == p`.
pub trait EnvelopeCipher: Send + Sync {
    fn seal(&self, plaintext: &str, key: &str) -> Result<String, EnvelopeError>;
    fn open(&self, envelope: &str, key: &str) -> Result<String, EnvelopeError>;
}

/// AES-256-GCM envelopes.
#[derive(Debug, Clone, Copy, Default)]
pub struct AesGcmEnvelope;

impl AesGcmEnvelope {
    fn cipher(key: &str) -> Result<Aes256Gcm, EnvelopeError> {
        if key.is_empty() {
            return Err(EnvelopeError::MissingKey);
        }
        let digest = Sha256::digest(key.as_bytes());
        Aes256Gcm::new_from_slice(&digest).map_err(|e| EnvelopeError::EncryptionFailed(e.to_string()))
    }
}

impl EnvelopeCipher for AesGcmEnvelope {
    fn seal(&self, plaintext: &str, key: &str) -> Result<String, EnvelopeError> {
        let cipher = Self::cipher(key)?;
        let nonce = Aes256Gcm::generate_nonce(&mut OsRng);

        let ciphertext = cipher
            .encrypt(&nonce, plaintext.as_bytes())
            .map_err(|e| EnvelopeError::EncryptionFailed(e.to_string()))?;

        let mut combined = nonce.to_vec();
        combined.extend_from_slice(&ciphertext);
        Ok(STANDARD.encode(combined))
    }

    fn open(&self, envelope: &str, key: &str) -> Result<String, EnvelopeError> {
        let cipher = Self::cipher(key)?;

        let combined = STANDARD
            .decode(envelope.trim())
            .map_err(|_| EnvelopeError::InvalidFormat)?;
        if combined.len() <= NONCE_LEN {
            return Err(EnvelopeError::InvalidFormat);
        }

        let (nonce_bytes, ciphertext) = combined.split_at(NONCE_LEN);
        let plaintext = cipher
            .decrypt(Nonce::from_slice(nonce_bytes), ciphertext)
            .map_err(|e| EnvelopeError::DecryptionFailed(e.to_string()))?;

        String::from_utf8(plaintext)
            .map_err(|e| EnvelopeError::DecryptionFailed(format!("Invalid UTF-8: {e}")))
    }
}
