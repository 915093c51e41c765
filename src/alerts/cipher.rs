//! AES-256-GCM encryption of channel credentials at rest
//!
//! Tokens are `base64(nonce || ciphertext)` with a fresh 96-bit nonce per
//! encryption and no associated data.

use std::fmt;

use aes_gcm::aead::rand_core::RngCore;
use aes_gcm::aead::{Aead, OsRng};
use aes_gcm::{Aes256Gcm, KeyInit, Nonce};
use base64::{Engine as _, engine::general_purpose::STANDARD};

use super::error::CipherError;

const KEY_LEN: usize = 32;
const NONCE_LEN: usize = 12;

/// Secret cipher. An unconfigured cipher fails every call with
/// [`CipherError::MissingKey`].
#[derive(Clone, Default)]
pub struct Cipher {
    aead: Option<Aes256Gcm>,
}

impl Cipher {
    /// Build a cipher from a base64-encoded 32 byte key.
    pub fn from_base64_key(encoded: &str) -> Result<Self, CipherError> {
        let encoded = encoded.trim();
        if encoded.is_empty() {
            return Err(CipherError::MissingKey);
        }

        let key = STANDARD
            .decode(encoded)
            .map_err(|e| CipherError::InvalidKey(format!("decode alert key: {e}")))?;
        if key.len() != KEY_LEN {
            return Err(CipherError::InvalidKey(format!(
                "want {KEY_LEN} bytes, got {}",
                key.len()
            )));
        }

        let aead = Aes256Gcm::new_from_slice(&key).map_err(|_| CipherError::CipherInitFailed)?;
        Ok(Self { aead: Some(aead) })
    }

    /// A cipher without key material.
    pub fn disabled() -> Self {
        Self::default()
    }

    pub fn is_configured(&self) -> bool {
        self.aead.is_some()
    }

    pub fn encrypt(&self, plaintext: &str) -> Result<String, CipherError> {
        let aead = self.aead.as_ref().ok_or(CipherError::MissingKey)?;

        let mut nonce_bytes = [0u8; NONCE_LEN];
        OsRng
            .try_fill_bytes(&mut nonce_bytes)
            .map_err(|e| CipherError::RandomSource(e.to_string()))?;
        let nonce = Nonce::from_slice(&nonce_bytes);

        // Only fails for inputs beyond the GCM length limit.
        let sealed = aead
            .encrypt(nonce, plaintext.as_bytes())
            .map_err(|_| CipherError::AuthenticationFailed)?;

        let mut packed = Vec::with_capacity(NONCE_LEN + sealed.len());
        packed.extend_from_slice(&nonce_bytes);
        packed.extend_from_slice(&sealed);
        Ok(STANDARD.encode(packed))
    }

    pub fn decrypt(&self, token: &str) -> Result<String, CipherError> {
        let aead = self.aead.as_ref().ok_or(CipherError::MissingKey)?;

        let packed = STANDARD.decode(token.trim())?;
        if packed.len() < NONCE_LEN {
            return Err(CipherError::Truncated {
                len: packed.len(),
                nonce_len: NONCE_LEN,
            });
        }

        let (nonce, sealed) = packed.split_at(NONCE_LEN);
        let plain = aead
            .decrypt(Nonce::from_slice(nonce), sealed)
            .map_err(|_| CipherError::AuthenticationFailed)?;

        String::from_utf8(plain).map_err(|_| CipherError::InvalidUtf8)
    }
}

impl fmt::Debug for Cipher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Cipher")
            .field("configured", &self.is_configured())
            .finish()
    }
}
