//! Authenticated envelope for stored credentials.
//!
//! Layout: `v1:` followed by base64 of `nonce (24) || ciphertext || tag (16)`,
//! sealed with XChaCha20-Poly1305. The AEAD key is derived from the 32-byte
//! device key with HMAC-SHA256 so the stored device key is never used directly.

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use chacha20poly1305::aead::{Aead, KeyInit};
use chacha20poly1305::{Key, XChaCha20Poly1305, XNonce};
use hmac::{Hmac, Mac};
use sha2::Sha256;

use super::store::KeyValueStore;
use crate::error::CredentialError;

type HmacSha256 = Hmac<Sha256>;

pub const ENVELOPE_PREFIX: &str = "v1:";
const NONCE_LEN: usize = 24;
const TAG_LEN: usize = 16;

pub struct CredentialCipher {
    aead: XChaCha20Poly1305,
}

impl CredentialCipher {
    pub fn from_key(key: &[u8; 32]) -> Self {
        let derived = derive(key, b"guardshift/credential/aead");
        Self {
            aead: XChaCha20Poly1305::new(Key::from_slice(&derived)),
        }
    }

    /// Load the device key from `store`, generating and saving one on first use.
    pub fn load_or_create(store: &dyn KeyValueStore, key_name: &str) -> Result<Self, CredentialError> {
        if let Some(encoded) = store.get(key_name)? {
            let bytes = STANDARD.decode(encoded.trim()).map_err(|e| {
                CredentialError::EncryptionUnavailable(format!("device key unreadable: {e}"))
            })?;
            let key: [u8; 32] = bytes.try_into().map_err(|_| {
                CredentialError::EncryptionUnavailable("device key has wrong length".into())
            })?;
            return Ok(Self::from_key(&key));
        }

        let mut key = [0u8; 32];
        fill_random(&mut key)?;
        store.set(key_name, &STANDARD.encode(key))?;
        Ok(Self::from_key(&key))
    }

    pub fn is_envelope(value: &str) -> bool {
        value.starts_with(ENVELOPE_PREFIX)
    }

    pub fn encrypt(&self, plaintext: &[u8]) -> Result<String, CredentialError> {
        let mut nonce = [0u8; NONCE_LEN];
        fill_random(&mut nonce)?;

        let sealed = self
            .aead
            .encrypt(XNonce::from_slice(&nonce), plaintext)
            .map_err(|_| CredentialError::EncryptionUnavailable("sealing failed".into()))?;

        let mut out = Vec::with_capacity(NONCE_LEN + sealed.len());
        out.extend_from_slice(&nonce);
        out.extend_from_slice(&sealed);
        Ok(format!("{ENVELOPE_PREFIX}{}", STANDARD.encode(out)))
    }

    /// Returns `None` for anything that is not an intact envelope from this key.
    pub fn decrypt(&self, envelope: &str) -> Option<Vec<u8>> {
        let encoded = envelope.strip_prefix(ENVELOPE_PREFIX)?;
        let raw = STANDARD.decode(encoded).ok()?;
        if raw.len() < NONCE_LEN + TAG_LEN {
            return None;
        }
        let (nonce, sealed) = raw.split_at(NONCE_LEN);
        self.aead.decrypt(XNonce::from_slice(nonce), sealed).ok()
    }
}

fn derive(key: &[u8; 32], label: &[u8]) -> [u8; 32] {
    let mut mac = <HmacSha256 as Mac>::new_from_slice(key).expect("HMAC can take keys of any size");
    mac.update(label);
    let mut out = [0u8; 32];
    out.copy_from_slice(&mac.finalize().into_bytes());
    out
}

fn fill_random(buf: &mut [u8]) -> Result<(), CredentialError> {
    getrandom::getrandom(buf)
        .map_err(|e| CredentialError::EncryptionUnavailable(format!("OS random source failed: {e}")))
}
