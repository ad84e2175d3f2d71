//! Credential gate: the encrypted session credential and its validity check.
//!
//! The gate is the only writer of the persisted credential. The lifecycle store
//! asks it a single question, [`CredentialGate::is_valid`], and the gateway asks
//! it for a bearer header on every request. Every operation reports success or
//! failure through its return value; nothing here panics or propagates up the
//! caller's stack as an unexpected failure.

pub mod cipher;
pub mod store;

use std::fmt;

use chrono::Utc;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

pub use cipher::CredentialCipher;
pub use store::{KeyValueStore, KeyringStore, MemoryStore};

use crate::error::CredentialError;

/// Access/refresh token pair with its expiry in epoch milliseconds.
#[derive(Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionCredential {
    pub access_token: String,
    pub refresh_token: String,
    pub expires_at: i64,
    #[serde(default = "default_token_type")]
    pub token_type: String,
}

fn default_token_type() -> String {
    "Bearer".into()
}

impl SessionCredential {
    pub fn new(
        access_token: impl Into<String>,
        refresh_token: impl Into<String>,
        expires_at: i64,
    ) -> Self {
        Self {
            access_token: access_token.into(),
            refresh_token: refresh_token.into(),
            expires_at,
            token_type: default_token_type(),
        }
    }

    /// Usable iff `expires_at > now`; equality counts as expired.
    pub fn is_valid_at(&self, now_ms: i64) -> bool {
        self.expires_at > now_ms
    }

    pub fn authorization(&self) -> String {
        format!("{} {}", self.token_type, self.access_token)
    }
}

impl fmt::Debug for SessionCredential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionCredential")
            .field("access_token", &"<redacted>")
            .field("refresh_token", &"<redacted>")
            .field("expires_at", &self.expires_at)
            .field("token_type", &self.token_type)
            .finish()
    }
}

/// Storage keys, all under one prefix.
#[derive(Debug, Clone)]
pub struct CredentialKeys {
    pub tokens: String,
    pub user_profile: String,
    pub settings: String,
    pub device_key: String,
}

impl CredentialKeys {
    pub fn with_prefix(prefix: &str) -> Self {
        Self {
            tokens: format!("{prefix}.tokens"),
            user_profile: format!("{prefix}.user_profile"),
            settings: format!("{prefix}.settings"),
            device_key: format!("{prefix}.device_key"),
        }
    }

    /// Entries removed together on logout. The device key is not one of them.
    fn session_entries(&self) -> [&str; 3] {
        [
            self.tokens.as_str(),
            self.user_profile.as_str(),
            self.settings.as_str(),
        ]
    }
}

pub struct CredentialGate {
    store: Box<dyn KeyValueStore>,
    cipher: Option<CredentialCipher>,
    keys: CredentialKeys,
}

impl CredentialGate {
    /// Build a gate over `store`, loading (or creating) the device key there.
    ///
    /// If no device key can be obtained the gate still reads, but refuses to
    /// write credentials.
    pub fn new(store: Box<dyn KeyValueStore>, prefix: &str) -> Self {
        let keys = CredentialKeys::with_prefix(prefix);
        let cipher = match CredentialCipher::load_or_create(store.as_ref(), &keys.device_key) {
            Ok(cipher) => Some(cipher),
            Err(e) => {
                tracing::warn!(error = %e, "credential cipher unavailable");
                None
            }
        };
        Self {
            store,
            cipher,
            keys,
        }
    }

    pub fn with_cipher(
        store: Box<dyn KeyValueStore>,
        prefix: &str,
        cipher: Option<CredentialCipher>,
    ) -> Self {
        Self {
            store,
            cipher,
            keys: CredentialKeys::with_prefix(prefix),
        }
    }

    /// Gate backed by the OS keyring, with `prefix` as the keyring service.
    pub fn keyring(prefix: &str) -> Self {
        Self::new(Box::new(KeyringStore::new(prefix)), prefix)
    }

    pub fn keys(&self) -> &CredentialKeys {
        &self.keys
    }

    /// Encrypt and persist. Never writes the credential in clear.
    pub fn store(&self, credential: &SessionCredential) -> Result<(), CredentialError> {
        self.write_sealed(&self.keys.tokens, credential)
            .inspect_err(|e| tracing::warn!(error = %e, "failed to store credential"))
    }

    /// Data present, not necessarily valid. Use [`Self::is_valid`] for that.
    pub fn retrieve(&self) -> Option<SessionCredential> {
        self.read_sealed(&self.keys.tokens)
    }

    pub fn is_valid(&self) -> bool {
        self.is_valid_at(Utc::now().timestamp_millis())
    }

    pub fn is_valid_at(&self, now_ms: i64) -> bool {
        self.retrieve()
            .map(|c| c.is_valid_at(now_ms))
            .unwrap_or(false)
    }

    /// `Authorization` header value for a currently valid credential.
    pub fn bearer(&self) -> Option<String> {
        let now = Utc::now().timestamp_millis();
        self.retrieve()
            .filter(|c| c.is_valid_at(now))
            .map(|c| c.authorization())
    }

    /// Remove tokens, cached profile and cached settings. Idempotent.
    ///
    /// Every entry is attempted even if an earlier one fails; the first
    /// failure is returned.
    pub fn clear(&self) -> Result<(), CredentialError> {
        let mut first_err = None;
        for key in self.keys.session_entries() {
            if let Err(e) = self.store.remove(key) {
                tracing::warn!(key, error = %e, "failed to remove credential entry");
                first_err.get_or_insert(e);
            }
        }
        match first_err {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    pub fn store_profile(&self, profile: &serde_json::Value) -> Result<(), CredentialError> {
        self.write_sealed(&self.keys.user_profile, profile)
    }

    pub fn profile(&self) -> Option<serde_json::Value> {
        self.read_sealed(&self.keys.user_profile)
    }

    pub fn store_settings(&self, settings: &serde_json::Value) -> Result<(), CredentialError> {
        self.write_sealed(&self.keys.settings, settings)
    }

    pub fn settings(&self) -> Option<serde_json::Value> {
        self.read_sealed(&self.keys.settings)
    }

    fn write_sealed<T: Serialize>(&self, key: &str, value: &T) -> Result<(), CredentialError> {
        let cipher = self.cipher.as_ref().ok_or_else(|| {
            CredentialError::EncryptionUnavailable("no device key available".into())
        })?;
        let json = serde_json::to_vec(value)?;
        let sealed = cipher.encrypt(&json)?;
        self.store.set(key, &sealed)
    }

    fn read_sealed<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        let raw = match self.store.get(key) {
            Ok(Some(raw)) => raw,
            Ok(None) => return None,
            Err(e) => {
                tracing::warn!(key, error = %e, "credential storage read failed");
                return None;
            }
        };

        if !CredentialCipher::is_envelope(&raw) {
            // Written before encryption existed; readable, but only as data.
            tracing::warn!(key, "reading legacy plaintext entry");
            return serde_json::from_str(&raw).ok();
        }

        let plain = self.cipher.as_ref().and_then(|c| c.decrypt(&raw));
        match plain {
            Some(bytes) => serde_json::from_slice(&bytes).ok(),
            None => {
                tracing::warn!(key, "stored entry could not be decrypted");
                None
            }
        }
    }
}
