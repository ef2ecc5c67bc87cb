//! Server re-encryption layer.
//!
//! Wraps a client envelope under a key derived from one process-wide secret,
//! so that a leaked database alone reveals nothing but ciphertext of
//! ciphertext. The server can only ever reverse its own layer.
//!
//! The secret is resolved on every call rather than at startup: a missing
//! secret surfaces as [`CryptoError::ConfigurationMissing`] on first use.
//! Rotating the secret makes every previously wrapped record unreadable.

use std::fmt;

use base64::{engine::general_purpose::STANDARD, Engine as _};
use serde::{Deserialize, Serialize};
use zeroize::Zeroizing;

use crate::envelope::SealedEnvelope;
use crate::error::{CryptoError, Result};
use crate::key::{EncryptionKey, EncryptionNonce, NONCE_SIZE, TAG_SIZE};

/// Text prefix of every at-rest payload.
pub const AT_REST_PREFIX: &str = "ccs1.";

/// Environment variable consulted by [`SecretSource::default`].
pub const DEFAULT_SECRET_VAR: &str = "ENCRYPTION_SECRET";

const SERVER_KEY_CONTEXT: &str = "codecapsule server layer v1 payload key";

/// The configured server secret. Zeroed on drop, redacted in debug output.
#[derive(Clone)]
pub struct ServerSecret(Zeroizing<String>);

impl ServerSecret {
    pub fn new(secret: impl Into<String>) -> Self {
        Self(Zeroizing::new(secret.into()))
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    fn derive_key(&self) -> EncryptionKey {
        EncryptionKey::from_secret(self.0.as_bytes(), SERVER_KEY_CONTEXT)
    }
}

impl fmt::Debug for ServerSecret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("ServerSecret(<redacted>)")
    }
}

/// Where the server secret comes from.
#[derive(Debug, Clone)]
pub enum SecretSource {
    /// Read the named environment variable at each use.
    Env(String),
    /// A secret held in memory.
    Static(ServerSecret),
    /// No secret configured.
    Unset,
}

impl SecretSource {
    fn resolve(&self) -> Result<EncryptionKey> {
        let secret = match self {
            SecretSource::Env(var) => std::env::var(var)
                .map(ServerSecret::new)
                .map_err(|_| CryptoError::ConfigurationMissing)?,
            SecretSource::Static(secret) => secret.clone(),
            SecretSource::Unset => return Err(CryptoError::ConfigurationMissing),
        };
        if secret.is_empty() {
            return Err(CryptoError::ConfigurationMissing);
        }
        Ok(secret.derive_key())
    }
}

impl Default for SecretSource {
    fn default() -> Self {
        SecretSource::Env(DEFAULT_SECRET_VAR.to_string())
    }
}

/// An envelope after server-side re-encryption. This is what gets persisted.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AtRestPayload(String);

impl AtRestPayload {
    /// Adopt a value read back from storage.
    pub fn from_stored(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

/// The server re-encryption layer.
#[derive(Debug, Clone, Default)]
pub struct ServerLayer {
    source: SecretSource,
}

impl ServerLayer {
    pub fn new(source: SecretSource) -> Self {
        Self { source }
    }

    /// Use an in-memory secret.
    pub fn with_secret(secret: impl Into<String>) -> Self {
        Self::new(SecretSource::Static(ServerSecret::new(secret)))
    }

    /// Read the secret from [`DEFAULT_SECRET_VAR`] on each use.
    pub fn from_env() -> Self {
        Self::new(SecretSource::default())
    }

    /// Fail early if the secret is missing. Optional; wrap and unwrap check
    /// again on every call.
    pub fn check_configured(&self) -> Result<()> {
        self.source.resolve().map(|_| ())
    }

    /// Wrap a client envelope for storage.
    pub fn wrap(&self, envelope: &SealedEnvelope) -> Result<AtRestPayload> {
        let key = self.source.resolve()?;
        let nonce = EncryptionNonce::generate();
        let ciphertext = key.encrypt(envelope.as_str().as_bytes(), &nonce)?;

        let mut raw = Vec::with_capacity(NONCE_SIZE + ciphertext.len());
        raw.extend_from_slice(nonce.as_bytes());
        raw.extend_from_slice(&ciphertext);
        Ok(AtRestPayload(format!("{AT_REST_PREFIX}{}", STANDARD.encode(raw))))
    }

    /// Reverse the server layer. The result is still client-encrypted.
    ///
    /// Any tampering, truncation, or foreign input fails with
    /// [`CryptoError::ServerDecryptionFailed`]; partial data is never returned.
    pub fn unwrap(&self, at_rest: &AtRestPayload) -> Result<SealedEnvelope> {
        let key = self.source.resolve()?;

        let raw = at_rest
            .as_str()
            .strip_prefix(AT_REST_PREFIX)
            .and_then(|encoded| STANDARD.decode(encoded).ok())
            .ok_or(CryptoError::ServerDecryptionFailed)?;
        if raw.len() < NONCE_SIZE + TAG_SIZE {
            return Err(CryptoError::ServerDecryptionFailed);
        }

        let (nonce_bytes, ciphertext) = raw.split_at(NONCE_SIZE);
        let nonce_arr: [u8; NONCE_SIZE] = nonce_bytes
            .try_into()
            .map_err(|_| CryptoError::ServerDecryptionFailed)?;
        let plaintext = key
            .decrypt(ciphertext, &EncryptionNonce::from_bytes(nonce_arr))
            .map_err(|_| CryptoError::ServerDecryptionFailed)?;
        let text = String::from_utf8(plaintext).map_err(|_| CryptoError::ServerDecryptionFailed)?;

        SealedEnvelope::parse(&text).map_err(|_| CryptoError::ServerDecryptionFailed)
    }
}
