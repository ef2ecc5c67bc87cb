//! Client-layer passphrase envelopes.
//!
//! An envelope is self-contained text: a version prefix followed by the
//! base64 encoding of a CBOR body holding the KDF parameters, salt, nonce,
//! and ciphertext. Only the passphrase is needed to open it.
//!
//! Every call to [`seal`] draws a fresh salt and nonce, so sealing the same
//! payload twice yields different envelopes.

use base64::{engine::general_purpose::STANDARD, Engine as _};
use serde::{Deserialize, Serialize};

use crate::error::{CryptoError, Result};
use crate::key::{EncryptionKey, EncryptionNonce, KdfParams, Salt};

/// Text prefix of every client envelope.
pub const ENVELOPE_PREFIX: &str = "cce1.";

/// Format identifier for envelopes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[repr(u8)]
pub enum EnvelopeFormat {
    /// Argon2id key derivation, ChaCha20-Poly1305 encryption.
    Argon2idChaCha20Poly1305 = 1,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
struct EnvelopeBody {
    format: EnvelopeFormat,
    kdf: KdfParams,
    salt: Salt,
    nonce: EncryptionNonce,
    ciphertext: Vec<u8>,
}

impl EnvelopeBody {
    fn encode(&self) -> Result<String> {
        let mut buf = Vec::new();
        ciborium::into_writer(self, &mut buf)
            .map_err(|e| CryptoError::SerializationError(e.to_string()))?;
        Ok(format!("{ENVELOPE_PREFIX}{}", STANDARD.encode(buf)))
    }

    fn decode(text: &str) -> Result<Self> {
        let encoded = text
            .trim()
            .strip_prefix(ENVELOPE_PREFIX)
            .ok_or(CryptoError::MalformedEnvelope)?;
        let bytes = STANDARD
            .decode(encoded)
            .map_err(|_| CryptoError::MalformedEnvelope)?;
        ciborium::from_reader(bytes.as_slice()).map_err(|_| CryptoError::MalformedEnvelope)
    }
}

/// A client-sealed envelope, structurally checked.
///
/// Holding one of these does not mean it opens with any particular
/// passphrase, only that it has the shape of an envelope. The server layer
/// only accepts this type, so plaintext can never be wrapped by mistake.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SealedEnvelope(String);

impl SealedEnvelope {
    /// Accept envelope text received from a client.
    pub fn parse(text: &str) -> Result<Self> {
        let trimmed = text.trim();
        EnvelopeBody::decode(trimmed)?;
        Ok(Self(trimmed.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }

    /// Open with a passphrase. See [`open`].
    pub fn open(&self, passphrase: &str) -> Result<Payload> {
        open(&self.0, passphrase)
    }
}

impl std::fmt::Display for SealedEnvelope {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// A payload before sealing or after opening.
///
/// Non-text payloads are canonically serialized as JSON before sealing.
#[derive(Debug, Clone, PartialEq)]
pub enum Payload {
    Text(String),
    Json(serde_json::Value),
}

impl Payload {
    /// Serialize any value as a JSON payload.
    pub fn json<T: Serialize>(value: &T) -> Result<Self> {
        serde_json::to_value(value)
            .map(Payload::Json)
            .map_err(|e| CryptoError::SerializationError(e.to_string()))
    }

    /// The text that actually gets encrypted.
    pub fn to_canonical_text(&self) -> String {
        match self {
            Payload::Text(s) => s.clone(),
            Payload::Json(v) => v.to_string(),
        }
    }

    /// Permissive recovery of decrypted text: JSON if it parses, raw text
    /// otherwise.
    pub fn from_plaintext(text: String) -> Self {
        match serde_json::from_str(&text) {
            Ok(value) => Payload::Json(value),
            Err(_) => Payload::Text(text),
        }
    }

    /// What this payload becomes after a seal/open round trip.
    pub fn normalized(&self) -> Self {
        Self::from_plaintext(self.to_canonical_text())
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Payload::Text(s) => Some(s),
            Payload::Json(_) => None,
        }
    }

    pub fn as_json(&self) -> Option<&serde_json::Value> {
        match self {
            Payload::Json(v) => Some(v),
            Payload::Text(_) => None,
        }
    }
}

impl From<&str> for Payload {
    fn from(s: &str) -> Self {
        Payload::Text(s.to_string())
    }
}

impl From<String> for Payload {
    fn from(s: String) -> Self {
        Payload::Text(s)
    }
}

impl From<serde_json::Value> for Payload {
    fn from(v: serde_json::Value) -> Self {
        Payload::Json(v)
    }
}

/// Seal a payload under a passphrase with the default KDF cost.
pub fn seal(payload: &Payload, passphrase: &str) -> Result<SealedEnvelope> {
    seal_with(payload, passphrase, &KdfParams::default())
}

/// Seal a payload under a passphrase with explicit KDF cost.
pub fn seal_with(payload: &Payload, passphrase: &str, params: &KdfParams) -> Result<SealedEnvelope> {
    let salt = Salt::generate();
    let nonce = EncryptionNonce::generate();
    let key = EncryptionKey::from_passphrase(passphrase, &salt, params)?;
    let ciphertext = key.encrypt(payload.to_canonical_text().as_bytes(), &nonce)?;

    let body = EnvelopeBody {
        format: EnvelopeFormat::Argon2idChaCha20Poly1305,
        kdf: *params,
        salt,
        nonce,
        ciphertext,
    };
    body.encode().map(SealedEnvelope)
}

/// Open an envelope and recover the payload.
///
/// Fails with [`CryptoError::DecryptionFailed`] for a wrong passphrase, a
/// corrupted envelope, or input that is not an envelope at all.
pub fn open(envelope: &str, passphrase: &str) -> Result<Payload> {
    open_text(envelope, passphrase).map(Payload::from_plaintext)
}

/// Open an envelope and return the decrypted text without JSON recovery.
pub fn open_text(envelope: &str, passphrase: &str) -> Result<String> {
    let body = EnvelopeBody::decode(envelope).map_err(|_| CryptoError::DecryptionFailed)?;
    if !body.kdf.within_bounds() {
        return Err(CryptoError::DecryptionFailed);
    }

    let key = EncryptionKey::from_passphrase(passphrase, &body.salt, &body.kdf)
        .map_err(|_| CryptoError::DecryptionFailed)?;
    let plaintext = match body.format {
        EnvelopeFormat::Argon2idChaCha20Poly1305 => key.decrypt(&body.ciphertext, &body.nonce),
    }
    .map_err(|_| CryptoError::DecryptionFailed)?;

    String::from_utf8(plaintext).map_err(|_| CryptoError::DecryptionFailed)
}
