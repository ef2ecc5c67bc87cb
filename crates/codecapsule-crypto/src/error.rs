//! Error types for the encryption layers.

use thiserror::Error;

/// Errors that can occur while sealing, opening, wrapping, or unwrapping.
///
/// The two decryption variants carry no detail. A wrong key, a
/// corrupted envelope, and garbage input all look the same to the caller.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CryptoError {
    /// Client layer could not be opened.
    #[error("decryption failed")]
    DecryptionFailed,

    /// Server layer could not be reversed.
    #[error("server decryption failed")]
    ServerDecryptionFailed,

    /// The server secret is not configured.
    #[error("server encryption secret not configured")]
    ConfigurationMissing,

    /// Input is not a sealed envelope.
    #[error("malformed envelope")]
    MalformedEnvelope,

    /// Encryption error.
    #[error("encryption error: {0}")]
    EncryptionError(String),

    /// Key derivation error.
    #[error("key derivation error: {0}")]
    KeyDerivationError(String),

    /// Serialization error.
    #[error("serialization error: {0}")]
    SerializationError(String),
}

/// Result type for encryption operations.
pub type Result<T> = std::result::Result<T, CryptoError>;
