//! Error types for the Vault.

use codecapsule_core::{CapsuleId, CoreError, ValidationError};
use codecapsule_crypto::CryptoError;
use codecapsule_store::StoreError;
use thiserror::Error;

/// Message returned to callers for both `NotFound` and `Forbidden`.
pub const DENIAL_MESSAGE: &str = "capsule not available";

const INTERNAL_MESSAGE: &str = "internal error";

/// Errors that can occur during Vault operations.
#[derive(Debug, Error)]
pub enum VaultError {
    /// Malformed creation input.
    #[error("validation error: {0}")]
    Validation(#[from] ValidationError),

    /// Encryption or decryption failure. Never carries a cause.
    #[error("crypto error: {0}")]
    Crypto(CryptoError),

    /// The server secret is not configured.
    #[error("server encryption secret not configured")]
    ConfigurationMissing,

    /// Storage error.
    #[error("storage error: {0}")]
    Store(#[from] StoreError),

    /// Core error.
    #[error("core error: {0}")]
    Core(#[from] CoreError),

    /// No such capsule, or it was deleted.
    #[error("capsule not found: {0}")]
    NotFound(CapsuleId),

    /// The requester may not see what was asked for.
    #[error("access to capsule {0} forbidden")]
    Forbidden(CapsuleId),

    /// The operation needs a signed-in requester.
    #[error("authentication required")]
    Unauthenticated,
}

impl From<CryptoError> for VaultError {
    fn from(err: CryptoError) -> Self {
        match err {
            CryptoError::ConfigurationMissing => VaultError::ConfigurationMissing,
            other => VaultError::Crypto(other),
        }
    }
}

impl VaultError {
    /// `NotFound` and `Forbidden`, which must look identical to the caller.
    pub fn is_denial(&self) -> bool {
        matches!(self, VaultError::NotFound(_) | VaultError::Forbidden(_))
    }

    /// Whether operators need to act, as opposed to the caller.
    pub fn is_operational(&self) -> bool {
        matches!(
            self,
            VaultError::ConfigurationMissing
                | VaultError::Store(_)
                | VaultError::Core(_)
                | VaultError::Crypto(_)
        )
    }

    /// The message safe to show an end user.
    ///
    /// Denials collapse into one message that reveals neither existence nor
    /// ownership. Operational failures collapse into a generic one.
    pub fn public_message(&self) -> String {
        match self {
            VaultError::NotFound(_) | VaultError::Forbidden(_) => DENIAL_MESSAGE.to_string(),
            VaultError::Validation(e) => e.to_string(),
            VaultError::Unauthenticated => self.to_string(),
            VaultError::ConfigurationMissing
            | VaultError::Store(_)
            | VaultError::Core(_)
            | VaultError::Crypto(_) => INTERNAL_MESSAGE.to_string(),
        }
    }
}

/// Result type for Vault operations.
pub type Result<T> = std::result::Result<T, VaultError>;
