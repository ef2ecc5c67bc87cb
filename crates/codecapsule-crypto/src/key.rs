//! Symmetric keys, nonces, salts, and key derivation.
//!
//! Passphrase keys come from Argon2id. The server key is derived from the
//! configured secret with BLAKE3 in key-derivation mode.

use argon2::{Algorithm, Argon2, Params, Version};
use chacha20poly1305::{
    aead::{Aead, KeyInit},
    ChaCha20Poly1305, Nonce,
};
use rand::RngCore;
use serde::{Deserialize, Serialize};
use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::error::{CryptoError, Result};

pub const KEY_SIZE: usize = 32;
pub const NONCE_SIZE: usize = 12;
pub const SALT_SIZE: usize = 16;
pub const TAG_SIZE: usize = 16;

/// Argon2id cost parameters.
///
/// Stored inside every envelope so that opening needs only the passphrase.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct KdfParams {
    /// Memory cost in KiB.
    pub m_cost: u32,
    /// Iterations.
    pub t_cost: u32,
    /// Lanes.
    pub p_cost: u32,
}

impl KdfParams {
    /// Upper bounds accepted when opening. Anything larger is treated as a
    /// corrupted envelope rather than run.
    pub const MAX_M_COST: u32 = 256 * 1024;
    pub const MAX_T_COST: u32 = 16;
    pub const MAX_P_COST: u32 = 8;

    /// Cheap parameters for tests.
    pub const fn fast() -> Self {
        Self {
            m_cost: 64,
            t_cost: 1,
            p_cost: 1,
        }
    }

    pub fn within_bounds(&self) -> bool {
        self.m_cost <= Self::MAX_M_COST
            && self.t_cost <= Self::MAX_T_COST
            && self.p_cost <= Self::MAX_P_COST
    }
}

impl Default for KdfParams {
    fn default() -> Self {
        Self {
            m_cost: 19 * 1024,
            t_cost: 2,
            p_cost: 1,
        }
    }
}

/// A random Argon2 salt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Salt(pub [u8; SALT_SIZE]);

impl Salt {
    pub fn generate() -> Self {
        let mut bytes = [0u8; SALT_SIZE];
        rand::thread_rng().fill_bytes(&mut bytes);
        Self(bytes)
    }

    pub const fn as_bytes(&self) -> &[u8; SALT_SIZE] {
        &self.0
    }
}

/// A 96-bit nonce for ChaCha20-Poly1305.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct EncryptionNonce(pub [u8; NONCE_SIZE]);

impl EncryptionNonce {
    /// Generate a new random nonce.
    pub fn generate() -> Self {
        let mut bytes = [0u8; NONCE_SIZE];
        rand::thread_rng().fill_bytes(&mut bytes);
        Self(bytes)
    }

    /// Create from raw bytes.
    pub const fn from_bytes(bytes: [u8; NONCE_SIZE]) -> Self {
        Self(bytes)
    }

    /// Get the raw bytes.
    pub const fn as_bytes(&self) -> &[u8; NONCE_SIZE] {
        &self.0
    }
}

/// A 256-bit symmetric encryption key for ChaCha20-Poly1305.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct EncryptionKey([u8; KEY_SIZE]);

impl EncryptionKey {
    /// Generate a new random key.
    pub fn generate() -> Self {
        let mut bytes = [0u8; KEY_SIZE];
        rand::thread_rng().fill_bytes(&mut bytes);
        Self(bytes)
    }

    /// Create from raw bytes.
    pub const fn from_bytes(bytes: [u8; KEY_SIZE]) -> Self {
        Self(bytes)
    }

    /// Get the raw bytes.
    pub fn as_bytes(&self) -> &[u8; KEY_SIZE] {
        &self.0
    }

    /// Stretch a passphrase with Argon2id.
    pub fn from_passphrase(passphrase: &str, salt: &Salt, params: &KdfParams) -> Result<Self> {
        let argon_params = Params::new(params.m_cost, params.t_cost, params.p_cost, Some(KEY_SIZE))
            .map_err(|e| CryptoError::KeyDerivationError(e.to_string()))?;
        let argon = Argon2::new(Algorithm::Argon2id, Version::V0x13, argon_params);

        let mut key = [0u8; KEY_SIZE];
        argon
            .hash_password_into(passphrase.as_bytes(), salt.as_bytes(), &mut key)
            .map_err(|e| CryptoError::KeyDerivationError(e.to_string()))?;
        Ok(Self(key))
    }

    /// Derive a key from high-entropy secret material.
    ///
    /// `context` provides domain separation and must be a hardcoded string.
    pub fn from_secret(secret: &[u8], context: &str) -> Self {
        Self(blake3::derive_key(context, secret))
    }

    /// Encrypt data with this key.
    pub fn encrypt(&self, plaintext: &[u8], nonce: &EncryptionNonce) -> Result<Vec<u8>> {
        let cipher = ChaCha20Poly1305::new_from_slice(&self.0)
            .map_err(|e| CryptoError::EncryptionError(e.to_string()))?;

        cipher
            .encrypt(Nonce::from_slice(&nonce.0), plaintext)
            .map_err(|e| CryptoError::EncryptionError(e.to_string()))
    }

    /// Decrypt data with this key.
    pub fn decrypt(&self, ciphertext: &[u8], nonce: &EncryptionNonce) -> Result<Vec<u8>> {
        let cipher =
            ChaCha20Poly1305::new_from_slice(&self.0).map_err(|_| CryptoError::DecryptionFailed)?;

        cipher
            .decrypt(Nonce::from_slice(&nonce.0), ciphertext)
            .map_err(|_| CryptoError::DecryptionFailed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encrypt_decrypt() {
        let key = EncryptionKey::generate();
        let nonce = EncryptionNonce::generate();
        let plaintext = b"hello, world!";

        let ciphertext = key.encrypt(plaintext, &nonce).unwrap();
        assert_ne!(ciphertext, plaintext);
        assert_eq!(ciphertext.len(), plaintext.len() + TAG_SIZE);

        let decrypted = key.decrypt(&ciphertext, &nonce).unwrap();
        assert_eq!(decrypted, plaintext);
    }

    #[test]
    fn test_decrypt_wrong_key_fails() {
        let key1 = EncryptionKey::generate();
        let key2 = EncryptionKey::generate();
        let nonce = EncryptionNonce::generate();

        let ciphertext = key1.encrypt(b"secret", &nonce).unwrap();

        assert_eq!(key2.decrypt(&ciphertext, &nonce), Err(CryptoError::DecryptionFailed));
    }

    #[test]
    fn test_passphrase_derivation_deterministic() {
        let salt = Salt([7; SALT_SIZE]);
        let k1 = EncryptionKey::from_passphrase("hunter22", &salt, &KdfParams::fast()).unwrap();
        let k2 = EncryptionKey::from_passphrase("hunter22", &salt, &KdfParams::fast()).unwrap();
        assert_eq!(k1.as_bytes(), k2.as_bytes());

        let k3 = EncryptionKey::from_passphrase("hunter23", &salt, &KdfParams::fast()).unwrap();
        assert_ne!(k1.as_bytes(), k3.as_bytes());
    }

    #[test]
    fn test_salt_changes_key() {
        let k1 =
            EncryptionKey::from_passphrase("hunter22", &Salt([1; 16]), &KdfParams::fast()).unwrap();
        let k2 =
            EncryptionKey::from_passphrase("hunter22", &Salt([2; 16]), &KdfParams::fast()).unwrap();
        assert_ne!(k1.as_bytes(), k2.as_bytes());
    }

    #[test]
    fn test_invalid_kdf_params_rejected() {
        let params = KdfParams {
            m_cost: 1,
            t_cost: 0,
            p_cost: 0,
        };
        let err = EncryptionKey::from_passphrase("x", &Salt::generate(), &params);
        assert!(matches!(err, Err(CryptoError::KeyDerivationError(_))));
    }

    #[test]
    fn test_secret_derivation_context_separation() {
        let a = EncryptionKey::from_secret(b"secret", "context a");
        let b = EncryptionKey::from_secret(b"secret", "context b");
        assert_ne!(a.as_bytes(), b.as_bytes());
    }

    #[test]
    fn test_default_params_within_bounds() {
        assert!(KdfParams::default().within_bounds());
        assert!(KdfParams::fast().within_bounds());
        assert!(!KdfParams {
            m_cost: u32::MAX,
            t_cost: 1,
            p_cost: 1
        }
        .within_bounds());
    }
}
