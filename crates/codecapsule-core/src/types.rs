//! Strong type definitions for CodeCapsule.
//!
//! All identifiers are newtypes to prevent misuse at compile time.

use std::fmt;
use std::str::FromStr;

use rand::RngCore;
use serde::{Deserialize, Serialize};

use crate::error::CoreError;

/// A 16-byte capsule identifier.
///
/// Generated randomly at creation time and never changed afterwards.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct CapsuleId(pub [u8; 16]);

impl CapsuleId {
    /// Generate a fresh random identifier.
    pub fn generate() -> Self {
        let mut bytes = [0u8; 16];
        rand::thread_rng().fill_bytes(&mut bytes);
        Self(bytes)
    }

    /// Create from raw bytes.
    pub const fn from_bytes(bytes: [u8; 16]) -> Self {
        Self(bytes)
    }

    /// Get the raw bytes.
    pub const fn as_bytes(&self) -> &[u8; 16] {
        &self.0
    }

    /// Convert to hex string.
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    /// Parse from hex string.
    pub fn from_hex(s: &str) -> Result<Self, CoreError> {
        let bytes = hex::decode(s).map_err(|_| CoreError::InvalidCapsuleId(s.to_string()))?;
        let arr: [u8; 16] = bytes
            .try_into()
            .map_err(|_| CoreError::InvalidCapsuleId(s.to_string()))?;
        Ok(Self(arr))
    }
}

impl fmt::Debug for CapsuleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "CapsuleId({})", self.to_hex())
    }
}

impl fmt::Display for CapsuleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl FromStr for CapsuleId {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_hex(s)
    }
}

/// Identity of an authenticated user, as resolved by the session layer.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct UserId(pub String);

impl UserId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Who is asking. Handed to the core already authenticated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Requester {
    /// No session.
    Anonymous,
    /// A signed-in user. `email` is the identifier share grants are keyed on.
    User { id: UserId, email: Option<String> },
}

impl Requester {
    /// A signed-in user without a known e-mail address.
    pub fn user(id: impl Into<String>) -> Self {
        Requester::User {
            id: UserId::new(id),
            email: None,
        }
    }

    /// A signed-in user with an e-mail address.
    pub fn user_with_email(id: impl Into<String>, email: impl Into<String>) -> Self {
        Requester::User {
            id: UserId::new(id),
            email: Some(email.into()),
        }
    }

    pub fn user_id(&self) -> Option<&UserId> {
        match self {
            Requester::User { id, .. } => Some(id),
            Requester::Anonymous => None,
        }
    }

    pub fn email(&self) -> Option<&str> {
        match self {
            Requester::User { email, .. } => email.as_deref(),
            Requester::Anonymous => None,
        }
    }

    pub fn is_anonymous(&self) -> bool {
        matches!(self, Requester::Anonymous)
    }
}

/// Who may attempt to read a capsule.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum AccessMode {
    /// Owner only.
    Private,
    /// Owner plus explicit grantees.
    Shared,
    /// Anyone, once unlocked.
    Public,
}

impl AccessMode {
    pub const fn as_str(&self) -> &'static str {
        match self {
            AccessMode::Private => "PRIVATE",
            AccessMode::Shared => "SHARED",
            AccessMode::Public => "PUBLIC",
        }
    }
}

impl Default for AccessMode {
    fn default() -> Self {
        AccessMode::Private
    }
}

impl fmt::Display for AccessMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AccessMode {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "PRIVATE" => Ok(AccessMode::Private),
            "SHARED" => Ok(AccessMode::Shared),
            "PUBLIC" => Ok(AccessMode::Public),
            other => Err(CoreError::UnknownAccessMode(other.to_string())),
        }
    }
}
