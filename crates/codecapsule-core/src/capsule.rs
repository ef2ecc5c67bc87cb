//! Capsule records and share grants.
//!
//! A capsule is created once by its owner. After that the only mutations are
//! the system flipping `is_unlocked` to true and the owner soft-deleting it.
//! There is no setter for `unlock_date` or `access_mode`.

use serde::{Deserialize, Serialize};

use crate::lifecycle::LifecycleState;
use crate::types::{AccessMode, CapsuleId, UserId};

/// A persisted capsule.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Capsule {
    pub id: CapsuleId,
    pub owner_id: UserId,
    pub title: String,
    pub description: Option<String>,
    pub language: Option<String>,
    /// Plaintext note, released together with the content.
    pub note: Option<String>,
    /// At-rest payload: a server-wrapped client envelope. Never plaintext.
    pub payload: String,
    pub access_mode: AccessMode,
    /// Unix milliseconds. Write-once.
    pub unlock_date: i64,
    /// Cached flag, monotonic false -> true.
    pub is_unlocked: bool,
    pub passphrase_hint: Option<String>,
    pub is_deleted: bool,
    pub created_at: i64,
    pub updated_at: i64,
}

impl Capsule {
    /// Build a fresh record from validated input and an at-rest payload.
    pub fn create(owner_id: UserId, draft: &NewCapsule, payload: String, now: i64) -> Self {
        Self {
            id: CapsuleId::generate(),
            owner_id,
            title: draft.title.clone(),
            description: draft.description.clone(),
            language: draft.language.clone(),
            note: draft.note.clone(),
            payload,
            access_mode: draft.access_mode,
            unlock_date: draft.unlock_date,
            is_unlocked: false,
            passphrase_hint: draft.passphrase_hint.clone(),
            is_deleted: false,
            created_at: now,
            updated_at: now,
        }
    }

    /// Observe the lifecycle state at `now`.
    pub fn lifecycle(&self, now: i64) -> LifecycleState {
        LifecycleState::observe(self.unlock_date, self.is_unlocked, now)
    }

    /// Whether the cached flag is stale and should be persisted as unlocked.
    pub fn needs_unlock(&self, now: i64) -> bool {
        self.lifecycle(now) == LifecycleState::Ready
    }

    /// Set the cached flag. There is no inverse.
    pub fn mark_unlocked(&mut self, now: i64) {
        if !self.is_unlocked {
            self.is_unlocked = true;
            self.updated_at = now;
        }
    }

    /// Milliseconds until the unlock date, zero once it has passed.
    pub fn time_until_unlock(&self, now: i64) -> i64 {
        (self.unlock_date - now).max(0)
    }

    pub fn is_owned_by(&self, user: &UserId) -> bool {
        &self.owner_id == user
    }

    /// Metadata view. Never includes the payload or the note.
    pub fn metadata(&self) -> CapsuleMetadata {
        CapsuleMetadata::from(self)
    }
}

/// What anyone permitted to see a capsule may see, regardless of lock state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CapsuleMetadata {
    pub id: CapsuleId,
    pub owner_id: UserId,
    pub title: String,
    pub description: Option<String>,
    pub language: Option<String>,
    pub access_mode: AccessMode,
    pub unlock_date: i64,
    pub is_unlocked: bool,
    pub passphrase_hint: Option<String>,
    pub created_at: i64,
    pub updated_at: i64,
}

impl From<&Capsule> for CapsuleMetadata {
    fn from(c: &Capsule) -> Self {
        Self {
            id: c.id,
            owner_id: c.owner_id.clone(),
            title: c.title.clone(),
            description: c.description.clone(),
            language: c.language.clone(),
            access_mode: c.access_mode,
            unlock_date: c.unlock_date,
            is_unlocked: c.is_unlocked,
            passphrase_hint: c.passphrase_hint.clone(),
            created_at: c.created_at,
            updated_at: c.updated_at,
        }
    }
}

/// Creation input, as submitted by the owner.
///
/// `envelope` is the client-sealed payload. The server never sees the
/// passphrase that produced it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewCapsule {
    pub title: String,
    pub description: Option<String>,
    pub language: Option<String>,
    pub note: Option<String>,
    pub envelope: String,
    #[serde(default)]
    pub access_mode: AccessMode,
    pub passphrase_hint: Option<String>,
    pub unlock_date: i64,
    #[serde(default)]
    pub shared_with: Vec<String>,
}

impl NewCapsule {
    /// Minimal private capsule; the rest is filled in with the builder methods.
    pub fn new(title: impl Into<String>, envelope: impl Into<String>, unlock_date: i64) -> Self {
        Self {
            title: title.into(),
            description: None,
            language: None,
            note: None,
            envelope: envelope.into(),
            access_mode: AccessMode::Private,
            passphrase_hint: None,
            unlock_date,
            shared_with: Vec::new(),
        }
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn language(mut self, language: impl Into<String>) -> Self {
        self.language = Some(language.into());
        self
    }

    pub fn note(mut self, note: impl Into<String>) -> Self {
        self.note = Some(note.into());
        self
    }

    pub fn hint(mut self, hint: impl Into<String>) -> Self {
        self.passphrase_hint = Some(hint.into());
        self
    }

    pub fn access_mode(mut self, mode: AccessMode) -> Self {
        self.access_mode = mode;
        self
    }

    /// Make the capsule `SHARED` with the given recipients.
    pub fn share_with<I, T>(mut self, recipients: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<String>,
    {
        self.access_mode = AccessMode::Shared;
        self.shared_with = recipients.into_iter().map(Into::into).collect();
        self
    }
}

/// Read eligibility for one recipient on one `SHARED` capsule.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ShareGrant {
    pub capsule_id: CapsuleId,
    /// Normalized recipient identifier (e-mail address).
    pub recipient: String,
    pub created_at: i64,
}

impl ShareGrant {
    pub fn new(capsule_id: CapsuleId, recipient: &str, created_at: i64) -> Self {
        Self {
            capsule_id,
            recipient: normalize_recipient(recipient),
            created_at,
        }
    }
}

/// Canonical form of a recipient identifier: trimmed and lowercased.
pub fn normalize_recipient(recipient: &str) -> String {
    recipient.trim().to_lowercase()
}
