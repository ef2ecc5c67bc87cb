//! Capsule lifecycle and visibility.
//!
//! `Sealed -> Ready` is a pure function of wall-clock time and is never
//! stored. `Ready -> Unlocked` happens when a read observes a ready capsule
//! and persists the flag. Nothing moves a capsule back to `Sealed`.

use serde::{Deserialize, Serialize};

use crate::types::{AccessMode, Requester, UserId};

/// Lifecycle state of a capsule as observed at one instant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum LifecycleState {
    /// `now < unlock_date`.
    Sealed,
    /// `now >= unlock_date` but the flag has not been persisted yet.
    Ready,
    /// Flag persisted.
    Unlocked,
}

impl LifecycleState {
    /// Compute the state from the stored fields and the current time.
    pub fn observe(unlock_date: i64, is_unlocked: bool, now: i64) -> Self {
        if is_unlocked {
            LifecycleState::Unlocked
        } else if now >= unlock_date {
            LifecycleState::Ready
        } else {
            LifecycleState::Sealed
        }
    }

    /// Whether the unlock date has been reached.
    pub fn is_due(&self) -> bool {
        !matches!(self, LifecycleState::Sealed)
    }

    pub fn is_unlocked(&self) -> bool {
        matches!(self, LifecycleState::Unlocked)
    }
}

/// The requester's relationship to a capsule.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Role {
    Owner,
    Grantee,
    Other,
}

impl Role {
    /// Resolve the role of `requester` for a capsule owned by `owner`.
    ///
    /// `has_grant` is only consulted for `SHARED` capsules; grants on other
    /// modes confer nothing.
    pub fn resolve(owner: &UserId, mode: AccessMode, requester: &Requester, has_grant: bool) -> Self {
        if requester.user_id() == Some(owner) {
            Role::Owner
        } else if mode == AccessMode::Shared && has_grant {
            Role::Grantee
        } else {
            Role::Other
        }
    }
}

/// What a requester may see.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Visibility {
    /// Nothing, not even existence.
    Denied,
    /// Title, description, language, dates, hint.
    MetadataOnly,
    /// Metadata plus the decrypt-eligible payload.
    Full,
}

impl Visibility {
    pub fn can_view_metadata(&self) -> bool {
        *self >= Visibility::MetadataOnly
    }

    pub fn can_view_content(&self) -> bool {
        *self == Visibility::Full
    }
}

/// The visibility policy table.
///
/// | mode    | role            | Sealed / Ready | Unlocked |
/// |---------|-----------------|----------------|----------|
/// | PRIVATE | owner           | full           | full     |
/// | PRIVATE | other           | denied         | denied   |
/// | SHARED  | owner / grantee | metadata       | full     |
/// | SHARED  | other           | denied         | denied   |
/// | PUBLIC  | anyone          | metadata       | full     |
///
/// `Ready` is treated like `Sealed`: callers persist the flag first and then
/// evaluate with `Unlocked`.
pub fn visibility(mode: AccessMode, role: Role, state: LifecycleState) -> Visibility {
    let unlocked = state.is_unlocked();
    match (mode, role) {
        (AccessMode::Private, Role::Owner) => Visibility::Full,
        (AccessMode::Private, _) => Visibility::Denied,
        (AccessMode::Shared, Role::Owner | Role::Grantee) if unlocked => Visibility::Full,
        (AccessMode::Shared, Role::Owner | Role::Grantee) => Visibility::MetadataOnly,
        (AccessMode::Shared, Role::Other) => Visibility::Denied,
        (AccessMode::Public, _) if unlocked => Visibility::Full,
        (AccessMode::Public, _) => Visibility::MetadataOnly,
    }
}
