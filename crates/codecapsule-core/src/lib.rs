//! # CodeCapsule Core
//!
//! Pure primitives for CodeCapsule: capsule records, access modes, the
//! unlock lifecycle, and creation-time validation.
//!
//! This crate contains no I/O, no storage, and no cryptography. It is pure
//! computation over capsule records and wall-clock timestamps.
//!
//! ## Key Types
//!
//! - [`Capsule`] - A sealed record with an at-rest payload and an unlock date
//! - [`CapsuleId`] - Random opaque identifier assigned at creation
//! - [`AccessMode`] - `PRIVATE`, `SHARED`, or `PUBLIC`
//! - [`LifecycleState`] - `Sealed`, `Ready`, or `Unlocked`, observed at a point in time
//! - [`Visibility`] - What a requester may see of a capsule
//!
//! ## Time
//!
//! All instants are Unix milliseconds (`i64`). The current time is supplied
//! through the [`Clock`] trait so that callers can substitute a manual clock.

pub mod capsule;
pub mod clock;
pub mod error;
pub mod lifecycle;
pub mod types;
pub mod validation;

pub use capsule::{normalize_recipient, Capsule, CapsuleMetadata, NewCapsule, ShareGrant};
pub use clock::{now_millis, Clock, SystemClock};
pub use error::{CoreError, FieldIssue, ValidationError};
pub use lifecycle::{visibility, LifecycleState, Role, Visibility};
pub use types::{AccessMode, CapsuleId, Requester, UserId};
pub use validation::{
    earliest_unlock_date, is_valid_email, validate_new_capsule, validate_passphrase, Limits,
    MIN_PASSPHRASE_LEN,
};
