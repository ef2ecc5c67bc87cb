//! # CodeCapsule
//!
//! Time capsules for code: a payload sealed under the owner's passphrase,
//! wrapped again under a server secret, and released only when the unlock
//! date and the access mode allow it.
//!
//! ## Overview
//!
//! - **Envelope**: the client seals a payload with a passphrase the server
//!   never sees ([`crypto::seal`]).
//! - **At rest**: the server wraps the envelope once more before storing it.
//! - **Lifecycle**: `Sealed -> Ready -> Unlocked`. The flag flips lazily,
//!   on the first read that observes a due capsule. Nothing re-locks.
//! - **Access modes**: `PRIVATE` (owner), `SHARED` (owner and grantees,
//!   content after unlock), `PUBLIC` (anyone, content after unlock).
//!
//! ## Usage
//!
//! ```rust,no_run
//! use codecapsule::{Requester, UserId, Vault, VaultConfig};
//! use codecapsule::core::{AccessMode, NewCapsule};
//! use codecapsule::crypto::{seal, Payload};
//! use codecapsule::store::SqliteStore;
//!
//! async fn example(unlock_date: i64) {
//!     let store = SqliteStore::open("capsules.db").unwrap();
//!     let vault = Vault::new(store, VaultConfig::from_env().unwrap());
//!
//!     // Client side: seal before sending.
//!     let envelope = seal(&Payload::from("fn main() {}"), "correct horse battery").unwrap();
//!
//!     let owner = UserId::new("alice");
//!     let draft = NewCapsule::new("first program", envelope.into_string(), unlock_date)
//!         .access_mode(AccessMode::Public);
//!     let outcome = vault.create_capsule(&owner, draft).await.unwrap();
//!
//!     // Later, anyone may fetch it once unlocked and open it with the passphrase.
//!     let released = vault
//!         .request_content(&outcome.capsule_id, &Requester::Anonymous)
//!         .await
//!         .unwrap();
//!     let payload = released.open("correct horse battery").unwrap();
//! }
//! ```
//!
//! ## Re-exports
//!
//! - `codecapsule::core` - Capsule records, lifecycle, validation
//! - `codecapsule::crypto` - Envelope codec and server layer
//! - `codecapsule::store` - Storage abstraction and SQLite

pub mod config;
pub mod error;
pub mod vault;

pub use codecapsule_core as core;
pub use codecapsule_crypto as crypto;
pub use codecapsule_store as store;

pub use config::VaultConfig;
pub use error::{Result, VaultError, DENIAL_MESSAGE};
pub use vault::{
    CapsuleView, CreateOutcome, FeedPage, FeedQuery, GrantReport, Pagination, ReleasedContent,
    Vault,
};

pub use codecapsule_core::{
    AccessMode, CapsuleId, CapsuleMetadata, LifecycleState, NewCapsule, Requester, UserId,
    Visibility,
};
