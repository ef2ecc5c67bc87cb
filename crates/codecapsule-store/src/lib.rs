//! # CodeCapsule Store
//!
//! Storage abstraction for CodeCapsule. Provides a trait-based interface for
//! capsule and share-grant persistence with SQLite and in-memory
//! implementations.
//!
//! ## Key Types
//!
//! - [`RecordStore`] - The async trait for all storage operations
//! - [`SqliteStore`] - SQLite-based persistent storage
//! - [`MemoryStore`] - In-memory storage for tests
//! - [`CapsuleFilter`], [`CapsuleOrder`], [`Page`] - Listing queries
//! - [`CapsulePatch`] - The monotonic updates a stored capsule accepts
//!
//! ## Usage
//!
//! ```rust,no_run
//! use codecapsule_store::{CapsuleFilter, CapsuleOrder, Page, RecordStore, SqliteStore};
//! use codecapsule_core::AccessMode;
//!
//! async fn example() {
//!     let store = SqliteStore::open("capsules.db").unwrap();
//!
//!     let feed = CapsuleFilter::default().mode(AccessMode::Public).unlocked(true);
//!     let first_page = store
//!         .find_capsules(&feed, CapsuleOrder::UnlockDesc, Some(Page::number(1, 12)))
//!         .await
//!         .unwrap();
//! }
//! ```
//!
//! ## Design Notes
//!
//! - Stored payloads are opaque at-rest text; this crate never encrypts or
//!   decrypts anything.
//! - The store does not hide soft-deleted capsules from `get_capsule`. Callers
//!   decide what a deleted record means.

pub mod error;
pub mod memory;
pub mod migration;
pub mod sqlite;
pub mod traits;

pub use error::{Result, StoreError};
pub use memory::MemoryStore;
pub use sqlite::SqliteStore;
pub use traits::{
    CapsuleFilter, CapsuleOrder, CapsulePatch, GrantInsertSummary, InsertResult, Page,
    RecordStore, StoreExt,
};

#[cfg(test)]
pub(crate) mod test_support {
    use codecapsule_core::{AccessMode, Capsule, NewCapsule, UserId};

    pub fn capsule(owner: &str, mode: AccessMode, unlock_date: i64, created_at: i64) -> Capsule {
        let draft = NewCapsule::new("title", "cce1.envelope", unlock_date).access_mode(mode);
        Capsule::create(UserId::new(owner), &draft, "ccs1.payload".into(), created_at)
    }
}
