//! # CodeCapsule Testkit
//!
//! Testing utilities for CodeCapsule.
//!
//! ## Overview
//!
//! This crate provides:
//!
//! - **Fixtures**: a vault on a manual clock with a static test secret and
//!   fixed identities
//! - **Generators**: Proptest strategies for property-based testing
//! - **Vectors**: Known earliest-unlock-date cases for the calendar-day policy
//!
//! ## Test Fixtures
//!
//! ```rust,no_run
//! use codecapsule_testkit::{draft, grantee, TestVault, DAY};
//! use codecapsule_core::AccessMode;
//!
//! async fn example() {
//!     let t = TestVault::new();
//!     let id = t.create(draft("hello", AccessMode::Public)).await;
//!
//!     t.clock.advance(2 * DAY);
//!     let released = t.vault.request_content(&id, &grantee()).await.unwrap();
//! }
//! ```
//!
//! ## Property Testing
//!
//! ```rust,ignore
//! use proptest::prelude::*;
//! use codecapsule_testkit::generators::{payload, passphrase};
//!
//! proptest! {
//!     #[test]
//!     fn roundtrip(p in payload(), k in passphrase()) {
//!         // ...
//!     }
//! }
//! ```

pub mod clock;
pub mod fixtures;
pub mod generators;
pub mod vectors;

pub use clock::ManualClock;
pub use fixtures::{
    all_requesters, draft, grantee, owner, owner_id, seal_payload, seal_text, stranger,
    test_config, TestVault, DAY, GRANTEE_EMAIL, NOW, SECOND, TEST_PASSPHRASE, TEST_SECRET,
    TOMORROW,
};
pub use generators::VaultAction;
pub use vectors::{all_vectors, verify_all_vectors, UnlockDateVector};
