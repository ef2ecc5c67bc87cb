//! Test fixtures and helpers.
//!
//! Common setup for integration tests: a vault on a manual clock, a static
//! server secret, and a few fixed identities.

use std::sync::Arc;

use codecapsule::{Vault, VaultConfig};
use codecapsule_core::{AccessMode, Capsule, CapsuleId, NewCapsule, Requester, UserId};
use codecapsule_crypto::{
    seal_with, KdfParams, Payload, SealedEnvelope, SecretSource, ServerLayer, ServerSecret,
};
use codecapsule_store::{MemoryStore, RecordStore};

use crate::clock::ManualClock;

/// 2024-03-15T13:45:00Z.
pub const NOW: i64 = 1_710_510_300_000;
/// 2024-03-16T00:00:00Z, the earliest unlock date accepted at [`NOW`].
pub const TOMORROW: i64 = 1_710_547_200_000;
pub const SECOND: i64 = 1_000;
pub const DAY: i64 = 86_400_000;

pub const TEST_SECRET: &str = "testkit server secret";
pub const TEST_PASSPHRASE: &str = "testkit passphrase";

pub const OWNER: &str = "owner";
pub const GRANTEE: &str = "grantee";
pub const GRANTEE_EMAIL: &str = "grantee@example.com";
pub const STRANGER: &str = "stranger";
pub const STRANGER_EMAIL: &str = "stranger@example.com";

pub fn owner_id() -> UserId {
    UserId::new(OWNER)
}

pub fn owner() -> Requester {
    Requester::user_with_email(OWNER, "owner@example.com")
}

pub fn grantee() -> Requester {
    Requester::user_with_email(GRANTEE, GRANTEE_EMAIL)
}

pub fn stranger() -> Requester {
    Requester::user_with_email(STRANGER, STRANGER_EMAIL)
}

/// Every identity a capsule can be looked at by.
pub fn all_requesters() -> Vec<Requester> {
    vec![owner(), grantee(), stranger(), Requester::Anonymous]
}

/// Seal with the test passphrase and cheap KDF parameters.
pub fn seal_text(text: &str) -> SealedEnvelope {
    seal_payload(&Payload::from(text))
}

pub fn seal_payload(payload: &Payload) -> SealedEnvelope {
    seal_with(payload, TEST_PASSPHRASE, &KdfParams::fast()).expect("seal with fast params")
}

/// Default config with the test secret.
pub fn test_config() -> VaultConfig {
    VaultConfig::default().with_secret(SecretSource::Static(ServerSecret::new(TEST_SECRET)))
}

/// A valid draft unlocking at [`TOMORROW`].
pub fn draft(title: &str, mode: AccessMode) -> NewCapsule {
    NewCapsule::new(title, seal_text(title).into_string(), TOMORROW).access_mode(mode)
}

/// A vault over `S` on a [`ManualClock`] starting at [`NOW`].
pub struct TestVault<S: RecordStore = MemoryStore> {
    pub vault: Vault<S>,
    pub clock: ManualClock,
}

impl TestVault<MemoryStore> {
    pub fn new() -> Self {
        Self::with_store(MemoryStore::new())
    }
}

impl Default for TestVault<MemoryStore> {
    fn default() -> Self {
        Self::new()
    }
}

impl<S: RecordStore> TestVault<S> {
    pub fn with_store(store: S) -> Self {
        Self::with_config(store, test_config())
    }

    pub fn with_config(store: S, config: VaultConfig) -> Self {
        let clock = ManualClock::new(NOW);
        Self {
            vault: Vault::with_clock(store, config, Arc::new(clock.clone())),
            clock,
        }
    }

    /// Create a capsule through the vault, as [`OWNER`].
    pub async fn create(&self, draft: NewCapsule) -> CapsuleId {
        self.vault
            .create_capsule(&owner_id(), draft)
            .await
            .expect("create_capsule")
            .capsule_id
    }

    /// Insert a capsule straight into the store, bypassing creation checks.
    ///
    /// For states validation would refuse, such as an unlock date that has
    /// already passed.
    pub async fn plant(&self, mode: AccessMode, unlock_date: i64) -> Capsule {
        let draft = NewCapsule::new("planted", "", unlock_date).access_mode(mode);
        let at_rest = ServerLayer::with_secret(TEST_SECRET)
            .wrap(&seal_text("planted"))
            .expect("wrap");
        let capsule = Capsule::create(
            owner_id(),
            &draft,
            at_rest.into_string(),
            self.clock_now(),
        );
        self.vault
            .store()
            .insert_capsule(&capsule)
            .await
            .expect("insert_capsule");
        capsule
    }

    /// The stored record, deleted or not.
    pub async fn stored(&self, id: &CapsuleId) -> Option<Capsule> {
        self.vault
            .store()
            .get_capsule(id)
            .await
            .expect("get_capsule")
    }

    pub fn clock_now(&self) -> i64 {
        use codecapsule_core::Clock;
        self.clock.now_millis()
    }
}
