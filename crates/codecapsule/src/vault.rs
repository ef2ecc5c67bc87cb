//! The Vault: the operations exposed to the request boundary.
//!
//! The Vault brings together validation, the two encryption layers, the
//! lifecycle state machine, and the record store. Every read that observes
//! a capsule whose unlock date has passed persists the unlock flag before
//! returning, batched across a listing.

use std::sync::Arc;

use codecapsule_core::{
    validate_new_capsule, visibility, AccessMode, Capsule, CapsuleId, CapsuleMetadata, Clock,
    FieldIssue, NewCapsule, Requester, Role, ShareGrant, SystemClock, UserId, ValidationError,
    Visibility,
};
use codecapsule_crypto::{AtRestPayload, CryptoError, Payload, SealedEnvelope, ServerLayer};
use codecapsule_store::{
    CapsuleFilter, CapsuleOrder, CapsulePatch, InsertResult, Page, RecordStore, StoreError,
    StoreExt,
};
use serde::Serialize;
use tracing::{debug, error, info, warn};

use crate::config::VaultConfig;
use crate::error::{Result, VaultError};

/// What happened to the share grants of a newly created capsule.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum GrantReport {
    /// The capsule is not `SHARED`; no grants were written.
    NotShared,
    /// Grants were written. Repeated recipients collapsed into one.
    Recorded { inserted: usize, duplicates: usize },
    /// The grant batch failed after the capsule was stored. The capsule
    /// exists but is visible to nobody except its owner.
    Failed { requested: usize, reason: String },
}

/// Result of [`Vault::create_capsule`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CreateOutcome {
    pub capsule_id: CapsuleId,
    pub grants: GrantReport,
}

impl CreateOutcome {
    /// The capsule was stored but its grants were not.
    pub fn is_degraded(&self) -> bool {
        matches!(self.grants, GrantReport::Failed { .. })
    }
}

/// Public feed request. Pages are 1-based.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeedQuery {
    /// Exact language match. Blank means no filter.
    pub language: Option<String>,
    pub page: usize,
}

impl Default for FeedQuery {
    fn default() -> Self {
        Self {
            language: None,
            page: 1,
        }
    }
}

impl FeedQuery {
    pub fn page(page: usize) -> Self {
        Self {
            page,
            ..Self::default()
        }
    }

    pub fn language(mut self, language: impl Into<String>) -> Self {
        self.language = Some(language.into());
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Pagination {
    pub total: u64,
    pub pages: u64,
    pub current_page: usize,
    pub page_size: usize,
}

/// One page of the public feed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FeedPage {
    pub capsules: Vec<CapsuleMetadata>,
    pub pagination: Pagination,
}

/// Detail view of one capsule. Never contains the payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CapsuleView {
    pub metadata: CapsuleMetadata,
    pub is_owner: bool,
    /// Whether [`Vault::request_content`] would succeed for this requester now.
    pub content_available: bool,
    /// Milliseconds until the unlock date, zero once it has passed.
    pub time_until_unlock: i64,
}

impl CapsuleView {
    pub fn is_ready_to_unlock(&self) -> bool {
        self.time_until_unlock == 0
    }
}

/// Content released to an entitled requester.
///
/// The envelope is still client-encrypted. Opening it needs the passphrase,
/// which the server never has.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReleasedContent {
    pub capsule_id: CapsuleId,
    pub envelope: SealedEnvelope,
    pub note: Option<String>,
    pub passphrase_hint: Option<String>,
}

impl ReleasedContent {
    /// Open the client layer. Stateless; touches no storage.
    pub fn open(&self, passphrase: &str) -> std::result::Result<Payload, CryptoError> {
        self.envelope.open(passphrase)
    }
}

/// The main Vault struct.
///
/// Provides a unified API for:
/// - Creating capsules (seal check, server wrap, insert, grants)
/// - Listing owned, shared, and public capsules
/// - Capsule detail and content release under the visibility policy
/// - Soft deletion
pub struct Vault<S: RecordStore> {
    store: Arc<S>,
    server: ServerLayer,
    clock: Arc<dyn Clock>,
    config: VaultConfig,
}

impl<S: RecordStore> Vault<S> {
    /// Create a vault on the system clock.
    pub fn new(store: S, config: VaultConfig) -> Self {
        Self::with_clock(store, config, Arc::new(SystemClock))
    }

    /// Create a vault with an explicit clock.
    pub fn with_clock(store: S, config: VaultConfig, clock: Arc<dyn Clock>) -> Self {
        Self {
            store: Arc::new(store),
            server: ServerLayer::new(config.secret.clone()),
            clock,
            config,
        }
    }

    /// Get the store reference.
    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn config(&self) -> &VaultConfig {
        &self.config
    }

    /// Fail now, rather than at first use, if the server secret is missing.
    pub fn check_configured(&self) -> Result<()> {
        self.server.check_configured().map_err(|e| self.crypto_failure(e))
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Creation
    // ─────────────────────────────────────────────────────────────────────────

    /// Create a capsule from a client-sealed envelope.
    ///
    /// The capsule insert is atomic. For `SHARED` capsules the grant batch
    /// follows; if it fails the capsule is kept and the outcome reports the
    /// failure instead.
    pub async fn create_capsule(&self, owner: &UserId, draft: NewCapsule) -> Result<CreateOutcome> {
        let now = self.clock.now_millis();

        let envelope = self.validate_draft(&draft, now)?;
        let at_rest = self
            .server
            .wrap(&envelope)
            .map_err(|e| self.crypto_failure(e))?;

        let capsule = Capsule::create(owner.clone(), &draft, at_rest.into_string(), now);
        if self.store.insert_capsule(&capsule).await? == InsertResult::AlreadyExists {
            return Err(StoreError::InvalidData(format!("capsule id collision: {}", capsule.id)).into());
        }

        let grants = if capsule.access_mode == AccessMode::Shared {
            self.record_grants(&capsule, &draft.shared_with, now).await
        } else {
            GrantReport::NotShared
        };

        info!(
            capsule_id = %capsule.id,
            mode = %capsule.access_mode,
            unlock_date = capsule.unlock_date,
            "created capsule"
        );
        Ok(CreateOutcome {
            capsule_id: capsule.id,
            grants,
        })
    }

    fn validate_draft(&self, draft: &NewCapsule, now: i64) -> Result<SealedEnvelope> {
        let mut issues = match validate_new_capsule(
            draft,
            now,
            self.config.reference_offset,
            &self.config.limits,
        ) {
            Ok(()) => Vec::new(),
            Err(e) => e.issues,
        };

        let envelope = SealedEnvelope::parse(&draft.envelope);
        if envelope.is_err() && !draft.envelope.trim().is_empty() {
            issues.push(FieldIssue::new("envelope", "must be a client-sealed envelope"));
        }
        ValidationError::check(issues)?;

        Ok(envelope?)
    }

    async fn record_grants(&self, capsule: &Capsule, recipients: &[String], now: i64) -> GrantReport {
        if recipients.is_empty() {
            return GrantReport::Recorded {
                inserted: 0,
                duplicates: 0,
            };
        }

        let grants: Vec<ShareGrant> = recipients
            .iter()
            .map(|r| ShareGrant::new(capsule.id, r, now))
            .collect();

        match self.store.insert_grants(&grants).await {
            Ok(summary) => GrantReport::Recorded {
                inserted: summary.inserted,
                duplicates: summary.skipped,
            },
            Err(e) => {
                warn!(
                    capsule_id = %capsule.id,
                    requested = grants.len(),
                    error = %e,
                    "share grants not recorded"
                );
                GrantReport::Failed {
                    requested: grants.len(),
                    reason: e.to_string(),
                }
            }
        }
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Listings
    // ─────────────────────────────────────────────────────────────────────────

    /// The owner's capsules, newest first.
    pub async fn list_owned(&self, owner: &UserId) -> Result<Vec<CapsuleMetadata>> {
        let filter = CapsuleFilter::default().owned_by(owner);
        self.list(&filter, CapsuleOrder::CreatedDesc).await
    }

    /// `SHARED` capsules with a grant for the requester's e-mail, newest first.
    pub async fn list_shared_with(&self, requester: &Requester) -> Result<Vec<CapsuleMetadata>> {
        if requester.is_anonymous() {
            return Err(VaultError::Unauthenticated);
        }
        let Some(email) = requester.email() else {
            return Ok(Vec::new());
        };

        let filter = CapsuleFilter::default()
            .mode(AccessMode::Shared)
            .shared_with(email);
        self.list(&filter, CapsuleOrder::CreatedDesc).await
    }

    async fn list(&self, filter: &CapsuleFilter, order: CapsuleOrder) -> Result<Vec<CapsuleMetadata>> {
        let now = self.clock.now_millis();
        let mut capsules = self.store.find_capsules(filter, order, None).await?;
        self.store.observe_unlocks(&mut capsules, now).await?;
        Ok(capsules.iter().map(CapsuleMetadata::from).collect())
    }

    /// Unlocked `PUBLIC` capsules, latest unlock date first.
    ///
    /// Public capsules that became due since anyone last looked are unlocked
    /// before the page is computed, so they appear in this very response.
    pub async fn public_feed(&self, query: &FeedQuery) -> Result<FeedPage> {
        let now = self.clock.now_millis();

        let due = CapsuleFilter::default()
            .mode(AccessMode::Public)
            .unlocked(false)
            .due_by(now);
        let mut ready = self.store.find_capsules(&due, CapsuleOrder::UnlockDesc, None).await?;
        let flipped = self.store.observe_unlocks(&mut ready, now).await?;
        if flipped > 0 {
            debug!(count = flipped, "unlocked public capsules for feed");
        }

        let mut filter = CapsuleFilter::default().mode(AccessMode::Public).unlocked(true);
        filter.language = query
            .language
            .as_deref()
            .map(str::trim)
            .filter(|l| !l.is_empty())
            .map(String::from);

        let page_size = self.config.feed_page_size.max(1);
        let current_page = query.page.max(1);
        let total = self.store.count_capsules(&filter).await?;
        let capsules = self
            .store
            .find_capsules(
                &filter,
                CapsuleOrder::UnlockDesc,
                Some(Page::number(current_page, page_size)),
            )
            .await?;

        Ok(FeedPage {
            capsules: capsules.iter().map(CapsuleMetadata::from).collect(),
            pagination: Pagination {
                total,
                pages: total.div_ceil(page_size as u64),
                current_page,
                page_size,
            },
        })
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Single-capsule reads
    // ─────────────────────────────────────────────────────────────────────────

    /// Metadata view of one capsule.
    pub async fn capsule_detail(&self, id: &CapsuleId, requester: &Requester) -> Result<CapsuleView> {
        let now = self.clock.now_millis();
        let mut capsule = self.load(id).await?;
        let access = self.authorize(&mut capsule, requester, now).await?;

        Ok(CapsuleView {
            is_owner: requester.user_id() == Some(&capsule.owner_id),
            content_available: access.can_view_content(),
            time_until_unlock: capsule.time_until_unlock(now),
            metadata: capsule.metadata(),
        })
    }

    /// Release the client envelope to an entitled requester.
    ///
    /// Reverses only the server layer. Fails `NotFound` for missing or
    /// deleted capsules, `Forbidden` when the requester may not see content
    /// in the capsule's current state, and `ConfigurationMissing` when the
    /// server secret is absent.
    ///
    /// Only the owner of a `PRIVATE` capsule reads before the unlock date.
    /// Owners of `SHARED` and `PUBLIC` capsules wait for it like everyone
    /// else.
    pub async fn request_content(
        &self,
        id: &CapsuleId,
        requester: &Requester,
    ) -> Result<ReleasedContent> {
        let now = self.clock.now_millis();
        let mut capsule = self.load(id).await?;

        let access = self.authorize(&mut capsule, requester, now).await?;
        if !access.can_view_content() {
            debug!(capsule_id = %capsule.id, "content requested before release");
            return Err(VaultError::Forbidden(capsule.id));
        }

        let envelope = self
            .server
            .unwrap(&AtRestPayload::from_stored(capsule.payload))
            .map_err(|e| self.crypto_failure(e))?;

        debug!(capsule_id = %capsule.id, "released capsule content");
        Ok(ReleasedContent {
            capsule_id: capsule.id,
            envelope,
            note: capsule.note,
            passphrase_hint: capsule.passphrase_hint,
        })
    }

    /// Soft-delete a capsule. Owner only.
    pub async fn delete_capsule(&self, id: &CapsuleId, requester: &UserId) -> Result<()> {
        let now = self.clock.now_millis();
        let capsule = self.load(id).await?;
        if !capsule.is_owned_by(requester) {
            return Err(VaultError::Forbidden(capsule.id));
        }

        self.store
            .update_capsule(&capsule.id, &CapsulePatch::delete(now))
            .await?;
        info!(capsule_id = %capsule.id, "deleted capsule");
        Ok(())
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Internal
    // ─────────────────────────────────────────────────────────────────────────

    async fn load(&self, id: &CapsuleId) -> Result<Capsule> {
        match self.store.get_capsule(id).await? {
            Some(capsule) if !capsule.is_deleted => Ok(capsule),
            _ => Err(VaultError::NotFound(*id)),
        }
    }

    async fn role_of(&self, capsule: &Capsule, requester: &Requester) -> Result<Role> {
        let is_owner = requester.user_id() == Some(&capsule.owner_id);
        let has_grant = match requester.email() {
            Some(email) if capsule.access_mode == AccessMode::Shared && !is_owner => {
                self.store.has_grant(&capsule.id, email).await?
            }
            _ => false,
        };
        Ok(Role::resolve(
            &capsule.owner_id,
            capsule.access_mode,
            requester,
            has_grant,
        ))
    }

    /// Check metadata access, persist a due unlock, then report what the
    /// requester may see in the capsule's resulting state.
    async fn authorize(
        &self,
        capsule: &mut Capsule,
        requester: &Requester,
        now: i64,
    ) -> Result<Visibility> {
        let role = self.role_of(capsule, requester).await?;
        if !visibility(capsule.access_mode, role, capsule.lifecycle(now)).can_view_metadata() {
            debug!(capsule_id = %capsule.id, "capsule access denied");
            return Err(VaultError::Forbidden(capsule.id));
        }

        self.store
            .observe_unlocks(std::slice::from_mut(capsule), now)
            .await?;
        Ok(visibility(capsule.access_mode, role, capsule.lifecycle(now)))
    }

    fn crypto_failure(&self, err: CryptoError) -> VaultError {
        match err {
            CryptoError::ConfigurationMissing => {
                error!("server encryption secret is not configured");
            }
            CryptoError::ServerDecryptionFailed => {
                error!("stored capsule payload failed server-layer decryption");
            }
            _ => {}
        }
        VaultError::from(err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use codecapsule_core::LifecycleState;
    use codecapsule_crypto::{seal_with, KdfParams, SecretSource, AT_REST_PREFIX};
    use codecapsule_store::{GrantInsertSummary, MemoryStore};

    // 2024-03-15T13:45:00Z and the following UTC midnight.
    const NOW: i64 = 1_710_510_300_000;
    const TOMORROW: i64 = 1_710_547_200_000;
    const DAY: i64 = 86_400_000;

    struct FixedClock(i64);

    impl Clock for FixedClock {
        fn now_millis(&self) -> i64 {
            self.0
        }
    }

    fn config() -> VaultConfig {
        VaultConfig::default().with_secret(SecretSource::Static(
            codecapsule_crypto::ServerSecret::new("test server secret"),
        ))
    }

    fn vault_at<S: RecordStore>(store: S, now: i64) -> Vault<S> {
        Vault::with_clock(store, config(), Arc::new(FixedClock(now)))
    }

    fn envelope(text: &str) -> String {
        seal_with(&Payload::from(text), "passphrase", &KdfParams::fast())
            .unwrap()
            .into_string()
    }

    fn draft(mode: AccessMode) -> NewCapsule {
        NewCapsule::new("hello", envelope("fn main() {}"), TOMORROW).access_mode(mode)
    }

    fn alice() -> UserId {
        UserId::new("alice")
    }

    #[tokio::test]
    async fn test_stored_payload_is_server_wrapped() {
        let vault = vault_at(MemoryStore::new(), NOW);
        let d = draft(AccessMode::Private);
        let outcome = vault.create_capsule(&alice(), d.clone()).await.unwrap();
        assert_eq!(outcome.grants, GrantReport::NotShared);

        let stored = vault.store().get_capsule(&outcome.capsule_id).await.unwrap().unwrap();
        assert!(stored.payload.starts_with(AT_REST_PREFIX));
        assert_ne!(stored.payload, d.envelope);
        assert!(!stored.is_unlocked);
    }

    #[tokio::test]
    async fn test_create_rejects_plaintext_and_today() {
        let vault = vault_at(MemoryStore::new(), NOW);
        let mut d = NewCapsule::new("t", "print('not sealed')", TOMORROW - 1);
        d.title = String::new();

        let err = vault.create_capsule(&alice(), d).await.unwrap_err();
        let VaultError::Validation(v) = err else {
            panic!("expected validation error, got {err:?}");
        };
        assert!(v.has_field("envelope"));
        assert!(v.has_field("unlockDate"));
        assert!(v.has_field("title"));
        assert!(vault.list_owned(&alice()).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_create_without_secret_stores_nothing() {
        let config = VaultConfig::default().with_secret(SecretSource::Unset);
        let vault = Vault::with_clock(MemoryStore::new(), config, Arc::new(FixedClock(NOW)));

        let err = vault
            .create_capsule(&alice(), draft(AccessMode::Private))
            .await
            .unwrap_err();
        assert!(matches!(err, VaultError::ConfigurationMissing));
        assert!(vault.check_configured().is_err());
        assert!(vault.list_owned(&alice()).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_private_content_owner_only() {
        let store = MemoryStore::new();
        let vault = vault_at(store, NOW);
        let id = vault
            .create_capsule(&alice(), draft(AccessMode::Private))
            .await
            .unwrap()
            .capsule_id;

        let released = vault.request_content(&id, &Requester::user("alice")).await.unwrap();
        assert_eq!(released.open("passphrase").unwrap(), Payload::from("fn main() {}"));

        for other in [Requester::Anonymous, Requester::user_with_email("bob", "b@x.com")] {
            let err = vault.request_content(&id, &other).await.unwrap_err();
            assert!(matches!(err, VaultError::Forbidden(_)));
            let err = vault.capsule_detail(&id, &other).await.unwrap_err();
            assert!(err.is_denial());
        }
    }

    #[tokio::test]
    async fn test_shared_grantee_waits_for_unlock() {
        let shared = draft(AccessMode::Shared).share_with(["Bob@X.com", "bob@x.com "]);
        let creator = vault_at(MemoryStore::new(), NOW);
        let outcome = creator.create_capsule(&alice(), shared).await.unwrap();
        assert_eq!(
            outcome.grants,
            GrantReport::Recorded {
                inserted: 1,
                duplicates: 1
            }
        );

        let bob = Requester::user_with_email("bob", "bob@x.com");
        let view = creator.capsule_detail(&outcome.capsule_id, &bob).await.unwrap();
        assert!(!view.content_available);
        assert_eq!(view.time_until_unlock, TOMORROW - NOW);
        assert!(matches!(
            creator.request_content(&outcome.capsule_id, &bob).await,
            Err(VaultError::Forbidden(_))
        ));

        let later = vault_at(take_store(creator), TOMORROW + DAY);
        let view = later.capsule_detail(&outcome.capsule_id, &bob).await.unwrap();
        assert!(view.content_available);
        assert!(view.is_ready_to_unlock());
        assert!(view.metadata.is_unlocked);
        assert!(later.request_content(&outcome.capsule_id, &bob).await.is_ok());

        let carol = Requester::user_with_email("carol", "carol@x.com");
        assert!(later
            .request_content(&outcome.capsule_id, &carol)
            .await
            .unwrap_err()
            .is_denial());
    }

    #[tokio::test]
    async fn test_owner_waits_unless_private() {
        let creator = vault_at(MemoryStore::new(), NOW);
        let mut ids = Vec::new();
        for mode in [AccessMode::Private, AccessMode::Shared, AccessMode::Public] {
            let id = creator.create_capsule(&alice(), draft(mode)).await.unwrap().capsule_id;
            ids.push((mode, id));
        }

        let owner = Requester::user("alice");
        for (mode, id) in &ids {
            let early = creator.request_content(id, &owner).await;
            assert_eq!(early.is_ok(), *mode == AccessMode::Private, "{mode}");
        }

        let later = vault_at(take_store(creator), TOMORROW);
        for (mode, id) in &ids {
            assert!(later.request_content(id, &owner).await.is_ok(), "{mode}");
        }
    }

    #[tokio::test]
    async fn test_public_feed_pages() {
        let creator = vault_at(MemoryStore::new(), NOW);
        let mut ids = Vec::new();
        for i in 0..5 {
            let d = NewCapsule::new(format!("c{i}"), envelope("x"), TOMORROW + i * DAY)
                .access_mode(AccessMode::Public)
                .language(if i % 2 == 0 { "rust" } else { "go" });
            ids.push(creator.create_capsule(&alice(), d).await.unwrap().capsule_id);
        }

        let sealed_feed = creator.public_feed(&FeedQuery::default()).await.unwrap();
        assert_eq!(sealed_feed.pagination.total, 0);
        assert_eq!(sealed_feed.pagination.pages, 0);

        let config = config().with_feed_page_size(2);
        let later = Vault::with_clock(
            take_store(creator),
            config,
            Arc::new(FixedClock(TOMORROW + 10 * DAY)),
        );

        let first = later.public_feed(&FeedQuery::default()).await.unwrap();
        assert_eq!(
            first.pagination,
            Pagination {
                total: 5,
                pages: 3,
                current_page: 1,
                page_size: 2
            }
        );
        let first_ids: Vec<_> = first.capsules.iter().map(|m| m.id).collect();
        assert_eq!(first_ids, vec![ids[4], ids[3]]);

        let rust = later
            .public_feed(&FeedQuery::page(2).language("rust"))
            .await
            .unwrap();
        assert_eq!(rust.pagination.total, 3);
        assert_eq!(rust.capsules.len(), 1);
        assert_eq!(rust.capsules[0].id, ids[0]);

        for blank in ["", "  "] {
            let all = later.public_feed(&FeedQuery::default().language(blank)).await.unwrap();
            assert_eq!(all.pagination.total, 5, "{blank:?}");
        }
    }

    #[tokio::test]
    async fn test_delete_is_owner_only_and_hides() {
        let vault = vault_at(MemoryStore::new(), NOW);
        let id = vault
            .create_capsule(&alice(), draft(AccessMode::Public))
            .await
            .unwrap()
            .capsule_id;

        let err = vault.delete_capsule(&id, &UserId::new("mallory")).await.unwrap_err();
        assert!(matches!(err, VaultError::Forbidden(_)));

        vault.delete_capsule(&id, &alice()).await.unwrap();
        assert!(vault.list_owned(&alice()).await.unwrap().is_empty());
        assert!(matches!(
            vault.capsule_detail(&id, &Requester::user("alice")).await,
            Err(VaultError::NotFound(_))
        ));
        assert!(matches!(
            vault.delete_capsule(&id, &alice()).await,
            Err(VaultError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_shared_listing_requires_identity() {
        let vault = vault_at(MemoryStore::new(), NOW);
        vault
            .create_capsule(&alice(), draft(AccessMode::Shared).share_with(["b@x.com"]))
            .await
            .unwrap();

        assert!(matches!(
            vault.list_shared_with(&Requester::Anonymous).await,
            Err(VaultError::Unauthenticated)
        ));
        assert!(vault
            .list_shared_with(&Requester::user("bob"))
            .await
            .unwrap()
            .is_empty());
        let listed = vault
            .list_shared_with(&Requester::user_with_email("bob", "B@x.com"))
            .await
            .unwrap();
        assert_eq!(listed.len(), 1);
        assert!(listed[0].passphrase_hint.is_none());
    }

    /// A store whose grant inserts always fail.
    struct BrokenGrants(MemoryStore);

    #[async_trait]
    impl RecordStore for BrokenGrants {
        async fn insert_capsule(&self, c: &Capsule) -> codecapsule_store::Result<InsertResult> {
            self.0.insert_capsule(c).await
        }
        async fn get_capsule(&self, id: &CapsuleId) -> codecapsule_store::Result<Option<Capsule>> {
            self.0.get_capsule(id).await
        }
        async fn find_capsules(
            &self,
            filter: &CapsuleFilter,
            order: CapsuleOrder,
            page: Option<Page>,
        ) -> codecapsule_store::Result<Vec<Capsule>> {
            self.0.find_capsules(filter, order, page).await
        }
        async fn count_capsules(&self, filter: &CapsuleFilter) -> codecapsule_store::Result<u64> {
            self.0.count_capsules(filter).await
        }
        async fn update_capsule(
            &self,
            id: &CapsuleId,
            patch: &CapsulePatch,
        ) -> codecapsule_store::Result<bool> {
            self.0.update_capsule(id, patch).await
        }
        async fn insert_grants(
            &self,
            _grants: &[ShareGrant],
        ) -> codecapsule_store::Result<GrantInsertSummary> {
            Err(StoreError::InvalidData("grant table unavailable".into()))
        }
        async fn has_grant(&self, id: &CapsuleId, r: &str) -> codecapsule_store::Result<bool> {
            self.0.has_grant(id, r).await
        }
        async fn list_grants(&self, id: &CapsuleId) -> codecapsule_store::Result<Vec<ShareGrant>> {
            self.0.list_grants(id).await
        }
    }

    #[tokio::test]
    async fn test_grant_failure_is_degraded_success() {
        let vault = vault_at(BrokenGrants(MemoryStore::new()), NOW);
        let outcome = vault
            .create_capsule(&alice(), draft(AccessMode::Shared).share_with(["b@x.com"]))
            .await
            .unwrap();

        assert!(outcome.is_degraded());
        assert!(matches!(outcome.grants, GrantReport::Failed { requested: 1, .. }));

        let owner_view = vault
            .capsule_detail(&outcome.capsule_id, &Requester::user("alice"))
            .await
            .unwrap();
        assert_eq!(owner_view.metadata.id, outcome.capsule_id);
        assert_eq!(
            LifecycleState::observe(owner_view.metadata.unlock_date, false, NOW),
            LifecycleState::Sealed
        );
    }

    fn take_store(vault: Vault<MemoryStore>) -> MemoryStore {
        Arc::try_unwrap(vault.store).unwrap_or_else(|_| panic!("store still shared"))
    }
}
