//! RecordStore trait: the abstract interface for capsule persistence.
//!
//! The vault is storage-agnostic. Implementations include SQLite (primary)
//! and in-memory (for tests); both must agree on filtering, ordering, and
//! paging so that tests against one hold for the other.

use std::cmp::Ordering;

use async_trait::async_trait;
use codecapsule_core::{normalize_recipient, AccessMode, Capsule, CapsuleId, ShareGrant, UserId};
use tracing::debug;

use crate::error::Result;

/// Result of inserting a capsule.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InsertResult {
    /// Capsule was inserted.
    Inserted,
    /// A capsule with the same id already exists. Nothing was written.
    AlreadyExists,
}

/// Outcome of a duplicate-tolerant grant batch.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct GrantInsertSummary {
    pub inserted: usize,
    /// Grants whose (capsule, recipient) key already existed.
    pub skipped: usize,
}

/// Selection criteria for [`RecordStore::find_capsules`].
///
/// Every `None` field matches anything. Soft-deleted capsules are excluded
/// unless `include_deleted` is set.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CapsuleFilter {
    pub owner_id: Option<UserId>,
    pub access_mode: Option<AccessMode>,
    /// Only capsules with a grant for this (normalized) recipient.
    pub shared_with: Option<String>,
    pub language: Option<String>,
    pub is_unlocked: Option<bool>,
    /// Only capsules whose unlock date is at or before this instant.
    pub unlock_due_by: Option<i64>,
    pub include_deleted: bool,
}

impl CapsuleFilter {
    pub fn owned_by(mut self, owner: &UserId) -> Self {
        self.owner_id = Some(owner.clone());
        self
    }

    pub fn mode(mut self, mode: AccessMode) -> Self {
        self.access_mode = Some(mode);
        self
    }

    pub fn shared_with(mut self, recipient: &str) -> Self {
        self.shared_with = Some(normalize_recipient(recipient));
        self
    }

    pub fn language(mut self, language: impl Into<String>) -> Self {
        self.language = Some(language.into());
        self
    }

    pub fn unlocked(mut self, unlocked: bool) -> Self {
        self.is_unlocked = Some(unlocked);
        self
    }

    pub fn due_by(mut self, at: i64) -> Self {
        self.unlock_due_by = Some(at);
        self
    }

    pub fn with_deleted(mut self) -> Self {
        self.include_deleted = true;
        self
    }

    /// Evaluate everything except `shared_with`, which needs grant data.
    pub fn matches_record(&self, capsule: &Capsule) -> bool {
        (self.include_deleted || !capsule.is_deleted)
            && self.owner_id.as_ref().map_or(true, |o| &capsule.owner_id == o)
            && self.access_mode.map_or(true, |m| capsule.access_mode == m)
            && self
                .language
                .as_ref()
                .map_or(true, |l| capsule.language.as_deref() == Some(l.as_str()))
            && self.is_unlocked.map_or(true, |u| capsule.is_unlocked == u)
            && self.unlock_due_by.map_or(true, |at| capsule.unlock_date <= at)
    }
}

/// Sort order for listings. Ties are broken by id so pages are stable.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum CapsuleOrder {
    /// Newest first.
    #[default]
    CreatedDesc,
    /// Latest unlock date first, then newest first.
    UnlockDesc,
}

impl CapsuleOrder {
    pub fn compare(&self, a: &Capsule, b: &Capsule) -> Ordering {
        let primary = match self {
            CapsuleOrder::CreatedDesc => b.created_at.cmp(&a.created_at),
            CapsuleOrder::UnlockDesc => b
                .unlock_date
                .cmp(&a.unlock_date)
                .then_with(|| b.created_at.cmp(&a.created_at)),
        };
        primary.then_with(|| a.id.cmp(&b.id))
    }
}

/// Offset pagination.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Page {
    pub offset: usize,
    pub limit: usize,
}

impl Page {
    /// 1-based page number of the given size. Page 0 is treated as page 1.
    pub fn number(page: usize, size: usize) -> Self {
        Self {
            offset: page.saturating_sub(1).saturating_mul(size),
            limit: size,
        }
    }
}

/// The only mutations a stored capsule accepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CapsulePatch {
    pub mark_unlocked: bool,
    pub mark_deleted: bool,
    /// Becomes `updated_at` if anything changes.
    pub at: i64,
}

impl CapsulePatch {
    pub fn unlock(at: i64) -> Self {
        Self {
            mark_unlocked: true,
            mark_deleted: false,
            at,
        }
    }

    pub fn delete(at: i64) -> Self {
        Self {
            mark_unlocked: false,
            mark_deleted: true,
            at,
        }
    }

    /// Apply to an in-memory record. Returns whether anything changed.
    ///
    /// Both flags only ever move from false to true.
    pub fn apply(&self, capsule: &mut Capsule) -> bool {
        let mut changed = false;
        if self.mark_unlocked && !capsule.is_unlocked {
            capsule.mark_unlocked(self.at);
            changed = true;
        }
        if self.mark_deleted && !capsule.is_deleted {
            capsule.is_deleted = true;
            capsule.updated_at = self.at;
            changed = true;
        }
        changed
    }
}

/// The RecordStore trait: async interface for capsule persistence.
///
/// All methods are async to support both sync (SQLite) and async backends.
/// For SQLite, `spawn_blocking` is used internally to avoid blocking the runtime.
///
/// # Design Notes
///
/// - **Idempotent inserts**: inserting a capsule id twice returns `AlreadyExists`.
/// - **Duplicate-tolerant grants**: grants are keyed by (capsule, recipient);
///   repeats are skipped, never an error.
/// - **Monotonic patches**: updates can only set flags, never clear them, so
///   concurrent writers converge.
#[async_trait]
pub trait RecordStore: Send + Sync {
    // ─────────────────────────────────────────────────────────────────────────
    // Capsule Operations
    // ─────────────────────────────────────────────────────────────────────────

    /// Insert a new capsule record.
    async fn insert_capsule(&self, capsule: &Capsule) -> Result<InsertResult>;

    /// Get a capsule by id, including soft-deleted ones.
    async fn get_capsule(&self, id: &CapsuleId) -> Result<Option<Capsule>>;

    /// Find capsules matching `filter`, sorted by `order`, optionally paged.
    async fn find_capsules(
        &self,
        filter: &CapsuleFilter,
        order: CapsuleOrder,
        page: Option<Page>,
    ) -> Result<Vec<Capsule>>;

    /// Count capsules matching `filter`.
    async fn count_capsules(&self, filter: &CapsuleFilter) -> Result<u64>;

    /// Apply a patch to one capsule. Returns whether the record changed.
    ///
    /// A patch that would not change anything (already unlocked, already
    /// deleted, or no such id) returns `false` and is not an error.
    async fn update_capsule(&self, id: &CapsuleId, patch: &CapsulePatch) -> Result<bool>;

    /// Apply the same patch to many capsules. Returns how many changed.
    async fn update_capsules(&self, ids: &[CapsuleId], patch: &CapsulePatch) -> Result<usize> {
        let mut changed = 0;
        for id in ids {
            if self.update_capsule(id, patch).await? {
                changed += 1;
            }
        }
        Ok(changed)
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Grant Operations
    // ─────────────────────────────────────────────────────────────────────────

    /// Insert share grants, skipping any (capsule, recipient) key that
    /// already exists, including repeats within the batch.
    async fn insert_grants(&self, grants: &[ShareGrant]) -> Result<GrantInsertSummary>;

    /// Check whether `recipient` holds a grant on a capsule.
    async fn has_grant(&self, capsule_id: &CapsuleId, recipient: &str) -> Result<bool>;

    /// All grants on a capsule, ordered by recipient.
    async fn list_grants(&self, capsule_id: &CapsuleId) -> Result<Vec<ShareGrant>>;
}

/// Extension trait for common store patterns.
pub trait StoreExt: RecordStore {
    /// Persist the unlock flag for every READY capsule in `capsules`, in one
    /// batch, and update the slice to match.
    ///
    /// Returns the number of capsules observed as READY.
    fn observe_unlocks(
        &self,
        capsules: &mut [Capsule],
        now: i64,
    ) -> impl std::future::Future<Output = Result<usize>> + Send;
}

impl<S: RecordStore + ?Sized> StoreExt for S {
    async fn observe_unlocks(&self, capsules: &mut [Capsule], now: i64) -> Result<usize> {
        let due: Vec<CapsuleId> = capsules
            .iter()
            .filter(|c| c.needs_unlock(now))
            .map(|c| c.id)
            .collect();
        if due.is_empty() {
            return Ok(0);
        }

        // Another request may have flipped some of these already; the
        // write is idempotent, so the changed count can be lower.
        let changed = self.update_capsules(&due, &CapsulePatch::unlock(now)).await?;
        debug!(observed = due.len(), changed, "persisted lazy unlocks");

        for capsule in capsules.iter_mut().filter(|c| c.needs_unlock(now)) {
            capsule.mark_unlocked(now);
        }
        Ok(due.len())
    }
}
