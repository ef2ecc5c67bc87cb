//! In-memory implementation of the RecordStore trait.
//!
//! Primarily for testing. Same semantics as SQLite, no persistence.

use std::collections::{BTreeMap, HashMap};
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use async_trait::async_trait;
use codecapsule_core::{normalize_recipient, Capsule, CapsuleId, ShareGrant};

use crate::error::{Result, StoreError};
use crate::traits::{
    CapsuleFilter, CapsuleOrder, CapsulePatch, GrantInsertSummary, InsertResult, Page, RecordStore,
};

/// In-memory store implementation.
///
/// All data is lost when the store is dropped. Thread-safe via RwLock.
pub struct MemoryStore {
    inner: RwLock<MemoryStoreInner>,
}

#[derive(Default)]
struct MemoryStoreInner {
    capsules: HashMap<CapsuleId, Capsule>,

    /// Grants keyed by (capsule, normalized recipient).
    grants: BTreeMap<(CapsuleId, String), ShareGrant>,
}

impl MemoryStoreInner {
    fn matches(&self, filter: &CapsuleFilter, capsule: &Capsule) -> bool {
        filter.matches_record(capsule)
            && filter.shared_with.as_ref().map_or(true, |recipient| {
                self.grants.contains_key(&(capsule.id, recipient.clone()))
            })
    }

    fn select(&self, filter: &CapsuleFilter) -> Vec<&Capsule> {
        self.capsules
            .values()
            .filter(|c| self.matches(filter, c))
            .collect()
    }
}

impl MemoryStore {
    /// Create a new empty in-memory store.
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(MemoryStoreInner::default()),
        }
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, MemoryStoreInner>> {
        self.inner
            .read()
            .map_err(|e| StoreError::Poisoned(e.to_string()))
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, MemoryStoreInner>> {
        self.inner
            .write()
            .map_err(|e| StoreError::Poisoned(e.to_string()))
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl RecordStore for MemoryStore {
    async fn insert_capsule(&self, capsule: &Capsule) -> Result<InsertResult> {
        let mut inner = self.write()?;
        if inner.capsules.contains_key(&capsule.id) {
            return Ok(InsertResult::AlreadyExists);
        }
        inner.capsules.insert(capsule.id, capsule.clone());
        Ok(InsertResult::Inserted)
    }

    async fn get_capsule(&self, id: &CapsuleId) -> Result<Option<Capsule>> {
        let inner = self.read()?;
        Ok(inner.capsules.get(id).cloned())
    }

    async fn find_capsules(
        &self,
        filter: &CapsuleFilter,
        order: CapsuleOrder,
        page: Option<Page>,
    ) -> Result<Vec<Capsule>> {
        let inner = self.read()?;
        let mut found = inner.select(filter);
        found.sort_by(|a, b| order.compare(a, b));

        let (offset, limit) = page.map_or((0, usize::MAX), |p| (p.offset, p.limit));
        Ok(found
            .into_iter()
            .skip(offset)
            .take(limit)
            .cloned()
            .collect())
    }

    async fn count_capsules(&self, filter: &CapsuleFilter) -> Result<u64> {
        let inner = self.read()?;
        Ok(inner.select(filter).len() as u64)
    }

    async fn update_capsule(&self, id: &CapsuleId, patch: &CapsulePatch) -> Result<bool> {
        let mut inner = self.write()?;
        Ok(inner
            .capsules
            .get_mut(id)
            .map_or(false, |capsule| patch.apply(capsule)))
    }

    async fn insert_grants(&self, grants: &[ShareGrant]) -> Result<GrantInsertSummary> {
        let mut inner = self.write()?;
        let mut summary = GrantInsertSummary::default();

        for grant in grants {
            let recipient = normalize_recipient(&grant.recipient);
            let key = (grant.capsule_id, recipient.clone());
            if inner.grants.contains_key(&key) {
                summary.skipped += 1;
                continue;
            }
            inner.grants.insert(
                key,
                ShareGrant {
                    recipient,
                    ..grant.clone()
                },
            );
            summary.inserted += 1;
        }

        Ok(summary)
    }

    async fn has_grant(&self, capsule_id: &CapsuleId, recipient: &str) -> Result<bool> {
        let inner = self.read()?;
        Ok(inner
            .grants
            .contains_key(&(*capsule_id, normalize_recipient(recipient))))
    }

    async fn list_grants(&self, capsule_id: &CapsuleId) -> Result<Vec<ShareGrant>> {
        let inner = self.read()?;
        Ok(inner
            .grants
            .range((*capsule_id, String::new())..)
            .take_while(|((id, _), _)| id == capsule_id)
            .map(|(_, grant)| grant.clone())
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::capsule;
    use crate::traits::StoreExt;
    use codecapsule_core::{AccessMode, UserId};

    #[tokio::test]
    async fn test_insert_and_get() {
        let store = MemoryStore::new();
        let c = capsule("alice", AccessMode::Private, 5_000, 1_000);

        assert_eq!(store.insert_capsule(&c).await.unwrap(), InsertResult::Inserted);
        assert_eq!(store.get_capsule(&c.id).await.unwrap(), Some(c.clone()));
        assert_eq!(
            store.insert_capsule(&c).await.unwrap(),
            InsertResult::AlreadyExists
        );
        assert!(store
            .get_capsule(&CapsuleId::generate())
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn test_find_filters_and_orders() {
        let store = MemoryStore::new();
        let a = capsule("alice", AccessMode::Public, 3_000, 100);
        let b = capsule("alice", AccessMode::Private, 9_000, 200);
        let c = capsule("bob", AccessMode::Public, 3_000, 300);
        for x in [&a, &b, &c] {
            store.insert_capsule(x).await.unwrap();
        }

        let alice = CapsuleFilter::default().owned_by(&UserId::new("alice"));
        let found = store
            .find_capsules(&alice, CapsuleOrder::CreatedDesc, None)
            .await
            .unwrap();
        assert_eq!(found, vec![b.clone(), a.clone()]);

        let public = CapsuleFilter::default().mode(AccessMode::Public);
        let found = store
            .find_capsules(&public, CapsuleOrder::UnlockDesc, None)
            .await
            .unwrap();
        assert_eq!(found, vec![c.clone(), a.clone()]);
        assert_eq!(store.count_capsules(&public).await.unwrap(), 2);

        let page = store
            .find_capsules(&public, CapsuleOrder::UnlockDesc, Some(Page::number(2, 1)))
            .await
            .unwrap();
        assert_eq!(page, vec![a]);
    }

    #[tokio::test]
    async fn test_deleted_hidden_unless_requested() {
        let store = MemoryStore::new();
        let c = capsule("alice", AccessMode::Private, 5_000, 1_000);
        store.insert_capsule(&c).await.unwrap();

        assert!(store
            .update_capsule(&c.id, &CapsulePatch::delete(2_000))
            .await
            .unwrap());
        assert!(!store
            .update_capsule(&c.id, &CapsulePatch::delete(3_000))
            .await
            .unwrap());

        let all = CapsuleFilter::default();
        assert_eq!(store.count_capsules(&all).await.unwrap(), 0);
        assert_eq!(store.count_capsules(&all.with_deleted()).await.unwrap(), 1);

        let stored = store.get_capsule(&c.id).await.unwrap().unwrap();
        assert!(stored.is_deleted);
        assert_eq!(stored.updated_at, 2_000);
    }

    #[tokio::test]
    async fn test_duplicate_grants_collapse() {
        let store = MemoryStore::new();
        let c = capsule("alice", AccessMode::Shared, 5_000, 1_000);
        store.insert_capsule(&c).await.unwrap();

        let grants = [
            ShareGrant::new(c.id, "a@x.com", 1_000),
            ShareGrant::new(c.id, "A@X.com ", 1_000),
            ShareGrant::new(c.id, "b@x.com", 1_000),
        ];
        let summary = store.insert_grants(&grants).await.unwrap();
        assert_eq!(summary, GrantInsertSummary { inserted: 2, skipped: 1 });

        let again = store.insert_grants(&grants[..1]).await.unwrap();
        assert_eq!(again, GrantInsertSummary { inserted: 0, skipped: 1 });

        let listed = store.list_grants(&c.id).await.unwrap();
        let recipients: Vec<_> = listed.iter().map(|g| g.recipient.as_str()).collect();
        assert_eq!(recipients, vec!["a@x.com", "b@x.com"]);

        assert!(store.has_grant(&c.id, "a@X.com").await.unwrap());
        assert!(!store.has_grant(&c.id, "c@x.com").await.unwrap());

        let shared = CapsuleFilter::default().shared_with("B@x.com");
        assert_eq!(store.count_capsules(&shared).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_observe_unlocks_batches_ready_only() {
        let store = MemoryStore::new();
        let due = capsule("alice", AccessMode::Public, 1_000, 10);
        let sealed = capsule("alice", AccessMode::Public, 9_000, 20);
        store.insert_capsule(&due).await.unwrap();
        store.insert_capsule(&sealed).await.unwrap();

        let mut listed = store
            .find_capsules(&CapsuleFilter::default(), CapsuleOrder::CreatedDesc, None)
            .await
            .unwrap();
        assert_eq!(store.observe_unlocks(&mut listed, 5_000).await.unwrap(), 1);
        assert!(listed.iter().find(|c| c.id == due.id).unwrap().is_unlocked);
        assert!(!listed.iter().find(|c| c.id == sealed.id).unwrap().is_unlocked);

        let stored = store.get_capsule(&due.id).await.unwrap().unwrap();
        assert!(stored.is_unlocked);
        assert_eq!(stored.updated_at, 5_000);

        // Second observation finds nothing left to do.
        assert_eq!(store.observe_unlocks(&mut listed, 6_000).await.unwrap(), 0);
    }
}
