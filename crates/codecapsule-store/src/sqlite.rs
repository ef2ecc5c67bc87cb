//! SQLite implementation of the RecordStore trait.
//!
//! The primary storage backend. Uses rusqlite with bundled SQLite, wrapped in
//! async via `tokio::task::spawn_blocking`.

use std::path::Path;
use std::str::FromStr;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use codecapsule_core::{normalize_recipient, AccessMode, Capsule, CapsuleId, ShareGrant, UserId};
use rusqlite::types::{Type, Value};
use rusqlite::{params, params_from_iter, Connection, OptionalExtension};
use tracing::debug;

use crate::error::{Result, StoreError};
use crate::migration;
use crate::traits::{
    CapsuleFilter, CapsuleOrder, CapsulePatch, GrantInsertSummary, InsertResult, Page, RecordStore,
};

const CAPSULE_COLUMNS: &str = "c.id, c.owner_id, c.title, c.description, c.language, c.note, \
     c.payload, c.access_mode, c.unlock_date, c.is_unlocked, c.passphrase_hint, c.is_deleted, \
     c.created_at, c.updated_at";

/// SQLite-based store implementation.
///
/// Thread-safe via internal Mutex. All operations use spawn_blocking
/// to avoid blocking the async runtime.
#[derive(Clone)]
pub struct SqliteStore {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteStore {
    /// Open a SQLite database at the given path.
    ///
    /// Creates the file and runs migrations if needed.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let mut conn = Connection::open(path)?;
        migration::migrate(&mut conn)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Open an in-memory SQLite database.
    pub fn open_memory() -> Result<Self> {
        let mut conn = Connection::open_in_memory()?;
        migration::migrate(&mut conn)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Run a blocking operation on the connection off the async runtime.
    async fn run<F, T>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&mut Connection) -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let conn = self.conn.clone();
        tokio::task::spawn_blocking(move || {
            let mut conn = conn
                .lock()
                .map_err(|e| StoreError::Poisoned(e.to_string()))?;
            f(&mut conn)
        })
        .await
        .map_err(|e| StoreError::Task(e.to_string()))?
    }
}

fn row_to_capsule(row: &rusqlite::Row<'_>) -> rusqlite::Result<Capsule> {
    let id_bytes: Vec<u8> = row.get("id")?;
    let id: [u8; 16] = id_bytes
        .try_into()
        .map_err(|_| rusqlite::Error::InvalidColumnType(0, "id".into(), Type::Blob))?;

    let mode: String = row.get("access_mode")?;
    let access_mode = AccessMode::from_str(&mode)
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(7, Type::Text, Box::new(e)))?;

    Ok(Capsule {
        id: CapsuleId::from_bytes(id),
        owner_id: UserId::new(row.get::<_, String>("owner_id")?),
        title: row.get("title")?,
        description: row.get("description")?,
        language: row.get("language")?,
        note: row.get("note")?,
        payload: row.get("payload")?,
        access_mode,
        unlock_date: row.get("unlock_date")?,
        is_unlocked: row.get("is_unlocked")?,
        passphrase_hint: row.get("passphrase_hint")?,
        is_deleted: row.get("is_deleted")?,
        created_at: row.get("created_at")?,
        updated_at: row.get("updated_at")?,
    })
}

fn row_to_grant(row: &rusqlite::Row<'_>) -> rusqlite::Result<ShareGrant> {
    let id_bytes: Vec<u8> = row.get("capsule_id")?;
    let id: [u8; 16] = id_bytes
        .try_into()
        .map_err(|_| rusqlite::Error::InvalidColumnType(0, "capsule_id".into(), Type::Blob))?;
    Ok(ShareGrant {
        capsule_id: CapsuleId::from_bytes(id),
        recipient: row.get("recipient")?,
        created_at: row.get("created_at")?,
    })
}

/// Translate a filter into a WHERE clause and its positional values.
fn where_clause(filter: &CapsuleFilter) -> (String, Vec<Value>) {
    let mut clauses: Vec<&str> = Vec::new();
    let mut values: Vec<Value> = Vec::new();

    if !filter.include_deleted {
        clauses.push("c.is_deleted = 0");
    }
    if let Some(owner) = &filter.owner_id {
        clauses.push("c.owner_id = ?");
        values.push(Value::Text(owner.as_str().to_string()));
    }
    if let Some(mode) = filter.access_mode {
        clauses.push("c.access_mode = ?");
        values.push(Value::Text(mode.as_str().to_string()));
    }
    if let Some(recipient) = &filter.shared_with {
        clauses.push(
            "EXISTS (SELECT 1 FROM capsule_shares s WHERE s.capsule_id = c.id AND s.recipient = ?)",
        );
        values.push(Value::Text(recipient.clone()));
    }
    if let Some(language) = &filter.language {
        clauses.push("c.language = ?");
        values.push(Value::Text(language.clone()));
    }
    if let Some(unlocked) = filter.is_unlocked {
        clauses.push("c.is_unlocked = ?");
        values.push(Value::Integer(i64::from(unlocked)));
    }
    if let Some(at) = filter.unlock_due_by {
        clauses.push("c.unlock_date <= ?");
        values.push(Value::Integer(at));
    }

    if clauses.is_empty() {
        (String::new(), values)
    } else {
        (format!(" WHERE {}", clauses.join(" AND ")), values)
    }
}

fn order_clause(order: CapsuleOrder) -> &'static str {
    match order {
        CapsuleOrder::CreatedDesc => " ORDER BY c.created_at DESC, c.id ASC",
        CapsuleOrder::UnlockDesc => " ORDER BY c.unlock_date DESC, c.created_at DESC, c.id ASC",
    }
}

fn to_sql_int(n: usize) -> i64 {
    i64::try_from(n).unwrap_or(i64::MAX)
}

fn patch_capsule(conn: &Connection, id: &CapsuleId, patch: &CapsulePatch) -> Result<bool> {
    let changed = conn.execute(
        "UPDATE capsules SET
            is_unlocked = CASE WHEN ?2 THEN 1 ELSE is_unlocked END,
            is_deleted = CASE WHEN ?3 THEN 1 ELSE is_deleted END,
            updated_at = ?4
         WHERE id = ?1
           AND ((?2 AND is_unlocked = 0) OR (?3 AND is_deleted = 0))",
        params![
            id.as_bytes().as_slice(),
            patch.mark_unlocked,
            patch.mark_deleted,
            patch.at
        ],
    )?;
    Ok(changed > 0)
}

#[async_trait]
impl RecordStore for SqliteStore {
    async fn insert_capsule(&self, capsule: &Capsule) -> Result<InsertResult> {
        let capsule = capsule.clone();

        self.run(move |conn| {
            let inserted = conn.execute(
                "INSERT OR IGNORE INTO capsules (
                    id, owner_id, title, description, language, note, payload, access_mode,
                    unlock_date, is_unlocked, passphrase_hint, is_deleted, created_at, updated_at
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14)",
                params![
                    capsule.id.as_bytes().as_slice(),
                    capsule.owner_id.as_str(),
                    capsule.title,
                    capsule.description,
                    capsule.language,
                    capsule.note,
                    capsule.payload,
                    capsule.access_mode.as_str(),
                    capsule.unlock_date,
                    capsule.is_unlocked,
                    capsule.passphrase_hint,
                    capsule.is_deleted,
                    capsule.created_at,
                    capsule.updated_at,
                ],
            )?;

            Ok(if inserted == 0 {
                InsertResult::AlreadyExists
            } else {
                InsertResult::Inserted
            })
        })
        .await
    }

    async fn get_capsule(&self, id: &CapsuleId) -> Result<Option<Capsule>> {
        let id = *id;

        self.run(move |conn| {
            conn.query_row(
                &format!("SELECT {CAPSULE_COLUMNS} FROM capsules c WHERE c.id = ?1"),
                params![id.as_bytes().as_slice()],
                row_to_capsule,
            )
            .optional()
            .map_err(StoreError::from)
        })
        .await
    }

    async fn find_capsules(
        &self,
        filter: &CapsuleFilter,
        order: CapsuleOrder,
        page: Option<Page>,
    ) -> Result<Vec<Capsule>> {
        let (where_sql, mut values) = where_clause(filter);
        let mut sql = format!(
            "SELECT {CAPSULE_COLUMNS} FROM capsules c{where_sql}{}",
            order_clause(order)
        );
        if let Some(page) = page {
            sql.push_str(" LIMIT ? OFFSET ?");
            values.push(Value::Integer(to_sql_int(page.limit)));
            values.push(Value::Integer(to_sql_int(page.offset)));
        }

        self.run(move |conn| {
            let mut stmt = conn.prepare(&sql)?;
            let capsules = stmt
                .query_map(params_from_iter(values), row_to_capsule)?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            Ok(capsules)
        })
        .await
    }

    async fn count_capsules(&self, filter: &CapsuleFilter) -> Result<u64> {
        let (where_sql, values) = where_clause(filter);
        let sql = format!("SELECT COUNT(*) FROM capsules c{where_sql}");

        self.run(move |conn| {
            let count: i64 = conn.query_row(&sql, params_from_iter(values), |row| row.get(0))?;
            u64::try_from(count).map_err(|_| StoreError::InvalidData(format!("count {count}")))
        })
        .await
    }

    async fn update_capsule(&self, id: &CapsuleId, patch: &CapsulePatch) -> Result<bool> {
        let id = *id;
        let patch = *patch;

        self.run(move |conn| patch_capsule(conn, &id, &patch)).await
    }

    async fn update_capsules(&self, ids: &[CapsuleId], patch: &CapsulePatch) -> Result<usize> {
        let ids = ids.to_vec();
        let patch = *patch;

        self.run(move |conn| {
            let tx = conn.transaction()?;
            let mut changed = 0;
            for id in &ids {
                if patch_capsule(&tx, id, &patch)? {
                    changed += 1;
                }
            }
            tx.commit()?;
            Ok(changed)
        })
        .await
    }

    async fn insert_grants(&self, grants: &[ShareGrant]) -> Result<GrantInsertSummary> {
        let grants = grants.to_vec();

        let summary = self
            .run(move |conn| {
                let tx = conn.transaction()?;
                let mut summary = GrantInsertSummary::default();
                {
                    let mut stmt = tx.prepare(
                        "INSERT OR IGNORE INTO capsule_shares (capsule_id, recipient, created_at)
                         VALUES (?1, ?2, ?3)",
                    )?;
                    for grant in &grants {
                        let inserted = stmt.execute(params![
                            grant.capsule_id.as_bytes().as_slice(),
                            normalize_recipient(&grant.recipient),
                            grant.created_at,
                        ])?;
                        if inserted == 0 {
                            summary.skipped += 1;
                        } else {
                            summary.inserted += 1;
                        }
                    }
                }
                tx.commit()?;
                Ok(summary)
            })
            .await?;

        debug!(
            inserted = summary.inserted,
            skipped = summary.skipped,
            "inserted share grants"
        );
        Ok(summary)
    }

    async fn has_grant(&self, capsule_id: &CapsuleId, recipient: &str) -> Result<bool> {
        let id = *capsule_id;
        let recipient = normalize_recipient(recipient);

        self.run(move |conn| {
            let exists: bool = conn.query_row(
                "SELECT EXISTS(SELECT 1 FROM capsule_shares WHERE capsule_id = ?1 AND recipient = ?2)",
                params![id.as_bytes().as_slice(), recipient],
                |row| row.get(0),
            )?;
            Ok(exists)
        })
        .await
    }

    async fn list_grants(&self, capsule_id: &CapsuleId) -> Result<Vec<ShareGrant>> {
        let id = *capsule_id;

        self.run(move |conn| {
            let mut stmt = conn.prepare(
                "SELECT capsule_id, recipient, created_at FROM capsule_shares
                 WHERE capsule_id = ?1 ORDER BY recipient",
            )?;
            let grants = stmt
                .query_map(params![id.as_bytes().as_slice()], row_to_grant)?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            Ok(grants)
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::capsule;
    use crate::traits::StoreExt;

    async fn create_test_store() -> SqliteStore {
        SqliteStore::open_memory().unwrap()
    }

    #[tokio::test]
    async fn test_insert_and_get_capsule() {
        let store = create_test_store().await;
        let mut c = capsule("alice", AccessMode::Shared, 5_000, 1_000);
        c.description = Some("desc".into());
        c.language = Some("rust".into());
        c.note = Some("note".into());
        c.passphrase_hint = Some("the usual".into());

        assert_eq!(store.insert_capsule(&c).await.unwrap(), InsertResult::Inserted);
        assert_eq!(store.get_capsule(&c.id).await.unwrap(), Some(c.clone()));
    }

    #[tokio::test]
    async fn test_idempotent_insert() {
        let store = create_test_store().await;
        let c = capsule("alice", AccessMode::Private, 5_000, 1_000);

        store.insert_capsule(&c).await.unwrap();
        let mut changed = c.clone();
        changed.title = "other".into();
        assert_eq!(
            store.insert_capsule(&changed).await.unwrap(),
            InsertResult::AlreadyExists
        );
        assert_eq!(store.get_capsule(&c.id).await.unwrap().unwrap().title, c.title);
    }

    #[tokio::test]
    async fn test_feed_query() {
        let store = create_test_store().await;
        let mut rust_old = capsule("a", AccessMode::Public, 1_000, 10);
        rust_old.language = Some("rust".into());
        rust_old.is_unlocked = true;
        let mut rust_new = capsule("b", AccessMode::Public, 2_000, 20);
        rust_new.language = Some("rust".into());
        rust_new.is_unlocked = true;
        let mut go = capsule("c", AccessMode::Public, 3_000, 30);
        go.language = Some("go".into());
        go.is_unlocked = true;
        let locked = capsule("d", AccessMode::Public, 9_000, 40);
        let private = capsule("e", AccessMode::Private, 1_000, 50);
        for c in [&rust_old, &rust_new, &go, &locked, &private] {
            store.insert_capsule(c).await.unwrap();
        }

        let feed = CapsuleFilter::default()
            .mode(AccessMode::Public)
            .unlocked(true);
        let all = store
            .find_capsules(&feed, CapsuleOrder::UnlockDesc, None)
            .await
            .unwrap();
        let ids: Vec<_> = all.iter().map(|c| c.id).collect();
        assert_eq!(ids, vec![go.id, rust_new.id, rust_old.id]);

        let rust = feed.clone().language("rust");
        assert_eq!(store.count_capsules(&rust).await.unwrap(), 2);
        let second = store
            .find_capsules(&rust, CapsuleOrder::UnlockDesc, Some(Page::number(2, 1)))
            .await
            .unwrap();
        assert_eq!(second, vec![rust_old]);

        let past_end = store
            .find_capsules(&rust, CapsuleOrder::UnlockDesc, Some(Page::number(3, 1)))
            .await
            .unwrap();
        assert!(past_end.is_empty());
    }

    #[tokio::test]
    async fn test_unlock_patch_is_monotonic() {
        let store = create_test_store().await;
        let c = capsule("alice", AccessMode::Public, 1_000, 10);
        store.insert_capsule(&c).await.unwrap();

        assert!(store
            .update_capsule(&c.id, &CapsulePatch::unlock(2_000))
            .await
            .unwrap());
        // A second writer observing the same READY state changes nothing.
        assert!(!store
            .update_capsule(&c.id, &CapsulePatch::unlock(3_000))
            .await
            .unwrap());

        let stored = store.get_capsule(&c.id).await.unwrap().unwrap();
        assert!(stored.is_unlocked);
        assert_eq!(stored.updated_at, 2_000);

        assert!(!store
            .update_capsule(&CapsuleId::generate(), &CapsulePatch::unlock(2_000))
            .await
            .unwrap());
    }

    #[tokio::test]
    async fn test_batched_unlocks() {
        let store = create_test_store().await;
        let a = capsule("alice", AccessMode::Public, 1_000, 10);
        let b = capsule("alice", AccessMode::Shared, 1_500, 20);
        let c = capsule("alice", AccessMode::Private, 9_000, 30);
        for x in [&a, &b, &c] {
            store.insert_capsule(x).await.unwrap();
        }

        let mut listed = store
            .find_capsules(
                &CapsuleFilter::default().owned_by(&UserId::new("alice")),
                CapsuleOrder::CreatedDesc,
                None,
            )
            .await
            .unwrap();
        assert_eq!(store.observe_unlocks(&mut listed, 2_000).await.unwrap(), 2);

        let due = CapsuleFilter::default().unlocked(true);
        assert_eq!(store.count_capsules(&due).await.unwrap(), 2);
        let sealed = CapsuleFilter::default().unlocked(false).due_by(2_000);
        assert_eq!(store.count_capsules(&sealed).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_grants_and_shared_with() {
        let store = create_test_store().await;
        let shared = capsule("alice", AccessMode::Shared, 5_000, 10);
        let other = capsule("alice", AccessMode::Shared, 5_000, 20);
        store.insert_capsule(&shared).await.unwrap();
        store.insert_capsule(&other).await.unwrap();

        let summary = store
            .insert_grants(&[
                ShareGrant::new(shared.id, "a@x.com", 10),
                ShareGrant::new(shared.id, "a@x.com", 10),
            ])
            .await
            .unwrap();
        assert_eq!(summary, GrantInsertSummary { inserted: 1, skipped: 1 });
        assert_eq!(store.list_grants(&shared.id).await.unwrap().len(), 1);
        assert!(store.list_grants(&other.id).await.unwrap().is_empty());

        let mine = store
            .find_capsules(
                &CapsuleFilter::default().shared_with("A@x.com"),
                CapsuleOrder::CreatedDesc,
                None,
            )
            .await
            .unwrap();
        assert_eq!(mine, vec![shared.clone()]);
        assert!(store.has_grant(&shared.id, " a@x.com").await.unwrap());
        assert!(!store.has_grant(&other.id, "a@x.com").await.unwrap());
    }

    #[tokio::test]
    async fn test_reopen_persists() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("capsules.db");
        let c = capsule("alice", AccessMode::Private, 5_000, 1_000);

        {
            let store = SqliteStore::open(&path).unwrap();
            store.insert_capsule(&c).await.unwrap();
            store
                .update_capsule(&c.id, &CapsulePatch::delete(2_000))
                .await
                .unwrap();
        }

        let store = SqliteStore::open(&path).unwrap();
        let stored = store.get_capsule(&c.id).await.unwrap().unwrap();
        assert!(stored.is_deleted);
        assert_eq!(
            store
                .count_capsules(&CapsuleFilter::default())
                .await
                .unwrap(),
            0
        );
    }
}
