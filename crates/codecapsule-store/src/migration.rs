//! Database schema migrations for SQLite.
//!
//! A simple versioned migration system. Each migration is a SQL batch that
//! transforms the schema from version N to N+1.

use codecapsule_core::now_millis;
use rusqlite::Connection;
use tracing::info;

use crate::error::{Result, StoreError};

/// Current schema version.
pub const CURRENT_VERSION: u32 = 1;

/// Initialize or migrate the database schema.
///
/// Idempotent: safe to call on every open.
pub fn migrate(conn: &mut Connection) -> Result<()> {
    conn.execute(
        "CREATE TABLE IF NOT EXISTS schema_migrations (
            version INTEGER PRIMARY KEY,
            applied_at INTEGER NOT NULL
        )",
        [],
    )?;

    let current: u32 = conn.query_row(
        "SELECT COALESCE(MAX(version), 0) FROM schema_migrations",
        [],
        |row| row.get(0),
    )?;

    if current > CURRENT_VERSION {
        return Err(StoreError::Migration(format!(
            "database schema version {current} is newer than supported version {CURRENT_VERSION}"
        )));
    }

    if current < CURRENT_VERSION {
        let tx = conn.transaction()?;

        for version in (current + 1)..=CURRENT_VERSION {
            apply_migration(&tx, version)?;

            tx.execute(
                "INSERT INTO schema_migrations (version, applied_at) VALUES (?1, ?2)",
                rusqlite::params![version, now_millis()],
            )?;
        }

        tx.commit()?;
        info!(from = current, to = CURRENT_VERSION, "migrated capsule store schema");
    }

    Ok(())
}

fn apply_migration(conn: &Connection, version: u32) -> Result<()> {
    match version {
        1 => apply_v1(conn),
        _ => Err(StoreError::Migration(format!(
            "unknown migration version: {}",
            version
        ))),
    }
}

/// Migration v1: capsules and share grants.
fn apply_v1(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        r#"
        CREATE TABLE capsules (
            id BLOB PRIMARY KEY,              -- 16 random bytes
            owner_id TEXT NOT NULL,
            title TEXT NOT NULL,
            description TEXT,
            language TEXT,
            note TEXT,
            payload TEXT NOT NULL,            -- server-wrapped client envelope
            access_mode TEXT NOT NULL CHECK (access_mode IN ('PRIVATE', 'SHARED', 'PUBLIC')),
            unlock_date INTEGER NOT NULL,     -- Unix ms, write-once
            is_unlocked INTEGER NOT NULL DEFAULT 0,
            passphrase_hint TEXT,
            is_deleted INTEGER NOT NULL DEFAULT 0,
            created_at INTEGER NOT NULL,
            updated_at INTEGER NOT NULL
        );

        CREATE TABLE capsule_shares (
            capsule_id BLOB NOT NULL REFERENCES capsules(id),
            recipient TEXT NOT NULL,          -- normalized identifier
            created_at INTEGER NOT NULL,
            PRIMARY KEY (capsule_id, recipient)
        );

        CREATE INDEX idx_capsules_owner ON capsules(owner_id, created_at);
        CREATE INDEX idx_capsules_feed ON capsules(access_mode, is_unlocked, unlock_date);
        CREATE INDEX idx_capsule_shares_recipient ON capsule_shares(recipient);
        "#,
    )?;

    Ok(())
}
