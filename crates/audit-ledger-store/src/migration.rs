//! Versioned schema for the SQLite audit store.
//!
//! `schema_migrations` records every applied version. Opening a database
//! applies the missing steps in one transaction and refuses a database
//! written by a newer build.

use rusqlite::Connection;
use tracing::info;

use crate::error::{Result, StoreError};

/// Schema version this build writes.
pub const CURRENT_VERSION: u32 = 1;

/// Bring the schema up to [`CURRENT_VERSION`]. Safe to call on every open.
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
            "database schema v{current} is newer than supported v{CURRENT_VERSION}"
        )));
    }

    if current < CURRENT_VERSION {
        let tx = conn.transaction()?;

        for version in (current + 1)..=CURRENT_VERSION {
            apply_migration(&tx, version)?;

            tx.execute(
                "INSERT INTO schema_migrations (version, applied_at) VALUES (?1, ?2)",
                rusqlite::params![version, chrono::Utc::now().timestamp_millis()],
            )?;
            info!(version, "applied schema migration");
        }

        tx.commit()?;
    }

    Ok(())
}

fn apply_migration(conn: &Connection, version: u32) -> Result<()> {
    match version {
        1 => apply_v1(conn),
        _ => Err(StoreError::Migration(format!(
            "unknown migration version: {version}"
        ))),
    }
}

/// v1: one row per audit entry, unique per (record, seq).
fn apply_v1(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        r#"
        -- Audit entries: one row per entry, never updated or deleted
        CREATE TABLE audit_entries (
            entry_id TEXT PRIMARY KEY,        -- hex Blake3 of position + hash
            record_id TEXT NOT NULL,
            seq INTEGER NOT NULL,             -- 1-based position within the record's ledger
            timestamp TEXT NOT NULL,          -- RFC 3339, UTC
            action TEXT NOT NULL,
            actor TEXT,                       -- JSON object, nullable
            changes TEXT NOT NULL,            -- JSON object as submitted
            prev_hash BLOB,                   -- 32 bytes, NULL for genesis
            hash BLOB NOT NULL,               -- 32 bytes, SHA-256
            fraud_detected INTEGER NOT NULL DEFAULT 0,
            fraud_reason TEXT,
            appended_at INTEGER NOT NULL,     -- local wall clock (Unix ms)

            UNIQUE(record_id, seq)
        );

        CREATE INDEX idx_entries_record_seq ON audit_entries(record_id, seq);
        CREATE INDEX idx_entries_hash ON audit_entries(hash);
        CREATE INDEX idx_entries_flagged ON audit_entries(fraud_detected) WHERE fraud_detected = 1;
        "#,
    )?;

    Ok(())
}
