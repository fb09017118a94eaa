//! SQLite implementation of the Store trait.
//!
//! This is the primary storage backend for the audit ledger. It uses
//! rusqlite with bundled SQLite, wrapped in async via tokio::spawn_blocking.

use std::path::Path;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::{params, Connection, ErrorCode, OptionalExtension, TransactionBehavior};
use tracing::{debug, warn};

use audit_ledger_core::{Action, Actor, AuditEntry, ChangeSet, Digest, EntryId, RecordId};

use crate::error::{Result, StoreError};
use crate::migration;
use crate::traits::{check_append, AppendResult, Head, Store};

const ENTRY_COLUMNS: &str = "entry_id, record_id, seq, timestamp, action, actor, changes, \
                             prev_hash, hash, fraud_detected, fraud_reason";

/// SQLite-based store implementation.
///
/// Thread-safe via internal Mutex. All operations use spawn_blocking
/// to avoid blocking the async runtime.
pub struct SqliteStore {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteStore {
    /// Open a SQLite database at the given path.
    ///
    /// Creates the file and runs migrations if it doesn't exist.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let mut conn = Connection::open(path.as_ref())?;
        migration::migrate(&mut conn)?;
        debug!(path = %path.as_ref().display(), "opened sqlite store");
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Open an in-memory SQLite database.
    ///
    /// Useful for testing.
    pub fn open_memory() -> Result<Self> {
        let mut conn = Connection::open_in_memory()?;
        migration::migrate(&mut conn)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Run `f` against the connection on the blocking pool.
    async fn blocking<F, T>(&self, f: F) -> Result<T>
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

/// Column values of one `audit_entries` row before decoding.
struct RawEntry {
    entry_id: String,
    record_id: String,
    seq: i64,
    timestamp: String,
    action: String,
    actor: Option<String>,
    changes: String,
    prev_hash: Option<Vec<u8>>,
    hash: Vec<u8>,
    fraud_detected: bool,
    fraud_reason: Option<String>,
}

impl RawEntry {
    fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            entry_id: row.get("entry_id")?,
            record_id: row.get("record_id")?,
            seq: row.get("seq")?,
            timestamp: row.get("timestamp")?,
            action: row.get("action")?,
            actor: row.get("actor")?,
            changes: row.get("changes")?,
            prev_hash: row.get("prev_hash")?,
            hash: row.get("hash")?,
            fraud_detected: row.get("fraud_detected")?,
            fraud_reason: row.get("fraud_reason")?,
        })
    }

    fn decode(self) -> Result<AuditEntry> {
        let timestamp = DateTime::parse_from_rfc3339(&self.timestamp)
            .map_err(|e| StoreError::InvalidData(format!("timestamp: {e}")))?
            .with_timezone(&Utc);
        let actor: Option<Actor> = self.actor.as_deref().map(serde_json::from_str).transpose()?;
        let changes: ChangeSet = serde_json::from_str(&self.changes)?;
        let prev_hash = self.prev_hash.as_deref().map(decode_digest).transpose()?;

        Ok(AuditEntry {
            id: EntryId::new(self.entry_id),
            record_id: RecordId::new(self.record_id),
            seq: u64::try_from(self.seq)
                .map_err(|_| StoreError::InvalidData(format!("negative seq {}", self.seq)))?,
            timestamp,
            action: Action::from(self.action.as_str()),
            actor,
            changes,
            prev_hash,
            hash: decode_digest(&self.hash)?,
            fraud_detected: self.fraud_detected,
            fraud_reason: self.fraud_reason,
        })
    }
}

fn decode_digest(bytes: &[u8]) -> Result<Digest> {
    Digest::try_from(bytes).map_err(|_| StoreError::InvalidData("digest is not 32 bytes".into()))
}

fn query_head(conn: &Connection, record_id: &str) -> Result<Option<Head>> {
    let row: Option<(i64, Vec<u8>, String)> = conn
        .query_row(
            "SELECT seq, hash, timestamp FROM audit_entries
             WHERE record_id = ?1 ORDER BY seq DESC LIMIT 1",
            params![record_id],
            |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)),
        )
        .optional()?;

    row.map(|(seq, hash, timestamp)| {
        Ok(Head {
            seq: seq as u64,
            hash: decode_digest(&hash)?,
            timestamp: DateTime::parse_from_rfc3339(&timestamp)
                .map_err(|e| StoreError::InvalidData(format!("timestamp: {e}")))?
                .with_timezone(&Utc),
        })
    })
    .transpose()
}

fn query_entries(
    conn: &Connection,
    sql: &str,
    params: impl rusqlite::Params,
) -> Result<Vec<AuditEntry>> {
    let mut stmt = conn.prepare(sql)?;
    let raw = stmt
        .query_map(params, RawEntry::from_row)?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    raw.into_iter().map(RawEntry::decode).collect()
}

fn insert_entry(conn: &Connection, entry: &AuditEntry) -> rusqlite::Result<usize> {
    let actor = entry
        .actor
        .as_ref()
        .map(serde_json::to_string)
        .transpose()
        .map_err(|e| rusqlite::Error::ToSqlConversionFailure(Box::new(e)))?;
    let changes = serde_json::to_string(&entry.changes)
        .map_err(|e| rusqlite::Error::ToSqlConversionFailure(Box::new(e)))?;

    conn.execute(
        "INSERT INTO audit_entries (
            entry_id, record_id, seq, timestamp, action, actor, changes,
            prev_hash, hash, fraud_detected, fraud_reason, appended_at
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)",
        params![
            entry.id.as_str(),
            entry.record_id.as_str(),
            entry.seq as i64,
            entry.timestamp.to_rfc3339_opts(SecondsFormat::AutoSi, true),
            entry.action.as_str(),
            actor,
            changes,
            entry.prev_hash.as_ref().map(|d| d.as_bytes().as_slice()),
            entry.hash.as_bytes().as_slice(),
            entry.fraud_detected,
            entry.fraud_reason.as_deref(),
            Utc::now().timestamp_millis(),
        ],
    )
}

#[async_trait]
impl Store for SqliteStore {
    async fn compare_and_append(
        &self,
        expected_prev: Option<&Digest>,
        entry: &AuditEntry,
    ) -> Result<AppendResult> {
        let expected_prev = expected_prev.copied();
        let entry = entry.clone();

        self.blocking(move |conn| {
            let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

            let current = query_head(&tx, entry.record_id.as_str())?;
            if let Some(conflict) = check_append(expected_prev.as_ref(), current, &entry)? {
                debug!(record = %entry.record_id, seq = entry.seq, "append lost race");
                return Ok(conflict);
            }

            let inserted = insert_entry(&tx, &entry);
            match inserted {
                Ok(_) => {}
                // Another connection to the same file won the position.
                Err(rusqlite::Error::SqliteFailure(e, _))
                    if e.code == ErrorCode::ConstraintViolation =>
                {
                    warn!(record = %entry.record_id, seq = entry.seq, "position taken by another writer");
                    drop(tx);
                    let current = query_head(conn, entry.record_id.as_str())?;
                    return Ok(AppendResult::Conflict { current });
                }
                Err(e) => return Err(e.into()),
            }

            tx.commit()?;
            Ok(AppendResult::Appended)
        })
        .await
    }

    async fn head(&self, record_id: &RecordId) -> Result<Option<Head>> {
        let record_id = record_id.clone();
        self.blocking(move |conn| query_head(conn, record_id.as_str()))
            .await
    }

    async fn entries(&self, record_id: &RecordId) -> Result<Vec<AuditEntry>> {
        let record_id = record_id.clone();
        self.blocking(move |conn| {
            query_entries(
                conn,
                &format!(
                    "SELECT {ENTRY_COLUMNS} FROM audit_entries WHERE record_id = ?1 ORDER BY seq"
                ),
                params![record_id.as_str()],
            )
        })
        .await
    }

    async fn entries_range(
        &self,
        record_id: &RecordId,
        start: u64,
        end: u64,
    ) -> Result<Vec<AuditEntry>> {
        let record_id = record_id.clone();
        // Clamp to i64 so an open-ended `u64::MAX` bound stays positive in SQLite.
        let start = start.min(i64::MAX as u64) as i64;
        let end = end.min(i64::MAX as u64) as i64;

        self.blocking(move |conn| {
            query_entries(
                conn,
                &format!(
                    "SELECT {ENTRY_COLUMNS} FROM audit_entries
                     WHERE record_id = ?1 AND seq >= ?2 AND seq <= ?3
                     ORDER BY seq"
                ),
                params![record_id.as_str(), start, end],
            )
        })
        .await
    }

    async fn get_entry(&self, id: &EntryId) -> Result<Option<AuditEntry>> {
        let id = id.clone();
        self.blocking(move |conn| {
            let raw = conn
                .query_row(
                    &format!("SELECT {ENTRY_COLUMNS} FROM audit_entries WHERE entry_id = ?1"),
                    params![id.as_str()],
                    RawEntry::from_row,
                )
                .optional()?;
            raw.map(RawEntry::decode).transpose()
        })
        .await
    }

    async fn entry_count(&self, record_id: &RecordId) -> Result<u64> {
        let record_id = record_id.clone();
        self.blocking(move |conn| {
            let count: i64 = conn.query_row(
                "SELECT COUNT(*) FROM audit_entries WHERE record_id = ?1",
                params![record_id.as_str()],
                |row| row.get(0),
            )?;
            Ok(count as u64)
        })
        .await
    }

    async fn list_records(&self) -> Result<Vec<RecordId>> {
        self.blocking(|conn| {
            let mut stmt =
                conn.prepare("SELECT DISTINCT record_id FROM audit_entries ORDER BY record_id")?;
            let records = stmt
                .query_map([], |row| row.get::<_, String>(0))?
                .map(|r| r.map(RecordId::new))
                .collect::<rusqlite::Result<Vec<_>>>()?;
            Ok(records)
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use audit_ledger_core::{verify_full, EntryBuilder, FraudVerdict};
    use chrono::TimeZone;

    fn entry(seq: u64, prev: Option<Digest>, location: &str) -> AuditEntry {
        EntryBuilder::new(RecordId::new("prop-1"), seq)
            .timestamp(Utc.timestamp_opt(1_736_870_400 + seq as i64, 123_000_000).unwrap())
            .action(if seq == 1 { Action::Create } else { Action::Update })
            .actor(Some(Actor::person("Bob Johnson", "bob@example.com")))
            .changes(
                ChangeSet::new()
                    .with("location", location)
                    .with("price", 2500)
                    .with("ratio", 0.25),
            )
            .prev_opt(prev)
            .build()
            .unwrap()
    }

    #[tokio::test]
    async fn test_entry_survives_storage() {
        let store = SqliteStore::open_memory().unwrap();
        let first = entry(1, None, "San Francisco, CA");
        assert_eq!(
            store.compare_and_append(None, &first).await.unwrap(),
            AppendResult::Appended
        );

        let loaded = store.get_entry(&first.id).await.unwrap().unwrap();
        assert_eq!(loaded, first);
        assert!(loaded.verify_hash().unwrap());
    }

    #[tokio::test]
    async fn test_chain_persists_and_verifies() {
        let store = SqliteStore::open_memory().unwrap();
        let mut prev = None;
        for seq in 1..=4 {
            let e = entry(seq, prev, &format!("unit {seq}"));
            store.compare_and_append(prev.as_ref(), &e).await.unwrap();
            prev = Some(e.hash);
        }

        let entries = store.entries(&RecordId::new("prop-1")).await.unwrap();
        assert_eq!(entries.len(), 4);
        assert!(verify_full(&entries).unwrap());

        let head = store.head(&RecordId::new("prop-1")).await.unwrap().unwrap();
        assert_eq!(head.seq, 4);
        assert_eq!(Some(head.hash), prev);

        let tail = store
            .entries_range(&RecordId::new("prop-1"), 3, u64::MAX)
            .await
            .unwrap();
        assert_eq!(tail.len(), 2);
    }

    #[tokio::test]
    async fn test_conflict_detection() {
        let store = SqliteStore::open_memory().unwrap();
        let first = entry(1, None, "San Francisco, CA");
        store.compare_and_append(None, &first).await.unwrap();

        let rival = entry(1, None, "Oakland, CA");
        let result = store.compare_and_append(None, &rival).await.unwrap();
        assert!(matches!(
            result,
            AppendResult::Conflict { current: Some(ref head) } if head.hash == first.hash
        ));
        assert_eq!(store.entry_count(&RecordId::new("prop-1")).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_fraud_fields_roundtrip() {
        let store = SqliteStore::open_memory().unwrap();
        let flagged = EntryBuilder::new(RecordId::new("prop-7"), 1)
            .verdict(FraudVerdict::flagged("price far below market"))
            .build()
            .unwrap();
        store.compare_and_append(None, &flagged).await.unwrap();

        let loaded = store.entries(&RecordId::new("prop-7")).await.unwrap();
        assert!(loaded[0].fraud_detected);
        assert_eq!(loaded[0].fraud_reason.as_deref(), Some("price far below market"));
        assert!(loaded[0].actor.is_none());
    }

    #[tokio::test]
    async fn test_reopen_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("audit.db");
        let first = entry(1, None, "Austin, TX");

        {
            let store = SqliteStore::open(&path).unwrap();
            store.compare_and_append(None, &first).await.unwrap();
        }

        let store = SqliteStore::open(&path).unwrap();
        assert_eq!(store.list_records().await.unwrap(), vec![RecordId::new("prop-1")]);
        assert_eq!(store.entries(&RecordId::new("prop-1")).await.unwrap(), vec![first]);
    }
}
