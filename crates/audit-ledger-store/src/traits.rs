//! Store trait: the abstract interface for audit entry persistence.
//!
//! This trait allows the ledger to be storage-agnostic. Implementations
//! include SQLite (primary) and in-memory (for tests).

use async_trait::async_trait;
use audit_ledger_core::{AuditEntry, Digest, EntryId, RecordId};
use chrono::{DateTime, Utc};
use std::sync::Arc;

use crate::error::{Result, StoreError};

/// The last entry of a record's ledger.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Head {
    pub seq: u64,
    pub hash: Digest,
    pub timestamp: DateTime<Utc>,
}

impl Head {
    pub fn of(entry: &AuditEntry) -> Self {
        Self {
            seq: entry.seq,
            hash: entry.hash,
            timestamp: entry.timestamp,
        }
    }
}

/// Result of a compare-and-append.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AppendResult {
    /// Entry was appended.
    Appended,
    /// The ledger head moved since the caller read it. Nothing was written.
    Conflict {
        /// The head the store holds now.
        current: Option<Head>,
    },
}

/// The Store trait: async interface for audit entry persistence.
///
/// All methods are async to support both sync (SQLite) and async backends.
/// For SQLite, we use `spawn_blocking` internally to avoid blocking the runtime.
///
/// # Design Notes
///
/// - **Append-only**: there is no update or delete.
/// - **Compare-and-append**: an append names the head it expects; if another
///   writer got there first the store reports `Conflict` and writes nothing.
/// - **Positions**: `(record_id, seq)` is unique and `seq` starts at 1.
#[async_trait]
pub trait Store: Send + Sync {
    // ─────────────────────────────────────────────────────────────────────────
    // Write
    // ─────────────────────────────────────────────────────────────────────────

    /// Append `entry` if the record's current head digest is `expected_prev`.
    ///
    /// `expected_prev` is `None` for a record with no entries yet. The entry
    /// must carry `prev_hash == expected_prev` and the next sequence number,
    /// otherwise the call fails with [`StoreError::InvalidEntry`].
    async fn compare_and_append(
        &self,
        expected_prev: Option<&Digest>,
        entry: &AuditEntry,
    ) -> Result<AppendResult>;

    // ─────────────────────────────────────────────────────────────────────────
    // Read
    // ─────────────────────────────────────────────────────────────────────────

    /// Current head of a record's ledger, `None` if it has no entries.
    async fn head(&self, record_id: &RecordId) -> Result<Option<Head>>;

    /// All entries of a record in append order.
    async fn entries(&self, record_id: &RecordId) -> Result<Vec<AuditEntry>>;

    /// Entries with `start <= seq <= end`, ordered by seq.
    async fn entries_range(
        &self,
        record_id: &RecordId,
        start: u64,
        end: u64,
    ) -> Result<Vec<AuditEntry>>;

    /// Look up an entry by id.
    async fn get_entry(&self, id: &EntryId) -> Result<Option<AuditEntry>>;

    /// Number of entries in a record's ledger.
    async fn entry_count(&self, record_id: &RecordId) -> Result<u64>;

    /// All records with at least one entry, sorted.
    async fn list_records(&self) -> Result<Vec<RecordId>>;
}

#[async_trait]
impl<S: Store + ?Sized> Store for Arc<S> {
    async fn compare_and_append(
        &self,
        expected_prev: Option<&Digest>,
        entry: &AuditEntry,
    ) -> Result<AppendResult> {
        (**self).compare_and_append(expected_prev, entry).await
    }

    async fn head(&self, record_id: &RecordId) -> Result<Option<Head>> {
        (**self).head(record_id).await
    }

    async fn entries(&self, record_id: &RecordId) -> Result<Vec<AuditEntry>> {
        (**self).entries(record_id).await
    }

    async fn entries_range(
        &self,
        record_id: &RecordId,
        start: u64,
        end: u64,
    ) -> Result<Vec<AuditEntry>> {
        (**self).entries_range(record_id, start, end).await
    }

    async fn get_entry(&self, id: &EntryId) -> Result<Option<AuditEntry>> {
        (**self).get_entry(id).await
    }

    async fn entry_count(&self, record_id: &RecordId) -> Result<u64> {
        (**self).entry_count(record_id).await
    }

    async fn list_records(&self) -> Result<Vec<RecordId>> {
        (**self).list_records().await
    }
}

/// Shared compare step of compare-and-append.
///
/// Returns `Some(Conflict)` when the head moved, `None` when the entry may be
/// written, and an error when the entry itself is inconsistent.
pub(crate) fn check_append(
    expected_prev: Option<&Digest>,
    current: Option<Head>,
    entry: &AuditEntry,
) -> Result<Option<AppendResult>> {
    if entry.prev_hash.as_ref() != expected_prev {
        return Err(invalid(entry, "prev_hash differs from the expected head"));
    }

    if current.as_ref().map(|h| &h.hash) != expected_prev {
        return Ok(Some(AppendResult::Conflict { current }));
    }

    let next_seq = current.as_ref().map_or(1, |h| h.seq + 1);
    if entry.seq != next_seq {
        return Err(invalid(
            entry,
            &format!("seq {} but next position is {}", entry.seq, next_seq),
        ));
    }

    Ok(None)
}

fn invalid(entry: &AuditEntry, reason: &str) -> StoreError {
    StoreError::InvalidEntry {
        record_id: entry.record_id.to_string(),
        reason: reason.to_string(),
    }
}
