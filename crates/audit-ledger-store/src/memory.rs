//! In-memory implementation of the Store trait.
//!
//! Same semantics as SQLite with no persistence. Entries live in a single
//! arena; per-record ledgers are index lists into it.

use std::collections::HashMap;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use async_trait::async_trait;
use tracing::debug;

use audit_ledger_core::{AuditEntry, Digest, EntryId, RecordId};

use crate::error::{Result, StoreError};
use crate::traits::{check_append, AppendResult, Head, Store};

/// In-memory store implementation.
///
/// All data is lost when the store is dropped. Thread-safe via RwLock.
pub struct MemoryStore {
    inner: RwLock<MemoryStoreInner>,
}

#[derive(Default)]
struct MemoryStoreInner {
    /// Every entry, in global append order.
    arena: Vec<AuditEntry>,

    /// Record -> arena positions of its entries, oldest first.
    ledgers: HashMap<RecordId, Vec<usize>>,

    /// Entry id -> arena position.
    by_id: HashMap<EntryId, usize>,
}

impl MemoryStoreInner {
    fn ledger(&self, record_id: &RecordId) -> impl Iterator<Item = &AuditEntry> {
        self.ledgers
            .get(record_id)
            .into_iter()
            .flatten()
            .map(|&pos| &self.arena[pos])
    }

    fn head(&self, record_id: &RecordId) -> Option<Head> {
        self.ledgers
            .get(record_id)
            .and_then(|positions| positions.last())
            .map(|&pos| Head::of(&self.arena[pos]))
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
impl Store for MemoryStore {
    async fn compare_and_append(
        &self,
        expected_prev: Option<&Digest>,
        entry: &AuditEntry,
    ) -> Result<AppendResult> {
        let mut inner = self.write()?;

        let current = inner.head(&entry.record_id);
        if let Some(conflict) = check_append(expected_prev, current, entry)? {
            debug!(record = %entry.record_id, seq = entry.seq, "append lost race");
            return Ok(conflict);
        }

        let pos = inner.arena.len();
        inner.arena.push(entry.clone());
        inner
            .ledgers
            .entry(entry.record_id.clone())
            .or_default()
            .push(pos);
        inner.by_id.insert(entry.id.clone(), pos);

        Ok(AppendResult::Appended)
    }

    async fn head(&self, record_id: &RecordId) -> Result<Option<Head>> {
        Ok(self.read()?.head(record_id))
    }

    async fn entries(&self, record_id: &RecordId) -> Result<Vec<AuditEntry>> {
        Ok(self.read()?.ledger(record_id).cloned().collect())
    }

    async fn entries_range(
        &self,
        record_id: &RecordId,
        start: u64,
        end: u64,
    ) -> Result<Vec<AuditEntry>> {
        Ok(self
            .read()?
            .ledger(record_id)
            .filter(|e| e.seq >= start && e.seq <= end)
            .cloned()
            .collect())
    }

    async fn get_entry(&self, id: &EntryId) -> Result<Option<AuditEntry>> {
        let inner = self.read()?;
        Ok(inner.by_id.get(id).map(|&pos| inner.arena[pos].clone()))
    }

    async fn entry_count(&self, record_id: &RecordId) -> Result<u64> {
        Ok(self
            .read()?
            .ledgers
            .get(record_id)
            .map_or(0, |positions| positions.len() as u64))
    }

    async fn list_records(&self) -> Result<Vec<RecordId>> {
        let mut records: Vec<RecordId> = self.read()?.ledgers.keys().cloned().collect();
        records.sort();
        Ok(records)
    }
}
