//! Record existence, as known by the record-management collaborator.

use async_trait::async_trait;
use audit_ledger_core::RecordId;
use std::collections::HashSet;
use std::sync::RwLock;

/// Answers whether a record exists before the ledger appends to it.
///
/// The ledger never creates or deletes records; it only refuses to audit
/// records its collaborator does not know.
#[async_trait]
pub trait RecordDirectory: Send + Sync {
    async fn exists(&self, record_id: &RecordId) -> bool;
}

/// Directory that accepts every record id.
#[derive(Debug, Clone, Copy, Default)]
pub struct AcceptAll;

#[async_trait]
impl RecordDirectory for AcceptAll {
    async fn exists(&self, _record_id: &RecordId) -> bool {
        true
    }
}

/// A fixed, in-process set of known records.
#[derive(Debug, Default)]
pub struct KnownRecords {
    records: RwLock<HashSet<RecordId>>,
}

impl KnownRecords {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, record_id: RecordId) {
        self.records
            .write()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .insert(record_id);
    }

    pub fn remove(&self, record_id: &RecordId) {
        self.records
            .write()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .remove(record_id);
    }
}

impl FromIterator<RecordId> for KnownRecords {
    fn from_iter<I: IntoIterator<Item = RecordId>>(iter: I) -> Self {
        Self {
            records: RwLock::new(iter.into_iter().collect()),
        }
    }
}

#[async_trait]
impl RecordDirectory for KnownRecords {
    async fn exists(&self, record_id: &RecordId) -> bool {
        self.records
            .read()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .contains(record_id)
    }
}
