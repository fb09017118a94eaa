//! Read-side snapshot of one record's ledger.

use std::sync::Arc;

use audit_ledger_core::{
    inspect_from_genesis, verify_full, verify_linkage, AuditEntry, ChainReport, RecordId,
    VerifyError,
};

/// The entries of one record's ledger, oldest first, as of the moment of the read.
///
/// Cheap to clone. Iteration can be restarted any number of times and always
/// yields the same finite sequence; later appends are not reflected.
#[derive(Debug, Clone)]
pub struct AuditTrail {
    record_id: RecordId,
    entries: Arc<[AuditEntry]>,
}

impl AuditTrail {
    pub fn new(record_id: RecordId, entries: Vec<AuditEntry>) -> Self {
        Self {
            record_id,
            entries: entries.into(),
        }
    }

    pub fn record_id(&self) -> &RecordId {
        &self.record_id
    }

    pub fn iter(&self) -> std::slice::Iter<'_, AuditEntry> {
        self.entries.iter()
    }

    pub fn as_slice(&self) -> &[AuditEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn first(&self) -> Option<&AuditEntry> {
        self.entries.first()
    }

    pub fn last(&self) -> Option<&AuditEntry> {
        self.entries.last()
    }

    pub fn to_vec(&self) -> Vec<AuditEntry> {
        self.entries.to_vec()
    }

    pub fn verify_linkage(&self) -> bool {
        verify_linkage(&self.entries)
    }

    pub fn verify_full(&self) -> Result<bool, VerifyError> {
        verify_full(&self.entries)
    }

    /// Full verification anchored at genesis, with the first failing index.
    pub fn inspect(&self) -> Result<ChainReport, VerifyError> {
        inspect_from_genesis(&self.entries)
    }
}

impl<'a> IntoIterator for &'a AuditTrail {
    type Item = &'a AuditEntry;
    type IntoIter = std::slice::Iter<'a, AuditEntry>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.iter()
    }
}

impl AsRef<[AuditEntry]> for AuditTrail {
    fn as_ref(&self) -> &[AuditEntry] {
        &self.entries
    }
}
