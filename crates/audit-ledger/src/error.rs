//! Error types for the ledger.

use audit_ledger_core::{ChainVerdict, CoreError, Digest, RecordId, VerifyError};
use audit_ledger_store::StoreError;
use thiserror::Error;

/// Errors that can occur during ledger operations.
#[derive(Debug, Error)]
pub enum LedgerError {
    /// The change set could not be canonically encoded.
    #[error("encoding error: {0}")]
    Core(#[from] CoreError),

    /// Storage error.
    #[error("storage error: {0}")]
    Store(#[from] StoreError),

    /// Verification could not run.
    #[error("verification error: {0}")]
    Verify(#[from] VerifyError),

    /// A competing append moved the head and retries were exhausted,
    /// or an explicit compare-and-append named a stale head.
    #[error("append conflict on {record_id}: expected head {expected:?} after {attempts} attempt(s)")]
    Conflict {
        record_id: RecordId,
        expected: Option<Digest>,
        attempts: u32,
    },

    /// The record directory does not know this record.
    #[error("record not found: {0}")]
    RecordNotFound(RecordId),

    /// A stored ledger failed verification on read.
    #[error("ledger for {record_id} failed verification: {verdict}")]
    Corrupted {
        record_id: RecordId,
        verdict: ChainVerdict,
    },

    /// Configuration could not be loaded.
    #[error("invalid configuration: {0}")]
    Config(String),
}

/// Result type for ledger operations.
pub type Result<T> = std::result::Result<T, LedgerError>;
