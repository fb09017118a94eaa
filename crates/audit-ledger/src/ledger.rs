//! The Ledger: append-only, per-record audit history.
//!
//! The Ledger owns the chain-construction rule: each new entry names the
//! digest of the record's current head. Appends to one record are serialized
//! twice over: an in-process lock per record, and the store's
//! compare-and-append for writers outside this process.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

use chrono::Utc;
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};
use tracing::{debug, info, warn};

use audit_ledger_core::{
    deletion_changes, Action, Actor, AuditEntry, ChainReport, ChangeSet, Digest, EntryBuilder,
    EntryId, FraudDetector, FraudVerdict, MutationContext, NoFraudDetected, PropertyListing,
    RecordId,
};
use audit_ledger_store::{AppendResult, Head, Store};

use crate::config::LedgerConfig;
use crate::directory::{AcceptAll, RecordDirectory};
use crate::error::{LedgerError, Result};
use crate::trail::AuditTrail;

/// Per-record async locks.
#[derive(Default)]
struct RecordLocks {
    locks: Mutex<HashMap<RecordId, Arc<AsyncMutex<()>>>>,
}

impl RecordLocks {
    async fn acquire(&self, record_id: &RecordId) -> OwnedMutexGuard<()> {
        let lock = {
            let mut locks = self.locks.lock().unwrap_or_else(PoisonError::into_inner);
            locks.entry(record_id.clone()).or_default().clone()
        };
        lock.lock_owned().await
    }
}

/// The main Ledger struct.
///
/// Provides:
/// - Appending entries (with retry, or as an explicit compare-and-append)
/// - Reading and verifying a record's history
/// - Fraud screening through a pluggable [`FraudDetector`]
pub struct Ledger<S: Store> {
    store: Arc<S>,
    config: LedgerConfig,
    detector: Arc<dyn FraudDetector>,
    directory: Arc<dyn RecordDirectory>,
    locks: RecordLocks,
}

impl<S: Store> Ledger<S> {
    /// Create a ledger with the default configuration.
    pub fn new(store: S) -> Self {
        Self::with_config(store, LedgerConfig::default())
    }

    /// Create a ledger with the given configuration.
    pub fn with_config(store: S, config: LedgerConfig) -> Self {
        Self {
            store: Arc::new(store),
            config,
            detector: Arc::new(NoFraudDetected),
            directory: Arc::new(AcceptAll),
            locks: RecordLocks::default(),
        }
    }

    /// Replace the fraud detector.
    pub fn with_detector(mut self, detector: impl FraudDetector + 'static) -> Self {
        self.detector = Arc::new(detector);
        self
    }

    /// Replace the record directory.
    pub fn with_directory(mut self, directory: impl RecordDirectory + 'static) -> Self {
        self.directory = Arc::new(directory);
        self
    }

    /// Get the store reference.
    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn config(&self) -> &LedgerConfig {
        &self.config
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Append
    // ─────────────────────────────────────────────────────────────────────────

    /// Append an entry for a committed mutation.
    ///
    /// Links the entry to the record's current head, retrying on a lost
    /// compare-and-append up to `max_append_retries` times. On success the
    /// ledger has grown by exactly one entry.
    pub async fn append(
        &self,
        record_id: &RecordId,
        action: Action,
        actor: Option<Actor>,
        changes: ChangeSet,
        verdict: FraudVerdict,
    ) -> Result<AuditEntry> {
        self.ensure_record(record_id).await?;
        let verdict = self.screen(record_id, &action, actor.as_ref(), &changes, verdict);
        self.commit(record_id, action, actor, changes, verdict).await
    }

    /// Link and persist an entry whose verdict is final.
    async fn commit(
        &self,
        record_id: &RecordId,
        action: Action,
        actor: Option<Actor>,
        changes: ChangeSet,
        verdict: FraudVerdict,
    ) -> Result<AuditEntry> {
        let _guard = self.locks.acquire(record_id).await;

        let attempts = self.config.max_append_retries.saturating_add(1);
        let mut expected = None;
        for attempt in 1..=attempts {
            let head = self.store.head(record_id).await?;
            expected = head.as_ref().map(|h| h.hash);

            let entry = build_entry(
                record_id,
                head.as_ref(),
                action.clone(),
                actor.clone(),
                changes.clone(),
                verdict.clone(),
            )?;

            match self.store.compare_and_append(expected.as_ref(), &entry).await? {
                AppendResult::Appended => {
                    info!(record = %record_id, seq = entry.seq, hash = %entry.hash, action = %entry.action, "appended audit entry");
                    return Ok(entry);
                }
                AppendResult::Conflict { current } => {
                    warn!(
                        record = %record_id,
                        attempt,
                        current_seq = current.as_ref().map(|h| h.seq),
                        "head moved during append, retrying"
                    );
                }
            }
        }

        Err(LedgerError::Conflict {
            record_id: record_id.clone(),
            expected,
            attempts,
        })
    }

    /// Append only if the record's head is still `expected_prev`.
    ///
    /// No retry: a moved head is reported as [`LedgerError::Conflict`].
    pub async fn try_append(
        &self,
        record_id: &RecordId,
        expected_prev: Option<&Digest>,
        action: Action,
        actor: Option<Actor>,
        changes: ChangeSet,
        verdict: FraudVerdict,
    ) -> Result<AuditEntry> {
        self.ensure_record(record_id).await?;
        let verdict = self.screen(record_id, &action, actor.as_ref(), &changes, verdict);

        let _guard = self.locks.acquire(record_id).await;

        let conflict = || LedgerError::Conflict {
            record_id: record_id.clone(),
            expected: expected_prev.copied(),
            attempts: 1,
        };

        let head = self.store.head(record_id).await?;
        if head.as_ref().map(|h| &h.hash) != expected_prev {
            debug!(record = %record_id, "explicit compare-and-append named a stale head");
            return Err(conflict());
        }

        let entry = build_entry(record_id, head.as_ref(), action, actor, changes, verdict)?;
        match self.store.compare_and_append(expected_prev, &entry).await? {
            AppendResult::Appended => {
                info!(record = %record_id, seq = entry.seq, hash = %entry.hash, "appended audit entry");
                Ok(entry)
            }
            AppendResult::Conflict { .. } => Err(conflict()),
        }
    }

    /// Assess a mutation with the fraud detector, then append it.
    pub async fn record_mutation(
        &self,
        record_id: &RecordId,
        action: Action,
        actor: Option<Actor>,
        changes: ChangeSet,
    ) -> Result<AuditEntry> {
        self.ensure_record(record_id).await?;
        let verdict = self.detector.assess(&MutationContext {
            record_id,
            action: &action,
            actor: actor.as_ref(),
            changes: &changes,
        });
        if let Some(reason) = verdict.reason() {
            warn!(record = %record_id, reason, "mutation flagged by fraud detector");
        }
        self.commit(record_id, action, actor, changes, verdict).await
    }

    /// Log a full listing snapshot, credited to its owner.
    pub async fn record_listing(
        &self,
        record_id: &RecordId,
        action: Action,
        listing: &PropertyListing,
    ) -> Result<AuditEntry> {
        let changes = listing.to_changes()?;
        self.record_mutation(record_id, action, Some(listing.owner_actor()), changes)
            .await
    }

    /// Log the deletion of a listing: empty change set, no actor.
    pub async fn record_deletion(&self, record_id: &RecordId) -> Result<AuditEntry> {
        self.record_mutation(record_id, Action::Delete, None, deletion_changes())
            .await
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Read
    // ─────────────────────────────────────────────────────────────────────────

    /// All entries of a record, oldest first. Empty for an unknown record.
    pub async fn read(&self, record_id: &RecordId) -> Result<AuditTrail> {
        let entries = self.store.entries(record_id).await?;
        debug!(record = %record_id, entries = entries.len(), "read ledger");
        let trail = AuditTrail::new(record_id.clone(), entries);

        if self.config.verify_on_read {
            let report = trail.inspect()?;
            if !report.is_intact() {
                warn!(record = %record_id, verdict = %report.verdict, "stored ledger failed verification");
                return Err(LedgerError::Corrupted {
                    record_id: record_id.clone(),
                    verdict: report.verdict,
                });
            }
        }

        Ok(trail)
    }

    /// Entries with `start <= seq <= end`.
    pub async fn read_range(
        &self,
        record_id: &RecordId,
        start: u64,
        end: u64,
    ) -> Result<Vec<AuditEntry>> {
        Ok(self.store.entries_range(record_id, start, end).await?)
    }

    /// Current head of a record's ledger.
    pub async fn head(&self, record_id: &RecordId) -> Result<Option<Head>> {
        Ok(self.store.head(record_id).await?)
    }

    /// Look up an entry by id.
    pub async fn entry(&self, id: &EntryId) -> Result<Option<AuditEntry>> {
        Ok(self.store.get_entry(id).await?)
    }

    /// Records with at least one entry.
    pub async fn records(&self) -> Result<Vec<RecordId>> {
        Ok(self.store.list_records().await?)
    }

    /// Number of entries in a record's ledger.
    pub async fn len(&self, record_id: &RecordId) -> Result<u64> {
        Ok(self.store.entry_count(record_id).await?)
    }

    /// Re-verify a stored ledger from genesis.
    pub async fn verify(&self, record_id: &RecordId) -> Result<ChainReport> {
        let entries = self.store.entries(record_id).await?;
        Ok(audit_ledger_core::inspect_from_genesis(&entries)?)
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Internal
    // ─────────────────────────────────────────────────────────────────────────

    async fn ensure_record(&self, record_id: &RecordId) -> Result<()> {
        if self.directory.exists(record_id).await {
            Ok(())
        } else {
            Err(LedgerError::RecordNotFound(record_id.clone()))
        }
    }

    fn screen(
        &self,
        record_id: &RecordId,
        action: &Action,
        actor: Option<&Actor>,
        changes: &ChangeSet,
        verdict: FraudVerdict,
    ) -> FraudVerdict {
        if !self.config.screen_appends || verdict.is_flagged() {
            return verdict;
        }
        self.detector.assess(&MutationContext {
            record_id,
            action,
            actor,
            changes,
        })
    }
}

/// Build the entry that extends `head`.
///
/// The timestamp never goes backwards within a ledger, even if the wall clock does.
fn build_entry(
    record_id: &RecordId,
    head: Option<&Head>,
    action: Action,
    actor: Option<Actor>,
    changes: ChangeSet,
    verdict: FraudVerdict,
) -> Result<AuditEntry> {
    let now = Utc::now();
    let (seq, prev, timestamp) = match head {
        Some(h) => (h.seq + 1, Some(h.hash), now.max(h.timestamp)),
        None => (1, None, now),
    };

    Ok(EntryBuilder::new(record_id.clone(), seq)
        .timestamp(timestamp)
        .action(action)
        .actor(actor)
        .changes(changes)
        .prev_opt(prev)
        .verdict(verdict)
        .build()?)
}
