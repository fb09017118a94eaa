//! # Audit Ledger
//!
//! Tamper-evident audit history for managed records. Every mutation to a
//! record is appended as an entry whose digest covers its changes and the
//! digest of the entry before it, so rewriting or removing history is
//! detectable by anyone who re-runs the verifier.
//!
//! ## Key Concepts
//!
//! - **Entry**: Immutable. Never edited. Corrections are new entries.
//! - **Ledger**: One per record. Grows by append only, oldest first.
//! - **Genesis**: The first entry of a ledger has no predecessor digest.
//! - **Verification**: Linkage-only or full replay, over any contiguous slice.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use audit_ledger::{Ledger, LedgerConfig};
//! use audit_ledger::core::{Action, Actor, ChangeSet, FraudVerdict, RecordId};
//! use audit_ledger::store::SqliteStore;
//!
//! async fn example() {
//!     let store = SqliteStore::open("audit.db").unwrap();
//!     let ledger = Ledger::with_config(store, LedgerConfig::default());
//!
//!     let record = RecordId::new("prop-1");
//!     ledger
//!         .append(
//!             &record,
//!             Action::Create,
//!             Some(Actor::person("Charlie Lee", "charlie@example.com")),
//!             ChangeSet::new().with("location", "Austin"),
//!             FraudVerdict::Clean,
//!         )
//!         .await
//!         .unwrap();
//!
//!     let trail = ledger.read(&record).await.unwrap();
//!     assert!(trail.verify_full().unwrap());
//! }
//! ```
//!
//! ## Re-exports
//!
//! - `audit_ledger::core` - Entries, hashing, verification
//! - `audit_ledger::store` - Storage abstraction and SQLite

pub mod config;
pub mod directory;
pub mod error;
pub mod ledger;
pub mod trail;

// Re-export component crates
pub use audit_ledger_core as core;
pub use audit_ledger_store as store;

pub use config::LedgerConfig;
pub use directory::{AcceptAll, KnownRecords, RecordDirectory};
pub use error::{LedgerError, Result};
pub use ledger::Ledger;
pub use trail::AuditTrail;

// Re-export commonly used core types
pub use audit_ledger_core::{
    verify_full, verify_linkage, Action, Actor, AuditEntry, ChainReport, ChainVerdict, ChangeSet,
    ChangeValue, Digest, EntryId, FraudDetector, FraudVerdict, RecordId,
};
