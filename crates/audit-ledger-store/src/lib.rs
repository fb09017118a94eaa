//! # Audit Ledger Store
//!
//! Storage abstraction for the audit ledger. Provides a trait-based interface
//! for entry persistence with SQLite and in-memory implementations.
//!
//! ## Overview
//!
//! The store abstracts entry storage behind the [`Store`] trait, allowing the
//! ledger to be storage-agnostic. The primary implementation is
//! [`SqliteStore`], with [`MemoryStore`] for tests and embedded use.
//!
//! ## Key Types
//!
//! - [`Store`] - The async trait for all storage operations
//! - [`SqliteStore`] - SQLite-based persistent storage
//! - [`MemoryStore`] - In-memory storage
//! - [`AppendResult`] - Outcome of a compare-and-append
//! - [`Head`] - The last entry of a record's ledger
//!
//! ## Usage
//!
//! ```rust,no_run
//! use audit_ledger_store::{SqliteStore, Store};
//! use audit_ledger_core::RecordId;
//!
//! async fn example() {
//!     let store = SqliteStore::open("audit.db").unwrap();
//!     let entries = store.entries(&RecordId::new("prop-1")).await.unwrap();
//!     println!("{} entries", entries.len());
//! }
//! ```
//!
//! ## Design Notes
//!
//! - **Append-only**: no update or delete operations exist
//! - **Compare-and-append**: a stale head yields `Conflict`, never a fork
//! - **Stores do not verify**: hashes are recomputed by readers, not trusted here

pub mod error;
pub mod memory;
pub mod migration;
pub mod sqlite;
pub mod traits;

pub use error::{Result, StoreError};
pub use memory::MemoryStore;
pub use sqlite::SqliteStore;
pub use traits::{AppendResult, Head, Store};
