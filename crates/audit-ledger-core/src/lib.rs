//! # Audit Ledger Core
//!
//! Pure primitives for the audit ledger: entries, canonical hashing, and
//! chain verification.
//!
//! This crate contains no storage and no async runtime. Everything here is a
//! deterministic function of its inputs, so any party can re-run it.
//!
//! ## Key Types
//!
//! - [`AuditEntry`] - One immutable, hash-linked record of a mutation
//! - [`ChangeSet`] - The mutation payload; key order never matters
//! - [`Digest`] - SHA-256 digest, rendered as lowercase hex
//! - [`RecordId`] - The record whose history a ledger holds
//!
//! ## Hashing
//!
//! `hash = SHA-256(canonical(changes ∪ {prev_hash}))`. See [`canonical`].
//!
//! ## Verification
//!
//! [`verify_linkage`] checks only the chain pointers; [`verify_full`] replays
//! every digest. See [`verify`].

pub mod canonical;
pub mod changes;
pub mod entry;
pub mod error;
pub mod fraud;
pub mod listing;
pub mod types;
pub mod verify;

pub use canonical::{canonical_bytes, canonical_string, compute_hash, compute_hash_of, PREV_HASH_KEY};
pub use changes::{ChangeSet, ChangeValue};
pub use entry::{Action, Actor, AuditEntry, EntryBuilder, FraudVerdict};
pub use error::{CoreError, VerifyError};
pub use fraud::{FraudDetector, MutationContext, NoFraudDetected};
pub use listing::{deletion_changes, Owner, PropertyListing};
pub use types::{Digest, EntryId, RecordId};
pub use verify::{
    decode_entries_json, decode_entries_jsonl, encode_entries_jsonl, inspect_chain,
    inspect_from_genesis, inspect_linkage, verify_from_genesis, verify_full, verify_linkage,
    ChainReport, ChainVerdict,
};
