//! # Audit Ledger Testkit
//!
//! Testing utilities for the audit ledger.
//!
//! ## Overview
//!
//! This crate provides:
//!
//! - **Golden vectors**: Fixed change sets with the canonical bytes and digests
//!   every implementation must reproduce
//! - **Generators**: Proptest strategies for change sets and actions
//! - **Fixtures**: Sample listings, offline chains, and a ready in-memory ledger
//!
//! ## Golden Vectors
//!
//! ```rust
//! use audit_ledger_testkit::vectors::{all_vectors, check_vector};
//!
//! for vector in all_vectors() {
//!     let result = check_vector(&vector).unwrap();
//!     println!("{}: {}", vector.name, result.hash);
//! }
//! ```
//!
//! ## Property Testing
//!
//! ```rust,ignore
//! use proptest::prelude::*;
//! use audit_ledger_testkit::{build_chain, generators::change_sets};
//!
//! proptest! {
//!     #[test]
//!     fn chains_verify(sets in change_sets(8)) {
//!         let entries = build_chain(&RecordId::new("p"), sets).unwrap();
//!         prop_assert!(verify_full(&entries).unwrap());
//!     }
//! }
//! ```
//!
//! ## Test Fixtures
//!
//! ```rust
//! use audit_ledger_testkit::fixtures::austin_chain;
//!
//! let entries = austin_chain().unwrap();
//! assert_eq!(entries.len(), 2);
//! ```

pub mod fixtures;
pub mod generators;
pub mod vectors;

pub use fixtures::{austin_chain, build_chain, fixed_time, seed_listings, TestFixture};
pub use generators::{action, change_set, change_sets, change_value, to_json_reversed};
pub use vectors::{all_vectors, check_vector, verify_all_vectors, GoldenVector};
