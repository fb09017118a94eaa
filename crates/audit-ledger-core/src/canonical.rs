//! Canonical JSON encoding and the entry digest.
//!
//! The digest of an entry is `SHA-256(canonical(changes ∪ {prev_hash}))`:
//! - `prev_hash` is inserted at the top level only when a predecessor exists,
//!   as its lowercase hex digest
//! - map keys are sorted by byte-wise comparison at every nesting level
//! - compact output, no whitespace anywhere
//! - integers in plain decimal; finite floats in serde_json's shortest
//!   round-trip form; non-finite floats are rejected
//! - strings escape only `"`, `\` and control characters
//!
//! Every verifier, in any language, must reproduce these bytes exactly.

use serde::Serialize;
use std::io::Write;

use crate::changes::{ChangeSet, ChangeValue};
use crate::error::CoreError;
use crate::types::Digest;

/// Reserved top-level key carrying the predecessor digest inside the hash input.
pub const PREV_HASH_KEY: &str = "prev_hash";

/// Encode `(changes, prev_hash)` to canonical bytes.
pub fn canonical_bytes(changes: &ChangeSet, prev_hash: Option<&Digest>) -> Result<Vec<u8>, CoreError> {
    if changes.contains_key(PREV_HASH_KEY) {
        return Err(CoreError::ReservedKey(PREV_HASH_KEY));
    }

    let prev_value = prev_hash.map(|d| ChangeValue::Text(d.to_hex()));

    let mut entries: Vec<(&str, &ChangeValue)> =
        changes.iter().map(|(k, v)| (k.as_str(), v)).collect();
    if let Some(value) = &prev_value {
        entries.push((PREV_HASH_KEY, value));
    }

    let mut buf = Vec::with_capacity(128);
    encode_map_canonical(&mut buf, entries, "$")?;
    Ok(buf)
}

/// Canonical encoding as a string, for diagnostics and golden vectors.
pub fn canonical_string(changes: &ChangeSet, prev_hash: Option<&Digest>) -> Result<String, CoreError> {
    let bytes = canonical_bytes(changes, prev_hash)?;
    String::from_utf8(bytes).map_err(|e| CoreError::EncodingError(e.to_string()))
}

/// Compute the digest of an entry from its change set and predecessor digest.
///
/// Pure: the same input always produces the same digest.
pub fn compute_hash(changes: &ChangeSet, prev_hash: Option<&Digest>) -> Result<Digest, CoreError> {
    let bytes = canonical_bytes(changes, prev_hash)?;
    Ok(Digest::sha256(&bytes))
}

/// Compute the digest for any serializable mapping.
pub fn compute_hash_of<T: Serialize + ?Sized>(
    value: &T,
    prev_hash: Option<&Digest>,
) -> Result<Digest, CoreError> {
    let changes = ChangeSet::from_serializable(value)?;
    compute_hash(&changes, prev_hash)
}

/// Recursively encode a change value.
fn encode_value_to(buf: &mut Vec<u8>, value: &ChangeValue, path: &str) -> Result<(), CoreError> {
    match value {
        ChangeValue::Null => buf.extend_from_slice(b"null"),
        ChangeValue::Bool(true) => buf.extend_from_slice(b"true"),
        ChangeValue::Bool(false) => buf.extend_from_slice(b"false"),
        ChangeValue::Integer(i) => {
            write!(buf, "{i}").map_err(|e| CoreError::EncodingError(e.to_string()))?;
        }
        ChangeValue::Float(f) => {
            if !f.is_finite() {
                return Err(CoreError::NonFiniteFloat { path: path.to_string() });
            }
            serde_json::to_writer(&mut *buf, f)?;
        }
        ChangeValue::Text(s) => encode_text(buf, s)?,
        ChangeValue::List(items) => {
            buf.push(b'[');
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    buf.push(b',');
                }
                encode_value_to(buf, item, &format!("{path}[{i}]"))?;
            }
            buf.push(b']');
        }
        ChangeValue::Map(map) => {
            let entries = map.iter().map(|(k, v)| (k.as_str(), v)).collect();
            encode_map_canonical(buf, entries, path)?;
        }
    }
    Ok(())
}

/// Encode a JSON string literal.
fn encode_text(buf: &mut Vec<u8>, s: &str) -> Result<(), CoreError> {
    serde_json::to_writer(&mut *buf, s)?;
    Ok(())
}

/// Encode a map with keys sorted by byte comparison.
fn encode_map_canonical(
    buf: &mut Vec<u8>,
    mut entries: Vec<(&str, &ChangeValue)>,
    path: &str,
) -> Result<(), CoreError> {
    entries.sort_by(|a, b| a.0.as_bytes().cmp(b.0.as_bytes()));

    buf.push(b'{');
    for (i, (key, value)) in entries.into_iter().enumerate() {
        if i > 0 {
            buf.push(b',');
        }
        encode_text(buf, key)?;
        buf.push(b':');
        encode_value_to(buf, value, &format!("{path}.{key}"))?;
    }
    buf.push(b'}');
    Ok(())
}
