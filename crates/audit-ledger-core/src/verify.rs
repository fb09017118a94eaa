//! Chain verification: linkage-only and full cryptographic replay.
//!
//! Verification is a pure function of the entries it is given. It never
//! consults a store, so any party holding an exported ledger can run it.
//!
//! A broken chain is a normal result (`false`, or a non-intact verdict).
//! [`VerifyError`] is reserved for input that cannot be read at all.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::io::{BufRead, Write};

use crate::entry::AuditEntry;
use crate::error::VerifyError;

/// Outcome of inspecting a sequence of entries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ChainVerdict {
    /// Every entry re-hashes to its stored digest and links to its predecessor.
    Intact,

    /// `entries[index].prev_hash` does not equal `entries[index - 1].hash`.
    BrokenLink { index: usize },

    /// `entries[index]` does not re-hash to its stored digest.
    DigestMismatch { index: usize },

    /// The first entry names a predecessor, so the sequence is not a whole ledger.
    MissingGenesis,
}

impl ChainVerdict {
    pub fn is_intact(&self) -> bool {
        matches!(self, ChainVerdict::Intact)
    }

    /// Index of the first failing entry, if any.
    pub fn failing_index(&self) -> Option<usize> {
        match self {
            ChainVerdict::Intact => None,
            ChainVerdict::BrokenLink { index } | ChainVerdict::DigestMismatch { index } => {
                Some(*index)
            }
            ChainVerdict::MissingGenesis => Some(0),
        }
    }
}

impl fmt::Display for ChainVerdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ChainVerdict::Intact => f.write_str("chain intact"),
            ChainVerdict::BrokenLink { index } => write!(
                f,
                "chain broken at entry {index}: previous hash does not match the preceding entry"
            ),
            ChainVerdict::DigestMismatch { index } => write!(
                f,
                "entry {index} was altered: recorded hash does not match its contents"
            ),
            ChainVerdict::MissingGenesis => {
                f.write_str("first entry references a predecessor: history is incomplete")
            }
        }
    }
}

/// Detailed result of a chain inspection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChainReport {
    /// Number of entries examined.
    pub entries: usize,
    pub verdict: ChainVerdict,
}

impl ChainReport {
    pub fn is_intact(&self) -> bool {
        self.verdict.is_intact()
    }
}

/// Check that every entry names its predecessor's digest.
///
/// Never looks at `changes`, so content tampering passes this check.
/// Empty and single-entry sequences are trivially linked.
pub fn verify_linkage(entries: &[AuditEntry]) -> bool {
    entries.windows(2).all(|pair| pair[1].links_to(&pair[0]))
}

/// Linkage-only verification reporting the first broken link.
///
/// Like [`verify_linkage`], this never re-encodes `changes`, so it cannot fail.
pub fn inspect_linkage(entries: &[AuditEntry]) -> ChainReport {
    let broken = entries
        .windows(2)
        .position(|pair| !pair[1].links_to(&pair[0]))
        .map(|i| ChainVerdict::BrokenLink { index: i + 1 });
    report(entries, broken.unwrap_or(ChainVerdict::Intact))
}

/// Recompute every digest and check linkage.
///
/// Each entry is re-hashed from its own `changes` and stated `prev_hash`, so a
/// contiguous suffix of a ledger verifies on its internal consistency. Use
/// [`verify_from_genesis`] to also require that the sequence starts a ledger.
pub fn verify_full(entries: &[AuditEntry]) -> Result<bool, VerifyError> {
    Ok(inspect_chain(entries)?.is_intact())
}

/// [`verify_full`], additionally requiring `entries[0]` to be a genesis entry.
pub fn verify_from_genesis(entries: &[AuditEntry]) -> Result<bool, VerifyError> {
    Ok(inspect_from_genesis(entries)?.is_intact())
}

/// Full verification reporting the first failing entry.
pub fn inspect_chain(entries: &[AuditEntry]) -> Result<ChainReport, VerifyError> {
    for (index, entry) in entries.iter().enumerate() {
        if index > 0 && !entry.links_to(&entries[index - 1]) {
            return Ok(report(entries, ChainVerdict::BrokenLink { index }));
        }

        let matches = entry
            .verify_hash()
            .map_err(|source| VerifyError::Unencodable { index, source })?;
        if !matches {
            return Ok(report(entries, ChainVerdict::DigestMismatch { index }));
        }
    }

    Ok(report(entries, ChainVerdict::Intact))
}

/// [`inspect_chain`] for a sequence that must start at genesis.
pub fn inspect_from_genesis(entries: &[AuditEntry]) -> Result<ChainReport, VerifyError> {
    match entries.first() {
        Some(first) if !first.is_genesis() => Ok(report(entries, ChainVerdict::MissingGenesis)),
        _ => inspect_chain(entries),
    }
}

fn report(entries: &[AuditEntry], verdict: ChainVerdict) -> ChainReport {
    ChainReport {
        entries: entries.len(),
        verdict,
    }
}

/// Structural checks that serde alone cannot express.
fn check_structure(entry: &AuditEntry) -> Result<(), String> {
    match (entry.fraud_detected, entry.fraud_reason.is_some()) {
        (false, true) => Err("fraudReason present without fraudDetected".into()),
        (true, false) => Err("fraudDetected set without a fraudReason".into()),
        _ => Ok(()),
    }
}

/// Write entries as JSON Lines, one entry per line.
pub fn encode_entries_jsonl<W: Write>(entries: &[AuditEntry], mut writer: W) -> Result<(), VerifyError> {
    for entry in entries {
        serde_json::to_writer(&mut writer, entry).map_err(std::io::Error::from)?;
        writer.write_all(b"\n")?;
    }
    writer.flush()?;
    Ok(())
}

/// Decode a JSON array of entries.
pub fn decode_entries_json(input: &str) -> Result<Vec<AuditEntry>, VerifyError> {
    let entries: Vec<AuditEntry> =
        serde_json::from_str(input).map_err(|e| VerifyError::Malformed {
            line: e.line(),
            message: e.to_string(),
        })?;

    for entry in &entries {
        check_structure(entry).map_err(|message| VerifyError::Malformed { line: 0, message })?;
    }
    Ok(entries)
}

/// Decode JSON Lines. Blank lines are skipped; line numbers are 1-based.
pub fn decode_entries_jsonl<R: BufRead>(reader: R) -> Result<Vec<AuditEntry>, VerifyError> {
    let mut entries = Vec::new();

    for (i, line) in reader.lines().enumerate() {
        let line = line?;
        let line_no = i + 1;
        if line.trim().is_empty() {
            continue;
        }

        let entry: AuditEntry = serde_json::from_str(&line).map_err(|e| VerifyError::Malformed {
            line: line_no,
            message: e.to_string(),
        })?;
        check_structure(&entry).map_err(|message| VerifyError::Malformed {
            line: line_no,
            message,
        })?;
        entries.push(entry);
    }

    Ok(entries)
}
