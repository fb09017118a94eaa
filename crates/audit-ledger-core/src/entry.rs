//! Audit entry: one immutable, hash-linked record of a mutation.
//!
//! Entries are never edited. A correction to a record is a new entry.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

use crate::canonical::compute_hash;
use crate::changes::ChangeSet;
use crate::error::CoreError;
use crate::types::{Digest, EntryId, RecordId};

/// The kind of mutation an entry records.
///
/// Interpreted by collaborators only; the ledger treats it as a tag.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Action {
    Create,
    Update,
    Verify,
    Delete,
    Other(String),
}

impl Action {
    pub fn as_str(&self) -> &str {
        match self {
            Action::Create => "create",
            Action::Update => "update",
            Action::Verify => "verify",
            Action::Delete => "delete",
            Action::Other(s) => s,
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Action {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s {
            "create" => Action::Create,
            "update" => Action::Update,
            "verify" => Action::Verify,
            "delete" => Action::Delete,
            other => Action::Other(other.to_string()),
        })
    }
}

impl From<&str> for Action {
    fn from(s: &str) -> Self {
        match s.parse() {
            Ok(action) => action,
            Err(never) => match never {},
        }
    }
}

impl Serialize for Action {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for Action {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Ok(Action::from(s.as_str()))
    }
}

/// The identity that performed a mutation.
///
/// Stored opaquely; the ledger never validates it.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Actor {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
}

impl Actor {
    /// A person identified by name and email.
    pub fn person(name: impl Into<String>, email: impl Into<String>) -> Self {
        Self {
            id: None,
            name: Some(name.into()),
            email: Some(email.into()),
        }
    }

    /// An actor known only by an identifier.
    pub fn with_id(id: impl Into<String>) -> Self {
        Self {
            id: Some(id.into()),
            name: None,
            email: None,
        }
    }
}

impl fmt::Display for Actor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (&self.name, &self.email, &self.id) {
            (Some(name), Some(email), _) => write!(f, "{name} <{email}>"),
            (Some(name), None, _) => f.write_str(name),
            (None, Some(email), _) => f.write_str(email),
            (None, None, Some(id)) => f.write_str(id),
            (None, None, None) => f.write_str("anonymous"),
        }
    }
}

/// Verdict of the external fraud-detection collaborator.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum FraudVerdict {
    #[default]
    Clean,
    Flagged { reason: String },
}

impl FraudVerdict {
    pub fn flagged(reason: impl Into<String>) -> Self {
        FraudVerdict::Flagged { reason: reason.into() }
    }

    pub fn is_flagged(&self) -> bool {
        matches!(self, FraudVerdict::Flagged { .. })
    }

    pub fn reason(&self) -> Option<&str> {
        match self {
            FraudVerdict::Clean => None,
            FraudVerdict::Flagged { reason } => Some(reason),
        }
    }
}

/// A single audit entry.
///
/// Wire format is camelCase JSON. `hash` covers only `changes` and `prevHash`;
/// every other field is metadata. `recordId` and `seq` may be absent from
/// entries exported elsewhere; they decode as empty and `0`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuditEntry {
    /// Assigned at append time.
    pub id: EntryId,

    /// The record this entry audits.
    #[serde(default)]
    pub record_id: RecordId,

    /// 1-based position within the record's ledger; `0` when unknown.
    #[serde(default)]
    pub seq: u64,

    /// Creation instant; non-decreasing within a ledger.
    pub timestamp: DateTime<Utc>,

    pub action: Action,

    /// `None` for mutations with no acting identity (e.g. system deletes).
    pub actor: Option<Actor>,

    pub changes: ChangeSet,

    /// Digest of the preceding entry, `None` for the genesis entry.
    pub prev_hash: Option<Digest>,

    pub hash: Digest,

    pub fraud_detected: bool,

    /// Present iff `fraud_detected`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fraud_reason: Option<String>,
}

impl AuditEntry {
    /// Recompute this entry's digest from its own content.
    pub fn recompute_hash(&self) -> Result<Digest, CoreError> {
        compute_hash(&self.changes, self.prev_hash.as_ref())
    }

    /// Check the stored digest against the recomputed one.
    pub fn verify_hash(&self) -> Result<bool, CoreError> {
        Ok(self.recompute_hash()? == self.hash)
    }

    /// Whether this entry claims to start a ledger.
    pub fn is_genesis(&self) -> bool {
        self.prev_hash.is_none()
    }

    /// Whether this entry directly follows `prev`.
    pub fn links_to(&self, prev: &AuditEntry) -> bool {
        self.prev_hash.as_ref() == Some(&prev.hash)
    }

    /// The fraud verdict recorded with this entry.
    pub fn verdict(&self) -> FraudVerdict {
        match (self.fraud_detected, &self.fraud_reason) {
            (true, Some(reason)) => FraudVerdict::Flagged { reason: reason.clone() },
            _ => FraudVerdict::Clean,
        }
    }

    /// One-line summary for logs and the CLI.
    pub fn summary(&self) -> String {
        let actor = self
            .actor
            .as_ref()
            .map(ToString::to_string)
            .unwrap_or_else(|| "-".to_string());
        format!(
            "#{} {} {} by {} ({} fields) {}",
            self.seq,
            self.timestamp.to_rfc3339(),
            self.action,
            actor,
            self.changes.len(),
            &self.hash.to_hex()[..16]
        )
    }
}

/// Builder for audit entries.
///
/// `build` computes the digest and the entry id.
pub struct EntryBuilder {
    record_id: RecordId,
    seq: u64,
    timestamp: DateTime<Utc>,
    action: Action,
    actor: Option<Actor>,
    changes: ChangeSet,
    prev_hash: Option<Digest>,
    verdict: FraudVerdict,
}

impl EntryBuilder {
    /// Start an entry at position `seq` of the ledger for `record_id`.
    pub fn new(record_id: RecordId, seq: u64) -> Self {
        Self {
            record_id,
            seq,
            timestamp: Utc::now(),
            action: Action::Update,
            actor: None,
            changes: ChangeSet::new(),
            prev_hash: None,
            verdict: FraudVerdict::Clean,
        }
    }

    pub fn timestamp(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = timestamp;
        self
    }

    pub fn action(mut self, action: Action) -> Self {
        self.action = action;
        self
    }

    pub fn actor(mut self, actor: Option<Actor>) -> Self {
        self.actor = actor;
        self
    }

    pub fn changes(mut self, changes: ChangeSet) -> Self {
        self.changes = changes;
        self
    }

    /// Set the predecessor digest (omit for genesis).
    pub fn prev(mut self, prev_hash: Digest) -> Self {
        self.prev_hash = Some(prev_hash);
        self
    }

    pub fn prev_opt(mut self, prev_hash: Option<Digest>) -> Self {
        self.prev_hash = prev_hash;
        self
    }

    pub fn verdict(mut self, verdict: FraudVerdict) -> Self {
        self.verdict = verdict;
        self
    }

    /// Hash the change set and assemble the entry.
    pub fn build(self) -> Result<AuditEntry, CoreError> {
        let hash = compute_hash(&self.changes, self.prev_hash.as_ref())?;
        let id = EntryId::derive(&self.record_id, self.seq, &hash);
        let (fraud_detected, fraud_reason) = match self.verdict {
            FraudVerdict::Clean => (false, None),
            FraudVerdict::Flagged { reason } => (true, Some(reason)),
        };

        Ok(AuditEntry {
            id,
            record_id: self.record_id,
            seq: self.seq,
            timestamp: self.timestamp,
            action: self.action,
            actor: self.actor,
            changes: self.changes,
            prev_hash: self.prev_hash,
            hash,
            fraud_detected,
            fraud_reason,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn ts(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(secs, 0).unwrap()
    }

    #[test]
    fn test_genesis_entry() {
        let entry = EntryBuilder::new(RecordId::new("prop-1"), 1)
            .timestamp(ts(1_736_870_400))
            .action(Action::Create)
            .actor(Some(Actor::person("Charlie Lee", "charlie@example.com")))
            .changes(ChangeSet::new().with("location", "Austin"))
            .build()
            .unwrap();

        assert!(entry.is_genesis());
        assert!(entry.verify_hash().unwrap());
        assert_eq!(
            entry.hash.to_hex(),
            "2775dc092450091e3704512bf6b9168fffb641cf30a0b266a29ebb42108d8907"
        );
        assert_eq!(entry.verdict(), FraudVerdict::Clean);
    }

    #[test]
    fn test_linked_entry() {
        let a = EntryBuilder::new(RecordId::new("prop-1"), 1)
            .changes(ChangeSet::new().with("location", "Austin"))
            .build()
            .unwrap();
        let b = EntryBuilder::new(RecordId::new("prop-1"), 2)
            .prev(a.hash)
            .changes(ChangeSet::new().with("verification", "verified"))
            .build()
            .unwrap();

        assert!(b.links_to(&a));
        assert!(!a.links_to(&b));
        assert!(b.verify_hash().unwrap());
    }

    #[test]
    fn test_tampered_changes_fail_hash_check() {
        let mut entry = EntryBuilder::new(RecordId::new("prop-1"), 1)
            .changes(ChangeSet::new().with("location", "Austin"))
            .build()
            .unwrap();
        entry.changes.insert("location", "Dallas");
        assert!(!entry.verify_hash().unwrap());
    }

    #[test]
    fn test_wire_format() {
        let entry = EntryBuilder::new(RecordId::new("prop-1"), 1)
            .timestamp(ts(0))
            .action(Action::Create)
            .actor(Some(Actor::person("Alice Smith", "alice@example.com")))
            .changes(ChangeSet::new().with("location", "Austin"))
            .build()
            .unwrap();

        let value = serde_json::to_value(&entry).unwrap();
        assert_eq!(value["action"], "create");
        assert_eq!(value["prevHash"], serde_json::Value::Null);
        assert_eq!(value["hash"], entry.hash.to_hex());
        assert_eq!(value["fraudDetected"], false);
        assert!(value.get("fraudReason").is_none());
        assert_eq!(value["actor"]["email"], "alice@example.com");
        assert_eq!(value["timestamp"], "1970-01-01T00:00:00Z");

        let back: AuditEntry = serde_json::from_value(value).unwrap();
        assert_eq!(back, entry);
    }

    #[test]
    fn test_flagged_verdict_on_wire() {
        let entry = EntryBuilder::new(RecordId::new("prop-9"), 1)
            .verdict(FraudVerdict::flagged("duplicate listing"))
            .build()
            .unwrap();

        assert!(entry.fraud_detected);
        assert_eq!(entry.fraud_reason.as_deref(), Some("duplicate listing"));
        let value = serde_json::to_value(&entry).unwrap();
        assert_eq!(value["fraudReason"], "duplicate listing");
        assert!(entry.verdict().is_flagged());
    }

    #[test]
    fn test_action_strings() {
        assert_eq!(Action::from("verify"), Action::Verify);
        assert_eq!(Action::from("archive"), Action::Other("archive".into()));
        assert_eq!(Action::Delete.to_string(), "delete");
    }

    #[test]
    fn test_actor_display() {
        assert_eq!(
            Actor::person("Bob Johnson", "bob@example.com").to_string(),
            "Bob Johnson <bob@example.com>"
        );
        assert_eq!(Actor::with_id("svc-importer").to_string(), "svc-importer");
    }
}
