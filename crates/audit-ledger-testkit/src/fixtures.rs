//! Test fixtures and helpers.
//!
//! Common setup code for integration tests.

use chrono::{DateTime, TimeZone, Utc};

use audit_ledger::{Ledger, LedgerError};
use audit_ledger_core::{
    Action, Actor, AuditEntry, ChangeSet, CoreError, EntryBuilder, Owner, PropertyListing,
    RecordId,
};
use audit_ledger_store::MemoryStore;

/// 2025-01-14T16:00:00Z, the base instant for deterministic entries.
pub const BASE_TIMESTAMP: i64 = 1_736_870_400;

/// A fixed instant `offset_secs` after [`BASE_TIMESTAMP`].
pub fn fixed_time(offset_secs: i64) -> DateTime<Utc> {
    Utc.timestamp_opt(BASE_TIMESTAMP + offset_secs, 0)
        .single()
        .unwrap_or_default()
}

/// The three sample listings, keyed by record id.
pub fn seed_listings() -> Vec<(RecordId, PropertyListing)> {
    vec![
        (
            RecordId::new("prop-alice"),
            PropertyListing {
                owner: Owner::new("Alice Smith", "alice@example.com"),
                buyer_intent: "sale".into(),
                location: "New York, NY".into(),
                verification: Some("verified".into()),
                terms: "Full payment upfront".into(),
            },
        ),
        (
            RecordId::new("prop-bob"),
            PropertyListing {
                owner: Owner::new("Bob Johnson", "bob@example.com"),
                buyer_intent: "rent".into(),
                location: "San Francisco, CA".into(),
                verification: Some("pending".into()),
                terms: "12-month lease".into(),
            },
        ),
        (
            RecordId::new("prop-charlie"),
            PropertyListing {
                owner: Owner::new("Charlie Lee", "charlie@example.com"),
                buyer_intent: "sale".into(),
                location: "Austin, TX".into(),
                verification: Some("verified".into()),
                terms: "Installments allowed".into(),
            },
        ),
    ]
}

/// Build a correctly linked chain offline, one second apart.
///
/// The first entry is `create`, the rest are `update`.
pub fn build_chain(
    record_id: &RecordId,
    change_sets: Vec<ChangeSet>,
) -> Result<Vec<AuditEntry>, CoreError> {
    let mut entries: Vec<AuditEntry> = Vec::with_capacity(change_sets.len());
    for (i, changes) in change_sets.into_iter().enumerate() {
        let action = if i == 0 { Action::Create } else { Action::Update };
        let entry = EntryBuilder::new(record_id.clone(), i as u64 + 1)
            .timestamp(fixed_time(i as i64))
            .action(action)
            .actor(Some(Actor::with_id("testkit")))
            .changes(changes)
            .prev_opt(entries.last().map(|e| e.hash))
            .build()?;
        entries.push(entry);
    }
    Ok(entries)
}

/// The two-entry Austin ledger: located, then verified.
pub fn austin_chain() -> Result<Vec<AuditEntry>, CoreError> {
    build_chain(
        &RecordId::new("prop-austin"),
        vec![
            ChangeSet::new().with("location", "Austin"),
            ChangeSet::new().with("verification", "verified"),
        ],
    )
}

/// A test fixture with an in-memory ledger.
pub struct TestFixture {
    pub ledger: Ledger<MemoryStore>,
}

impl TestFixture {
    /// Create a fixture with an empty ledger.
    pub fn new() -> Self {
        Self {
            ledger: Ledger::new(MemoryStore::new()),
        }
    }

    /// Create a fixture with every seed listing logged as `create`.
    pub async fn seeded() -> Result<Self, LedgerError> {
        let fixture = Self::new();
        for (record_id, listing) in seed_listings() {
            fixture
                .ledger
                .record_listing(&record_id, Action::Create, &listing)
                .await?;
        }
        Ok(fixture)
    }
}

impl Default for TestFixture {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use audit_ledger_core::verify_full;

    #[test]
    fn test_build_chain_links() {
        let entries = austin_chain().unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[1].prev_hash, Some(entries[0].hash));
        assert!(verify_full(&entries).unwrap());
    }

    #[test]
    fn test_build_chain_is_deterministic() {
        assert_eq!(austin_chain().unwrap(), austin_chain().unwrap());
    }

    #[tokio::test]
    async fn test_seeded_fixture() {
        let fixture = TestFixture::seeded().await.unwrap();
        let records = fixture.ledger.records().await.unwrap();
        assert_eq!(records.len(), 3);

        for record in records {
            let trail = fixture.ledger.read(&record).await.unwrap();
            assert_eq!(trail.len(), 1);
            assert!(trail.first().unwrap().is_genesis());
        }
    }
}
