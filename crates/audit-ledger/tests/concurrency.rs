//! Concurrent appends never fork a ledger.

use std::collections::HashSet;
use std::sync::Arc;

use audit_ledger::core::verify_from_genesis;
use audit_ledger::store::MemoryStore;
use audit_ledger::{Action, ChangeSet, FraudVerdict, Ledger, LedgerConfig, RecordId};

fn assert_unforked(entries: &[audit_ledger::AuditEntry]) {
    let prevs: HashSet<_> = entries.iter().map(|e| e.prev_hash).collect();
    assert_eq!(prevs.len(), entries.len(), "two entries claim the same predecessor");

    let seqs: Vec<u64> = entries.iter().map(|e| e.seq).collect();
    let expected: Vec<u64> = (1..=entries.len() as u64).collect();
    assert_eq!(seqs, expected);

    assert!(verify_from_genesis(entries).unwrap());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_appends_to_one_record() {
    let ledger = Arc::new(Ledger::new(MemoryStore::new()));
    let record = RecordId::new("prop-hot");

    let tasks: Vec<_> = (0..32)
        .map(|i| {
            let ledger = ledger.clone();
            let record = record.clone();
            tokio::spawn(async move {
                ledger
                    .append(
                        &record,
                        Action::Update,
                        None,
                        ChangeSet::new().with("writer", i),
                        FraudVerdict::Clean,
                    )
                    .await
            })
        })
        .collect();

    for task in tasks {
        task.await.unwrap().unwrap();
    }

    let trail = ledger.read(&record).await.unwrap();
    assert_eq!(trail.len(), 32);
    assert_unforked(trail.as_slice());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn two_ledgers_sharing_a_store_resolve_through_compare_and_append() {
    // Separate ledgers do not share record locks, so races reach the store.
    let store = Arc::new(MemoryStore::new());
    let config = LedgerConfig {
        max_append_retries: 64,
        ..LedgerConfig::default()
    };
    let a = Arc::new(Ledger::with_config(store.clone(), config.clone()));
    let b = Arc::new(Ledger::with_config(store.clone(), config));
    let record = RecordId::new("prop-shared");

    let mut tasks = Vec::new();
    for i in 0..20 {
        let ledger = if i % 2 == 0 { a.clone() } else { b.clone() };
        let record = record.clone();
        tasks.push(tokio::spawn(async move {
            ledger
                .append(
                    &record,
                    Action::Update,
                    None,
                    ChangeSet::new().with("writer", i),
                    FraudVerdict::Clean,
                )
                .await
        }));
    }
    for task in tasks {
        task.await.unwrap().unwrap();
    }

    let trail = a.read(&record).await.unwrap();
    assert_eq!(trail.len(), 20);
    assert_unforked(trail.as_slice());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn unrelated_records_do_not_interfere() {
    let ledger = Arc::new(Ledger::new(MemoryStore::new()));

    let tasks: Vec<_> = (0..8)
        .map(|r| {
            let ledger = ledger.clone();
            tokio::spawn(async move {
                let record = RecordId::new(format!("prop-{r}"));
                for i in 0..5 {
                    ledger
                        .append(
                            &record,
                            Action::Update,
                            None,
                            ChangeSet::new().with("step", i),
                            FraudVerdict::Clean,
                        )
                        .await
                        .unwrap();
                }
                record
            })
        })
        .collect();

    for task in tasks {
        let record = task.await.unwrap();
        let trail = ledger.read(&record).await.unwrap();
        assert_eq!(trail.len(), 5);
        assert_unforked(trail.as_slice());
    }
    assert_eq!(ledger.records().await.unwrap().len(), 8);
}
